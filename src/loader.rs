use crate::error::{LeadError, Result};
use calamine::{Data, Reader, Xls, Xlsx};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

lazy_static! {
    static ref ACCEPTED_EXTENSION: Regex = Regex::new(r"(?i)\.(csv|xlsx|xls)$").unwrap();
}

/// Accepted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    Csv,
    Xls,
    Xlsx,
}

impl SheetFormat {
    /// Detect the format from a client-declared filename
    ///
    /// The match is a case-insensitive suffix check against `.csv`, `.xls`
    /// and `.xlsx`. No file content is inspected.
    ///
    /// # Arguments
    /// * `filename` - Filename (or bare extension such as `.csv`) sent by the client
    ///
    /// # Returns
    /// * `Result<SheetFormat>` - The detected format, or `UnsupportedFormat`
    ///
    /// # Examples
    /// ```
    /// use leadsheet::loader::SheetFormat;
    ///
    /// assert_eq!(SheetFormat::from_filename("Leads.XLSX").unwrap(), SheetFormat::Xlsx);
    /// assert!(SheetFormat::from_filename("notes.docx").is_err());
    /// ```
    pub fn from_filename(filename: &str) -> Result<Self> {
        let trimmed = filename.trim();
        let Some(captures) = ACCEPTED_EXTENSION.captures(trimmed) else {
            let extension = trimmed
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_lowercase())
                .unwrap_or_default();
            return Err(LeadError::UnsupportedFormat { extension });
        };
        match captures[1].to_lowercase().as_str() {
            "csv" => Ok(SheetFormat::Csv),
            "xls" => Ok(SheetFormat::Xls),
            _ => Ok(SheetFormat::Xlsx),
        }
    }
}

/// A single cell as read from the source, without type coercion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    fn from_text(text: &str) -> Self {
        if text.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text.to_string())
        }
    }

    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => CellValue::Empty,
            Data::String(s) => CellValue::from_text(s),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => CellValue::Float(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            // Raw mode: dates stay as their serial number
            Data::DateTime(d) => CellValue::Float(d.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from_text(s),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Header row plus data rows of the first sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSheet {
    /// Trimmed, stringified cells of the first row
    pub headers: Vec<String>,

    /// Remaining rows, each at least as wide as `headers`
    pub rows: Vec<Vec<CellValue>>,
}

impl ParsedSheet {
    fn from_grid(mut grid: Vec<Vec<CellValue>>) -> Self {
        if grid.is_empty() {
            return ParsedSheet {
                headers: Vec::new(),
                rows: Vec::new(),
            };
        }

        let headers: Vec<String> = grid
            .remove(0)
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let width = headers.len();
        for row in &mut grid {
            if row.len() < width {
                row.resize(width, CellValue::Empty);
            }
        }

        ParsedSheet {
            headers,
            rows: grid,
        }
    }
}

/// Parse an uploaded buffer in a known format
///
/// CSV input must be UTF-8 (a leading byte order mark is ignored). XLS and
/// XLSX workbooks are read straight from the buffer and only their first
/// sheet is consulted. The first row is always the header row.
///
/// # Arguments
/// * `bytes` - Complete file content
/// * `format` - Format declared by the upload
///
/// # Returns
/// * `Result<ParsedSheet>` - Headers and rows, or `ParseFailure`
pub fn parse(bytes: &[u8], format: SheetFormat) -> Result<ParsedSheet> {
    let grid = match format {
        SheetFormat::Csv => read_csv(bytes)?,
        SheetFormat::Xlsx => {
            let workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
                .map_err(|e| LeadError::ParseFailure(e.to_string()))?;
            read_first_sheet(workbook)?
        }
        SheetFormat::Xls => {
            let workbook: Xls<_> = Xls::new(Cursor::new(bytes))
                .map_err(|e| LeadError::ParseFailure(e.to_string()))?;
            read_first_sheet(workbook)?
        }
    };
    Ok(ParsedSheet::from_grid(grid))
}

/// Parse an upload whose format is taken from its filename
///
/// The extension gate runs first, so an unsupported filename fails without
/// the buffer being looked at.
pub fn parse_upload(bytes: &[u8], filename: &str) -> Result<ParsedSheet> {
    let format = SheetFormat::from_filename(filename)?;
    parse(bytes, format)
}

/// Extract only the header row of an upload
///
/// # Arguments
/// * `bytes` - Complete file content
/// * `filename` - Client-declared filename used for format detection
///
/// # Returns
/// * `Result<Vec<String>>` - Trimmed header strings in column order
///
/// # Examples
/// ```
/// use leadsheet::loader::parse_first_row_headers;
///
/// let headers = parse_first_row_headers(b"Name,Email\nAlice,a@x.com\n", "leads.csv").unwrap();
/// assert_eq!(headers, vec!["Name", "Email"]);
/// ```
pub fn parse_first_row_headers(bytes: &[u8], filename: &str) -> Result<Vec<String>> {
    Ok(parse_upload(bytes, filename)?.headers)
}

/// Read and parse a spreadsheet from disk
///
/// # Examples
/// ```no_run
/// use leadsheet::loader::load_spreadsheet;
///
/// match load_spreadsheet("leads.xlsx") {
///     Ok(sheet) => println!("{} columns, {} rows", sheet.headers.len(), sheet.rows.len()),
///     Err(e) => eprintln!("Error loading file: {}", e),
/// }
/// ```
pub fn load_spreadsheet(filepath: impl AsRef<Path>) -> Result<ParsedSheet> {
    let path = filepath.as_ref();
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let format = SheetFormat::from_filename(filename)?;
    let bytes = std::fs::read(path)?;
    parse(&bytes, format)
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| LeadError::ParseFailure(format!("CSV is not valid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LeadError::ParseFailure(e.to_string()))?;
        grid.push(record.iter().map(CellValue::from_text).collect());
    }
    Ok(grid)
}

fn read_first_sheet<RS, R>(mut workbook: R) -> Result<Vec<Vec<CellValue>>>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: fmt::Display,
{
    let names = workbook.sheet_names();
    let first = first_sheet_name(&names)?.to_string();
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| LeadError::ParseFailure(format!("failed to read sheet '{first}': {e}")))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(CellValue::from_data).collect())
        .collect())
}

fn first_sheet_name(names: &[String]) -> Result<&str> {
    names
        .first()
        .map(String::as_str)
        .ok_or_else(|| LeadError::ParseFailure("workbook contains no sheets".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    /// A structurally valid workbook whose `<sheets>` list is empty.
    fn workbook_without_sheets() -> Vec<u8> {
        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#,
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets/>
</workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#,
            ),
        ];

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extension_gate() {
        assert_eq!(SheetFormat::from_filename("a.csv").unwrap(), SheetFormat::Csv);
        assert_eq!(SheetFormat::from_filename("A.XLS").unwrap(), SheetFormat::Xls);
        assert_eq!(SheetFormat::from_filename(".xlsx").unwrap(), SheetFormat::Xlsx);
        assert!(matches!(
            SheetFormat::from_filename("report.docx"),
            Err(LeadError::UnsupportedFormat { ref extension }) if extension == "docx"
        ));
        assert!(SheetFormat::from_filename("csv").is_err());
        assert!(SheetFormat::from_filename("leads.csv.exe").is_err());
    }

    #[test]
    fn test_unsupported_format_ignores_bytes() {
        // Bytes are not valid for any format; the extension gate must fire first.
        let err = parse_first_row_headers(&[0xff, 0x00, 0x13], ".docx").unwrap_err();
        assert!(matches!(err, LeadError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_csv_headers() {
        let headers = parse_first_row_headers(b"Name,Email\nAlice,a@x.com\n", "leads.csv").unwrap();
        assert_eq!(headers, vec!["Name", "Email"]);
    }

    #[test]
    fn test_csv_trims_headers_and_strips_bom() {
        let input = "\u{feff} First Name ,\"Email, Work\"\nBob,b@x.com\n";
        let sheet = parse(input.as_bytes(), SheetFormat::Csv).unwrap();
        assert_eq!(sheet.headers, vec!["First Name", "Email, Work"]);
        assert_eq!(sheet.rows.len(), 1);
    }

    #[test]
    fn test_csv_pads_short_rows() {
        let sheet = parse(b"a,b,c\n1\n1,2,3,4\n", SheetFormat::Csv).unwrap();
        assert_eq!(
            sheet.rows[0],
            vec![
                CellValue::Text("1".into()),
                CellValue::Empty,
                CellValue::Empty
            ]
        );
        assert_eq!(sheet.rows[1].len(), 4);
    }

    #[test]
    fn test_csv_invalid_utf8() {
        let err = parse(&[b'a', b',', 0xc3, 0x28], SheetFormat::Csv).unwrap_err();
        assert!(matches!(err, LeadError::ParseFailure(_)));
    }

    #[test]
    fn test_empty_csv() {
        let sheet = parse(b"", SheetFormat::Csv).unwrap();
        assert!(sheet.headers.is_empty());
        assert!(sheet.rows.is_empty());
    }

    #[test]
    fn test_xlsx_first_sheet() {
        let mut workbook = Workbook::new();
        let first = workbook.add_worksheet();
        first.write_string(0, 0, " Email ").unwrap();
        first.write_number(0, 1, 2024.0).unwrap();
        first.write_string(1, 0, "a@x.com").unwrap();
        first.write_number(1, 2, 7.5).unwrap();
        let second = workbook.add_worksheet();
        second.write_string(0, 0, "Ignored").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let sheet = parse_upload(&bytes, "leads.xlsx").unwrap();
        assert_eq!(sheet.headers, vec!["Email", "2024", ""]);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0][0], CellValue::Text("a@x.com".into()));
        assert_eq!(sheet.rows[0][1], CellValue::Empty);
        assert_eq!(sheet.rows[0][2], CellValue::Float(7.5));
    }

    #[test]
    fn test_xlsx_garbage_bytes() {
        let err = parse(b"not a zip archive", SheetFormat::Xlsx).unwrap_err();
        assert!(matches!(err, LeadError::ParseFailure(_)));
    }

    #[test]
    fn test_xls_garbage_bytes() {
        let err = parse(b"not an ole file", SheetFormat::Xls).unwrap_err();
        assert!(matches!(err, LeadError::ParseFailure(_)));
    }

    #[test]
    fn test_zero_sheets() {
        let bytes = workbook_without_sheets();
        let err = parse(&bytes, SheetFormat::Xlsx).unwrap_err();
        assert!(matches!(err, LeadError::ParseFailure(_)));

        let err = parse_first_row_headers(&bytes, "empty.xlsx").unwrap_err();
        assert!(matches!(err, LeadError::ParseFailure(_)));
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(CellValue::Float(3.0).to_string(), "3");
        assert_eq!(CellValue::Float(3.25).to_string(), "3.25");
        assert_eq!(CellValue::Int(-4).to_string(), "-4");
        assert_eq!(CellValue::Bool(true).to_string(), "true");
        assert_eq!(CellValue::Empty.to_string(), "");
    }
}
