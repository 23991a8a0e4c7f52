//! Header alias resolution.
//!
//! Maps raw spreadsheet column headers onto canonical lead fields using an
//! ordered, data-driven alias table. Matching is case-insensitive and ignores
//! surrounding whitespace. Nothing here performs I/O or can fail at lookup
//! time; a field without a matching column simply resolves to `None`.

use crate::error::{LeadError, Result};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A canonical import target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappableField {
    /// Stable identifier, unique within a [`FieldTable`].
    pub key: String,

    /// Human-readable name shown in the mapping UI.
    pub label: String,

    /// Recognized header names, highest priority first.
    pub aliases: Vec<String>,
}

impl MappableField {
    pub fn new(key: &str, label: &str, aliases: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Suggested source column for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub key: String,
    pub label: String,
    /// Matched header as it appears in the upload (trimmed), or `None`.
    pub header: Option<String>,
}

/// Result of [`FieldTable::suggest`], in field declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingResult {
    pub matches: Vec<FieldMatch>,
}

impl MappingResult {
    /// Matched header for a field key, `None` when absent or unknown.
    pub fn header_for(&self, key: &str) -> Option<&str> {
        self.matches
            .iter()
            .find(|m| m.key == key)
            .and_then(|m| m.header.as_deref())
    }
}

lazy_static! {
    static ref DEFAULT_FIELDS: Vec<MappableField> = vec![
        MappableField::new(
            "first_name",
            "First Name",
            &["first name", "firstname", "first_name", "given name"],
        ),
        MappableField::new(
            "last_name",
            "Last Name",
            &["last name", "lastname", "last_name", "surname", "family name"],
        ),
        MappableField::new(
            "full_name",
            "Full Name",
            &["name", "full name", "full_name", "contact name"],
        ),
        MappableField::new(
            "email",
            "Email",
            &["email", "email address", "e-mail", "business email", "work email"],
        ),
        MappableField::new(
            "company",
            "Company",
            &["company", "company name", "organization", "organisation", "account name"],
        ),
        MappableField::new("title", "Job Title", &["title", "job title", "position", "role"]),
        MappableField::new(
            "phone",
            "Phone",
            &["phone", "phone number", "mobile", "telephone"],
        ),
        MappableField::new(
            "website",
            "Website",
            &["website", "company website", "url", "domain"],
        ),
        MappableField::new(
            "linkedin",
            "LinkedIn",
            &["linkedin", "linkedin url", "linkedin profile"],
        ),
        MappableField::new("location", "Location", &["location", "city", "country"]),
    ];
}

/// Ordered set of mappable fields.
///
/// Declaration order is significant: it is the order of suggestions and of
/// mapped record fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldTable {
    fields: Vec<MappableField>,
}

impl FieldTable {
    /// Build a table, checking that keys are unique and non-blank and that
    /// every field has at least one alias.
    pub fn new(fields: Vec<MappableField>) -> Result<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if field.key.trim().is_empty() {
                return Err(LeadError::InvalidInput("field key cannot be blank".into()));
            }
            if !seen.insert(field.key.as_str()) {
                return Err(LeadError::InvalidInput(format!(
                    "duplicate field key '{}'",
                    field.key
                )));
            }
            if field.aliases.is_empty() {
                return Err(LeadError::InvalidInput(format!(
                    "field '{}' has no aliases",
                    field.key
                )));
            }
        }
        Ok(Self { fields })
    }

    /// The built-in lead field table.
    pub fn builtin() -> Self {
        Self {
            fields: DEFAULT_FIELDS.clone(),
        }
    }

    /// Load a table from a JSON array of fields.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let fields: Vec<MappableField> = serde_json::from_str(&data)
            .map_err(|e| LeadError::InvalidInput(format!("invalid field table: {e}")))?;
        Self::new(fields)
    }

    pub fn fields(&self) -> &[MappableField] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&MappableField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Suggest a source header for every field.
    ///
    /// For each field, aliases are tried in declared order and the first one
    /// present among `headers` wins. The returned header is the trimmed
    /// upload text, not the alias.
    ///
    /// # Examples
    /// ```
    /// use leadsheet::aliases::FieldTable;
    ///
    /// let table = FieldTable::builtin();
    /// let headers = vec!["  E-Mail ".to_string(), "Company Name".to_string()];
    /// let suggested = table.suggest(&headers);
    /// assert_eq!(suggested.header_for("email"), Some("E-Mail"));
    /// assert_eq!(suggested.header_for("company"), Some("Company Name"));
    /// assert_eq!(suggested.header_for("phone"), None);
    /// ```
    pub fn suggest(&self, headers: &[String]) -> MappingResult {
        let matches = self
            .fields
            .iter()
            .map(|field| FieldMatch {
                key: field.key.clone(),
                label: field.label.clone(),
                header: match_alias(headers, &field.aliases)
                    .map(|idx| headers[idx].trim().to_string()),
            })
            .collect();
        MappingResult { matches }
    }
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Canonical comparison form of a header or alias.
pub fn normalize_header(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Find the column index for a field.
///
/// A non-blank `explicit` header that is present in `headers` always wins.
/// Otherwise `aliases` are scanned in order and the index of the first alias
/// found among `headers` is returned. `None` means the field has no source
/// column, which is not an error.
///
/// # Examples
/// ```
/// use leadsheet::aliases::resolve_index;
///
/// let headers = vec!["Name".to_string(), "Business Email".to_string()];
/// let aliases = vec!["Email".to_string(), "Business Email".to_string()];
/// assert_eq!(resolve_index(&headers, &aliases, None), Some(1));
/// assert_eq!(resolve_index(&headers, &aliases, Some("name")), Some(0));
/// ```
pub fn resolve_index(headers: &[String], aliases: &[String], explicit: Option<&str>) -> Option<usize> {
    if let Some(explicit) = explicit.filter(|h| !h.trim().is_empty()) {
        if let Some(idx) = find_header(headers, explicit) {
            return Some(idx);
        }
    }
    match_alias(headers, aliases)
}

fn find_header(headers: &[String], wanted: &str) -> Option<usize> {
    let wanted = normalize_header(wanted);
    headers.iter().position(|h| normalize_header(h) == wanted)
}

fn match_alias(headers: &[String], aliases: &[String]) -> Option<usize> {
    aliases.iter().find_map(|alias| find_header(headers, alias))
}
