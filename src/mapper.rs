//! Projection of parsed rows into normalized lead records.

use crate::aliases::{FieldTable, resolve_index};
use crate::loader::{CellValue, ParsedSheet};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Explicit column choices made by the user: field key -> header name.
///
/// Fields not present (or mapped to a blank string) fall back to alias
/// matching.
pub type MappingSelection = HashMap<String, String>;

/// One normalized lead: field key -> cell text, in field table order.
///
/// Every configured field is present; unresolved or missing cells are empty
/// strings. Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadRecord {
    pub values: Vec<(String, String)>,
}

impl LeadRecord {
    pub fn get(&self, key: &str) -> &str {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for LeadRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.values.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de> Deserialize<'de> for LeadRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = LeadRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field keys to strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<LeadRecord, A::Error> {
                let mut values = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, String>()? {
                    values.push(entry);
                }
                Ok(LeadRecord { values })
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Column index per field, resolved once for a whole import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    columns: Vec<(String, Option<usize>)>,
}

impl ColumnPlan {
    pub fn resolve(table: &FieldTable, headers: &[String], selection: &MappingSelection) -> Self {
        let columns = table
            .fields()
            .iter()
            .map(|field| {
                let explicit = selection.get(&field.key).map(String::as_str);
                (
                    field.key.clone(),
                    resolve_index(headers, &field.aliases, explicit),
                )
            })
            .collect();
        ColumnPlan { columns }
    }

    /// Resolved column for a field key.
    pub fn column_for(&self, key: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, idx)| *idx)
    }

    pub fn project(&self, row: &[CellValue]) -> LeadRecord {
        let values = self
            .columns
            .iter()
            .map(|(key, idx)| {
                let text = idx
                    .and_then(|i| row.get(i))
                    .map(|cell| cell.to_string().trim().to_string())
                    .unwrap_or_default();
                (key.clone(), text)
            })
            .collect();
        LeadRecord { values }
    }
}

/// Map every data row of `sheet` onto the configured fields.
pub fn map_rows(table: &FieldTable, sheet: &ParsedSheet, selection: &MappingSelection) -> Vec<LeadRecord> {
    let plan = ColumnPlan::resolve(table, &sheet.headers, selection);
    sheet.rows.iter().map(|row| plan.project(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aliases::MappableField;
    use crate::loader::{SheetFormat, parse};

    fn table() -> FieldTable {
        FieldTable::new(vec![
            MappableField::new("name", "Name", &["name", "full name"]),
            MappableField::new("email", "Email", &["email", "business email"]),
            MappableField::new("phone", "Phone", &["phone"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_map_rows_with_aliases() {
        let sheet = parse(
            b"Full Name,Business Email\n Alice ,a@x.com\nBob\n",
            SheetFormat::Csv,
        )
        .unwrap();
        let records = map_rows(&table(), &sheet, &MappingSelection::new());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("name"), "Alice");
        assert_eq!(records[0].get("email"), "a@x.com");
        assert_eq!(records[0].get("phone"), "");
        assert_eq!(records[1].get("email"), "");
        assert_eq!(records[1].values.len(), 3);
    }

    #[test]
    fn test_explicit_selection_wins() {
        let sheet = parse(b"Email,Contact\nold@x.com,new@x.com\n", SheetFormat::Csv).unwrap();
        let mut selection = MappingSelection::new();
        selection.insert("email".into(), "contact".into());

        let records = map_rows(&table(), &sheet, &selection);
        assert_eq!(records[0].get("email"), "new@x.com");
    }

    #[test]
    fn test_plan_resolved_once() {
        let headers = vec!["phone".to_string(), "email".to_string()];
        let plan = ColumnPlan::resolve(&table(), &headers, &MappingSelection::new());
        assert_eq!(plan.column_for("phone"), Some(0));
        assert_eq!(plan.column_for("email"), Some(1));
        assert_eq!(plan.column_for("name"), None);
        assert_eq!(plan.column_for("unknown"), None);
    }

    #[test]
    fn test_project_handles_short_rows() {
        let headers = vec!["name".to_string(), "email".to_string()];
        let plan = ColumnPlan::resolve(&table(), &headers, &MappingSelection::new());
        let record = plan.project(&[CellValue::Int(42)]);
        assert_eq!(record.get("name"), "42");
        assert_eq!(record.get("email"), "");
    }

    #[test]
    fn test_record_follows_field_order() {
        let table = FieldTable::builtin();
        let sheet = parse(b"Email\na@x.com\n", SheetFormat::Csv).unwrap();
        let records = map_rows(&table, &sheet, &MappingSelection::new());

        let declared: Vec<&str> = table.fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(records[0].keys().collect::<Vec<_>>(), declared);

        let json = serde_json::to_string(&records[0]).unwrap();
        assert!(json.starts_with(r#"{"first_name":"","last_name":"","full_name":"","email":"a@x.com""#));

        let back: LeadRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, records[0]);
    }
}
