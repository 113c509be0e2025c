//! CSV export of custom-field data.
//!
//! Legacy output joins cells with bare commas and never quotes, so titles or
//! labels containing `,` `"` or newlines produce ambiguous rows. The
//! `Rfc4180` mode quotes such cells through the `csv` writer.

use std::str::FromStr;

use oppdesk_core::{CustomField, FieldRecord, FieldType, FieldValue, Opportunity, Workspace};
use serde_json::Value as JsonValue;

use crate::ServiceError;

pub const NOT_AVAILABLE: &str = "N/A";

/// Separator used when a multi-dropdown record holds several selections.
const SELECTION_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvQuoting {
    #[default]
    Legacy,
    Rfc4180,
}

impl FromStr for CsvQuoting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "legacy" | "none" => Ok(Self::Legacy),
            "rfc4180" | "standard" => Ok(Self::Rfc4180),
            other => Err(format!("unknown csv quoting mode `{other}` (expected legacy|rfc4180)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter {
    quoting: CsvQuoting,
}

impl CsvExporter {
    pub fn new(quoting: CsvQuoting) -> Self {
        Self { quoting }
    }

    /// Header row first, then one row per opportunity in the given order.
    pub fn export(&self, workspace: &Workspace, opportunities: &[Opportunity]) -> Result<String, ServiceError> {
        let fields = &workspace.custom_field_definition;
        let header = header_cells(fields);
        let rows = opportunities
            .iter()
            .map(|opportunity| row_cells(opportunity, fields))
            .collect::<Vec<_>>();

        match self.quoting {
            CsvQuoting::Legacy => Ok(legacy_document(&header, &rows)),
            CsvQuoting::Rfc4180 => quoted_document(&header, &rows),
        }
    }
}

fn header_cells(fields: &[CustomField]) -> Vec<String> {
    std::iter::once("Title".to_string())
        .chain(fields.iter().map(|field| field.name.clone()))
        .collect()
}

fn row_cells(opportunity: &Opportunity, fields: &[CustomField]) -> Vec<String> {
    std::iter::once(opportunity.title.clone())
        .chain(fields.iter().map(|field| cell_value(field, opportunity.field(&field.id))))
        .collect()
}

/// Cell for one custom field. Only `multi-dropdown` and `date` fields are
/// rendered; every other schema type (single `dropdown` and text included)
/// exports as `N/A`.
pub fn cell_value(field: &CustomField, record: Option<&FieldRecord>) -> String {
    let Some(record) = record else {
        return NOT_AVAILABLE.to_string();
    };
    if record.value.is_missing() {
        return NOT_AVAILABLE.to_string();
    }

    match field.field_type {
        // A selection key absent from the schema's options yields an empty cell.
        FieldType::MultiDropdown => selection_keys(record)
            .into_iter()
            .filter_map(|key| field.option_label(key))
            .collect::<Vec<_>>()
            .join(SELECTION_SEPARATOR),
        FieldType::Date => match (&record.value, record.raw_value()) {
            (FieldValue::Date(date), _) => date.clone(),
            (_, JsonValue::Null) => NOT_AVAILABLE.to_string(),
            (_, raw) => raw_text(raw),
        },
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Option keys of a record under a multi-dropdown column. The column's type
/// wins over the record's, so a `{value}` object stored under another type
/// still resolves.
fn selection_keys(record: &FieldRecord) -> Vec<&str> {
    let keys = record.value.option_values();
    if !keys.is_empty() {
        return keys;
    }
    record
        .raw_value()
        .get("value")
        .and_then(JsonValue::as_str)
        .into_iter()
        .collect()
}

fn raw_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn legacy_document(header: &[String], rows: &[Vec<String>]) -> String {
    // Header and body are always separated by a newline, even with no rows.
    let body = rows.iter().map(|row| legacy_line(row)).collect::<Vec<_>>().join("\n");
    format!("{}\n{}", legacy_line(header), body)
}

fn legacy_line(cells: &[String]) -> String {
    let (first, rest) = match cells.split_first() {
        Some(split) => split,
        None => return String::new(),
    };
    format!("{first},{}", rest.join(","))
}

fn quoted_document(header: &[String], rows: &[Vec<String>]) -> Result<String, ServiceError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}
