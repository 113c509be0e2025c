//! Core domain model for workspace custom fields and opportunity records.
//!
//! Both persisted blobs (`Workspace.customFieldDefinition` and
//! `Opportunity.opportunityData`) are JSON text columns. They are parsed here,
//! once, at the store boundary; everything downstream works with the typed
//! model instead of poking at raw JSON.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub const CRATE_NAME: &str = "oppdesk-core";

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed {what}: {source}")]
    MalformedData {
        what: String,
        source: serde_json::Error,
    },
}

impl CoreError {
    fn malformed(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedData {
            what: what.into(),
            source,
        }
    }
}

/// Field type tag shared by the custom-field schema and per-record values.
///
/// Unknown tags are preserved verbatim in `Other` so they survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Dropdown,
    MultiDropdown,
    ShortText,
    Name,
    Date,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Dropdown => "dropdown",
            Self::MultiDropdown => "multi-dropdown",
            Self::ShortText => "short-text",
            Self::Name => "name",
            Self::Date => "date",
            Self::Other(raw) => raw,
        }
    }

    /// Types that contribute to the hints endpoint.
    pub fn is_hintable(&self) -> bool {
        matches!(
            self,
            Self::Dropdown | Self::MultiDropdown | Self::ShortText | Self::Name
        )
    }

    /// Types whose hint entries keep accumulating values across records.
    pub fn is_aggregable(&self) -> bool {
        matches!(self, Self::Dropdown | Self::MultiDropdown)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::ShortText | Self::Name)
    }
}

impl From<String> for FieldType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "dropdown" => Self::Dropdown,
            "multi-dropdown" => Self::MultiDropdown,
            "short-text" => Self::ShortText,
            "name" => Self::Name,
            "date" => Self::Date,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for FieldType {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selectable entry of a dropdown-like custom field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<CustomFieldOption>>,
}

impl CustomField {
    pub fn option_label(&self, value: &str) -> Option<&str> {
        self.options
            .as_deref()?
            .iter()
            .find(|option| option.value == value)
            .map(|option| option.label.as_str())
    }
}

/// Tenant configuration holding the ordered custom-field schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    #[serde(default)]
    pub custom_field_definition: Vec<CustomField>,
}

impl Workspace {
    /// Build a workspace from its persisted columns.
    pub fn from_columns(id: impl Into<String>, custom_field_definition: &str) -> Result<Self, CoreError> {
        let id = id.into();
        let custom_field_definition = serde_json::from_str(custom_field_definition)
            .map_err(|err| CoreError::malformed(format!("customFieldDefinition of workspace {id}"), err))?;
        Ok(Self {
            id,
            custom_field_definition,
        })
    }

    pub fn custom_field_definition_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(&self.custom_field_definition)
            .map_err(|err| CoreError::malformed(format!("customFieldDefinition of workspace {}", self.id), err))
    }

    pub fn field(&self, id: &str) -> Option<&CustomField> {
        self.custom_field_definition.iter().find(|field| field.id == id)
    }

    /// Custom-field name for `id`, or the id itself for standard fields.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.field(id).map(|field| field.name.as_str()).unwrap_or(id)
    }
}

/// A selection stored inside a dropdown-like field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    pub value: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl SelectedOption {
    /// Label shown in hints; selections stored without a label fall back to their key.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.value)
    }
}

/// Typed view of a stored field value.
///
/// Nesting depth per type, as stored:
/// - `dropdown`: `value` is `{value, label}`
/// - `multi-dropdown`: `value` is `{value, label?}`, or an array of those
/// - `short-text` / `name`: `value` is a string
/// - `date`: `value` is an ISO date string
///
/// A shape that does not match its declared type parses as `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Dropdown(SelectedOption),
    MultiDropdown(Vec<SelectedOption>),
    Text(String),
    Date(String),
    Missing,
    Other(JsonValue),
}

impl FieldValue {
    pub fn parse(field_type: &FieldType, value: &JsonValue) -> Self {
        if value_is_missing(value) {
            return Self::Missing;
        }
        let parsed = match field_type {
            FieldType::Dropdown => serde_json::from_value(value.clone()).ok().map(Self::Dropdown),
            FieldType::MultiDropdown => parse_selections(value).map(Self::MultiDropdown),
            FieldType::ShortText | FieldType::Name => value.as_str().map(|s| Self::Text(s.to_string())),
            FieldType::Date => value.as_str().map(|s| Self::Date(s.to_string())),
            FieldType::Other(_) => None,
        };
        parsed.unwrap_or_else(|| Self::Other(value.clone()))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Option keys read one level below the record's `value`.
    pub fn option_values(&self) -> Vec<&str> {
        match self {
            Self::Dropdown(option) => vec![option.value.as_str()],
            Self::MultiDropdown(options) => options.iter().map(|o| o.value.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Values reported by the hints endpoint for this record.
    pub fn hint_values(&self) -> Vec<&str> {
        match self {
            Self::Dropdown(option) => vec![option.display_label()],
            Self::MultiDropdown(options) => options.iter().map(SelectedOption::display_label).collect(),
            Self::Text(text) => vec![text.as_str()],
            _ => Vec::new(),
        }
    }
}

fn value_is_missing(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        _ => false,
    }
}

fn parse_selections(value: &JsonValue) -> Option<Vec<SelectedOption>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(SelectedOption),
        Many(Vec<SelectedOption>),
    }

    match serde_json::from_value::<OneOrMany>(value.clone()).ok()? {
        OneOrMany::One(option) => Some(vec![option]),
        OneOrMany::Many(options) => Some(options),
    }
}

/// A `{type, value}` entry of an opportunity's field data.
///
/// The raw JSON object is kept and serialized back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub field_type: FieldType,
    pub value: FieldValue,
    raw: JsonValue,
}

impl FieldRecord {
    pub fn new(field_type: impl Into<FieldType>, value: JsonValue) -> Self {
        let field_type = field_type.into();
        let raw = serde_json::json!({ "type": field_type.as_str(), "value": value });
        Self::from_parts(field_type, raw)
    }

    fn from_parts(field_type: FieldType, raw: JsonValue) -> Self {
        // A bare value in place of the `{type, value}` object carries no type to parse against.
        let value = if raw.is_object() {
            FieldValue::parse(&field_type, raw.get("value").unwrap_or(&JsonValue::Null))
        } else {
            FieldValue::parse(&field_type, &raw)
        };
        Self {
            field_type,
            value,
            raw,
        }
    }

    /// The record's `value` exactly as stored; `Null` when the record is not an object.
    pub fn raw_value(&self) -> &JsonValue {
        self.raw.get("value").unwrap_or(&JsonValue::Null)
    }
}

impl Serialize for FieldRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = JsonValue::deserialize(deserializer)?;
        let field_type = raw
            .get("type")
            .and_then(JsonValue::as_str)
            .map(FieldType::from)
            .unwrap_or_else(|| FieldType::Other(String::new()));
        Ok(Self::from_parts(field_type, raw))
    }
}

/// Mapping from field id to its stored value. A missing id means "no value".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpportunityData(BTreeMap<String, FieldRecord>);

impl OpportunityData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, record: FieldRecord) -> Self {
        self.0.insert(id.into(), record);
        self
    }

    pub fn get(&self, id: &str) -> Option<&FieldRecord> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRecord)> {
        self.0.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub opportunity_data: OpportunityData,
}

impl Opportunity {
    /// Build an opportunity from its persisted columns.
    pub fn from_columns(
        id: impl Into<String>,
        title: impl Into<String>,
        opportunity_data: &str,
    ) -> Result<Self, CoreError> {
        let id = id.into();
        let opportunity_data = serde_json::from_str(opportunity_data)
            .map_err(|err| CoreError::malformed(format!("opportunityData of opportunity {id}"), err))?;
        Ok(Self {
            id,
            title: title.into(),
            opportunity_data,
        })
    }

    pub fn opportunity_data_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(&self.opportunity_data)
            .map_err(|err| CoreError::malformed(format!("opportunityData of opportunity {}", self.id), err))
    }

    pub fn field(&self, id: &str) -> Option<&FieldRecord> {
        self.opportunity_data.get(id)
    }
}

/// A single search constraint posted to the filtered-search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
}

/// Workspace plus opportunities loaded by the `seed` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedBundle {
    pub workspace: Workspace,
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
}

impl SeedBundle {
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(|err| CoreError::malformed("seed bundle", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture_text() -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/seed.json");
        std::fs::read_to_string(path).expect("seed fixture")
    }

    #[test]
    fn field_type_round_trips_known_and_unknown_tags() {
        let parsed: Vec<FieldType> =
            serde_json::from_value(json!(["multi-dropdown", "short-text", "long-text"])).unwrap();
        assert_eq!(
            parsed,
            vec![
                FieldType::MultiDropdown,
                FieldType::ShortText,
                FieldType::Other("long-text".into())
            ]
        );
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            json!(["multi-dropdown", "short-text", "long-text"])
        );
    }

    #[test]
    fn dropdown_value_nests_one_level() {
        let record = FieldRecord::new("dropdown", json!({"value": "open", "label": "Open"}));
        assert_eq!(record.value.option_values(), vec!["open"]);
        assert_eq!(record.value.hint_values(), vec!["Open"]);
    }

    #[test]
    fn multi_dropdown_value_nests_one_level_and_accepts_arrays() {
        let single = FieldRecord::new("multi-dropdown", json!({"value": "opt1"}));
        assert_eq!(single.value.option_values(), vec!["opt1"]);
        assert_eq!(single.value.hint_values(), vec!["opt1"]);

        let many = FieldRecord::new(
            "multi-dropdown",
            json!([{"value": "a", "label": "A"}, {"value": "b", "label": "B"}]),
        );
        assert_eq!(many.value.option_values(), vec!["a", "b"]);
        assert_eq!(many.value.hint_values(), vec!["A", "B"]);
    }

    #[test]
    fn mismatched_shapes_parse_as_other() {
        let text_as_object = FieldRecord::new("short-text", json!({"value": "x"}));
        assert!(matches!(text_as_object.value, FieldValue::Other(_)));

        let dropdown_as_string = FieldRecord::new("dropdown", json!("open"));
        assert!(matches!(dropdown_as_string.value, FieldValue::Other(_)));
        assert!(dropdown_as_string.value.option_values().is_empty());
    }

    #[test]
    fn null_and_empty_values_are_missing() {
        assert!(FieldRecord::new("short-text", json!("")).value.is_missing());
        assert!(FieldRecord::new("dropdown", JsonValue::Null).value.is_missing());
        let no_value: FieldRecord = serde_json::from_value(json!({"type": "date"})).unwrap();
        assert!(no_value.value.is_missing());
    }

    #[test]
    fn records_serialize_exactly_as_stored() {
        let stored = json!({"type": "dropdown", "value": {"value": "o", "label": "Open"}, "extra": 1});
        let record: FieldRecord = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), stored);
    }

    #[test]
    fn record_without_type_parses_as_untyped_other() {
        let opportunity = Opportunity::from_columns("o1", "Deal", r#"{"cf2": {"value": "2021-01-01"}}"#).unwrap();
        let record = opportunity.field("cf2").unwrap();
        assert_eq!(record.field_type, FieldType::Other(String::new()));
        assert_eq!(record.value, FieldValue::Other(json!("2021-01-01")));
        assert_eq!(record.raw_value(), &json!("2021-01-01"));

        let numeric_type: FieldRecord = serde_json::from_value(json!({"type": 3, "value": "x"})).unwrap();
        assert!(!numeric_type.field_type.is_hintable());
    }

    #[test]
    fn bare_value_record_is_kept_as_other() {
        let opportunity = Opportunity::from_columns("o1", "Deal", r#"{"cf2": "2021-01-01", "cf3": ""}"#).unwrap();
        let bare = opportunity.field("cf2").unwrap();
        assert_eq!(bare.value, FieldValue::Other(json!("2021-01-01")));
        assert_eq!(bare.raw_value(), &JsonValue::Null);
        assert!(opportunity.field("cf3").unwrap().value.is_missing());
        assert_eq!(
            serde_json::to_value(&opportunity.opportunity_data).unwrap(),
            json!({"cf2": "2021-01-01", "cf3": ""})
        );
    }

    #[test]
    fn invalid_data_column_reports_opportunity() {
        let err = Opportunity::from_columns("o1", "T", r#"{"cf1": "#).unwrap_err();
        assert!(err.to_string().contains("opportunityData of opportunity o1"));
    }

    #[test]
    fn malformed_schema_column_reports_workspace() {
        let err = Workspace::from_columns("ws", "not json").unwrap_err();
        assert!(matches!(err, CoreError::MalformedData { .. }));
        assert!(err.to_string().contains("workspace ws"));
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let workspace = Workspace::from_columns(
            "ws",
            r#"[{"id": "cf1", "name": "Stage", "type": "dropdown", "options": []}]"#,
        )
        .unwrap();
        assert_eq!(workspace.display_name("cf1"), "Stage");
        assert_eq!(workspace.display_name("description"), "description");
    }

    #[test]
    fn seed_fixture_parses() {
        let bundle = SeedBundle::from_json_str(&fixture_text()).unwrap();
        assert_eq!(bundle.workspace.custom_field_definition.len(), 2);
        assert_eq!(bundle.opportunities.len(), 3);
        let cf1 = bundle.workspace.field("cf1").unwrap();
        assert_eq!(cf1.option_label("opt2"), Some("Option 2 Changed"));
        assert_eq!(cf1.option_label("missing"), None);
        let opp2 = &bundle.opportunities[1];
        assert_eq!(opp2.field("cf2").unwrap().value, FieldValue::Date("2021-01-01".into()));
    }
}
