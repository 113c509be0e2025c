//! Filtered search: field filters compiled into a conjunctive predicate.

use oppdesk_core::{FieldType, Filter, Opportunity, OpportunityData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPredicate {
    /// Case-insensitive substring match on a string-valued field.
    Contains { field_id: String, needle: String },
    /// Exact, case-sensitive match on a field's stored key.
    Equals { field_id: String, value: String },
}

impl FieldPredicate {
    pub fn field_id(&self) -> &str {
        match self {
            Self::Contains { field_id, .. } | Self::Equals { field_id, .. } => field_id,
        }
    }

    pub fn matches(&self, data: &OpportunityData) -> bool {
        let Some(record) = data.get(self.field_id()) else {
            return false;
        };
        match self {
            Self::Contains { needle, .. } => record
                .raw_value()
                .as_str()
                .is_some_and(|text| text.to_lowercase().contains(needle.as_str())),
            Self::Equals { value, .. } => {
                record.raw_value().as_str() == Some(value.as_str())
                    || record.value.option_values().contains(&value.as_str())
            }
        }
    }
}

/// Conjunction of field predicates. An empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    predicates: Vec<FieldPredicate>,
}

impl FilterQuery {
    /// Filters with a type other than text or dropdown add no constraint.
    pub fn from_filters(filters: &[Filter]) -> Self {
        let predicates = filters
            .iter()
            .filter_map(|filter| match filter.field_type {
                FieldType::ShortText | FieldType::Name => Some(FieldPredicate::Contains {
                    field_id: filter.id.clone(),
                    needle: filter.value.to_lowercase(),
                }),
                FieldType::Dropdown | FieldType::MultiDropdown => Some(FieldPredicate::Equals {
                    field_id: filter.id.clone(),
                    value: filter.value.clone(),
                }),
                _ => None,
            })
            .collect();
        Self { predicates }
    }

    pub fn predicates(&self) -> &[FieldPredicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, opportunity: &Opportunity) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.matches(&opportunity.opportunity_data))
    }

    pub fn apply(&self, opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
        opportunities.into_iter().filter(|o| self.matches(o)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oppdesk_core::FieldRecord;
    use serde_json::json;

    fn filter(id: &str, field_type: &str, value: &str) -> Filter {
        Filter {
            id: id.to_string(),
            field_type: FieldType::from(field_type),
            value: value.to_string(),
        }
    }

    fn opportunity(id: &str, data: OpportunityData) -> Opportunity {
        Opportunity {
            id: id.to_string(),
            title: format!("Opportunity {id}"),
            opportunity_data: data,
        }
    }

    fn sample() -> Vec<Opportunity> {
        vec![
            opportunity(
                "1",
                OpportunityData::new()
                    .with("description", FieldRecord::new("short-text", json!("Prototype build")))
                    .with("status", FieldRecord::new("dropdown", json!({"value": "open", "label": "Open"}))),
            ),
            opportunity(
                "2",
                OpportunityData::new()
                    .with("description", FieldRecord::new("short-text", json!("TYPING speed test")))
                    .with("status", FieldRecord::new("dropdown", json!({"value": "closed", "label": "Closed"}))),
            ),
            opportunity(
                "3",
                OpportunityData::new()
                    .with("description", FieldRecord::new("short-text", json!("Unrelated")))
                    .with("cf1", FieldRecord::new("multi-dropdown", json!({"value": "opt1"}))),
            ),
        ]
    }

    fn ids(opportunities: &[Opportunity]) -> Vec<&str> {
        opportunities.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn text_filter_is_case_insensitive_contains() {
        let query = FilterQuery::from_filters(&[filter("description", "short-text", "typ")]);
        assert_eq!(ids(&query.apply(sample())), vec!["1", "2"]);

        let query = FilterQuery::from_filters(&[filter("description", "name", "PROTO")]);
        assert_eq!(ids(&query.apply(sample())), vec!["1"]);
    }

    #[test]
    fn dropdown_filter_matches_stored_key_exactly() {
        let query = FilterQuery::from_filters(&[filter("status", "dropdown", "open")]);
        assert_eq!(ids(&query.apply(sample())), vec!["1"]);

        let query = FilterQuery::from_filters(&[filter("status", "dropdown", "Open")]);
        assert!(query.apply(sample()).is_empty());

        let query = FilterQuery::from_filters(&[filter("cf1", "multi-dropdown", "opt1")]);
        assert_eq!(ids(&query.apply(sample())), vec!["3"]);
    }

    #[test]
    fn filters_combine_with_and() {
        let query = FilterQuery::from_filters(&[
            filter("description", "short-text", "typ"),
            filter("status", "dropdown", "closed"),
        ]);
        assert_eq!(ids(&query.apply(sample())), vec!["2"]);
    }

    #[test]
    fn unknown_filter_types_add_no_constraint() {
        let query = FilterQuery::from_filters(&[
            filter("due", "date", "2021-01-01"),
            filter("anything", "checkbox", "true"),
        ]);
        assert!(query.is_empty());
        assert_eq!(ids(&query.apply(sample())), vec!["1", "2", "3"]);
    }

    #[test]
    fn absent_field_never_matches() {
        let query = FilterQuery::from_filters(&[filter("owner", "name", "")]);
        assert!(query.apply(sample()).is_empty());
    }

    #[test]
    fn text_filter_ignores_non_string_values() {
        let query = FilterQuery::from_filters(&[filter("status", "short-text", "open")]);
        assert!(query.apply(sample()).is_empty());
    }
}
