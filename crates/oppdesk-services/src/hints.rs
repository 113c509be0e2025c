//! Hint generation: observed values per field, for search UI affordances.

use std::collections::{BTreeMap, BTreeSet};

use oppdesk_core::{FieldType, Opportunity, Workspace};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldHint {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub values: BTreeSet<String>,
}

/// Hints keyed by field id.
pub type Hints = BTreeMap<String, FieldHint>;

/// Accumulates hints over opportunities, one record at a time.
///
/// Entries first seen as `dropdown` or `multi-dropdown` keep collecting every
/// observed label. Any other entry is replaced on each sighting, so text
/// fields (`short-text`, `name`) only report the most recently seen value.
/// That last-value behaviour is a known limitation pending product input.
pub struct HintGenerator<'a> {
    workspace: &'a Workspace,
    hints: Hints,
}

impl<'a> HintGenerator<'a> {
    pub fn new(workspace: &'a Workspace) -> Self {
        Self {
            workspace,
            hints: Hints::new(),
        }
    }

    pub fn observe(&mut self, opportunity: &Opportunity) {
        for (field_id, record) in opportunity.opportunity_data.iter() {
            if record.value.is_missing() || !record.field_type.is_hintable() {
                continue;
            }
            for value in record.value.hint_values() {
                self.add_value(field_id, &record.field_type, value);
            }
        }
    }

    fn add_value(&mut self, field_id: &str, field_type: &FieldType, value: &str) {
        match self.hints.get_mut(field_id) {
            Some(existing) if existing.field_type.is_aggregable() => {
                existing.values.insert(value.to_string());
            }
            _ => {
                self.hints.insert(
                    field_id.to_string(),
                    FieldHint {
                        name: self.workspace.display_name(field_id).to_string(),
                        field_type: field_type.clone(),
                        values: BTreeSet::from([value.to_string()]),
                    },
                );
            }
        }
    }

    pub fn finish(self) -> Hints {
        self.hints
    }
}

pub fn generate_hints(workspace: &Workspace, opportunities: &[Opportunity]) -> Hints {
    let mut generator = HintGenerator::new(workspace);
    for opportunity in opportunities {
        generator.observe(opportunity);
    }
    generator.finish()
}
