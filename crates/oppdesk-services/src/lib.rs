//! Opportunity read operations: CSV export, filtered search and field hints.
//!
//! Each operation reads the store, then transforms entirely in memory.

pub mod export;
pub mod filter;
pub mod hints;

use std::sync::Arc;

use oppdesk_core::{Filter, Opportunity, Workspace};
use oppdesk_storage::{OpportunityStore, StoreError, WorkspaceSelector};
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

pub use export::{CsvExporter, CsvQuoting};
pub use filter::{FieldPredicate, FilterQuery};
pub use hints::{generate_hints, FieldHint, HintGenerator, Hints};

pub const CRATE_NAME: &str = "oppdesk-services";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub workspace: WorkspaceSelector,
    pub csv_quoting: CsvQuoting,
}

#[derive(Clone)]
pub struct OpportunityService {
    store: Arc<dyn OpportunityStore>,
    config: ServiceConfig,
}

impl OpportunityService {
    pub fn new(store: Arc<dyn OpportunityStore>, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    async fn require_workspace(&self) -> Result<Workspace, ServiceError> {
        self.store
            .load_workspace(&self.config.workspace)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Workspace not found".to_string()))
    }

    /// CSV document of every opportunity's custom-field values.
    pub async fn export_csv(&self) -> Result<String, ServiceError> {
        let span = info_span!("export_csv", workspace = self.config.workspace.label());
        async {
            let workspace = self.require_workspace().await?;
            let opportunities = self.store.list_opportunities().await?;
            let csv = CsvExporter::new(self.config.csv_quoting).export(&workspace, &opportunities)?;
            info!(
                workspace_id = %workspace.id,
                fields = workspace.custom_field_definition.len(),
                rows = opportunities.len(),
                "exported opportunities to csv"
            );
            Ok::<_, ServiceError>(csv)
        }
        .instrument(span)
        .await
    }

    /// Opportunities whose field data satisfies every filter.
    pub async fn filtered_search(&self, filters: &[Filter]) -> Result<Vec<Opportunity>, ServiceError> {
        let span = info_span!("filtered_search", filters = filters.len());
        async {
            let query = FilterQuery::from_filters(filters);
            debug!(predicates = ?query.predicates(), "compiled filter query");
            let opportunities = self.store.list_opportunities().await?;
            let scanned = opportunities.len();
            let matched = query.apply(opportunities);
            info!(scanned, matched = matched.len(), "filtered opportunities");
            Ok::<_, ServiceError>(matched)
        }
        .instrument(span)
        .await
    }

    /// Observed values for dropdown and text fields, keyed by field id.
    pub async fn hints(&self) -> Result<Hints, ServiceError> {
        let span = info_span!("generate_hints", workspace = self.config.workspace.label());
        async {
            let workspace = self.require_workspace().await?;
            let opportunities = self.store.list_opportunities().await?;
            let hints = generate_hints(&workspace, &opportunities);
            info!(
                workspace_id = %workspace.id,
                scanned = opportunities.len(),
                fields = hints.len(),
                "generated hints"
            );
            debug!(?hints, "hint map");
            Ok::<_, ServiceError>(hints)
        }
        .instrument(span)
        .await
    }
}
