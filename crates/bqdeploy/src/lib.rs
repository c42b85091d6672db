//! bqdeploy creates and updates BigQuery datasets and views from a
//! two-level directory of SQL template files: each directory under the
//! views root is a dataset, each `.sql` file inside it becomes a view of
//! the same name, with `{placeholder}` tokens substituted before
//! submission.
//!
//! This crate provides the library API; the `bqdeploy` command line
//! interface lives in the `cmd` crate.

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod template;
pub mod walker;

pub use client::{BigQueryClient, Warehouse};
pub use config::{DEFAULT_LOCATION, DeployConfig, Profile, load_config};
pub use credentials::{ServiceAccountKey, load_service_account_key};
pub use error::{DeployError, Result};
pub use template::{Substitutions, TemplateError, substitute};
pub use walker::{DatasetSource, ViewSource, scan_views_directory};

use diagnostics::*;
use models::{Dataset, Table};
use std::path::Path;

/// What happened to a single view during deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    /// View did not exist and was created
    Created,
    /// View existed; its query text was overwritten
    Updated,
    /// View failed but the run continued (continue-on-error)
    Skipped,
}

/// Per-run tally returned by [`Deployer::deploy_directory`]
#[derive(Debug, Default, Clone, Copy)]
pub struct DeploySummary {
    pub datasets: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Main deployment driver, generic over the warehouse seam so tests can
/// record calls without a network.
pub struct Deployer<W: Warehouse> {
    warehouse: W,
    project: String,
    location: String,
}

impl<W: Warehouse> Deployer<W> {
    pub fn new(warehouse: W, project: &str, location: &str) -> Self {
        Self {
            warehouse,
            project: project.to_string(),
            location: location.to_string(),
        }
    }

    /// Create a dataset if absent; an existing dataset of the same name is
    /// left untouched and treated as success.
    pub async fn ensure_dataset(&self, name: &str) -> Result<()> {
        let dataset = Dataset::new(&self.project, name, &self.location);
        match self.warehouse.insert_dataset(&dataset).await {
            Ok(()) => {
                info!("Dataset {name} created");
                Ok(())
            }
            Err(DeployError::Conflict { .. }) => {
                info!("Dataset {name} already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Read a SQL template, substitute placeholders, and create the view,
    /// falling back to an update when the view already exists. With
    /// `keep_going` set, any failure is logged and reported as
    /// [`ViewOutcome::Skipped`] instead of aborting the run.
    pub async fn create_or_update_view(
        &self,
        dataset: &str,
        sql_path: &Path,
        substitutions: &Substitutions,
        keep_going: bool,
    ) -> Result<ViewOutcome> {
        match self
            .try_create_or_update_view(dataset, sql_path, substitutions)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) if keep_going => {
                let path = sql_path.display().to_string();
                let reason = e.to_string();
                warn!("Failed to deploy view from {path}: {reason}");
                Ok(ViewOutcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    async fn try_create_or_update_view(
        &self,
        dataset: &str,
        sql_path: &Path,
        substitutions: &Substitutions,
    ) -> Result<ViewOutcome> {
        let sql_template =
            std::fs::read_to_string(sql_path).map_err(|e| DeployError::ReadFailure {
                path: sql_path.to_path_buf(),
                source: e,
            })?;

        let query = substitute(&sql_template, substitutions).map_err(|e| {
            DeployError::MalformedTemplate {
                path: sql_path.to_path_buf(),
                source: e,
            }
        })?;

        let view_name = sql_path
            .file_stem()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DeployError::InvalidLayout {
                path: sql_path.to_path_buf(),
                message: "file name is not valid UTF-8".to_string(),
            })?;

        let table = Table::view(&self.project, dataset, view_name, query);
        let full_id = table.table_reference.full_id();

        match self.warehouse.insert_view(&table).await {
            Ok(()) => {
                info!("Successfully created view at {full_id}");
                Ok(ViewOutcome::Created)
            }
            Err(DeployError::Conflict { .. }) => {
                self.warehouse.patch_view(&table).await?;
                info!("Successfully updated view at {full_id}");
                Ok(ViewOutcome::Updated)
            }
            Err(e) => Err(e),
        }
    }

    /// Walk a two-level views directory, ensuring one dataset per
    /// subdirectory and one view per `.sql` file inside it. Traversal is
    /// in sorted name order. Dataset failures always abort; view failures
    /// abort unless `keep_going` is set.
    pub async fn deploy_directory(
        &self,
        views_directory: &Path,
        substitutions: &Substitutions,
        keep_going: bool,
    ) -> Result<DeploySummary> {
        let root = views_directory.display().to_string();
        info!("Deploying views from {root}");

        let datasets = scan_views_directory(views_directory)?;
        let mut summary = DeploySummary::default();

        for dataset in &datasets {
            self.ensure_dataset(&dataset.name).await?;
            summary.datasets += 1;

            for view in &dataset.views {
                let path = view.path.display().to_string();
                debug!("Deploying view from {path}");
                match self
                    .create_or_update_view(&dataset.name, &view.path, substitutions, keep_going)
                    .await?
                {
                    ViewOutcome::Created => summary.created += 1,
                    ViewOutcome::Updated => summary.updated += 1,
                    ViewOutcome::Skipped => summary.skipped += 1,
                }
            }
        }

        let (created, updated, skipped) = (summary.created, summary.updated, summary.skipped);
        info!("Deployment complete: {created} created, {updated} updated, {skipped} skipped");
        Ok(summary)
    }
}
