//! End-to-end deployment tests against a recording warehouse.

use async_trait::async_trait;
use bqdeploy::models::{Dataset, Table};
use bqdeploy::{DeployError, Deployer, Result, Substitutions, ViewOutcome, Warehouse};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::tempdir;

/// Records every call and simulates existing/broken resources.
#[derive(Default)]
struct MockWarehouse {
    calls: Mutex<Vec<String>>,
    existing_datasets: Mutex<HashSet<String>>,
    existing_views: Mutex<HashSet<String>>,
    /// Views whose creation fails with a server error
    broken_views: HashSet<String>,
    /// Views whose update fails with a permission error
    forbidden_views: HashSet<String>,
    queries: Mutex<HashMap<String, String>>,
}

impl MockWarehouse {
    fn with_existing_view(mut self, full_id: &str) -> Self {
        self.existing_views
            .get_mut()
            .unwrap()
            .insert(full_id.to_string());
        self
    }

    fn with_broken_view(mut self, full_id: &str) -> Self {
        self.broken_views.insert(full_id.to_string());
        self
    }

    fn with_forbidden_view(mut self, full_id: &str) -> Self {
        self.forbidden_views.insert(full_id.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn query_of(&self, full_id: &str) -> Option<String> {
        self.queries.lock().unwrap().get(full_id).cloned()
    }
}

#[async_trait]
impl Warehouse for &MockWarehouse {
    async fn insert_dataset(&self, dataset: &Dataset) -> Result<()> {
        let name = dataset.dataset_reference.dataset_id.clone();
        self.calls.lock().unwrap().push(format!("dataset:{name}"));
        let mut existing = self.existing_datasets.lock().unwrap();
        if !existing.insert(name.clone()) {
            return Err(DeployError::Conflict { resource: name });
        }
        Ok(())
    }

    async fn insert_view(&self, table: &Table) -> Result<()> {
        let full_id = table.table_reference.full_id();
        self.calls.lock().unwrap().push(format!("create:{full_id}"));
        if self.broken_views.contains(&full_id) {
            return Err(DeployError::Api {
                status: 500,
                message: "backend error".to_string(),
            });
        }
        let mut existing = self.existing_views.lock().unwrap();
        if !existing.insert(full_id.clone()) {
            return Err(DeployError::Conflict { resource: full_id });
        }
        self.queries
            .lock()
            .unwrap()
            .insert(full_id, table.view.query.clone());
        Ok(())
    }

    async fn patch_view(&self, table: &Table) -> Result<()> {
        let full_id = table.table_reference.full_id();
        self.calls.lock().unwrap().push(format!("update:{full_id}"));
        if self.forbidden_views.contains(&full_id) {
            return Err(DeployError::PermissionDenied {
                resource: full_id,
                message: "billing is not enabled".to_string(),
            });
        }
        self.queries
            .lock()
            .unwrap()
            .insert(full_id, table.view.query.clone());
        Ok(())
    }
}

fn write_sql(root: &Path, dataset: &str, view: &str, sql: &str) {
    let dir = root.join(dataset);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{view}.sql")), sql).unwrap();
}

fn subs(pairs: &[(&str, &str)]) -> Substitutions {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_dataset_creation_is_idempotent() -> anyhow::Result<()> {
    let mock = MockWarehouse::default();
    let deployer = Deployer::new(&mock, "acme", "EU");

    deployer.ensure_dataset("sales").await?;
    // Second call hits a conflict and is still success
    deployer.ensure_dataset("sales").await?;

    assert_eq!(mock.calls(), vec!["dataset:sales", "dataset:sales"]);
    Ok(())
}

#[tokio::test]
async fn test_worked_example_renders_and_deploys() -> anyhow::Result<()> {
    let dir = tempdir()?;
    write_sql(
        dir.path(),
        "sales",
        "top_customers",
        "SELECT * FROM {project}.sales.orders",
    );

    let mock = MockWarehouse::default();
    let deployer = Deployer::new(&mock, "acme", "EU");
    let summary = deployer
        .deploy_directory(dir.path(), &subs(&[("project", "acme")]), false)
        .await?;

    assert_eq!(summary.datasets, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(
        mock.query_of("acme.sales.top_customers").as_deref(),
        Some("SELECT * FROM acme.sales.orders")
    );
    Ok(())
}

#[tokio::test]
async fn test_call_counts_and_traversal_order() -> anyhow::Result<()> {
    let dir = tempdir()?;
    // Two datasets with two files each; names chosen so sorted order
    // differs from creation order.
    write_sql(dir.path(), "sales", "zeta", "SELECT 1");
    write_sql(dir.path(), "sales", "alpha", "SELECT 2");
    write_sql(dir.path(), "analytics", "sessions", "SELECT 3");
    write_sql(dir.path(), "analytics", "events", "SELECT 4");

    let mock = MockWarehouse::default();
    let deployer = Deployer::new(&mock, "acme", "EU");
    let summary = deployer
        .deploy_directory(dir.path(), &Substitutions::new(), false)
        .await?;

    assert_eq!(summary.datasets, 2);
    assert_eq!(summary.created, 4);
    // Exactly N dataset calls and N*M view calls, datasets and views
    // each in sorted order.
    assert_eq!(
        mock.calls(),
        vec![
            "dataset:analytics",
            "create:acme.analytics.events",
            "create:acme.analytics.sessions",
            "dataset:sales",
            "create:acme.sales.alpha",
            "create:acme.sales.zeta",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_existing_view_is_updated() -> anyhow::Result<()> {
    let dir = tempdir()?;
    write_sql(dir.path(), "sales", "top_customers", "SELECT {n}");

    let mock = MockWarehouse::default().with_existing_view("acme.sales.top_customers");
    let deployer = Deployer::new(&mock, "acme", "EU");
    let summary = deployer
        .deploy_directory(dir.path(), &subs(&[("n", "42")]), false)
        .await?;

    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(
        mock.calls(),
        vec![
            "dataset:sales",
            "create:acme.sales.top_customers",
            "update:acme.sales.top_customers",
        ]
    );
    assert_eq!(
        mock.query_of("acme.sales.top_customers").as_deref(),
        Some("SELECT 42")
    );
    Ok(())
}

#[tokio::test]
async fn test_keep_going_continues_past_failure() -> anyhow::Result<()> {
    let dir = tempdir()?;
    write_sql(dir.path(), "sales", "a_broken", "SELECT 1");
    write_sql(dir.path(), "sales", "b_fine", "SELECT 2");
    write_sql(dir.path(), "sales", "c_fine", "SELECT 3");

    let mock = MockWarehouse::default().with_broken_view("acme.sales.a_broken");
    let deployer = Deployer::new(&mock, "acme", "EU");
    let summary = deployer
        .deploy_directory(dir.path(), &Substitutions::new(), true)
        .await?;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.created, 2);
    // The views after the failing one were still attempted
    assert!(mock.calls().contains(&"create:acme.sales.b_fine".to_string()));
    assert!(mock.calls().contains(&"create:acme.sales.c_fine".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let dir = tempdir().unwrap();
    write_sql(dir.path(), "sales", "a_broken", "SELECT 1");
    write_sql(dir.path(), "sales", "b_fine", "SELECT 2");

    let mock = MockWarehouse::default().with_broken_view("acme.sales.a_broken");
    let deployer = Deployer::new(&mock, "acme", "EU");
    let err = deployer
        .deploy_directory(dir.path(), &Substitutions::new(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Api { status: 500, .. }));
    // Nothing after the failing view was attempted
    assert_eq!(
        mock.calls(),
        vec!["dataset:sales", "create:acme.sales.a_broken"]
    );
}

#[tokio::test]
async fn test_permission_denied_on_update_respects_flag() -> anyhow::Result<()> {
    let dir = tempdir()?;
    write_sql(dir.path(), "sales", "locked", "SELECT 1");

    // Fail-fast: the permission error surfaces with its own kind
    let mock = MockWarehouse::default()
        .with_existing_view("acme.sales.locked")
        .with_forbidden_view("acme.sales.locked");
    let deployer = Deployer::new(&mock, "acme", "EU");
    let err = deployer
        .deploy_directory(dir.path(), &Substitutions::new(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::PermissionDenied { .. }));

    // Continue-on-error: logged and skipped
    let mock = MockWarehouse::default()
        .with_existing_view("acme.sales.locked")
        .with_forbidden_view("acme.sales.locked");
    let deployer = Deployer::new(&mock, "acme", "EU");
    let summary = deployer
        .deploy_directory(dir.path(), &Substitutions::new(), true)
        .await?;
    assert_eq!(summary.skipped, 1);
    Ok(())
}

#[tokio::test]
async fn test_unresolved_placeholder_is_malformed_template() {
    let dir = tempdir().unwrap();
    write_sql(dir.path(), "sales", "bad", "SELECT * FROM {nowhere}.t");

    let mock = MockWarehouse::default();
    let deployer = Deployer::new(&mock, "acme", "EU");
    let err = deployer
        .deploy_directory(dir.path(), &Substitutions::new(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::MalformedTemplate { .. }));
    // The broken template never reached the warehouse
    assert_eq!(mock.calls(), vec!["dataset:sales"]);
}

#[tokio::test]
async fn test_nested_directory_aborts_before_any_call() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("sales/archive")).unwrap();

    let mock = MockWarehouse::default();
    let deployer = Deployer::new(&mock, "acme", "EU");
    let err = deployer
        .deploy_directory(dir.path(), &Substitutions::new(), true)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::InvalidLayout { .. }));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_single_view_outcome_is_created() -> anyhow::Result<()> {
    let dir = tempdir()?;
    write_sql(dir.path(), "sales", "v", "SELECT 1");

    let mock = MockWarehouse::default();
    let deployer = Deployer::new(&mock, "acme", "EU");
    deployer.ensure_dataset("sales").await?;
    let outcome = deployer
        .create_or_update_view(
            "sales",
            &dir.path().join("sales/v.sql"),
            &Substitutions::new(),
            false,
        )
        .await?;

    assert_eq!(outcome, ViewOutcome::Created);
    Ok(())
}
