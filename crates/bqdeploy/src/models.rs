//! BigQuery REST resource representations.

use serde::{Deserialize, Serialize};

/// Dataset identity triple (project + dataset)
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub project_id: String,
    pub dataset_id: String,
}

/// Dataset resource body for the datasets.insert call
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub dataset_reference: DatasetReference,
    pub description: String,
    pub location: String,
}

impl Dataset {
    /// New dataset with an empty description, mirroring what gets deployed
    pub fn new(project: &str, name: &str, location: &str) -> Self {
        Self {
            dataset_reference: DatasetReference {
                project_id: project.to_string(),
                dataset_id: name.to_string(),
            },
            description: String::new(),
            location: location.to_string(),
        }
    }
}

/// Table identity triple (project + dataset + table)
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableReference {
    /// `project.dataset.table` form for logs and error messages
    pub fn full_id(&self) -> String {
        format!(
            "{}.{}.{}",
            self.project_id, self.dataset_id, self.table_id
        )
    }
}

/// Stored query definition within a table resource
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    pub query: String,
    pub use_legacy_sql: bool,
}

/// Table resource body for the tables.insert call (view variant only)
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub table_reference: TableReference,
    pub view: ViewDefinition,
}

impl Table {
    /// New view-backed table with the given query text
    pub fn view(project: &str, dataset: &str, name: &str, query: String) -> Self {
        Self {
            table_reference: TableReference {
                project_id: project.to_string(),
                dataset_id: dataset.to_string(),
                table_id: name.to_string(),
            },
            view: ViewDefinition {
                query,
                use_legacy_sql: false,
            },
        }
    }
}

/// Partial table body for the tables.patch call: only the view query changes
#[derive(Serialize, Debug, Clone)]
pub struct ViewPatch<'a> {
    pub view: &'a ViewDefinition,
}

/// OAuth token endpoint response
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

/// Error body returned by Google APIs
#[derive(Deserialize, Debug)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Deserialize, Debug)]
pub struct ApiErrorDetail {
    pub code: Option<u16>,
    pub message: String,
    pub status: Option<String>,
}
