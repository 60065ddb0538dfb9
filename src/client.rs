// Atlas — client.rs
// Blocking HTTP client for the Atlas API and the remote dataset session.
// Author: d65v <https://github.com/d65v>

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::record::{EmbeddedRecord, Record};
use crate::upload::{
    DatasetProvider, DatasetSession, DatasetSpec, IndexHandle, IndexRequest, Modality,
};
use crate::{AtlasConfig, AtlasError, Result};

// ── Wire Types ────────────────────────────────────────────────────────────────

/// Dataset metadata as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    #[serde(rename = "project_name")]
    pub name: String,
    #[serde(default)]
    pub organization_slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub unique_id_field: String,
    pub modality: Modality,
    #[serde(default)]
    pub is_public: bool,
    #[serde(rename = "total_datums_in_project", default)]
    pub total_datums: u64,
}

#[derive(Debug, Serialize)]
struct NameLookup<'a> {
    organization_slug: Option<&'a str>,
    project_name: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateDataset<'a> {
    organization_slug: Option<&'a str>,
    project_name: &'a str,
    description: &'a str,
    unique_id_field: &'a str,
    modality: Modality,
    is_public: bool,
}

#[derive(Debug, Serialize)]
struct ProjectRef<'a> {
    project_id: &'a str,
}

#[derive(Debug, Serialize)]
struct AddText<'a> {
    project_id: &'a str,
    data: &'a [Record],
}

#[derive(Debug, Serialize)]
struct AddEmbeddings<'a> {
    project_id: &'a str,
    data: Vec<&'a Record>,
    embeddings: Vec<&'a [f32]>,
}

#[derive(Debug, Serialize)]
struct CreateIndex<'a> {
    project_id: &'a str,
    #[serde(flatten)]
    request: &'a IndexRequest,
}

/// Split `org/name` into its parts; a bare name has no organization.
pub fn split_identifier(identifier: &str) -> (Option<&str>, &str) {
    match identifier.split_once('/') {
        Some((org, name)) if !org.is_empty() => (Some(org), name),
        Some((_, name)) => (None, name),
        None => (None, identifier),
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Authenticated connection to the Atlas API.
#[derive(Debug, Clone)]
pub struct AtlasClient {
    http: Client,
    base_url: String,
    org_slug: Option<String>,
}

impl AtlasClient {
    /// Build a client from config.
    ///
    /// # Errors
    /// Returns `AtlasError::Config` if the config is unusable.
    pub fn new(config: &AtlasConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| AtlasError::Config(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, token);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            org_slug: config.org_slug.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().unwrap_or_default();
        Err(AtlasError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.http.get(self.url(path)).send()?;
        Ok(Self::check(response)?.json()?)
    }

    fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.http.post(self.url(path)).json(body).send()?;
        Ok(Self::check(response)?.json()?)
    }

    fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let response = self.http.post(self.url(path)).json(body).send()?;
        Self::check(response)?;
        Ok(())
    }

    fn org_for<'a>(&'a self, identifier: &'a str) -> (Option<&'a str>, &'a str) {
        let (org, name) = split_identifier(identifier);
        (org.or(self.org_slug.as_deref()), name)
    }

    /// Look a dataset up by `name` or `org/name`. `Ok(None)` if it does not exist.
    pub fn find_dataset(&self, identifier: &str) -> Result<Option<DatasetInfo>> {
        let (organization_slug, project_name) = self.org_for(identifier);
        let body = NameLookup {
            organization_slug,
            project_name,
        };
        let response = self
            .http
            .post(self.url("/v1/project/search/name"))
            .json(&body)
            .send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::check(response)?.json()?))
    }

    pub fn dataset_info(&self, id: &str) -> Result<DatasetInfo> {
        self.get(&format!("/v1/project/{}", id))
    }

    pub fn create_dataset(&self, spec: &DatasetSpec) -> Result<DatasetInfo> {
        let (organization_slug, project_name) = self.org_for(&spec.identifier);
        let body = CreateDataset {
            organization_slug,
            project_name,
            description: &spec.description,
            unique_id_field: &spec.unique_id_field,
            modality: spec.modality,
            is_public: spec.is_public,
        };
        let info: DatasetInfo = self.post("/v1/project/create", &body)?;
        log::info!("Creating dataset `{}` ({})", info.name, info.id);
        Ok(info)
    }

    pub fn delete_dataset(&self, id: &str) -> Result<()> {
        self.post_unit("/v1/project/remove", &ProjectRef { project_id: id })
    }
}

impl DatasetProvider for AtlasClient {
    type Session = AtlasDataset;

    /// Open `spec.identifier`, creating it when missing.
    ///
    /// An existing dataset is reset when `reset_if_exists` is set, reused when
    /// `add_if_exists` is set, and rejected otherwise.
    fn create_or_open(&self, spec: &DatasetSpec) -> Result<AtlasDataset> {
        if spec.reset_if_exists && spec.add_if_exists {
            return Err(AtlasError::validation(
                "reset_project_if_exists and add_datums_if_exists cannot both be set",
            ));
        }

        let info = match self.find_dataset(&spec.identifier)? {
            None => self.create_dataset(spec)?,
            Some(existing) if spec.reset_if_exists => {
                log::info!("Resetting existing dataset `{}`", existing.name);
                self.delete_dataset(&existing.id)?;
                self.create_dataset(spec)?
            }
            Some(existing) if spec.add_if_exists => {
                if existing.unique_id_field != spec.unique_id_field {
                    return Err(AtlasError::validation(format!(
                        "dataset `{}` uses id field `{}`, not `{}`",
                        existing.name, existing.unique_id_field, spec.unique_id_field
                    )));
                }
                if existing.modality != spec.modality {
                    return Err(AtlasError::validation(format!(
                        "dataset `{}` holds {:?} data, cannot add {:?} data",
                        existing.name, existing.modality, spec.modality
                    )));
                }
                log::info!(
                    "Adding to existing dataset `{}` ({} datums)",
                    existing.name,
                    existing.total_datums
                );
                existing
            }
            Some(existing) => {
                return Err(AtlasError::DatasetExists {
                    name: existing.name,
                })
            }
        };

        Ok(AtlasDataset {
            client: self.clone(),
            info,
        })
    }
}

// ── Dataset Session ───────────────────────────────────────────────────────────

/// A dataset on the Atlas server.
#[derive(Debug, Clone)]
pub struct AtlasDataset {
    client: AtlasClient,
    info: DatasetInfo,
}

impl AtlasDataset {
    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }
}

impl DatasetSession for AtlasDataset {
    fn identifier(&self) -> &str {
        &self.info.name
    }

    /// Count as of the last fetch; read before the first batch of an upload.
    fn total_datums(&self) -> Result<u64> {
        Ok(self.info.total_datums)
    }

    fn add_records(&mut self, batch: &[Record]) -> Result<()> {
        let body = AddText {
            project_id: &self.info.id,
            data: batch,
        };
        self.client.post_unit("/v1/project/data/add/json", &body)
    }

    fn add_embeddings(&mut self, batch: &[EmbeddedRecord]) -> Result<()> {
        let body = AddEmbeddings {
            project_id: &self.info.id,
            data: batch.iter().map(|r| &r.fields).collect(),
            embeddings: batch.iter().map(|r| r.embedding.as_slice()).collect(),
        };
        self.client.post_unit("/v1/project/data/add/embedding", &body)
    }

    fn delete(&mut self) -> Result<()> {
        self.client.delete_dataset(&self.info.id)
    }

    fn create_index(&mut self, request: &IndexRequest) -> Result<IndexHandle> {
        let body = CreateIndex {
            project_id: &self.info.id,
            request,
        };
        let handle: IndexHandle = self.client.post("/v1/project/index/create", &body)?;
        log::info!("Created map `{}` ({})", handle.name, handle.id);
        Ok(handle)
    }

    fn rebuild_maps(&mut self) -> Result<()> {
        let body = ProjectRef {
            project_id: &self.info.id,
        };
        self.client.post_unit("/v1/project/update_indices", &body)
    }

    fn refresh(&mut self) -> Result<()> {
        self.info = self.client.dataset_info(&self.info.id)?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_identifier() {
        assert_eq!(split_identifier("org/map"), (Some("org"), "map"));
        assert_eq!(split_identifier("map"), (None, "map"));
        assert_eq!(split_identifier("/map"), (None, "map"));
    }

    #[test]
    fn test_client_needs_key() {
        let err = AtlasClient::new(&AtlasConfig::default()).unwrap_err();
        assert!(matches!(err, AtlasError::Config(_)));
    }

    #[test]
    fn test_dataset_info_wire_names() {
        let info: DatasetInfo = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "project_name": "news",
            "unique_id_field": "id_",
            "modality": "text",
            "total_datums_in_project": 42
        }))
        .unwrap();
        assert_eq!(info.name, "news");
        assert_eq!(info.total_datums, 42);
        assert_eq!(info.modality, Modality::Text);
        assert!(info.organization_slug.is_none());
    }

    #[test]
    fn test_create_index_body_is_flat() {
        let request = IndexRequest {
            name: "m".into(),
            indexed_field: None,
            colorable_fields: vec!["label".into()],
            build_topic_model: false,
            topic_label_field: None,
            projection_n_neighbors: 15,
            projection_epochs: 50,
            projection_spread: 1.0,
            duplicate_detection: false,
            duplicate_threshold: 0.1,
        };
        let body = serde_json::to_value(CreateIndex {
            project_id: "p1",
            request: &request,
        })
        .unwrap();
        assert_eq!(body["project_id"], "p1");
        assert_eq!(body["projection_n_neighbors"], 15);
        assert_eq!(body["colorable_fields"][0], "label");
    }
}
