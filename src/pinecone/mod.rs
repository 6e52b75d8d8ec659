
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::{CopilotError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Distance metric used when creating a new index.
const INDEX_METRIC: &str = "cosine";
const INDEX_CLOUD: &str = "aws";
const INDEX_REGION: &str = "us-east-1";

/// Control-plane client for the Pinecone index service: list, create and
/// describe indexes by name.
///
/// Remote errors propagate unmodified; no retry is performed here.
#[derive(Debug, Clone)]
pub struct PineconeClient {
    api_base: Url,
    api_key: String,
    agent: ureq::Agent,
}

/// Data-plane client bound to one index host: upsert and nearest-neighbor
/// query.
#[derive(Debug, Clone)]
pub struct PineconeIndexClient {
    host: Url,
    api_key: String,
    agent: ureq::Agent,
}

/// One entry of a ranked query result. Vector values are never returned.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    name: String,
    host: String,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest {
    name: String,
    dimension: u32,
    metric: String,
    spec: IndexSpec,
}

#[derive(Debug, Serialize)]
struct IndexSpec {
    serverless: ServerlessSpec,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec {
    cloud: String,
    region: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    vectors: Vec<UpsertVector>,
}

#[derive(Debug, Serialize)]
struct UpsertVector {
    id: String,
    values: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    vector: Vec<f32>,
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeValues")]
    include_values: bool,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    matches: Vec<IndexMatch>,
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn index_error(action: &str, error: impl std::fmt::Display) -> CopilotError {
    CopilotError::VectorIndex(format!("{action}: {error}"))
}

impl PineconeClient {
    #[inline]
    pub fn new(config: &Config) -> Self {
        Self {
            api_base: config.pinecone.api_base.clone(),
            api_key: config.pinecone.api_key.clone(),
            agent: build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// List the names of all indexes in the project.
    #[inline]
    pub fn list_indexes(&self) -> Result<Vec<String>> {
        let list = self.fetch_index_list()?;
        Ok(list.indexes.into_iter().map(|idx| idx.name).collect())
    }

    /// Create an index with the given name and vector dimension and return
    /// its data-plane client.
    #[inline]
    pub fn create_index(&self, name: &str, dimension: u32) -> Result<PineconeIndexClient> {
        let url = self
            .api_base
            .join("/indexes")
            .map_err(|e| index_error("Failed to build create-index URL", e))?;

        let request = CreateIndexRequest {
            name: name.to_string(),
            dimension,
            metric: INDEX_METRIC.to_string(),
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: INDEX_CLOUD.to_string(),
                    region: INDEX_REGION.to_string(),
                },
            },
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| index_error("Failed to serialize create-index request", e))?;

        debug!("Creating index {} with dimension {}", name, dimension);

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Api-Key", self.api_key.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| index_error("Create-index request failed", e))?;

        let description: IndexDescription = serde_json::from_str(&response_text)
            .map_err(|e| index_error("Failed to parse create-index response", e))?;

        info!("Created index {} at {}", description.name, description.host);
        self.index_client(&description.host)
    }

    /// Look up an existing index by name and return its data-plane client.
    #[inline]
    pub fn index(&self, name: &str) -> Result<PineconeIndexClient> {
        let list = self.fetch_index_list()?;
        let description = list
            .indexes
            .into_iter()
            .find(|idx| idx.name == name)
            .ok_or_else(|| CopilotError::VectorIndex(format!("Index not found: {name}")))?;

        self.index_client(&description.host)
    }

    /// Return a data-plane client for the named index, creating the index
    /// with the given dimension if it does not exist yet.
    #[inline]
    pub fn ensure_index(&self, name: &str, dimension: u32) -> Result<PineconeIndexClient> {
        let existing = self.list_indexes()?;
        if existing.iter().any(|n| n == name) {
            debug!("Index {} already exists", name);
            self.index(name)
        } else {
            info!("Index {} not found, creating it", name);
            self.create_index(name, dimension)
        }
    }

    fn fetch_index_list(&self) -> Result<IndexList> {
        let url = self
            .api_base
            .join("/indexes")
            .map_err(|e| index_error("Failed to build list-indexes URL", e))?;

        let response_text = self
            .agent
            .get(url.as_str())
            .header("Api-Key", self.api_key.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| index_error("List-indexes request failed", e))?;

        serde_json::from_str(&response_text)
            .map_err(|e| index_error("Failed to parse index list response", e))
    }

    pub(crate) fn index_client(&self, host: &str) -> Result<PineconeIndexClient> {
        // The control plane reports a bare host name; test doubles may hand
        // back a full URL.
        let host_url = if host.contains("://") {
            Url::parse(host)
        } else {
            Url::parse(&format!("https://{host}"))
        }
        .map_err(|e| index_error("Invalid index host", e))?;

        Ok(PineconeIndexClient {
            host: host_url,
            api_key: self.api_key.clone(),
            agent: self.agent.clone(),
        })
    }
}

impl PineconeIndexClient {
    /// Store or replace the vector stored under `id`.
    #[inline]
    pub fn upsert(&self, id: &str, values: Vec<f32>) -> Result<()> {
        let url = self
            .host
            .join("/vectors/upsert")
            .map_err(|e| index_error("Failed to build upsert URL", e))?;

        let request = UpsertRequest {
            vectors: vec![UpsertVector {
                id: id.to_string(),
                values,
            }],
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| index_error("Failed to serialize upsert request", e))?;

        debug!("Upserting vector {}", id);

        self.agent
            .post(url.as_str())
            .header("Api-Key", self.api_key.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| index_error("Upsert request failed", e))?;

        Ok(())
    }

    /// Return the `top_k` nearest entries for a query vector, ranked by the
    /// index's similarity metric. Vector values are omitted, metadata is
    /// included when the index stores any.
    #[inline]
    pub fn query(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<IndexMatch>> {
        let url = self
            .host
            .join("/query")
            .map_err(|e| index_error("Failed to build query URL", e))?;

        let request = QueryRequest {
            vector,
            top_k,
            include_values: false,
            include_metadata: true,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| index_error("Failed to serialize query request", e))?;

        debug!("Querying index for top {} matches", top_k);

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Api-Key", self.api_key.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| index_error("Query request failed", e))?;

        let response: QueryResponse = serde_json::from_str(&response_text)
            .map_err(|e| index_error("Failed to parse query response", e))?;

        debug!("Query returned {} matches", response.matches.len());
        Ok(response.matches)
    }
}
