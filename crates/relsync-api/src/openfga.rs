//! OpenFGA HTTP client.
//!
//! Implements [`RelationClient`] over the OpenFGA REST API. Only the four
//! endpoints the synchronizer needs are covered: read, write,
//! batch-check, and check.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relsync_domain::{CheckItem, Tuple};
use relsync_server::config::StoreSettings;
use relsync_storage::{ReadPage, RelationClient, StoreError, StoreResult};

const READ_PAGE_SIZE: u32 = 100;

/// HTTP client for an OpenFGA-compatible store.
#[derive(Debug, Clone)]
pub struct OpenFgaClient {
    http: reqwest::Client,
    api_url: String,
    store_id: String,
    authorization_model_id: Option<String>,
}

impl OpenFgaClient {
    /// Builds a client from the store settings.
    pub fn from_settings(settings: &StoreSettings) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| StoreError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            store_id: settings.store_id.clone(),
            authorization_model_id: settings.authorization_model_id.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/stores/{}/{path}", self.api_url, self.store_id)
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> StoreResult<Resp>
    where
        Req: Serialize,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Cancelled
                } else {
                    StoreError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &body));
        }

        response.json().await.map_err(|e| StoreError::Transport {
            message: format!("failed to decode {path} response: {e}"),
        })
    }
}

/// Maps an API error response onto the store error taxonomy.
///
/// OpenFGA reports duplicate writes and missing deletes as 400-level
/// input errors with descriptive messages, so classification has to look
/// at the body.
fn classify_api_error(status: reqwest::StatusCode, body: &str) -> StoreError {
    let lowered = body.to_lowercase();
    if lowered.contains("already exists") {
        return StoreError::AlreadyExists {
            tuple: body.to_string(),
        };
    }
    if lowered.contains("cannot delete") || lowered.contains("does not exist") {
        return StoreError::NotFound {
            tuple: body.to_string(),
        };
    }
    if status == reqwest::StatusCode::CONFLICT {
        return StoreError::Conflict {
            message: body.to_string(),
        };
    }
    StoreError::Transport {
        message: format!("{status}: {body}"),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiTupleKey {
    user: String,
    relation: String,
    object: String,
}

impl From<&Tuple> for ApiTupleKey {
    fn from(tuple: &Tuple) -> Self {
        Self {
            user: tuple.user.clone(),
            relation: tuple.relation.clone(),
            object: tuple.object.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReadRequest {
    tuple_key: ReadTupleKey,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    continuation_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReadTupleKey {
    object: String,
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    tuples: Vec<ReadResponseTuple>,
    #[serde(default)]
    continuation_token: String,
}

#[derive(Debug, Deserialize)]
struct ReadResponseTuple {
    key: ApiTupleKey,
}

#[derive(Debug, Serialize)]
struct WriteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    writes: Option<TupleKeys>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deletes: Option<TupleKeys>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct TupleKeys {
    tuple_keys: Vec<ApiTupleKey>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {}

#[derive(Debug, Serialize)]
struct BatchCheckRequest {
    checks: Vec<BatchCheckItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchCheckItem {
    tuple_key: ApiTupleKey,
    correlation_id: String,
}

#[derive(Debug, Deserialize)]
struct BatchCheckResponse {
    #[serde(default)]
    result: HashMap<String, BatchCheckSingleResult>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchCheckSingleResult {
    #[serde(default)]
    allowed: bool,
}

#[derive(Debug, Serialize)]
struct CheckRequest {
    tuple_key: ApiTupleKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    allowed: bool,
}

fn check_tuple_key(item: &CheckItem) -> ApiTupleKey {
    ApiTupleKey {
        user: item.user.clone(),
        relation: item.relation.clone(),
        object: item.object.clone(),
    }
}

#[async_trait]
impl RelationClient for OpenFgaClient {
    async fn read(&self, object: &str, continuation: Option<&str>) -> StoreResult<ReadPage> {
        let request = ReadRequest {
            tuple_key: ReadTupleKey {
                object: object.to_string(),
            },
            page_size: READ_PAGE_SIZE,
            continuation_token: continuation.map(str::to_string),
        };
        let response: ReadResponse = self.post("read", &request).await?;

        Ok(ReadPage {
            tuples: response
                .tuples
                .into_iter()
                .map(|t| Tuple::new(t.key.user, t.key.relation, t.key.object))
                .collect(),
            continuation: (!response.continuation_token.is_empty())
                .then_some(response.continuation_token),
        })
    }

    async fn write(&self, writes: &[Tuple], deletes: &[Tuple]) -> StoreResult<()> {
        let request = WriteRequest {
            writes: (!writes.is_empty()).then(|| TupleKeys {
                tuple_keys: writes.iter().map(ApiTupleKey::from).collect(),
            }),
            deletes: (!deletes.is_empty()).then(|| TupleKeys {
                tuple_keys: deletes.iter().map(ApiTupleKey::from).collect(),
            }),
            authorization_model_id: self.authorization_model_id.clone(),
        };
        let _: WriteResponse = self.post("write", &request).await?;
        Ok(())
    }

    async fn batch_check(&self, items: &[CheckItem]) -> StoreResult<Vec<bool>> {
        let request = BatchCheckRequest {
            checks: items
                .iter()
                .enumerate()
                .map(|(i, item)| BatchCheckItem {
                    tuple_key: check_tuple_key(item),
                    correlation_id: i.to_string(),
                })
                .collect(),
            authorization_model_id: self.authorization_model_id.clone(),
        };
        let response: BatchCheckResponse = self.post("batch-check", &request).await?;

        Ok((0..items.len())
            .map(|i| {
                response
                    .result
                    .get(&i.to_string())
                    .map(|r| r.allowed)
                    .unwrap_or(false)
            })
            .collect())
    }

    async fn check(&self, item: &CheckItem) -> StoreResult<bool> {
        let request = CheckRequest {
            tuple_key: check_tuple_key(item),
            authorization_model_id: self.authorization_model_id.clone(),
        };
        let response: CheckResponse = self.post("check", &request).await?;
        Ok(response.allowed)
    }
}
