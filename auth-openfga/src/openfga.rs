//! HTTP client for the OpenFGA REST API.

use crate::{
    client::AuthorizationClient,
    config::FgaConfig,
    credentials::TokenProvider,
    error::{FgaError, Result},
    models::*,
    retry::RetryPolicy,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

const READ_PAGE_SIZE: u32 = 100;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct CheckBody<'a> {
    tuple_key: TupleKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allowed: bool,
}

#[derive(Debug, Serialize)]
struct TupleKeys {
    tuple_keys: Vec<TupleKey>,
}

#[derive(Debug, Serialize)]
struct WriteBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    writes: Option<TupleKeys>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deletes: Option<TupleKeys>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ListObjectsBody<'a> {
    #[serde(rename = "type")]
    object_type: &'a str,
    relation: &'a str,
    user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ListObjectsResponse {
    #[serde(default)]
    objects: Vec<String>,
}

/// Partial tuple key used by `read`; absent fields are wildcards
#[derive(Debug, Default, Serialize)]
struct ReadTupleKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    object: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReadBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    tuple_key: Option<ReadTupleKey>,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    tuples: Vec<StoredTuple>,
    #[serde(default)]
    continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoredTuple {
    key: TupleKey,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl ReadTupleKey {
    fn from_filter(filter: &TupleFilter) -> Option<Self> {
        let key = Self {
            user: filter.subject.as_ref().map(ToString::to_string),
            relation: filter.relation.map(|r| r.to_string()),
            object: filter.object.as_ref().map(ToString::to_string),
        };
        if key.user.is_none() && key.relation.is_none() && key.object.is_none() {
            None
        } else {
            Some(key)
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// [`AuthorizationClient`] backed by an OpenFGA server
pub struct OpenFgaClient {
    http: Client,
    base_url: String,
    store_id: String,
    model_id: Option<String>,
    tokens: TokenProvider,
    retry: RetryPolicy,
}

impl OpenFgaClient {
    pub fn new(config: FgaConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FgaError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            store_id: config.store_id,
            model_id: config.model_id.filter(|m| !m.is_empty()),
            tokens: TokenProvider::new(config.credentials),
            retry: config.retry,
        })
    }

    fn store_url(&self, path: &str) -> String {
        format!("{}/stores/{}{}", self.base_url, self.store_id, path)
    }

    fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.tokens.bearer().await? {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = self.authorize(self.http.post(self.store_url(path)).json(body)).await?;
        Self::decode(request.send().await?).await
    }

    async fn decode<R: DeserializeOwned>(response: Response) -> Result<R> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<R>()
                .await
                .map_err(|e| FgaError::Decode(e.to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or(ErrorBody {
            code: status
                .canonical_reason()
                .unwrap_or("unknown")
                .to_lowercase()
                .replace(' ', "_"),
            message: text,
        });
        Err(FgaError::Api {
            status: status.as_u16(),
            code: body.code,
            message: body.message,
        })
    }

    async fn write(&self, writes: Option<TupleKeys>, deletes: Option<TupleKeys>) -> Result<()> {
        let body = WriteBody {
            writes,
            deletes,
            authorization_model_id: self.model_id(),
        };
        let _: serde_json::Value = self.post("/write", &body).await?;
        Ok(())
    }

    fn tuple_keys(tuples: &[Tuple]) -> TupleKeys {
        TupleKeys {
            tuple_keys: tuples.iter().map(TupleKey::from).collect(),
        }
    }
}

#[async_trait]
impl AuthorizationClient for OpenFgaClient {
    async fn check(&self, subject: &Subject, relation: Relation, object: &Object) -> Result<bool> {
        let tuple = Tuple::new(subject.clone(), relation, object.clone());
        let body = CheckBody {
            tuple_key: TupleKey::from(&tuple),
            authorization_model_id: self.model_id(),
        };

        let response: CheckResponse = self.retry.run("check", || self.post("/check", &body)).await?;
        debug!(%subject, %relation, %object, allowed = response.allowed, "OpenFGA check");
        Ok(response.allowed)
    }

    async fn write_tuples(&self, tuples: &[Tuple]) -> Result<()> {
        if tuples.is_empty() {
            return Ok(());
        }
        debug!(count = tuples.len(), "Writing tuples");
        self.write(Some(Self::tuple_keys(tuples)), None).await
    }

    async fn delete_tuples(&self, tuples: &[Tuple]) -> Result<()> {
        if tuples.is_empty() {
            return Ok(());
        }
        debug!(count = tuples.len(), "Deleting tuples");
        self.write(None, Some(Self::tuple_keys(tuples))).await
    }

    async fn list_objects(
        &self,
        subject: &Subject,
        relation: Relation,
        object_type: &str,
    ) -> Result<Vec<Object>> {
        let body = ListObjectsBody {
            object_type,
            relation: relation.as_str(),
            user: subject.to_string(),
            authorization_model_id: self.model_id(),
        };

        let response: ListObjectsResponse = self
            .retry
            .run("list_objects", || self.post("/list-objects", &body))
            .await?;

        response
            .objects
            .iter()
            .map(|raw| raw.parse::<Object>())
            .collect()
    }

    async fn read_tuples(&self, filter: &TupleFilter) -> Result<Vec<Tuple>> {
        let mut tuples = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let body = ReadBody {
                tuple_key: ReadTupleKey::from_filter(filter),
                page_size: READ_PAGE_SIZE,
                continuation_token: continuation_token.take(),
            };
            let page: ReadResponse = self.retry.run("read", || self.post("/read", &body)).await?;

            for stored in page.tuples {
                match Tuple::try_from(stored.key) {
                    Ok(tuple) => tuples.push(tuple),
                    Err(err) => warn!(error = %err, "Skipping tuple outside the relation vocabulary"),
                }
            }

            match page.continuation_token {
                Some(token) if !token.is_empty() => continuation_token = Some(token),
                _ => break,
            }
        }

        Ok(tuples)
    }

    async fn health_check(&self) -> Result<()> {
        let url = self.store_url("");
        let url = url.as_str();
        self.retry
            .run("health_check", move || async move {
                let request = self.authorize(self.http.get(url)).await?;
                let _: serde_json::Value = Self::decode(request.send().await?).await?;
                Ok::<(), FgaError>(())
            })
            .await
    }
}
