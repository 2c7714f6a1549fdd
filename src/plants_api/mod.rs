pub mod models;

use std::{future::Future, sync::Arc, time::Duration};

use reqwest::{Client, Method, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::{
    config::Config,
    models::{Reading, SupervisedPlant},
    sync::{PendingOp, SyncTransport},
};

use self::models::{NewReadingDoc, ReadingDoc, SupervisedPlantDoc};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("plants API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("plants API returned {status} for {path}")]
    Status { status: StatusCode, path: String },
    #[error("invalid HTTP method {0:?} in queued operation")]
    BadMethod(String),
    #[error("failed to build HTTP client: {0}")]
    Build(reqwest::Error),
}

impl ApiError {
    /// Transient errors are retried via the sync coordinator on the next
    /// connectivity event; everything else is reported to the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Status { status, .. } => status.is_server_error(),
            ApiError::BadMethod(_) | ApiError::Build(_) => false,
        }
    }
}

/// Client for the external plants CRUD API (the document store that owns
/// plant, supervision, and reading records).
#[derive(Debug, Clone)]
pub struct PlantsApiClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
}

impl PlantsApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(ApiError::Build)?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.plants_api_base_url.trim_end_matches('/').to_owned(),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    /// Fetch every supervised plant record.
    pub async fn fetch_supervised_plants(&self) -> Result<Vec<SupervisedPlant>, ApiError> {
        let path = "/plantasSupervisadas";
        debug!(path = %path, "fetching supervised plants");

        let docs: Vec<SupervisedPlantDoc> = self.get_json(path).await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    /// Fetch readings for one plant, most recent first. `since` filters
    /// server-side by timestamp when given.
    pub async fn fetch_readings(
        &self,
        plant_id: &str,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<Reading>, ApiError> {
        let mut path = format!("/plantasSupervisadas/{plant_id}/lecturas");
        if let Some(since) = since {
            path.push_str(&format!("?since={}", since.to_rfc3339()));
        }
        debug!(plant_id = %plant_id, path = %path, "fetching readings");

        let docs: Vec<ReadingDoc> = self.get_json(&path).await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    /// Fetch the most recent reading for one plant, if any exists.
    pub async fn fetch_latest_reading(&self, plant_id: &str) -> Result<Option<Reading>, ApiError> {
        let path = format!("/plantasSupervisadas/{plant_id}/lecturas/recientes");
        debug!(plant_id = %plant_id, "fetching latest reading");

        let docs: Vec<ReadingDoc> = self.get_json(&path).await?;
        Ok(docs.into_iter().next().map(Into::into))
    }

    /// Create a reading record upstream. The store assigns the id.
    pub async fn create_reading(&self, new: &NewReadingDoc) -> Result<Reading, ApiError> {
        let path = "/lecturas";
        debug!(plant_id = %new.plant_id, "creating reading");

        let url = self.url(path);
        let resp = self.inner.http.post(&url).json(new).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                path: path.to_owned(),
            });
        }

        let doc: ReadingDoc = resp.json().await?;
        Ok(doc.into())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let resp = self.inner.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                path: path.to_owned(),
            });
        }
        Ok(resp.json().await?)
    }
}

impl SyncTransport for PlantsApiClient {
    /// Replay a queued operation against the upstream API verbatim.
    fn send(&self, op: &PendingOp) -> impl Future<Output = anyhow::Result<()>> + Send {
        let client = self.clone();
        let endpoint = op.endpoint.clone();
        let method = op.method.clone();
        let payload = op.payload.clone();

        async move {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .map_err(|_| ApiError::BadMethod(method.clone()))?;

            let url = client.url(&endpoint);
            let resp = client
                .inner
                .http
                .request(method, &url)
                .json(&payload)
                .send()
                .await
                .map_err(ApiError::from)?;

            let status = resp.status();
            if !status.is_success() {
                return Err(ApiError::Status {
                    status,
                    path: endpoint,
                }
                .into());
            }
            Ok(())
        }
    }
}
