//! REST client for the perfscope analysis endpoints.

use perfscope_core::analysis::SubmitAnalysis;
use perfscope_core::job::AnalysisJob;
use perfscope_core::types::JobId;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// HTTP client for a single perfscope server.
#[derive(Clone)]
pub struct AnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    job_id: JobId,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("API error ({status}): {body}")]
    Api {
        status: u16,
        /// Raw response body, usually `{ "error", "code" }`.
        body: String,
    },
}

impl AnalysisClient {
    /// * `base_url` - e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] and its connection pool.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// `POST /api/analyze`. Returns the id of the new pending job.
    pub async fn submit(&self, request: &SubmitAnalysis) -> Result<JobId, ClientError> {
        let response = self
            .client
            .post(format!("{}/api/analyze", self.base_url))
            .json(request)
            .send()
            .await?;

        let body: SubmitResponse = Self::parse_response(response).await?;
        Ok(body.job_id)
    }

    /// `GET /api/analysis/{id}`. A 404 is `Ok(None)`.
    pub async fn fetch(&self, job_id: JobId) -> Result<Option<AnalysisJob>, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/analysis/{}", self.base_url, job_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }

    /// `GET /api/analysis?limit=N`, most recent first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<AnalysisJob>, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/analysis", self.base_url))
            .query(&[("limit", limit)])
            .send()
            .await?;

        let body: DataResponse<Vec<AnalysisJob>> = Self::parse_response(response).await?;
        Ok(body.data)
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }
}
