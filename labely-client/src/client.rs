//! HTTP client for labely-server

use labely_common::api::{
    DatasetManifest, LeaderboardEntry, PostAck, ProfileResponse, SetLabelRequest,
    StartSessionRequest, SubmitLabelRequest, TextDatasetResponse, TextItem,
};
use labely_common::models::{Label, ScoreResult, Session, TaskView};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ClientError, Result};

const USER_AGENT: &str = concat!("labely-client/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GET /health response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Clone)]
pub struct LabelyClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl LabelyClient {
    /// Create a client for the server at `base_url` (e.g. `http://127.0.0.1:5730`)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_http_client(http_client, base_url))
    }

    pub fn with_http_client(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Direct link to an item's image, for image loaders that fetch on their own
    pub fn image_url(&self, dataset: &str, item_id: u64) -> Result<String> {
        let id = item_id.to_string();
        let url = reqwest::Url::parse_with_params(
            &self.url("/dataset/getimg"),
            &[("name", dataset), ("id", id.as_str())],
        )
        .map_err(|e| ClientError::Parse(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        Ok(url.into())
    }

    /// Send the request and return the body of a 2xx response
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = ClientError::from_response(status.as_u16(), &body);
        debug!(status = status.as_u16(), error = %error, "Request failed");
        Err(error)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let body = self.execute(request).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        debug!(path, "GET");
        self.fetch_json(self.http_client.get(self.url(path)).query(query))
            .await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        debug!(path, "POST");
        self.fetch_json(self.http_client.post(self.url(path)).json(body))
            .await
    }

    /// POST whose 2xx body may be a JSON acknowledgement or plain text
    async fn post_ack<B: Serialize>(&self, path: &str, body: &B) -> Result<PostAck> {
        debug!(path, "POST");
        let response = self
            .execute(self.http_client.post(self.url(path)).json(body))
            .await?;
        let text = response.text().await?;
        Ok(PostAck::from_body(&text))
    }

    // ========================================
    // Datasets
    // ========================================

    pub async fn list_datasets(&self) -> Result<Vec<String>> {
        self.get_json("/dataset/list", &[]).await
    }

    pub async fn get_dataset(&self, name: &str) -> Result<DatasetManifest> {
        self.get_json("/dataset/get", &[("name", name.to_string())])
            .await
    }

    pub async fn get_image(&self, name: &str, item_id: u64) -> Result<Vec<u8>> {
        let request = self
            .http_client
            .get(self.url("/dataset/getimg"))
            .query(&[("name", name.to_string()), ("id", item_id.to_string())]);
        let bytes = self.execute(request).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn set_category(
        &self,
        name: &str,
        item_id: u64,
        label: &str,
        user_id: Option<&str>,
    ) -> Result<PostAck> {
        self.post_ack("/dataset/setcat", &set_label_request(name, item_id, label, user_id))
            .await
    }

    pub async fn get_text_dataset(&self, name: &str) -> Result<TextDatasetResponse> {
        self.get_json("/textdataset/get", &[("name", name.to_string())])
            .await
    }

    pub async fn get_text_item(&self, name: &str, item_id: u64) -> Result<TextItem> {
        self.get_json(
            "/textdataset/getitem",
            &[("name", name.to_string()), ("id", item_id.to_string())],
        )
        .await
    }

    pub async fn set_text_label(
        &self,
        name: &str,
        item_id: u64,
        label: &str,
        user_id: Option<&str>,
    ) -> Result<PostAck> {
        self.post_ack(
            "/textdataset/setlabel",
            &set_label_request(name, item_id, label, user_id),
        )
        .await
    }

    // ========================================
    // Sessions
    // ========================================

    /// Start a session, or resume the caller's open one on the dataset
    pub async fn start_session(
        &self,
        user_id: &str,
        dataset: &str,
        task_limit: Option<u32>,
    ) -> Result<Session> {
        let request = StartSessionRequest {
            user_id: user_id.to_string(),
            dataset: dataset.to_string(),
            task_limit,
        };
        self.post_json("/session/start", &request).await
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Session> {
        self.get_json(&format!("/session/{}", session_id), &[]).await
    }

    pub async fn next_task(&self, session_id: Uuid) -> Result<TaskView> {
        self.get_json(&format!("/session/{}/next", session_id), &[])
            .await
    }

    /// Submit the label for the session's current task
    ///
    /// On a retryable error the same item should be submitted again; on any
    /// other error the caller should fetch the next task (or stop when the
    /// session is terminal).
    pub async fn submit_label(
        &self,
        session_id: Uuid,
        item_id: u64,
        label: Label,
    ) -> Result<ScoreResult> {
        let request = SubmitLabelRequest { item_id, label };
        self.post_json(&format!("/session/{}/submit", session_id), &request)
            .await
    }

    // ========================================
    // Standings
    // ========================================

    pub async fn profile(&self, user_id: &str) -> Result<ProfileResponse> {
        self.get_json(&format!("/profile/{}", user_id), &[]).await
    }

    pub async fn leaderboard(&self, limit: Option<u32>) -> Result<Vec<LeaderboardEntry>> {
        let query: Vec<(&str, String)> = limit
            .map(|limit| vec![("limit", limit.to_string())])
            .unwrap_or_default();
        self.get_json("/leaderboard", &query).await
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.get_json("/health", &[]).await
    }
}

fn set_label_request(name: &str, id: u64, label: &str, user_id: Option<&str>) -> SetLabelRequest {
    SetLabelRequest {
        name: name.to_string(),
        id,
        label: label.to_string(),
        user_id: user_id.map(str::to_string),
    }
}
