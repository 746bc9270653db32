//! Azure Quantum REST API client.
//!
//! Implements the workspace data-plane API
//! (`https://{location}.quantum.azure.com{workspace_id}/…`) for:
//! - Listing providers with their targets (`providerStatus`)
//! - Listing jobs
//! - Submitting QIR jobs through a per-job storage container
//! - Downloading result blobs
//!
//! List endpoints are paged; every page is followed via `nextLink`.
//! Storage requests are authorized by SAS URIs and carry no workspace
//! credentials.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arvak_workspace::config::DEFAULT_API_VERSION;
use arvak_workspace::{Job, JobSubmission, Provider, WorkspaceConnection};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rustc_hash::FxHashSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::auth::{EnvTokenProvider, TokenProvider, auth_header};
use crate::error::{AzureError, AzureResult};

/// Blob the program payload is uploaded to inside the job container.
pub const INPUT_BLOB_NAME: &str = "inputData";

/// Storage service version sent with blob requests.
const STORAGE_API_VERSION: &str = "2020-10-02";

/// Upper bound on pages followed for one listing.
const MAX_PAGES: usize = 1000;

/// User-Agent sent with requests.
const USER_AGENT: &str = concat!("arvak-workspace/", env!("CARGO_PKG_VERSION"));

/// One page of a list response.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Page<T> {
    #[serde(default)]
    value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SasUriRequest<'a> {
    container_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    blob_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SasUriResponse {
    sas_uri: String,
}

/// Job creation body for `PUT /jobs/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobDetails<'a> {
    id: &'a str,
    name: &'a str,
    container_uri: String,
    input_data_uri: String,
    input_data_format: &'a str,
    output_data_format: &'a str,
    provider_id: &'a str,
    target: &'a str,
    input_params: serde_json::Map<String, serde_json::Value>,
}

impl<'a> JobDetails<'a> {
    fn new(submission: &'a JobSubmission, container_uri: String, input_data_uri: String) -> Self {
        let mut input_params = serde_json::Map::new();
        input_params.insert("entryPoint".into(), submission.entry_point.clone().into());
        input_params.insert("arguments".into(), serde_json::Value::Array(Vec::new()));
        input_params.insert("shots".into(), submission.shots.into());
        input_params.insert("count".into(), submission.shots.into());
        for (key, value) in &submission.input_params {
            input_params.insert(key.clone(), value.clone());
        }

        Self {
            id: &submission.job_id,
            name: &submission.name,
            container_uri,
            input_data_uri,
            input_data_format: &submission.input_format,
            output_data_format: &submission.output_format,
            provider_id: &submission.provider_id,
            target: &submission.target_id,
            input_params,
        }
    }
}

/// Pages visited while following `nextLink`.
///
/// A listing is only returned whole: running past [`MAX_PAGES`] or revisiting
/// a page fails the listing instead of truncating or duplicating it.
#[derive(Debug, Default)]
struct PageCursor {
    visited: FxHashSet<String>,
}

impl PageCursor {
    fn visit(&mut self, url: &str) -> AzureResult<()> {
        if self.visited.len() >= MAX_PAGES {
            return Err(AzureError::Pagination(format!(
                "listing exceeds {MAX_PAGES} pages"
            )));
        }
        if !self.visited.insert(url.to_string()) {
            return Err(AzureError::Pagination(format!(
                "nextLink loops back to {}",
                strip_query(url)
            )));
        }
        Ok(())
    }

    fn pages(&self) -> usize {
        self.visited.len()
    }
}

/// Azure Quantum API client.
pub struct AzureQuantumClient {
    client: Client,
    api_version: String,
    tokens: Arc<dyn TokenProvider>,
}

impl fmt::Debug for AzureQuantumClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureQuantumClient")
            .field("api_version", &self.api_version)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

impl AzureQuantumClient {
    /// Create a client that reads bearer tokens from `AZURE_QUANTUM_TOKEN`.
    pub fn new() -> AzureResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_version: DEFAULT_API_VERSION.to_string(),
            tokens: Arc::new(EnvTokenProvider::default()),
        })
    }

    /// Use a different bearer token source.
    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Use a different service API version.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// The service API version in use.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// URL of a workspace-scoped endpoint.
    fn api_url(&self, workspace: &WorkspaceConnection, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            workspace.workspace_url(),
            path,
            self.api_version
        )
    }

    async fn authorized(
        &self,
        workspace: &WorkspaceConnection,
        request: RequestBuilder,
    ) -> AzureResult<RequestBuilder> {
        let (name, value) = auth_header(workspace, self.tokens.as_ref()).await?;
        Ok(request.header(name, value))
    }

    /// List providers and their targets.
    #[instrument(skip(self, workspace), fields(workspace_id = %workspace.id))]
    pub async fn list_providers(
        &self,
        workspace: &WorkspaceConnection,
    ) -> AzureResult<Vec<Provider>> {
        let url = self.api_url(workspace, "providerStatus");
        self.get_paged(workspace, url).await
    }

    /// List all jobs of the workspace.
    #[instrument(skip(self, workspace), fields(workspace_id = %workspace.id))]
    pub async fn list_jobs(&self, workspace: &WorkspaceConnection) -> AzureResult<Vec<Job>> {
        let url = self.api_url(workspace, "jobs");
        self.get_paged(workspace, url).await
    }

    async fn get_paged<T: DeserializeOwned>(
        &self,
        workspace: &WorkspaceConnection,
        first: String,
    ) -> AzureResult<Vec<T>> {
        let mut items = Vec::new();
        let mut cursor = PageCursor::default();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            cursor.visit(&url)?;
            debug!("GET {}", url);

            let request = self.authorized(workspace, self.client.get(&url)).await?;
            let response = check(request.send().await?, &url).await?;
            let page: Page<T> = serde_json::from_str(&response.text().await?)?;

            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        debug!("Fetched {} item(s) in {} page(s)", items.len(), cursor.pages());
        Ok(items)
    }

    /// Get a SAS URI for a job container, or for one blob inside it.
    #[instrument(skip(self, workspace), fields(workspace_id = %workspace.id))]
    pub async fn sas_uri(
        &self,
        workspace: &WorkspaceConnection,
        container: &str,
        blob: Option<&str>,
    ) -> AzureResult<String> {
        let url = self.api_url(workspace, "storage/sasUri");
        let body = SasUriRequest {
            container_name: container,
            blob_name: blob,
        };

        let request = self
            .authorized(workspace, self.client.post(&url).json(&body))
            .await?;
        let response = check(request.send().await?, &url).await?;
        let sas: SasUriResponse = serde_json::from_str(&response.text().await?)?;
        Ok(sas.sas_uri)
    }

    /// Create the container named by a container SAS URI.
    ///
    /// An existing container is not an error.
    pub async fn create_container(&self, container_sas: &str) -> AzureResult<()> {
        let url = with_query(container_sas, "restype=container");
        debug!("Creating job container");

        let response = self
            .client
            .put(&url)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        check(response, &strip_query(&url)).await?;
        Ok(())
    }

    /// Upload a block blob into a container. Returns the blob's SAS URI.
    pub async fn upload_blob(
        &self,
        container_sas: &str,
        blob: &str,
        bytes: Vec<u8>,
    ) -> AzureResult<String> {
        let url = blob_url(container_sas, blob);
        debug!("Uploading {} byte(s) to {}", bytes.len(), blob);

        let response = self
            .client
            .put(&url)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;
        check(response, &strip_query(&url)).await?;
        Ok(url)
    }

    /// Download a blob through its SAS URI.
    pub async fn download(&self, blob_sas: &str) -> AzureResult<Vec<u8>> {
        let response = self
            .client
            .get(blob_sas)
            .header("x-ms-version", STORAGE_API_VERSION)
            .send()
            .await?;
        let response = check(response, &strip_query(blob_sas)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Create a job whose input has already been uploaded.
    #[instrument(skip(self, workspace, submission), fields(job_id = %submission.job_id))]
    pub async fn create_job(
        &self,
        workspace: &WorkspaceConnection,
        submission: &JobSubmission,
        container_uri: String,
        input_data_uri: String,
    ) -> AzureResult<Job> {
        let url = self.api_url(workspace, &format!("jobs/{}", submission.job_id));
        let details = JobDetails::new(submission, container_uri, input_data_uri);

        let request = self
            .authorized(workspace, self.client.put(&url).json(&details))
            .await?;
        let response = check(request.send().await?, &url).await?;
        Ok(serde_json::from_str(&response.text().await?)?)
    }
}

/// Pass successful responses through; turn error statuses into errors.
async fn check(response: Response, url: &str) -> AzureResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "no body".to_string());
    Err(AzureError::from_status(status.as_u16(), url, body))
}

/// Append query parameters, keeping any that are already present.
fn with_query(url: &str, query: &str) -> String {
    match url.split_once('?') {
        Some((base, existing)) if !existing.is_empty() => format!("{base}?{query}&{existing}"),
        Some((base, _)) => format!("{base}?{query}"),
        None => format!("{url}?{query}"),
    }
}

/// URL of a blob inside the container named by a container SAS URI.
fn blob_url(container_sas: &str, blob: &str) -> String {
    match container_sas.split_once('?') {
        Some((base, sas)) => format!("{}/{}?{}", base.trim_end_matches('/'), blob, sas),
        None => format!("{}/{}", container_sas.trim_end_matches('/'), blob),
    }
}

/// URL without its query, for error messages that must not leak SAS tokens.
fn strip_query(url: &str) -> String {
    url.split('?').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{API_KEY_HEADER, StaticTokenProvider};
    use arvak_workspace::JobStatus;

    const WS_ID: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Quantum/Workspaces/w";

    fn workspace() -> WorkspaceConnection {
        WorkspaceConnection::new(WS_ID, "w", "https://eastus.quantum.azure.com/")
    }

    fn client() -> AzureQuantumClient {
        AzureQuantumClient::new()
            .unwrap()
            .with_token_provider(Arc::new(StaticTokenProvider::new("tok")))
    }

    #[test]
    fn test_api_url() {
        let url = client().api_url(&workspace(), "providerStatus");
        assert_eq!(
            url,
            format!(
                "https://eastus.quantum.azure.com{WS_ID}/providerStatus?api-version=2022-09-12-preview"
            )
        );
    }

    #[test]
    fn test_api_url_custom_version() {
        let client = client().with_api_version("2024-03-01");
        assert_eq!(client.api_version(), "2024-03-01");
        let url = client.api_url(&workspace(), "jobs");
        assert!(url.ends_with("/jobs?api-version=2024-03-01"));
    }

    #[test]
    fn test_blob_url() {
        assert_eq!(
            blob_url("https://acct.blob.core.windows.net/job-1?sv=1&sig=x", "inputData"),
            "https://acct.blob.core.windows.net/job-1/inputData?sv=1&sig=x"
        );
        assert_eq!(
            blob_url("https://acct.blob.core.windows.net/job-1/", "inputData"),
            "https://acct.blob.core.windows.net/job-1/inputData"
        );
    }

    #[test]
    fn test_with_query() {
        assert_eq!(
            with_query("https://a/c?sv=1", "restype=container"),
            "https://a/c?restype=container&sv=1"
        );
        assert_eq!(
            with_query("https://a/c", "restype=container"),
            "https://a/c?restype=container"
        );
    }

    #[test]
    fn test_strip_query_hides_sas() {
        assert_eq!(strip_query("https://a/c/b?sig=secret"), "https://a/c/b");
    }

    #[tokio::test]
    async fn test_authorized_uses_api_key() {
        let client = client();
        let ws = workspace().with_api_key("key-1");
        let request = client
            .authorized(&ws, client.client.get("https://example.invalid/"))
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.headers()[API_KEY_HEADER], "key-1");
        assert!(request.headers().get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_authorized_uses_bearer_token() {
        let client = client();
        let request = client
            .authorized(&workspace(), client.client.get("https://example.invalid/"))
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer tok");
    }

    #[test]
    fn test_parse_provider_status_page() {
        let json = r#"{
            "value": [
                {
                    "id": "ionq",
                    "currentAvailability": "Available",
                    "targets": [
                        {"id": "ionq.qpu", "currentAvailability": "Available", "averageQueueTime": 1200, "statusPage": "https://status.ionq.co"},
                        {"id": "ionq.simulator", "currentAvailability": "Available", "averageQueueTime": 3}
                    ]
                },
                {"id": "quantinuum", "currentAvailability": "Degraded", "targets": []}
            ],
            "nextLink": "https://eastus.quantum.azure.com/next?page=2"
        }"#;
        let page: Page<Provider> = serde_json::from_str(json).unwrap();
        assert_eq!(page.value.len(), 2);
        assert_eq!(page.value[0].targets.len(), 2);
        assert_eq!(page.value[0].targets[0].average_queue_time, Some(1200.0));
        assert_eq!(
            page.value[1].current_availability.as_deref(),
            Some("Degraded")
        );
        assert!(page.next_link.is_some());
    }

    #[test]
    fn test_parse_jobs_page() {
        let json = r#"{
            "value": [
                {
                    "id": "a1b2",
                    "name": "bell",
                    "providerId": "quantinuum",
                    "target": "quantinuum.sim.h1-1e",
                    "status": "Succeeded",
                    "containerUri": "https://acct.blob.core.windows.net/job-a1b2?sig=x",
                    "outputDataUri": "https://acct.blob.core.windows.net/job-a1b2/rawOutputData?sig=y",
                    "creationTime": "2024-05-01T10:00:00.123Z",
                    "beginExecutionTime": "2024-05-01T10:00:05Z",
                    "endExecutionTime": "2024-05-01T10:01:00Z",
                    "errorData": null
                },
                {"id": "c3d4", "status": "Waiting"}
            ]
        }"#;
        let page: Page<Job> = serde_json::from_str(json).unwrap();
        assert!(page.next_link.is_none());
        assert_eq!(page.value[0].status, JobStatus::Succeeded);
        assert!(page.value[0].has_results());
        assert!(page.value[0].creation_time.is_some());
        assert_eq!(page.value[1].status, JobStatus::Waiting);
        assert_eq!(page.value[1].display_name(), "c3d4");
    }

    #[test]
    fn test_parse_failed_job_error_data() {
        let json = r#"{"id": "j", "status": "Failed",
            "errorData": {"code": "InvalidInputData", "message": "QIR could not be parsed"}}"#;
        let job: Job = serde_json::from_str(json).unwrap();
        let error = job.error_data.unwrap();
        assert_eq!(error.code, "InvalidInputData");
    }

    #[test]
    fn test_empty_page() {
        let page: Page<Job> = serde_json::from_str("{}").unwrap();
        assert!(page.value.is_empty());
    }

    #[test]
    fn test_page_cursor_follows_distinct_pages() {
        let mut cursor = PageCursor::default();
        cursor.visit("https://x/jobs?api-version=1").unwrap();
        cursor.visit("https://x/jobs?page=2").unwrap();
        assert_eq!(cursor.pages(), 2);
    }

    #[test]
    fn test_page_cursor_rejects_cycle() {
        let mut cursor = PageCursor::default();
        cursor.visit("https://x/jobs?page=a").unwrap();
        cursor.visit("https://x/jobs?page=b").unwrap();
        let err = cursor.visit("https://x/jobs?page=a").unwrap_err();
        assert!(matches!(err, AzureError::Pagination(msg) if msg.contains("https://x/jobs")));
    }

    #[test]
    fn test_page_cursor_rejects_too_many_pages() {
        let mut cursor = PageCursor::default();
        for i in 0..MAX_PAGES {
            cursor.visit(&format!("https://x/jobs?page={i}")).unwrap();
        }
        let err = cursor.visit("https://x/jobs?page=last").unwrap_err();
        assert!(matches!(err, AzureError::Pagination(_)));
    }

    #[test]
    fn test_job_details_body() {
        let submission = JobSubmission::new("bell", "ionq", "ionq.simulator", vec![1], 250)
            .with_param("count", serde_json::json!(100))
            .with_param("error-mitigation", serde_json::json!({"debias": false}));
        let details = JobDetails::new(
            &submission,
            "https://acct/c?sig=1".into(),
            "https://acct/c/inputData?sig=1".into(),
        );
        let json = serde_json::to_value(&details).unwrap();

        assert_eq!(json["id"], submission.job_id.as_str());
        assert_eq!(json["providerId"], "ionq");
        assert_eq!(json["target"], "ionq.simulator");
        assert_eq!(json["inputDataFormat"], "qir.v1");
        assert_eq!(json["outputDataFormat"], "microsoft.quantum-results.v1");
        assert_eq!(json["containerUri"], "https://acct/c?sig=1");
        assert_eq!(json["inputParams"]["entryPoint"], "ENTRYPOINT__main");
        assert_eq!(json["inputParams"]["shots"], 250);
        // Explicit parameters win over the defaults.
        assert_eq!(json["inputParams"]["count"], 100);
        assert_eq!(json["inputParams"]["error-mitigation"]["debias"], false);
    }

    #[test]
    fn test_sas_request_body() {
        let container_only = serde_json::to_value(SasUriRequest {
            container_name: "job-1",
            blob_name: None,
        })
        .unwrap();
        assert_eq!(container_only, serde_json::json!({"containerName": "job-1"}));

        let with_blob = serde_json::to_value(SasUriRequest {
            container_name: "job-1",
            blob_name: Some("rawOutputData"),
        })
        .unwrap();
        assert_eq!(with_blob["blobName"], "rawOutputData");
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let dbg = format!("{:?}", client());
        assert!(dbg.contains("[REDACTED]"));
        assert!(dbg.contains("2022-09-12-preview"));
    }
}
