use crate::config::{AdminBridgeConfig, Credentials};
use crate::error::{AdminBridgeError, Result};
use crate::window::LookbackWindow;
use crate::workspace::{
    ClusterEvent, ClusterInfo, JobSummary, ObjectPermissions, PipelineDetails, PipelineSummary,
    QueryInfo, Row, RunInfo, WarehouseInfo, WorkspaceApi,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

const JOBS_LIST_ENDPOINT: &str = "/api/2.1/jobs/list";
const RUNS_LIST_ENDPOINT: &str = "/api/2.1/jobs/runs/list";
const QUERY_HISTORY_ENDPOINT: &str = "/api/2.0/sql/history/queries";
const CLUSTERS_LIST_ENDPOINT: &str = "/api/2.0/clusters/list";
const CLUSTERS_GET_ENDPOINT: &str = "/api/2.0/clusters/get";
const CLUSTER_EVENTS_ENDPOINT: &str = "/api/2.0/clusters/events";
const PERMISSIONS_ENDPOINT: &str = "/api/2.0/permissions";
const PIPELINES_ENDPOINT: &str = "/api/2.0/pipelines";
const SQL_WAREHOUSES_ENDPOINT: &str = "/api/2.0/sql/warehouses";
const SQL_STATEMENTS_ENDPOINT: &str = "/api/2.0/sql/statements";
const UNITY_CATALOG_TABLES_ENDPOINT: &str = "/api/2.1/unity-catalog/tables";
const DEFAULT_WAIT_TIMEOUT: &str = "30s";
const MAX_POLL_ATTEMPTS: usize = 30;
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const QUERY_HISTORY_PAGE_SIZE: usize = 1000;
const CLUSTER_EVENTS_PAGE_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
struct JobsListResponse {
    #[serde(default)]
    jobs: Vec<JobSummary>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunsListResponse {
    #[serde(default)]
    runs: Vec<RunInfo>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryHistoryResponse {
    #[serde(default)]
    res: Vec<QueryInfo>,
    #[serde(default)]
    has_next_page: bool,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClustersListResponse {
    #[serde(default)]
    clusters: Vec<ClusterInfo>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClusterEventsRequest {
    cluster_id: String,
    start_time: i64,
    end_time: i64,
    order: String,
    #[serde(default)]
    offset: Option<i64>,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct ClusterEventsResponse {
    #[serde(default)]
    events: Vec<ClusterEvent>,
    next_page: Option<ClusterEventsRequest>,
}

#[derive(Debug, Deserialize)]
struct PipelinesListResponse {
    #[serde(default)]
    statuses: Vec<PipelineSummary>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WarehouseListResponse {
    #[serde(default)]
    warehouses: Vec<WarehouseInfo>,
}

#[derive(Debug, Deserialize)]
struct TableExistsResponse {
    #[serde(default)]
    table_exists: bool,
}

#[derive(Debug, Serialize)]
struct SqlStatementRequest {
    statement: String,
    warehouse_id: String,
    disposition: String,
    format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    on_wait_timeout: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SqlStatementResponse {
    statement_id: String,
    status: Option<StatementStatus>,
    manifest: Option<ResultManifest>,
    result: Option<StatementResult>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    error: Option<StatementError>,
}

#[derive(Debug, Deserialize)]
struct StatementError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultManifest {
    schema: Option<Schema>,
}

#[derive(Debug, Deserialize)]
struct Schema {
    #[serde(default)]
    columns: Vec<Column>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    data_array: Option<Vec<Vec<Option<String>>>>,
    next_chunk_internal_link: Option<String>,
}

/// `reqwest` implementation of [`WorkspaceApi`] against the workspace REST endpoints.
pub struct DatabricksRestClient {
    host: String,
    token: String,
    client: reqwest::Client,
}

impl DatabricksRestClient {
    pub fn new(config: &AdminBridgeConfig) -> Result<Self> {
        let credentials = config.resolve_credentials()?;
        Self::with_credentials(credentials, config.request_timeout_secs)
    }

    pub fn with_credentials(credentials: Credentials, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                AdminBridgeError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            host: credentials.host,
            token: credentials.token,
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    async fn api_request<T>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        debug!("Making {} request to {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.token);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            info!("HTTP request failed: {}", e);
            AdminBridgeError::from_transport(e)
        })?;

        let status = response.status();
        debug!("Received HTTP response with status: {}", status);

        let response_text = response.text().await.map_err(|e| {
            info!("Failed to read response text: {}", e);
            AdminBridgeError::from_transport(e)
        })?;

        debug!("Response body length: {} characters", response_text.len());

        if !status.is_success() {
            info!("API request failed with status {}: {}", status, response_text);
            return Err(AdminBridgeError::from_status(status, &response_text));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            info!("Failed to parse JSON response: {}", e);
            AdminBridgeError::remote(format!(
                "Failed to parse JSON response: {}. Response: {}",
                e, response_text
            ))
        })
    }

    async fn get<T>(&self, url: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.api_request(reqwest::Method::GET, url, None::<&()>).await
    }

    async fn poll_for_results(&self, statement_id: &str) -> Result<Vec<Row>> {
        for attempt in 0..MAX_POLL_ATTEMPTS {
            debug!(
                "Polling attempt {} for statement {}",
                attempt + 1,
                statement_id
            );

            let url = format!("{}/{}", self.url(SQL_STATEMENTS_ENDPOINT), statement_id);
            let response: SqlStatementResponse = self.get(&url).await?;

            if let Some(status) = &response.status {
                match status.state.as_str() {
                    "SUCCEEDED" => return self.collect_rows(&response).await,
                    "FAILED" | "CANCELED" | "CLOSED" => {
                        return Err(statement_failure(status));
                    }
                    "PENDING" | "RUNNING" => {
                        sleep(POLL_INTERVAL).await;
                        continue;
                    }
                    other => {
                        return Err(AdminBridgeError::remote(format!(
                            "Unexpected statement state: {}",
                            other
                        )));
                    }
                }
            }
        }

        Err(AdminBridgeError::Timeout(format!(
            "Polling timeout exceeded for statement {}",
            statement_id
        )))
    }

    /// Turn the inline result into rows, following chunk links until the result is exhausted.
    async fn collect_rows(&self, response: &SqlStatementResponse) -> Result<Vec<Row>> {
        let schema = response
            .manifest
            .as_ref()
            .and_then(|m| m.schema.as_ref())
            .ok_or_else(|| AdminBridgeError::remote("No schema in statement response"))?;

        let mut rows = Vec::new();
        let mut chunk = response.result.as_ref().map(|r| {
            (
                r.data_array.clone().unwrap_or_default(),
                r.next_chunk_internal_link.clone(),
            )
        });

        while let Some((data, next_link)) = chunk.take() {
            debug!("Processing {} rows of inline data", data.len());
            rows.extend(rows_from_data_array(schema, &data));
            if let Some(link) = next_link {
                let next: StatementResult = self.get(&self.url(&link)).await?;
                chunk = Some((next.data_array.unwrap_or_default(), next.next_chunk_internal_link));
            }
        }

        Ok(rows)
    }
}

fn statement_failure(status: &StatementStatus) -> AdminBridgeError {
    let error_msg = status
        .error
        .as_ref()
        .and_then(|e| e.message.as_deref())
        .unwrap_or("Unknown error");
    AdminBridgeError::remote(format!("SQL execution failed: {}", error_msg))
}

fn rows_from_data_array(schema: &Schema, data_array: &[Vec<Option<String>>]) -> Vec<Row> {
    data_array
        .iter()
        .map(|row| {
            schema
                .columns
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    let value = row
                        .get(i)
                        .and_then(|v| v.as_ref())
                        .map(|s| Value::String(s.clone()))
                        .unwrap_or(Value::Null);
                    (column.name.clone(), value)
                })
                .collect()
        })
        .collect()
}

fn with_query(base: String, params: &[String]) -> String {
    if params.is_empty() {
        return base;
    }
    format!("{}?{}", base, params.join("&"))
}

impl WorkspaceApi for DatabricksRestClient {
    async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let mut all_jobs = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut params = vec!["limit=100".to_string()];
            if let Some(token) = &next_page_token {
                params.push(format!("page_token={}", urlencoding::encode(token)));
            }
            let response: JobsListResponse = self
                .get(&with_query(self.url(JOBS_LIST_ENDPOINT), &params))
                .await?;
            all_jobs.extend(response.jobs);

            match response.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} jobs", all_jobs.len());
        Ok(all_jobs)
    }

    async fn list_runs(&self, job_id: i64, window: &LookbackWindow) -> Result<Vec<RunInfo>> {
        let mut all_runs = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut params = vec![
                format!("job_id={}", job_id),
                format!("start_time_from={}", window.start_millis()),
                format!("start_time_to={}", window.end_millis()),
                "expand_tasks=false".to_string(),
                "limit=25".to_string(),
            ];
            if let Some(token) = &next_page_token {
                params.push(format!("page_token={}", urlencoding::encode(token)));
            }
            let response: RunsListResponse = self
                .get(&with_query(self.url(RUNS_LIST_ENDPOINT), &params))
                .await?;
            all_runs.extend(response.runs);

            match response.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        Ok(all_runs)
    }

    async fn list_query_history(&self, window: &LookbackWindow) -> Result<Vec<QueryInfo>> {
        let mut all_queries = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut params = vec![format!("max_results={}", QUERY_HISTORY_PAGE_SIZE)];
            match &next_page_token {
                Some(token) => params.push(format!("page_token={}", urlencoding::encode(token))),
                None => {
                    params.push(format!(
                        "filter_by.query_start_time_range.start_time_ms={}",
                        window.start_millis()
                    ));
                    params.push(format!(
                        "filter_by.query_start_time_range.end_time_ms={}",
                        window.end_millis()
                    ));
                }
            }
            let response: QueryHistoryResponse = self
                .get(&with_query(self.url(QUERY_HISTORY_ENDPOINT), &params))
                .await?;
            all_queries.extend(response.res);

            match response.next_page_token.filter(|t| response.has_next_page && !t.is_empty()) {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} query history entries", all_queries.len());
        Ok(all_queries)
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>> {
        let mut all_clusters = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut params = Vec::new();
            if let Some(token) = &next_page_token {
                params.push(format!("page_token={}", urlencoding::encode(token)));
            }
            let response: ClustersListResponse = self
                .get(&with_query(self.url(CLUSTERS_LIST_ENDPOINT), &params))
                .await?;
            all_clusters.extend(response.clusters);

            match response.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        Ok(all_clusters)
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo> {
        let url = format!(
            "{}?cluster_id={}",
            self.url(CLUSTERS_GET_ENDPOINT),
            urlencoding::encode(cluster_id)
        );
        self.get(&url).await
    }

    async fn cluster_events(
        &self,
        cluster_id: &str,
        window: &LookbackWindow,
    ) -> Result<Vec<ClusterEvent>> {
        let url = self.url(CLUSTER_EVENTS_ENDPOINT);
        let mut all_events = Vec::new();
        let mut request = Some(ClusterEventsRequest {
            cluster_id: cluster_id.to_string(),
            start_time: window.start_millis(),
            end_time: window.end_millis(),
            order: "ASC".to_string(),
            offset: None,
            limit: CLUSTER_EVENTS_PAGE_SIZE,
        });

        while let Some(body) = request.take() {
            let response: ClusterEventsResponse = self
                .api_request(reqwest::Method::POST, &url, Some(&body))
                .await?;
            all_events.extend(response.events);
            request = response.next_page;
        }

        Ok(all_events)
    }

    async fn get_permissions(&self, object_type: &str, object_id: &str) -> Result<ObjectPermissions> {
        let url = format!(
            "{}/{}/{}",
            self.url(PERMISSIONS_ENDPOINT),
            object_type,
            urlencoding::encode(object_id)
        );
        self.get(&url).await
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>> {
        let mut all_pipelines = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            let mut params = vec!["max_results=100".to_string()];
            if let Some(token) = &next_page_token {
                params.push(format!("page_token={}", urlencoding::encode(token)));
            }
            let response: PipelinesListResponse = self
                .get(&with_query(self.url(PIPELINES_ENDPOINT), &params))
                .await?;
            all_pipelines.extend(response.statuses);

            match response.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        Ok(all_pipelines)
    }

    async fn get_pipeline(&self, pipeline_id: &str) -> Result<PipelineDetails> {
        let url = format!(
            "{}/{}",
            self.url(PIPELINES_ENDPOINT),
            urlencoding::encode(pipeline_id)
        );
        self.get(&url).await
    }

    async fn list_warehouses(&self) -> Result<Vec<WarehouseInfo>> {
        let response: WarehouseListResponse = self.get(&self.url(SQL_WAREHOUSES_ENDPOINT)).await?;
        Ok(response.warehouses)
    }

    async fn table_exists(&self, full_name: &str) -> Result<bool> {
        let url = format!(
            "{}/{}/exists",
            self.url(UNITY_CATALOG_TABLES_ENDPOINT),
            urlencoding::encode(full_name)
        );
        match self.get::<TableExistsResponse>(&url).await {
            Ok(response) => Ok(response.table_exists),
            // catalog or schema missing
            Err(AdminBridgeError::ResourceNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn execute_statement(&self, warehouse_id: &str, sql: &str) -> Result<Vec<Row>> {
        let request = SqlStatementRequest {
            statement: sql.to_string(),
            warehouse_id: warehouse_id.to_string(),
            disposition: "INLINE".to_string(),
            format: "JSON_ARRAY".to_string(),
            wait_timeout: Some(DEFAULT_WAIT_TIMEOUT.to_string()),
            on_wait_timeout: Some("CONTINUE".to_string()),
        };

        debug!("Executing statement on warehouse {}: {}", warehouse_id, sql);
        let response: SqlStatementResponse = self
            .api_request(
                reqwest::Method::POST,
                &self.url(SQL_STATEMENTS_ENDPOINT),
                Some(&request),
            )
            .await?;

        if let Some(status) = &response.status {
            match status.state.as_str() {
                "PENDING" | "RUNNING" => return self.poll_for_results(&response.statement_id).await,
                "FAILED" | "CANCELED" | "CLOSED" => return Err(statement_failure(status)),
                _ => {}
            }
        }

        self.collect_rows(&response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_keep_string_cells() {
        let schema = Schema {
            columns: vec![
                Column {
                    name: "job_id".into(),
                },
                Column {
                    name: "cost".into(),
                },
                Column {
                    name: "tags".into(),
                },
            ],
        };
        let data = vec![vec![Some("0042".to_string()), Some("1.5".to_string()), None]];
        let rows = rows_from_data_array(&schema, &data);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["job_id"], Value::String("0042".into()));
        assert_eq!(rows[0]["tags"], Value::Null);
    }

    #[test]
    fn test_statement_failure_message() {
        let status = StatementStatus {
            state: "FAILED".into(),
            error: Some(StatementError {
                message: Some("TABLE_OR_VIEW_NOT_FOUND".into()),
            }),
        };
        let err = statement_failure(&status);
        assert_eq!(err.kind(), "remote_api");
        assert!(err.to_string().contains("TABLE_OR_VIEW_NOT_FOUND"));
    }

    #[test]
    fn test_query_string_building() {
        assert_eq!(with_query("https://h/x".into(), &[]), "https://h/x");
        assert_eq!(
            with_query("https://h/x".into(), &["a=1".into(), "b=2".into()]),
            "https://h/x?a=1&b=2"
        );
    }

    #[test]
    fn test_client_from_explicit_credentials() {
        let client = DatabricksRestClient::with_credentials(
            Credentials {
                host: "https://example.cloud.databricks.com".into(),
                token: "dapi-test".into(),
            },
            5,
        )
        .unwrap();
        assert_eq!(client.host(), "https://example.cloud.databricks.com");
    }
}
