//! Single-shot query execution against the Prometheus HTTP API

use super::Result;
use crate::error::MetricsError;
use crate::observability::ReclaimMetrics;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Port the metrics backend listens on
pub const PROMETHEUS_PORT: u16 = 9090;

const QUERY_PATH: &str = "api/v1/query";

/// Connection settings for the metrics backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsBackendConfig {
    /// Backend port
    pub port: u16,
    /// Overall bound on a single query call
    pub request_timeout: Duration,
    /// Evaluation timeout passed to the backend as a hint
    pub query_timeout: Duration,
}

impl Default for MetricsBackendConfig {
    fn default() -> Self {
        Self {
            port: PROMETHEUS_PORT,
            request_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// A `[timestamp, "value"]` pair as encoded by the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSample(pub f64, pub String);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorSample {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    pub value: RawSample,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatrixSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    pub values: Vec<RawSample>,
}

/// Raw result of an instant query
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryValue {
    Scalar(RawSample),
    String(RawSample),
    Vector(Vec<VectorSample>),
    Matrix(Vec<MatrixSeries>),
}

impl QueryValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryValue::Scalar(_) => "scalar",
            QueryValue::String(_) => "string",
            QueryValue::Vector(_) => "vector",
            QueryValue::Matrix(_) => "matrix",
        }
    }
}

/// Response envelope of the query API
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    data: Option<QueryValue>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// Executes queries against the metrics backend.
///
/// Every call builds its own HTTP client; the executor holds no connection
/// state and is safe to share across tasks.
#[derive(Clone)]
pub struct QueryExecutor {
    config: MetricsBackendConfig,
    metrics: ReclaimMetrics,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(MetricsBackendConfig::default())
    }
}

impl QueryExecutor {
    pub fn new(config: MetricsBackendConfig) -> Self {
        Self {
            config,
            metrics: ReclaimMetrics::new(),
        }
    }

    pub fn config(&self) -> &MetricsBackendConfig {
        &self.config
    }

    /// Base URL of the backend at `address`, `http://<address>:<port>/`
    pub fn backend_url(&self, address: &str) -> Result<Url> {
        let client_error = |reason: String| MetricsError::Client {
            address: address.to_string(),
            reason,
        };

        // Cluster IPs on IPv6 clusters arrive unbracketed
        let host = match address.parse::<Ipv6Addr>() {
            Ok(ip) => format!("[{ip}]"),
            Err(_) => address.to_string(),
        };

        let url = Url::parse(&format!("http://{}:{}", host, self.config.port))
            .map_err(|e| client_error(e.to_string()))?;

        // Anything beyond host:port means the address smuggled in a path or credentials
        if url.path() != "/"
            || url.query().is_some()
            || url.fragment().is_some()
            || !url.username().is_empty()
            || url.port_or_known_default() != Some(self.config.port)
        {
            return Err(client_error("address must be a bare host".to_string()));
        }

        Ok(url)
    }

    /// Run `query` as an instant query evaluated now.
    ///
    /// A single attempt is made. Backend warnings are treated as failures.
    pub async fn execute(&self, address: &str, query: &str) -> Result<QueryValue> {
        let url = self
            .backend_url(address)?
            .join(QUERY_PATH)
            .map_err(|e| MetricsError::Client {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let client = Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| MetricsError::Client {
                address: address.to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        let start = Instant::now();
        let result = self.send(&client, url, query).await;
        self.metrics
            .observe_query_duration(start.elapsed().as_secs_f64());

        result
    }

    async fn send(&self, client: &Client, url: Url, query: &str) -> Result<QueryValue> {
        let evaluation_time = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        debug!(url = %url, query = %query, "Querying metrics backend");

        let response = client
            .get(url)
            .query(&[
                ("query", query.to_string()),
                ("time", format!("{evaluation_time:.3}")),
                ("timeout", format!("{}s", self.config.query_timeout.as_secs())),
            ])
            .send()
            .await
            .map_err(|e| MetricsError::query(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MetricsError::query(format!("failed to read response: {e}")))?;

        let parsed: ApiResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(MetricsError::query(format!(
                    "backend returned {status}: {body}"
                )));
            }
            Err(e) => {
                return Err(MetricsError::query(format!(
                    "failed to decode response: {e}"
                )));
            }
        };

        if parsed.status != "success" || !status.is_success() {
            return Err(MetricsError::query(format!(
                "backend returned {} ({}): {}",
                status,
                parsed.error_type.as_deref().unwrap_or("unknown"),
                parsed.error.as_deref().unwrap_or_default()
            )));
        }

        if !parsed.warnings.is_empty() {
            warn!(warnings = ?parsed.warnings, "Metrics backend returned warnings");
            return Err(MetricsError::query(format!(
                "backend returned warnings: {}",
                parsed.warnings.join("; ")
            )));
        }

        parsed
            .data
            .ok_or_else(|| MetricsError::query("response carried no data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn executor_for(server: &ServerGuard) -> (QueryExecutor, String) {
        let host_with_port = server.host_with_port();
        let (host, port) = host_with_port.rsplit_once(':').unwrap();
        let config = MetricsBackendConfig {
            port: port.parse().unwrap(),
            ..MetricsBackendConfig::default()
        };
        (QueryExecutor::new(config), host.to_string())
    }

    #[test]
    fn test_default_config() {
        let config = MetricsBackendConfig::default();
        assert_eq!(config.port, 9090);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.query_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_backend_url() {
        let executor = QueryExecutor::default();
        let url = executor.backend_url("10.96.0.15").unwrap();
        assert_eq!(url.as_str(), "http://10.96.0.15:9090/");
    }

    #[test]
    fn test_ipv6_backend_url() {
        let executor = QueryExecutor::default();
        let url = executor.backend_url("fd00::a").unwrap();
        assert_eq!(url.as_str(), "http://[fd00::a]:9090/");

        let url = executor.backend_url("fd00:10:96::a").unwrap();
        assert_eq!(url.host_str(), Some("[fd00:10:96::a]"));
        assert_eq!(url.port(), Some(9090));

        let url = executor.backend_url("[fd00::a]").unwrap();
        assert_eq!(url.as_str(), "http://[fd00::a]:9090/");
    }

    #[test]
    fn test_malformed_address_is_client_error() {
        let executor = QueryExecutor::default();
        for address in ["", "bad host", "10.0.0.1:80", "host/path", "user@host"] {
            let err = executor.backend_url(address).unwrap_err();
            assert_eq!(err.kind(), "client", "address {address:?}");
        }
    }

    #[test]
    fn test_decode_result_types() {
        let scalar: QueryValue =
            serde_json::from_str(r#"{"resultType":"scalar","result":[1700000000.5,"0.42"]}"#)
                .unwrap();
        assert_eq!(
            scalar,
            QueryValue::Scalar(RawSample(1700000000.5, "0.42".to_string()))
        );

        let vector: QueryValue = serde_json::from_str(
            r#"{"resultType":"vector","result":[{"metric":{"pod":"a"},"value":[1.0,"2"]}]}"#,
        )
        .unwrap();
        assert_eq!(vector.type_name(), "vector");

        let matrix: QueryValue = serde_json::from_str(
            r#"{"resultType":"matrix","result":[{"metric":{},"values":[[1.0,"2"],[2.0,"3"]]}]}"#,
        )
        .unwrap();
        assert_eq!(matrix.type_name(), "matrix");
    }

    #[tokio::test]
    async fn test_execute_scalar() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "scalar(vector(1))".into()),
                Matcher::UrlEncoded("timeout".into(), "5s".into()),
                Matcher::Regex("time=".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"success","data":{"resultType":"scalar","result":[1700000000.123,"1"]}}"#,
            )
            .create_async()
            .await;

        let (executor, address) = executor_for(&server);
        let value = executor.execute(&address, "scalar(vector(1))").await.unwrap();

        assert_eq!(
            value,
            QueryValue::Scalar(RawSample(1700000000.123, "1".to_string()))
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_warnings_are_query_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"status":"success","data":{"resultType":"scalar","result":[1.0,"1"]},"warnings":["partial response"]}"#,
            )
            .create_async()
            .await;

        let (executor, address) = executor_for(&server);
        let err = executor.execute(&address, "up").await.unwrap_err();

        assert_eq!(err.kind(), "query");
        assert!(err.to_string().contains("partial response"));
    }

    #[tokio::test]
    async fn test_backend_error_is_query_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#)
            .create_async()
            .await;

        let (executor, address) = executor_for(&server);
        let err = executor.execute(&address, "scalar(").await.unwrap_err();

        assert_eq!(err.kind(), "query");
        assert!(err.to_string().contains("bad_data"));
    }

    #[tokio::test]
    async fn test_non_json_body_is_query_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let (executor, address) = executor_for(&server);
        let err = executor.execute(&address, "up").await.unwrap_err();

        assert_eq!(err.kind(), "query");
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_query_error() {
        let config = MetricsBackendConfig {
            port: 1,
            request_timeout: Duration::from_secs(1),
            ..MetricsBackendConfig::default()
        };
        let executor = QueryExecutor::new(config);

        let err = executor.execute("127.0.0.1", "up").await.unwrap_err();
        assert_eq!(err.kind(), "query");
    }

    #[tokio::test]
    async fn test_silent_backend_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // Accept and hold connections without ever answering
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let config = MetricsBackendConfig {
            port,
            request_timeout: Duration::from_millis(200),
            ..MetricsBackendConfig::default()
        };
        let executor = QueryExecutor::new(config);

        let start = Instant::now();
        let err = executor.execute("127.0.0.1", "up").await.unwrap_err();
        assert_eq!(err.kind(), "query");
        assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
    }
}
