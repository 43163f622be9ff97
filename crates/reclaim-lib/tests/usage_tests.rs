//! Integration tests for usage evaluation against a mocked metrics backend

use mockito::{Matcher, Mock, Server, ServerGuard};
use reclaim_lib::{
    metrics::build_usage_query, MetricsBackendConfig, QueryExecutor, ReclaimMetrics,
    ResourceType, UsageEvaluator, WorkloadRef,
};
use std::time::Duration;

fn evaluator_for(server: &ServerGuard) -> (UsageEvaluator, String) {
    let host_with_port = server.host_with_port();
    let (host, port) = host_with_port.rsplit_once(':').unwrap();
    let config = MetricsBackendConfig {
        port: port.parse().unwrap(),
        request_timeout: Duration::from_secs(2),
        ..MetricsBackendConfig::default()
    };
    (
        UsageEvaluator::new(QueryExecutor::new(config)),
        host.to_string(),
    )
}

async fn mock_query(server: &mut ServerGuard, query: &str, status: usize, body: &str) -> Mock {
    server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::UrlEncoded("query".into(), query.into()))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

#[tokio::test]
async fn test_gpu_usage_from_backend() {
    let mut server = Server::new_async().await;
    let workload = WorkloadRef::new("pod-a", "ns-a");
    let query = build_usage_query(ResourceType::Gpu, &workload, 60);
    let mock = mock_query(
        &mut server,
        &query,
        200,
        r#"{"status":"success","data":{"resultType":"scalar","result":[1700000000.0,"0.35"]}}"#,
    )
    .await;

    let (evaluator, address) = evaluator_for(&server);
    let usage = evaluator
        .average_usage(ResourceType::Gpu, &workload, &address, 60)
        .await;

    assert_eq!(usage, 0.35);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cpu_sample_keeps_timestamp() {
    let mut server = Server::new_async().await;
    let workload = WorkloadRef::new("pod-b", "ns-b");
    let query = build_usage_query(ResourceType::Cpu, &workload, 30);
    mock_query(
        &mut server,
        &query,
        200,
        r#"{"status":"success","data":{"resultType":"scalar","result":[1700000123.125,"1.5"]}}"#,
    )
    .await;

    let (evaluator, address) = evaluator_for(&server);
    let sample = evaluator
        .try_average_usage(ResourceType::Cpu, &workload, &address, 30)
        .await
        .unwrap();

    assert_eq!(sample.value, 1.5);
    assert_eq!(sample.timestamp, 1700000123125.0);
}

#[tokio::test]
async fn test_nan_usage_is_zero() {
    let mut server = Server::new_async().await;
    let workload = WorkloadRef::new("idle-pod", "batch");
    let query = build_usage_query(ResourceType::Gpu, &workload, 3600);
    mock_query(
        &mut server,
        &query,
        200,
        r#"{"status":"success","data":{"resultType":"scalar","result":[1700000000.0,"NaN"]}}"#,
    )
    .await;

    let (evaluator, address) = evaluator_for(&server);
    let sample = evaluator
        .try_average_usage(ResourceType::Gpu, &workload, &address, 3600)
        .await
        .unwrap();

    assert_eq!(sample.value, 0.0);
    assert_eq!(sample.timestamp, 1700000000000.0);
}

#[tokio::test]
async fn test_warnings_fail_open_to_zero() {
    let mut server = Server::new_async().await;
    let workload = WorkloadRef::new("pod-w", "ns-w");
    let query = build_usage_query(ResourceType::Gpu, &workload, 60);
    mock_query(
        &mut server,
        &query,
        200,
        r#"{"status":"success","data":{"resultType":"scalar","result":[1.0,"0.9"]},"warnings":["partial data"]}"#,
    )
    .await;

    let metrics = ReclaimMetrics::new();
    let before = metrics.query_failures("query");

    let (evaluator, address) = evaluator_for(&server);
    let err = evaluator
        .try_average_usage(ResourceType::Gpu, &workload, &address, 60)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "query");

    let usage = evaluator
        .average_usage(ResourceType::Gpu, &workload, &address, 60)
        .await;
    assert_eq!(usage, 0.0);
    assert!(metrics.query_failures("query") > before);
}

#[tokio::test]
async fn test_backend_failure_fails_open_to_zero() {
    let mut server = Server::new_async().await;
    let workload = WorkloadRef::new("pod-c", "ns-c");
    let query = build_usage_query(ResourceType::Cpu, &workload, 120);
    mock_query(
        &mut server,
        &query,
        503,
        r#"{"status":"error","errorType":"unavailable","error":"too many queries"}"#,
    )
    .await;

    let metrics = ReclaimMetrics::new();
    let before = metrics.usage_fallbacks(ResourceType::Cpu);

    let (evaluator, address) = evaluator_for(&server);
    let usage = evaluator
        .average_usage(ResourceType::Cpu, &workload, &address, 120)
        .await;

    assert_eq!(usage, 0.0);
    assert!(metrics.usage_fallbacks(ResourceType::Cpu) > before);
}

#[tokio::test]
async fn test_vector_result_fails_open_to_zero() {
    let mut server = Server::new_async().await;
    let workload = WorkloadRef::new("pod-v", "ns-v");
    let query = build_usage_query(ResourceType::Gpu, &workload, 60);
    mock_query(
        &mut server,
        &query,
        200,
        r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{},"value":[1.0,"0.5"]}]}}"#,
    )
    .await;

    let (evaluator, address) = evaluator_for(&server);
    let err = evaluator
        .try_average_usage(ResourceType::Gpu, &workload, &address, 60)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "type");

    let usage = evaluator
        .average_usage(ResourceType::Gpu, &workload, &address, 60)
        .await;
    assert_eq!(usage, 0.0);
}

#[tokio::test]
async fn test_unreachable_backend_fails_open_to_zero() {
    let config = MetricsBackendConfig {
        port: 1,
        request_timeout: Duration::from_secs(1),
        ..MetricsBackendConfig::default()
    };
    let evaluator = UsageEvaluator::new(QueryExecutor::new(config));

    let usage = evaluator
        .average_usage(
            ResourceType::Gpu,
            &WorkloadRef::new("pod-a", "ns-a"),
            "127.0.0.1",
            60,
        )
        .await;
    assert_eq!(usage, 0.0);
}
