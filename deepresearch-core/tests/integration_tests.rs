//! Integration tests for deepresearch-core infrastructure

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use deepresearch_core::{
    config_error, process_in_order, retry_async, retry_async_when, schema_violation,
    upstream_error, validation_error, with_timeout, DeepResearchConfig, ErrorContext,
    ResearchError, RetryConfig,
};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 5,
        max_delay_ms: 50,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

#[tokio::test]
async fn test_error_handling() {
    let error = schema_violation!("queries", "missing field `queries`");

    match &error {
        ResearchError::SchemaViolation {
            schema,
            message,
            context,
        } => {
            assert_eq!(schema, "queries");
            assert_eq!(message, "missing field `queries`");
            assert_eq!(context.component, "structured_completion");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected SchemaViolation error"),
    }
    assert!(!error.is_recoverable());

    // Should not panic
    error.log();

    let network_error = upstream_error!("web_search", "connection reset");
    assert!(network_error.is_recoverable());
    assert!(network_error.retry_delay_ms().is_some());

    let config_error = config_error!("Invalid config", "test");
    assert!(!config_error.is_recoverable());
    assert!(config_error.retry_delay_ms().is_none());
}

#[test]
fn test_upstream_status_classification() {
    let make = |status: u16| ResearchError::Upstream {
        service: "usage_tracker".to_string(),
        message: "request failed".to_string(),
        status: Some(status),
        raw: None,
        source: None,
        context: ErrorContext::new("test"),
    };

    assert!(!make(400).is_recoverable());
    assert!(!make(404).is_recoverable());
    assert!(make(429).is_recoverable());
    assert!(make(503).is_recoverable());
    assert_eq!(make(503).upstream_status(), Some(503));
}

#[test]
fn test_failure_wrapping() {
    let query_failure = upstream_error!("web_search", "timeout").into_query_failure("rates 2024");
    match &query_failure {
        ResearchError::QueryFailure { query, message, .. } => {
            assert_eq!(query, "rates 2024");
            assert!(message.contains("timeout"));
        }
        _ => panic!("Expected QueryFailure error"),
    }

    let run_failure = schema_violation!("queries", "bad shape").into_run_failure("planning");
    assert!(matches!(run_failure, ResearchError::RunFailure { .. }));
    assert!(run_failure.to_string().contains("planning"));

    // Already a run failure: not wrapped twice
    let rewrapped = run_failure.into_run_failure("synthesis");
    assert!(rewrapped.to_string().contains("planning"));
}

#[tokio::test]
async fn test_retry_mechanism() {
    let attempt_count = Arc::new(AtomicUsize::new(0));

    let operation = {
        let attempt_count = Arc::clone(&attempt_count);
        move || {
            let count = attempt_count.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if count < 3 {
                    Err(upstream_error!("test", "temporary failure"))
                } else {
                    Ok("Success")
                }
            }
        }
    };

    let result = retry_async(operation, &fast_retry(), "test_operation").await;
    assert_eq!(result.unwrap(), "Success");
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_gives_up_after_max_attempts() {
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempt_count);

    let result: Result<(), ResearchError> = retry_async(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(upstream_error!("test", "always failing")) }
        },
        &fast_retry(),
        "failing_operation",
    )
    .await;

    assert!(result.is_err());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_stops_on_non_retryable_error() {
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempt_count);

    let result: Result<(), ResearchError> = retry_async_when(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ResearchError::Upstream {
                    service: "usage_tracker".to_string(),
                    message: "bad request".to_string(),
                    status: Some(400),
                    raw: None,
                    source: None,
                    context: ErrorContext::new("test"),
                })
            }
        },
        &fast_retry(),
        "client_error",
        |e: &ResearchError| e.is_recoverable(),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_timeout_mechanism() {
    let quick_operation = async {
        sleep(Duration::from_millis(10)).await;
        "Success"
    };

    let result = with_timeout(quick_operation, 100, "quick_test").await;
    assert_eq!(result.unwrap(), "Success");

    let slow_operation = async {
        sleep(Duration::from_millis(200)).await;
        "Should not reach here"
    };

    match with_timeout(slow_operation, 50, "slow_test").await.unwrap_err() {
        ResearchError::Timeout {
            operation,
            duration_ms,
            ..
        } => {
            assert_eq!(operation, "slow_test");
            assert_eq!(duration_ms, 50);
        }
        _ => panic!("Expected Timeout error"),
    }
}

#[tokio::test]
async fn test_process_in_order_preserves_input_order() {
    let items = vec![30u64, 5, 15];

    let results = process_in_order(items, 3, |delay| async move {
        sleep(Duration::from_millis(delay)).await;
        delay
    })
    .await;

    assert_eq!(results, vec![30, 5, 15]);
}

#[test]
fn test_config_validation() {
    let mut config = DeepResearchConfig::default();
    assert!(config.validate().is_ok());

    config.research.breadth = 0;
    match config.validate().unwrap_err() {
        ResearchError::Validation { field, .. } => {
            assert_eq!(field.as_deref(), Some("research.breadth"));
        }
        _ => panic!("Expected Validation error"),
    }

    let mut config = DeepResearchConfig::default();
    config.usage.enabled = true;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = DeepResearchConfig::default();
    config.research.breadth = 4;
    config.search.api_key = Some("fc-test".to_string());
    config.save_to_file(&path).unwrap();

    let loaded = DeepResearchConfig::from_file(&path).unwrap();
    assert_eq!(loaded.research.breadth, 4);
    assert_eq!(loaded.search.api_key.as_deref(), Some("fc-test"));
    assert_eq!(loaded.search.result_limit, 5);
}

#[test]
fn test_partial_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.toml");
    std::fs::write(&path, "[research]\ndepth = 1\n").unwrap();

    let loaded = DeepResearchConfig::from_file(&path).unwrap();
    assert_eq!(loaded.research.depth, 1);
    assert_eq!(loaded.research.breadth, 3);
    assert_eq!(loaded.search.timeout_ms, 15_000);
}

#[test]
fn test_error_macros() {
    let validation_err = validation_error!("Invalid field value", "breadth", "validator");
    match validation_err {
        ResearchError::Validation {
            message,
            field,
            context,
        } => {
            assert_eq!(message, "Invalid field value");
            assert_eq!(field, Some("breadth".to_string()));
            assert_eq!(context.component, "validator");
            assert!(!context.recovery_suggestions.is_empty());
        }
        _ => panic!("Expected Validation error"),
    }
}
