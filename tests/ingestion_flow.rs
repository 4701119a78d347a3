use helix_gateway::config::IngestConfig;
use helix_gateway::infrastructure::file_system::load_records;
use helix_gateway::{
    CancellationToken, CodeExampleColumns, DocumentColumns, EntityKind, GatewayError,
    IngestionOrchestrator, Metadata, Params, QueryClient, Result, Row, WorkerPool,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every call and can fire a callback after each one.
#[derive(Default)]
struct FakeHelix {
    calls: Mutex<Vec<(String, Params)>>,
    reject_urls: Vec<String>,
    after_call: Option<Box<dyn Fn(usize) + Send + Sync>>,
}

impl FakeHelix {
    fn calls(&self) -> Vec<(String, Params)> {
        self.calls.lock().unwrap().clone()
    }
}

impl QueryClient for FakeHelix {
    fn execute(&self, query_name: &str, params: &Params) -> Result<Vec<Row>> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((query_name.to_string(), params.clone()));
            calls.len()
        };
        if let Some(callback) = &self.after_call {
            callback(count);
        }
        let url = params.get("url").and_then(Value::as_str).unwrap_or_default();
        if self.reject_urls.iter().any(|r| r == url) {
            return Err(GatewayError::Query(format!("addDocument rejected {}", url)));
        }
        Ok(Vec::new())
    }
}

/// Holds every call for a while and remembers how many overlapped.
#[derive(Default)]
struct SlowHelix {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl QueryClient for SlowHelix {
    fn execute(&self, _query_name: &str, _params: &Params) -> Result<Vec<Row>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

fn meta(source: &str) -> Metadata {
    json!({ "source_id": source }).as_object().cloned().unwrap()
}

fn documents(n: usize) -> DocumentColumns {
    DocumentColumns {
        urls: (0..n).map(|i| format!("http://example.com/{}", i)).collect(),
        chunk_numbers: (0..n as i64).collect(),
        contents: (0..n).map(|i| format!("document body {}", i)).collect(),
        metadatas: (0..n).map(|_| meta("example")).collect(),
    }
}

fn code_examples(n: usize) -> CodeExampleColumns {
    CodeExampleColumns {
        urls: (0..n).map(|i| format!("http://example.com/code/{}", i)).collect(),
        chunk_numbers: (0..n as i64).collect(),
        code_examples: (0..n).map(|i| format!("fn f{}() {{}}", i)).collect(),
        summaries: (0..n).map(|i| format!("function {}", i)).collect(),
        metadatas: (0..n).map(|_| meta("example_code")).collect(),
    }
}

fn orchestrator(client: Arc<FakeHelix>, config: IngestConfig) -> IngestionOrchestrator {
    IngestionOrchestrator::new(WorkerPool::new(client, 4), config)
}

#[tokio::test]
async fn test_batch_count_is_ceil_of_len_over_size() {
    for (n, size) in [(0, 3), (1, 3), (3, 3), (4, 3), (10, 1), (101, 50)] {
        let client = Arc::new(FakeHelix::default());
        let config = IngestConfig {
            document_batch_size: size,
            code_example_batch_size: size,
            ..IngestConfig::default()
        };
        let summary = orchestrator(client.clone(), config)
            .ingest(documents(n), code_examples(n), &CancellationToken::new())
            .await
            .unwrap();

        let expected = n.div_ceil(size);
        for kind in EntityKind::ALL {
            assert_eq!(summary.report(kind).batches_submitted, expected, "n={} size={}", n, size);
            assert_eq!(summary.report(kind).succeeded, n);
        }
        assert_eq!(client.calls().len(), 2 * n);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batches_overlap_up_to_the_configured_bound() {
    let client = Arc::new(SlowHelix::default());
    let config = IngestConfig {
        document_batch_size: 1,
        max_concurrent_batches: 2,
        worker_threads: 8,
        ..IngestConfig::default()
    };
    // Records inside a batch go one at a time, so overlapping calls are overlapping batches.
    let orchestrator = IngestionOrchestrator::new(WorkerPool::new(client.clone(), config.worker_threads), config);

    let summary = orchestrator
        .ingest_documents(documents(8), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.report(EntityKind::Document).batches_submitted, 8);
    assert_eq!(summary.total_succeeded(), 8);
    let peak = client.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak {} exceeds max_concurrent_batches", peak);
    assert!(peak > 1, "batches never overlapped");
}

#[tokio::test]
async fn test_wire_params_for_both_kinds() {
    let client = Arc::new(FakeHelix::default());
    orchestrator(client.clone(), IngestConfig::default())
        .ingest(documents(1), code_examples(1), &CancellationToken::new())
        .await
        .unwrap();

    let calls = client.calls();
    let document = calls.iter().find(|(name, _)| name == "addDocument").unwrap();
    assert_eq!(
        Value::Object(document.1.clone()),
        json!({
            "url": "http://example.com/0",
            "chunk_number": 0,
            "content": "document body 0",
            "metadata": "{\"source_id\":\"example\"}",
            "source_id": "example",
        })
    );
    let code = calls.iter().find(|(name, _)| name == "addCodeExample").unwrap();
    assert_eq!(code.1["summary"], json!("function 0"));
    assert_eq!(code.1["source_id"], json!("example_code"));
}

#[tokio::test]
async fn test_failures_are_isolated_and_reported() {
    let client = Arc::new(FakeHelix {
        reject_urls: vec!["http://example.com/2".into(), "http://example.com/5".into()],
        ..Default::default()
    });
    let config = IngestConfig {
        document_batch_size: 3,
        ..IngestConfig::default()
    };

    let summary = orchestrator(client, config)
        .ingest_documents(documents(7), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total_succeeded(), 5);
    assert_eq!(summary.total_failed(), 2);
    let failed: Vec<&str> = summary.failures().map(|f| f.record.url()).collect();
    assert_eq!(failed, vec!["http://example.com/2", "http://example.com/5"]);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn test_cancel_stops_new_batches_but_finishes_in_flight() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let client = Arc::new(FakeHelix {
        // cancel as soon as the first record lands
        after_call: Some(Box::new(move |count| {
            if count == 1 {
                trigger.cancel();
            }
        })),
        ..Default::default()
    });
    let config = IngestConfig {
        document_batch_size: 2,
        max_concurrent_batches: 1,
        ..IngestConfig::default()
    };

    let summary = orchestrator(client.clone(), config)
        .ingest_documents(documents(6), &cancel)
        .await
        .unwrap();

    // the first batch was in flight and completes; the other two never start
    assert_eq!(summary.documents.batches_planned, 3);
    assert_eq!(summary.documents.batches_submitted, 1);
    assert_eq!(summary.documents.batches_skipped, 2);
    assert_eq!(summary.documents.succeeded, 2);
    assert!(summary.cancelled);
    assert_eq!(client.calls().len(), 2);
}

#[tokio::test]
async fn test_records_from_file_are_ingested() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("crawl.jsonl");
    std::fs::write(
        &path,
        concat!(
            r#"{"kind":"document","url":"http://example.com/a","chunk_number":0,"content":"alpha","metadata":{"source_id":"a"}}"#,
            "\n",
            r#"{"kind":"code_example","url":"http://example.com/a","chunk_number":0,"content":"let x = 1;","summary":"binding"}"#,
            "\n",
        ),
    )?;

    let client = Arc::new(FakeHelix::default());
    let records = load_records(&path)?;
    let summary = orchestrator(client.clone(), IngestConfig::default())
        .ingest_records(records, &CancellationToken::new())
        .await?;

    assert_eq!(summary.documents.succeeded, 1);
    assert_eq!(summary.code_examples.succeeded, 1);
    let names: Vec<String> = client.calls().into_iter().map(|(name, _)| name).collect();
    assert!(names.contains(&"addDocument".to_string()));
    assert!(names.contains(&"addCodeExample".to_string()));
    Ok(())
}
