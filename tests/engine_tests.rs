use std::sync::{Arc, Mutex};
use std::time::Duration;

use ant::error::{AntError, Result};
use ant::export::{CsvSummarySink, ExportSink};
use ant::import::{CsvImportSource, ImportSource, ManualImportSource};
use ant::model::{PathTrace, ReachabilityProbe, TestDefinition, TestKind, TestResult};
use ant::probes::trace::TracerouteConverter;
use ant::probes::{Collaborators, EchoProber, EchoReply, EchoRequest, PathTracer, TraceRequest};
use ant::{Engine, EngineOptions, EngineState};

const TRACE_OUTPUT: &str = "\
traceroute to dns.google (8.8.8.8), 30 hops max, 60 byte packets
 1  gateway.lan (192.168.1.1)  1.123 ms  0.987 ms  1.010 ms
 2  * * *
 3  dns.google (8.8.8.8)  9.512 ms  9.600 ms  9.700 ms
";

#[derive(Default)]
struct FakeEcho {
    calls: Mutex<Vec<EchoRequest>>,
}

#[async_trait::async_trait]
impl EchoProber for FakeEcho {
    async fn probe(&self, request: &EchoRequest) -> Result<EchoReply> {
        self.calls.lock().unwrap().push(request.clone());
        if request.destination.starts_with("fail") {
            return Err(AntError::collaborator("ping", "exit status: 2"));
        }
        let delay = if request.destination.starts_with("slow") { 60 } else { 1 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(EchoReply::from_samples(
            &request.destination,
            request.count,
            vec![1.5; request.count as usize],
        ))
    }
}

#[derive(Default)]
struct FakeTracer {
    calls: Mutex<Vec<TraceRequest>>,
}

#[async_trait::async_trait]
impl PathTracer for FakeTracer {
    async fn trace(&self, request: &TraceRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());
        Ok(TRACE_OUTPUT.to_string())
    }
}

#[derive(Default)]
struct RecordingSink {
    results: Vec<TestResult>,
    flushed: bool,
}

impl ExportSink for RecordingSink {
    fn consume(&mut self, result: TestResult) -> Result<()> {
        self.results.push(result);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushed = true;
        Ok(())
    }
}

struct Fakes {
    echo: Arc<FakeEcho>,
    tracer: Arc<FakeTracer>,
}

impl Fakes {
    fn new() -> Self {
        Self {
            echo: Arc::new(FakeEcho::default()),
            tracer: Arc::new(FakeTracer::default()),
        }
    }

    fn tools(&self) -> Collaborators {
        Collaborators::new(
            self.echo.clone(),
            self.tracer.clone(),
            Arc::new(TracerouteConverter),
        )
    }

    fn echo_calls(&self) -> usize {
        self.echo.calls.lock().unwrap().len()
    }
}

fn ping(id: u64, destination: &str) -> TestDefinition {
    TestDefinition::Reachability(ReachabilityProbe::new(id, destination).unwrap())
}

#[tokio::test]
async fn test_engine_drains_in_source_order() {
    let fakes = Fakes::new();
    let source = ManualImportSource::new(vec![ping(1, "8.8.8.8"), ping(2, "1.1.1.1")]);

    let mut engine = Engine::new(source, RecordingSink::default(), fakes.tools(), EngineOptions::default())
        .await
        .unwrap();
    assert_eq!(engine.state(), EngineState::Idle);

    let summary = engine.run_all().await.unwrap();
    assert_eq!(summary.executed, 2);
    assert_eq!(engine.state(), EngineState::Drained);

    let (mut source, sink) = engine.into_parts();
    let ids: Vec<u64> = sink.results.iter().map(TestResult::id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(sink.flushed);
    assert!(source.next_test().await.unwrap().is_none());
}

#[tokio::test]
async fn test_result_carries_test_identity() {
    let fakes = Fakes::new();
    let source = ManualImportSource::new(vec![ping(41, "8.8.8.8")]);
    let before = chrono::Local::now();

    let mut engine = Engine::new(source, RecordingSink::default(), fakes.tools(), EngineOptions::default())
        .await
        .unwrap();
    engine.run_all().await.unwrap();
    let (_, sink) = engine.into_parts();

    let TestResult::Reachability(result) = &sink.results[0] else {
        panic!("expected a reachability result");
    };
    assert_eq!(result.id, 41);
    assert!(result.timestamp >= before);
    assert_eq!(result.packets_sent, 5);
    assert_eq!(result.packet_loss, 0.0);
    assert!(result.is_alive);

    let calls = fakes.echo.calls.lock().unwrap();
    assert_eq!(calls[0].interval, 0.2);
    assert_eq!(calls[0].payload_size, 56);
    assert!(!calls[0].privileged);
}

#[tokio::test]
async fn test_collaborator_failure_aborts_batch() {
    let fakes = Fakes::new();
    let source = ManualImportSource::new(vec![
        ping(1, "8.8.8.8"),
        ping(2, "fail.example"),
        ping(3, "1.1.1.1"),
    ]);

    let mut engine = Engine::new(source, RecordingSink::default(), fakes.tools(), EngineOptions::default())
        .await
        .unwrap();
    let err = engine.run_all().await.unwrap_err();
    match err {
        AntError::Test { id, source } => {
            assert_eq!(id, 2);
            assert!(matches!(*source, AntError::CollaboratorFailure { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(fakes.echo_calls(), 2);
    assert_eq!(engine.state(), EngineState::Running);
    let summary = engine.run_all().await.unwrap();
    assert_eq!(summary.executed, 0);

    let (_, sink) = engine.into_parts();
    assert_eq!(sink.results.len(), 1);
    assert!(!sink.flushed);
}

#[tokio::test]
async fn test_workers_keep_source_order() {
    let fakes = Fakes::new();
    let source = ManualImportSource::new(vec![
        ping(1, "slow.example"),
        ping(2, "8.8.8.8"),
        ping(3, "slow.example.net"),
        ping(4, "1.1.1.1"),
    ]);

    let mut engine = Engine::new(
        source,
        RecordingSink::default(),
        fakes.tools(),
        EngineOptions { workers: 3 },
    )
    .await
    .unwrap();
    let summary = engine.run_all().await.unwrap();
    assert_eq!(summary.executed, 4);

    let (_, sink) = engine.into_parts();
    let ids: Vec<u64> = sink.results.iter().map(TestResult::id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_path_trace_runs_through_converter() {
    let fakes = Fakes::new();
    let mut trace = PathTrace::new(7, "dns.google").unwrap();
    trace.interval = 0.25;
    trace.resolve_names = false;
    let source = ManualImportSource::new(vec![TestDefinition::PathTrace(trace)]);

    let mut engine = Engine::new(source, RecordingSink::default(), fakes.tools(), EngineOptions::default())
        .await
        .unwrap();
    engine.run_all().await.unwrap();

    let request = fakes.tracer.calls.lock().unwrap()[0].clone();
    assert_eq!(request.interval_ms, 250);
    assert!(!request.resolve_names);
    assert_eq!(request.queries, 3);

    let (_, sink) = engine.into_parts();
    let TestResult::PathTrace(result) = &sink.results[0] else {
        panic!("expected a path trace result");
    };
    assert_eq!(result.id, 7);
    assert_eq!(result.destination_address, "8.8.8.8");
    assert_eq!(result.hops.len(), 3);
    assert!(result.hops[1].probes.is_empty());
}

#[tokio::test]
async fn test_unsupported_result_is_an_error() {
    let fakes = Fakes::new();
    let trace = PathTrace::new(5, "dns.google").unwrap();
    let source = ManualImportSource::new(vec![ping(4, "8.8.8.8"), TestDefinition::PathTrace(trace)]);
    let sink = CsvSummarySink::new(Vec::new());

    let mut engine = Engine::new(source, sink, fakes.tools(), EngineOptions::default())
        .await
        .unwrap();
    let err = engine.run_all().await.unwrap_err();
    match err {
        AntError::Test { id, source } => {
            assert_eq!(id, 5);
            assert!(matches!(
                *source,
                AntError::UnsupportedResult { kind: TestKind::PathTrace, .. }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }

    let (_, sink) = engine.into_parts();
    let written = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(written.lines().count(), 2);
}

#[tokio::test]
async fn test_unknown_kind_fails_before_any_test_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tests.csv");
    std::fs::write(
        &path,
        "test_type,test_id,destination\nping,1,8.8.8.8\nwhois,2,example.com\n",
    )
    .unwrap();

    let fakes = Fakes::new();
    let result = Engine::new(
        CsvImportSource::new(&path),
        RecordingSink::default(),
        fakes.tools(),
        EngineOptions::default(),
    )
    .await;

    let Err(err) = result else {
        panic!("expected import to fail");
    };
    assert!(err.to_string().contains("unknown test kind `whois`"));
    assert_eq!(fakes.echo_calls(), 0);
}

#[tokio::test]
async fn test_csv_batch_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tests.csv");
    std::fs::write(
        &path,
        "kind,id,destination,count,interval\nping,1,8.8.8.8,0,\ntraceroute,2,dns.google,,0.1\n",
    )
    .unwrap();

    let fakes = Fakes::new();
    let summary = ant::run_batch(
        CsvImportSource::new(&path),
        RecordingSink::default(),
        fakes.tools(),
        EngineOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(summary.executed, 2);

    let echo = fakes.echo.calls.lock().unwrap()[0].clone();
    assert_eq!(echo.count, 0);
    assert_eq!(echo.interval, 0.2);
    assert_eq!(fakes.tracer.calls.lock().unwrap()[0].interval_ms, 100);
}
