use async_trait::async_trait;
use legal_xref::runtime::service::{router, JobRunner, JobService, ServiceStatus};
use legal_xref::types::{JobConfig, JobKind};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug)]
enum Seen {
    Ran(JobConfig),
    Failed(JobKind, String),
}

/// Records jobs. Linkify jobs fail so failure reporting can be observed.
struct RecordingRunner {
    events: UnboundedSender<Seen>,
}

#[async_trait]
impl JobRunner for RecordingRunner {
    async fn run(&self, config: JobConfig) -> Result<(), String> {
        let job = config.job;
        let _ = self.events.send(Seen::Ran(config));
        match job {
            JobKind::Linkify => Err("backend unreachable".to_string()),
            JobKind::Sections => Ok(()),
        }
    }

    async fn report_failure(&self, config: &JobConfig, error: &str) {
        let _ = self.events.send(Seen::Failed(config.job, error.to_string()));
    }
}

fn recording_service(idle_after: Duration) -> (Arc<JobService>, UnboundedReceiver<Seen>) {
    let (events, received) = unbounded_channel();
    let service = JobService::new(Arc::new(RecordingRunner { events }), idle_after);
    (service, received)
}

fn sections_job() -> JobConfig {
    serde_json::from_value(json!({
        "job": "sections",
        "callbackBase": "http://localhost:3000",
        "callbackToken": "t",
    }))
    .unwrap()
}

async fn serve(service: Arc<JobService>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router(service)).await });
    format!("http://{addr}")
}

async fn next(received: &mut UnboundedReceiver<Seen>) -> Seen {
    timeout(WAIT, received.recv())
        .await
        .expect("no job event in time")
        .expect("runner dropped")
}

#[tokio::test]
async fn posted_jobs_reach_the_runner() {
    let (service, mut received) = recording_service(Duration::from_secs(60));
    let base = serve(Arc::clone(&service)).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/jobs"))
        .json(&json!({
            "job": "sections",
            "callbackBase": "http://localhost:3000",
            "callbackToken": "secret",
            "batchSize": 25,
            "yearMin": 2010,
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "accepted", "job": "sections" }));

    match next(&mut received).await {
        Seen::Ran(config) => {
            assert_eq!(config.job, JobKind::Sections);
            assert_eq!(config.callback_token, "secret");
            assert_eq!(config.section_options().batch_size, 25);
            assert_eq!(config.section_options().year_min, Some(2010));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn failed_jobs_are_reported() {
    let (service, mut received) = recording_service(Duration::from_secs(60));
    let base = serve(Arc::clone(&service)).await;

    reqwest::Client::new()
        .post(format!("{base}/jobs"))
        .json(&json!({
            "job": "linkify",
            "callbackBase": "http://localhost:3000",
            "callbackToken": "secret",
        }))
        .send()
        .await
        .unwrap();

    assert!(matches!(next(&mut received).await, Seen::Ran(_)));
    match next(&mut received).await {
        Seen::Failed(job, error) => {
            assert_eq!(job, JobKind::Linkify);
            assert_eq!(error, "backend unreachable");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn malformed_jobs_are_rejected() {
    let (service, mut received) = recording_service(Duration::from_secs(60));
    let base = serve(Arc::clone(&service)).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/jobs"))
        .json(&json!({ "job": "reindex" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
    assert!(received.try_recv().is_err());
    assert_eq!(service.status(), ServiceStatus::default());
}

#[tokio::test]
async fn health_and_status_routes() {
    let (service, mut received) = recording_service(Duration::from_secs(60));
    let base = serve(Arc::clone(&service)).await;
    let client = reqwest::Client::new();

    let health = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(health.text().await.unwrap(), "ok");

    service.dispatch(sections_job());
    assert!(matches!(next(&mut received).await, Seen::Ran(_)));

    let status: serde_json::Value = client
        .get(format!("{base}/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["jobsStarted"], 1);
}

#[tokio::test]
async fn idles_out_once_jobs_finish() {
    let (service, mut received) = recording_service(Duration::from_millis(50));
    service.dispatch(sections_job());
    assert!(matches!(next(&mut received).await, Seen::Ran(_)));

    timeout(WAIT, service.wait_until_idle())
        .await
        .expect("service never went idle");
    assert_eq!(
        service.status(),
        ServiceStatus {
            active_jobs: 0,
            jobs_started: 1,
        }
    );
}
