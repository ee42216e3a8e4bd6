use crate::runtime::callbacks::post_job_error;
use crate::runtime::orchestrator::run_job;
use crate::types::JobConfig;
use async_trait::async_trait;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const IDLE_SHUTDOWN: Duration = Duration::from_secs(15);

/// Runs accepted jobs and reports the ones that fail.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, config: JobConfig) -> Result<(), String>;
    async fn report_failure(&self, config: &JobConfig, error: &str);
}

/// Runs jobs against the callback backend named in each request.
pub struct CallbackJobRunner {
    client: Client,
}

impl CallbackJobRunner {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRunner for CallbackJobRunner {
    async fn run(&self, config: JobConfig) -> Result<(), String> {
        run_job(&self.client, config).await
    }

    async fn report_failure(&self, config: &JobConfig, error: &str) {
        post_job_error(&self.client, &config.callback_base, &config.callback_token, error).await;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub active_jobs: usize,
    pub jobs_started: usize,
}

pub struct JobService {
    runner: Arc<dyn JobRunner>,
    active_jobs: AtomicUsize,
    jobs_started: AtomicUsize,
    idle_after: Duration,
}

impl JobService {
    pub fn new(runner: Arc<dyn JobRunner>, idle_after: Duration) -> Arc<Self> {
        Arc::new(Self {
            runner,
            active_jobs: AtomicUsize::new(0),
            jobs_started: AtomicUsize::new(0),
            idle_after,
        })
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            active_jobs: self.active_jobs.load(Ordering::SeqCst),
            jobs_started: self.jobs_started.load(Ordering::SeqCst),
        }
    }

    /// Start `config` in the background. The job counts as active until it
    /// has finished and any failure has been reported.
    pub fn dispatch(self: &Arc<Self>, config: JobConfig) {
        self.active_jobs.fetch_add(1, Ordering::SeqCst);
        self.jobs_started.fetch_add(1, Ordering::SeqCst);
        tracing::info!("[Jobs] Accepted {} job", config.job.as_str());

        let service = Arc::clone(self);
        tokio::spawn(async move {
            let runner = Arc::clone(&service.runner);
            let job = tokio::spawn({
                let config = config.clone();
                async move { runner.run(config).await }
            });

            let failure = match job.await {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err),
                Err(join_err) => Some(format!("Job task aborted: {join_err}")),
            };
            if let Some(error) = failure {
                tracing::error!("[Jobs] {} job failed: {}", config.job.as_str(), error);
                service.runner.report_failure(&config, &error).await;
            }

            service.active_jobs.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Resolve once a full idle period passes with no job running and none
    /// started.
    pub async fn wait_until_idle(&self) {
        let mut seen = self.jobs_started.load(Ordering::SeqCst);
        loop {
            tokio::time::sleep(self.idle_after).await;
            let status = self.status();
            if status.active_jobs == 0 && status.jobs_started == seen {
                tracing::info!(
                    "[Jobs] Idle for {}s after {} jobs, shutting down",
                    self.idle_after.as_secs(),
                    status.jobs_started
                );
                return;
            }
            seen = status.jobs_started;
        }
    }
}

pub fn router(service: Arc<JobService>) -> Router {
    Router::new()
        .route("/jobs", post(handle_job))
        .route("/status", get(handle_status))
        .fallback(handle_health)
        .with_state(service)
}

async fn handle_job(
    State(service): State<Arc<JobService>>,
    Json(config): Json<JobConfig>,
) -> (StatusCode, Json<serde_json::Value>) {
    let job = config.job.as_str();
    service.dispatch(config);
    (StatusCode::OK, Json(json!({ "status": "accepted", "job": job })))
}

async fn handle_status(State(service): State<Arc<JobService>>) -> Json<ServiceStatus> {
    Json(service.status())
}

async fn handle_health() -> &'static str {
    "ok"
}
