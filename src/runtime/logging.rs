use crate::runtime::callbacks::post_debug_log;
use crate::types::{JobConfig, JobKind};
use reqwest::{Client, Url};

/// Hosts whose backends collect job logs.
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "host.docker.internal"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

pub fn is_local_callback_base(callback_base: &str) -> bool {
    Url::parse(callback_base)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .is_some_and(|host| LOCAL_HOSTS.contains(&host.as_str()))
}

struct LogSink {
    client: Client,
    callback_base: String,
    callback_token: String,
}

/// Job-scoped events. Each one goes to `tracing`, and is mirrored to the
/// backend's log endpoint when that backend runs locally.
pub struct JobLogger {
    job: JobKind,
    sink: Option<LogSink>,
}

impl JobLogger {
    pub fn new(client: &Client, config: &JobConfig) -> Self {
        let sink = is_local_callback_base(&config.callback_base).then(|| LogSink {
            client: client.clone(),
            callback_base: config.callback_base.clone(),
            callback_token: config.callback_token.clone(),
        });
        Self {
            job: config.job,
            sink,
        }
    }

    pub fn mirrors_to_backend(&self) -> bool {
        self.sink.is_some()
    }

    pub async fn event(&self, level: LogLevel, message: &str, context: Option<serde_json::Value>) {
        let job = self.job.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(job, "[Jobs] {}", message),
            LogLevel::Info => tracing::info!(job, "[Jobs] {}", message),
            LogLevel::Warn => tracing::warn!(job, "[Jobs] {}", message),
            LogLevel::Error => tracing::error!(job, "[Jobs] {}", message),
        }

        if let Some(sink) = &self.sink {
            let message = format!("[{job}] {message}");
            post_debug_log(
                &sink.client,
                &sink.callback_base,
                &sink.callback_token,
                level.as_str(),
                &message,
                context,
            )
            .await;
        }
    }

    pub async fn info(&self, message: &str, context: Option<serde_json::Value>) {
        self.event(LogLevel::Info, message, context).await;
    }
}
