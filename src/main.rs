use legal_xref::runtime::service::{
    router, CallbackJobRunner, JobService, IDLE_SHUTDOWN, LISTEN_ADDR,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let runner = Arc::new(CallbackJobRunner::new(reqwest::Client::new()));
    let service = JobService::new(runner, IDLE_SHUTDOWN);

    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR)
        .await
        .expect("Failed to bind job service address");

    tracing::info!("[Jobs] Listening on {}", LISTEN_ADDR);

    let idle = Arc::clone(&service);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { idle.wait_until_idle().await })
        .await
        .expect("Server failed");
}
