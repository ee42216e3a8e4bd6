use crate::index::SlugMapEntry;
use crate::runtime::types::DocumentQuery;
use crate::sections::ParsedSection;
use crate::types::{CrossReferenceEdge, SectionUpsertStats, SourceDocument};
use reqwest::Client;
use serde::de::DeserializeOwned;

pub async fn callback_fetch(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    path: &str,
    method: reqwest::Method,
    body: Option<serde_json::Value>,
) -> Result<reqwest::Response, String> {
    let url = format!("{callback_base}{path}");
    let mut builder = client
        .request(method, &url)
        .header("Authorization", format!("Bearer {callback_token}"));

    if let Some(json_body) = body {
        builder = builder
            .header("Content-Type", "application/json")
            .body(json_body.to_string());
    }

    builder
        .send()
        .await
        .map_err(|e| format!("Request to {url} failed: {e}"))
}

/// POST `body` and decode the JSON answer.
async fn callback_json<T: DeserializeOwned>(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    path: &str,
    body: serde_json::Value,
    label: &str,
) -> Result<T, String> {
    let res = callback_fetch(
        client,
        callback_base,
        callback_token,
        path,
        reqwest::Method::POST,
        Some(body),
    )
    .await?;

    if !res.status().is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(format!("{label} callback failed: {text}"));
    }

    res.json::<T>()
        .await
        .map_err(|e| format!("{label} callback returned invalid JSON: {e}"))
}

async fn callback_ok(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    path: &str,
    body: serde_json::Value,
    label: &str,
) -> Result<(), String> {
    let res = callback_fetch(
        client,
        callback_base,
        callback_token,
        path,
        reqwest::Method::POST,
        Some(body),
    )
    .await?;

    if !res.status().is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(format!("{label} callback failed: {text}"));
    }

    Ok(())
}

pub(crate) async fn post_debug_log(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    level: &str,
    message: &str,
    context: Option<serde_json::Value>,
) {
    let body = serde_json::json!({
        "level": level,
        "message": message,
        "context": context,
    });

    let result = callback_fetch(
        client,
        callback_base,
        callback_token,
        "/api/callback/containerLog",
        reqwest::Method::POST,
        Some(body),
    )
    .await;
    if let Err(err) = result {
        eprintln!(
            "[Jobs][stderr] post_debug_log failed: level={} message={} err={}",
            level, message, err
        );
    }
}

pub async fn fetch_slug_map(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
) -> Result<Vec<SlugMapEntry>, String> {
    callback_json(
        client,
        callback_base,
        callback_token,
        "/api/callback/slugMap",
        serde_json::json!({}),
        "Slug map",
    )
    .await
}

pub async fn fetch_document_batch(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    query: &DocumentQuery,
) -> Result<Vec<SourceDocument>, String> {
    callback_json(
        client,
        callback_base,
        callback_token,
        "/api/callback/documentBatch",
        serde_json::json!(query),
        "Document batch",
    )
    .await
}

pub async fn post_html_update(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    document_id: &str,
    html: &str,
) -> Result<(), String> {
    callback_ok(
        client,
        callback_base,
        callback_token,
        "/api/callback/updateHtml",
        serde_json::json!({ "documentId": document_id, "htmlContent": html }),
        "Update html",
    )
    .await
}

pub async fn post_replace_cross_references(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    source_id: &str,
    edges: &[CrossReferenceEdge],
) -> Result<usize, String> {
    let res: serde_json::Value = callback_json(
        client,
        callback_base,
        callback_token,
        "/api/callback/replaceCrossReferences",
        serde_json::json!({ "sourceDocumentId": source_id, "edges": edges }),
        "Replace cross references",
    )
    .await?;

    Ok(res
        .get("written")
        .and_then(serde_json::Value::as_u64)
        .map_or(edges.len(), |written| written as usize))
}

pub async fn fetch_cross_references(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    source_id: &str,
) -> Result<Vec<CrossReferenceEdge>, String> {
    callback_json(
        client,
        callback_base,
        callback_token,
        "/api/callback/crossReferences",
        serde_json::json!({ "sourceDocumentId": source_id }),
        "Cross references",
    )
    .await
}

pub async fn fetch_documents_with_sections(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
) -> Result<Vec<String>, String> {
    callback_json(
        client,
        callback_base,
        callback_token,
        "/api/callback/sectionDocuments",
        serde_json::json!({}),
        "Section documents",
    )
    .await
}

pub async fn post_upsert_sections(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    document_id: &str,
    sections: &[ParsedSection],
) -> Result<SectionUpsertStats, String> {
    callback_json(
        client,
        callback_base,
        callback_token,
        "/api/callback/upsertSections",
        serde_json::json!({ "documentId": document_id, "sections": sections }),
        "Upsert sections",
    )
    .await
}

pub async fn fetch_sections(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    document_id: &str,
) -> Result<Vec<ParsedSection>, String> {
    callback_json(
        client,
        callback_base,
        callback_token,
        "/api/callback/sections",
        serde_json::json!({ "documentId": document_id }),
        "Sections",
    )
    .await
}

pub async fn post_job_progress(
    client: &Client,
    callback_base: &str,
    callback_token: &str,
    job: &str,
    status: &str,
    stats: serde_json::Value,
) {
    let result = callback_fetch(
        client,
        callback_base,
        callback_token,
        "/api/callback/jobProgress",
        reqwest::Method::POST,
        Some(serde_json::json!({ "job": job, "status": status, "stats": stats })),
    )
    .await;
    if let Err(err) = result {
        tracing::warn!("[Jobs] Progress callback failed: {}", err);
    }
}

pub async fn post_job_error(client: &Client, callback_base: &str, callback_token: &str, error: &str) {
    let _ = callback_fetch(
        client,
        callback_base,
        callback_token,
        "/api/callback/jobError",
        reqwest::Method::POST,
        Some(serde_json::json!({ "error": error })),
    )
    .await;
}
