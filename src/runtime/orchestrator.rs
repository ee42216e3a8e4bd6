use crate::index::{DocumentIndex, DocumentType, SlugMapEntry};
use crate::linkify::linkify_html;
use crate::persist::{dedupe_by_target, save_cross_references};
use crate::plain_text::html_to_plain_text;
use crate::runtime::callbacks::{
    fetch_cross_references, fetch_document_batch, fetch_documents_with_sections, fetch_sections,
    fetch_slug_map, post_html_update, post_job_progress, post_replace_cross_references,
    post_upsert_sections,
};
use crate::runtime::logging::JobLogger;
use crate::runtime::types::{
    CorpusProvider, CrossReferenceStore, DocumentQuery, DocumentSource, SectionStore,
};
use crate::sections::{parse_law_sections, ParsedSection};
use crate::types::{
    CrossReferenceEdge, JobConfig, JobKind, LinkifyOptions, SectionJobOptions, SectionUpsertStats,
    SourceDocument,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashSet;

/// Every collaborator trait served by the application backend's callback API.
pub struct HttpBackend {
    client: Client,
    callback_base: String,
    callback_token: String,
}

impl HttpBackend {
    pub fn new(client: Client, callback_base: &str, callback_token: &str) -> Self {
        Self {
            client,
            callback_base: callback_base.to_string(),
            callback_token: callback_token.to_string(),
        }
    }
}

#[async_trait]
impl CorpusProvider for HttpBackend {
    async fn load_index_entries(&self) -> Result<Vec<SlugMapEntry>, String> {
        fetch_slug_map(&self.client, &self.callback_base, &self.callback_token).await
    }
}

#[async_trait]
impl DocumentSource for HttpBackend {
    async fn fetch_documents(&self, query: &DocumentQuery) -> Result<Vec<SourceDocument>, String> {
        fetch_document_batch(&self.client, &self.callback_base, &self.callback_token, query).await
    }

    async fn update_html(&self, document_id: &str, html: &str) -> Result<(), String> {
        post_html_update(
            &self.client,
            &self.callback_base,
            &self.callback_token,
            document_id,
            html,
        )
        .await
    }
}

#[async_trait]
impl CrossReferenceStore for HttpBackend {
    async fn replace_references(
        &self,
        source_id: &str,
        edges: &[CrossReferenceEdge],
    ) -> Result<usize, String> {
        post_replace_cross_references(
            &self.client,
            &self.callback_base,
            &self.callback_token,
            source_id,
            edges,
        )
        .await
    }

    async fn references_from(&self, source_id: &str) -> Result<Vec<CrossReferenceEdge>, String> {
        fetch_cross_references(&self.client, &self.callback_base, &self.callback_token, source_id)
            .await
    }
}

#[async_trait]
impl SectionStore for HttpBackend {
    async fn documents_with_sections(&self) -> Result<HashSet<String>, String> {
        let ids =
            fetch_documents_with_sections(&self.client, &self.callback_base, &self.callback_token)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn upsert_sections(
        &self,
        document_id: &str,
        sections: &[ParsedSection],
    ) -> Result<SectionUpsertStats, String> {
        post_upsert_sections(
            &self.client,
            &self.callback_base,
            &self.callback_token,
            document_id,
            sections,
        )
        .await
    }

    async fn sections_for(&self, document_id: &str) -> Result<Vec<ParsedSection>, String> {
        fetch_sections(&self.client, &self.callback_base, &self.callback_token, document_id).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkifyStats {
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub links_created: usize,
    pub cross_refs_written: usize,
    pub errors: usize,
}

/// Failures reported in the final log of a section run.
const REPORTED_FAILURES: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStats {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub sections_found: usize,
    pub sections_created: usize,
    pub sections_updated: usize,
    pub errors: Vec<SectionFailure>,
}

/// A statute whose sections could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionFailure {
    pub identifier: String,
    pub error: String,
}

enum DocumentOutcome {
    Updated { links: usize, cross_refs: usize },
    Skipped,
}

/// Linkify every document that has markup and refresh its outbound
/// citation edges.
///
/// A failing document is logged and counted; the batch carries on.
pub async fn run_linkify_batch(
    corpus: &dyn CorpusProvider,
    documents: &dyn DocumentSource,
    references: &dyn CrossReferenceStore,
    options: &LinkifyOptions,
) -> Result<LinkifyStats, String> {
    let index = DocumentIndex::build(corpus).await?;
    let mut stats = LinkifyStats::default();
    let mut cursor: Option<String> = None;

    tracing::info!(
        "[Linkify] Starting backfill (batch size {}, limit {:?}, dry run {})",
        options.batch_size,
        options.limit,
        options.dry_run
    );

    loop {
        let take = match options.limit {
            Some(limit) if stats.processed >= limit => break,
            Some(limit) => options.batch_size.min(limit - stats.processed),
            None => options.batch_size,
        };

        let batch = documents
            .fetch_documents(&DocumentQuery {
                after_id: cursor.clone(),
                take,
                identifiers: options.identifiers.clone(),
                doc_type: None,
                year_min: None,
            })
            .await?;
        let Some(last) = batch.last() else {
            break;
        };
        cursor = Some(last.id.clone());

        for document in &batch {
            stats.processed += 1;
            match linkify_document(&index, documents, references, document, options.dry_run).await
            {
                Ok(DocumentOutcome::Updated { links, cross_refs }) => {
                    stats.updated += 1;
                    stats.links_created += links;
                    stats.cross_refs_written += cross_refs;
                }
                Ok(DocumentOutcome::Skipped) => stats.skipped += 1,
                Err(err) => {
                    stats.errors += 1;
                    tracing::error!(
                        "[Linkify] Failed to process {} ({}): {}",
                        document.identifier,
                        document.id,
                        err
                    );
                }
            }
        }

        tracing::info!(
            "[Linkify] {} processed: updated={} skipped={} errors={} links={} crossRefs={}",
            stats.processed,
            stats.updated,
            stats.skipped,
            stats.errors,
            stats.links_created,
            stats.cross_refs_written
        );

        if batch.len() < take {
            break;
        }
    }

    Ok(stats)
}

async fn linkify_document(
    index: &DocumentIndex,
    documents: &dyn DocumentSource,
    references: &dyn CrossReferenceStore,
    document: &SourceDocument,
    dry_run: bool,
) -> Result<DocumentOutcome, String> {
    let result = linkify_html(&document.html_content, index, Some(&document.identifier));
    if result.linked_references.is_empty() {
        return Ok(DocumentOutcome::Skipped);
    }

    let links = result.linked_references.len();
    if dry_run {
        let cross_refs = dedupe_by_target(&result.linked_references).len();
        return Ok(DocumentOutcome::Updated { links, cross_refs });
    }

    documents.update_html(&document.id, &result.html).await?;

    let plain_text = match &document.full_text {
        Some(text) => text.clone(),
        None => html_to_plain_text(&document.html_content)?,
    };
    let cross_refs = save_cross_references(
        references,
        &document.id,
        &result.linked_references,
        &plain_text,
    )
    .await?;

    Ok(DocumentOutcome::Updated { links, cross_refs })
}

/// Parse the sections of every statute and upsert them, one transaction
/// per statute.
pub async fn run_section_batch(
    documents: &dyn DocumentSource,
    sections: &dyn SectionStore,
    options: &SectionJobOptions,
) -> Result<SectionStats, String> {
    let already_parsed = if options.resume {
        let ids = sections.documents_with_sections().await?;
        tracing::info!("[Sections] Resume mode: {} statutes already have sections", ids.len());
        ids
    } else {
        HashSet::new()
    };

    tracing::info!(
        "[Sections] Starting (batch size {}, limit {:?}, year min {:?}, dry run {})",
        options.batch_size,
        options.limit,
        options.year_min,
        options.dry_run
    );

    let mut stats = SectionStats::default();
    let mut cursor: Option<String> = None;

    'pages: loop {
        let batch = documents
            .fetch_documents(&DocumentQuery {
                after_id: cursor.clone(),
                take: options.batch_size,
                identifiers: options.identifiers.clone(),
                doc_type: Some(DocumentType::Statute),
                year_min: options.year_min,
            })
            .await?;
        let Some(last) = batch.last() else {
            break;
        };
        cursor = Some(last.id.clone());

        for document in &batch {
            if options.limit.is_some_and(|limit| stats.processed >= limit) {
                tracing::info!("[Sections] Reached limit of {} statutes", stats.processed);
                break 'pages;
            }

            if already_parsed.contains(&document.id) {
                stats.skipped += 1;
                continue;
            }

            if let Err(err) = process_statute(sections, document, options.dry_run, &mut stats).await {
                stats.failed += 1;
                tracing::error!("[Sections] {}: {}", document.identifier, err);
                stats.errors.push(SectionFailure {
                    identifier: document.identifier.clone(),
                    error: err,
                });
            }
        }

        tracing::info!(
            "[Sections] Progress: {} processed, {} skipped, {} failed",
            stats.processed,
            stats.skipped,
            stats.failed
        );

        if batch.len() < options.batch_size {
            break;
        }
    }

    report_section_failures(&stats.errors);
    Ok(stats)
}

fn report_section_failures(errors: &[SectionFailure]) {
    if errors.is_empty() {
        return;
    }
    tracing::warn!("[Sections] {} statutes failed", errors.len());
    for failure in errors.iter().take(REPORTED_FAILURES) {
        tracing::warn!("[Sections]   {}: {}", failure.identifier, failure.error);
    }
    if errors.len() > REPORTED_FAILURES {
        tracing::warn!("[Sections]   ... and {} more", errors.len() - REPORTED_FAILURES);
    }
}

async fn process_statute(
    sections: &dyn SectionStore,
    document: &SourceDocument,
    dry_run: bool,
    stats: &mut SectionStats,
) -> Result<(), String> {
    let result = parse_law_sections(&document.html_content);

    // Repealed or appendix-only statutes have no numbered sections.
    if result.sections.is_empty() {
        stats.skipped += 1;
        return Ok(());
    }

    stats.sections_found += result.sections.len();

    if dry_run {
        stats.sections_created += result.sections.len();
    } else {
        let upserted = sections
            .upsert_sections(&document.id, &result.sections)
            .await?;
        stats.sections_created += upserted.created;
        stats.sections_updated += upserted.updated;
    }

    stats.processed += 1;
    Ok(())
}

/// Run one job against the callback backend and report its outcome there.
pub async fn run_job(client: &Client, config: JobConfig) -> Result<(), String> {
    let backend = HttpBackend::new(client.clone(), &config.callback_base, &config.callback_token);
    let log = JobLogger::new(client, &config);

    log.info("Starting job", None).await;

    let stats = match config.job {
        JobKind::Linkify => {
            let stats =
                run_linkify_batch(&backend, &backend, &backend, &config.linkify_options()).await?;
            serde_json::to_value(stats).map_err(|e| e.to_string())?
        }
        JobKind::Sections => {
            let stats = run_section_batch(&backend, &backend, &config.section_options()).await?;
            serde_json::to_value(stats).map_err(|e| e.to_string())?
        }
    };

    log.info("Finished job", Some(stats.clone())).await;

    post_job_progress(
        client,
        &config.callback_base,
        &config.callback_token,
        config.job.as_str(),
        "completed",
        stats,
    )
    .await;

    Ok(())
}
