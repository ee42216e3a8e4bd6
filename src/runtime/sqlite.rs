use crate::index::{DocumentType, SlugMapEntry};
use crate::runtime::types::{CorpusProvider, CrossReferenceStore, DocumentQuery, DocumentSource, SectionStore};
use crate::sections::{compare_sections, ParsedSection};
use crate::types::{CrossReferenceEdge, ReferenceType, SectionUpsertStats, SourceDocument};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS documents (
      id TEXT PRIMARY KEY,
      identifier TEXT NOT NULL UNIQUE,
      slug TEXT NOT NULL,
      doc_type TEXT NOT NULL,
      title TEXT NOT NULL,
      html_content TEXT,
      full_text TEXT,
      updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS cross_references (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      source_document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
      target_document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
      reference_type TEXT NOT NULL,
      context TEXT
    );

    CREATE UNIQUE INDEX IF NOT EXISTS cross_references_edge
      ON cross_references(source_document_id, target_document_id, reference_type);

    CREATE TABLE IF NOT EXISTS law_sections (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
      chapter TEXT,
      section TEXT NOT NULL,
      html_content TEXT NOT NULL,
      text_content TEXT NOT NULL,
      heading TEXT,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS law_sections_key
      ON law_sections(document_id, IFNULL(chapter, ''), section);
";

/// A document row as written by [`SqliteStore::insert_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub id: String,
    pub identifier: String,
    pub slug: String,
    pub doc_type: DocumentType,
    pub title: String,
    pub html_content: Option<String>,
    pub full_text: Option<String>,
}

/// Local store backing every collaborator trait with one SQLite database.
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, String> {
        let connection = Connection::open(path)
            .map_err(|e| format!("Failed to open {}: {e}", path.display()))?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self, String> {
        let connection = Connection::open_in_memory().map_err(|e| e.to_string())?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self, String> {
        connection
            .pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| format!("Failed to enable foreign keys: {e}"))?;
        connection
            .execute_batch(SCHEMA)
            .map_err(|e| format!("Failed to create schema: {e}"))?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, String> {
        self.connection.lock().map_err(|e| e.to_string())
    }

    pub fn insert_document(&self, document: &NewDocument) -> Result<(), String> {
        let connection = self.lock()?;
        connection
            .execute(
                "
                INSERT INTO documents(id, identifier, slug, doc_type, title, html_content, full_text)
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                  identifier=excluded.identifier,
                  slug=excluded.slug,
                  doc_type=excluded.doc_type,
                  title=excluded.title,
                  html_content=excluded.html_content,
                  full_text=excluded.full_text
                ",
                params![
                    document.id,
                    document.identifier,
                    document.slug,
                    document.doc_type.as_str(),
                    document.title,
                    document.html_content,
                    document.full_text,
                ],
            )
            .map_err(|e| format!("Failed to insert document {}: {e}", document.id))?;
        Ok(())
    }

    /// Deleting a document also removes its sections and every edge touching it.
    pub fn delete_document(&self, document_id: &str) -> Result<(), String> {
        let connection = self.lock()?;
        connection
            .execute("DELETE FROM documents WHERE id = ?1", params![document_id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn html_content(&self, document_id: &str) -> Result<Option<String>, String> {
        let connection = self.lock()?;
        let html: Option<Option<String>> = connection
            .query_row(
                "SELECT html_content FROM documents WHERE id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.to_string())?;
        Ok(html.flatten())
    }

    /// Write one edge of any type, outside the linkification replace cycle.
    pub fn insert_reference(&self, edge: &CrossReferenceEdge) -> Result<(), String> {
        let connection = self.lock()?;
        connection
            .execute(
                "
                INSERT INTO cross_references(source_document_id, target_document_id, reference_type, context)
                VALUES(?1, ?2, ?3, ?4)
                ON CONFLICT(source_document_id, target_document_id, reference_type) DO UPDATE SET
                  context=excluded.context
                ",
                params![
                    edge.source_document_id,
                    edge.target_document_id,
                    edge.reference_type.as_str(),
                    edge.context,
                ],
            )
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[async_trait]
impl CorpusProvider for SqliteStore {
    async fn load_index_entries(&self) -> Result<Vec<SlugMapEntry>, String> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT identifier, slug, doc_type, title, id FROM documents ORDER BY id")
            .map_err(|e| e.to_string())?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| e.to_string())?;

        let mut entries = Vec::new();
        for row in rows {
            let (identifier, slug, doc_type, title, id) = row.map_err(|e| e.to_string())?;
            entries.push(SlugMapEntry {
                identifier,
                slug,
                doc_type: DocumentType::parse(&doc_type)?,
                title,
                id,
            });
        }
        Ok(entries)
    }
}

#[async_trait]
impl DocumentSource for SqliteStore {
    async fn fetch_documents(&self, query: &DocumentQuery) -> Result<Vec<SourceDocument>, String> {
        let identifiers = if query.identifiers.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&query.identifiers).map_err(|e| e.to_string())?)
        };
        let take = i64::try_from(query.take).unwrap_or(i64::MAX);

        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "
                SELECT id, identifier, html_content, full_text
                FROM documents
                WHERE html_content IS NOT NULL
                  AND (?1 IS NULL OR id > ?1)
                  AND (?2 IS NULL OR doc_type = ?2)
                  AND (?3 IS NULL OR identifier IN (SELECT value FROM json_each(?3)))
                  AND (?5 IS NULL OR identifier >= ?5)
                ORDER BY id
                LIMIT ?4
                ",
            )
            .map_err(|e| e.to_string())?;

        let rows = statement
            .query_map(
                params![
                    query.after_id,
                    query.doc_type.map(DocumentType::as_str),
                    identifiers,
                    take,
                    query.identifier_floor(),
                ],
                |row| {
                    Ok(SourceDocument {
                        id: row.get(0)?,
                        identifier: row.get(1)?,
                        html_content: row.get(2)?,
                        full_text: row.get(3)?,
                    })
                },
            )
            .map_err(|e| e.to_string())?;

        let documents = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        Ok(documents)
    }

    async fn update_html(&self, document_id: &str, html: &str) -> Result<(), String> {
        let connection = self.lock()?;
        let updated = connection
            .execute(
                "UPDATE documents SET html_content = ?2, updated_at = ?3 WHERE id = ?1",
                params![document_id, html, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(|e| e.to_string())?;
        if updated == 0 {
            return Err(format!("Document {document_id} not found"));
        }
        Ok(())
    }
}

#[async_trait]
impl CrossReferenceStore for SqliteStore {
    async fn replace_references(
        &self,
        source_id: &str,
        edges: &[CrossReferenceEdge],
    ) -> Result<usize, String> {
        let mut connection = self.lock()?;
        let tx = connection.transaction().map_err(|e| e.to_string())?;

        tx.execute(
            "DELETE FROM cross_references WHERE source_document_id = ?1 AND reference_type = ?2",
            params![source_id, ReferenceType::References.as_str()],
        )
        .map_err(|e| format!("Failed to clear references of {source_id}: {e}"))?;

        {
            let mut statement = tx
                .prepare(
                    "
                    INSERT INTO cross_references(source_document_id, target_document_id, reference_type, context)
                    VALUES(?1, ?2, ?3, ?4)
                    ",
                )
                .map_err(|e| e.to_string())?;

            for edge in edges {
                statement
                    .execute(params![
                        source_id,
                        edge.target_document_id,
                        ReferenceType::References.as_str(),
                        edge.context,
                    ])
                    .map_err(|e| {
                        format!(
                            "Failed to store reference {} -> {}: {e}",
                            source_id, edge.target_document_id
                        )
                    })?;
            }
        }

        tx.commit().map_err(|e| e.to_string())?;
        Ok(edges.len())
    }

    async fn references_from(&self, source_id: &str) -> Result<Vec<CrossReferenceEdge>, String> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "
                SELECT source_document_id, target_document_id, reference_type, context
                FROM cross_references
                WHERE source_document_id = ?1
                ORDER BY id
                ",
            )
            .map_err(|e| e.to_string())?;
        let rows = statement
            .query_map(params![source_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(|e| e.to_string())?;

        let mut edges = Vec::new();
        for row in rows {
            let (source_document_id, target_document_id, reference_type, context) =
                row.map_err(|e| e.to_string())?;
            edges.push(CrossReferenceEdge {
                source_document_id,
                target_document_id,
                reference_type: ReferenceType::parse(&reference_type)?,
                context,
            });
        }
        Ok(edges)
    }
}

#[async_trait]
impl SectionStore for SqliteStore {
    async fn documents_with_sections(&self) -> Result<HashSet<String>, String> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT DISTINCT document_id FROM law_sections")
            .map_err(|e| e.to_string())?;
        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| e.to_string())?;
        let ids = rows
            .collect::<Result<HashSet<_>, _>>()
            .map_err(|e| e.to_string())?;
        Ok(ids)
    }

    async fn upsert_sections(
        &self,
        document_id: &str,
        sections: &[ParsedSection],
    ) -> Result<SectionUpsertStats, String> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut stats = SectionUpsertStats::default();

        let mut connection = self.lock()?;
        let tx = connection.transaction().map_err(|e| e.to_string())?;

        {
            let mut lookup = tx
                .prepare(
                    "
                    SELECT id, html_content, text_content FROM law_sections
                    WHERE document_id = ?1 AND chapter IS ?2 AND section = ?3
                    ",
                )
                .map_err(|e| e.to_string())?;
            let mut update = tx
                .prepare(
                    "
                    UPDATE law_sections
                    SET html_content = ?2, text_content = ?3, heading = ?4, updated_at = ?5
                    WHERE id = ?1
                    ",
                )
                .map_err(|e| e.to_string())?;
            let mut insert = tx
                .prepare(
                    "
                    INSERT INTO law_sections(document_id, chapter, section, html_content, text_content, heading, created_at, updated_at)
                    VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                    ",
                )
                .map_err(|e| e.to_string())?;

            for section in sections {
                let existing: Option<(i64, String, String)> = lookup
                    .query_row(
                        params![document_id, section.chapter, section.section],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()
                    .map_err(|e| e.to_string())?;

                match existing {
                    Some((id, html, text))
                        if html != section.html_content || text != section.text_content =>
                    {
                        update
                            .execute(params![
                                id,
                                section.html_content,
                                section.text_content,
                                section.heading,
                                now,
                            ])
                            .map_err(|e| e.to_string())?;
                        stats.updated += 1;
                    }
                    Some(_) => stats.unchanged += 1,
                    None => {
                        insert
                            .execute(params![
                                document_id,
                                section.chapter,
                                section.section,
                                section.html_content,
                                section.text_content,
                                section.heading,
                                now,
                            ])
                            .map_err(|e| {
                                format!(
                                    "Failed to insert section {} of {document_id}: {e}",
                                    section.section
                                )
                            })?;
                        stats.created += 1;
                    }
                }
            }
        }

        tx.commit().map_err(|e| e.to_string())?;
        Ok(stats)
    }

    async fn sections_for(&self, document_id: &str) -> Result<Vec<ParsedSection>, String> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "
                SELECT chapter, section, html_content, text_content, heading
                FROM law_sections WHERE document_id = ?1
                ",
            )
            .map_err(|e| e.to_string())?;
        let rows = statement
            .query_map(params![document_id], |row| {
                Ok(ParsedSection {
                    chapter: row.get(0)?,
                    section: row.get(1)?,
                    html_content: row.get(2)?,
                    text_content: row.get(3)?,
                    heading: row.get(4)?,
                })
            })
            .map_err(|e| e.to_string())?;

        let mut sections = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        sections.sort_by(compare_sections);
        Ok(sections)
    }
}
