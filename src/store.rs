use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub(crate) const DB_NAME: &str = ".hector_ide.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub doc_type: String,
    pub synopsis: String,
    #[serde(with = "chrono_serde")]
    pub created_at: DateTime<Utc>,
    pub chapters: Vec<Chapter>,
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub document_id: i64,
    pub position: i64,
    pub title: String,
    pub paragraphs: Vec<String>,
}

/// Listing row: everything about a document except its chapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: i64,
    pub title: String,
    pub doc_type: String,
    #[serde(with = "chrono_serde")]
    pub created_at: DateTime<Utc>,
}

/// Workspace-local store for generated documents. Each document is an ordered
/// list of chapters; each chapter an ordered list of paragraphs. The pipeline
/// writes one document per phase, the exporter reads them back.
pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    pub fn open_or_create(base_path: &Path) -> Result<Self> {
        let db_path = base_path.join(DB_NAME);
        let conn = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn exists(base_path: &Path) -> bool {
        base_path.join(DB_NAME).exists()
    }

    fn initialize_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL UNIQUE,
                doc_type TEXT NOT NULL,
                synopsis TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chapters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                title TEXT NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id),
                UNIQUE(document_id, position)
            );

            CREATE TABLE IF NOT EXISTS paragraphs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chapter_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                text TEXT NOT NULL,
                FOREIGN KEY (chapter_id) REFERENCES chapters(id),
                UNIQUE(chapter_id, position)
            );

            CREATE INDEX IF NOT EXISTS idx_chapters_document ON chapters(document_id);
            CREATE INDEX IF NOT EXISTS idx_paragraphs_chapter ON paragraphs(chapter_id);
            ",
        )?;
        Ok(())
    }

    pub fn create_document(&self, title: &str, doc_type: &str, synopsis: &str) -> Result<i64> {
        let created_at = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO documents (title, doc_type, synopsis, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![title, doc_type, synopsis, created_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Re-running a phase replaces the phase document wholesale rather than
    /// appending chapters to a stale one.
    pub fn replace_document(&self, title: &str, doc_type: &str, synopsis: &str) -> Result<i64> {
        if let Some(existing) = self.find_document_id(title)? {
            self.delete_document(existing)?;
        }
        self.create_document(title, doc_type, synopsis)
    }

    pub fn delete_document(&self, document_id: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM paragraphs WHERE chapter_id IN
                 (SELECT id FROM chapters WHERE document_id = ?1)",
            params![document_id],
        )?;
        self.conn.execute(
            "DELETE FROM chapters WHERE document_id = ?1",
            params![document_id],
        )?;
        self.conn.execute(
            "DELETE FROM documents WHERE id = ?1",
            params![document_id],
        )?;
        Ok(())
    }

    pub fn add_chapter(&self, document_id: i64, position: i64, title: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO chapters (document_id, position, title) VALUES (?1, ?2, ?3)",
            params![document_id, position, title],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_paragraph(&self, chapter_id: i64, position: i64, text: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO paragraphs (chapter_id, position, text) VALUES (?1, ?2, ?3)",
            params![chapter_id, position, text],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_document_id(&self, title: &str) -> Result<Option<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM documents WHERE title = ?1")?;
        stmt.query_row(params![title], |row| row.get(0))
            .optional()
            .context("Failed to query document")
    }

    pub fn get_document(&self, title: &str) -> Result<Option<Document>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, doc_type, synopsis, created_at FROM documents WHERE title = ?1",
        )?;

        let header = stmt
            .query_row(params![title], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .optional()
            .context("Failed to query document")?;

        let Some((id, title, doc_type, synopsis, created_at)) = header else {
            return Ok(None);
        };

        Ok(Some(Document {
            id,
            title,
            doc_type,
            synopsis,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .context("Malformed created_at timestamp")?
                .with_timezone(&Utc),
            chapters: self.load_chapters(id)?,
        }))
    }

    fn load_chapters(&self, document_id: i64) -> Result<Vec<Chapter>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, document_id, position, title FROM chapters
             WHERE document_id = ?1 ORDER BY position",
        )?;

        let mut chapters = stmt
            .query_map(params![document_id], |row| {
                Ok(Chapter {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    position: row.get(2)?,
                    title: row.get(3)?,
                    paragraphs: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for chapter in &mut chapters {
            chapter.paragraphs = self.load_paragraphs(chapter.id)?;
        }
        Ok(chapters)
    }

    fn load_paragraphs(&self, chapter_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT text FROM paragraphs WHERE chapter_id = ?1 ORDER BY position",
        )?;
        let paragraphs = stmt
            .query_map(params![chapter_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(paragraphs)
    }

    pub fn list_documents(&self) -> Result<Vec<DocumentMetadata>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, doc_type, created_at FROM documents ORDER BY created_at, title",
        )?;

        let documents = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(id, title, doc_type, created_at)| {
                Ok(DocumentMetadata {
                    id,
                    title,
                    doc_type,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .context("Malformed created_at timestamp")?
                        .with_timezone(&Utc),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(documents)
    }

    /// Store a whole document in one call. Chapters land in the given order;
    /// each chapter body is stored as a single paragraph.
    pub fn save_phase_document(
        &self,
        title: &str,
        doc_type: &str,
        synopsis: &str,
        chapters: &[(String, String)],
    ) -> Result<i64> {
        let document_id = self.replace_document(title, doc_type, synopsis)?;
        for (position, (chapter_title, body)) in chapters.iter().enumerate() {
            let chapter_id = self.add_chapter(document_id, position as i64, chapter_title)?;
            self.add_paragraph(chapter_id, 0, body)?;
        }
        Ok(document_id)
    }
}
