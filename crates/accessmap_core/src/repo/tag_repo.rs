//! Tag repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the abstract persistence medium: whole-collection read and
//!   whole-collection write per namespace.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `replace_tags` is atomic: readers see the old or the new collection.
//! - Collection order survives a write/read cycle.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::geo::{is_valid_lat, is_valid_lon};
use crate::model::tag::{SourceKind, Tag, TagSource, TagType};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TAG_SELECT_SQL: &str = "SELECT
    id,
    type,
    lat,
    lon,
    source,
    confidence,
    osm_id,
    address,
    notes,
    timestamp,
    readonly
FROM tags";

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence-medium error.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// The medium cannot be used at all (degraded environment).
    Unavailable(String),
    InvalidNamespace(String),
    InvalidData(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unavailable(reason) => write!(f, "tag storage unavailable: {reason}"),
            Self::InvalidNamespace(value) => write!(f, "invalid tag namespace `{value}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted tag data: {message}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::Unavailable(_) | Self::InvalidNamespace(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// One stored namespace and the number of tags it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceSummary {
    pub namespace: String,
    pub tag_count: usize,
}

/// Whole-collection persistence medium for one tag namespace.
pub trait TagRepository {
    /// Reads the full collection in stored order.
    fn load_tags(&self) -> RepoResult<Vec<Tag>>;
    /// Replaces the full collection in one write.
    fn replace_tags(&mut self, tags: &[Tag]) -> RepoResult<()>;
}

/// SQLite-backed tag repository bound to one namespace.
pub struct SqliteTagRepository {
    conn: Connection,
    namespace: String,
}

impl SqliteTagRepository {
    /// Wraps a connection returned by `db::open_db`/`db::open_db_in_memory`.
    ///
    /// # Errors
    /// - `InvalidNamespace` when `namespace` is blank.
    /// - `InvalidData` when the connection has not been migrated.
    pub fn try_new(conn: Connection, namespace: impl Into<String>) -> RepoResult<Self> {
        let namespace = normalize_namespace(namespace.into())?;
        ensure_connection_ready(&conn)?;
        Ok(Self { conn, namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Lists every namespace holding at least one tag, ordered by name.
    pub fn list_namespaces(conn: &Connection) -> RepoResult<Vec<NamespaceSummary>> {
        ensure_connection_ready(conn)?;
        let mut stmt = conn.prepare(
            "SELECT namespace, COUNT(*) AS tag_count
             FROM tags
             GROUP BY namespace
             ORDER BY namespace ASC;",
        )?;

        let mut rows = stmt.query([])?;
        let mut namespaces = Vec::new();
        while let Some(row) = rows.next()? {
            let tag_count: i64 = row.get("tag_count")?;
            namespaces.push(NamespaceSummary {
                namespace: row.get("namespace")?,
                tag_count: usize::try_from(tag_count).map_err(|_| {
                    RepoError::InvalidData(format!("invalid tag count `{tag_count}`"))
                })?,
            });
        }

        Ok(namespaces)
    }
}

impl TagRepository for SqliteTagRepository {
    fn load_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TAG_SELECT_SQL}
             WHERE namespace = ?1
             ORDER BY position ASC, id ASC;"
        ))?;

        let mut rows = stmt.query([self.namespace.as_str()])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(parse_tag_row(row)?);
        }

        Ok(tags)
    }

    fn replace_tags(&mut self, tags: &[Tag]) -> RepoResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM tags WHERE namespace = ?1;", [self.namespace.as_str()])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO tags (
                    namespace,
                    id,
                    position,
                    type,
                    lat,
                    lon,
                    source,
                    confidence,
                    osm_id,
                    address,
                    notes,
                    timestamp,
                    readonly
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            )?;
            for (position, tag) in tags.iter().enumerate() {
                insert.execute(params![
                    self.namespace.as_str(),
                    tag.id.as_str(),
                    position as i64,
                    tag.kind.as_str(),
                    tag.lat,
                    tag.lon,
                    tag.source_kind().as_str(),
                    tag.confidence(),
                    tag.osm_id(),
                    tag.address.as_deref(),
                    tag.notes.as_deref(),
                    tag.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    i64::from(tag.readonly),
                ])?;
            }
        }
        tx.commit()?;

        Ok(())
    }
}

pub(crate) fn normalize_namespace(namespace: String) -> RepoResult<String> {
    let trimmed = namespace.trim();
    if trimmed.is_empty() {
        return Err(RepoError::InvalidNamespace(namespace));
    }
    Ok(trimmed.to_string())
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let version = current_user_version(conn)?;
    let expected = latest_version();
    if version != expected {
        return Err(RepoError::InvalidData(format!(
            "schema version {version} does not match expected {expected}; open the connection through db::open_db"
        )));
    }
    Ok(())
}

fn parse_tag_row(row: &Row<'_>) -> RepoResult<Tag> {
    let id: String = row.get("id")?;

    let type_text: String = row.get("type")?;
    let kind = TagType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("blank tag type for `{id}` in tags.type"))
    })?;

    let lat: f64 = row.get("lat")?;
    let lon: f64 = row.get("lon")?;
    if !is_valid_lat(lat) || !is_valid_lon(lon) {
        return Err(RepoError::InvalidData(format!(
            "out-of-range coordinates for `{id}` in tags.lat/tags.lon"
        )));
    }

    let source_text: String = row.get("source")?;
    let source = match SourceKind::parse(&source_text) {
        Some(SourceKind::User) => TagSource::User,
        Some(SourceKind::Osm) => TagSource::Osm {
            osm_id: row.get("osm_id")?,
        },
        Some(SourceKind::Model) => TagSource::Model {
            confidence: row.get("confidence")?,
        },
        None => {
            return Err(RepoError::InvalidData(format!(
                "invalid source `{source_text}` in tags.source"
            )));
        }
    };

    let timestamp_text: String = row.get("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_text)
        .map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid timestamp `{timestamp_text}` in tags.timestamp"
            ))
        })?
        .with_timezone(&Utc);

    let readonly = match row.get::<_, i64>("readonly")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid readonly value `{other}` in tags.readonly"
            )));
        }
    };

    Ok(Tag {
        id,
        kind,
        lat,
        lon,
        source,
        address: row.get("address")?,
        notes: row.get("notes")?,
        timestamp,
        readonly,
    })
}
