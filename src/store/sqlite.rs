use super::{decode_timestamp, encode_timestamp, CountFeed, CountPublisher, SessionStore, StoreResult};
use crate::app_dirs::AppDirs;
use crate::filter::{FilterParam, SessionFilter};
use crate::session::{NewSession, PracticeSession, SessionId};
use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};

/// Production store backed by sqlite.
///
/// The count feed only observes mutations made through this handle; the
/// store is single-writer per process, matching the single-owner screen
/// model.
pub struct SqliteStore {
    conn: Connection,
    counts: CountPublisher,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (and if necessary create) the default on-disk database under the
    /// application state directory.
    pub fn open_default() -> StoreResult<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("tempolog.db"));
        Self::open(&db_path)
    }

    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and throwaway invocations.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS practice_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exercise TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                tempo_bpm INTEGER NOT NULL
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_practice_sessions_recorded_at
             ON practice_sessions(recorded_at)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_practice_sessions_exercise
             ON practice_sessions(exercise)",
            [],
        )?;
        Ok(Self {
            conn,
            counts: CountPublisher::default(),
        })
    }

    fn unfiltered_total(&self) -> rusqlite::Result<usize> {
        let total: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM practice_sessions", [], |row| row.get(0))?;
        Ok(total as usize)
    }

    fn publish_total(&mut self) -> StoreResult<()> {
        let total = self.unfiltered_total()?;
        self.counts.publish(total);
        Ok(())
    }

    /// `WHERE` tail for the given filter plus an optional id-set clause.
    /// Every operation goes through here, so count/list/delete cannot
    /// disagree on what a row matches.
    fn where_tail(
        filter: &SessionFilter,
        ids: Option<(&[SessionId], bool)>,
    ) -> (String, Vec<FilterParam>) {
        let (mut clauses, mut params) = filter.where_sql();
        if let Some((ids, negated)) = ids {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let keyword = if negated { "NOT IN" } else { "IN" };
            clauses.insert(0, format!("id {keyword} ({placeholders})"));
            let id_params = ids.iter().map(|id| FilterParam::Int(*id));
            params.splice(0..0, id_params);
        }
        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), params)
        }
    }
}

impl SessionStore for SqliteStore {
    fn count(&self, filter: &SessionFilter) -> StoreResult<usize> {
        let (tail, params) = Self::where_tail(filter, None);
        let sql = format!("SELECT COUNT(*) FROM practice_sessions{tail}");
        let total: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(total as usize)
    }

    fn list(
        &self,
        size: usize,
        offset: usize,
        filter: &SessionFilter,
    ) -> StoreResult<Vec<PracticeSession>> {
        let (tail, mut params) = Self::where_tail(filter, None);
        let sql = format!(
            "SELECT id, exercise, recorded_at, tempo_bpm FROM practice_sessions{tail}
             ORDER BY recorded_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        params.push(FilterParam::Int(size as i64));
        params.push(FilterParam::Int(offset as i64));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let recorded_at: String = row.get(2)?;
            let recorded_at = decode_timestamp(&recorded_at).map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    2,
                    "recorded_at".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            Ok(PracticeSession {
                id: row.get(0)?,
                exercise: row.get(1)?,
                recorded_at,
                tempo_bpm: row.get(3)?,
            })
        })?;
        let mut sessions = Vec::new();
        for session in rows {
            sessions.push(session?);
        }
        Ok(sessions)
    }

    fn insert(&mut self, session: NewSession) -> StoreResult<SessionId> {
        self.conn.execute(
            "INSERT INTO practice_sessions (exercise, recorded_at, tempo_bpm) VALUES (?1, ?2, ?3)",
            params![
                session.exercise,
                encode_timestamp(&session.recorded_at),
                session.tempo_bpm,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.publish_total()?;
        Ok(id)
    }

    fn delete(&mut self, ids: &[SessionId], filter: &SessionFilter) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let (tail, params) = Self::where_tail(filter, Some((ids, false)));
        let sql = format!("DELETE FROM practice_sessions{tail}");
        let affected = self.conn.execute(&sql, params_from_iter(params.iter()))?;
        if affected > 0 {
            self.publish_total()?;
        }
        Ok(affected)
    }

    fn delete_other(&mut self, ids: &[SessionId], filter: &SessionFilter) -> StoreResult<usize> {
        // An empty exclusion set means "delete everything matching".
        let id_clause = if ids.is_empty() {
            None
        } else {
            Some((ids, true))
        };
        let (tail, params) = Self::where_tail(filter, id_clause);
        let sql = format!("DELETE FROM practice_sessions{tail}");
        let affected = self.conn.execute(&sql, params_from_iter(params.iter()))?;
        if affected > 0 {
            self.publish_total()?;
        }
        Ok(affected)
    }

    fn subscribe_total_count(&mut self) -> StoreResult<CountFeed> {
        let current = self.unfiltered_total()?;
        Ok(self.counts.subscribe(current))
    }
}
