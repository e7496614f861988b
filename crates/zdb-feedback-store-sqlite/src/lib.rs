//! SQLite persistence for the feedback platform. All collections are
//! append-only; writes run in transactions and rows become visible to
//! reads as soon as the append returns.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;
use zdb_feedback_core::{
    validate_registration, BackendSession, CoreError, FeedbackCategory, FeedbackRecord,
    FeedbackSubmission, PollResponseRecord, PollSubmission, Priority, RecordStatus, Registration,
    RegistrationError, TeacherIdentity, TeacherSession,
};

const LATEST_SCHEMA_VERSION: i64 = 1;

/// Default teacher account seeded on first migrate so a fresh database is
/// immediately usable for demos.
pub const SEED_TEACHER_EMAIL: &str = "testuser@schule.bayern.de";
const SEED_TEACHER_FIRST_NAME: &str = "Test";
const SEED_TEACHER_LAST_NAME: &str = "User";
const SEED_TEACHER_PASSWORD: &str = "password";

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS feedback_records (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  email TEXT NOT NULL,
  school TEXT NOT NULL,
  district TEXT NOT NULL,
  category TEXT NOT NULL,
  priority TEXT NOT NULL CHECK (priority IN ('dringend','hoch','mittel','niedrig')),
  subject TEXT NOT NULL,
  message TEXT NOT NULL,
  created_at TEXT NOT NULL,
  status TEXT NOT NULL,
  anonymous INTEGER NOT NULL CHECK (anonymous IN (0,1)),
  poll_responses_json TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS poll_responses (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  created_at TEXT NOT NULL,
  responses_json TEXT NOT NULL,
  anonymous INTEGER NOT NULL CHECK (anonymous IN (0,1))
);

CREATE TABLE IF NOT EXISTS teachers (
  email TEXT PRIMARY KEY,
  first_name TEXT NOT NULL,
  last_name TEXT NOT NULL,
  password TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS session_flags (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_feedback_records_category ON feedback_records(category);
CREATE INDEX IF NOT EXISTS idx_feedback_records_priority ON feedback_records(priority);
";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Validation(#[from] CoreError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("timestamp format error: {0}")]
    TimestampFormat(#[from] time::error::Format),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("migration error: {0}")]
    Migration(String),
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file and configure the runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas
    /// cannot be applied.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(Self { conn })
    }

    /// Current recorded schema version, 0 for an uninitialized database.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read.
    pub fn schema_version(&self) -> Result<i64, StoreError> {
        self.conn.execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)?;
        current_schema_version(&self.conn)
    }

    /// Apply all forward migrations and seed the default teacher account.
    ///
    /// # Errors
    /// Returns an error when any migration step fails.
    pub fn migrate(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)?;

        let mut version = current_schema_version(&self.conn)?;
        if version == 0 {
            let tx = self.conn.transaction()?;
            tx.execute_batch(MIGRATION_001_SQL)?;
            tx.execute(
                "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
                params![1_i64, now_rfc3339()?],
            )?;
            tx.commit()?;
            version = 1;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(StoreError::Migration(format!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            )));
        }

        self.seed_default_teacher()?;
        Ok(())
    }

    fn seed_default_teacher(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO teachers(email, first_name, last_name, password, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                SEED_TEACHER_EMAIL,
                SEED_TEACHER_FIRST_NAME,
                SEED_TEACHER_LAST_NAME,
                SEED_TEACHER_PASSWORD,
                now_rfc3339()?,
            ],
        )?;
        Ok(())
    }

    /// Validate, redact and persist one feedback submission. Returns the
    /// stored record with its assigned id and timestamp.
    ///
    /// # Errors
    /// Returns a validation error for empty required fields; the store is
    /// untouched on any error.
    pub fn append_feedback(
        &mut self,
        submission: FeedbackSubmission,
    ) -> Result<FeedbackRecord, StoreError> {
        submission.validate()?;
        let submission = submission.redacted();
        let timestamp = OffsetDateTime::now_utc();

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO feedback_records(
                name, email, school, district, category, priority,
                subject, message, created_at, status, anonymous, poll_responses_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                submission.name,
                submission.email,
                submission.school,
                submission.district,
                submission.category.as_str(),
                submission.priority.as_str(),
                submission.subject,
                submission.message,
                rfc3339(timestamp)?,
                RecordStatus::Eingereicht.as_str(),
                i64::from(submission.anonymous),
                "{}",
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(FeedbackRecord {
            id,
            name: submission.name,
            email: submission.email,
            school: submission.school,
            district: submission.district,
            category: submission.category,
            priority: submission.priority,
            subject: submission.subject,
            message: submission.message,
            timestamp,
            status: RecordStatus::Eingereicht,
            anonymous: submission.anonymous,
            poll_responses: BTreeMap::new(),
        })
    }

    /// All stored feedback records in insertion order.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_feedback(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, school, district, category, priority,
                    subject, message, created_at, status, anonymous, poll_responses_json
             FROM feedback_records
             ORDER BY id ASC",
        )?;

        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let category_raw: String = row.get(5)?;
            let priority_raw: String = row.get(6)?;
            let status_raw: String = row.get(10)?;
            let poll_responses_json: String = row.get(12)?;

            records.push(FeedbackRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                school: row.get(3)?,
                district: row.get(4)?,
                category: FeedbackCategory::parse(&category_raw).ok_or_else(|| {
                    StoreError::Corrupt(format!("unknown category: {category_raw}"))
                })?,
                priority: Priority::parse(&priority_raw).ok_or_else(|| {
                    StoreError::Corrupt(format!("unknown priority: {priority_raw}"))
                })?,
                subject: row.get(7)?,
                message: row.get(8)?,
                timestamp: parse_rfc3339(&row.get::<_, String>(9)?)?,
                status: RecordStatus::parse(&status_raw)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown status: {status_raw}")))?,
                anonymous: row.get::<_, i64>(11)? != 0,
                // A corrupt attachment degrades to no attachment, never an error.
                poll_responses: serde_json::from_str(&poll_responses_json).unwrap_or_default(),
            });
        }
        Ok(records)
    }

    /// Validate and persist one poll submission.
    ///
    /// # Errors
    /// Returns a validation error when no question was answered; the store
    /// is untouched on any error.
    pub fn append_poll_response(
        &mut self,
        submission: PollSubmission,
    ) -> Result<PollResponseRecord, StoreError> {
        submission.validate()?;
        let timestamp = OffsetDateTime::now_utc();

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO poll_responses(created_at, responses_json, anonymous)
             VALUES (?1, ?2, ?3)",
            params![
                rfc3339(timestamp)?,
                serde_json::to_string(&submission.responses)?,
                i64::from(submission.anonymous),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(PollResponseRecord {
            id,
            timestamp,
            responses: submission.responses,
            anonymous: submission.anonymous,
        })
    }

    /// All stored poll responses in insertion order.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_poll_responses(&self) -> Result<Vec<PollResponseRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, responses_json, anonymous
             FROM poll_responses
             ORDER BY id ASC",
        )?;

        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let responses_json: String = row.get(2)?;
            records.push(PollResponseRecord {
                id: row.get(0)?,
                timestamp: parse_rfc3339(&row.get::<_, String>(1)?)?,
                responses: serde_json::from_str(&responses_json).unwrap_or_default(),
                anonymous: row.get::<_, i64>(3)? != 0,
            });
        }
        Ok(records)
    }

    /// Validate a registration and append the account. Nothing is written
    /// on any failing rule.
    ///
    /// # Errors
    /// Returns the first failing registration rule, including
    /// [`RegistrationError::EmailTaken`] for a duplicate address.
    pub fn register_teacher(
        &mut self,
        registration: &Registration,
    ) -> Result<TeacherIdentity, StoreError> {
        validate_registration(registration)?;

        let tx = self.conn.transaction()?;
        let taken: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM teachers WHERE email = ?1)",
            params![registration.email],
            |row| row.get(0),
        )?;
        if taken == 1 {
            return Err(RegistrationError::EmailTaken.into());
        }
        tx.execute(
            "INSERT INTO teachers(email, first_name, last_name, password, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                registration.email,
                registration.first_name,
                registration.last_name,
                registration.password,
                now_rfc3339()?,
            ],
        )?;
        tx.commit()?;

        Ok(TeacherIdentity {
            email: registration.email.clone(),
            first_name: registration.first_name.clone(),
            last_name: registration.last_name.clone(),
        })
    }

    /// Check teacher credentials. `Ok(None)` is the single undifferentiated
    /// failure; callers never learn whether the email exists.
    ///
    /// # Errors
    /// Returns an error only for storage faults, never for bad credentials.
    pub fn authenticate_teacher(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<TeacherIdentity>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT email, first_name, last_name FROM teachers
             WHERE email = ?1 AND password = ?2",
        )?;
        let identity = stmt
            .query_row(params![email, password], |row| {
                Ok(TeacherIdentity {
                    email: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                })
            })
            .optional()?;
        Ok(identity)
    }

    /// All registered teacher identities in registration order.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read.
    pub fn list_teachers(&self) -> Result<Vec<TeacherIdentity>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT email, first_name, last_name FROM teachers ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TeacherIdentity {
                email: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
            })
        })?;

        let mut teachers = Vec::new();
        for row in rows {
            teachers.push(row?);
        }
        Ok(teachers)
    }

    /// Load the persisted teacher session snapshot. A missing or corrupt
    /// snapshot reads as logged out.
    ///
    /// # Errors
    /// Returns an error when the flag rows cannot be read.
    pub fn teacher_session(&self) -> Result<TeacherSession, StoreError> {
        let authenticated = self.flag("teacher_authenticated")? == Some("true".to_string());
        let identity = self
            .flag("teacher_user")?
            .and_then(|json| serde_json::from_str(&json).ok());
        Ok(TeacherSession { authenticated: authenticated && identity.is_some(), identity })
    }

    /// Persist the teacher session snapshot. `None` clears it.
    ///
    /// # Errors
    /// Returns an error when the flag write fails.
    pub fn set_teacher_session(
        &mut self,
        identity: Option<&TeacherIdentity>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        match identity {
            Some(identity) => {
                set_flag(&tx, "teacher_authenticated", "true")?;
                set_flag(&tx, "teacher_user", &serde_json::to_string(identity)?)?;
            }
            None => {
                clear_flag(&tx, "teacher_authenticated")?;
                clear_flag(&tx, "teacher_user")?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load the persisted administrative session snapshot.
    ///
    /// # Errors
    /// Returns an error when the flag rows cannot be read.
    pub fn backend_session(&self) -> Result<BackendSession, StoreError> {
        let authenticated = self.flag("backend_authenticated")? == Some("true".to_string());
        let username = self.flag("backend_user")?;
        Ok(BackendSession { authenticated: authenticated && username.is_some(), username })
    }

    /// Persist the administrative session snapshot. `None` clears it.
    ///
    /// # Errors
    /// Returns an error when the flag write fails.
    pub fn set_backend_session(&mut self, username: Option<&str>) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        match username {
            Some(username) => {
                set_flag(&tx, "backend_authenticated", "true")?;
                set_flag(&tx, "backend_user", username)?;
            }
            None => {
                clear_flag(&tx, "backend_authenticated")?;
                clear_flag(&tx, "backend_user")?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn flag(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM session_flags WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }
}

fn set_flag(tx: &rusqlite::Transaction<'_>, key: &str, value: &str) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO session_flags(key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn clear_flag(tx: &rusqlite::Transaction<'_>, key: &str) -> Result<(), StoreError> {
    tx.execute("DELETE FROM session_flags WHERE key = ?1", params![key])?;
    Ok(())
}

fn current_schema_version(conn: &Connection) -> Result<i64, StoreError> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(version)
}

fn now_rfc3339() -> Result<String, StoreError> {
    rfc3339(OffsetDateTime::now_utc())
}

fn rfc3339(value: OffsetDateTime) -> Result<String, StoreError> {
    Ok(value.format(&time::format_description::well_known::Rfc3339)?)
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .map_err(|err| StoreError::Corrupt(format!("invalid RFC3339 timestamp {value}: {err}")))
}
