//! libSQL backend: async `ProfileStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::model::{Profile, Sex};
use crate::store::migrations;
use crate::store::traits::ProfileStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn opt_int(v: Option<i64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Integer(v),
        None => libsql::Value::Null,
    }
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn read_opt_int(row: &libsql::Row, idx: i32) -> Result<Option<i64>, libsql::Error> {
    match row.get_value(idx)? {
        libsql::Value::Integer(v) => Ok(Some(v)),
        _ => Ok(None),
    }
}

fn read_opt_text(row: &libsql::Row, idx: i32) -> Result<Option<String>, libsql::Error> {
    match row.get_value(idx)? {
        libsql::Value::Text(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Map a libsql Row to a Profile.
///
/// Column order matches PROFILE_COLUMNS:
/// 0:id, 1:vk_id, 2:city_id, 3:city_title, 4:age, 5:sex
fn row_to_profile(row: &libsql::Row) -> Result<Profile, libsql::Error> {
    let db_id: i64 = row.get(0)?;
    let user_id: i64 = row.get(1)?;
    let sex_code = read_opt_int(row, 5)?.unwrap_or(0);

    Ok(Profile {
        db_id: Some(db_id),
        user_id,
        city_id: read_opt_int(row, 2)?,
        city_title: read_opt_text(row, 3)?,
        age: read_opt_int(row, 4)?.and_then(|a| i32::try_from(a).ok()),
        sex: Sex::from(sex_code),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const PROFILE_COLUMNS: &str = "id, vk_id, city_id, city_title, age, sex";

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM users WHERE vk_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let profile = row_to_profile(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_profile row parse: {e}")))?;
                Ok(Some(profile))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "INSERT INTO users (vk_id, city_id, city_title, age, sex) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (vk_id) DO UPDATE SET
                    city_id = excluded.city_id,
                    city_title = excluded.city_title,
                    age = excluded.age,
                    sex = excluded.sex,
                    updated_at = datetime('now')
                 RETURNING id",
                params![
                    profile.user_id,
                    opt_int(profile.city_id),
                    opt_text(profile.city_title.as_deref()),
                    opt_int(profile.age.map(i64::from)),
                    profile.sex.code(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_profile: {e}")))?;

        let db_id: i64 = match rows.next().await {
            Ok(Some(row)) => row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("upsert_profile row parse: {e}")))?,
            Ok(None) => {
                return Err(DatabaseError::Query(
                    "upsert_profile: no id returned".to_string(),
                ));
            }
            Err(e) => return Err(DatabaseError::Query(format!("upsert_profile: {e}"))),
        };

        debug!(user_id = profile.user_id, db_id, "Profile saved");
        Ok(Profile {
            db_id: Some(db_id),
            ..profile.clone()
        })
    }

    async fn delete_profile(&self, user_id: i64) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM users WHERE vk_id = ?1", params![user_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_profile: {e}")))?;
        Ok(count > 0)
    }

    // ── Partner ledger ──────────────────────────────────────────────

    async fn ledger_contains(&self, partner_id: i64) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM partners WHERE vk_id = ?1",
                params![partner_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("ledger_contains: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) > 0),
            Ok(None) => Ok(false),
            Err(e) => Err(DatabaseError::Query(format!("ledger_contains: {e}"))),
        }
    }

    async fn ledger_add(&self, partner_id: i64) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO partners (vk_id) VALUES (?1)",
                params![partner_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("ledger_add: {e}")))?;

        if count == 0 {
            debug!(partner_id, "Partner already in ledger");
        }
        Ok(count > 0)
    }

    async fn ledger_clear_all(&self) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM partners", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("ledger_clear_all: {e}")))?;
        Ok(count as usize)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn full_profile(user_id: i64) -> Profile {
        Profile {
            db_id: None,
            user_id,
            city_id: Some(1),
            city_title: Some("Москва".to_string()),
            age: Some(30),
            sex: Sex::Male,
        }
    }

    // ── Profile tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn get_profile_not_found() {
        let db = test_db().await;
        assert!(db.get_profile(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_and_get_profile() {
        let db = test_db().await;
        let saved = db.upsert_profile(&full_profile(10)).await.unwrap();
        assert!(saved.db_id.is_some());

        let fetched = db.get_profile(10).await.unwrap().unwrap();
        assert_eq!(fetched, saved);
        assert_eq!(fetched.city_title.as_deref(), Some("Москва"));
        assert_eq!(fetched.sex, Sex::Male);
    }

    #[tokio::test]
    async fn upsert_keeps_row_id_and_updates_fields() {
        let db = test_db().await;
        let first = db.upsert_profile(&full_profile(10)).await.unwrap();

        let mut changed = first.clone();
        changed.age = Some(31);
        changed.sex = Sex::Female;
        let second = db.upsert_profile(&changed).await.unwrap();

        assert_eq!(first.db_id, second.db_id);
        let fetched = db.get_profile(10).await.unwrap().unwrap();
        assert_eq!(fetched.age, Some(31));
        assert_eq!(fetched.sex, Sex::Female);
    }

    #[tokio::test]
    async fn upsert_profile_with_unset_fields() {
        let db = test_db().await;
        db.upsert_profile(&Profile::new(5)).await.unwrap();

        let fetched = db.get_profile(5).await.unwrap().unwrap();
        assert!(fetched.city_id.is_none());
        assert!(fetched.city_title.is_none());
        assert!(fetched.age.is_none());
        assert_eq!(fetched.sex, Sex::Unknown);
    }

    #[tokio::test]
    async fn delete_profile() {
        let db = test_db().await;
        db.upsert_profile(&full_profile(10)).await.unwrap();

        assert!(db.delete_profile(10).await.unwrap());
        assert!(db.get_profile(10).await.unwrap().is_none());
        assert!(!db.delete_profile(10).await.unwrap());
    }

    // ── Ledger tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn ledger_add_is_idempotent() {
        let db = test_db().await;
        assert!(!db.ledger_contains(99).await.unwrap());

        assert!(db.ledger_add(99).await.unwrap());
        assert!(!db.ledger_add(99).await.unwrap());
        assert!(db.ledger_contains(99).await.unwrap());
    }

    #[tokio::test]
    async fn ledger_clear_all_removes_every_partner() {
        let db = test_db().await;
        db.ledger_add(1).await.unwrap();
        db.ledger_add(2).await.unwrap();

        assert_eq!(db.ledger_clear_all().await.unwrap(), 2);
        assert!(!db.ledger_contains(1).await.unwrap());
        assert!(!db.ledger_contains(2).await.unwrap());
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vkinder.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.upsert_profile(&full_profile(3)).await.unwrap();
            db.ledger_add(77).await.unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(db.get_profile(3).await.unwrap().unwrap().age, Some(30));
        assert!(db.ledger_contains(77).await.unwrap());
    }
}
