//! libSQL storage layer (local file mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding one
//! `legal_entities` row per taxpayer ID and its `bankruptcy_cases` children.
//!
//! **Access rules:**
//! - `innscan run`: read-write via [`Storage::open`]
//! - `innscan show`: read-only via [`Storage::open_readonly`]
//!
//! Writes are whole-record: [`Storage::replace_entity`] deletes the previous
//! entity and all of its cases, then inserts the new set, in one transaction.

mod migrations;

use std::path::Path;

use innscan_shared::{BankruptcyCase, InnScanError, LegalEntity, Result};
use libsql::{Connection, Database, params};
use tracing::warn;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| InnScanError::io(parent, e))?;
        }

        let storage = Self::connect(path, false).await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(InnScanError::Storage(format!(
                "database not found: {}",
                path.display()
            )));
        }
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        // SQLite leaves foreign keys off per connection unless asked.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .await
            .map_err(storage_err)?;

        Ok(Self { db, conn, readonly })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        InnScanError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(InnScanError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entity writes
    // -----------------------------------------------------------------------

    /// Replace everything stored for `entity.inn` with `entity` and `cases`.
    ///
    /// Runs as one transaction: on any error nothing is changed. Returns
    /// `true` when a previous record existed.
    pub async fn replace_entity(
        &self,
        entity: &LegalEntity,
        cases: &[BankruptcyCase],
    ) -> Result<bool> {
        self.check_writable()?;

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        match write_entity(&tx, entity, cases).await {
            Ok(replaced) => {
                tx.commit().await.map_err(storage_err)?;
                Ok(replaced)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(inn = %entity.inn, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Delete an entity and all of its cases. Returns `false` if none existed.
    pub async fn delete_entity(&self, inn: &str) -> Result<bool> {
        self.check_writable()?;

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        match remove_entity(&tx, inn).await {
            Ok(existed) => {
                tx.commit().await.map_err(storage_err)?;
                Ok(existed)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(inn, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Get the entity stored for `inn`.
    pub async fn get_entity(&self, inn: &str) -> Result<Option<LegalEntity>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {ENTITY_COLUMNS} FROM legal_entities WHERE inn = ?1"),
                params![inn],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_entity(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// List all entities ordered by INN.
    pub async fn list_entities(&self) -> Result<Vec<LegalEntity>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {ENTITY_COLUMNS} FROM legal_entities ORDER BY inn"),
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_entity(&row)?);
        }
        Ok(results)
    }

    /// Cases owned by `inn`, in the order they were written.
    pub async fn list_cases(&self, inn: &str) -> Result<Vec<BankruptcyCase>> {
        let mut rows = self
            .conn
            .query(
                "SELECT case_number, inn, claimant_name, judge_name, creditors, third_parties, others
                 FROM bankruptcy_cases WHERE inn = ?1 ORDER BY rowid",
                params![inn],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(BankruptcyCase {
                case_number: row.get::<String>(0).map_err(storage_err)?,
                inn: row.get::<String>(1).map_err(storage_err)?,
                claimant_name: row.get::<String>(2).ok(),
                judge_name: row.get::<String>(3).ok(),
                creditors: row.get::<String>(4).map_err(storage_err)?,
                third_parties: row.get::<String>(5).map_err(storage_err)?,
                others: row.get::<String>(6).map_err(storage_err)?,
            });
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ENTITY_COLUMNS: &str = "inn, display_name, ogrn, case_numbers, archive_path, name_full, \
     name_short, responsible_person, okato, oktmo, okpo, address, status";

fn storage_err(e: libsql::Error) -> InnScanError {
    InnScanError::Storage(e.to_string())
}

/// Children first, then the entity. Returns whether the entity existed.
async fn remove_entity(conn: &Connection, inn: &str) -> Result<bool> {
    conn.execute("DELETE FROM bankruptcy_cases WHERE inn = ?1", params![inn])
        .await
        .map_err(storage_err)?;
    let deleted = conn
        .execute("DELETE FROM legal_entities WHERE inn = ?1", params![inn])
        .await
        .map_err(storage_err)?;
    Ok(deleted > 0)
}

async fn write_entity(
    conn: &Connection,
    entity: &LegalEntity,
    cases: &[BankruptcyCase],
) -> Result<bool> {
    let replaced = remove_entity(conn, &entity.inn).await?;

    conn.execute(
        &format!(
            "INSERT INTO legal_entities ({ENTITY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            entity.inn.as_str(),
            entity.display_name.as_deref(),
            entity.ogrn.as_deref(),
            entity.case_numbers.as_str(),
            entity.archive_path.as_deref(),
            entity.name_full.as_deref(),
            entity.name_short.as_deref(),
            entity.responsible_person.as_deref(),
            entity.okato.as_deref(),
            entity.oktmo.as_deref(),
            entity.okpo.as_deref(),
            entity.address.as_deref(),
            entity.status.as_deref()
        ],
    )
    .await
    .map_err(storage_err)?;

    for case in cases {
        conn.execute(
            "INSERT INTO bankruptcy_cases
                 (case_number, inn, claimant_name, judge_name, creditors, third_parties, others)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                case.case_number.as_str(),
                case.inn.as_str(),
                case.claimant_name.as_deref(),
                case.judge_name.as_deref(),
                case.creditors.as_str(),
                case.third_parties.as_str(),
                case.others.as_str()
            ],
        )
        .await
        .map_err(|e| {
            InnScanError::Storage(format!("case {} not written: {e}", case.case_number))
        })?;
    }

    Ok(replaced)
}

fn row_to_entity(row: &libsql::Row) -> Result<LegalEntity> {
    Ok(LegalEntity {
        inn: row.get::<String>(0).map_err(storage_err)?,
        display_name: row.get::<String>(1).ok(),
        ogrn: row.get::<String>(2).ok(),
        case_numbers: row.get::<String>(3).map_err(storage_err)?,
        archive_path: row.get::<String>(4).ok(),
        name_full: row.get::<String>(5).ok(),
        name_short: row.get::<String>(6).ok(),
        responsible_person: row.get::<String>(7).ok(),
        okato: row.get::<String>(8).ok(),
        oktmo: row.get::<String>(9).ok(),
        okpo: row.get::<String>(10).ok(),
        address: row.get::<String>(11).ok(),
        status: row.get::<String>(12).ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("innscan_test_{}.db", Uuid::now_v7()))
    }

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        Storage::open(&temp_path()).await.expect("open test db")
    }

    fn entity(inn: &str, cases: &[&str]) -> LegalEntity {
        LegalEntity {
            inn: inn.into(),
            display_name: Some("Ivanov I.I.".into()),
            case_numbers: cases.join(", "),
            status: Some("Active".into()),
            ..LegalEntity::default()
        }
    }

    fn case(inn: &str, number: &str) -> BankruptcyCase {
        BankruptcyCase {
            case_number: number.into(),
            inn: inn.into(),
            judge_name: Some("Petrova O.S.".into()),
            creditors: "Bank X".into(),
            ..BankruptcyCase::default()
        }
    }

    async fn count_cases(storage: &Storage) -> i64 {
        let mut rows = storage
            .conn
            .query("SELECT COUNT(*) FROM bankruptcy_cases", params![])
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = temp_path();
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn replace_inserts_then_replaces() {
        let storage = test_storage().await;
        let inn = "7701234567";

        let first = storage
            .replace_entity(
                &entity(inn, &["A40-1/2020", "A40-2/2020"]),
                &[case(inn, "A40-1/2020"), case(inn, "A40-2/2020")],
            )
            .await
            .expect("first write");
        assert!(!first);

        let second = storage
            .replace_entity(&entity(inn, &["A40-3/2023"]), &[case(inn, "A40-3/2023")])
            .await
            .expect("second write");
        assert!(second);

        let stored = storage.get_entity(inn).await.unwrap().expect("entity");
        assert_eq!(stored.case_numbers, "A40-3/2023");
        assert_eq!(stored.status.as_deref(), Some("Active"));
        assert!(stored.ogrn.is_none());

        let cases = storage.list_cases(inn).await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].case_number, "A40-3/2023");
        assert_eq!(cases[0].creditors, "Bank X");
        assert_eq!(count_cases(&storage).await, 1);
        assert_eq!(storage.list_entities().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replace_without_cases_clears_children() {
        let storage = test_storage().await;
        let inn = "7701234567";
        storage
            .replace_entity(&entity(inn, &["A40-1/2020"]), &[case(inn, "A40-1/2020")])
            .await
            .unwrap();

        storage.replace_entity(&entity(inn, &[]), &[]).await.unwrap();

        let stored = storage.get_entity(inn).await.unwrap().unwrap();
        assert_eq!(stored.case_numbers, "");
        assert!(storage.list_cases(inn).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_record() {
        let storage = test_storage().await;
        let inn = "7701234567";
        storage
            .replace_entity(&entity(inn, &["A40-1/2020"]), &[case(inn, "A40-1/2020")])
            .await
            .unwrap();

        // Duplicate primary key inside one write.
        let err = storage
            .replace_entity(
                &entity(inn, &["A40-9/2024", "A40-9/2024"]),
                &[case(inn, "A40-9/2024"), case(inn, "A40-9/2024")],
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("A40-9/2024"));

        let stored = storage.get_entity(inn).await.unwrap().unwrap();
        assert_eq!(stored.case_numbers, "A40-1/2020");
        let cases = storage.list_cases(inn).await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].case_number, "A40-1/2020");
    }

    #[tokio::test]
    async fn case_requires_existing_entity() {
        let storage = test_storage().await;
        let err = storage
            .conn
            .execute(
                "INSERT INTO bankruptcy_cases (case_number, inn) VALUES ('A1', 'nobody')",
                params![],
            )
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn delete_removes_children() {
        let storage = test_storage().await;
        let inn = "500100732259";
        storage
            .replace_entity(
                &entity(inn, &["A41-1/2021", "A41-2/2021"]),
                &[case(inn, "A41-1/2021"), case(inn, "A41-2/2021")],
            )
            .await
            .unwrap();
        storage
            .replace_entity(
                &entity("7701234567", &["A40-5/2022"]),
                &[case("7701234567", "A40-5/2022")],
            )
            .await
            .unwrap();

        assert!(storage.delete_entity(inn).await.unwrap());
        assert!(storage.get_entity(inn).await.unwrap().is_none());
        assert!(storage.list_cases(inn).await.unwrap().is_empty());
        assert_eq!(count_cases(&storage).await, 1);

        assert!(!storage.delete_entity(inn).await.unwrap());
    }

    #[tokio::test]
    async fn cascade_removes_orphans() {
        let storage = test_storage().await;
        let inn = "7701234567";
        storage
            .replace_entity(&entity(inn, &["A40-1/2020"]), &[case(inn, "A40-1/2020")])
            .await
            .unwrap();

        storage
            .conn
            .execute("DELETE FROM legal_entities WHERE inn = ?1", params![inn])
            .await
            .unwrap();
        assert_eq!(count_cases(&storage).await, 0);
    }

    #[tokio::test]
    async fn cases_keep_write_order() {
        let storage = test_storage().await;
        let inn = "7701234567";
        let numbers = ["A40-9/2024", "A40-1/2020", "A40-5/2022"];
        let cases: Vec<_> = numbers.iter().map(|n| case(inn, n)).collect();
        storage
            .replace_entity(&entity(inn, &numbers), &cases)
            .await
            .unwrap();

        let stored: Vec<_> = storage
            .list_cases(inn)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.case_number)
            .collect();
        assert_eq!(stored, numbers);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = temp_path();
        let rw = Storage::open(&tmp).await.unwrap();
        rw.replace_entity(&entity("7701234567", &[]), &[])
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert!(ro.get_entity("7701234567").await.unwrap().is_some());

        let result = ro.replace_entity(&entity("7701234568", &[]), &[]).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
        assert!(ro.delete_entity("7701234567").await.is_err());
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        assert!(Storage::open_readonly(&temp_path()).await.is_err());
    }
}
