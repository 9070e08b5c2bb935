//! SQL migration definitions for the innscan database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: legal_entities, bankruptcy_cases",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per taxpayer ID
CREATE TABLE IF NOT EXISTS legal_entities (
    inn                TEXT PRIMARY KEY,
    display_name       TEXT,
    ogrn               TEXT,
    case_numbers       TEXT NOT NULL DEFAULT '',
    archive_path       TEXT,
    name_full          TEXT,
    name_short         TEXT,
    responsible_person TEXT,
    okato              TEXT,
    oktmo              TEXT,
    okpo               TEXT,
    address            TEXT,
    status             TEXT
);

-- Court cases owned by an entity
CREATE TABLE IF NOT EXISTS bankruptcy_cases (
    case_number   TEXT PRIMARY KEY,
    inn           TEXT NOT NULL REFERENCES legal_entities(inn) ON DELETE CASCADE,
    claimant_name TEXT,
    judge_name    TEXT,
    creditors     TEXT NOT NULL DEFAULT '',
    third_parties TEXT NOT NULL DEFAULT '',
    others        TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_bankruptcy_cases_inn ON bankruptcy_cases(inn);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
