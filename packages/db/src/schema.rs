//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates the job table, its fields and indexes.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(JOB_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Job table schema.
///
/// `status` holds the numeric code (0 queued .. 4 stopped) so the terminal
/// guard can be expressed as `status < 2`. `metadata` is stored as JSON text
/// and decoded leniently on read.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS job_id ON job TYPE string;
DEFINE FIELD IF NOT EXISTS label ON job TYPE string;
DEFINE FIELD IF NOT EXISTS status ON job TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS progress ON job TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS progress_max ON job TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS owner ON job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS is_privileged ON job TYPE bool DEFAULT false;
DEFINE FIELD IF NOT EXISTS is_canceled ON job TYPE bool DEFAULT false;
DEFINE FIELD IF NOT EXISTS metadata ON job TYPE string DEFAULT "{}";
DEFINE FIELD IF NOT EXISTS created_at ON job TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS updated_at ON job TYPE datetime DEFAULT time::now();

DEFINE INDEX IF NOT EXISTS job_id_unique ON job FIELDS job_id UNIQUE;
DEFINE INDEX IF NOT EXISTS job_status ON job FIELDS status;
DEFINE INDEX IF NOT EXISTS job_owner ON job FIELDS owner;
DEFINE INDEX IF NOT EXISTS job_created ON job FIELDS created_at;
"#;
