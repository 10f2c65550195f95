//! Table setup.
//!
//! Creates the commit table and the Q&A table when missing. With `reset`
//! the commit table is dropped and recreated first, which deletes every
//! stored record; the Q&A log is never reset.

use crate::error::IngestError;
use crate::qa_log::QaLog;
use crate::store::VectorStore;

pub async fn run_migrations(
    store: &dyn VectorStore,
    log: &dyn QaLog,
    reset: bool,
) -> Result<(), IngestError> {
    if reset {
        tracing::warn!("resetting commit table; all stored commit records are deleted");
        store.reset_table().await.map_err(IngestError::Setup)?;
    } else {
        store.ensure_table().await.map_err(IngestError::Setup)?;
    }
    log.ensure_table().await.map_err(IngestError::LogSetup)?;
    tracing::info!(reset, "tables ready");
    Ok(())
}
