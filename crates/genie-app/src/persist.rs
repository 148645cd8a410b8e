// Moving session state in and out of the SQLite store.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use genie_core::config::Calibration;
use genie_core::store::Store;

use crate::session::{EstimationLock, Session};

/// `session_state` key holding the estimation lock.
pub const LOCK_STATE_KEY: &str = "estimation_lock";

/// `session_state` key holding the TCF/ECF calibration.
pub const CALIBRATION_STATE_KEY: &str = "calibration";

/// Load the calibration, every stored document and the estimation lock into
/// `session`, in that order. Returns the number of documents restored.
///
/// Unreadable document bodies and malformed state values are logged and
/// skipped.
pub fn restore_session(store: &Store, session: &mut Session) -> Result<usize> {
    if let Some(calibration) = read_state::<Calibration>(store, CALIBRATION_STATE_KEY)? {
        if let Err(e) = session.set_calibration(calibration.tcf, calibration.ecf) {
            warn!(error = %e, "stored calibration rejected; keeping configured values");
        }
    }

    let summaries = store.list_documents()?;
    let mut restored = 0;
    for summary in &summaries {
        match store.load_document(&summary.id) {
            Ok(Some(doc)) => {
                session.insert_document(doc)?;
                restored += 1;
            }
            Ok(None) => {}
            Err(e) => {
                let error = format!("{e:#}");
                warn!(doc = %summary.id, %error, "skipping unreadable document");
            }
        }
    }

    let lock = read_state::<EstimationLock>(store, LOCK_STATE_KEY)?;
    session.restore_lock(lock);

    info!(
        documents = restored,
        skipped = summaries.len() - restored,
        locked = session.lock_state().is_some(),
        "session restored from store"
    );
    Ok(restored)
}

/// Decode one state value, treating a malformed value as absent.
fn read_state<T: DeserializeOwned>(store: &Store, key: &str) -> Result<Option<T>> {
    let value = match store.get_state(key) {
        Ok(Some(value)) => value,
        Ok(None) => return Ok(None),
        Err(e) => {
            let error = format!("{e:#}");
            warn!(key, %error, "ignoring unreadable session state");
            return Ok(None);
        }
    };
    match serde_json::from_value(value) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(e) => {
            warn!(key, error = %e, "ignoring malformed session state");
            Ok(None)
        }
    }
}

/// Write the session's TCF/ECF so a restart estimates with the same factors.
pub fn save_calibration(store: &Store, session: &Session) -> Result<()> {
    let value = serde_json::to_value(session.config().calibration)
        .context("failed to serialize calibration")?;
    store.set_state(CALIBRATION_STATE_KEY, &value)
}

/// Write the session's lock state, clearing the key when unlocked.
pub fn save_lock(store: &Store, session: &Session) -> Result<()> {
    match session.lock_state() {
        Some(lock) => {
            let value = serde_json::to_value(lock).context("failed to serialize lock")?;
            store.set_state(LOCK_STATE_KEY, &value)
        }
        None => store.clear_state(LOCK_STATE_KEY),
    }
}

/// Persist a new version of one document.
pub fn save_document(store: &Store, session: &Session, doc_id: &str, note: &str) -> Result<i64> {
    let doc = session
        .document(doc_id)
        .with_context(|| format!("document {doc_id} not found"))?;
    store.save_document(doc, note)
}
