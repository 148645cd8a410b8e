// Session: the single owner of workspace documents, the estimation config,
// the estimation lock and the latest estimate per document.
//
// Every mutation that touches an estimating document recomputes it before
// returning.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use genie_core::config::{ConfigError, EstimationConfig};
use genie_core::estimation::{Estimate, UseCaseRecord};
use genie_core::workspace::inventory::{
    USE_CASE_CLASS_COL, USE_CASE_NAME_COL, USE_CASE_TX_COL, USE_CASE_WEIGHT_COL,
};
use genie_core::workspace::{
    recalculate, use_case_at, BlockContent, Recalculation, TableKind, WorkspaceDocument,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("estimation is locked by {by}")]
    Locked { by: String },

    #[error("block `{block}` in section `{section}` is locked")]
    BlockLocked { section: String, block: String },

    #[error("document `{0}` not found")]
    DocumentNotFound(String),

    #[error("section `{section}` not found in document `{doc}`")]
    SectionNotFound { doc: String, section: String },

    #[error("block `{block}` not found in section `{section}`")]
    BlockNotFound { section: String, block: String },

    #[error("document `{doc}` has no use case at row {row}")]
    UseCaseNotFound { doc: String, row: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Who froze the estimate, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationLock {
    pub locked_by: String,
    pub locked_at: String,
}

pub struct Session {
    documents: BTreeMap<String, WorkspaceDocument>,
    config: EstimationConfig,
    lock: Option<EstimationLock>,
    results: HashMap<String, Recalculation>,
}

fn is_estimation_table(kind: Option<TableKind>) -> bool {
    matches!(
        kind,
        Some(TableKind::UcpActor | TableKind::UcpUsecase | TableKind::Rab)
    )
}

impl Session {
    pub fn new(config: EstimationConfig) -> Self {
        Self {
            documents: BTreeMap::new(),
            config,
            lock: None,
            results: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EstimationConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------

    /// Add or replace a document. Estimating documents are recomputed on
    /// the way in. While the estimate is locked, an estimating document can
    /// neither be added nor replaced.
    pub fn insert_document(&mut self, doc: WorkspaceDocument) -> Result<(), SessionError> {
        let replaces_estimating = self
            .documents
            .get(&doc.id)
            .is_some_and(WorkspaceDocument::is_estimating);
        if doc.is_estimating() || replaces_estimating {
            self.ensure_unlocked()?;
        }
        let id = doc.id.clone();
        self.results.remove(&id);
        self.documents.insert(id.clone(), doc);
        self.refresh(&id);
        Ok(())
    }

    pub fn document(&self, id: &str) -> Option<&WorkspaceDocument> {
        self.documents.get(id)
    }

    /// All documents, ordered by id.
    pub fn documents(&self) -> impl Iterator<Item = &WorkspaceDocument> {
        self.documents.values()
    }

    /// Latest estimate of an estimating document.
    pub fn estimate(&self, doc_id: &str) -> Option<&Estimate> {
        self.results.get(doc_id).map(|r| &r.estimate)
    }

    pub fn recalculation(&self, doc_id: &str) -> Option<&Recalculation> {
        self.results.get(doc_id)
    }

    /// Replace one block's content.
    pub fn update_block(
        &mut self,
        doc_id: &str,
        section_id: &str,
        block_id: &str,
        content: BlockContent,
    ) -> Result<(), SessionError> {
        let doc = self
            .documents
            .get_mut(doc_id)
            .ok_or_else(|| SessionError::DocumentNotFound(doc_id.to_string()))?;
        let estimating = doc.is_estimating();
        let section = doc
            .section_mut(section_id)
            .ok_or_else(|| SessionError::SectionNotFound {
                doc: doc_id.to_string(),
                section: section_id.to_string(),
            })?;
        let block = section
            .blocks
            .iter_mut()
            .find(|b| b.id == block_id)
            .ok_or_else(|| SessionError::BlockNotFound {
                section: section_id.to_string(),
                block: block_id.to_string(),
            })?;

        if block.is_locked {
            return Err(SessionError::BlockLocked {
                section: section_id.to_string(),
                block: block_id.to_string(),
            });
        }
        let touches_estimate = is_estimation_table(block.table_kind())
            || is_estimation_table(content.as_table().map(|t| t.kind));
        if estimating && touches_estimate {
            if let Some(lock) = &self.lock {
                return Err(SessionError::Locked {
                    by: lock.locked_by.clone(),
                });
            }
        }

        block.content = content;
        section.touch();
        debug!(doc = doc_id, section = section_id, block = block_id, "block updated");

        self.refresh(doc_id);
        Ok(())
    }

    /// Overwrite row `row` of the first use-case table with `record`.
    pub fn replace_use_case(
        &mut self,
        doc_id: &str,
        row: usize,
        record: &UseCaseRecord,
    ) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        let doc = self
            .documents
            .get_mut(doc_id)
            .ok_or_else(|| SessionError::DocumentNotFound(doc_id.to_string()))?;
        let not_found = || SessionError::UseCaseNotFound {
            doc: doc_id.to_string(),
            row,
        };
        let mut owner = None;
        for section in doc.sections.iter_mut() {
            let found = section
                .blocks
                .iter()
                .position(|b| b.table_kind() == Some(TableKind::UcpUsecase));
            if let Some(index) = found {
                owner = Some((section, index));
                break;
            }
        }
        let (section, index) = owner.ok_or_else(not_found)?;
        let block = &mut section.blocks[index];
        if block.is_locked {
            return Err(SessionError::BlockLocked {
                section: section.id.clone(),
                block: block.id.clone(),
            });
        }
        let cells = block
            .content
            .as_table_mut()
            .and_then(|t| t.rows.get_mut(row))
            .ok_or_else(not_found)?;

        if cells.len() <= USE_CASE_WEIGHT_COL {
            cells.resize(USE_CASE_WEIGHT_COL + 1, String::new());
        }
        cells[USE_CASE_NAME_COL] = record.name.clone();
        cells[USE_CASE_CLASS_COL] = record.classification.label().to_string();
        cells[USE_CASE_TX_COL] = record.transaction_count.to_string();
        cells[USE_CASE_WEIGHT_COL] = format!("{}", record.weight);
        section.touch();

        self.refresh(doc_id);
        Ok(())
    }

    /// Use case on row `row` of a document's first use-case table, the row
    /// `replace_use_case` writes.
    pub fn use_case(&self, doc_id: &str, row: usize) -> Option<UseCaseRecord> {
        let table = self
            .documents
            .get(doc_id)?
            .table_of_kind(TableKind::UcpUsecase)?;
        use_case_at(table, row)
    }

    // -----------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------

    /// Change TCF and ECF, then recompute every estimating document.
    pub fn set_calibration(&mut self, tcf: f64, ecf: f64) -> Result<(), SessionError> {
        let mut next = self.config.clone();
        next.calibration.tcf = tcf;
        next.calibration.ecf = ecf;
        self.replace_config(next)
    }

    /// Swap in a new estimation config after validating it.
    pub fn replace_config(&mut self, config: EstimationConfig) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        config.validate()?;
        self.config = config;
        info!(
            tcf = self.config.calibration.tcf,
            ecf = self.config.calibration.ecf,
            "estimation config replaced"
        );
        self.refresh_all();
        Ok(())
    }

    // -----------------------------------------------------------------
    // Estimation lock
    // -----------------------------------------------------------------

    /// Freeze inventories, cost tables and calibration. Re-locking by the
    /// current holder is a no-op.
    pub fn lock(&mut self, by: &str) -> Result<&EstimationLock, SessionError> {
        if let Some(existing) = &self.lock {
            if existing.locked_by != by {
                return Err(SessionError::Locked {
                    by: existing.locked_by.clone(),
                });
            }
        }
        Ok(self.lock.get_or_insert_with(|| {
            info!(by, "estimation locked");
            EstimationLock {
                locked_by: by.to_string(),
                locked_at: chrono::Utc::now().to_rfc3339(),
            }
        }))
    }

    pub fn unlock(&mut self) -> Option<EstimationLock> {
        let previous = self.lock.take();
        if let Some(lock) = &previous {
            info!(by = %lock.locked_by, "estimation unlocked");
        }
        previous
    }

    pub fn lock_state(&self) -> Option<&EstimationLock> {
        self.lock.as_ref()
    }

    /// Reinstate a lock loaded from storage.
    pub fn restore_lock(&mut self, lock: Option<EstimationLock>) {
        self.lock = lock;
    }

    fn ensure_unlocked(&self) -> Result<(), SessionError> {
        match &self.lock {
            Some(lock) => Err(SessionError::Locked {
                by: lock.locked_by.clone(),
            }),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------
    // Recomputation
    // -----------------------------------------------------------------

    fn refresh(&mut self, doc_id: &str) {
        let Some(doc) = self.documents.get_mut(doc_id) else {
            return;
        };
        if !doc.is_estimating() {
            return;
        }
        let result = recalculate(doc, &self.config);
        self.results.insert(doc_id.to_string(), result);
    }

    fn refresh_all(&mut self) {
        let ids: Vec<String> = self
            .documents
            .values()
            .filter(|d| d.is_estimating())
            .map(|d| d.id.clone())
            .collect();
        for id in ids {
            self.refresh(&id);
        }
    }
}
