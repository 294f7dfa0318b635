//! Transactional writer across the visibility and cover subsystems
//!
//! A batch either commits in full or rolls back; partial application is
//! never left visible to callers.

mod transaction;

pub use transaction::{AppliedCoverChange, AppliedVisibilityChange, Transaction};

use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::types::{CoverLevel, TokenId, Visibility};
use crate::platform::{
    CoverChange, CoverWriter, SettingsSource, TokenStore, VisibilityChange, VisibilityWriter,
};

/// One observer's accepted outcome, shaped for the applier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Observing token; a missing reference fails validation
    pub observer: Option<TokenId>,
    /// Token being perceived
    pub target: TokenId,
    /// Visibility the observer should now have of the target; required
    pub new_visibility: Option<Visibility>,
    /// Cover change, applied only when the cover subsystem is enabled
    pub new_cover: Option<CoverLevel>,
    /// Position-aware override, applied best-effort in a third phase
    pub visibility_override: Option<Visibility>,
}

/// Result of one apply call
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub changes_applied: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Per-pair entry of a consistency check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyEntry {
    pub observer: TokenId,
    pub target: TokenId,
    pub expected_visibility: Option<Visibility>,
    pub actual_visibility: Option<Visibility>,
    pub visibility_consistent: bool,
    pub expected_cover: Option<CoverLevel>,
    pub actual_cover: Option<CoverLevel>,
    pub cover_consistent: bool,
}

/// Structured status report, data for the caller rather than an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub consistent: bool,
    pub entries: Vec<ConsistencyEntry>,
}

/// Applies batches across both subsystems with rollback on critical failure
pub struct DualSystemApplier {
    tokens: Arc<dyn TokenStore>,
    visibility_writer: Arc<dyn VisibilityWriter>,
    cover_writer: Arc<dyn CoverWriter>,
    settings: Arc<dyn SettingsSource>,
    transactions: Mutex<AHashMap<String, Transaction>>,
}

impl DualSystemApplier {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        visibility_writer: Arc<dyn VisibilityWriter>,
        cover_writer: Arc<dyn CoverWriter>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            tokens,
            visibility_writer,
            cover_writer,
            settings,
            transactions: Mutex::new(AHashMap::new()),
        }
    }

    /// Validate and apply a batch of per-observer results
    ///
    /// Validation is all-or-nothing up front: any bad record rejects the
    /// whole batch before a single write. A critical writer failure rolls
    /// back everything already committed in this transaction.
    pub fn apply_sneak_results(&self, records: &[ResultRecord]) -> ApplyOutcome {
        let errors = validate_records(records);
        if !errors.is_empty() {
            return ApplyOutcome {
                success: false,
                transaction_id: None,
                changes_applied: 0,
                errors,
                warnings: Vec::new(),
            };
        }

        let mut tx = Transaction::new(Uuid::new_v4().to_string());

        // Phase 1: visibility writes
        if let Err(outcome) = self.apply_visibility_phase(records, &mut tx) {
            return outcome;
        }

        // Phase 2: cover writes, only while the subsystem accepts them
        if self.settings.settings().cover_system_enabled {
            if let Err(outcome) = self.apply_cover_phase(records, &mut tx) {
                return outcome;
            }
        } else if records.iter().any(|r| r.new_cover.is_some()) {
            tx.warnings
                .push("cover system disabled, skipping cover changes".to_string());
        }

        // Phase 3: position-aware overrides, best effort
        self.apply_override_phase(records, &mut tx);

        let outcome = ApplyOutcome {
            success: true,
            transaction_id: Some(tx.transaction_id.clone()),
            changes_applied: tx.change_count(),
            errors: tx.errors.clone(),
            warnings: tx.warnings.clone(),
        };

        self.transactions
            .lock()
            .unwrap()
            .insert(tx.transaction_id.clone(), tx);

        outcome
    }

    fn apply_visibility_phase(
        &self,
        records: &[ResultRecord],
        tx: &mut Transaction,
    ) -> std::result::Result<(), ApplyOutcome> {
        // Records passed validation, so both fields are present
        let changes: Vec<VisibilityChange> = records
            .iter()
            .filter_map(|record| {
                Some(VisibilityChange {
                    observer: record.observer.clone()?,
                    target: record.target.clone(),
                    new_visibility: record.new_visibility?,
                })
            })
            .collect();

        let priors: Vec<Option<Visibility>> = changes
            .iter()
            .map(|c| self.tokens.stored_visibility(&c.observer, &c.target))
            .collect();

        match self.visibility_writer.apply_visibility_batch(&changes) {
            Ok(outcomes) => {
                for ((change, prior), outcome) in
                    changes.iter().zip(priors).zip(outcomes.iter())
                {
                    if outcome.ok {
                        tx.avs_changes.push(AppliedVisibilityChange {
                            observer: change.observer.clone(),
                            target: change.target.clone(),
                            prior,
                            new: change.new_visibility,
                        });
                    } else {
                        tx.warnings.push(format!(
                            "visibility write skipped for {} -> {}: {}",
                            change.observer,
                            change.target,
                            outcome.message.as_deref().unwrap_or("unknown")
                        ));
                    }
                }
                Ok(())
            }
            Err(error) => Err(self.rolled_back(tx, format!("visibility writer: {error}"))),
        }
    }

    fn apply_cover_phase(
        &self,
        records: &[ResultRecord],
        tx: &mut Transaction,
    ) -> std::result::Result<(), ApplyOutcome> {
        let changes: Vec<CoverChange> = records
            .iter()
            .filter_map(|record| {
                Some(CoverChange {
                    observer: record.observer.clone()?,
                    target: record.target.clone(),
                    new_cover: record.new_cover?,
                })
            })
            .collect();

        if changes.is_empty() {
            return Ok(());
        }

        let priors: Vec<Option<CoverLevel>> = changes
            .iter()
            .map(|c| self.tokens.stored_cover(&c.observer, &c.target))
            .collect();

        match self.cover_writer.apply_cover_batch(&changes) {
            Ok(outcomes) => {
                for ((change, prior), outcome) in
                    changes.iter().zip(priors).zip(outcomes.iter())
                {
                    if outcome.ok {
                        tx.cover_changes.push(AppliedCoverChange {
                            observer: change.observer.clone(),
                            target: change.target.clone(),
                            prior,
                            new: change.new_cover,
                        });
                    } else {
                        tx.warnings.push(format!(
                            "cover write skipped for {} -> {}: {}",
                            change.observer,
                            change.target,
                            outcome.message.as_deref().unwrap_or("unknown")
                        ));
                    }
                }
                Ok(())
            }
            Err(error) => Err(self.rolled_back(tx, format!("cover writer: {error}"))),
        }
    }

    /// Override failures are warnings, never transaction failures
    fn apply_override_phase(&self, records: &[ResultRecord], tx: &mut Transaction) {
        for record in records {
            let (Some(override_visibility), Some(observer)) =
                (record.visibility_override, record.observer.clone())
            else {
                continue;
            };
            let prior = self.tokens.stored_visibility(&observer, &record.target);
            let change = VisibilityChange {
                observer: observer.clone(),
                target: record.target.clone(),
                new_visibility: override_visibility,
            };
            match self.visibility_writer.apply_visibility_batch(&[change]) {
                Ok(outcomes) if outcomes.iter().all(|o| o.ok) => {
                    tx.override_changes.push(AppliedVisibilityChange {
                        observer,
                        target: record.target.clone(),
                        prior,
                        new: override_visibility,
                    });
                }
                Ok(_) | Err(_) => {
                    tx.warnings.push(format!(
                        "override write failed for {} -> {}",
                        observer, record.target
                    ));
                }
            }
        }
    }

    /// Undo everything committed so far and report the critical failure
    fn rolled_back(&self, tx: &Transaction, cause: String) -> ApplyOutcome {
        tracing::error!(
            transaction = %tx.transaction_id,
            %cause,
            "critical write failure, rolling back transaction"
        );
        let reverted = self.revert_changes(tx);
        let mut errors = vec![cause];
        errors.push("Transaction rolled back due to critical errors".to_string());
        if !reverted {
            errors.push("rollback incomplete: some inverse writes failed".to_string());
        }
        ApplyOutcome {
            success: false,
            transaction_id: None,
            changes_applied: 0,
            errors,
            warnings: tx.warnings.clone(),
        }
    }

    /// Replay the inverse of each recorded change, newest first
    ///
    /// A change whose prior was absent rolls back to the enum default
    /// rather than deleting the stored entry (see `AppliedVisibilityChange::prior`).
    fn revert_changes(&self, tx: &Transaction) -> bool {
        let mut all_ok = true;

        for change in tx.override_changes.iter().chain(&tx.avs_changes).rev() {
            let inverse = VisibilityChange {
                observer: change.observer.clone(),
                target: change.target.clone(),
                new_visibility: change.prior.unwrap_or_default(),
            };
            match self.visibility_writer.apply_visibility_batch(&[inverse]) {
                Ok(outcomes) if outcomes.iter().all(|o| o.ok) => {}
                _ => all_ok = false,
            }
        }

        for change in tx.cover_changes.iter().rev() {
            let inverse = CoverChange {
                observer: change.observer.clone(),
                target: change.target.clone(),
                new_cover: change.prior.unwrap_or_default(),
            };
            match self.cover_writer.apply_cover_batch(&[inverse]) {
                Ok(outcomes) if outcomes.iter().all(|o| o.ok) => {}
                _ => all_ok = false,
            }
        }

        all_ok
    }

    /// Roll back a previously committed transaction by id
    ///
    /// Returns false when the id is unknown or any inverse write fails;
    /// failed rollbacks are not retried.
    pub fn rollback_transaction(&self, transaction_id: &str) -> bool {
        let Some(tx) = self
            .transactions
            .lock()
            .unwrap()
            .remove(transaction_id)
        else {
            tracing::warn!(transaction_id, "rollback requested for unknown transaction");
            return false;
        };

        self.revert_changes(&tx)
    }

    /// Re-read both subsystems and compare against what the batch expected
    ///
    /// Inconsistencies are data for the caller, not errors.
    pub fn validate_system_consistency(&self, records: &[ResultRecord]) -> ConsistencyReport {
        let mut entries = Vec::with_capacity(records.len());

        for record in records {
            let Some(observer) = record.observer.clone() else {
                continue;
            };
            let actual_visibility = self.tokens.stored_visibility(&observer, &record.target);
            let actual_cover = self.tokens.stored_cover(&observer, &record.target);

            let visibility_consistent = match record.new_visibility {
                Some(expected) => actual_visibility == Some(expected),
                None => true,
            };
            let cover_consistent = match record.new_cover {
                Some(expected) => actual_cover == Some(expected),
                None => true,
            };

            entries.push(ConsistencyEntry {
                observer,
                target: record.target.clone(),
                expected_visibility: record.new_visibility,
                actual_visibility,
                visibility_consistent,
                expected_cover: record.new_cover,
                actual_cover,
                cover_consistent,
            });
        }

        ConsistencyReport {
            consistent: entries
                .iter()
                .all(|e| e.visibility_consistent && e.cover_consistent),
            entries,
        }
    }
}

/// All-or-nothing structural validation of a batch
fn validate_records(records: &[ResultRecord]) -> Vec<String> {
    let mut errors = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if record.observer.is_none() {
            errors.push(format!("record {index}: missing observer token reference"));
        }
        if record.new_visibility.is_none() {
            errors.push(format!("record {index}: missing new visibility value"));
        }
    }
    errors
}
