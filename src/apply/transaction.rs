//! Transaction log records sufficient to reverse a committed batch

use serde::{Deserialize, Serialize};

use crate::core::types::{CoverLevel, TokenId, Visibility};

/// One committed visibility write and the value it replaced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedVisibilityChange {
    pub observer: TokenId,
    pub target: TokenId,
    /// Value before the write; absent when the pair had no stored value.
    /// The writer traits carry no delete, so rolling back an absent prior
    /// writes the default (`observed`) instead of removing the entry.
    /// The defaults are what every reader assumes for a missing pair, so
    /// the observable state matches; only the storage footprint differs.
    pub prior: Option<Visibility>,
    pub new: Visibility,
}

/// One committed cover write and the value it replaced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedCoverChange {
    pub observer: TokenId,
    pub target: TokenId,
    /// Same absent-prior rollback behavior as the visibility record: an
    /// absent prior rolls back to the default (`none`), not to deletion.
    pub prior: Option<CoverLevel>,
    pub new: CoverLevel,
}

/// Record of one applied batch, kept for rollback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub avs_changes: Vec<AppliedVisibilityChange>,
    pub cover_changes: Vec<AppliedCoverChange>,
    pub override_changes: Vec<AppliedVisibilityChange>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Transaction {
    pub fn new(transaction_id: String) -> Self {
        Self {
            transaction_id,
            avs_changes: Vec::new(),
            cover_changes: Vec::new(),
            override_changes: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Total writes recorded across all three phases
    pub fn change_count(&self) -> usize {
        self.avs_changes.len() + self.cover_changes.len() + self.override_changes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_transaction() {
        let tx = Transaction::new("tx-1".to_string());
        assert_eq!(tx.change_count(), 0);
        assert!(tx.errors.is_empty());
    }

    #[test]
    fn test_change_count_sums_phases() {
        let mut tx = Transaction::new("tx-1".to_string());
        tx.avs_changes.push(AppliedVisibilityChange {
            observer: TokenId::new("o"),
            target: TokenId::new("t"),
            prior: None,
            new: Visibility::Hidden,
        });
        tx.cover_changes.push(AppliedCoverChange {
            observer: TokenId::new("o"),
            target: TokenId::new("t"),
            prior: Some(CoverLevel::Lesser),
            new: CoverLevel::Standard,
        });
        assert_eq!(tx.change_count(), 2);
    }
}
