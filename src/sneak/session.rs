//! Per-action session record

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{TimestampMs, TokenId};
use crate::position::{PositionState, PositionTransition};

/// Everything one sneak action tracks between roll and resolution
///
/// Token references are weak: the session stores ids and looks tokens up
/// at use time, never owning their lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SneakSession {
    pub actor: TokenId,
    pub observers: Vec<TokenId>,
    pub start_positions: AHashMap<TokenId, PositionState>,
    pub end_positions: AHashMap<TokenId, PositionState>,
    pub transitions: AHashMap<TokenId, PositionTransition>,
    pub is_tracking: bool,
    pub timestamp_ms: TimestampMs,
}

impl SneakSession {
    pub fn new(actor: TokenId, observers: Vec<TokenId>, timestamp_ms: TimestampMs) -> Self {
        Self {
            actor,
            observers,
            start_positions: AHashMap::new(),
            end_positions: AHashMap::new(),
            transitions: AHashMap::new(),
            is_tracking: true,
            timestamp_ms,
        }
    }
}
