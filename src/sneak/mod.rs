//! Stealth session orchestration
//!
//! One session per sneak action: capture start snapshots at roll time,
//! re-capture and diff after movement, convert outcomes into writes, and
//! keep the committed transaction around for revert. Sessions are
//! cooperative-single-writer per id; a same-id restart replaces the prior
//! session without stacking.

mod session;

pub use session::SneakSession;

use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::apply::{ApplyOutcome, DualSystemApplier, ResultRecord};
use crate::core::error::{Result, VantageError};
use crate::core::types::{now_ms, SessionId, TimestampMs, TokenId, Visibility};
use crate::fallback::{ErrorHandlingService, SystemKind};
use crate::integration::{CombinedStateOptions, UnifiedStateIntegration};
use crate::platform::{MovementTracker, SettingsSource, Token, TokenStore};
use crate::position::{analyze_transition, PositionState, PositionTransition};

/// One observer's rolled outcome, before position enhancement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutcome {
    pub observer: TokenId,
    pub new_visibility: Option<Visibility>,
    /// Position-aware override the rules layer decided on, if any
    pub visibility_override: Option<Visibility>,
}

/// A raw outcome with the session's position data attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedOutcome {
    pub observer: TokenId,
    pub new_visibility: Option<Visibility>,
    pub visibility_override: Option<Visibility>,
    pub start_position: Option<PositionState>,
    pub end_position: Option<PositionState>,
    pub position_transition: Option<PositionTransition>,
    pub has_position_data: bool,
}

/// Owns sneak sessions and drives capture, enhancement, apply, and revert
pub struct SneakOrchestrator {
    tokens: Arc<dyn TokenStore>,
    movement: Arc<dyn MovementTracker>,
    settings: Arc<dyn SettingsSource>,
    integration: UnifiedStateIntegration,
    applier: DualSystemApplier,
    errors: Arc<ErrorHandlingService>,
    sessions: Mutex<AHashMap<SessionId, SneakSession>>,
    /// Transaction ids cached per session after a successful apply
    applied_transactions: Mutex<AHashMap<SessionId, String>>,
}

impl SneakOrchestrator {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        movement: Arc<dyn MovementTracker>,
        settings: Arc<dyn SettingsSource>,
        integration: UnifiedStateIntegration,
        applier: DualSystemApplier,
        errors: Arc<ErrorHandlingService>,
    ) -> Self {
        Self {
            tokens,
            movement,
            settings,
            integration,
            applier,
            errors,
            sessions: Mutex::new(AHashMap::new()),
            applied_transactions: Mutex::new(AHashMap::new()),
        }
    }

    /// Route a capture's degradation diagnostics through the fallback
    /// service so notification throttling applies per session
    fn report_capture_fallbacks(&self, session_id: &SessionId, state: &PositionState) {
        for message in &state.system_errors {
            let system = if message.starts_with("cover") || message.contains("stored cover") {
                SystemKind::Cover
            } else {
                SystemKind::Visibility
            };
            self.errors.report_fallback(session_id, system, message);
        }
    }

    /// Begin tracking a sneak action
    ///
    /// Allied observers are dropped when `ignore_allies` is on. Start
    /// positions are captured for every surviving observer, then the
    /// actor's sneaking marker is set. The returned id is the caller's
    /// message id when given, otherwise timestamp-derived.
    pub fn start_sneak_session(
        &self,
        actor: &Token,
        observers: &[Token],
        message_id: Option<&str>,
    ) -> Result<SessionId> {
        let timestamp = now_ms();
        let session_id = match message_id {
            Some(id) => SessionId::new(id),
            None => SessionId::new(format!("sneak-{timestamp}")),
        };

        let ignore_allies = self.settings.settings().ignore_allies;
        let observers: Vec<&Token> = observers
            .iter()
            .filter(|observer| {
                observer.id != actor.id
                    && !(ignore_allies && observer.alliance == actor.alliance)
            })
            .collect();

        let mut session = SneakSession::new(
            actor.id.clone(),
            observers.iter().map(|o| o.id.clone()).collect(),
            timestamp,
        );

        for observer in &observers {
            let state = self.integration.capture_position_state(
                observer,
                actor,
                CombinedStateOptions::default(),
            );
            self.report_capture_fallbacks(&session_id, &state);
            session.start_positions.insert(observer.id.clone(), state);
        }

        self.tokens.set_sneaking(&actor.id, true)?;

        tracing::debug!(
            session = %session_id,
            actor = %actor.id,
            observers = session.observers.len(),
            "sneak session started"
        );

        // Same-id restart replaces the old session outright
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.clone(), session);
        self.applied_transactions
            .lock()
            .unwrap()
            .remove(&session_id);

        Ok(session_id)
    }

    /// Attach position data to rolled outcomes
    ///
    /// End positions exist only when the actor actually moved since the
    /// session started; otherwise the outcomes pass through untouched with
    /// `has_position_data` false. An unknown session degrades the same way
    /// rather than failing.
    pub fn process_outcomes(
        &self,
        session_id: &SessionId,
        raw_outcomes: &[RawOutcome],
    ) -> Vec<EnhancedOutcome> {
        let mut sessions = self.sessions.lock().unwrap();
        let Some(session) = sessions.get_mut(session_id) else {
            tracing::warn!(session = %session_id, "processing outcomes for unknown session");
            return raw_outcomes.iter().map(passthrough).collect();
        };

        let moved = self
            .movement
            .has_moved_since(&session.actor, session.timestamp_ms);

        if moved {
            if let Some(actor) = self.tokens.token(&session.actor) {
                for observer_id in session.observers.clone() {
                    let Some(observer) = self.tokens.token(&observer_id) else {
                        continue;
                    };
                    let end = self.integration.capture_position_state(
                        &observer,
                        &actor,
                        CombinedStateOptions::default(),
                    );
                    self.report_capture_fallbacks(session_id, &end);
                    if let Some(start) = session.start_positions.get(&observer_id) {
                        session
                            .transitions
                            .insert(observer_id.clone(), analyze_transition(
                                observer_id.clone(),
                                start,
                                &end,
                            ));
                    }
                    session.end_positions.insert(observer_id, end);
                }
            } else {
                tracing::warn!(
                    session = %session_id,
                    actor = %session.actor,
                    "sneaking token vanished, skipping end capture"
                );
            }
        }

        raw_outcomes
            .iter()
            .map(|raw| {
                let start = session.start_positions.get(&raw.observer).cloned();
                let end = session.end_positions.get(&raw.observer).cloned();
                let transition = session.transitions.get(&raw.observer).cloned();
                let has_position_data = start.is_some() && end.is_some();
                EnhancedOutcome {
                    observer: raw.observer.clone(),
                    new_visibility: raw.new_visibility,
                    visibility_override: raw.visibility_override,
                    start_position: start,
                    end_position: end,
                    position_transition: transition,
                    has_position_data,
                }
            })
            .collect()
    }

    /// Write the enhanced outcomes through the applier
    ///
    /// Sneak writes visibility only; cover is never touched here. Fails
    /// hard when the session does not exist, since that is a caller bug
    /// rather than a degradable condition. A successful transaction is
    /// cached for `revert_results`.
    pub fn apply_results(
        &self,
        session_id: &SessionId,
        outcomes: &[EnhancedOutcome],
    ) -> Result<ApplyOutcome> {
        let actor = {
            let sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get(session_id)
                .ok_or_else(|| VantageError::SessionNotFound(session_id.clone()))?;
            session.actor.clone()
        };

        let records: Vec<ResultRecord> = outcomes
            .iter()
            .map(|outcome| ResultRecord {
                observer: Some(outcome.observer.clone()),
                target: actor.clone(),
                new_visibility: outcome.new_visibility,
                new_cover: None,
                visibility_override: outcome.visibility_override,
            })
            .collect();

        let result = self.applier.apply_sneak_results(&records);

        if result.success {
            if let Some(transaction_id) = &result.transaction_id {
                self.applied_transactions
                    .lock()
                    .unwrap()
                    .insert(session_id.clone(), transaction_id.clone());
            }
        }

        Ok(result)
    }

    /// Undo this session's applied transaction
    ///
    /// False when nothing was applied or the rollback itself fails.
    pub fn revert_results(&self, session_id: &SessionId) -> bool {
        let Some(transaction_id) = self
            .applied_transactions
            .lock()
            .unwrap()
            .remove(session_id)
        else {
            return false;
        };
        self.applier.rollback_transaction(&transaction_id)
    }

    /// Discard the session and clear the actor's sneaking marker
    ///
    /// Idempotent: ending an absent session is a no-op.
    pub fn end_sneak_session(&self, session_id: &SessionId) {
        let Some(session) = self.sessions.lock().unwrap().remove(session_id) else {
            return;
        };
        self.applied_transactions
            .lock()
            .unwrap()
            .remove(session_id);
        self.errors.clear_session(session_id);
        if let Err(error) = self.tokens.set_sneaking(&session.actor, false) {
            tracing::warn!(
                session = %session_id,
                actor = %session.actor,
                %error,
                "failed clearing sneaking marker"
            );
        }
    }

    /// Drop sessions older than `max_age_ms`, clearing their markers
    ///
    /// Abandoned sessions otherwise leak until a same-id restart; callers
    /// run this on a timer or scene change.
    pub fn sweep_stale_sessions(&self, max_age_ms: TimestampMs) -> usize {
        let cutoff = now_ms().saturating_sub(max_age_ms);
        let stale: Vec<SessionId> = self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, session)| session.timestamp_ms <= cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &stale {
            tracing::info!(session = %session_id, "sweeping stale sneak session");
            self.end_sneak_session(session_id);
        }
        stale.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

/// Enhancement shape with no position data attached
fn passthrough(raw: &RawOutcome) -> EnhancedOutcome {
    EnhancedOutcome {
        observer: raw.observer.clone(),
        new_visibility: raw.new_visibility,
        visibility_override: raw.visibility_override,
        start_position: None,
        end_position: None,
        position_transition: None,
        has_position_data: false,
    }
}
