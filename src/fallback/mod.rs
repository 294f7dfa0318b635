//! Fallback bookkeeping: severity classification, recovery throttling,
//! and user-notification rate limiting

use std::sync::{Arc, Mutex};

use ahash::AHashMap;

use crate::core::types::SessionId;
use crate::platform::{NotificationSink, NotifyLevel, SettingsSource};

/// Severity of a degradation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Which subsystem degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemKind {
    Visibility,
    Cover,
}

/// Classify a degradation from its message content
///
/// Heuristic, matching how the platform's error strings are worded.
pub fn classify_severity(message: &str) -> Severity {
    let lower = message.to_lowercase();
    if lower.contains("core") || lower.contains("broken") {
        Severity::Critical
    } else if lower.contains("unavailable") {
        Severity::High
    } else if lower.contains("calculation failed") {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Tracks recovery attempts per subsystem and notifications per session
pub struct ErrorHandlingService {
    settings: Arc<dyn SettingsSource>,
    sink: Arc<dyn NotificationSink>,
    recovery_attempts: Mutex<AHashMap<SystemKind, u32>>,
    notifications_sent: Mutex<AHashMap<SessionId, u32>>,
}

impl ErrorHandlingService {
    pub fn new(settings: Arc<dyn SettingsSource>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            settings,
            sink,
            recovery_attempts: Mutex::new(AHashMap::new()),
            notifications_sent: Mutex::new(AHashMap::new()),
        }
    }

    /// May this subsystem attempt automatic recovery again?
    ///
    /// A bounded counter, not a time window: each call consumes one
    /// attempt until the ceiling, after which recovery is skipped and
    /// only logged.
    pub fn try_begin_recovery(&self, system: SystemKind) -> bool {
        let ceiling = self.settings.settings().max_recovery_attempts;
        let mut attempts = self.recovery_attempts.lock().unwrap();
        let count = attempts.entry(system).or_insert(0);
        if *count >= ceiling {
            tracing::info!(?system, attempts = *count, "recovery ceiling reached, skipping");
            return false;
        }
        *count += 1;
        true
    }

    /// Reset the recovery counter after a confirmed successful recovery
    pub fn mark_recovered(&self, system: SystemKind) {
        self.recovery_attempts.lock().unwrap().remove(&system);
    }

    /// Record a degradation: always logged, user-notified only for
    /// medium+ severity within the per-session cap
    pub fn report_fallback(&self, session: &SessionId, system: SystemKind, message: &str) {
        let severity = classify_severity(message);

        match severity {
            Severity::Critical | Severity::High => {
                tracing::error!(?system, %session, message, "fallback engaged")
            }
            Severity::Medium => tracing::warn!(?system, %session, message, "fallback engaged"),
            Severity::Low => tracing::debug!(?system, %session, message, "fallback engaged"),
        }

        if severity == Severity::Low {
            return;
        }

        let settings = self.settings.settings();
        if !settings.notify_on_fallback {
            return;
        }

        let mut sent = self.notifications_sent.lock().unwrap();
        let count = sent.entry(session.clone()).or_insert(0);
        if *count >= settings.max_notifications_per_session {
            return;
        }
        *count += 1;

        let level = match severity {
            Severity::Critical | Severity::High => NotifyLevel::Error,
            _ => NotifyLevel::Warn,
        };
        self.sink.notify(level, message);
    }

    /// Drop per-session notification bookkeeping when a session ends
    pub fn clear_session(&self, session: &SessionId) {
        self.notifications_sent.lock().unwrap().remove(session);
    }
}
