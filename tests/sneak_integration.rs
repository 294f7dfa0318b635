//! Sneak session lifecycle tests
//!
//! Drive a full stealth action end-to-end against the in-memory platform:
//! start capture, movement, outcome enhancement, transactional apply,
//! revert, and teardown.

use std::sync::Arc;

use glam::Vec2;

use vantage::apply::DualSystemApplier;
use vantage::core::error::VantageError;
use vantage::core::types::{Alliance, CoverLevel, SessionId, SizeRank, TokenId, TokenRect, Visibility};
use vantage::cover::CoverDetector;
use vantage::fallback::ErrorHandlingService;
use vantage::integration::UnifiedStateIntegration;
use vantage::platform::memory::MemoryPlatform;
use vantage::platform::{Token, TokenStore, WallSpec};
use vantage::position::TransitionType;
use vantage::sneak::{RawOutcome, SneakOrchestrator};

/// Opt-in logging for test debugging, driven by RUST_LOG
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn token(id: &str, x: f32, y: f32, alliance: Alliance) -> Token {
    Token {
        id: TokenId::new(id),
        center: Vec2::new(x, y),
        rect: TokenRect::centered(Vec2::new(x, y), 100.0, 100.0),
        size: SizeRank::Medium,
        alliance,
    }
}

fn orchestrator(platform: &Arc<MemoryPlatform>) -> SneakOrchestrator {
    let integration = UnifiedStateIntegration::new(
        platform.clone(),
        platform.clone(),
        platform.clone(),
        CoverDetector::new(platform.clone(), platform.clone()),
    );
    let applier = DualSystemApplier::new(
        platform.clone(),
        platform.clone(),
        platform.clone(),
        platform.clone(),
    );
    let errors = Arc::new(ErrorHandlingService::new(platform.clone(), platform.clone()));
    SneakOrchestrator::new(
        platform.clone(),
        platform.clone(),
        platform.clone(),
        integration,
        applier,
        errors,
    )
}

fn outcome(observer: &str, visibility: Visibility) -> RawOutcome {
    RawOutcome {
        observer: TokenId::new(observer),
        new_visibility: Some(visibility),
        visibility_override: None,
    }
}

#[test]
fn test_full_sneak_lifecycle() {
    init_logs();
    let platform = Arc::new(MemoryPlatform::new());
    // Cover the sneaker will end up behind
    platform.add_wall(WallSpec::solid(
        "w",
        Vec2::new(1500.0, -1000.0),
        Vec2::new(1500.0, 1000.0),
    ));
    let sneaker = token("sneaker", 0.0, 0.0, Alliance::Party);
    let guard = token("guard", 1000.0, 0.0, Alliance::Opposition);
    platform.add_token(sneaker.clone());
    platform.add_token(guard.clone());
    platform.set_stored_visibility(&guard.id, &sneaker.id, Visibility::Observed);
    let orchestrator = orchestrator(&platform);

    // Roll-time capture
    let id = orchestrator
        .start_sneak_session(&sneaker, &[guard.clone()], Some("msg-42"))
        .unwrap();
    assert!(platform.is_sneaking(&sneaker.id));

    // The sneaker slips behind the wall; the rules layer decides hidden
    platform.move_token(&sneaker.id, Vec2::new(2000.0, 0.0));
    platform.set_stored_visibility(&guard.id, &sneaker.id, Visibility::Hidden);

    let enhanced = orchestrator.process_outcomes(&id, &[outcome("guard", Visibility::Hidden)]);
    assert_eq!(enhanced.len(), 1);
    assert!(enhanced[0].has_position_data);

    let transition = enhanced[0].position_transition.as_ref().unwrap();
    assert_eq!(transition.transition_type, TransitionType::Improved);
    assert!(transition.cover_changed);
    assert!(transition.end_position.cover >= CoverLevel::Standard);

    // Apply writes visibility, never cover
    platform.set_stored_visibility(&guard.id, &sneaker.id, Visibility::Observed);
    let result = orchestrator.apply_results(&id, &enhanced).unwrap();
    assert!(result.success);
    assert_eq!(result.changes_applied, 1);
    assert_eq!(
        platform.stored_visibility(&guard.id, &sneaker.id),
        Some(Visibility::Hidden)
    );
    assert_eq!(platform.stored_cover(&guard.id, &sneaker.id), None);

    // Revert restores the pre-apply value
    assert!(orchestrator.revert_results(&id));
    assert_eq!(
        platform.stored_visibility(&guard.id, &sneaker.id),
        Some(Visibility::Observed)
    );

    // Teardown clears the marker; a second end is a no-op
    orchestrator.end_sneak_session(&id);
    assert!(!platform.is_sneaking(&sneaker.id));
    orchestrator.end_sneak_session(&id);
    assert_eq!(orchestrator.session_count(), 0);
}

#[test]
fn test_allies_are_not_tracked_as_observers() {
    let platform = Arc::new(MemoryPlatform::new());
    let sneaker = token("sneaker", 0.0, 0.0, Alliance::Party);
    let ally = token("ally", 500.0, 0.0, Alliance::Party);
    let guard = token("guard", 1000.0, 0.0, Alliance::Opposition);
    for t in [&sneaker, &ally, &guard] {
        platform.add_token(t.clone());
    }
    let orchestrator = orchestrator(&platform);

    let id = orchestrator
        .start_sneak_session(&sneaker, &[ally.clone(), guard.clone()], Some("msg-1"))
        .unwrap();
    platform.move_token(&sneaker.id, Vec2::new(0.0, 500.0));

    let enhanced = orchestrator.process_outcomes(
        &id,
        &[
            outcome("ally", Visibility::Hidden),
            outcome("guard", Visibility::Hidden),
        ],
    );
    // The ally was filtered at start, so it carries no position data
    assert!(!enhanced[0].has_position_data);
    assert!(enhanced[1].has_position_data);
}

#[test]
fn test_outcomes_without_movement_carry_no_positions() {
    let platform = Arc::new(MemoryPlatform::new());
    let sneaker = token("sneaker", 0.0, 0.0, Alliance::Party);
    let guard = token("guard", 1000.0, 0.0, Alliance::Opposition);
    platform.add_token(sneaker.clone());
    platform.add_token(guard.clone());
    let orchestrator = orchestrator(&platform);

    let id = orchestrator
        .start_sneak_session(&sneaker, &[guard], Some("msg-1"))
        .unwrap();
    let enhanced = orchestrator.process_outcomes(&id, &[outcome("guard", Visibility::Hidden)]);
    assert!(!enhanced[0].has_position_data);
    assert!(enhanced[0].position_transition.is_none());
}

#[test]
fn test_apply_to_missing_session_is_a_hard_error() {
    let platform = Arc::new(MemoryPlatform::new());
    let orchestrator = orchestrator(&platform);
    let error = orchestrator
        .apply_results(&SessionId::new("never-started"), &[])
        .unwrap_err();
    assert!(matches!(error, VantageError::SessionNotFound(_)));
}

#[test]
fn test_failed_apply_caches_no_transaction() {
    let platform = Arc::new(MemoryPlatform::new());
    let sneaker = token("sneaker", 0.0, 0.0, Alliance::Party);
    let guard = token("guard", 1000.0, 0.0, Alliance::Opposition);
    platform.add_token(sneaker.clone());
    platform.add_token(guard.clone());
    let orchestrator = orchestrator(&platform);

    let id = orchestrator
        .start_sneak_session(&sneaker, &[guard], Some("msg-1"))
        .unwrap();
    let enhanced = orchestrator.process_outcomes(&id, &[outcome("guard", Visibility::Hidden)]);

    platform.fail_visibility_write(true);
    let result = orchestrator.apply_results(&id, &enhanced).unwrap();
    assert!(!result.success);
    assert!(!orchestrator.revert_results(&id));
}

#[test]
fn test_restarting_session_clears_prior_transaction() {
    let platform = Arc::new(MemoryPlatform::new());
    let sneaker = token("sneaker", 0.0, 0.0, Alliance::Party);
    let guard = token("guard", 1000.0, 0.0, Alliance::Opposition);
    platform.add_token(sneaker.clone());
    platform.add_token(guard.clone());
    let orchestrator = orchestrator(&platform);

    let id = orchestrator
        .start_sneak_session(&sneaker, &[guard.clone()], Some("msg-1"))
        .unwrap();
    let enhanced = orchestrator.process_outcomes(&id, &[outcome("guard", Visibility::Hidden)]);
    assert!(orchestrator.apply_results(&id, &enhanced).unwrap().success);

    // Same-id restart replaces the session and drops the cached transaction
    orchestrator
        .start_sneak_session(&sneaker, &[guard], Some("msg-1"))
        .unwrap();
    assert!(!orchestrator.revert_results(&id));
}

#[test]
fn test_calculator_outage_during_session_notifies_user() {
    let platform = Arc::new(MemoryPlatform::new());
    let sneaker = token("sneaker", 0.0, 0.0, Alliance::Party);
    let guard = token("guard", 1000.0, 0.0, Alliance::Opposition);
    platform.add_token(sneaker.clone());
    platform.add_token(guard.clone());
    platform.fail_visibility_calc(true);
    let orchestrator = orchestrator(&platform);

    // Start capture falls back on the visibility axis; the degradation is
    // severe enough to surface to the user
    let id = orchestrator
        .start_sneak_session(&sneaker, &[guard.clone()], Some("msg-1"))
        .unwrap();
    assert_eq!(platform.notifications().len(), 1);

    // Every recapture reports again, but the per-session cap holds at 3
    for _ in 0..5 {
        platform.move_token(&sneaker.id, Vec2::new(100.0, 0.0));
        orchestrator.process_outcomes(&id, &[outcome("guard", Visibility::Hidden)]);
    }
    assert_eq!(platform.notifications().len(), 3);

    // Ending the session resets its notification budget; a same-id restart
    // gets a fresh one
    orchestrator.end_sneak_session(&id);
    orchestrator
        .start_sneak_session(&sneaker, &[guard], Some("msg-1"))
        .unwrap();
    assert_eq!(platform.notifications().len(), 4);
}

#[test]
fn test_stale_sessions_are_swept() {
    let platform = Arc::new(MemoryPlatform::new());
    let sneaker = token("sneaker", 0.0, 0.0, Alliance::Party);
    platform.add_token(sneaker.clone());
    let orchestrator = orchestrator(&platform);

    orchestrator
        .start_sneak_session(&sneaker, &[], Some("msg-1"))
        .unwrap();
    // Nothing is stale yet
    assert_eq!(orchestrator.sweep_stale_sessions(60_000), 0);
    assert_eq!(orchestrator.session_count(), 1);
    // With a zero allowance everything is stale
    assert_eq!(orchestrator.sweep_stale_sessions(0), 1);
    assert_eq!(orchestrator.session_count(), 0);
    assert!(!platform.is_sneaking(&sneaker.id));
}
