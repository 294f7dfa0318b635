//! Vantage - visibility and cover resolution for virtual tabletops
//!
//! Computes per-pair visibility and cover states, detects geometric cover
//! through walls and intervening creatures, and orchestrates stealth
//! sessions from roll-time capture through transactional result
//! application and revert. The host platform is reached only through the
//! trait seams in [`platform`].

pub mod apply;
pub mod core;
pub mod cover;
pub mod fallback;
pub mod geometry;
pub mod integration;
pub mod platform;
pub mod position;
pub mod sneak;
