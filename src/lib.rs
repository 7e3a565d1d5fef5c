//! Real-time notification client for the IT-DA back end.
//!
//! SYSTEM CONTEXT
//! ==============
//! The back end pushes per-user notifications and badge unlocks over STOMP on
//! a WebSocket (`/topic/notification/{userId}`, `/topic/badge/{userId}`) and
//! serves the canonical collections over REST. This crate keeps one
//! connection per logged-in identity, decodes every pushed frame into a typed
//! event, reconciles it into local state and raises transient toasts.
//!
//! ```text
//! net::transport -> net::connection -> net::decode -> state (reconcile)
//!                        |                              |-> state::toast
//!                        `- net::subscription           `-> state::cache
//! actions -> net::api (REST) -> state
//! ```

pub mod actions;
pub mod config;
pub mod identity;
pub mod net;
pub mod session;
pub mod state;
