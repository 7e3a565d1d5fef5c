//! Networking: REST collaborators and the STOMP realtime channel.
//!
//! SYSTEM CONTEXT
//! ==============
//! `transport` opens sockets, `connection` runs the STOMP session and its
//! reconnect loop, `subscription` tracks per-user topics, `decode` turns
//! message bodies into events, `api` wraps the REST endpoints, and `types`
//! defines the shared wire schema.

pub mod api;
pub mod connection;
pub mod decode;
pub mod subscription;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;
