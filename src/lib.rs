//! Wolgate - an HTTP-triggered Wake-on-LAN gateway
//!
//! This library provides a small gateway intended to sit behind a reverse
//! proxy's forward-auth hook:
//! - Maps the inbound request's Host header to a configured machine using
//!   an ordered table of anchored regex patterns
//! - Broadcasts Wake-on-LAN magic packets over UDP to the machine's network
//! - Polls the machine's status endpoint until it answers, then returns 200
//!   so the original connection can proceed against the now-awake host

pub mod config;
pub mod error;
pub mod probe;
pub mod resolver;
pub mod server;
pub mod wol;
