//! Wire protocol and client-side synchronization shared by the plaza server
//! and its clients.

pub mod client;
pub mod config;
pub mod protocol;
