//! Framework-agnostic business logic.
//!
//! Storage-facing modules expose free functions generic over
//! [`sea_orm::ConnectionTrait`]; [`controller::SessionController`] ties them
//! together behind the session state machine.

pub mod access_gate;
pub mod attachments;
pub mod controller;
pub mod counters;
pub mod credentials;
pub mod ledger;
pub mod password;
pub mod session;
