//! Starkclaw: policy-gated Starknet actions.
//!
//! Prepared actions are checked against their session policy, routed through
//! a local or remote signer, and journaled with the correlation ids needed to
//! audit every attempt afterwards.

pub mod activity;
pub mod bootstrap;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod heartbeat;
pub mod identity;
pub mod llm;
pub mod net;
pub mod paymaster;
pub mod policy;
pub mod sanitize;
pub mod settings;
pub mod starknet;
pub mod store;
pub mod tx_status;

pub use error::{Error, ErrorSurface};
