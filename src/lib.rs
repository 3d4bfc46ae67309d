//! gatewarden - DNS blocklist manager for cloud filtering gateways.
//!
//! Aggregates public domain blocklist feeds, reduces them to a minimal
//! block-set and reconciles the result against the gateway account's
//! list and rule resources with minimal API churn.
//!
//! # Architecture
//!
//! ```text
//! sources ──> fetcher ──> normalize ──> optimizer ──> reconciler ──> gateway
//!   (HTTP)    (download)  (validate,    (dedup,       (plan/apply     (REST)
//!                          filter)       prune,        minimal diff)
//!                                        chunk)
//! ```
//!
//! The pipeline is one-directional: every stage takes owned data from the
//! previous one and the only effectful stages are the fetcher and the
//! reconciler's executor. Planning is pure, so a dry run exercises the
//! exact control flow of a real run.

pub mod artifact;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod gateway;
pub mod normalize;
pub mod optimizer;
pub mod reconciler;
pub mod state;
pub mod utils;

pub use config::Config;
pub use error::GatewayError;
