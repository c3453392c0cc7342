//! Signal-weighted futures reconciliation orchestrator.
//!
//! Converts weighted external signals into per-account, per-symbol futures
//! position targets and drives every configured venue toward them each
//! cycle. See `main.rs` for the entrypoint and `cycle.rs` for the driver
//! loop.

pub mod accounts;
pub mod aggregator;
pub mod asset_mapper;
pub mod backoff;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod cycle;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod signals;
pub mod spec_cache;
pub mod weight_config;
