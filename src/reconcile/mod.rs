//! Three-level parallel reconciliation engine: accounts, then symbols
//! within an account, then each symbol's own sequential operations.

pub mod engine;
pub mod quantize;
pub mod state_machine;

pub use engine::{run_cycle, AccountJob};
