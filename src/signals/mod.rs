//! Signal adapters: a uniform async trait with two concrete source kinds,
//! plus the pure helpers the file-backed variant relies on.

pub mod adapter;
pub mod file_adapter;
pub mod network_adapter;
pub mod raw_store;
pub mod tradingview;

pub use adapter::{fetch_with_timeout, SignalAdapter};
pub use file_adapter::FileSignalAdapter;
pub use network_adapter::{NetworkSignalAdapter, ProducerReport};
