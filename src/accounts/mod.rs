//! Account Processor Adapter: the venue-facing contract the reconciliation
//! engine drives.

pub mod adapter;
pub mod generic_rest;
pub mod mock;

pub use adapter::AccountAdapter;
pub use generic_rest::GenericRestAccountAdapter;
pub use mock::{MockAccountAdapter, MockAccountConfig};
