//! Purpose: Internal engine modules behind the public `api` boundary.
//! Exports: cursor/page model, stores, iterator, pager, collation, errors.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.

pub mod collate;
pub mod cursor;
pub mod error;
pub mod iter;
pub mod memory;
pub mod pager;
pub mod remote;
pub mod store;
