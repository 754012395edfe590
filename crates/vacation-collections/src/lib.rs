//! Transactional ordered map: a red-black tree keyed by `i64` whose
//! node fields are individually STM-backed, so traversal and
//! rebalancing compose directly out of `vacation_stm::Transaction`
//! reads and writes. See [`TxMap`] for the operation contract.

mod access;
mod node;
mod tree;

pub use tree::TxMap;
