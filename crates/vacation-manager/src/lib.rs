//! The four-table manager: cars, flights, rooms, and customers, plus
//! every admin and workload operation spec.md §4.4 names. Every
//! mutating operation is a single composition of
//! `vacation_collections::TxMap` and `vacation_reservation` calls,
//! wrapped at exactly one boundary — the `&mut Transaction` a caller
//! hands in, or `None` for the sequential setup/cleanup phases — so
//! the manager itself never touches a `TVar` directly.

mod manager;

pub use manager::Manager;
