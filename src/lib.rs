//! # vacation
//!
//! STM-backed online travel-reservation benchmark. Clients concurrently
//! reserve and cancel cars, flights, and rooms against a shared
//! in-memory database; every mutation runs inside an optimistic
//! software-transactional-memory transaction, so the crate doubles as a
//! workload for measuring STM throughput and a worked example of
//! building one.
//!
//! # Architecture
//!
//! | Crate | Purpose |
//! |---|---|
//! | [`vacation_stm`] | Word-level TL2-style STM runtime |
//! | [`vacation_collections`] | Transactional red-black tree |
//! | [`vacation_reservation`] | Reservation, reservation-info, customer types |
//! | [`vacation_manager`] | Four-table manager (cars, flights, rooms, customers) |
//! | [`vacation_client`] | Deterministic client driver |
//!
//! The `vacation-cli` binary wires these together behind a `clap`
//! command line; this crate re-exports the pieces needed to embed the
//! benchmark in a test harness without going through the CLI.

pub use vacation_client::{Action, Client};
pub use vacation_core::{Config, Kind, VacationError};
pub use vacation_manager::Manager;
pub use vacation_stm::{Stm, Transaction};
