//! The client driver: per-worker PRNG, transaction quota, and the three
//! workload actions (MAKE_RESERVATION, DELETE_CUSTOMER, UPDATE_TABLES)
//! spec.md §4.5 names. One [`Client`] is constructed per worker thread
//! and consumes its whole quota inside [`Client::run`].

mod client;
mod stats;

pub use client::{Action, Client};
pub use stats::ClientStats;
