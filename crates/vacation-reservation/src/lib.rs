//! Reservation objects, reservation-info records, and customers — the
//! per-relation and per-customer state the manager's four tables hold,
//! plus the four transactional operations that mutate a reservation.

mod customer;
mod reservation;

pub use customer::Customer;
pub use reservation::{add_to_total, cancel, make, mark_deleted, update_price, Reservation};
pub use vacation_core::Kind;

/// A customer-side record linking a customer to a relation by
/// `(kind, id, price)`. Ordered by `(kind, id)` inside a customer's
/// reservation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationInfo {
    pub kind: Kind,
    pub id: i64,
    pub price: i64,
}

impl ReservationInfo {
    pub fn new(kind: Kind, id: i64, price: i64) -> Self {
        Self { kind, id, price }
    }
}
