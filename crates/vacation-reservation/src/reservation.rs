use std::sync::Arc;
use vacation_stm::{Aborted, TVar, Transaction};

/// One row of a relation table: a car, a flight, or a room.
///
/// `num_free` is materialized (`num_total - num_used`) rather than
/// computed on read, so every mutation must keep it in lockstep — the
/// invariant `num_free + num_used == num_total` is checked by every
/// operation below and never left transiently violated within a single
/// call.
///
/// `price == -1` is the "deleted but kept for history" sentinel used
/// by the manager when a relation with live reservations can't be
/// physically removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub id: i64,
    pub num_total: i64,
    pub num_used: i64,
    pub num_free: i64,
    pub price: i64,
}

impl Reservation {
    pub fn new(id: i64, num_total: i64, price: i64) -> Self {
        Self {
            id,
            num_total,
            num_used: 0,
            num_free: num_total,
            price,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.price < 0
    }

    /// `numTotal += delta; numFree += delta`. Fails (leaves `self`
    /// unchanged) if that would drive `numFree` negative, i.e. if the
    /// resulting `numTotal` would fall below `numUsed`.
    fn add_to_total(&mut self, delta: i64) -> bool {
        let new_free = self.num_free + delta;
        if new_free < 0 {
            return false;
        }
        self.num_total += delta;
        self.num_free = new_free;
        true
    }

    /// Requires `numFree > 0`; `numFree -= 1; numUsed += 1`.
    fn make(&mut self) -> bool {
        if self.num_free <= 0 {
            return false;
        }
        self.num_free -= 1;
        self.num_used += 1;
        true
    }

    /// Requires `numUsed > 0`; `numUsed -= 1; numFree += 1`.
    fn cancel(&mut self) -> bool {
        if self.num_used <= 0 {
            return false;
        }
        self.num_used -= 1;
        self.num_free += 1;
        true
    }

    /// Requires `price >= 0`.
    fn update_price(&mut self, price: i64) -> bool {
        if price < 0 {
            return false;
        }
        self.price = price;
        true
    }
}

fn read_cell(
    tx: &mut Option<&mut Transaction<'_>>,
    cell: &Arc<TVar<Reservation>>,
) -> Result<Reservation, Aborted> {
    match tx {
        Some(tx) => tx.read(cell),
        None => Ok(cell.read_untracked()),
    }
}

fn write_cell(tx: &mut Option<&mut Transaction<'_>>, cell: &Arc<TVar<Reservation>>, value: Reservation) {
    match tx {
        Some(tx) => tx.write(cell, value),
        None => cell.write_untracked(value),
    }
}

/// Transactional wrapper around [`Reservation::add_to_total`]: reads
/// the cell, applies the business rule, and — only on success — writes
/// the result back. A logical failure leaves the cell untouched and
/// returns `Ok(false)`, never an abort.
pub fn add_to_total(
    mut tx: Option<&mut Transaction<'_>>,
    cell: &Arc<TVar<Reservation>>,
    delta: i64,
) -> Result<bool, Aborted> {
    let mut r = read_cell(&mut tx, cell)?;
    if !r.add_to_total(delta) {
        return Ok(false);
    }
    write_cell(&mut tx, cell, r);
    Ok(true)
}

pub fn make(mut tx: Option<&mut Transaction<'_>>, cell: &Arc<TVar<Reservation>>) -> Result<bool, Aborted> {
    let mut r = read_cell(&mut tx, cell)?;
    if !r.make() {
        return Ok(false);
    }
    write_cell(&mut tx, cell, r);
    Ok(true)
}

pub fn cancel(mut tx: Option<&mut Transaction<'_>>, cell: &Arc<TVar<Reservation>>) -> Result<bool, Aborted> {
    let mut r = read_cell(&mut tx, cell)?;
    if !r.cancel() {
        return Ok(false);
    }
    write_cell(&mut tx, cell, r);
    Ok(true)
}

pub fn update_price(
    mut tx: Option<&mut Transaction<'_>>,
    cell: &Arc<TVar<Reservation>>,
    price: i64,
) -> Result<bool, Aborted> {
    let mut r = read_cell(&mut tx, cell)?;
    if !r.update_price(price) {
        return Ok(false);
    }
    write_cell(&mut tx, cell, r);
    Ok(true)
}

/// Sets `price` to the "deleted but retained for history" sentinel
/// directly, bypassing [`update_price`]'s `price >= 0` guard. Used by
/// the manager when a relation with live reservations is deleted down
/// to zero capacity but can't be physically removed from the table.
pub fn mark_deleted(mut tx: Option<&mut Transaction<'_>>, cell: &Arc<TVar<Reservation>>) -> Result<(), Aborted> {
    let mut r = read_cell(&mut tx, cell)?;
    r.price = -1;
    write_cell(&mut tx, cell, r);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_reservation_starts_fully_free() {
        let r = Reservation::new(1, 100, 50);
        assert_eq!(r.num_free, 100);
        assert_eq!(r.num_used, 0);
        assert_eq!(r.num_free + r.num_used, r.num_total);
    }

    #[test]
    fn make_then_cancel_round_trips() {
        let mut r = Reservation::new(1, 1, 50);
        assert!(r.make());
        assert_eq!((r.num_free, r.num_used), (0, 1));
        assert!(!r.make()); // no capacity left
        assert!(r.cancel());
        assert_eq!((r.num_free, r.num_used), (1, 0));
        assert!(!r.cancel()); // nothing left to cancel
    }

    #[test]
    fn add_to_total_rejects_going_negative() {
        let mut r = Reservation::new(1, 5, 50);
        assert!(!r.add_to_total(-10));
        assert_eq!(r.num_total, 5);
        assert!(r.add_to_total(-5));
        assert_eq!((r.num_total, r.num_free), (0, 0));
    }

    #[test]
    fn add_to_total_rejects_dropping_below_num_used() {
        // numTotal=5, numUsed=3, numFree=2: delete*(4) would leave
        // numTotal=1 < numUsed=3, i.e. numFree=-2. Must fail and leave
        // the reservation untouched, matching spec.md §8's "delete*
        // reducing numTotal below numUsed must fail".
        let mut r = Reservation::new(1, 5, 50);
        assert!(r.make());
        assert!(r.make());
        assert!(r.make());
        assert_eq!((r.num_total, r.num_used, r.num_free), (5, 3, 2));

        assert!(!r.add_to_total(-4));
        assert_eq!((r.num_total, r.num_used, r.num_free), (5, 3, 2));

        assert!(r.add_to_total(-2));
        assert_eq!((r.num_total, r.num_used, r.num_free), (3, 3, 0));
    }

    #[test]
    fn update_price_rejects_negative() {
        let mut r = Reservation::new(1, 5, 50);
        assert!(!r.update_price(-1));
        assert!(r.update_price(0));
        assert_eq!(r.price, 0);
    }

    #[test]
    fn invariant_holds_after_every_operation() {
        let mut r = Reservation::new(7, 10, 20);
        for _ in 0..5 {
            r.make();
        }
        assert_eq!(r.num_free + r.num_used, r.num_total);
        r.add_to_total(3);
        assert_eq!(r.num_free + r.num_used, r.num_total);
        r.cancel();
        assert_eq!(r.num_free + r.num_used, r.num_total);
    }

    #[test]
    fn transactional_wrapper_commits_through_the_stm() {
        let stm = vacation_stm::Stm::new();
        let cell = TVar::new(Reservation::new(1, 1, 50));
        let ok = stm.atomically(false, |tx| make(Some(tx), &cell));
        assert!(ok);
        assert_eq!(cell.read_untracked().num_used, 1);
    }
}
