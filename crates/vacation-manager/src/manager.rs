use std::sync::Arc;

use vacation_collections::TxMap;
use vacation_core::{Config, Kind, Random};
use vacation_reservation::{add_to_total, cancel, make, mark_deleted, update_price, Customer, Reservation};
use vacation_stm::{Aborted, TVar, Transaction};

/// Reborrows an `Option<&mut Transaction<'_>>` so the same transaction
/// can be threaded through several sequential calls inside one manager
/// operation without the first call consuming it. Mirrors the
/// `read_cell`/`write_cell` reborrow pattern `vacation-reservation`
/// uses internally, generalized to manager-level composition of
/// several tree and reservation calls in a row.
fn reborrow<'a, 'b>(tx: &'a mut Option<&mut Transaction<'b>>) -> Option<&'a mut Transaction<'b>> {
    match tx {
        Some(t) => Some(&mut **t),
        None => None,
    }
}

fn read_reservation(
    tx: &mut Option<&mut Transaction<'_>>,
    cell: &Arc<TVar<Reservation>>,
) -> Result<Reservation, Aborted> {
    match reborrow(tx) {
        Some(t) => t.read(cell),
        None => Ok(cell.read_untracked()),
    }
}

/// The four relation/customer tables spec.md §3 names, and every
/// add/delete/query/reserve operation built on top of them.
pub struct Manager {
    cars: TxMap<Reservation>,
    flights: TxMap<Reservation>,
    rooms: TxMap<Reservation>,
    customers: TxMap<Customer>,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            cars: TxMap::new(),
            flights: TxMap::new(),
            rooms: TxMap::new(),
            customers: TxMap::new(),
        }
    }

    // ---- setup / cleanup (sequential; original_source/vacation.c) ----

    /// Populates all four tables for `config.relations` ids, matching
    /// `initializeManager` in `original_source/vacation.c`: one shared
    /// PRNG, a fresh Fisher-Yates shuffle of `1..=numRelation` before
    /// each table, `num = (prng % 5 + 1) * 100`, `price = (prng % 5) *
    /// 10 + 50` for cars/flights/rooms, and a plain `addCustomer` (no
    /// num/price) for the customer table. Every id ends up present in
    /// all four tables — see SPEC_FULL.md §9 for why that's not an
    /// invariant cleanup may assume stays true.
    pub fn setup(config: &Config) -> Self {
        let manager = Self::new();
        let num_relation = config.relations;
        let mut random = Random::new(config.seed);
        let mut ids: Vec<i64> = (1..=num_relation as i64).collect();

        tracing::debug!(num_relation, "populating manager tables");

        for table_index in 0..4u32 {
            random.shuffle(&mut ids);
            for &id in &ids {
                let num = ((random.next_below(5) + 1) * 100) as i64;
                let price = ((random.next_below(5)) * 10 + 50) as i64;
                let ok = match table_index {
                    0 => manager.add_car_seq(id, num, price),
                    1 => manager.add_flight_seq(id, num, price),
                    2 => manager.add_room_seq(id, num, price),
                    _ => manager.add_customer_seq(id),
                };
                assert!(ok, "setup-phase add into an empty table cannot fail");
            }
        }

        manager
    }

    /// Tears down every id `1..=config.relations` across all four
    /// tables, matching `cleanupManager`. Deletes of already-absent
    /// ids (a customer the workload already removed, a relation the
    /// workload already zeroed out) are ordinary logical failures, not
    /// errors — cleanup does not assert on their return value.
    pub fn cleanup(&self, config: &Config) {
        let num_relation = config.relations as i64;
        for id in 1..=num_relation {
            self.delete_customer_seq(id);
        }
        for id in 1..=num_relation {
            self.delete_car_seq(id, self.query_car_seq(id).0.max(0));
            self.delete_flight_seq(id, self.query_flight_seq(id).0.max(0));
            self.delete_room_seq(id, self.query_room_seq(id).0.max(0));
        }
    }

    // ---- reserve / cancel ----

    fn reserve(
        &self,
        mut tx: Option<&mut Transaction<'_>>,
        table: &TxMap<Reservation>,
        kind: Kind,
        cust_id: i64,
        id: i64,
    ) -> Result<bool, Aborted> {
        let customer = match self.customers.find(reborrow(&mut tx), cust_id)? {
            Some(c) => c,
            None => return Ok(false),
        };
        let cell = match table.value_cell(reborrow(&mut tx), id)? {
            Some(c) => c,
            None => return Ok(false),
        };
        if customer.has_reservation_info(reborrow(&mut tx), kind, id)? {
            return Ok(false);
        }
        if !make(reborrow(&mut tx), &cell)? {
            return Ok(false);
        }
        let price = read_reservation(&mut tx, &cell)?.price;
        customer.add_reservation_info(reborrow(&mut tx), kind, id, price)
    }

    fn cancel_reservation(
        &self,
        mut tx: Option<&mut Transaction<'_>>,
        table: &TxMap<Reservation>,
        kind: Kind,
        cust_id: i64,
        id: i64,
    ) -> Result<bool, Aborted> {
        let customer = match self.customers.find(reborrow(&mut tx), cust_id)? {
            Some(c) => c,
            None => return Ok(false),
        };
        let cell = match table.value_cell(reborrow(&mut tx), id)? {
            Some(c) => c,
            None => return Ok(false),
        };
        if !customer.has_reservation_info(reborrow(&mut tx), kind, id)? {
            return Ok(false);
        }
        if !cancel(reborrow(&mut tx), &cell)? {
            return Ok(false);
        }
        customer.remove_reservation_info(reborrow(&mut tx), kind, id)
    }

    pub fn reserve_car(&self, tx: &mut Transaction<'_>, cust_id: i64, id: i64) -> Result<bool, Aborted> {
        self.reserve(Some(tx), &self.cars, Kind::Car, cust_id, id)
    }

    pub fn reserve_flight(&self, tx: &mut Transaction<'_>, cust_id: i64, id: i64) -> Result<bool, Aborted> {
        self.reserve(Some(tx), &self.flights, Kind::Flight, cust_id, id)
    }

    pub fn reserve_room(&self, tx: &mut Transaction<'_>, cust_id: i64, id: i64) -> Result<bool, Aborted> {
        self.reserve(Some(tx), &self.rooms, Kind::Room, cust_id, id)
    }

    pub fn cancel_car(&self, tx: &mut Transaction<'_>, cust_id: i64, id: i64) -> Result<bool, Aborted> {
        self.cancel_reservation(Some(tx), &self.cars, Kind::Car, cust_id, id)
    }

    pub fn cancel_flight(&self, tx: &mut Transaction<'_>, cust_id: i64, id: i64) -> Result<bool, Aborted> {
        self.cancel_reservation(Some(tx), &self.flights, Kind::Flight, cust_id, id)
    }

    pub fn cancel_room(&self, tx: &mut Transaction<'_>, cust_id: i64, id: i64) -> Result<bool, Aborted> {
        self.cancel_reservation(Some(tx), &self.rooms, Kind::Room, cust_id, id)
    }

    // ---- query ----

    fn query(
        &self,
        mut tx: Option<&mut Transaction<'_>>,
        table: &TxMap<Reservation>,
        id: i64,
    ) -> Result<(i64, i64), Aborted> {
        match table.value_cell(reborrow(&mut tx), id)? {
            Some(cell) => {
                let r = read_reservation(&mut tx, &cell)?;
                Ok((r.num_free, r.price))
            }
            None => Ok((-1, -1)),
        }
    }

    pub fn query_car(&self, tx: &mut Transaction<'_>, id: i64) -> Result<(i64, i64), Aborted> {
        self.query(Some(tx), &self.cars, id)
    }

    pub fn query_flight(&self, tx: &mut Transaction<'_>, id: i64) -> Result<(i64, i64), Aborted> {
        self.query(Some(tx), &self.flights, id)
    }

    pub fn query_room(&self, tx: &mut Transaction<'_>, id: i64) -> Result<(i64, i64), Aborted> {
        self.query(Some(tx), &self.rooms, id)
    }

    pub fn query_car_seq(&self, id: i64) -> (i64, i64) {
        self.query(None, &self.cars, id).expect("sequential access never aborts")
    }

    pub fn query_flight_seq(&self, id: i64) -> (i64, i64) {
        self.query(None, &self.flights, id).expect("sequential access never aborts")
    }

    pub fn query_room_seq(&self, id: i64) -> (i64, i64) {
        self.query(None, &self.rooms, id).expect("sequential access never aborts")
    }

    /// Sum of prices over `cust_id`'s reservation-infos; `None` if no
    /// such customer exists.
    pub fn query_customer_bill(
        &self,
        tx: &mut Transaction<'_>,
        cust_id: i64,
    ) -> Result<Option<i64>, Aborted> {
        self.query_customer_bill_inner(Some(tx), cust_id)
    }

    pub fn query_customer_bill_seq(&self, cust_id: i64) -> Option<i64> {
        self.query_customer_bill_inner(None, cust_id)
            .expect("sequential access never aborts")
    }

    fn query_customer_bill_inner(
        &self,
        mut tx: Option<&mut Transaction<'_>>,
        cust_id: i64,
    ) -> Result<Option<i64>, Aborted> {
        match self.customers.find(reborrow(&mut tx), cust_id)? {
            None => Ok(None),
            Some(customer) => {
                let infos = customer.reservation_infos(reborrow(&mut tx))?;
                Ok(Some(infos.iter().map(|info| info.price).sum()))
            }
        }
    }

    // ---- admin: add ----

    fn add(
        &self,
        mut tx: Option<&mut Transaction<'_>>,
        table: &TxMap<Reservation>,
        id: i64,
        num: i64,
        price: i64,
    ) -> Result<bool, Aborted> {
        match table.value_cell(reborrow(&mut tx), id)? {
            Some(cell) => {
                let r = read_reservation(&mut tx, &cell)?;
                if r.is_deleted() {
                    // Revived: capacity starts fresh at `num`, but any
                    // customers still holding a reservation against
                    // this (logically deleted) relation keep theirs,
                    // so `numTotal` cannot drop below `numUsed`.
                    let num_total = num.max(r.num_used);
                    let revived = Reservation {
                        id,
                        num_total,
                        num_used: r.num_used,
                        num_free: num_total - r.num_used,
                        price,
                    };
                    match reborrow(&mut tx) {
                        Some(t) => t.write(&cell, revived),
                        None => cell.write_untracked(revived),
                    }
                    Ok(true)
                } else {
                    let mut ok = add_to_total(reborrow(&mut tx), &cell, num)?;
                    if ok && price >= 0 {
                        ok = update_price(reborrow(&mut tx), &cell, price)?;
                    }
                    Ok(ok)
                }
            }
            None => table.insert(reborrow(&mut tx), id, Reservation::new(id, num, price)),
        }
    }

    pub fn add_car(&self, tx: &mut Transaction<'_>, id: i64, num: i64, price: i64) -> Result<bool, Aborted> {
        self.add(Some(tx), &self.cars, id, num, price)
    }

    pub fn add_flight(&self, tx: &mut Transaction<'_>, id: i64, num: i64, price: i64) -> Result<bool, Aborted> {
        self.add(Some(tx), &self.flights, id, num, price)
    }

    pub fn add_room(&self, tx: &mut Transaction<'_>, id: i64, num: i64, price: i64) -> Result<bool, Aborted> {
        self.add(Some(tx), &self.rooms, id, num, price)
    }

    pub fn add_car_seq(&self, id: i64, num: i64, price: i64) -> bool {
        self.add(None, &self.cars, id, num, price).expect("sequential access never aborts")
    }

    pub fn add_flight_seq(&self, id: i64, num: i64, price: i64) -> bool {
        self.add(None, &self.flights, id, num, price).expect("sequential access never aborts")
    }

    pub fn add_room_seq(&self, id: i64, num: i64, price: i64) -> bool {
        self.add(None, &self.rooms, id, num, price).expect("sequential access never aborts")
    }

    // ---- admin: delete ----

    fn delete(
        &self,
        mut tx: Option<&mut Transaction<'_>>,
        table: &TxMap<Reservation>,
        id: i64,
        num: i64,
        require_unused: bool,
    ) -> Result<bool, Aborted> {
        let cell = match table.value_cell(reborrow(&mut tx), id)? {
            Some(cell) => cell,
            None => return Ok(false),
        };
        if require_unused && read_reservation(&mut tx, &cell)?.num_used > 0 {
            return Ok(false);
        }
        if !add_to_total(reborrow(&mut tx), &cell, -num)? {
            return Ok(false);
        }
        let r = read_reservation(&mut tx, &cell)?;
        if r.num_total == 0 && r.num_used == 0 {
            table.remove(reborrow(&mut tx), id)?;
        } else {
            mark_deleted(reborrow(&mut tx), &cell)?;
        }
        Ok(true)
    }

    pub fn delete_car(&self, tx: &mut Transaction<'_>, id: i64, num: i64) -> Result<bool, Aborted> {
        self.delete(Some(tx), &self.cars, id, num, false)
    }

    pub fn delete_flight(&self, tx: &mut Transaction<'_>, id: i64, num: i64) -> Result<bool, Aborted> {
        self.delete(Some(tx), &self.flights, id, num, true)
    }

    pub fn delete_room(&self, tx: &mut Transaction<'_>, id: i64, num: i64) -> Result<bool, Aborted> {
        self.delete(Some(tx), &self.rooms, id, num, false)
    }

    pub fn delete_car_seq(&self, id: i64, num: i64) -> bool {
        self.delete(None, &self.cars, id, num, false).expect("sequential access never aborts")
    }

    pub fn delete_flight_seq(&self, id: i64, num: i64) -> bool {
        self.delete(None, &self.flights, id, num, true).expect("sequential access never aborts")
    }

    pub fn delete_room_seq(&self, id: i64, num: i64) -> bool {
        self.delete(None, &self.rooms, id, num, false).expect("sequential access never aborts")
    }

    // ---- admin: customer ----

    fn add_customer_inner(&self, tx: Option<&mut Transaction<'_>>, id: i64) -> Result<bool, Aborted> {
        self.customers.insert(tx, id, Customer::new(id))
    }

    pub fn add_customer(&self, tx: &mut Transaction<'_>, id: i64) -> Result<bool, Aborted> {
        self.add_customer_inner(Some(tx), id)
    }

    pub fn add_customer_seq(&self, id: i64) -> bool {
        self.add_customer_inner(None, id).expect("sequential access never aborts")
    }

    fn delete_customer_inner(&self, mut tx: Option<&mut Transaction<'_>>, cust_id: i64) -> Result<bool, Aborted> {
        let customer = match self.customers.find(reborrow(&mut tx), cust_id)? {
            Some(c) => c,
            None => return Ok(false),
        };
        for info in customer.reservation_infos(reborrow(&mut tx))? {
            let table = match info.kind {
                Kind::Car => &self.cars,
                Kind::Flight => &self.flights,
                Kind::Room => &self.rooms,
            };
            if let Some(cell) = table.value_cell(reborrow(&mut tx), info.id)? {
                cancel(reborrow(&mut tx), &cell)?;
            }
        }
        self.customers.remove(reborrow(&mut tx), cust_id)
    }

    pub fn delete_customer(&self, tx: &mut Transaction<'_>, cust_id: i64) -> Result<bool, Aborted> {
        self.delete_customer_inner(Some(tx), cust_id)
    }

    pub fn delete_customer_seq(&self, cust_id: i64) -> bool {
        self.delete_customer_inner(None, cust_id).expect("sequential access never aborts")
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
