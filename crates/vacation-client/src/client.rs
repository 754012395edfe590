use vacation_core::{Config, Kind, Random};
use vacation_manager::Manager;
use vacation_stm::Stm;

use crate::stats::ClientStats;

/// Which of the three workload actions a transaction attempt took.
/// Mirrors the reference `client_run` dispatch on a rolled percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MakeReservation,
    DeleteCustomer,
    UpdateTables,
}

/// One worker's slice of the benchmark: its own PRNG, its transaction
/// quota, and the `-n`/`-q`/`-u` derived parameters that shape its
/// action mix. Constructed once per thread the pool spawns and
/// consumed by [`Client::run`].
pub struct Client {
    id: u32,
    quota: u64,
    queries_per_transaction: u32,
    query_range: i64,
    percent_user: u32,
    random: Random,
}

impl Client {
    /// `id` is this worker's index in `0..config.clients`, used both to
    /// derive this client's share of the transaction quota and to give
    /// each client's PRNG a distinct stream from the same run seed.
    pub fn new(id: u32, config: &Config) -> Self {
        Self {
            id,
            quota: config.transactions_for_client(id),
            queries_per_transaction: config.queries_per_transaction.max(1),
            query_range: config.query_range().max(1) as i64,
            percent_user: config.percent_user,
            random: Random::new(config.seed.wrapping_add(id as u64 + 1)),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn quota(&self) -> u64 {
        self.quota
    }

    /// Runs this client's whole quota of transactions against `manager`
    /// through `stm`, returning attempt/success counts per action.
    pub fn run(mut self, manager: &Manager, stm: &Stm) -> ClientStats {
        let mut stats = ClientStats::default();
        for _ in 0..self.quota {
            let action = self.pick_action();
            let committed_true = match action {
                Action::MakeReservation => self.make_reservation(manager, stm),
                Action::DeleteCustomer => self.delete_customer(manager, stm),
                Action::UpdateTables => self.update_tables(manager, stm),
            };
            stats.record(action, committed_true);
        }
        stats
    }

    fn pick_action(&mut self) -> Action {
        let a = self.random.next_below(100) as u32;
        let u = self.percent_user;
        if a < u {
            Action::MakeReservation
        } else if a < u + (100 - u) / 2 {
            Action::DeleteCustomer
        } else {
            Action::UpdateTables
        }
    }

    fn random_kind(&mut self) -> Kind {
        match self.random.next_below(3) {
            0 => Kind::Car,
            1 => Kind::Flight,
            _ => Kind::Room,
        }
    }

    fn random_id(&mut self) -> i64 {
        self.random.next_range(1, self.query_range as u64) as i64
    }

    /// Pick a customer id and up to `n` (kind, id) pairs; within one
    /// transaction query each pair's price, reserve against the kind
    /// quoting the highest price (ties broken by `Kind`'s declared
    /// `Car < Flight < Room` order), or fail if none had capacity.
    fn make_reservation(&mut self, manager: &Manager, stm: &Stm) -> bool {
        let cust_id = self.random_id();
        let pairs: Vec<(Kind, i64)> = (0..self.queries_per_transaction)
            .map(|_| (self.random_kind(), self.random_id()))
            .collect();

        stm.atomically(false, |tx| {
            let mut best: Option<(Kind, i64, i64)> = None;
            for &(kind, id) in &pairs {
                let (free, price) = match kind {
                    Kind::Car => manager.query_car(tx, id)?,
                    Kind::Flight => manager.query_flight(tx, id)?,
                    Kind::Room => manager.query_room(tx, id)?,
                };
                if free <= 0 {
                    continue;
                }
                let take = match best {
                    None => true,
                    Some((best_kind, _, best_price)) => price > best_price || (price == best_price && kind < best_kind),
                };
                if take {
                    best = Some((kind, id, price));
                }
            }
            match best {
                None => Ok(false),
                Some((Kind::Car, id, _)) => manager.reserve_car(tx, cust_id, id),
                Some((Kind::Flight, id, _)) => manager.reserve_flight(tx, cust_id, id),
                Some((Kind::Room, id, _)) => manager.reserve_room(tx, cust_id, id),
            }
        })
    }

    /// Query the customer's bill (read-before-write, per spec.md
    /// §4.5), then delete them.
    fn delete_customer(&mut self, manager: &Manager, stm: &Stm) -> bool {
        let cust_id = self.random_id();
        stm.atomically(false, |tx| {
            let _bill = manager.query_customer_bill(tx, cust_id)?;
            manager.delete_customer(tx, cust_id)
        })
    }

    /// Pick up to `n` (kind, id) pairs; for each, flip a coin between
    /// growing the relation (`add*` with a random positive num/price)
    /// and shrinking it (`delete*` with a random num). Succeeds if any
    /// one of the pairs' operations succeeded.
    fn update_tables(&mut self, manager: &Manager, stm: &Stm) -> bool {
        let ops: Vec<(Kind, i64, bool, i64, i64)> = (0..self.queries_per_transaction)
            .map(|_| {
                let kind = self.random_kind();
                let id = self.random_id();
                let is_add = self.random.next_below(2) == 0;
                let num = ((self.random.next_below(5) + 1) * 100) as i64;
                let price = (self.random.next_below(5) * 10 + 50) as i64;
                (kind, id, is_add, num, price)
            })
            .collect();

        stm.atomically(false, |tx| {
            let mut any_ok = false;
            for &(kind, id, is_add, num, price) in &ops {
                let ok = if is_add {
                    match kind {
                        Kind::Car => manager.add_car(tx, id, num, price)?,
                        Kind::Flight => manager.add_flight(tx, id, num, price)?,
                        Kind::Room => manager.add_room(tx, id, num, price)?,
                    }
                } else {
                    match kind {
                        Kind::Car => manager.delete_car(tx, id, num)?,
                        Kind::Flight => manager.delete_flight(tx, id, num)?,
                        Kind::Room => manager.delete_room(tx, id, num)?,
                    }
                };
                any_ok |= ok;
            }
            Ok(any_ok)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vacation_core::Config;

    fn config(clients: u32, transactions: u64, percent_user: u32, seed: u64) -> Config {
        Config::new(clients, 4, 100, 16, transactions, percent_user, seed).unwrap()
    }

    #[test]
    fn quota_matches_config_split() {
        let cfg = config(4, 10, 80, 7);
        let total: u64 = (0..4).map(|i| Client::new(i, &cfg).quota()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn a_run_with_all_make_reservation_only_attempts_that_action() {
        let cfg = config(1, 50, 100, 11);
        let manager = Manager::setup(&cfg);
        let stm = Stm::new();
        let client = Client::new(0, &cfg);
        let stats = client.run(&manager, &stm);
        assert_eq!(stats.total_attempts(), 50);
        assert_eq!(stats.make_reservation_attempts, 50);
        assert_eq!(stats.delete_customer_attempts, 0);
        assert_eq!(stats.update_tables_attempts, 0);
        manager.cleanup(&cfg);
    }

    #[test]
    fn a_run_with_zero_percent_user_never_attempts_make_reservation() {
        let cfg = config(1, 50, 0, 5);
        let manager = Manager::setup(&cfg);
        let stm = Stm::new();
        let client = Client::new(0, &cfg);
        let stats = client.run(&manager, &stm);
        assert_eq!(stats.make_reservation_attempts, 0);
        manager.cleanup(&cfg);
    }

    #[test]
    fn concurrent_clients_against_a_shared_manager_never_corrupt_an_invariant() {
        let cfg = config(8, 2000, 80, 99);
        let manager = Manager::setup(&cfg);
        let stm = Stm::new();
        std::thread::scope(|scope| {
            for id in 0..cfg.clients {
                let manager = &manager;
                let stm = &stm;
                let cfg = &cfg;
                scope.spawn(move || {
                    Client::new(id, cfg).run(manager, stm);
                });
            }
        });
        for id in 1..=cfg.relations as i64 {
            let (free, price) = manager.query_car_seq(id);
            if price >= 0 {
                assert!(free >= 0);
            }
        }
        manager.cleanup(&cfg);
    }
}
