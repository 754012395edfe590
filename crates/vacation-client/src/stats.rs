use crate::client::Action;

/// Attempt/success counts per workload action, aggregated across a
/// single client's quota (and, by the caller summing several, across a
/// whole run). Scenario 2 (§8) checks a kind's final `numUsed` against
/// the number of successful MAKE_RESERVATIONs counted this way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub make_reservation_attempts: u64,
    pub make_reservation_successes: u64,
    pub delete_customer_attempts: u64,
    pub delete_customer_successes: u64,
    pub update_tables_attempts: u64,
    pub update_tables_successes: u64,
}

impl ClientStats {
    pub(crate) fn record(&mut self, action: Action, committed_true: bool) {
        let (attempts, successes) = match action {
            Action::MakeReservation => (&mut self.make_reservation_attempts, &mut self.make_reservation_successes),
            Action::DeleteCustomer => (&mut self.delete_customer_attempts, &mut self.delete_customer_successes),
            Action::UpdateTables => (&mut self.update_tables_attempts, &mut self.update_tables_successes),
        };
        *attempts += 1;
        if committed_true {
            *successes += 1;
        }
    }

    /// Total transactions this stats value accounts for.
    pub fn total_attempts(&self) -> u64 {
        self.make_reservation_attempts + self.delete_customer_attempts + self.update_tables_attempts
    }

    /// Folds another client's stats into this one, for summing across
    /// worker threads once the thread pool joins.
    pub fn merge(&mut self, other: &ClientStats) {
        self.make_reservation_attempts += other.make_reservation_attempts;
        self.make_reservation_successes += other.make_reservation_successes;
        self.delete_customer_attempts += other.delete_customer_attempts;
        self.delete_customer_successes += other.delete_customer_successes;
        self.update_tables_attempts += other.update_tables_attempts;
        self.update_tables_successes += other.update_tables_successes;
    }
}
