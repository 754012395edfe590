use crate::VacationError;

/// Immutable run parameters, built once from the CLI and handed to the
/// manager and client constructors. Replaces the reference
/// implementation's `global_params[256]` table indexed by flag
/// character with a plain typed record.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// `-c`: number of client worker threads.
    pub clients: u32,
    /// `-n`: queries (operations) attempted per transaction.
    pub queries_per_transaction: u32,
    /// `-q`: percent of relations reachable by a client, used to derive
    /// `query_range`.
    pub percent_query: u32,
    /// `-r`: total number of relations per table.
    pub relations: u64,
    /// `-t`: total number of transactions across all clients.
    pub transactions: u64,
    /// `-u`: percent of transactions that are MAKE_RESERVATION.
    pub percent_user: u32,
    /// PRNG seed (not part of the original flag set; needed to make
    /// runs reproducible).
    pub seed: u64,
}

impl Config {
    pub const DEFAULT_CLIENTS: u32 = 1;
    pub const DEFAULT_NUMBER: u32 = 10;
    pub const DEFAULT_QUERIES: u32 = 90;
    pub const DEFAULT_RELATIONS: u64 = 1 << 16;
    pub const DEFAULT_TRANSACTIONS: u64 = 1 << 26;
    pub const DEFAULT_USER: u32 = 80;

    /// Validates the parsed flags and derives the per-client quantities.
    ///
    /// Every field must be strictly positive except `percent_query` and
    /// `percent_user`, which must additionally be in `0..=100`.
    pub fn new(
        clients: u32,
        queries_per_transaction: u32,
        percent_query: u32,
        relations: u64,
        transactions: u64,
        percent_user: u32,
        seed: u64,
    ) -> Result<Self, VacationError> {
        if clients == 0 {
            return Err(VacationError::NonPositive {
                flag: "-c",
                value: clients as i64,
            });
        }
        if relations == 0 {
            return Err(VacationError::NonPositive {
                flag: "-r",
                value: relations as i64,
            });
        }
        if percent_query > 100 {
            return Err(VacationError::InvalidArgument(format!(
                "-q must be within 0..=100, got {percent_query}"
            )));
        }
        if percent_user > 100 {
            return Err(VacationError::InvalidArgument(format!(
                "-u must be within 0..=100, got {percent_user}"
            )));
        }
        Ok(Self {
            clients,
            queries_per_transaction,
            percent_query,
            relations,
            transactions,
            percent_user,
            seed,
        })
    }

    /// Transaction quota per client, rounded (the last client absorbs
    /// the remainder so the totals sum to `transactions`).
    pub fn transactions_for_client(&self, client_index: u32) -> u64 {
        let per_client = self.transactions / self.clients as u64;
        let remainder = self.transactions % self.clients as u64;
        if (client_index as u64) < remainder {
            per_client + 1
        } else {
            per_client
        }
    }

    /// Highest relation id a client may target, derived from `-q`/`-r`.
    pub fn query_range(&self) -> u64 {
        ((self.percent_query as u64) * self.relations + 50) / 100
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_CLIENTS,
            Self::DEFAULT_NUMBER,
            Self::DEFAULT_QUERIES,
            Self::DEFAULT_RELATIONS,
            Self::DEFAULT_TRANSACTIONS,
            Self::DEFAULT_USER,
            0,
        )
        .expect("default parameters are always valid")
    }
}
