//! The `vacation` binary: parses the six benchmark parameters, runs the
//! sequential setup phase, times the parallel client phase, then runs
//! sequential cleanup. Phase ordering mirrors
//! `original_source/vacation.c`'s `main`.

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use vacation_client::{Client, ClientStats};
use vacation_core::Config;
use vacation_manager::Manager;
use vacation_stm::Stm;

/// STM-backed travel reservation benchmark.
#[derive(Parser, Debug)]
#[command(name = "vacation", version, about)]
struct Args {
    /// Number of client worker threads.
    #[arg(short = 'c', long = "clients", default_value_t = Config::DEFAULT_CLIENTS)]
    clients: u32,

    /// Queries (operations) attempted per transaction.
    #[arg(short = 'n', long = "queries", default_value_t = Config::DEFAULT_NUMBER)]
    queries_per_transaction: u32,

    /// Percent of relations reachable by a client.
    #[arg(short = 'q', long = "percent-query", default_value_t = Config::DEFAULT_QUERIES)]
    percent_query: u32,

    /// Total number of relations per table.
    #[arg(short = 'r', long = "relations", default_value_t = Config::DEFAULT_RELATIONS)]
    relations: u64,

    /// Total number of transactions across all clients.
    #[arg(short = 't', long = "transactions", default_value_t = Config::DEFAULT_TRANSACTIONS)]
    transactions: u64,

    /// Percent of transactions that are MAKE_RESERVATION.
    #[arg(short = 'u', long = "percent-user", default_value_t = Config::DEFAULT_USER)]
    percent_user: u32,

    /// PRNG seed, for reproducible runs.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = match Config::new(
        args.clients,
        args.queries_per_transaction,
        args.percent_query,
        args.relations,
        args.transactions,
        args.percent_user,
        args.seed,
    ) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("vacation: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Vacation: clients = {}, relations = {}, transactions = {}, queries/tx = {}, percent query = {}, percent user = {}",
        config.clients,
        config.relations,
        config.transactions,
        config.queries_per_transaction,
        config.percent_query,
        config.percent_user,
    );

    tracing::info!(?config, "initializing manager");
    let manager = Manager::setup(&config);
    println!("done.");

    let stm = Stm::new();
    let start = Instant::now();
    let stats = run_clients(&config, &manager, &stm);
    let elapsed = start.elapsed().as_secs_f64();

    println!("Time = {elapsed:.6}");
    tracing::info!(?stats, "workload complete");

    manager.cleanup(&config);
    println!("done.");

    ExitCode::SUCCESS
}

/// Runs `config.clients` client threads to completion against `manager`
/// and sums their per-action stats, mapping the benchmark's
/// "thread pool that runs a fixed function N times in parallel"
/// contract onto a scoped thread spawn/join.
fn run_clients(config: &Config, manager: &Manager, stm: &Stm) -> ClientStats {
    let mut stats = ClientStats::default();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..config.clients)
            .map(|id| {
                let client = Client::new(id, config);
                scope.spawn(move || client.run(manager, stm))
            })
            .collect();
        for handle in handles {
            stats.merge(&handle.join().expect("client thread panicked"));
        }
    });
    stats
}
