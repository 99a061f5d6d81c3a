use clap::Parser;
use searchlab::domains::{
    Blocksworld, CostModel, DomainName, Pancake, ParseError, SynthTree, Tiles, Vacuum,
};
use searchlab::search::engines::{Algorithm, EngineError};
use searchlab::search::{metrics, Domain, Limit};
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Run a heuristic state-space search on an instance read from stdin.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    #[arg(long, value_enum, help = "The problem domain")]
    domain: DomainName,
    #[arg(
        long,
        value_enum,
        default_value_t = CostModel::Unit,
        help = "Edge-cost model for the weighted domains"
    )]
    cost: CostModel,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Synthetic tree: maximum relative heuristic error"
    )]
    err: f64,
    #[arg(
        long,
        default_value_t = 500,
        help = "Synthetic tree: starting goal distance"
    )]
    agd: i64,
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        help = "Wall-clock limit, e.g. 30s or 5min"
    )]
    time_limit: Option<Duration>,
    #[arg(long, help = "Stop after this many expansions")]
    expansion_limit: Option<u64>,
    #[arg(long, help = "Memory ceiling in megabytes")]
    memory_limit: Option<usize>,
    #[command(subcommand)]
    algorithm: Algorithm,
}

#[derive(Debug, Error)]
enum DriverError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to write metrics: {0}")]
    Io(#[from] io::Error),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("searchlab: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), DriverError> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    match cli.domain {
        DomainName::Pancake => {
            let domain = Pancake::from_reader(&mut input, cli.cost)?;
            drive(cli, &domain)
        }
        DomainName::Blocksworld => {
            let domain = Blocksworld::from_reader(&mut input)?;
            drive(cli, &domain)
        }
        DomainName::Tiles => {
            let domain = Tiles::from_reader(&mut input, cli.cost)?;
            drive(cli, &domain)
        }
        DomainName::Vacuum => {
            let domain = Vacuum::from_reader(&mut input, cli.cost)?;
            drive(cli, &domain)
        }
        DomainName::SynthTree => {
            let domain = SynthTree::from_reader(&mut input, cli.agd, cli.err)?;
            drive(cli, &domain)
        }
    }
}

fn drive<D: Domain>(cli: &Cli, domain: &D) -> Result<(), DriverError> {
    let limit = Limit::new(cli.time_limit, cli.expansion_limit, cli.memory_limit);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    metrics::pair(&mut out, "wall start time", &unix_seconds())?;
    out.flush()?;

    let _ = cli.algorithm.run(domain, limit, &mut out)?;

    metrics::pair(&mut out, "wall finish time", &unix_seconds())?;
    out.flush()?;
    Ok(())
}

fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}
