use std::env;
use std::io;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{debug, error};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format;

use connect4::{serve, FirstColumn, Player, RandomColumn};

/// A Connect-4 engine that speaks the referee's binary protocol over stdin and stdout.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// How moves are chosen.
    #[arg(short, long, value_enum, default_value_t = Strategy::First)]
    strategy: Strategy,

    /// Seed for the random strategy. Drawn from the OS when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    /// The lowest-index column with room left.
    First,
    /// A uniformly random legal column.
    Random,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    let event_format = format().with_target(false).without_time();

    // Stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .event_format(event_format)
        .with_writer(io::stderr)
        .init();

    let mut player: Box<dyn Player> = match args.strategy {
        Strategy::First => Box::<FirstColumn>::default(),
        Strategy::Random => Box::new(RandomColumn::new(args.seed)),
    };
    debug!(strategy = ?args.strategy, "Engine ready.");

    let stdin = io::stdin();
    let stdout = io::stdout();

    match serve(&mut *player, &mut stdin.lock(), &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "Engine stopped.");
            ExitCode::FAILURE
        }
    }
}
