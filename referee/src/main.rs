use std::env;
use std::error::Error;
use std::process::ExitCode;

use async_std::task;
use clap::Parser;
use connect4::Side;
use tracing::error;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format;

use referee::{
    Engine, EngineProcess, EngineSpec, ProcessLauncher, Referee, Standing, Tournament,
    TournamentConfig,
};

use self::args::{Args, Command, EloConfig, PlayConfig};

mod args;

fn main() -> ExitCode {
    let args = Args::parse();

    set_default_logging();

    let event_format = format().with_target(false).without_time();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .event_format(event_format)
        .init();

    // Limit the number of threads async-std tries to spawn; we don't need that many.
    if env::var("ASYNC_STD_THREAD_COUNT").is_err() {
        env::set_var("ASYNC_STD_THREAD_COUNT", "1");
    }

    let result = match args.command {
        Command::Play(config) => run_play(config),
        Command::Elo(config) => run_elo(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "Could not complete the run.");
            ExitCode::FAILURE
        }
    }
}

fn set_default_logging() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
}

fn start(spec: &EngineSpec) -> Result<EngineProcess, Box<dyn Error>> {
    Ok(EngineProcess::start(
        spec.name.clone(),
        &spec.executable,
        &spec.args,
    )?)
}

fn run_play(config: PlayConfig) -> Result<(), Box<dyn Error>> {
    let referee = Referee::new(config.game.match_config()?);

    let mut a = start(&config.side_a)?;
    let mut b = start(&config.side_b)?;

    let report = task::block_on(async {
        let report = referee.run(&mut a, &mut b).await;
        a.shutdown().await;
        b.shutdown().await;
        report
    });

    let moves: Vec<String> = report.board.history().iter().map(u8::to_string).collect();
    println!("Moves: {}", moves.join(" "));

    if let Some((side, reason)) = &report.forfeit {
        println!("Side {side:?} forfeited: {reason}");
    }

    match report.outcome.winner() {
        Some(side) => {
            let name = match side {
                Side::A => &config.side_a.name,
                Side::B => &config.side_b.name,
            };
            println!("Side {side:?} wins: {name}");
        }
        None => println!("Draw"),
    }

    Ok(())
}

fn run_elo(config: EloConfig) -> Result<(), Box<dyn Error>> {
    let tournament_config = TournamentConfig {
        match_config: config.game.match_config()?,
        allowed_games: config.games,
        ratings: config.rating_settings(),
    };

    let launcher = ProcessLauncher::new(config.engines.clone());
    let mut tournament = Tournament::new(launcher, tournament_config);
    let standings = task::block_on(tournament.run())?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&standings)?);
    } else {
        print_standings(standings);
    }

    Ok(())
}

fn print_standings(mut standings: Vec<Standing>) {
    standings.sort_by(|a, b| b.rating.elo.total_cmp(&a.rating.elo));

    println!("{:>8}  {:>4} {:>4} {:>4}  Engine", "Elo", "W", "L", "D");
    for standing in &standings {
        println!(
            "{:>8.1}  {:>4} {:>4} {:>4}  {}",
            standing.rating.elo,
            standing.score.wins,
            standing.score.losses,
            standing.score.draws,
            standing.name,
        );
    }
}
