use std::time::Duration;

use clap::{Args as ArgsTrait, Parser, Subcommand};

use referee::{ConfigError, EngineSpec, MatchConfig, RatingSettings};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Referees a single game between two engines.
    Play(PlayConfig),
    /// Ranks engines by playing a round-robin tournament and rating the results.
    Elo(EloConfig),
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct PlayConfig {
    /// The engine playing side A, as a command line. ("path/to/engine --flag value")
    #[arg(short = 'a', long, verbatim_doc_comment)]
    pub side_a: EngineSpec,

    /// The engine playing side B.
    #[arg(short = 'b', long)]
    pub side_b: EngineSpec,

    #[command(flatten)]
    pub game: GameOptions,
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct EloConfig {
    /// An engine to enter, as a command line. Repeat for each engine.
    #[arg(short, long = "engine", required = true)]
    pub engines: Vec<EngineSpec>,

    /// The game budget. Each pairing sweep over N engines counts as N² games, and only whole
    /// sweeps are played.
    #[arg(short, long, default_value_t = 50, verbatim_doc_comment)]
    pub games: usize,

    /// The Elo adjustment factor.
    #[arg(short, long, default_value_t = 30.0)]
    pub k: f64,

    /// The rating every engine starts from.
    #[arg(long, default_value_t = 1500.0)]
    pub initial_elo: f64,

    /// Print the final standings as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub game: GameOptions,
}

impl EloConfig {
    pub fn rating_settings(&self) -> RatingSettings {
        RatingSettings {
            adjustment_factor: self.k,
            initial_elo: self.initial_elo,
        }
    }
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct GameOptions {
    /// Milliseconds an engine may take to answer each move.
    #[arg(short, long, default_value_t = 100)]
    pub time_ms: u32,

    /// Columns already played when the engines take over, comma-separated. ("3,3,4")
    #[arg(short, long, value_delimiter = ',', verbatim_doc_comment)]
    pub opening: Vec<u8>,
}

impl GameOptions {
    pub fn match_config(&self) -> Result<MatchConfig, ConfigError> {
        MatchConfig::new(
            Duration::from_millis(self.time_ms as u64),
            self.opening.clone(),
        )
    }
}
