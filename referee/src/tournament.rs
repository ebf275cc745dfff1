use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info, instrument};

use connect4::{Outcome, Side};

use crate::clock::{Clock, SystemClock};
use crate::elo::{Rating, RatingSettings, Score};
use crate::engine::Engine;
use crate::game::{MatchConfig, Referee};
use crate::process::{EngineProcess, LaunchError};

/// Produces a fresh engine instance for each game.
pub trait Launcher {
    type Engine: Engine;

    fn engine_count(&self) -> usize;

    fn engine_name(&self, index: usize) -> &str;

    fn launch(&mut self, index: usize) -> Result<Self::Engine, LaunchError>;
}

/// An engine command line: an executable followed by its arguments, separated by whitespace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineSpec {
    pub name: String,
    pub executable: PathBuf,
    pub args: Vec<String>,
}

impl FromStr for EngineSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let executable = words
            .next()
            .ok_or_else(|| "empty engine command".to_owned())?;

        Ok(Self {
            name: s.trim().to_owned(),
            executable: executable.into(),
            args: words.map(str::to_owned).collect(),
        })
    }
}

pub struct ProcessLauncher {
    specs: Vec<EngineSpec>,
}

impl ProcessLauncher {
    pub fn new(specs: Vec<EngineSpec>) -> Self {
        Self { specs }
    }
}

impl Launcher for ProcessLauncher {
    type Engine = EngineProcess;

    fn engine_count(&self) -> usize {
        self.specs.len()
    }

    fn engine_name(&self, index: usize) -> &str {
        &self.specs[index].name
    }

    fn launch(&mut self, index: usize) -> Result<EngineProcess, LaunchError> {
        let spec = &self.specs[index];
        EngineProcess::start(spec.name.clone(), &spec.executable, &spec.args)
    }
}

#[derive(Clone, Debug)]
pub struct TournamentConfig {
    pub match_config: MatchConfig,
    /// Upper bound used to size the schedule; see [`TournamentConfig::rounds`].
    pub allowed_games: usize,
    pub ratings: RatingSettings,
}

impl TournamentConfig {
    pub const DEFAULT_ALLOWED_GAMES: usize = 50;

    /// The number of full pairing sweeps: `allowed_games / engine_count²`, or zero without engines.
    pub fn rounds(&self, engine_count: usize) -> usize {
        round_count(self.allowed_games, engine_count)
    }
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            match_config: MatchConfig::default(),
            allowed_games: Self::DEFAULT_ALLOWED_GAMES,
            ratings: RatingSettings::default(),
        }
    }
}

fn round_count(allowed_games: usize, engine_count: usize) -> usize {
    allowed_games
        .checked_div(engine_count * engine_count)
        .unwrap_or(0)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Standing {
    pub name: String,
    pub rating: Rating,
    /// Totals over every game the engine played.
    pub score: Score,
}

/// Round-robin Elo arena. Every unordered pair plays a two-game mini-match with sides swapped.
pub struct Tournament<L, C = SystemClock> {
    launcher: L,
    referee: Referee<C>,
    allowed_games: usize,
    ratings: RatingSettings,
}

impl<L: Launcher> Tournament<L> {
    pub fn new(launcher: L, config: TournamentConfig) -> Self {
        Self::with_clock(launcher, config, SystemClock)
    }
}

impl<L: Launcher, C: Clock> Tournament<L, C> {
    pub fn with_clock(launcher: L, config: TournamentConfig, clock: C) -> Self {
        Self {
            launcher,
            referee: Referee::with_clock(config.match_config, clock),
            allowed_games: config.allowed_games,
            ratings: config.ratings,
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Plays the whole schedule and returns one standing per engine, in launcher order.
    ///
    /// Each mini-match is rated as soon as it finishes, from both engines' ratings as they stood
    /// before it. Only a launch failure stops the tournament early.
    #[instrument(level = "trace", skip_all)]
    pub async fn run(&mut self) -> Result<Vec<Standing>, LaunchError> {
        let count = self.launcher.engine_count();
        let rounds = round_count(self.allowed_games, count);

        info!(engines = count, rounds, "Tournament starting.");

        let mut ratings = vec![Rating::new(self.ratings); count];
        let mut totals = vec![Score::default(); count];

        for round in 0..rounds {
            for first in 0..count {
                for second in first + 1..count {
                    let score = self.mini_match(first, second).await?;

                    let (first_rating, second_rating) = (ratings[first], ratings[second]);
                    ratings[first].elo += first_rating.delta(&second_rating, &score);
                    ratings[second].elo += second_rating.delta(&first_rating, &score.flip());
                    totals[first] += score;
                    totals[second] += score.flip();
                }
            }

            debug!(round, "Round finished.");
        }

        let standings = (0..count)
            .map(|index| Standing {
                name: self.launcher.engine_name(index).to_owned(),
                rating: ratings[index],
                score: totals[index],
            })
            .collect();

        Ok(standings)
    }

    /// Two games with sides swapped, scored from `first`'s point of view.
    async fn mini_match(&mut self, first: usize, second: usize) -> Result<Score, LaunchError> {
        let mut score = Score::default();

        for (a, b, first_side) in [(first, second, Side::A), (second, first, Side::B)] {
            let outcome = self.game(a, b).await?;
            match outcome {
                Outcome::Draw => score.draws += 1,
                Outcome::Win(side) if side == first_side => score.wins += 1,
                Outcome::Win(_) => score.losses += 1,
            }
        }

        debug!(
            first = self.launcher.engine_name(first),
            second = self.launcher.engine_name(second),
            ?score,
            "Mini-match finished."
        );

        Ok(score)
    }

    async fn game(&mut self, a: usize, b: usize) -> Result<Outcome, LaunchError> {
        let mut engine_a = self.launcher.launch(a)?;
        let mut engine_b = match self.launcher.launch(b) {
            Ok(engine) => engine,
            Err(err) => {
                engine_a.shutdown().await;
                return Err(err);
            }
        };

        let report = self.referee.run(&mut engine_a, &mut engine_b).await;

        engine_a.shutdown().await;
        engine_b.shutdown().await;

        Ok(report.outcome)
    }
}
