pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::elo::{Rating, RatingSettings, Score};
pub use self::engine::{Engine, LocalEngine, Reply};
pub use self::game::{ConfigError, Forfeit, MatchConfig, MatchReport, Referee};
pub use self::process::{EngineProcess, LaunchError};
pub use self::tournament::{
    EngineSpec, Launcher, ProcessLauncher, Standing, Tournament, TournamentConfig,
};

mod clock;
mod elo;
mod engine;
mod game;
mod process;
mod tournament;
