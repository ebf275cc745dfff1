use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RatingSettings {
    /// The K factor: how far one game's surprise moves a rating.
    pub adjustment_factor: f64,
    pub initial_elo: f64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            adjustment_factor: 30.0,
            initial_elo: 1500.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Rating {
    pub elo: f64,
    pub adjustment_factor: f64,
}

impl Rating {
    pub fn new(settings: RatingSettings) -> Self {
        Self {
            elo: settings.initial_elo,
            adjustment_factor: settings.adjustment_factor,
        }
    }

    /// Probability that this side wins a single game against `opponent`.
    pub fn expected_score(&self, opponent: &Rating) -> f64 {
        1.0 / (1.0 + 10f64.powf((opponent.elo - self.elo) / 400.0))
    }

    /// The rating change earned by `score` against `opponent`, both read before either updates.
    pub fn delta(&self, opponent: &Rating, score: &Score) -> f64 {
        let expected = self.expected_score(opponent) * score.total_games() as f64;
        self.adjustment_factor * (score.points() - expected)
    }
}

/// Win/loss/draw counts from one engine's point of view.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Score {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl Score {
    /// The same games seen from the opponent's side.
    pub fn flip(self) -> Self {
        Self {
            wins: self.losses,
            losses: self.wins,
            draws: self.draws,
        }
    }

    pub fn total_games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    pub fn points(&self) -> f64 {
        self.wins as f64 + 0.5 * self.draws as f64
    }
}

impl std::ops::AddAssign for Score {
    fn add_assign(&mut self, other: Self) {
        self.wins += other.wins;
        self.losses += other.losses;
        self.draws += other.draws;
    }
}
