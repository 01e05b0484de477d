use serde::{Deserialize, Serialize};

/// Opaque platform identifiers (Telegram numeric ids)
pub type VoterId = i64;
pub type ChatId = i64;
pub type MessageId = i64;

/// Valid rating range for the star buttons
pub const SCORE_MIN: u8 = 1;
pub const SCORE_MAX: u8 = 5;

/// How many films the leaderboard and the contest selection expose.
/// Hard limit, not configurable.
pub const TOP_N: usize = 3;

/// A single rating. Immutable once recorded; one per (voter, film).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub voter_id: VoterId,
    pub score: u8,
}

/// Per-film ledger entry. `seq` is the registration order, used as the
/// deterministic ranking tie-break (first registered wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieEntry {
    pub seq: u64,
    pub votes: Vec<Vote>,
}

/// Derived leaderboard view, mean rounded to one decimal. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub title: String,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContestPhase {
    /// No contest activity
    Idle,
    /// Top-3 offered, waiting for the operator's numeric choice
    SelectionPending,
    /// Film picked, waiting for the operator to supply the quiz prompt
    FilmChosen,
    /// Prompt broadcast, private answers are being judged
    Active,
    /// Two winners found, contest closed
    Finished,
}

/// One participant answer. Append-only; a voter's first attempt is final,
/// so `correct` can be fixed at insertion (the chosen film cannot change
/// while the contest is active).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerAttempt {
    pub voter_id: VoterId,
    pub name: String,
    pub text: String,
    pub correct: bool,
}

/// Process-wide contest state, lock-guarded inside `AppState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contest {
    pub phase: ContestPhase,
    /// Stable snapshot of the top-3 taken when selection opened
    pub candidates: Vec<LeaderboardEntry>,
    pub chosen_film: Option<String>,
    pub prompt: String,
    pub answers: Vec<AnswerAttempt>,
}

impl Contest {
    pub fn new() -> Self {
        Self {
            phase: ContestPhase::Idle,
            candidates: Vec::new(),
            chosen_film: None,
            prompt: String::new(),
            answers: Vec::new(),
        }
    }
}

impl Default for Contest {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the closing broadcast needs once the second winner is found.
#[derive(Debug, Clone, PartialEq)]
pub struct ContestSummary {
    pub first_winner: String,
    pub second_winner: String,
    pub prompt: String,
    pub film: String,
}
