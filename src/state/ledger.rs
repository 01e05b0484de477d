//! In-memory vote ledger: films of the current monthly cycle and their
//! ratings. Volatile by design — the spreadsheet is the audit trail, this is
//! the source of truth until the cycle's films are archived.

use crate::types::{MovieEntry, Vote, VoterId, SCORE_MAX, SCORE_MIN};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LedgerError {
    #[error("voter has already rated this film")]
    DuplicateVote,
    #[error("score {0} outside 1..=5")]
    ScoreOutOfRange(u8),
}

#[derive(Debug, Default)]
pub struct Ledger {
    films: HashMap<String, MovieEntry>,
    next_seq: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a film. Idempotent; the first registration fixes its
    /// tie-break rank.
    pub fn register_film(&mut self, title: &str) {
        if !self.films.contains_key(title) {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.films.insert(
                title.to_string(),
                MovieEntry {
                    seq,
                    votes: Vec::new(),
                },
            );
        }
    }

    /// Record a vote and return the film's updated `(mean, count)`.
    ///
    /// One vote per (voter, film): a second attempt is rejected, never
    /// merged or overwritten. Votes on an unregistered title register it.
    pub fn record_vote(
        &mut self,
        title: &str,
        voter_id: VoterId,
        score: u8,
    ) -> Result<(f64, usize), LedgerError> {
        if !(SCORE_MIN..=SCORE_MAX).contains(&score) {
            return Err(LedgerError::ScoreOutOfRange(score));
        }

        let next_seq = &mut self.next_seq;
        let entry = self.films.entry(title.to_string()).or_insert_with(|| {
            let seq = *next_seq;
            *next_seq += 1;
            MovieEntry {
                seq,
                votes: Vec::new(),
            }
        });

        if entry.votes.iter().any(|v| v.voter_id == voter_id) {
            return Err(LedgerError::DuplicateVote);
        }

        entry.votes.push(Vote { voter_id, score });
        let count = entry.votes.len();
        let mean = entry.votes.iter().map(|v| v.score as f64).sum::<f64>() / count as f64;
        Ok((mean, count))
    }

    /// Mean over all recorded scores; `None` when the film has no votes.
    pub fn mean_score(&self, title: &str) -> Option<(f64, usize)> {
        let entry = self.films.get(title)?;
        let count = entry.votes.len();
        if count == 0 {
            return None;
        }
        let mean = entry.votes.iter().map(|v| v.score as f64).sum::<f64>() / count as f64;
        Some((mean, count))
    }

    /// All registered titles, voted or not.
    pub fn titles(&self) -> Vec<String> {
        self.films.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.films.is_empty()
    }

    /// Drop every entry; used after the cycle's films are archived.
    pub fn clear(&mut self) {
        self.films.clear();
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&String, &MovieEntry)> {
        self.films.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut ledger = Ledger::new();
        ledger.register_film("Matrix");
        ledger.register_film("Matrix");
        assert_eq!(ledger.titles(), vec!["Matrix".to_string()]);
    }

    #[test]
    fn mean_over_recorded_scores() {
        let mut ledger = Ledger::new();
        for (voter, score) in [(1, 3), (2, 4), (3, 5)] {
            ledger.record_vote("Matrix", voter, score).unwrap();
        }
        assert_eq!(ledger.mean_score("Matrix"), Some((4.0, 3)));
    }

    #[test]
    fn second_vote_from_same_voter_is_rejected_and_changes_nothing() {
        let mut ledger = Ledger::new();
        ledger.record_vote("Matrix", 1, 3).unwrap();
        ledger.record_vote("Matrix", 2, 5).unwrap();

        let before = ledger.mean_score("Matrix");
        assert_eq!(
            ledger.record_vote("Matrix", 1, 5),
            Err(LedgerError::DuplicateVote)
        );
        assert_eq!(ledger.mean_score("Matrix"), before);
    }

    #[test]
    fn same_voter_may_rate_different_films() {
        let mut ledger = Ledger::new();
        ledger.record_vote("Matrix", 1, 3).unwrap();
        assert!(ledger.record_vote("Léon", 1, 5).is_ok());
    }

    #[test]
    fn score_range_is_guarded() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.record_vote("Matrix", 1, 0),
            Err(LedgerError::ScoreOutOfRange(0))
        );
        assert_eq!(
            ledger.record_vote("Matrix", 1, 6),
            Err(LedgerError::ScoreOutOfRange(6))
        );
        // The rejected votes must not have registered a ghost entry vote.
        assert_eq!(ledger.mean_score("Matrix"), None);
    }

    #[test]
    fn vote_on_unregistered_title_registers_it() {
        let mut ledger = Ledger::new();
        let (mean, count) = ledger.record_vote("Matrix", 1, 4).unwrap();
        assert_eq!((mean, count), (4.0, 1));
        assert!(ledger.titles().contains(&"Matrix".to_string()));
    }

    #[test]
    fn no_votes_means_no_mean() {
        let mut ledger = Ledger::new();
        ledger.register_film("Matrix");
        assert_eq!(ledger.mean_score("Matrix"), None);
        assert_eq!(ledger.mean_score("Inconnu"), None);
    }

    #[test]
    fn clear_empties_the_ledger() {
        let mut ledger = Ledger::new();
        ledger.record_vote("Matrix", 1, 4).unwrap();
        ledger.clear();
        assert!(ledger.is_empty());
    }
}
