//! Contest lifecycle: Idle -> SelectionPending -> FilmChosen -> Active ->
//! Finished, plus unconditional cancellation back to Idle.
//!
//! All transitions are methods on [`AppState`] returning outcome enums, so
//! the handlers only translate outcomes into chat messages. `submit_answer`
//! holds the contest write lock for the whole evaluate-and-append step;
//! winner ranks are therefore decided by lock acquisition order even when
//! private answers arrive concurrently.

use super::{top_films, AppState};
use crate::normalize::normalize;
use crate::types::{
    AnswerAttempt, ContestPhase, ContestSummary, LeaderboardEntry, VoterId, TOP_N,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SelectionError {
    #[error("no rated film to start a contest from")]
    NoFilms,
}

/// Outcome of interpreting a selection-phase numeric reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceOutcome {
    /// Film recorded, phase is now FilmChosen
    Chosen(String),
    /// Number outside 1..=len(candidates); selection stays pending
    OutOfRange { max: usize },
    /// Not a number; selection stays pending
    NotANumber,
    /// No selection round is open
    NotPending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromptOutcome {
    /// Contest is now Active with this prompt
    Launched { prompt: String },
    /// No film has been chosen yet
    NoFilmChosen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// No contest is active
    NoContest,
    /// The voter already answered this contest; first submission is final
    AlreadyAnswered,
    Wrong,
    /// First correct answer; contest stays active
    FirstWinner,
    /// Second correct answer; contest is finished
    SecondWinner(ContestSummary),
}

impl AppState {
    /// Open a selection round over a fresh top-3 snapshot. Allowed from any
    /// phase (restarting an active contest is how the operator recovers from
    /// a mistake); fails without touching the phase when nothing was rated.
    pub async fn open_selection(&self) -> Result<Vec<LeaderboardEntry>, SelectionError> {
        let candidates = {
            let ledger = self.ledger.read().await;
            top_films(&ledger, TOP_N)
        };
        if candidates.is_empty() {
            return Err(SelectionError::NoFilms);
        }

        let mut contest = self.contest.write().await;
        contest.phase = ContestPhase::SelectionPending;
        contest.candidates = candidates.clone();
        contest.chosen_film = None;
        contest.prompt.clear();
        contest.answers.clear();
        tracing::info!(candidates = candidates.len(), "selection round opened");
        Ok(candidates)
    }

    /// Interpret a numeric reply as the operator's film choice.
    pub async fn choose_film(&self, text: &str) -> ChoiceOutcome {
        let mut contest = self.contest.write().await;
        if contest.phase != ContestPhase::SelectionPending {
            return ChoiceOutcome::NotPending;
        }

        let choice: usize = match text.trim().parse() {
            Ok(n) => n,
            Err(_) => return ChoiceOutcome::NotANumber,
        };
        if choice < 1 || choice > contest.candidates.len() {
            return ChoiceOutcome::OutOfRange {
                max: contest.candidates.len(),
            };
        }

        let film = contest.candidates[choice - 1].title.clone();
        contest.chosen_film = Some(film.clone());
        contest.phase = ContestPhase::FilmChosen;
        tracing::info!(%film, "contest film chosen");
        ChoiceOutcome::Chosen(film)
    }

    /// Arm the contest with its quiz prompt and start judging answers.
    pub async fn set_prompt(&self, text: &str) -> PromptOutcome {
        let mut contest = self.contest.write().await;
        if contest.phase != ContestPhase::FilmChosen {
            return PromptOutcome::NoFilmChosen;
        }

        contest.prompt = text.to_string();
        contest.answers.clear();
        contest.phase = ContestPhase::Active;
        tracing::info!("contest launched");
        PromptOutcome::Launched {
            prompt: text.to_string(),
        }
    }

    /// Judge one private answer.
    ///
    /// An attempt is correct when its normalized text equals the normalized
    /// chosen film, or when the normalized film is a substring of the
    /// normalized attempt (answers embedded in a sentence count). The rank
    /// is the number of correct attempts recorded so far, this one included.
    pub async fn submit_answer(
        &self,
        voter_id: VoterId,
        name: &str,
        text: &str,
    ) -> AnswerOutcome {
        let mut contest = self.contest.write().await;
        if contest.phase != ContestPhase::Active {
            return AnswerOutcome::NoContest;
        }
        if contest.answers.iter().any(|a| a.voter_id == voter_id) {
            return AnswerOutcome::AlreadyAnswered;
        }

        let film = contest.chosen_film.clone().unwrap_or_default();
        let wanted = normalize(&film);
        let given = normalize(text);
        let correct = given == wanted || (!wanted.is_empty() && given.contains(&wanted));

        contest.answers.push(AnswerAttempt {
            voter_id,
            name: name.to_string(),
            text: text.to_string(),
            correct,
        });

        if !correct {
            return AnswerOutcome::Wrong;
        }

        let rank = contest.answers.iter().filter(|a| a.correct).count();
        match rank {
            1 => AnswerOutcome::FirstWinner,
            _ => {
                contest.phase = ContestPhase::Finished;
                let mut winners = contest.answers.iter().filter(|a| a.correct);
                let first = winners.next().map(|a| a.name.clone()).unwrap_or_default();
                let second = winners.next().map(|a| a.name.clone()).unwrap_or_default();
                tracing::info!(%first, %second, %film, "contest finished");
                AnswerOutcome::SecondWinner(ContestSummary {
                    first_winner: first,
                    second_winner: second,
                    prompt: contest.prompt.clone(),
                    film,
                })
            }
        }
    }

    /// Unconditional reset to Idle. Never touches the ledger or the store.
    pub async fn cancel_contest(&self) {
        let mut contest = self.contest.write().await;
        contest.phase = ContestPhase::Idle;
        tracing::info!("contest cancelled");
    }

    pub async fn contest_phase(&self) -> ContestPhase {
        self.contest.read().await.phase.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::state_with_store;

    async fn rated_state() -> AppState {
        let (state, _store) = state_with_store();
        {
            let mut ledger = state.ledger.write().await;
            ledger.record_vote("Matrix", 1, 5).unwrap();
            ledger.record_vote("Léon", 2, 4).unwrap();
            ledger.record_vote("Amélie", 3, 3).unwrap();
        }
        state
    }

    /// Drive a state all the way to an active contest on "Matrix".
    async fn active_state() -> AppState {
        let state = rated_state().await;
        state.open_selection().await.unwrap();
        assert_eq!(
            state.choose_film("1").await,
            ChoiceOutcome::Chosen("Matrix".to_string())
        );
        assert_eq!(
            state.set_prompt("Quel film du mois ?").await,
            PromptOutcome::Launched {
                prompt: "Quel film du mois ?".to_string()
            }
        );
        state
    }

    #[tokio::test]
    async fn selection_fails_on_empty_ledger() {
        let (state, _store) = state_with_store();
        assert_eq!(state.open_selection().await, Err(SelectionError::NoFilms));
        assert_eq!(state.contest_phase().await, ContestPhase::Idle);
    }

    #[tokio::test]
    async fn selection_snapshots_top_three() {
        let state = rated_state().await;
        let candidates = state.open_selection().await.unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].title, "Matrix");
        assert_eq!(state.contest_phase().await, ContestPhase::SelectionPending);
    }

    #[tokio::test]
    async fn invalid_choices_keep_selection_pending() {
        let state = rated_state().await;
        state.open_selection().await.unwrap();

        assert_eq!(state.choose_film("abc").await, ChoiceOutcome::NotANumber);
        assert_eq!(
            state.choose_film("0").await,
            ChoiceOutcome::OutOfRange { max: 3 }
        );
        assert_eq!(
            state.choose_film("4").await,
            ChoiceOutcome::OutOfRange { max: 3 }
        );
        assert_eq!(state.contest_phase().await, ContestPhase::SelectionPending);

        assert_eq!(
            state.choose_film("2").await,
            ChoiceOutcome::Chosen("Léon".to_string())
        );
        assert_eq!(state.contest_phase().await, ContestPhase::FilmChosen);
    }

    #[tokio::test]
    async fn choice_outside_selection_round_is_rejected() {
        let (state, _store) = state_with_store();
        assert_eq!(state.choose_film("1").await, ChoiceOutcome::NotPending);
    }

    #[tokio::test]
    async fn prompt_requires_a_chosen_film() {
        let state = rated_state().await;
        assert_eq!(
            state.set_prompt("Devine !").await,
            PromptOutcome::NoFilmChosen
        );

        state.open_selection().await.unwrap();
        assert_eq!(
            state.set_prompt("Devine !").await,
            PromptOutcome::NoFilmChosen
        );
    }

    #[tokio::test]
    async fn winner_sequencing_first_then_second_then_closed() {
        let state = active_state().await;

        assert_eq!(
            state.submit_answer(10, "@alice", "matrix").await,
            AnswerOutcome::FirstWinner
        );
        assert_eq!(state.contest_phase().await, ContestPhase::Active);

        match state.submit_answer(11, "@bob", "Matrix").await {
            AnswerOutcome::SecondWinner(summary) => {
                assert_eq!(summary.first_winner, "@alice");
                assert_eq!(summary.second_winner, "@bob");
                assert_eq!(summary.film, "Matrix");
                assert_eq!(summary.prompt, "Quel film du mois ?");
            }
            other => panic!("expected SecondWinner, got {other:?}"),
        }
        assert_eq!(state.contest_phase().await, ContestPhase::Finished);

        assert_eq!(
            state.submit_answer(12, "@carol", "Matrix").await,
            AnswerOutcome::NoContest
        );
    }

    #[tokio::test]
    async fn substring_of_a_sentence_counts_as_correct() {
        let state = active_state().await;
        assert_eq!(
            state
                .submit_answer(10, "@alice", "I think it's The Matrix for sure")
                .await,
            AnswerOutcome::FirstWinner
        );
    }

    #[tokio::test]
    async fn accents_and_punctuation_do_not_matter() {
        let state = rated_state().await;
        state.open_selection().await.unwrap();
        state.choose_film("3").await;
        state.set_prompt("Quel film ?").await;

        assert_eq!(
            state.submit_answer(10, "@alice", "AMELIE !!!").await,
            AnswerOutcome::FirstWinner
        );
    }

    #[tokio::test]
    async fn wrong_first_answer_disqualifies_the_voter() {
        let state = active_state().await;

        assert_eq!(
            state.submit_answer(10, "@alice", "Léon").await,
            AnswerOutcome::Wrong
        );
        // Even the right answer is now rejected for this voter.
        assert_eq!(
            state.submit_answer(10, "@alice", "Matrix").await,
            AnswerOutcome::AlreadyAnswered
        );

        // Wrong answers never count toward the winner ranks.
        assert_eq!(
            state.submit_answer(11, "@bob", "Matrix").await,
            AnswerOutcome::FirstWinner
        );
    }

    #[tokio::test]
    async fn duplicate_winner_cannot_answer_again() {
        let state = active_state().await;
        state.submit_answer(10, "@alice", "Matrix").await;
        assert_eq!(
            state.submit_answer(10, "@alice", "Matrix").await,
            AnswerOutcome::AlreadyAnswered
        );
    }

    #[tokio::test]
    async fn answers_outside_active_phase_are_rejected() {
        let state = rated_state().await;
        assert_eq!(
            state.submit_answer(10, "@alice", "Matrix").await,
            AnswerOutcome::NoContest
        );

        state.open_selection().await.unwrap();
        assert_eq!(
            state.submit_answer(10, "@alice", "Matrix").await,
            AnswerOutcome::NoContest
        );
    }

    #[tokio::test]
    async fn cancel_resets_phase_but_not_the_ledger() {
        let state = active_state().await;
        state.cancel_contest().await;
        assert_eq!(state.contest_phase().await, ContestPhase::Idle);
        assert_eq!(state.ledger.read().await.titles().len(), 3);
    }

    #[tokio::test]
    async fn reopening_selection_resets_answers() {
        let state = active_state().await;
        state.submit_answer(10, "@alice", "Matrix").await;

        state.open_selection().await.unwrap();
        let contest = state.contest.read().await;
        assert_eq!(contest.phase, ContestPhase::SelectionPending);
        assert!(contest.answers.is_empty());
        assert!(contest.chosen_film.is_none());
    }
}
