//! Event dispatch: maps every inbound event to the side effects to perform.
//!
//! The router is the only place user-facing text is produced; the state
//! machine underneath returns outcomes, never strings. Everything here is
//! driven through [`handle_event`] so the full bot behaviour is testable
//! without Telegram.

use crate::protocol::{
    rating_keyboard, reply_keyboard, CallbackAction, Effect, Incoming, Sender,
};
use crate::state::{
    AnswerOutcome, ChoiceOutcome, AppState, LedgerError, PromptOutcome, SelectionError,
};
use crate::storage::{archive, SheetRow, Table};
use crate::types::{ChatId, ContestPhase, ContestSummary, LeaderboardEntry, MessageId, TOP_N};
use chrono::{Duration, Local};
use std::collections::HashSet;

const WELCOME: &str = "👋 *Bienvenue sur CinéQuizBot !*\n\n\
    🎬 Participez au jeu concours du mois en répondant correctement au quiz.\n\n\
    🏆 Les *2 premiers* à donner la bonne réponse remportent le jeu du mois.\n\n\
    Bonne chance, et que le meilleur gagne !\n\n🎉";

/// Handle an inbound event and return the effects to perform.
pub async fn handle_event(event: Incoming, state: &AppState) -> Vec<Effect> {
    match event {
        Incoming::Command {
            name,
            args,
            chat,
            from: _,
        } => match name.as_str() {
            "start" => vec![Effect::Reply {
                chat,
                text: WELCOME.to_string(),
            }],
            "postfilm" => handle_postfilm(state, &args).await,
            "classement" => handle_classement(state).await,
            "concours" => handle_concours(state, chat).await,
            "phrase" => handle_phrase(state, chat, &args).await,
            "cancel" => handle_cancel(state).await,
            other => {
                tracing::debug!(command = other, "unknown command");
                vec![Effect::Reply {
                    chat,
                    text: "ℹ️ Commande inconnue. Essaie /start, /postfilm, /classement, \
                           /concours, /phrase ou /cancel."
                        .to_string(),
                }]
            }
        },

        Incoming::Callback {
            payload,
            query_id,
            chat,
            message_id,
            from,
        } => handle_callback(state, &payload, query_id, chat, message_id, &from).await,

        Incoming::Text { text, chat, from } => route_text(state, &text, chat, &from).await,
    }
}

/// `/postfilm <title…>` — register the film and post it with the star row.
async fn handle_postfilm(state: &AppState, args: &[String]) -> Vec<Effect> {
    if args.is_empty() {
        return vec![Effect::Broadcast {
            text: "⚠️ Utilise comme ceci : /postfilm <nom du film>".to_string(),
            keyboard: None,
        }];
    }

    let film = args.join(" ");
    state.ledger.write().await.register_film(&film);
    tracing::info!(%film, "film posted");

    vec![Effect::Broadcast {
        text: format!("🎬 *{film}*\nDonne ta note sur 5 étoiles 👇"),
        keyboard: Some(rating_keyboard(&film)),
    }]
}

/// `/classement` — broadcast the current leaderboard.
async fn handle_classement(state: &AppState) -> Vec<Effect> {
    let top = {
        let ledger = state.ledger.read().await;
        crate::state::top_films(&ledger, TOP_N)
    };
    if top.is_empty() {
        return vec![Effect::Broadcast {
            text: "📊 Aucun film noté pour le moment.".to_string(),
            keyboard: None,
        }];
    }

    let mut text = "🏆 *Classement actuel des films du mois :*\n\n".to_string();
    push_ranking_lines(&mut text, &top);
    vec![Effect::Broadcast {
        text,
        keyboard: None,
    }]
}

/// `/concours` — open a selection round and offer the top 3 to the operator.
async fn handle_concours(state: &AppState, chat: ChatId) -> Vec<Effect> {
    match state.open_selection().await {
        Err(SelectionError::NoFilms) => vec![Effect::Broadcast {
            text: "📊 Aucun film pour lancer le concours.".to_string(),
            keyboard: None,
        }],
        Ok(candidates) => {
            let mut text =
                "🏆 *Sélection des 3 meilleurs films pour le concours* 🏆\n\n".to_string();
            push_ranking_lines(&mut text, &candidates);
            text.push_str("\n✅ Choisis le numéro du film pour le quiz.");
            vec![Effect::Reply { chat, text }]
        }
    }
}

/// `/phrase <text…>` — arm the contest and broadcast its launch.
async fn handle_phrase(state: &AppState, chat: ChatId, args: &[String]) -> Vec<Effect> {
    if args.is_empty() {
        return vec![Effect::Reply {
            chat,
            text: "⚠️ Utilisation : /phrase <texte de la phrase>".to_string(),
        }];
    }

    match state.set_prompt(&args.join(" ")).await {
        PromptOutcome::NoFilmChosen => vec![Effect::Reply {
            chat,
            text: "⚠️ Aucun film sélectionné. Lance d'abord /concours puis choisis un film."
                .to_string(),
        }],
        PromptOutcome::Launched { prompt } => {
            let keyboard = state
                .bot_username
                .as_deref()
                .map(reply_keyboard);
            vec![Effect::Broadcast {
                text: format!(
                    "🎬🎉*Lancement Officiel du Concours CinéQuiz du mois !*🎬✨\n\n\
                     Donne la réponse à la question suivante :\n\n\
                     🗣️ _« {prompt} »_\n\n\
                     Les 2 premiers à répondre correctement dans le *CinéQuizBot* \
                     remportent le jeu du mois 🎁 !"
                ),
                keyboard,
            }]
        }
    }
}

/// `/cancel` — unconditional cancellation, ledger untouched.
async fn handle_cancel(state: &AppState) -> Vec<Effect> {
    state.cancel_contest().await;
    vec![Effect::Broadcast {
        text: "❌ Le concours en cours a été annulé.".to_string(),
        keyboard: None,
    }]
}

/// Star-button press: record the vote, echo it to the sheet best-effort,
/// then rewrite the film post with the fresh mean.
async fn handle_callback(
    state: &AppState,
    payload: &str,
    query_id: String,
    chat: ChatId,
    message_id: MessageId,
    from: &Sender,
) -> Vec<Effect> {
    let action = match CallbackAction::parse(payload) {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed callback payload");
            return vec![Effect::AnswerCallback {
                query_id,
                alert: None,
            }];
        }
    };
    let CallbackAction::Rate { title, score } = action;

    let result = state.ledger.write().await.record_vote(&title, from.id, score);
    match result {
        Ok((mean, count)) => {
            // Best-effort audit trail: the in-memory vote stands even when
            // the sheet append fails.
            let row = SheetRow::for_vote(&title, score, &from.display_name, from.id);
            if let Err(e) = state.store.append(Table::Votes, row).await {
                tracing::warn!(error = %e, %title, "vote not echoed to durable store");
            }

            vec![
                Effect::AnswerCallback {
                    query_id,
                    alert: None,
                },
                Effect::EditMessage {
                    chat,
                    message_id,
                    text: format!("🎬 *{title}*\n⭐ Moyenne : {mean:.1}/5 ({count} votes)"),
                    keyboard: Some(rating_keyboard(&title)),
                },
            ]
        }
        Err(LedgerError::DuplicateVote) => vec![Effect::AnswerCallback {
            query_id,
            alert: Some("❌ Tu as déjà voté pour ce film !".to_string()),
        }],
        Err(LedgerError::ScoreOutOfRange(_)) => vec![Effect::AnswerCallback {
            query_id,
            alert: Some("⚠️ Note invalide.".to_string()),
        }],
    }
}

/// Non-command free text. Priority order matters: a pending selection
/// consumes numeric replies before the active contest sees anything.
async fn route_text(state: &AppState, text: &str, chat: ChatId, from: &Sender) -> Vec<Effect> {
    let phase = state.contest_phase().await;
    let trimmed = text.trim();

    if phase == ContestPhase::SelectionPending
        && !trimmed.is_empty()
        && trimmed.chars().all(|c| c.is_ascii_digit())
    {
        return match state.choose_film(trimmed).await {
            ChoiceOutcome::Chosen(film) => vec![Effect::Reply {
                chat,
                text: format!(
                    "✅ Film choisi pour le quiz : *{film}*\n\
                     Maintenant, envoie le quiz du concours avec /phrase <texte>"
                ),
            }],
            ChoiceOutcome::OutOfRange { max } => vec![Effect::Reply {
                chat,
                text: format!("⚠️ Choix invalide, entre un nombre entre 1 et {max}."),
            }],
            ChoiceOutcome::NotANumber | ChoiceOutcome::NotPending => vec![Effect::Reply {
                chat,
                text: "⚠️ Entre le numéro correspondant au film choisi.".to_string(),
            }],
        };
    }

    if phase == ContestPhase::Active {
        return handle_answer(state, trimmed, chat, from).await;
    }

    vec![Effect::Reply {
        chat,
        text: "ℹ️ Aucune action en cours actuellement.".to_string(),
    }]
}

/// A contest answer attempt from a participant.
async fn handle_answer(state: &AppState, text: &str, chat: ChatId, from: &Sender) -> Vec<Effect> {
    match state.submit_answer(from.id, &from.mention(), text).await {
        AnswerOutcome::NoContest => vec![Effect::Reply {
            chat,
            text: "❌ Aucun concours en cours pour le moment.".to_string(),
        }],
        AnswerOutcome::AlreadyAnswered => vec![Effect::Reply {
            chat,
            text: "⚠️ Tu as déjà répondu au concours. Ta réponse est définitive !".to_string(),
        }],
        AnswerOutcome::Wrong => vec![Effect::Reply {
            chat,
            text: "❌ Mauvaise réponse, mais bien essayé !".to_string(),
        }],
        AnswerOutcome::FirstWinner => vec![Effect::Reply {
            chat,
            text: "🎉 Bravo ! Tu es le 1er gagnant 🥇".to_string(),
        }],
        AnswerOutcome::SecondWinner(summary) => {
            finish_cycle(state).await;
            vec![
                Effect::Reply {
                    chat,
                    text: "🎉 Bravo ! Tu es le 2ᵉ gagnant 🥈".to_string(),
                },
                Effect::Broadcast {
                    text: closing_text(&summary),
                    keyboard: None,
                },
            ]
        }
    }
}

/// Archive the finished cycle's films and reset the ledger.
async fn finish_cycle(state: &AppState) {
    let titles: HashSet<String> = state.ledger.read().await.titles().into_iter().collect();

    match archive::archive_films(state.store.as_ref(), &titles).await {
        Ok(moved) => tracing::info!(films = titles.len(), rows = moved, "cycle archived"),
        Err(e) => {
            // The rows stay in the active sheet; the migration is
            // replayable, so losing this run is recoverable.
            tracing::error!(error = %e, "failed to archive finished films");
        }
    }

    state.ledger.write().await.clear();
}

fn closing_text(summary: &ContestSummary) -> String {
    let next = (Local::now() + Duration::days(30)).format("%d %B %Y");
    format!(
        "🏁 *Le Concours CinéQuiz du mois est terminé !*\n\n\
         Voici nos grands gagnants de ce mois :\n\
         🥇 {}\n🥈 {}\n\n\
         💬 Quiz du jeu : _« {} »_\n\
         🎥 Film mystère : *{}*\n\n\
         📅 Prochain concours : {}\n\n\
         *Merci à tous pour votre participation !* 🙌",
        summary.first_winner, summary.second_winner, summary.prompt, summary.film, next
    )
}

fn push_ranking_lines(text: &mut String, entries: &[LeaderboardEntry]) {
    use std::fmt::Write;
    for (i, entry) in entries.iter().enumerate() {
        // infallible on String
        let _ = writeln!(text, "*{}*. *{}* — ⭐*{:.1}*", i + 1, entry.title, entry.mean);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::state_with_store;
    use crate::protocol::rate_payload;
    use crate::storage::RowStore;

    fn operator() -> Sender {
        Sender {
            id: 1,
            username: Some("operateur".to_string()),
            display_name: "Opérateur".to_string(),
        }
    }

    fn voter(id: i64) -> Sender {
        Sender {
            id,
            username: Some(format!("voter{id}")),
            display_name: format!("Voter {id}"),
        }
    }

    fn command(name: &str, args: &[&str]) -> Incoming {
        Incoming::Command {
            name: name.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            chat: 100,
            from: operator(),
        }
    }

    fn rate(title: &str, score: u8, from: Sender) -> Incoming {
        Incoming::Callback {
            payload: rate_payload(title, score),
            query_id: "q1".to_string(),
            chat: -500,
            message_id: 7,
            from,
        }
    }

    fn text(s: &str, from: Sender) -> Incoming {
        Incoming::Text {
            text: s.to_string(),
            chat: 100,
            from,
        }
    }

    fn broadcast_text(effects: &[Effect]) -> &str {
        match effects.iter().find(|e| matches!(e, Effect::Broadcast { .. })) {
            Some(Effect::Broadcast { text, .. }) => text,
            _ => panic!("expected a Broadcast effect in {effects:?}"),
        }
    }

    #[tokio::test]
    async fn postfilm_requires_a_title() {
        let (state, _store) = state_with_store();
        let effects = handle_event(command("postfilm", &[]), &state).await;
        assert!(broadcast_text(&effects).starts_with("⚠️"));
    }

    #[tokio::test]
    async fn postfilm_posts_the_star_keyboard() {
        let (state, _store) = state_with_store();
        let effects = handle_event(command("postfilm", &["Le", "Parrain"]), &state).await;

        match &effects[..] {
            [Effect::Broadcast { text, keyboard: Some(kb) }] => {
                assert!(text.contains("Le Parrain"));
                assert_eq!(kb.0[0].len(), 5);
            }
            other => panic!("unexpected effects: {other:?}"),
        }
        assert!(state
            .ledger
            .read()
            .await
            .titles()
            .contains(&"Le Parrain".to_string()));
    }

    #[tokio::test]
    async fn vote_acks_edits_and_archives() {
        let (state, store) = state_with_store();
        handle_event(command("postfilm", &["Matrix"]), &state).await;

        let effects = handle_event(rate("Matrix", 4, voter(10)), &state).await;
        match &effects[..] {
            [Effect::AnswerCallback { alert: None, .. }, Effect::EditMessage { text, keyboard: Some(_), .. }] => {
                assert!(text.contains("4.0/5 (1 votes)"), "got {text}");
            }
            other => panic!("unexpected effects: {other:?}"),
        }

        let rows = store.read_all(Table::Votes).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].film, "Matrix");
        assert_eq!(rows[0].note, 4);
        assert_eq!(rows[0].telegram_id, 10);
    }

    #[tokio::test]
    async fn duplicate_vote_gets_an_alert_only() {
        let (state, store) = state_with_store();
        handle_event(rate("Matrix", 4, voter(10)), &state).await;
        let effects = handle_event(rate("Matrix", 2, voter(10)), &state).await;

        match &effects[..] {
            [Effect::AnswerCallback { alert: Some(alert), .. }] => {
                assert!(alert.contains("déjà voté"));
            }
            other => panic!("unexpected effects: {other:?}"),
        }
        // The mean still reflects only the first vote, and no second row
        // reached the store.
        assert_eq!(state.ledger.read().await.mean_score("Matrix"), Some((4.0, 1)));
        assert_eq!(store.read_all(Table::Votes).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn vote_stands_when_the_store_is_down() {
        let (state, store) = state_with_store();
        store.set_failing(true);

        let effects = handle_event(rate("Matrix", 5, voter(10)), &state).await;
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::EditMessage { .. })));
        assert_eq!(state.ledger.read().await.mean_score("Matrix"), Some((5.0, 1)));

        store.set_failing(false);
        assert!(store.read_all(Table::Votes).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_acked_and_dropped() {
        let (state, _store) = state_with_store();
        let event = Incoming::Callback {
            payload: "rate|Matrix".to_string(),
            query_id: "q9".to_string(),
            chat: -500,
            message_id: 1,
            from: voter(10),
        };
        let effects = handle_event(event, &state).await;
        assert_eq!(
            effects,
            vec![Effect::AnswerCallback {
                query_id: "q9".to_string(),
                alert: None
            }]
        );
    }

    #[tokio::test]
    async fn classement_lists_films_by_mean() {
        let (state, _store) = state_with_store();
        handle_event(rate("Matrix", 5, voter(10)), &state).await;
        handle_event(rate("Léon", 3, voter(11)), &state).await;

        let effects = handle_event(command("classement", &[]), &state).await;
        let text = broadcast_text(&effects);
        let matrix = text.find("Matrix").unwrap();
        let leon = text.find("Léon").unwrap();
        assert!(matrix < leon, "Matrix should rank above Léon: {text}");
    }

    #[tokio::test]
    async fn classement_with_no_votes() {
        let (state, _store) = state_with_store();
        let effects = handle_event(command("classement", &[]), &state).await;
        assert!(broadcast_text(&effects).contains("Aucun film"));
    }

    #[tokio::test]
    async fn idle_free_text_gets_the_nothing_pending_reply() {
        let (state, _store) = state_with_store();
        let effects = handle_event(text("bonjour", voter(10)), &state).await;
        match &effects[..] {
            [Effect::Reply { text, .. }] => assert!(text.contains("Aucune action")),
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[tokio::test]
    async fn phrase_without_film_is_a_state_mismatch() {
        let (state, _store) = state_with_store();
        let effects = handle_event(command("phrase", &["Devine", "!"]), &state).await;
        match &effects[..] {
            [Effect::Reply { text, .. }] => assert!(text.contains("Aucun film sélectionné")),
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[tokio::test]
    async fn contest_launch_carries_the_reply_link() {
        let (state, _store) = state_with_store();
        handle_event(rate("Matrix", 5, voter(10)), &state).await;
        handle_event(command("concours", &[]), &state).await;
        handle_event(text("1", operator()), &state).await;

        let effects = handle_event(command("phrase", &["Quel", "film", "?"]), &state).await;
        match &effects[..] {
            [Effect::Broadcast { text, keyboard: Some(kb) }] => {
                assert!(text.contains("Quel film ?"));
                assert_eq!(
                    kb.0[0][0].url.as_deref(),
                    Some("https://t.me/CineQuizBot")
                );
            }
            other => panic!("unexpected effects: {other:?}"),
        }
    }
}
