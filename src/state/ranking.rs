//! Leaderboard derivation from the vote ledger.

use super::Ledger;
use crate::types::LeaderboardEntry;

/// Top `n` films by mean score, descending. Only films with at least one
/// vote are eligible. Means are rounded to one decimal before ranking, like
/// the displayed values; ties are broken by registration order (first
/// registered wins), which keeps the ordering deterministic.
pub fn top_films(ledger: &Ledger, n: usize) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<(u64, LeaderboardEntry)> = ledger
        .entries()
        .filter(|(_, entry)| !entry.votes.is_empty())
        .map(|(title, entry)| {
            let mean = entry.votes.iter().map(|v| v.score as f64).sum::<f64>()
                / entry.votes.len() as f64;
            (
                entry.seq,
                LeaderboardEntry {
                    title: title.clone(),
                    mean: (mean * 10.0).round() / 10.0,
                },
            )
        })
        .collect();

    ranked.sort_by(|(seq_a, a), (seq_b, b)| {
        b.mean
            .partial_cmp(&a.mean)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(seq_a.cmp(seq_b))
    });

    ranked.into_iter().take(n).map(|(_, e)| e).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TOP_N;

    fn ledger_with(votes: &[(&str, &[u8])]) -> Ledger {
        let mut ledger = Ledger::new();
        let mut voter = 0;
        for (title, scores) in votes {
            ledger.register_film(title);
            for score in *scores {
                voter += 1;
                ledger.record_vote(title, voter, *score).unwrap();
            }
        }
        ledger
    }

    #[test]
    fn sorts_by_mean_descending() {
        let ledger = ledger_with(&[
            ("Amélie", &[3, 3]),
            ("Matrix", &[5, 5]),
            ("Léon", &[4, 4]),
        ]);
        let top = top_films(&ledger, TOP_N);
        let titles: Vec<&str> = top.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Matrix", "Léon", "Amélie"]);
        assert_eq!(top[0].mean, 5.0);
    }

    #[test]
    fn excludes_films_without_votes() {
        let ledger = ledger_with(&[("Matrix", &[4]), ("Jamais noté", &[])]);
        let top = top_films(&ledger, TOP_N);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].title, "Matrix");
    }

    #[test]
    fn returns_at_most_n() {
        let ledger = ledger_with(&[
            ("A", &[1]),
            ("B", &[2]),
            ("C", &[3]),
            ("D", &[4]),
        ]);
        assert_eq!(top_films(&ledger, TOP_N).len(), 3);
    }

    #[test]
    fn ties_break_by_registration_order() {
        let ledger = ledger_with(&[("Second", &[4]), ("Premier", &[4])]);
        // "Second" was registered first, so it wins the tie.
        let top = top_films(&ledger, TOP_N);
        assert_eq!(top[0].title, "Second");
        assert_eq!(top[1].title, "Premier");
    }

    #[test]
    fn means_are_rounded_to_one_decimal() {
        let ledger = ledger_with(&[("Matrix", &[3, 4, 4])]);
        // 11/3 = 3.666... -> 3.7
        assert_eq!(top_films(&ledger, TOP_N)[0].mean, 3.7);
    }

    #[test]
    fn empty_ledger_yields_empty_leaderboard() {
        assert!(top_films(&Ledger::new(), TOP_N).is_empty());
    }
}
