use std::sync::Arc;
use std::time::Duration;

use abr_model::{Book, Region};
use once_cell::sync::Lazy;
use regex::Regex;
use strsim::jaro_winkler;
use sublime_fuzzy::best_match;

use abr_meta::MetadataClient;

use crate::scanner::BookGuess;

const SEARCH_TTL: Duration = Duration::from_secs(7 * 24 * 3_600);

/// An ASIN-shaped token embedded directly in a path, e.g.
/// `.../B0C1H26C46/book.m4b`.
static IDENTIFIER_IN_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bB0[A-Z0-9]{8}\b").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub book: Book,
    pub score: f64,
}

/// Case-insensitive substring/fuzzy blend: 1.0 for an exact
/// case-insensitive match, otherwise `sublime_fuzzy`'s best-match score
/// normalized into `[0, 1)`, falling back to `jaro_winkler` when fuzzy
/// matching finds nothing at all.
fn text_score(candidate: &str, target: &str) -> f64 {
    let candidate_norm = candidate.to_ascii_lowercase();
    let target_norm = target.to_ascii_lowercase();
    if candidate_norm == target_norm {
        return 1.0;
    }
    match best_match(&target_norm, &candidate_norm) {
        Some(m) => {
            let max_possible = (target_norm.chars().count() as isize) * 6;
            if max_possible <= 0 {
                0.0
            } else {
                (m.score().max(0) as f64 / max_possible as f64).min(0.99)
            }
        }
        None => jaro_winkler(&candidate_norm, &target_norm) * 0.8,
    }
}

/// Blends title score (`t_score`) and author score (`a_score`) into one
/// candidate ranking: title carries most of the weight since a wrong
/// author with the right exact title is usually still the right book
/// (omnibus editions, audiobook-only re-credits), but an author match
/// nudges close title calls.
fn blended_score(book: &Book, guess: &BookGuess) -> f64 {
    let t_score = guess.title.as_deref().map(|t| text_score(&book.title, t)).unwrap_or(0.0);
    let a_score = match &guess.author {
        Some(author) => book.authors.iter().map(|a| text_score(a, author)).fold(0.0_f64, f64::max),
        None => 0.5,
    };

    if guess.title.as_deref().map(|t| t.eq_ignore_ascii_case(&book.title)).unwrap_or(false) {
        return 1.0;
    }

    t_score * 0.7 + a_score * 0.3
}

/// Extracts an embedded identifier from a unit's source path, if any.
pub fn identifier_in_path(source_path: &str) -> Option<String> {
    IDENTIFIER_IN_PATH.find(source_path).map(|m| m.as_str().to_string())
}

/// Runs up to 6 keyword queries (narrowing from "author title" down to
/// "title" alone) against the metadata client, resolves each candidate
/// identifier to a `Book`, and scores every distinct result against the
/// scanner's `BookGuess`. The identifier-in-path fast path is tried by
/// the caller first; this is the fallback once no embedded ASIN is
/// found.
pub async fn find_candidates(meta: &Arc<MetadataClient>, guess: &BookGuess, region: Region) -> Vec<MatchCandidate> {
    let _ = region;
    let mut queries = Vec::new();
    if let (Some(author), Some(title)) = (&guess.author, &guess.title) {
        queries.push(format!("{author} {title}"));
    }
    if let Some(title) = &guess.title {
        queries.push(title.clone());
    }
    if let Some(author) = &guess.author {
        queries.push(author.clone());
    }
    queries.truncate(6);

    let mut seen = std::collections::HashSet::new();
    let mut candidates = Vec::new();
    for query in queries {
        for identifier in meta.search(&query, SEARCH_TTL).await {
            if !seen.insert(identifier.clone()) {
                continue;
            }
            if let Some(book) = meta.fetch_book(&identifier, Region::Us).await {
                let score = blended_score(&book, guess);
                candidates.push(MatchCandidate { book, score });
            }
        }
        if candidates.iter().any(|c| c.score >= 1.0) {
            break;
        }
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(title: &str, authors: &[&str]) -> Book {
        Book {
            asin: "B0TEST0001".to_string(),
            title: title.to_string(),
            subtitle: None,
            authors: authors.iter().map(|a| a.to_string()).collect(),
            narrators: vec![],
            cover_url: None,
            release_date: None,
            runtime_minutes: None,
            series: vec![],
            genres: vec![],
            publisher: None,
            description: None,
            language: None,
        }
    }

    #[test]
    fn exact_case_insensitive_title_match_scores_1() {
        let guess = BookGuess { author: Some("Susan Cain".to_string()), title: Some("quiet".to_string()), language: None };
        assert_eq!(blended_score(&book("Quiet", &["Susan Cain"]), &guess), 1.0);
    }

    #[test]
    fn mismatched_title_scores_below_exact() {
        let guess = BookGuess { author: Some("Susan Cain".to_string()), title: Some("Loud".to_string()), language: None };
        assert!(blended_score(&book("Quiet", &["Susan Cain"]), &guess) < 1.0);
    }

    #[test]
    fn finds_asin_shaped_token_in_path() {
        assert_eq!(identifier_in_path("/lib/B0C1H26C46/book.m4b"), Some("B0C1H26C46".to_string()));
        assert_eq!(identifier_in_path("/lib/no-id-here/book.m4b"), None);
    }
}
