//! Legacy weighted-field scoring.
//!
//! Predates the BM25 index and survives for backward comparability only:
//! a query term "hits" a field when it appears as a substring, and fields
//! carry fixed weights (summary 3, topics 2, files 1, issue refs 1). No
//! temporal blend.

use corpus::SessionRecord;

const MAX_ACHIEVABLE_WEIGHT: f64 = 7.0;

/// Score `record` against pre-tokenized lowercase `query_terms`,
/// normalized to [0, 1] by the maximum achievable weight.
pub(crate) fn simple_relevance_score(query_terms: &[String], record: &SessionRecord) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let total_terms = query_terms.len() as f64;
    let mut score = 0.0;

    let summary = record.summary.to_lowercase();
    let summary_hits = query_terms.iter().filter(|t| summary.contains(t.as_str())).count();
    if summary_hits > 0 {
        score += summary_hits as f64 / total_terms * 3.0;
    }

    let topics: Vec<String> = record.topics.iter().map(|t| t.to_lowercase()).collect();
    let topic_hits = query_terms
        .iter()
        .filter(|t| topics.iter().any(|topic| topic.contains(t.as_str())))
        .count();
    if topic_hits > 0 {
        score += topic_hits as f64 / total_terms * 2.0;
    }

    let files: Vec<String> = record.files_modified.iter().map(|f| f.to_lowercase()).collect();
    let file_hits = query_terms
        .iter()
        .filter(|t| files.iter().any(|file| file.contains(t.as_str())))
        .count();
    if file_hits > 0 {
        score += file_hits as f64 / total_terms * 1.0;
    }

    let issues: Vec<String> = record.issue_refs.iter().map(|i| i.to_lowercase()).collect();
    let issue_hit = query_terms
        .iter()
        .any(|t| issues.iter().any(|issue| issue.contains(t.as_str())));
    if issue_hit {
        score += 1.0;
    }

    score / MAX_ACHIEVABLE_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        let mut r = SessionRecord::new("s1", None);
        r.summary = "Fixed JWT refresh race".into();
        r.topics = vec!["auth".into(), "tokens".into()];
        r.files_modified = vec!["src/auth/jwt.rs".into()];
        r.issue_refs = vec!["issue-4821".into()];
        r
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn full_match_across_all_fields_scores_one() {
        let score = simple_relevance_score(&terms(&["jwt"]), &record());
        // jwt hits summary (3) and files (1) but not topics or issues.
        assert!((score - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn issue_hit_adds_flat_weight() {
        let score = simple_relevance_score(&terms(&["4821"]), &record());
        assert!((score - 1.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn partial_term_coverage_scales_field_weight() {
        // One of two terms hits the summary.
        let score = simple_relevance_score(&terms(&["jwt", "zzz"]), &record());
        assert!((score - (0.5 * 3.0 + 0.5 * 1.0) / 7.0).abs() < 1e-9);
    }

    #[test]
    fn no_match_scores_zero() {
        assert_eq!(simple_relevance_score(&terms(&["kubernetes"]), &record()), 0.0);
    }

    #[test]
    fn empty_query_scores_zero() {
        assert_eq!(simple_relevance_score(&[], &record()), 0.0);
    }

    #[test]
    fn score_never_exceeds_one() {
        let score = simple_relevance_score(&terms(&["auth"]), &record());
        assert!((0.0..=1.0).contains(&score));
    }
}
