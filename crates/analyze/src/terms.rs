//! Technical-term extraction: the vocabulary a developer would actually
//! search by, pulled from identifiers and ecosystem names.

use once_cell::sync::Lazy;
use regex::Regex;

static ACRONYM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2,5}\b").expect("static acronym regex"));
static CAMEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-z]+[A-Z][a-zA-Z]*\b|\b[A-Z][a-z]+[A-Z][a-zA-Z]*\b")
        .expect("static camel-case regex")
});
static SNAKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z]+_[a-z_]+\b").expect("static snake-case regex"));
static KEBAB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z]+-[a-z-]+\b").expect("static kebab-case regex"));

/// Fixed allowlist of ecosystem terms that count as technical vocabulary
/// even when they read like plain words.
static ECOSYSTEM_TERMS: &[&str] = &[
    "python",
    "javascript",
    "typescript",
    "react",
    "vue",
    "angular",
    "django",
    "flask",
    "fastapi",
    "node",
    "npm",
    "pip",
    "docker",
    "kubernetes",
    "aws",
    "azure",
    "gcp",
    "api",
    "rest",
    "graphql",
    "sql",
    "nosql",
    "database",
    "redis",
    "mongodb",
    "postgres",
    "mysql",
    "git",
    "github",
    "gitlab",
    "ci",
    "cd",
    "devops",
    "testing",
    "pytest",
    "jest",
    "unit",
    "integration",
    "frontend",
    "backend",
    "fullstack",
    "microservice",
    "serverless",
    "cloud",
    "security",
    "authentication",
    "authorization",
    "oauth",
    "jwt",
    "encryption",
    "performance",
    "optimization",
    "scaling",
    "caching",
    "monitoring",
];

static ECOSYSTEM_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = ECOSYSTEM_TERMS.join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).expect("static ecosystem regex")
});

/// Extract technical terms from `text`.
///
/// Union of ALL-CAPS acronyms (2–5 letters), camelCase/PascalCase
/// identifiers, snake_case and kebab-case identifiers, and the fixed
/// ecosystem allowlist. Everything is lowercased; order of first appearance
/// is preserved and duplicates are dropped, so the result is deterministic
/// for a given input.
pub fn extract_technical_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut push = |term: String| {
        if !terms.contains(&term) {
            terms.push(term);
        }
    };

    for m in ACRONYM_RE.find_iter(text) {
        push(m.as_str().to_lowercase());
    }
    for m in CAMEL_RE.find_iter(text) {
        push(m.as_str().to_lowercase());
    }
    for m in SNAKE_RE.find_iter(text) {
        push(m.as_str().to_string());
    }
    for m in KEBAB_RE.find_iter(text) {
        push(m.as_str().to_string());
    }

    let lower = text.to_lowercase();
    for m in ECOSYSTEM_RE.find_iter(&lower) {
        push(m.as_str().to_string());
    }

    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acronyms_are_found_and_lowercased() {
        let terms = extract_technical_terms("The JWT and CORS setup");
        assert!(terms.contains(&"jwt".to_string()));
        assert!(terms.contains(&"cors".to_string()));
    }

    #[test]
    fn long_uppercase_runs_are_not_acronyms() {
        let terms = extract_technical_terms("WARNING DEPRECATED");
        assert!(!terms.contains(&"warning".to_string()));
        assert!(!terms.contains(&"deprecated".to_string()));
    }

    #[test]
    fn camel_and_pascal_case() {
        let terms = extract_technical_terms("getUser and HttpClient helpers");
        assert!(terms.contains(&"getuser".to_string()));
        assert!(terms.contains(&"httpclient".to_string()));
    }

    #[test]
    fn snake_and_kebab_case() {
        let terms = extract_technical_terms("login_handler calls auth-service");
        assert!(terms.contains(&"login_handler".to_string()));
        assert!(terms.contains(&"auth-service".to_string()));
    }

    #[test]
    fn ecosystem_allowlist_is_case_insensitive() {
        let terms = extract_technical_terms("Deployed to Kubernetes via Docker");
        assert!(terms.contains(&"kubernetes".to_string()));
        assert!(terms.contains(&"docker".to_string()));
    }

    #[test]
    fn terms_are_deduplicated_in_first_seen_order() {
        let terms = extract_technical_terms("JWT jwt JWT oauth");
        let jwt_count = terms.iter().filter(|t| t.as_str() == "jwt").count();
        assert_eq!(jwt_count, 1);
        assert_eq!(terms[0], "jwt");
    }

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(extract_technical_terms("we talked about lunch plans").is_empty());
    }
}
