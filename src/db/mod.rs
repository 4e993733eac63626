pub mod academic;
pub mod flashcards;
pub mod learning_paths;
pub mod materials;
pub mod practice;
pub mod questions;
pub mod sessions;
pub mod users;

pub use academic::*;
pub use flashcards::*;
pub use learning_paths::*;
pub use materials::*;
pub use practice::*;
pub use questions::*;
pub use sessions::*;
pub use tests::*;
pub use users::*;

/// A trimmed, lower-cased search term. Matching happens in Rust rather than
/// through `LIKE`, so `%` and `_` are literal and case folding covers
/// non-ASCII text.
#[derive(Debug, Clone)]
pub struct SearchTerm(String);

impl SearchTerm {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| SearchTerm(term.to_lowercase()))
    }

    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.0)
    }
}

#[cfg(test)]
mod search_tests {
    use super::SearchTerm;

    #[test]
    fn test_wildcards_are_literal() {
        let term = SearchTerm::parse(Some("50%")).unwrap();
        assert!(term.matches("Raise of 50% in taxes"));
        assert!(!term.matches("Raise of 500 in taxes"));

        let term = SearchTerm::parse(Some("a_b")).unwrap();
        assert!(term.matches("field A_B"));
        assert!(!term.matches("field axb"));
    }

    #[test]
    fn test_case_folding_covers_accents() {
        let term = SearchTerm::parse(Some("  ÉLISA ")).unwrap();
        assert!(term.matches("élisa@example.com"));
        assert!(SearchTerm::parse(Some("   ")).is_none());
        assert!(SearchTerm::parse(None).is_none());
    }
}
