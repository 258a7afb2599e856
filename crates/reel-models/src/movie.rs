use serde::{Deserialize, Serialize};
use std::fmt;

/// A free-text movie reference of the form `"Title (Year)"`
///
/// Lists, recommendations and user input all name movies this way. The year
/// is optional: when the string has no trailing four-digit year in
/// parentheses the whole trimmed string becomes the title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MovieReference {
    pub title: String,
    pub year: Option<u32>,
}

impl MovieReference {
    pub fn new(title: impl Into<String>, year: Option<u32>) -> Self {
        Self {
            title: title.into(),
            year,
        }
    }

    /// Parse `"Title (Year)"`, falling back to a year-less reference
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();

        if let Some(without_paren) = trimmed.strip_suffix(')') {
            if let Some(open) = without_paren.rfind('(') {
                let digits = &without_paren[open + 1..];
                if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
                    if let Ok(year) = digits.parse::<u32>() {
                        return Self {
                            title: without_paren[..open].trim().to_string(),
                            year: Some(year),
                        };
                    }
                }
            }
        }

        Self {
            title: trimmed.to_string(),
            year: None,
        }
    }
}

impl fmt::Display for MovieReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{} ({})", self.title, year),
            None => write!(f, "{}", self.title),
        }
    }
}

/// A reference together with the external identifier it resolved to
///
/// `external_id` is `None` when the reference index had no acceptable match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub reference: MovieReference,
    pub external_id: Option<String>,
}

impl ResolvedIdentity {
    pub fn is_resolved(&self) -> bool {
        self.external_id.is_some()
    }
}

/// Remove every closed parenthetical group from a title and collapse the
/// surrounding whitespace, e.g. `"Dune (2021)"` becomes `"Dune"`.
///
/// A group ends at the first `)` after its `(`; an unclosed `(` is kept as is.
/// Library search matches on stored titles, which never carry the year
/// annotation used by lists.
pub fn strip_parentheticals(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut rest = title;

    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push(' ');
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_title_with_year() {
        let parsed = MovieReference::parse("Title (1999)");
        assert_eq!(parsed.title, "Title");
        assert_eq!(parsed.year, Some(1999));
    }

    #[test]
    fn test_parse_title_without_year() {
        let parsed = MovieReference::parse("Title");
        assert_eq!(parsed, MovieReference::new("Title", None));
    }

    #[test]
    fn test_parse_keeps_numbers_inside_title() {
        let parsed = MovieReference::parse("Blade Runner 2049 (2017)");
        assert_eq!(parsed.title, "Blade Runner 2049");
        assert_eq!(parsed.year, Some(2017));
    }

    #[test]
    fn test_parse_ignores_non_year_parenthetical() {
        let parsed = MovieReference::parse("Solaris (Director's Cut)");
        assert_eq!(parsed.title, "Solaris (Director's Cut)");
        assert_eq!(parsed.year, None);

        let parsed = MovieReference::parse("Short (99)");
        assert_eq!(parsed.year, None);
    }

    #[test]
    fn test_display_round_trips_text() {
        assert_eq!(MovieReference::parse("Dune (2021)").to_string(), "Dune (2021)");
        assert_eq!(MovieReference::parse("  Arrival ").to_string(), "Arrival");
    }

    #[test]
    fn test_strip_parentheticals() {
        assert_eq!(strip_parentheticals("Dune (2021)"), "Dune");
        assert_eq!(strip_parentheticals("Amélie (Le Fabuleux) (2001)"), "Amélie");
        assert_eq!(strip_parentheticals("Heat"), "Heat");
        assert_eq!(strip_parentheticals("M (1931) Remastered"), "M Remastered");
    }

    #[test]
    fn test_strip_parentheticals_leaves_unclosed_group() {
        assert_eq!(strip_parentheticals("Foo (bar"), "Foo (bar");
        assert_eq!(strip_parentheticals("Dune (2021) (Part"), "Dune (Part");
        // First closing paren ends the group
        assert_eq!(strip_parentheticals("A (b (c) d) e"), "A d) e");
    }
}
