//! Entity and keyword extraction
//!
//! [`EntityExtractor`] is the seam for a real NER model. The bundled
//! [`HeuristicExtractor`] works from capitalization, honorifics and
//! company suffixes, which is enough to rank who and what a mailbox is
//! about.

use std::collections::HashSet;

use super::OrderedCounter;

/// People and organizations named in a text, one entry per occurrence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities {
    pub people: Vec<String>,
    pub organizations: Vec<String>,
}

/// Black-box classifier over cleaned text
pub trait EntityExtractor: Send + Sync {
    fn entities(&self, text: &str) -> Entities;

    /// Up to `limit` (keyword, frequency) pairs, most frequent first
    fn keywords(&self, text: &str, limit: usize) -> Vec<(String, u32)>;
}

const STOP_WORDS: &[&str] = &[
    // function words
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "couldn", "d", "did", "didn", "do", "does", "doesn", "doing", "don",
    "down", "during", "each", "few", "for", "from", "further", "had", "hadn", "has", "hasn",
    "have", "haven", "having", "he", "her", "here", "hers", "herself", "him", "himself", "his",
    "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself", "just", "ll", "m", "ma",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "o", "of", "off", "on",
    "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "re", "s",
    "same", "she", "should", "shouldn", "so", "some", "such", "t", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "ve", "very", "was", "wasn", "we", "were",
    "weren", "what", "when", "where", "which", "while", "who", "whom", "whose", "why", "will",
    "with", "won", "would", "wouldn", "y", "you", "your", "yours", "yourself", "could", "per",
    "also", "etc", "much", "many", "may", "might", "must", "shall", "yet", "via",
    // mail boilerplate
    "br", "https", "http", "www", "com", "wrote", "hi", "hello", "dear", "regards", "best",
    "thanks", "thank", "please", "kindly", "sincerely", "cheers", "attached", "email", "mail",
    "sent", "reply", "forward", "forwarded", "message", "original",
    // low-signal verbs and adjectives
    "know", "let", "get", "got", "see", "look", "find", "hope", "think", "feel", "make", "take",
    "go", "going", "come", "want", "need", "like", "check", "said", "say", "good", "great",
    "new", "old", "bad", "big", "small", "long", "short", "high", "low", "early", "late",
    "first", "second", "third", "last", "next", "previous", "current", "one", "two", "three",
    "four", "five", "six", "seven", "eight", "nine", "ten",
    // calendar words
    "today", "tomorrow", "yesterday", "time", "day", "days", "week", "weeks", "month",
    "year", "am", "pm", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday",
    "sunday", "january", "february", "march", "april", "june", "july", "august", "september",
    "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep",
    "oct", "nov", "dec",
];

const PERSON_INDICATORS: &[&str] = &["mr", "mrs", "ms", "dr", "prof", "sir", "madam"];

const ORG_INDICATORS: &[&str] = &[
    "inc",
    "corp",
    "corporation",
    "ltd",
    "llc",
    "gmbh",
    "plc",
    "co",
    "company",
    "group",
    "partners",
    "labs",
    "technologies",
    "systems",
    "university",
    "institute",
    "foundation",
    "bank",
    "capital",
    "ventures",
];

/// Rule-based extractor; construct once and share by reference
#[derive(Debug, Clone)]
pub struct HeuristicExtractor {
    stop_words: HashSet<String>,
    person_indicators: HashSet<String>,
    org_indicators: HashSet<String>,
    min_keyword_len: usize,
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicExtractor {
    pub fn new() -> Self {
        let set = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            stop_words: set(STOP_WORDS),
            person_indicators: set(PERSON_INDICATORS),
            org_indicators: set(ORG_INDICATORS),
            min_keyword_len: 3,
        }
    }

    /// Extra words to ignore, e.g. the user's own name
    pub fn with_stop_words<'a>(mut self, words: impl IntoIterator<Item = &'a str>) -> Self {
        self.stop_words
            .extend(words.into_iter().map(|w| w.to_lowercase()));
        self
    }

    fn is_stop(&self, word: &str) -> bool {
        self.stop_words.contains(&word.to_lowercase())
    }

    fn is_capitalized(word: &str) -> bool {
        word.chars().next().is_some_and(char::is_uppercase)
            && word.chars().any(char::is_lowercase)
    }

    fn classify(&self, span: &[&str], preceded_by_honorific: bool) -> Option<SpanKind> {
        let last = span.last()?.to_lowercase();
        if span.len() >= 2 && self.org_indicators.contains(&last) {
            return Some(SpanKind::Organization);
        }
        if preceded_by_honorific {
            return Some(SpanKind::Person);
        }
        // "Firstname Lastname" or "Firstname Middle Lastname"
        if (2..=3).contains(&span.len()) {
            return Some(SpanKind::Person);
        }
        None
    }
}

enum SpanKind {
    Person,
    Organization,
}

fn trim_token(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric() && c != '&' && c != '\'')
}

/// Punctuation that ends a capitalized run
fn breaks_run(token: &str) -> bool {
    token.ends_with([',', '.', ';', ':', '!', '?', ')'])
}

impl EntityExtractor for HeuristicExtractor {
    fn entities(&self, text: &str) -> Entities {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut out = Entities::default();
        let mut i = 0;

        while i < tokens.len() {
            let word = trim_token(tokens[i]);
            if !Self::is_capitalized(word) || self.is_stop(word) {
                i += 1;
                continue;
            }

            let honorific = i > 0
                && self
                    .person_indicators
                    .contains(&trim_token(tokens[i - 1]).to_lowercase());

            let mut span = vec![word];
            let mut j = i;
            while !breaks_run(tokens[j]) && j + 1 < tokens.len() {
                let next = trim_token(tokens[j + 1]);
                if !Self::is_capitalized(next) || self.is_stop(next) {
                    break;
                }
                span.push(next);
                j += 1;
            }

            match self.classify(&span, honorific) {
                Some(SpanKind::Person) => out.people.push(span.join(" ")),
                Some(SpanKind::Organization) => out.organizations.push(span.join(" ")),
                None => {}
            }
            i = j + 1;
        }

        out
    }

    fn keywords(&self, text: &str, limit: usize) -> Vec<(String, u32)> {
        let mut counts = OrderedCounter::new();
        for token in text.split_whitespace() {
            let word = trim_token(token).to_lowercase();
            if word.chars().count() < self.min_keyword_len
                || !word.chars().all(char::is_alphabetic)
                || self.stop_words.contains(&word)
            {
                continue;
            }
            counts.incr(&word);
        }

        let mut ranked = counts.ranked();
        ranked.truncate(limit);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_people_and_organizations() {
        let extractor = HeuristicExtractor::new();
        let entities = extractor.entities(
            "We met Alice Smith and Dr. Jones at Acme Corp yesterday. Alice Smith will follow up with Globex Inc.",
        );
        assert_eq!(entities.people, vec!["Alice Smith", "Jones", "Alice Smith"]);
        assert_eq!(entities.organizations, vec!["Acme Corp", "Globex Inc"]);
    }

    #[test]
    fn test_single_capitalized_words_are_ignored() {
        let extractor = HeuristicExtractor::new();
        let entities = extractor.entities("Thanks for the Update on Tuesday. Budget is fine.");
        assert!(entities.people.is_empty());
        assert!(entities.organizations.is_empty());
    }

    #[test]
    fn test_punctuation_splits_runs() {
        let extractor = HeuristicExtractor::new();
        let entities = extractor.entities("cc Bob Stone, Carol King");
        assert_eq!(entities.people, vec!["Bob Stone", "Carol King"]);
    }

    #[test]
    fn test_keywords_rank_by_frequency_then_first_seen() {
        let extractor = HeuristicExtractor::new();
        let text = "Budget review. The budget and the roadmap; roadmap budget hiring 2025 ok";
        let keywords = extractor.keywords(text, 2);
        assert_eq!(
            keywords,
            vec![("budget".to_string(), 3), ("roadmap".to_string(), 2)]
        );
        let all = extractor.keywords(text, 10);
        assert_eq!(all.last().map(|(k, _)| k.as_str()), Some("hiring"));
        assert!(all.iter().all(|(k, _)| k != "ok" && k != "2025" && k != "the"));
    }

    #[test]
    fn test_custom_stop_words() {
        let extractor = HeuristicExtractor::new().with_stop_words(["Budget"]);
        let keywords = extractor.keywords("budget roadmap", 5);
        assert_eq!(keywords, vec![("roadmap".to_string(), 1)]);
    }
}
