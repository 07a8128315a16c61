use crate::core::error::{Error, ErrorKind, Result};

/// Maximum number of words in one query
pub const MAX_SEARCH_WORDS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Complete,
    Prefix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    And,
    Or,
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTerm {
    pub word: String,
    pub match_type: MatchType,
    pub combine: Combine,
}

/// Parsed fulltext search such as `"banana,prefix:app,|cherry,-rotten"`.
///
/// Terms are separated by commas. A leading `+` (default) intersects, `|` unites and
/// `-` removes matches of the term from the running result. `prefix:` matches every
/// word starting with the term, `complete:` (default) the exact word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulltextQuery {
    pub terms: Vec<QueryTerm>,
}

impl FulltextQuery {
    pub fn parse(query: &str, max_word_length: usize) -> Result<Self> {
        let mut terms = Vec::new();
        for raw in query.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let (combine, rest) = match raw.as_bytes()[0] {
                b'+' => (Combine::And, &raw[1..]),
                b'|' => (Combine::Or, &raw[1..]),
                b'-' => (Combine::Exclude, &raw[1..]),
                _ => (Combine::And, raw),
            };
            let (match_type, word) = if let Some(word) = rest.strip_prefix("prefix:") {
                (MatchType::Prefix, word)
            } else if let Some(word) = rest.strip_prefix("complete:") {
                (MatchType::Complete, word)
            } else {
                (MatchType::Complete, rest)
            };

            let word = normalize(word.trim(), max_word_length);
            if word.is_empty() {
                continue;
            }
            terms.push(QueryTerm { word, match_type, combine });
        }

        if terms.is_empty() {
            return Err(Error::new(ErrorKind::BadParameter, "fulltext query contains no words"));
        }
        if terms.len() > MAX_SEARCH_WORDS {
            return Err(Error::new(
                ErrorKind::BadParameter,
                format!("fulltext query has more than {} words", MAX_SEARCH_WORDS),
            ));
        }
        Ok(FulltextQuery { terms })
    }
}

/// Lower-cases and cuts a search word the way indexed words are.
fn normalize(word: &str, max_length: usize) -> String {
    let mut word = word.to_lowercase();
    if let Some((cut, _)) = word.char_indices().nth(max_length) {
        word.truncate(cut);
    }
    word
}
