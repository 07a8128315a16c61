use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Sorts words and keeps one token per distinct text.
pub struct UniqueFilter;

impl TokenFilter for UniqueFilter {
    fn filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        tokens.sort_by(|a, b| a.text.cmp(&b.text));
        tokens.dedup_by(|a, b| a.text == b.text);
        tokens
    }

    fn name(&self) -> &str {
        "unique"
    }
}
