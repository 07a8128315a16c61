use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Drops words shorter than `min` characters and cuts longer ones to `max`.
pub struct LengthFilter {
    pub min: usize,
    pub max: usize,
}

impl TokenFilter for LengthFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens.into_iter()
            .filter(|token| token.char_len() >= self.min)
            .map(|mut token| {
                if let Some((cut, _)) = token.text.char_indices().nth(self.max) {
                    token.text.truncate(cut);
                }
                token
            })
            .collect()
    }

    fn name(&self) -> &str {
        "length"
    }
}
