use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::length::LengthFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::unique::UniqueFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{Tokenizer, WordTokenizer};

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// Distinct lower-cased words of `text`, sorted.
    pub fn word_list(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }

    /// Word list pipeline of the fulltext index
    pub fn fulltext(min_length: usize, max_length: usize) -> Self {
        Analyzer::new("fulltext".to_string(), Box::new(WordTokenizer))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(LengthFilter {
                min: min_length.max(1),
                max: max_length.max(1),
            }))
            .add_filter(Box::new(UniqueFilter))
    }
}
