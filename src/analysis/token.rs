/// A word produced by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,      // The token text
    pub position: u32,     // Word position in the input
}

impl Token {
    pub fn new(text: String, position: u32) -> Self {
        Token { text, position }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
