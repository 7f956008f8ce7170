//! Tokenizer capability traits and a simple default analyzer.
//!
//! The engine never tokenizes text itself; it consumes a lazy, finite token
//! stream produced by an [`Analyzer`]. Each token carries its term text, a
//! position increment relative to the previous token, and optionally the
//! start/end byte offsets of the token in the source text.

/// One token produced by a [`TokenStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Position advance relative to the previous token. 1 for adjacent
    /// tokens; larger values leave holes (e.g. removed stopwords).
    pub position_increment: u32,
    /// Start/end byte offsets in the analyzed text, when known.
    pub offset: Option<(u32, u32)>,
}

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        Token { text: text.into(), position_increment: 1, offset: None }
    }
}

/// A finite sequence of tokens for one field value.
pub trait TokenStream {
    fn next_token(&mut self) -> Option<Token>;
}

/// Produces token streams for field text.
pub trait Analyzer {
    fn token_stream<'a>(&'a self, field: &str, text: &'a str) -> Box<dyn TokenStream + 'a>;

    /// Position gap inserted between multiple values of the same field
    /// within one document.
    fn position_increment_gap(&self, _field: &str) -> u32 {
        0
    }
}

/// Maximum token length the default analyzer will emit.
/// Longer runs are likely base64 or hex dumps, not searchable words.
const MAX_TOKEN_LENGTH: usize = 128;

/// Lowercases maximal alphanumeric runs and records their byte offsets.
///
/// Good enough for tests and demos; production deployments supply their own
/// [`Analyzer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleAnalyzer;

impl Analyzer for SimpleAnalyzer {
    fn token_stream<'a>(&'a self, _field: &str, text: &'a str) -> Box<dyn TokenStream + 'a> {
        Box::new(SimpleTokenStream { text, pos: 0 })
    }
}

struct SimpleTokenStream<'a> {
    text: &'a str,
    pos: usize,
}

impl TokenStream for SimpleTokenStream<'_> {
    fn next_token(&mut self) -> Option<Token> {
        let bytes = self.text.as_bytes();

        loop {
            // skip the separator run
            while self.pos < bytes.len() && !bytes[self.pos].is_ascii_alphanumeric() {
                self.pos += 1;
            }
            if self.pos >= bytes.len() {
                return None;
            }

            let start = self.pos;
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_alphanumeric() {
                self.pos += 1;
            }

            let slice = &self.text[start..self.pos];
            if slice.len() > MAX_TOKEN_LENGTH {
                continue;
            }

            return Some(Token {
                text: slice.to_ascii_lowercase(),
                position_increment: 1,
                offset: Some((start as u32, self.pos as u32)),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str) -> Vec<Token> {
        let analyzer = SimpleAnalyzer;
        let mut stream = analyzer.token_stream("body", text);
        let mut out = Vec::new();
        while let Some(t) = stream.next_token() {
            out.push(t);
        }
        out
    }

    #[test]
    fn test_simple_stream() {
        let tokens = collect("Hello, wonderful world!");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "wonderful", "world"]);
        assert_eq!(tokens[0].offset, Some((0, 5)));
        assert_eq!(tokens[2].offset, Some((17, 22)));
    }

    #[test]
    fn test_empty_and_separator_only() {
        assert!(collect("").is_empty());
        assert!(collect("--- ***").is_empty());
    }

    #[test]
    fn test_overlong_run_skipped() {
        let long = "x".repeat(200);
        let text = format!("ok {long} fine");
        let texts: Vec<_> = collect(&text).into_iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["ok", "fine"]);
    }
}
