//! Formula tokenizer.
//!
//! Classifies runs of input into quoted strings, punctuation, operators,
//! words (identifiers and numbers), and collapsed whitespace. Two source
//! rewrites happen before classification: `_`-continuation at line ends,
//! and the member-access sugar `expr.name` after a closer, which becomes
//! the index form `expr[0,"name"]`.

use toolgraph_common::{CalcError, CalcErrorKind};

const OPERATOR_CHARS: &[char] = &['+', '-', '*', '/', '^', '%', ':'];
const PUNCTUATION_CHARS: &[char] = &['(', ')', '[', ']', '{', '}', '\'', ',', '"', '`'];

const fn build_byte_table(chars: &[char]) -> [bool; 256] {
    let mut tbl = [false; 256];
    let mut i = 0;
    while i < chars.len() {
        tbl[chars[i] as usize] = true;
        i += 1;
    }
    tbl
}
static OPERATOR_TABLE: [bool; 256] = build_byte_table(OPERATOR_CHARS);
static PUNCTUATION_TABLE: [bool; 256] = build_byte_table(PUNCTUATION_CHARS);

#[inline(always)]
fn is_operator(c: u8) -> bool {
    OPERATOR_TABLE[c as usize]
}

#[inline(always)]
fn is_punctuation(c: u8) -> bool {
    PUNCTUATION_TABLE[c as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// Quoted string literal (value holds the unquoted text).
    Text,
    /// One of `()[]{}'",`.
    Punctuation,
    /// One of `+ - * / ^ % :`.
    Operator,
    /// An identifier, path, or number.
    Word,
    /// A collapsed run of spaces/tabs/newlines.
    Whitespace,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    /// Byte span in the normalized source, used for adjacency decisions.
    pub start: usize,
    pub end: usize,
}

impl Token {
    fn new(value: String, token_type: TokenType, start: usize, end: usize) -> Self {
        Token {
            value,
            token_type,
            start,
            end,
        }
    }

    pub fn is_word(&self) -> bool {
        self.token_type == TokenType::Word
    }

    /// First character, for quick dispatch on operators and punctuation.
    pub fn first_char(&self) -> char {
        self.value.chars().next().unwrap_or('\0')
    }
}

/// A tokenizer for Tool formulas.
#[derive(Debug)]
pub struct Tokenizer {
    source: String,
    pub items: Vec<Token>,
    offset: usize,
}

impl Tokenizer {
    /// Normalize and immediately tokenize the formula.
    pub fn new(formula: &str) -> Result<Self, CalcError> {
        let mut tokenizer = Tokenizer {
            source: rewrite_member_access(&join_continuations(formula)),
            items: Vec::with_capacity(formula.len() / 2),
            offset: 0,
        };
        tokenizer.tokenize()?;
        Ok(tokenizer)
    }

    /// The normalized source the spans refer to.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn tokenize(&mut self) -> Result<(), CalcError> {
        while self.offset < self.source.len() {
            let c = self.source.as_bytes()[self.offset];
            match c {
                b'"' | b'`' => self.scan_string(c)?,
                b' ' | b'\t' | b'\n' | b'\r' => self.scan_whitespace(),
                _ if is_operator(c) => self.push_single(TokenType::Operator),
                _ if is_punctuation(c) => self.push_single(TokenType::Punctuation),
                _ => self.scan_word(),
            }
        }
        Ok(())
    }

    fn push_single(&mut self, token_type: TokenType) {
        let c = self.source[self.offset..].chars().next().unwrap();
        self.items.push(Token::new(
            c.to_string(),
            token_type,
            self.offset,
            self.offset + c.len_utf8(),
        ));
        self.offset += c.len_utf8();
    }

    fn scan_whitespace(&mut self) {
        let start = self.offset;
        while self.offset < self.source.len() {
            match self.source.as_bytes()[self.offset] {
                b' ' | b'\t' | b'\n' | b'\r' => self.offset += 1,
                _ => break,
            }
        }
        self.items.push(Token::new(
            " ".to_string(),
            TokenType::Whitespace,
            start,
            self.offset,
        ));
    }

    fn scan_string(&mut self, delim: u8) -> Result<(), CalcError> {
        let start = self.offset;
        self.offset += 1;
        while self.offset < self.source.len() {
            if self.source.as_bytes()[self.offset] == delim {
                let value = self.source[start + 1..self.offset].to_string();
                self.offset += 1;
                self.items
                    .push(Token::new(value, TokenType::Text, start, self.offset));
                return Ok(());
            }
            self.offset += 1;
        }
        Err(CalcError::new(CalcErrorKind::Syntax)
            .with_param("reason", "unterminated string")
            .with_param("position", start.to_string()))
    }

    fn scan_word(&mut self) {
        let start = self.offset;
        while self.offset < self.source.len() {
            let c = self.source.as_bytes()[self.offset];
            if c.is_ascii_whitespace() || is_operator(c) || is_punctuation(c) {
                break;
            }
            self.offset += 1;
        }
        self.items.push(Token::new(
            self.source[start..self.offset].to_string(),
            TokenType::Word,
            start,
            self.offset,
        ));
    }
}

/// Join lines whose trailing `_` requests continuation. A doubled `__`
/// escapes: the line keeps one literal `_` and the break stays.
fn join_continuations(source: &str) -> String {
    if !source.contains('\n') {
        return source.to_string();
    }
    let mut out = String::with_capacity(source.len());
    let mut lines = source.split('\n').peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim_end();
        if lines.peek().is_some() && trimmed.ends_with('_') {
            if trimmed.ends_with("__") {
                out.push_str(&trimmed[..trimmed.len() - 1]);
                out.push('\n');
            } else {
                out.push_str(&trimmed[..trimmed.len() - 1]);
                // no newline: next line continues this one
            }
        } else {
            out.push_str(line);
            if lines.peek().is_some() {
                out.push('\n');
            }
        }
    }
    out
}

/// Rewrite `expr.name` member access after a closer into index form:
/// `).x` / `}.x` / `].x` become `)[0,"x"]` and so on. Chains rewrite left
/// to right, so `).a.b` ends as `)[0,"a"][0,"b"]`.
fn rewrite_member_access(source: &str) -> String {
    let mut text = source.to_string();
    loop {
        let bytes = text.as_bytes();
        let mut found = None;
        for i in 0..bytes.len().saturating_sub(2) {
            if matches!(bytes[i], b')' | b'}' | b']')
                && bytes[i + 1] == b'.'
                && (bytes[i + 2].is_ascii_alphanumeric() || bytes[i + 2] == b'_')
            {
                let mut end = i + 2;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                found = Some((i, end));
                break;
            }
        }
        match found {
            Some((closer, end)) => {
                let name = text[closer + 2..end].to_string();
                text = format!(
                    "{}[0,\"{}\"]{}",
                    &text[..closer + 1],
                    name,
                    &text[end..]
                );
            }
            None => return text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(formula: &str) -> Vec<(TokenType, String)> {
        Tokenizer::new(formula)
            .unwrap()
            .items
            .into_iter()
            .map(|t| (t.token_type, t.value))
            .collect()
    }

    #[test]
    fn classifies_words_operators_punctuation() {
        let tokens = kinds("3 m + {max a.b, 2}");
        let expected = [
            (TokenType::Word, "3"),
            (TokenType::Whitespace, " "),
            (TokenType::Word, "m"),
            (TokenType::Whitespace, " "),
            (TokenType::Operator, "+"),
            (TokenType::Whitespace, " "),
            (TokenType::Punctuation, "{"),
            (TokenType::Word, "max"),
            (TokenType::Whitespace, " "),
            (TokenType::Word, "a.b"),
            (TokenType::Punctuation, ","),
            (TokenType::Whitespace, " "),
            (TokenType::Word, "2"),
            (TokenType::Punctuation, "}"),
        ];
        assert_eq!(
            tokens,
            expected
                .iter()
                .map(|(t, v)| (*t, v.to_string()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn strings_keep_content_without_quotes() {
        let tokens = kinds(r#""hello there" + `m/s`"#);
        assert_eq!(tokens[0], (TokenType::Text, "hello there".to_string()));
        assert_eq!(tokens[4], (TokenType::Text, "m/s".to_string()));
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let err = Tokenizer::new("\"oops").unwrap_err();
        assert_eq!(err.kind, CalcErrorKind::Syntax);
    }

    #[test]
    fn whitespace_collapses_to_one_token() {
        let tokens = kinds("1  \t  +\n2");
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[1].0, TokenType::Whitespace);
    }

    #[test]
    fn trailing_underscore_continues_line() {
        assert_eq!(join_continuations("1 + _\n2"), "1 + 2");
        // Doubled underscore escapes the continuation.
        assert_eq!(join_continuations("x__\ny"), "x_\ny");
        assert_eq!(join_continuations("plain\ntext"), "plain\ntext");
    }

    #[test]
    fn member_access_rewrites_to_index_form() {
        assert_eq!(
            rewrite_member_access("{solved x}.result"),
            "{solved x}[0,\"result\"]"
        );
        assert_eq!(rewrite_member_access("a[1].b.c"), "a[1][0,\"b\"][0,\"c\"]");
        // Plain dotted paths are untouched.
        assert_eq!(rewrite_member_access("a.b.c"), "a.b.c");
    }

    #[test]
    fn spans_expose_adjacency() {
        let tok = Tokenizer::new("9.8 m/s^2").unwrap();
        let items: Vec<&Token> = tok.items.iter().collect();
        // "m" "/" "s" "^" "2" are mutually adjacent, "9.8" is not adjacent to "m".
        assert_eq!(items[2].value, "m");
        assert_eq!(items[2].end, items[3].start);
        assert_eq!(items[3].end, items[4].start);
        assert!(items[0].end < items[2].start);
    }
}
