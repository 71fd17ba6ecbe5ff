use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;

use lazy_static::lazy_static;
use log::{error, trace};

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Eof,
    Def,
    Extern,
    Ident(String),
    Number(f64),
    /// any other single character: operators, parens, comma, braces, semicolon
    Char(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of input"),
            Token::Def => write!(f, "'def'"),
            Token::Extern => write!(f, "'extern'"),
            Token::Ident(ident) => write!(f, "identifier '{}'", ident),
            Token::Number(num) => write!(f, "number {}", num),
            Token::Char(c) => write!(f, "'{}'", c),
        }
    }
}

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, Token> = {
        let mut keywords = HashMap::new();
        keywords.insert("def", Token::Def);
        keywords.insert("extern", Token::Extern);
        keywords
    };
}

/// One-token-lookahead lexer over a character stream.
///
/// The lexer never pushes a token back: `advance` replaces the current token
/// and the previous one is gone.
pub struct Lexer<I: Iterator<Item = char>> {
    input: I,
    last_char: Option<char>,
    current: Token,
}

impl<I: Iterator<Item = char>> Lexer<I> {
    pub fn new(input: I) -> Self {
        Lexer {
            input,
            // a space so the first advance starts by reading
            last_char: Some(' '),
            current: Token::Char(';'),
        }
    }

    pub fn advance(&mut self) -> &Token {
        self.current = self.next_token();
        trace!("lexed {}", self.current);
        &self.current
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn current_number(&self) -> Option<f64> {
        match self.current {
            Token::Number(num) => Some(num),
            _ => None,
        }
    }

    pub fn current_identifier(&self) -> Option<&str> {
        match &self.current {
            Token::Ident(ident) => Some(ident.as_str()),
            _ => None,
        }
    }

    fn bump(&mut self) {
        self.last_char = self.input.next();
    }

    fn take_while(&mut self, buf: &mut String, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.last_char.filter(|c| pred(*c)) {
            buf.push(c);
            self.bump();
        }
    }

    fn next_token(&mut self) -> Token {
        loop {
            while self.last_char.map_or(false, char::is_whitespace) {
                self.bump();
            }

            let c = match self.last_char {
                Some(c) => c,
                None => return Token::Eof,
            };

            if c.is_ascii_alphabetic() {
                let mut ident = String::new();
                self.take_while(&mut ident, |c| c.is_ascii_alphanumeric());
                return match KEYWORDS.get(ident.as_str()) {
                    Some(keyword) => keyword.clone(),
                    None => Token::Ident(ident),
                };
            }

            if c.is_ascii_digit() || c == '.' {
                let mut text = String::new();
                self.take_while(&mut text, |c| c.is_ascii_digit() || c == '.');
                return Token::Number(parse_number(&text));
            }

            if c == '#' {
                while self.last_char.map_or(false, |c| c != '\n' && c != '\r') {
                    self.bump();
                }
                continue;
            }

            self.bump();
            return Token::Char(c);
        }
    }
}

/// Converts a run of digits and dots. Every '.' is accepted by the scanner, so
/// "1.2.3" gets here; the conversion stops at the second dot and yields 1.2.
/// A run with no digits before that point (".") reads as 0.
fn parse_number(text: &str) -> f64 {
    let end = text
        .match_indices('.')
        .nth(1)
        .map_or(text.len(), |(idx, _)| idx);
    text[..end].parse().unwrap_or(0.0)
}

/// lex a whole string, stopping after the end-of-input token
pub fn lex(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input.chars());
    let mut res = Vec::new();
    loop {
        let token = lexer.advance().clone();
        let done = token == Token::Eof;
        res.push(token);
        if done {
            return res;
        }
    }
}

/// Character stream over a buffered reader, pulled one line at a time so an
/// interactive session only blocks when the lexer actually needs more input.
pub struct ReadChars<R> {
    reader: R,
    line: Vec<char>,
    pos: usize,
}

impl<R: BufRead> ReadChars<R> {
    pub fn new(reader: R) -> Self {
        ReadChars {
            reader,
            line: Vec::new(),
            pos: 0,
        }
    }
}

impl<R: BufRead> Iterator for ReadChars<R> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        while self.pos >= self.line.len() {
            let mut buf = String::new();
            match self.reader.read_line(&mut buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line = buf.chars().collect();
                    self.pos = 0;
                }
                Err(e) => {
                    error!("failed to read input: {}", e);
                    return None;
                }
            }
        }
        let c = self.line[self.pos];
        self.pos += 1;
        Some(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lex_works() {
        let tokenized = vec![
            Token::Def,
            Token::Ident("add".to_string()),
            Token::Char('('),
            Token::Ident("x".to_string()),
            Token::Char(')'),
            Token::Char('{'),
            Token::Ident("x".to_string()),
            Token::Char('+'),
            Token::Number(1.0),
            Token::Char('}'),
            Token::Eof,
        ];
        assert_eq!(lex("def add(x) { x + 1.0 }"), tokenized);
    }

    #[test]
    fn keywords_need_whole_identifier() {
        assert_eq!(
            lex("extern define def2"),
            vec![
                Token::Extern,
                Token::Ident("define".to_string()),
                Token::Ident("def2".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn sequential_numbers_keep_state() {
        let mut lexer = Lexer::new("1.0 2.5".chars());
        lexer.advance();
        assert_eq!(lexer.current_number(), Some(1.0));
        lexer.advance();
        assert_eq!(lexer.current_number(), Some(2.5));
        assert_eq!(lexer.advance(), &Token::Eof);
    }

    #[test]
    fn comment_lines_produce_no_tokens() {
        assert_eq!(lex("# comment\n1+1"), lex("1+1"));
        assert_eq!(lex("1 # trailing"), vec![Token::Number(1.0), Token::Eof]);
        assert_eq!(lex("# only a comment"), vec![Token::Eof]);
    }

    #[test]
    fn permissive_numbers() {
        assert_eq!(parse_number("1.2.3"), 1.2);
        assert_eq!(parse_number("."), 0.0);
        assert_eq!(parse_number(".5"), 0.5);
        assert_eq!(parse_number("7."), 7.0);
        assert_eq!(lex("1.2.3"), vec![Token::Number(1.2), Token::Eof]);
    }

    #[test]
    fn identifier_payload() {
        let mut lexer = Lexer::new("foo2 bar".chars());
        lexer.advance();
        assert_eq!(lexer.current_identifier(), Some("foo2"));
        assert_eq!(lexer.current_number(), None);
        lexer.advance();
        assert_eq!(lexer.current_identifier(), Some("bar"));
    }

    #[test]
    fn eof_is_sticky() {
        let mut lexer = Lexer::new("".chars());
        assert_eq!(lexer.advance(), &Token::Eof);
        assert_eq!(lexer.advance(), &Token::Eof);
    }

    #[test]
    fn read_chars_spans_lines() {
        let reader = std::io::Cursor::new("ab\nc");
        let chars: String = ReadChars::new(reader).collect();
        assert_eq!(chars, "ab\nc");
    }
}
