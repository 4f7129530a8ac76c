use super::Token;
use crate::{Error, ErrorType};
use logos::{Lexer as LogosLexer, Logos};

/// A lexed unit of ledger source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lexeme {
    /// An unquoted string. Unquoted strings may name functions.
    Text(String),
    /// A `"`-quoted string. Quoted strings are always pushed as values.
    QuotedText(String),
    /// `(`
    OpenScope,
    /// `)`
    CloseScope,
    /// End of input.
    End,
}

pub struct Lexer<'source> {
    llex: LogosLexer<'source, Token>,
    line: usize,
}

impl<'source> Lexer<'source> {
    pub fn new(src: &'source str) -> Self {
        Lexer {
            llex: Token::lexer(src),
            line: 1,
        }
    }

    /// Returns the 1-based line number of the most recently consumed input.
    pub fn line(&self) -> usize {
        self.line
    }

    fn error(&self, msg: &str) -> Error {
        Error::new(ErrorType::Lex, msg).at_line(self.line)
    }

    /// Lexes the next unit. Once the input is exhausted every call returns
    /// [`Lexeme::End`].
    pub fn next_lexeme(&mut self) -> Result<Lexeme, Error> {
        while let Some(token) = self.llex.next() {
            let text = self.llex.slice();
            self.line += text.matches('\n').count();
            match token {
                Token::WhiteSpace => {}
                Token::OpenParen => return Ok(Lexeme::OpenScope),
                Token::CloseParen => return Ok(Lexeme::CloseScope),
                Token::Bare => return self.unescape_bare(text).map(Lexeme::Text),
                Token::Quoted => return self.unescape_quoted(text).map(Lexeme::QuotedText),
                Token::Error => {
                    return Err(self.error(&format!("unexpected character {:?}", text)))
                }
            }
        }
        Ok(Lexeme::End)
    }

    fn unescape_bare(&self, text: &str) -> Result<String, Error> {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("unfinished escape at end of file")),
                }
            } else {
                out.push(c);
            }
        }
        Ok(out)
    }

    fn unescape_quoted(&self, text: &str) -> Result<String, Error> {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().skip(1);
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => out.push(escaped),
                    None => break,
                },
                '"' => return Ok(out),
                _ => out.push(c),
            }
        }
        Err(self.error("unfinished quoted string at end of file"))
    }
}
