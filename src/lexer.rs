//! Turn a byte stream into [Token]s.

use std::{
    io::{self, Bytes, Read},
    iter::Peekable,
};

use thiserror::Error;

use crate::{lex_err, location::Location, result::Result, token::Token};

#[derive(Debug, Error)]
pub enum LexErr {
    #[error("failed to read source: {0}")]
    Io(#[from] io::Error),
}

/// Lazily tokenizes the bytes of `R`, with one token of lookahead.
/// Once the input is exhausted, [Token::Eof] is returned forever.
pub struct Lexer<R: Read> {
    bytes: Peekable<Bytes<R>>,
    lexed: Option<(Token, Location)>,
    loc: Location,
}

impl<R: Read> Lexer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            bytes: reader.bytes().peekable(),
            lexed: None,
            loc: Location::start(),
        }
    }

    pub fn peek_token(&mut self) -> Result<&(Token, Location)> {
        match self.lexed {
            Some(ref token) => Ok(token),
            None => {
                self.lexed = Some(self.next_token()?);
                self.peek_token()
            }
        }
    }

    pub fn next_token(&mut self) -> Result<(Token, Location)> {
        if let Some(token) = self.lexed.take() {
            return Ok(token);
        }

        loop {
            let Some(b) = self.peek()? else {
                return Ok((Token::Eof, self.loc));
            };

            // Skip whitespace and comments
            match b {
                '#' => {
                    self.comment()?;
                    continue;
                }
                _ if b.is_ascii_whitespace() => {
                    self.next();
                    continue;
                }
                _ => (),
            }

            let loc = self.loc;
            let tok = match b {
                'a'..='z' | 'A'..='Z' => self.identifier()?,
                '0'..='9' | '.' => self.number(loc)?,
                _ => {
                    self.next();
                    Token::Char(b)
                }
            };
            log::trace!("{loc}: {tok}");
            return Ok((tok, loc));
        }
    }

    /// Discard the next token. Used to resynchronize after a parse error.
    pub fn skip_token(&mut self) -> Result<()> {
        self.next_token().map(|_| ())
    }

    fn comment(&mut self) -> Result<()> {
        while let Some(b) = self.peek()? {
            if b == '\n' || b == '\r' {
                break;
            }
            self.next();
        }
        Ok(())
    }

    fn identifier(&mut self) -> Result<Token> {
        let mut identifier = String::new();
        while let Some(b) = self.peek()? {
            if b.is_ascii_alphanumeric() {
                identifier.push(b);
                self.next();
            } else {
                break;
            }
        }
        Ok(Token::keyword(&identifier).unwrap_or(Token::Identifier(identifier)))
    }

    fn number(&mut self, loc: Location) -> Result<Token> {
        let mut buf = String::new();
        while let Some(b) = self.peek()? {
            if b.is_ascii_digit() || b == '.' {
                buf.push(b);
                self.next();
            } else {
                break;
            }
        }
        let (value, used) = parse_number_prefix(&buf);
        if used < buf.len() {
            log::warn!(
                "{loc}: numeric literal `{buf}` read as {value}, ignoring `{}`",
                &buf[used..]
            );
        }
        Ok(Token::Number(value))
    }

    fn peek(&mut self) -> Result<Option<char>> {
        if let Some(&Ok(byte)) = self.bytes.peek() {
            return Ok(Some(byte as char));
        };
        match self.bytes.next() {
            Some(Err(err)) => lex_err!(self.loc, LexErr::Io(err)),
            _ => Ok(None),
        }
    }

    // Only called after a successful `peek`.
    fn next(&mut self) {
        if let Some(Ok(b)) = self.bytes.next() {
            self.loc.advance(b as char);
        }
    }
}

/// Parse the longest prefix of `text` (made of digits and dots) that is a
/// decimal number. Returns the value and the length of the prefix used.
/// A text without any such prefix reads as zero.
pub fn parse_number_prefix(text: &str) -> (f64, usize) {
    let bytes = text.as_bytes();
    let int_len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    let mut end = int_len;
    let mut frac_len = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_len = bytes[end + 1..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        end += 1 + frac_len;
    }
    if int_len == 0 && frac_len == 0 {
        return (0.0, 0);
    }
    (text[..end].parse().unwrap_or(0.0), end)
}
