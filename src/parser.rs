//! Recursive descent parser with precedence climbing for binary operators.

use std::io::Read;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{
    ast::{Expr, Function, Item, Prototype},
    lexer::Lexer,
    location::Location,
    parse_err,
    result::Result,
    token::Token,
};

/// Name given to the nullary function wrapping a top-level expression.
pub const ANON_EXPR_NAME: &str = "__anon_expr";

#[derive(Debug, Error)]
pub enum ParseErr {
    #[error("Expected function name in prototype, found {0}")]
    ExpectedFunctionName(Token),
    #[error("Expected '(' in prototype, found {0}")]
    ExpectedPrototypeOpenParen(Token),
    #[error("Expected ')' in prototype, found {0}")]
    ExpectedPrototypeCloseParen(Token),
    #[error("expected ')', found {0}")]
    ExpectedCloseParen(Token),
    #[error("Expected ')' or ',' in argument list, found {0}")]
    ExpectedArgListDelimiter(Token),
    #[error("expected then, found {0}")]
    ExpectedThen(Token),
    #[error("expected else, found {0}")]
    ExpectedElse(Token),
    #[error("expected identifier after for, found {0}")]
    ExpectedForVariable(Token),
    #[error("expected '=' after for, found {0}")]
    ExpectedForEquals(Token),
    #[error("expected ',' after for start value, found {0}")]
    ExpectedForComma(Token),
    #[error("expected 'in' after for, found {0}")]
    ExpectedForIn(Token),
    #[error("unknown token when expecting an expression, found {0}")]
    UnknownToken(Token),
}

/// Binary operator precedences. Operators not in the table (or with a
/// non-positive precedence) are not binary operators.
#[derive(Clone, Debug)]
pub struct PrecedenceTable {
    table: FxHashMap<char, i32>,
}

impl Default for PrecedenceTable {
    fn default() -> Self {
        let mut table = PrecedenceTable::empty();
        table.install('<', 10);
        table.install('+', 20);
        table.install('-', 20);
        table.install('*', 40);
        table
    }
}

impl PrecedenceTable {
    /// A table without any operators.
    pub fn empty() -> Self {
        PrecedenceTable {
            table: FxHashMap::default(),
        }
    }

    /// Install (or overwrite) the precedence of `op`.
    pub fn install(&mut self, op: char, precedence: i32) {
        self.table.insert(op, precedence);
    }

    /// Precedence of `op`, if it is a binary operator.
    pub fn get(&self, op: char) -> Option<i32> {
        self.table.get(&op).copied().filter(|prec| *prec > 0)
    }
}

/// Parses one top-level item at a time off a shared [Lexer].
/// The lexer outlives the parser so that lookahead carries over between items.
pub struct Parser<'a, R: Read> {
    lexer: &'a mut Lexer<R>,
    precedence: &'a PrecedenceTable,
    anon_name: &'a str,
}

impl<'a, R: Read> Parser<'a, R> {
    pub fn new(lexer: &'a mut Lexer<R>, precedence: &'a PrecedenceTable) -> Self {
        Self {
            lexer,
            precedence,
            anon_name: ANON_EXPR_NAME,
        }
    }

    /// Use `name` for the function wrapping top-level expressions.
    pub fn with_anon_name(mut self, name: &'a str) -> Self {
        self.anon_name = name;
        self
    }

    /// Parse the next definition, extern or top-level expression.
    /// Stray `;` are skipped. Returns [None] at end of input.
    /// On error, the offending token is left unconsumed: see [Self::skip_token].
    pub fn parse_top_level_item(&mut self) -> Result<Option<Item>> {
        loop {
            let tok = self.peek_tok()?;
            let item = match tok {
                Token::Eof => return Ok(None),
                Token::Char(';') => {
                    self.lexer.next_token()?;
                    continue;
                }
                Token::Def => Item::Definition(self.parse_definition()?),
                Token::Extern => Item::Extern(self.parse_extern()?),
                _ => Item::Expression(self.parse_top_level_expr()?),
            };
            return Ok(Some(item));
        }
    }

    /// Discard one token. This is the only error recovery there is.
    pub fn skip_token(&mut self) -> Result<()> {
        self.lexer.skip_token()
    }

    fn parse_definition(&mut self) -> Result<Function> {
        self.lexer.next_token()?;
        let proto = self.prototype()?;
        let body = self.expr()?;
        Ok(Function { proto, body })
    }

    fn parse_extern(&mut self) -> Result<Prototype> {
        self.lexer.next_token()?;
        self.prototype()
    }

    fn parse_top_level_expr(&mut self) -> Result<Function> {
        let loc = self.peek_loc()?;
        let body = self.expr()?;
        let proto = Prototype {
            name: self.anon_name.to_string(),
            params: vec![],
            loc,
        };
        Ok(Function { proto, body })
    }

    fn prototype(&mut self) -> Result<Prototype> {
        let (tok, loc) = self.lexer.peek_token()?.clone();
        let Token::Identifier(name) = tok else {
            return parse_err!(loc, ParseErr::ExpectedFunctionName(tok));
        };
        self.lexer.next_token()?;

        if !self.eat_if(Token::Char('('))? {
            return self.unexpected(ParseErr::ExpectedPrototypeOpenParen);
        }
        let mut params = vec![];
        while let Token::Identifier(param) = self.peek_tok()? {
            self.lexer.next_token()?;
            params.push(param);
        }
        if !self.eat_if(Token::Char(')'))? {
            return self.unexpected(ParseErr::ExpectedPrototypeCloseParen);
        }
        Ok(Prototype { name, params, loc })
    }

    fn expr(&mut self) -> Result<Expr> {
        let lhs = self.primary()?;
        self.binop_rhs(0, lhs)
    }

    /// Fold operators binding at least as tightly as `min_prec` into `lhs`.
    fn binop_rhs(&mut self, min_prec: i32, mut lhs: Expr) -> Result<Expr> {
        loop {
            let Some((op, prec)) = self.peek_operator()? else {
                return Ok(lhs);
            };
            if prec < min_prec {
                return Ok(lhs);
            }
            self.lexer.next_token()?;

            let mut rhs = self.primary()?;
            if let Some((_, next_prec)) = self.peek_operator()? {
                if prec < next_prec {
                    rhs = self.binop_rhs(prec + 1, rhs)?;
                }
            }

            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn peek_operator(&mut self) -> Result<Option<(char, i32)>> {
        let (tok, _) = self.lexer.peek_token()?;
        Ok(match tok {
            Token::Char(c) => self.precedence.get(*c).map(|prec| (*c, prec)),
            _ => None,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek_tok()? {
            Token::Identifier(name) => {
                self.lexer.next_token()?;
                self.identifier_expr(name)
            }
            Token::Number(n) => {
                self.lexer.next_token()?;
                Ok(Expr::Number(n))
            }
            Token::Char('(') => self.paren_expr(),
            Token::If => self.if_expr(),
            Token::For => self.for_expr(),
            _ => self.unexpected(ParseErr::UnknownToken),
        }
    }

    fn paren_expr(&mut self) -> Result<Expr> {
        self.lexer.next_token()?;
        let e = self.expr()?;
        self.expect(Token::Char(')'), ParseErr::ExpectedCloseParen)?;
        Ok(e)
    }

    fn identifier_expr(&mut self, name: String) -> Result<Expr> {
        if !self.eat_if(Token::Char('('))? {
            return Ok(Expr::Variable(name));
        }

        let mut args = vec![];
        if !self.eat_if(Token::Char(')'))? {
            loop {
                args.push(self.expr()?);
                if self.eat_if(Token::Char(')'))? {
                    break;
                }
                self.expect(Token::Char(','), ParseErr::ExpectedArgListDelimiter)?;
            }
        }
        Ok(Expr::Call { callee: name, args })
    }

    fn if_expr(&mut self) -> Result<Expr> {
        self.lexer.next_token()?;
        let cond = self.expr()?;
        self.expect(Token::Then, ParseErr::ExpectedThen)?;
        let then = self.expr()?;
        self.expect(Token::Else, ParseErr::ExpectedElse)?;
        let else_ = self.expr()?;
        Ok(Expr::If {
            cond: Box::new(cond),
            then: Box::new(then),
            else_: Box::new(else_),
        })
    }

    fn for_expr(&mut self) -> Result<Expr> {
        self.lexer.next_token()?;
        let Token::Identifier(var) = self.peek_tok()? else {
            return self.unexpected(ParseErr::ExpectedForVariable);
        };
        self.lexer.next_token()?;
        self.expect(Token::Char('='), ParseErr::ExpectedForEquals)?;

        let start = self.expr()?;
        self.expect(Token::Char(','), ParseErr::ExpectedForComma)?;
        let end = self.expr()?;

        let step = if self.eat_if(Token::Char(','))? {
            Some(Box::new(self.expr()?))
        } else {
            None
        };

        self.expect(Token::In, ParseErr::ExpectedForIn)?;
        let body = self.expr()?;

        Ok(Expr::For {
            var,
            start: Box::new(start),
            end: Box::new(end),
            step,
            body: Box::new(body),
        })
    }

    fn peek_tok(&mut self) -> Result<Token> {
        Ok(self.lexer.peek_token()?.0.clone())
    }

    fn peek_loc(&mut self) -> Result<Location> {
        Ok(self.lexer.peek_token()?.1)
    }

    /// Consume the next token if it is `expected`.
    fn eat_if(&mut self, expected: Token) -> Result<bool> {
        let (token, _) = self.lexer.peek_token()?;
        if *token == expected {
            self.lexer.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, expected: Token, err: fn(Token) -> ParseErr) -> Result<()> {
        if self.eat_if(expected)? {
            Ok(())
        } else {
            self.unexpected(err)
        }
    }

    /// Report the (unconsumed) next token as unexpected.
    fn unexpected<T>(&mut self, err: fn(Token) -> ParseErr) -> Result<T> {
        let (tok, loc) = self.lexer.peek_token()?.clone();
        parse_err!(loc, err(tok))
    }
}

#[cfg(test)]
mod tests {
    use super::{Parser, PrecedenceTable};
    use crate::{ast::Item, lexer::Lexer};

    fn parse_expr(src: &str, precedence: &PrecedenceTable) -> String {
        let mut lexer = Lexer::new(src.as_bytes());
        let mut parser = Parser::new(&mut lexer, precedence);
        match parser.parse_top_level_item().unwrap() {
            Some(Item::Expression(f)) => f.body.to_string(),
            other => panic!("expected an expression, got {:?}", other),
        }
    }

    #[test]
    fn precedence_climbing() {
        let table = PrecedenceTable::default();
        assert_eq!(parse_expr("1+2*3", &table), "(1 + (2 * 3))");
        assert_eq!(parse_expr("1*2+3", &table), "((1 * 2) + 3)");
        assert_eq!(parse_expr("1-2-3", &table), "((1 - 2) - 3)");
        assert_eq!(parse_expr("a < b + c * d - e", &table), "(a < ((b + (c * d)) - e))");
    }

    #[test]
    fn installed_operators() {
        let mut table = PrecedenceTable::default();
        assert_eq!(parse_expr("a % b", &table), "a");
        table.install('%', 40);
        assert_eq!(parse_expr("a % b + c", &table), "((a % b) + c)");
        table.install('%', 0);
        assert!(table.get('%').is_none());
    }
}
