use std::collections::HashMap;

use crate::ast::{ASTNode, Expression, Function, Prototype};
use crate::lexer::{Lexer, Token};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParserError {
    #[error("unknown token when expecting an expression, found {0}")]
    ExpectedExpression(Token),
    #[error("expected ')', found {0}")]
    ExpectedCloseParen(Token),
    #[error("expected ',' or ')' in argument list, found {0}")]
    ExpectedArgumentSeparator(Token),
    #[error("expected function name in prototype, found {0}")]
    ExpectedFunctionName(Token),
    #[error("expected '(' in prototype, found {0}")]
    ExpectedPrototypeParen(Token),
    #[error("expected parameter name in prototype, found {0}")]
    ExpectedParameterName(Token),
    #[error("expected ')' or ',' in prototype, found {0}")]
    ExpectedParameterSeparator(Token),
    #[error("expected '{{' in function body, found {0}")]
    ExpectedBodyOpen(Token),
    #[error("expected '}}' in function body, found {0}")]
    ExpectedBodyClose(Token),
}

pub type PartialParseResult = Result<Expression, ParserError>;

/// Recursive-descent parser for top-level units, precedence climbing for
/// binary expressions. The parser keeps no state between units other than
/// its operator table; the token stream lives in the `Lexer` handed to each
/// call.
#[derive(Debug, Clone)]
pub struct Parser {
    pub operator_precedence: HashMap<char, i32>,
}

impl std::default::Default for Parser {
    fn default() -> Self {
        let mut operator_precedence = HashMap::new();
        operator_precedence.insert('<', 10);
        operator_precedence.insert('+', 20);
        operator_precedence.insert('-', 20);
        operator_precedence.insert('*', 40);
        Self {
            operator_precedence,
        }
    }
}

impl Parser {
    /// precedence of `op` as an infix operator, -1 when it is not one
    pub fn precedence(&self, op: char) -> i32 {
        if !op.is_ascii() {
            return -1;
        }
        self.operator_precedence.get(&op).copied().unwrap_or(-1)
    }

    fn current_precedence<I: Iterator<Item = char>>(&self, lexer: &Lexer<I>) -> i32 {
        match lexer.current() {
            Token::Char(op) => self.precedence(*op),
            _ => -1,
        }
    }

    fn expect<I: Iterator<Item = char>>(
        lexer: &mut Lexer<I>,
        expected: char,
        error: fn(Token) -> ParserError,
    ) -> Result<(), ParserError> {
        if *lexer.current() != Token::Char(expected) {
            return Err(error(lexer.current().clone()));
        }
        lexer.advance();
        Ok(())
    }

    fn parse_number<I: Iterator<Item = char>>(&self, lexer: &mut Lexer<I>) -> PartialParseResult {
        match lexer.current_number() {
            Some(num) => {
                lexer.advance();
                Ok(Expression::Literal(num))
            }
            None => Err(ParserError::ExpectedExpression(lexer.current().clone())),
        }
    }

    fn parse_nested<I: Iterator<Item = char>>(&self, lexer: &mut Lexer<I>) -> PartialParseResult {
        lexer.advance(); // eat '('
        let res = self.parse_expression(lexer)?;
        Self::expect(lexer, ')', ParserError::ExpectedCloseParen)?;
        Ok(res)
    }

    fn parse_identifier<I: Iterator<Item = char>>(
        &self,
        lexer: &mut Lexer<I>,
    ) -> PartialParseResult {
        let ident = match lexer.current_identifier() {
            Some(ident) => ident.to_string(),
            None => return Err(ParserError::ExpectedExpression(lexer.current().clone())),
        };
        lexer.advance();

        if *lexer.current() != Token::Char('(') {
            return Ok(Expression::Variable(ident));
        }
        lexer.advance();

        let mut args = Vec::new();
        if *lexer.current() != Token::Char(')') {
            loop {
                args.push(self.parse_expression(lexer)?);

                match lexer.current() {
                    Token::Char(')') => break,
                    Token::Char(',') => {
                        lexer.advance();
                    }
                    tok => return Err(ParserError::ExpectedArgumentSeparator(tok.clone())),
                }
            }
        }
        lexer.advance(); // eat ')'

        Ok(Expression::Call(ident, args))
    }

    fn parse_primary<I: Iterator<Item = char>>(&self, lexer: &mut Lexer<I>) -> PartialParseResult {
        match lexer.current() {
            Token::Ident(_) => self.parse_identifier(lexer),
            Token::Number(_) => self.parse_number(lexer),
            Token::Char('(') => self.parse_nested(lexer),
            tok => Err(ParserError::ExpectedExpression(tok.clone())),
        }
    }

    fn parse_rhs<I: Iterator<Item = char>>(
        &self,
        lexer: &mut Lexer<I>,
        expr_precedence: i32,
        mut lhs: Expression,
    ) -> PartialParseResult {
        loop {
            let (operator, precedence) = match lexer.current() {
                Token::Char(op) => (*op, self.precedence(*op)),
                _ => return Ok(lhs),
            };
            if precedence < expr_precedence {
                return Ok(lhs);
            }
            lexer.advance();

            let mut rhs = self.parse_primary(lexer)?;

            // a tighter operator after rhs takes rhs as its own lhs
            if precedence < self.current_precedence(lexer) {
                rhs = self.parse_rhs(lexer, precedence + 1, rhs)?;
            }

            lhs = Expression::Binary(operator, Box::new(lhs), Box::new(rhs));
        }
    }

    pub fn parse_expression<I: Iterator<Item = char>>(
        &self,
        lexer: &mut Lexer<I>,
    ) -> PartialParseResult {
        let lhs = self.parse_primary(lexer)?;
        self.parse_rhs(lexer, 1, lhs)
    }

    fn parse_prototype<I: Iterator<Item = char>>(
        &self,
        lexer: &mut Lexer<I>,
    ) -> Result<Prototype, ParserError> {
        let name = match lexer.current_identifier() {
            Some(name) => name.to_string(),
            None => return Err(ParserError::ExpectedFunctionName(lexer.current().clone())),
        };
        lexer.advance();

        Self::expect(lexer, '(', ParserError::ExpectedPrototypeParen)?;

        let mut args = Vec::new();
        if *lexer.current() != Token::Char(')') {
            loop {
                match lexer.current_identifier() {
                    Some(arg) => args.push(arg.to_string()),
                    None => {
                        return Err(ParserError::ExpectedParameterName(lexer.current().clone()))
                    }
                }
                lexer.advance();

                match lexer.current() {
                    Token::Char(')') => break,
                    Token::Char(',') => {
                        lexer.advance();
                    }
                    tok => return Err(ParserError::ExpectedParameterSeparator(tok.clone())),
                }
            }
        }
        lexer.advance(); // eat ')'

        Ok(Prototype::new(name, args))
    }

    fn parse_definition<I: Iterator<Item = char>>(
        &self,
        lexer: &mut Lexer<I>,
    ) -> Result<Function, ParserError> {
        lexer.advance(); // eat 'def'
        let prototype = self.parse_prototype(lexer)?;
        Self::expect(lexer, '{', ParserError::ExpectedBodyOpen)?;
        let body = self.parse_expression(lexer)?;
        Self::expect(lexer, '}', ParserError::ExpectedBodyClose)?;
        Ok(Function { prototype, body })
    }

    fn parse_extern<I: Iterator<Item = char>>(
        &self,
        lexer: &mut Lexer<I>,
    ) -> Result<Prototype, ParserError> {
        lexer.advance(); // eat 'extern'
        self.parse_prototype(lexer)
    }

    fn parse_toplevel<I: Iterator<Item = char>>(
        &self,
        lexer: &mut Lexer<I>,
    ) -> Result<Function, ParserError> {
        let body = self.parse_expression(lexer)?;
        Ok(Function {
            prototype: Prototype::anonymous(),
            body,
        })
    }

    /// Parses one top-level unit starting at the lexer's current token.
    ///
    /// A lone `;` is consumed and yields `None`. On error nothing is returned
    /// and the lexer is left on the offending token.
    pub fn parse_top<I: Iterator<Item = char>>(
        &self,
        lexer: &mut Lexer<I>,
    ) -> Result<Option<ASTNode>, ParserError> {
        match lexer.current() {
            Token::Char(';') => {
                lexer.advance();
                Ok(None)
            }
            Token::Def => Ok(Some(ASTNode::Function(self.parse_definition(lexer)?))),
            Token::Extern => Ok(Some(ASTNode::Extern(self.parse_extern(lexer)?))),
            _ => Ok(Some(ASTNode::Function(self.parse_toplevel(lexer)?))),
        }
    }
}
