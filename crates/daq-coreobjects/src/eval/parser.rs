//! Recursive-descent parser for property expressions.
//!
//! Precedence, lowest first: `||`, `&&`, comparisons, `+ -`, `* /`, unary.

use super::ast::{BinaryOp, Expr, Function, UnaryOp, ValueAccessor};
use super::tokenizer::{tokenize, Spanned, Token};
use crate::error::{CoreObjectsError, CoreResult};
use crate::value::Value;

/// Hard nesting cap protecting the parser stack. Per-object limits from
/// `CoreObjectsConfig::max_expression_depth` are applied at evaluation.
pub const PARSE_DEPTH_LIMIT: usize = 256;

/// Parse a complete expression.
pub fn parse(input: &str) -> CoreResult<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        input,
        depth: 0,
    };
    let expr = parser.parse_or()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(parser.error(&format!("unexpected trailing token {:?}", other))),
    }
}

struct Parser<'a> {
    tokens: Vec<Spanned>,
    cursor: usize,
    input: &'a str,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.cursor)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        token
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map(|s| s.position)
            .unwrap_or(self.input.len())
    }

    fn error(&self, message: &str) -> CoreObjectsError {
        CoreObjectsError::ParseFailed(format!(
            "{} at position {} in '{}'",
            message,
            self.position(),
            self.input
        ))
    }

    fn expect(&mut self, expected: Token) -> CoreResult<()> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}, found {:?}", expected, self.peek())))
        }
    }

    fn enter(&mut self) -> CoreResult<()> {
        self.depth += 1;
        if self.depth > PARSE_DEPTH_LIMIT {
            return Err(self.error("expression nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Each operator in a left-associative chain nests the tree one level
    /// deeper, so it counts against the same limit as parentheses.
    fn link(&mut self, links: &mut usize) -> CoreResult<()> {
        self.enter()?;
        *links += 1;
        Ok(())
    }

    fn unlink(&mut self, links: usize) {
        self.depth -= links;
    }

    fn parse_or(&mut self) -> CoreResult<Expr> {
        self.enter()?;
        let mut lhs = self.parse_and()?;
        let mut links = 0;
        while *self.peek() == Token::LogicalOr {
            self.advance();
            self.link(&mut links)?;
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        self.unlink(links);
        self.leave();
        Ok(lhs)
    }

    fn parse_and(&mut self) -> CoreResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        let mut links = 0;
        while *self.peek() == Token::LogicalAnd {
            self.advance();
            self.link(&mut links)?;
            let rhs = self.parse_comparison()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        self.unlink(links);
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> CoreResult<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Token::Equal => BinaryOp::Equal,
            Token::NotEqual => BinaryOp::NotEqual,
            Token::Less => BinaryOp::Less,
            Token::LessEq => BinaryOp::LessEq,
            Token::Greater => BinaryOp::Greater,
            Token::GreaterEq => BinaryOp::GreaterEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> CoreResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => {
                    self.unlink(links);
                    return Ok(lhs);
                }
            };
            self.advance();
            self.link(&mut links)?;
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> CoreResult<Expr> {
        let mut lhs = self.parse_unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                _ => {
                    self.unlink(links);
                    return Ok(lhs);
                }
            };
            self.advance();
            self.link(&mut links)?;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> CoreResult<Expr> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Negate,
            Token::Not => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> CoreResult<Expr> {
        match self.advance() {
            Token::Integer(i) => Ok(Expr::Literal(Value::Int(i))),
            Token::Number(f) => Ok(Expr::Literal(Value::Float(f))),
            Token::String(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Dollar { path, suffix } => {
                let accessor = match suffix.as_deref() {
                    None | Some("Value") => ValueAccessor::Value,
                    Some("SelectedValue") => ValueAccessor::SelectedValue,
                    Some(other) => {
                        return Err(self.error(&format!("unknown value accessor ':{}'", other)))
                    }
                };
                Ok(Expr::PropertyValue { path, accessor })
            }
            Token::PercentRef { name, suffix } => {
                let as_value = match suffix.as_deref() {
                    None => false,
                    Some("Value") => true,
                    Some(other) => {
                        return Err(
                            self.error(&format!("unknown reference accessor ':{}'", other))
                        )
                    }
                };
                Ok(Expr::PropertyReference { name, as_value })
            }
            Token::LeftParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Token::LeftBracket => {
                let items = self.parse_arguments(Token::RightBracket)?;
                Ok(Expr::List(items))
            }
            Token::Identifier(name) => match name.as_str() {
                "True" | "true" => Ok(Expr::Literal(Value::Bool(true))),
                "False" | "false" => Ok(Expr::Literal(Value::Bool(false))),
                "value" => Ok(Expr::ProposedValue),
                _ => {
                    let function = Function::from_name(&name)
                        .ok_or_else(|| self.error(&format!("unknown identifier '{}'", name)))?;
                    self.expect(Token::LeftParen)?;
                    let args = self.parse_arguments(Token::RightParen)?;
                    let (min, max) = function.arity();
                    if args.len() < min || args.len() > max {
                        return Err(self.error(&format!(
                            "'{}' called with {} arguments",
                            name,
                            args.len()
                        )));
                    }
                    Ok(Expr::Call { function, args })
                }
            },
            Token::Eof => Err(self.error("unexpected end of expression")),
            other => Err(self.error(&format!("unexpected token {:?}", other))),
        }
    }

    /// Comma separated expressions up to (and consuming) `close`.
    fn parse_arguments(&mut self, close: Token) -> CoreResult<Vec<Expr>> {
        let mut items = Vec::new();
        if *self.peek() == close {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            match self.advance() {
                Token::Comma => continue,
                token if token == close => return Ok(items),
                other => {
                    return Err(self.error(&format!("expected ',' or {:?}, found {:?}", close, other)))
                }
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            binary(
                BinaryOp::Add,
                Expr::Literal(Value::Int(1)),
                binary(
                    BinaryOp::Multiply,
                    Expr::Literal(Value::Int(2)),
                    Expr::Literal(Value::Int(3))
                )
            )
        );
    }

    #[test]
    fn test_logical_binds_looser_than_comparison() {
        let expr = parse("value > 5 && value < 10").unwrap();
        match expr {
            Expr::Binary { op, .. } => assert_eq!(op, BinaryOp::And),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function_call_and_list() {
        let expr = parse("if($Flag, [1, 2], [])").unwrap();
        match expr {
            Expr::Call { function, args } => {
                assert_eq!(function, Function::If);
                assert_eq!(args.len(), 3);
                assert_eq!(args[2], Expr::List(vec![]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reference_forms() {
        assert_eq!(
            parse("%Target").unwrap(),
            Expr::PropertyReference {
                name: "Target".into(),
                as_value: false
            }
        );
        assert_eq!(
            parse("$Mode:SelectedValue").unwrap(),
            Expr::PropertyValue {
                path: "Mode".into(),
                accessor: ValueAccessor::SelectedValue
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("1 +").is_err());
        assert!(parse("(1 + 2").is_err());
        assert!(parse("foo(1)").is_err());
        assert!(parse("if(1, 2)").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("$A:Bogus").is_err());
        let err = parse("1 +").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ParseFailed);
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(PARSE_DEPTH_LIMIT + 1), ")".repeat(PARSE_DEPTH_LIMIT + 1));
        assert!(parse(&deep).is_err());
        assert!(parse("((((1))))").is_ok());
    }

    #[test]
    fn test_long_operator_chains_are_bounded() {
        for op in ["+", "*", "&&", "||"] {
            let chain = format!("1{}", format!("{}1", op).repeat(200_000));
            let err = parse(&chain).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::ParseFailed, "{}", op);
        }
        let short = format!("1{}", "+1".repeat(100));
        assert_eq!(parse(&short).unwrap().depth(), 101);
    }
}
