//! Expression Parser
//!
//! Lowers expression source straight into a [`TraceIR`]. The grammar, from
//! loosest to tightest binding:
//!
//! ```text
//! comparison := additive (("<" | "<=" | ">" | ">=" | "==" | "!=") additive)*
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/" | "%") unary)*
//! unary      := "-" unary | primary
//! primary    := number | ident | ident "(" args ")" | "(" comparison ")"
//! ```
//!
//! Identifiers resolve to node inputs first, then to the constants `pi` and
//! `e`. Each input is loaded at most once per trace.
//!
//! Negations, parentheses and call arguments nest at most [`MAX_NESTING`]
//! levels deep.

use std::collections::HashMap;

use super::ir::{OpCode, Operand, TraceIR};
use crate::error::CompileError;

static END: Token = Token::End;

/// Deepest nesting of negations, groups and calls accepted by [`parse`].
pub const MAX_NESTING: usize = 128;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    LParen,
    RParen,
    Comma,
    End,
}

fn syntax(offset: usize, message: impl Into<String>) -> CompileError {
    CompileError::Syntax {
        offset,
        message: message.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, CompileError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let c = bytes[pos];

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || c == b'.' {
            while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                pos += 1;
            }
            // Exponent, only when digits follow.
            if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
                let mut end = pos + 1;
                if end < bytes.len() && matches!(bytes[end], b'+' | b'-') {
                    end += 1;
                }
                if end < bytes.len() && bytes[end].is_ascii_digit() {
                    pos = end;
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let text = &source[start..pos];
            let value = text
                .parse::<f64>()
                .map_err(|_| syntax(start, format!("invalid number `{text}`")))?;
            tokens.push((start, Token::Number(value)));
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            tokens.push((start, Token::Ident(source[start..pos].to_string())));
            continue;
        }

        let next = bytes.get(pos + 1).copied();
        let (token, len) = match (c, next) {
            (b'<', Some(b'=')) => (Token::Le, 2),
            (b'>', Some(b'=')) => (Token::Ge, 2),
            (b'=', Some(b'=')) => (Token::EqEq, 2),
            (b'!', Some(b'=')) => (Token::Ne, 2),
            (b'<', _) => (Token::Lt, 1),
            (b'>', _) => (Token::Gt, 1),
            (b'+', _) => (Token::Plus, 1),
            (b'-', _) => (Token::Minus, 1),
            (b'*', _) => (Token::Star, 1),
            (b'/', _) => (Token::Slash, 1),
            (b'%', _) => (Token::Percent, 1),
            (b'(', _) => (Token::LParen, 1),
            (b')', _) => (Token::RParen, 1),
            (b',', _) => (Token::Comma, 1),
            _ => {
                let ch = source[start..].chars().next().unwrap_or('?');
                return Err(syntax(start, format!("unexpected character `{ch}`")));
            }
        };
        tokens.push((start, token));
        pos += len;
    }

    tokens.push((source.len(), Token::End));
    Ok(tokens)
}

/// Built-in functions by name.
fn function(name: &str) -> Option<OpCode> {
    Some(match name {
        "abs" => OpCode::Abs,
        "floor" => OpCode::Floor,
        "ceil" => OpCode::Ceil,
        "round" => OpCode::Round,
        "trunc" => OpCode::Trunc,
        "sqrt" => OpCode::Sqrt,
        "min" => OpCode::Min,
        "max" => OpCode::Max,
        _ => return None,
    })
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    ir: TraceIR,
    /// Input slot -> value id of its load.
    loads: HashMap<usize, usize>,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&END, |(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(0, |(o, _)| *o)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), CompileError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(syntax(self.offset(), format!("expected {what}")))
        }
    }

    /// Enter one nesting level. Errors abort the parse, so only the success
    /// path decrements.
    fn descend(&mut self) -> Result<(), CompileError> {
        if self.depth >= MAX_NESTING {
            return Err(syntax(self.offset(), "expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn binary(&mut self, op: OpCode, lhs: usize, rhs: usize) -> usize {
        self.ir.push(op, vec![Operand::Ref(lhs), Operand::Ref(rhs)])
    }

    fn comparison(&mut self) -> Result<usize, CompileError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => OpCode::Lt,
                Token::Le => OpCode::Le,
                Token::Gt => OpCode::Gt,
                Token::Ge => OpCode::Ge,
                Token::EqEq => OpCode::Eq,
                Token::Ne => OpCode::Ne,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.additive()?;
            lhs = self.binary(op, lhs, rhs);
        }
    }

    fn additive(&mut self) -> Result<usize, CompileError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => OpCode::Add,
                Token::Minus => OpCode::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = self.binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<usize, CompileError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => OpCode::Mul,
                Token::Slash => OpCode::Div,
                Token::Percent => OpCode::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = self.binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<usize, CompileError> {
        if *self.peek() == Token::Minus {
            self.advance();
            self.descend()?;
            let value = self.unary()?;
            self.depth -= 1;
            return Ok(self.ir.push(OpCode::Neg, vec![Operand::Ref(value)]));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<usize, CompileError> {
        let offset = self.offset();
        match self.advance() {
            Token::Number(value) => Ok(self.ir.push(OpCode::Const, vec![Operand::Float(value)])),
            Token::LParen => {
                self.descend()?;
                let value = self.comparison()?;
                self.expect(Token::RParen, "`)`")?;
                self.depth -= 1;
                Ok(value)
            }
            Token::Ident(name) if *self.peek() == Token::LParen => {
                self.advance();
                self.call(name)
            }
            Token::Ident(name) => self.variable(&name),
            Token::End => Err(syntax(offset, "unexpected end of expression")),
            other => Err(syntax(offset, format!("unexpected {other:?}"))),
        }
    }

    fn call(&mut self, name: String) -> Result<usize, CompileError> {
        let op = function(&name).ok_or_else(|| CompileError::UnknownFunction(name.clone()))?;

        self.descend()?;
        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                args.push(self.comparison()?);
                if *self.peek() != Token::Comma {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::RParen, "`)` after arguments")?;
        self.depth -= 1;

        if args.len() != op.arity() {
            return Err(CompileError::Arity {
                function: name,
                expected: op.arity(),
                found: args.len(),
            });
        }
        let operands = args.into_iter().map(Operand::Ref).collect();
        Ok(self.ir.push(op, operands))
    }

    fn variable(&mut self, name: &str) -> Result<usize, CompileError> {
        if let Some(slot) = self.ir.slot(name) {
            if let Some(&value) = self.loads.get(&slot) {
                return Ok(value);
            }
            let value = self.ir.push(OpCode::Load, vec![Operand::String(name.to_string())]);
            self.loads.insert(slot, value);
            return Ok(value);
        }

        let constant = match name {
            "pi" => std::f64::consts::PI,
            "e" => std::f64::consts::E,
            _ => return Err(CompileError::UnknownVariable(name.to_string())),
        };
        Ok(self.ir.push(OpCode::Const, vec![Operand::Float(constant)]))
    }
}

/// Parse `source` into a trace whose arguments are `inputs`, in order.
pub fn parse(source: &str, inputs: &[&str]) -> Result<TraceIR, CompileError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
        ir: TraceIR::new(inputs.iter().map(|s| s.to_string()).collect()),
        loads: HashMap::new(),
        depth: 0,
    };

    let output = parser.comparison()?;
    if *parser.peek() != Token::End {
        return Err(syntax(parser.offset(), "unexpected trailing input"));
    }

    parser.ir.output = output;
    Ok(parser.ir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::ir::Op;

    fn opcodes(ir: &TraceIR) -> Vec<OpCode> {
        ir.ops.iter().map(|op: &Op| op.op).collect()
    }

    #[test]
    fn precedence_and_grouping() {
        let ir = parse("a + b * 2", &["a", "b"]).unwrap();
        assert_eq!(
            opcodes(&ir),
            [OpCode::Load, OpCode::Load, OpCode::Const, OpCode::Mul, OpCode::Add]
        );
        assert_eq!(ir.output, 5);

        let ir = parse("(a + b) * 2", &["a", "b"]).unwrap();
        assert_eq!(*opcodes(&ir).last().unwrap(), OpCode::Mul);
    }

    #[test]
    fn repeated_variable_is_loaded_once() {
        let ir = parse("x * x - x", &["x"]).unwrap();
        let loads = ir.ops.iter().filter(|op| op.op == OpCode::Load).count();
        assert_eq!(loads, 1);
    }

    #[test]
    fn inputs_shadow_constants() {
        let ir = parse("e", &["e"]).unwrap();
        assert_eq!(opcodes(&ir), [OpCode::Load]);

        let ir = parse("pi", &[]).unwrap();
        assert_eq!(ir.ops[0].operands, [Operand::Float(std::f64::consts::PI)]);
    }

    #[test]
    fn scientific_notation() {
        let ir = parse("1.5e3", &[]).unwrap();
        assert_eq!(ir.ops[0].operands, [Operand::Float(1500.0)]);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            parse("speed * 2", &["t"]),
            Err(CompileError::UnknownVariable("speed".into()))
        );
        assert_eq!(
            parse("sin(t)", &["t"]),
            Err(CompileError::UnknownFunction("sin".into()))
        );
    }

    #[test]
    fn arity_is_checked() {
        assert_eq!(
            parse("min(1)", &[]),
            Err(CompileError::Arity {
                function: "min".into(),
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn syntax_errors_carry_offsets() {
        match parse("1 +", &[]) {
            Err(CompileError::Syntax { offset, .. }) => assert_eq!(offset, 3),
            other => panic!("expected syntax error, got {other:?}"),
        }
        match parse("(1 + 2", &[]) {
            Err(CompileError::Syntax { offset, .. }) => assert_eq!(offset, 6),
            other => panic!("expected syntax error, got {other:?}"),
        }
        assert!(matches!(parse("1 2", &[]), Err(CompileError::Syntax { offset: 2, .. })));
        assert!(matches!(parse("a # b", &["a", "b"]), Err(CompileError::Syntax { offset: 2, .. })));
        assert!(matches!(parse("", &[]), Err(CompileError::Syntax { .. })));
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = |open: &str, close: &str, levels: usize| {
            format!("{}1{}", open.repeat(levels), close.repeat(levels))
        };

        assert!(parse(&deep("(", ")", MAX_NESTING), &[]).is_ok());
        assert!(parse(&deep("abs(", ")", MAX_NESTING), &[]).is_ok());
        assert!(parse(&deep("-", "", MAX_NESTING), &[]).is_ok());

        for source in [
            deep("(", ")", 10_000),
            deep("abs(", ")", 10_000),
            deep("-", "", 10_000),
            "(".repeat(10_000),
        ] {
            assert!(matches!(parse(&source, &[]), Err(CompileError::Syntax { .. })));
        }
    }

    #[test]
    fn sibling_groups_do_not_accumulate_depth() {
        let source = vec!["(1)"; MAX_NESTING * 2].join(" + ");
        assert!(parse(&source, &[]).is_ok());
    }
}
