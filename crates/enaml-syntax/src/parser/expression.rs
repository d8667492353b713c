//! Precedence-climbing parser for the expression language.
//!
//! Precedence, loosest first: lambda, conditional, `or`, `and`, `not`,
//! comparisons, `|`, `^`, `&`, shifts, `+ -`, `* / // %`, unary, `**`,
//! then trailers (calls, subscripts, attribute access).

use super::{PResult, Parser};
use crate::error::SyntaxError;
use crate::expr::{BinOp, BoolOp, CmpOp, Expr, ExprKind, UnaryOp};
use crate::lexer::{Keyword, Op, TokenKind};

impl Parser {
    /// The lexer lexes maximal runs of operator characters, so `a*-b`
    /// arrives as one `*-` token. Inside expressions such a run is split
    /// back into standard operators when it decomposes cleanly.
    pub(super) fn split_operator_at(&mut self, index: usize) {
        let Some(tok) = self.tokens.get(index) else { return };
        let TokenKind::Operator(text) = &tok.kind else { return };

        let mut parts = Vec::new();
        let mut rest = text.as_str();
        while !rest.is_empty() {
            let Some(len) = (1..=rest.len().min(3))
                .rev()
                .find(|n| rest.is_char_boundary(*n) && Op::from_symbol(&rest[..*n]).is_some())
            else {
                return;
            };
            parts.extend(Op::from_symbol(&rest[..len]));
            rest = &rest[len..];
        }

        let template = tok.clone();
        let replacement: Vec<_> = parts
            .into_iter()
            .enumerate()
            .map(|(i, op)| {
                let mut t = template.clone();
                t.kind = TokenKind::Op(op);
                t.at_line_start = template.at_line_start && i == 0;
                t
            })
            .collect();
        self.tokens.splice(index..=index, replacement);
    }

    fn peek_expr(&mut self) -> &TokenKind {
        self.split_operator_at(self.pos);
        self.peek()
    }

    fn at_op(&mut self, op: Op) -> bool {
        self.peek_expr() == &TokenKind::Op(op)
    }

    fn node(&self, kind: ExprKind, line: usize) -> Expr {
        Expr::new(kind, line, 0)
    }

    // ── Conditional / lambda / boolean ────────────────────────────────────

    pub(super) fn parse_test(&mut self) -> PResult<Expr> {
        if self.at_keyword(Keyword::Lambda) {
            return self.parse_lambda();
        }
        let line = self.line();
        let body = self.parse_or()?;
        if !self.at_keyword(Keyword::If) {
            return Ok(body);
        }
        self.advance();
        let test = self.parse_or()?;
        self.expect(&TokenKind::Keyword(Keyword::Else))?;
        let orelse = self.parse_test()?;
        Ok(self.node(
            ExprKind::IfExp { test: Box::new(test), body: Box::new(body), orelse: Box::new(orelse) },
            line,
        ))
    }

    fn parse_lambda(&mut self) -> PResult<Expr> {
        let line = self.line();
        self.advance(); // consume `lambda`
        let mut params = Vec::new();
        while let TokenKind::Name(_) = self.peek() {
            params.push(self.expect_name()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_op(Op::Colon)?;
        let body = self.parse_test()?;
        Ok(self.node(ExprKind::Lambda { params, body: Box::new(body) }, line))
    }

    fn parse_bool(
        &mut self,
        kw: Keyword,
        op: BoolOp,
        next: fn(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let line = self.line();
        let first = next(self)?;
        if !self.at_keyword(kw) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.at_keyword(kw) {
            self.advance();
            values.push(next(self)?);
        }
        Ok(self.node(ExprKind::BoolOp { op, values }, line))
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        self.parse_bool(Keyword::Or, BoolOp::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        self.parse_bool(Keyword::And, BoolOp::And, Self::parse_not)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.at_keyword(Keyword::Not) {
            let line = self.line();
            self.advance();
            let operand = self.parse_not()?;
            return Ok(self.node(ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) }, line));
        }
        self.parse_comparison()
    }

    // ── Comparisons ───────────────────────────────────────────────────────

    fn comparison_op(&mut self) -> Option<CmpOp> {
        self.split_operator_at(self.pos);
        let followed_by = |p: &Self, kw: Keyword| p.peek_ahead(1) == &TokenKind::Keyword(kw);
        let (op, width) = match self.peek() {
            TokenKind::Op(Op::EqEqual) => (CmpOp::Eq, 1),
            TokenKind::Op(Op::NotEqual) => (CmpOp::NotEq, 1),
            TokenKind::Op(Op::Less) => (CmpOp::Lt, 1),
            TokenKind::Op(Op::LessEqual) => (CmpOp::LtE, 1),
            TokenKind::Op(Op::Greater) => (CmpOp::Gt, 1),
            TokenKind::Op(Op::GreaterEqual) => (CmpOp::GtE, 1),
            TokenKind::Keyword(Keyword::In) => (CmpOp::In, 1),
            TokenKind::Keyword(Keyword::Not) if followed_by(self, Keyword::In) => (CmpOp::NotIn, 2),
            TokenKind::Keyword(Keyword::Is) if followed_by(self, Keyword::Not) => (CmpOp::IsNot, 2),
            TokenKind::Keyword(Keyword::Is) => (CmpOp::Is, 1),
            _ => return None,
        };
        self.pos += width;
        Some(op)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let line = self.line();
        let left = self.parse_binary(0)?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.comparison_op() {
            ops.push(op);
            comparators.push(self.parse_binary(0)?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(self.node(ExprKind::Compare { left: Box::new(left), ops, comparators }, line))
    }

    // ── Binary operators ──────────────────────────────────────────────────

    /// Binary operator levels from loosest to tightest.
    const LEVELS: &'static [&'static [(Op, BinOp)]] = &[
        &[(Op::VBar, BinOp::BitOr)],
        &[(Op::Circumflex, BinOp::BitXor)],
        &[(Op::Amper, BinOp::BitAnd)],
        &[(Op::LeftShift, BinOp::LShift), (Op::RightShift, BinOp::RShift)],
        &[(Op::Plus, BinOp::Add), (Op::Minus, BinOp::Sub)],
        &[
            (Op::Star, BinOp::Mul),
            (Op::Slash, BinOp::Div),
            (Op::DoubleSlash, BinOp::FloorDiv),
            (Op::Percent, BinOp::Mod),
        ],
    ];

    fn parse_binary(&mut self, level: usize) -> PResult<Expr> {
        let Some(ops) = Self::LEVELS.get(level) else {
            return self.parse_unary();
        };
        let line = self.line();
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let found = match self.peek_expr() {
                TokenKind::Op(tok) => ops.iter().find(|(op, _)| op == tok).map(|(_, b)| *b),
                _ => None,
            };
            let Some(op) = found else { break };
            self.advance();
            let right = self.parse_binary(level + 1)?;
            left = self.node(
                ExprKind::Binary { left: Box::new(left), op, right: Box::new(right) },
                line,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.peek_expr() {
            TokenKind::Op(Op::Minus) => UnaryOp::Neg,
            TokenKind::Op(Op::Plus) => UnaryOp::Pos,
            TokenKind::Op(Op::Tilde) => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        let line = self.line();
        self.advance();
        let operand = self.parse_unary()?;
        Ok(self.node(ExprKind::Unary { op, operand: Box::new(operand) }, line))
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let line = self.line();
        let base = self.parse_trailers()?;
        if !self.at_op(Op::DoubleStar) {
            return Ok(base);
        }
        self.advance();
        // Right-associative, and binds tighter than a unary minus on its left.
        let exponent = self.parse_unary()?;
        Ok(self.node(
            ExprKind::Binary { left: Box::new(base), op: BinOp::Pow, right: Box::new(exponent) },
            line,
        ))
    }

    // ── Trailers ──────────────────────────────────────────────────────────

    fn parse_trailers(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            let line = self.line();
            match self.peek_expr() {
                TokenKind::Op(Op::Dot) => {
                    self.advance();
                    let attr = self.expect_name()?;
                    expr = self.node(ExprKind::Attribute { value: Box::new(expr), attr }, line);
                }
                TokenKind::LSqb => {
                    self.advance();
                    let index = self.parse_test()?;
                    self.expect(&TokenKind::RSqb)?;
                    expr = self.node(
                        ExprKind::Subscript { value: Box::new(expr), index: Box::new(index) },
                        line,
                    );
                }
                TokenKind::LPar => {
                    self.advance();
                    let (args, keywords) = self.parse_call_args()?;
                    expr = self.node(ExprKind::Call { func: Box::new(expr), args, keywords }, line);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_call_args(&mut self) -> PResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = Vec::new();
        let mut keywords: Vec<(String, Expr)> = Vec::new();
        while self.peek_expr() != &TokenKind::RPar {
            self.split_operator_at(self.pos + 1);
            if let (TokenKind::Name(name), TokenKind::Op(Op::Equal)) = (self.peek(), self.peek_ahead(1)) {
                let name = name.clone();
                if keywords.iter().any(|(k, _)| *k == name) {
                    return Err(self.err(format!("keyword argument repeated: `{name}`")));
                }
                self.pos += 2;
                keywords.push((name, self.parse_test()?));
            } else {
                if !keywords.is_empty() {
                    return Err(self.err("non-keyword arg after keyword arg"));
                }
                args.push(self.parse_test()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RPar)?;
        Ok((args, keywords))
    }

    // ── Atoms ─────────────────────────────────────────────────────────────

    fn parse_atom(&mut self) -> PResult<Expr> {
        let line = self.line();
        match self.peek_expr().clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(self.node(ExprKind::Name(name), line))
            }
            TokenKind::Number(text) => {
                self.advance();
                let kind = parse_number(&text).map_err(|msg| SyntaxError::syntax(msg, line))?;
                Ok(self.node(kind, line))
            }
            TokenKind::Str(first) => {
                self.advance();
                let mut text = first;
                // Adjacent literals concatenate.
                while let TokenKind::Str(next) = self.peek() {
                    text.push_str(next);
                    self.advance();
                }
                Ok(self.node(ExprKind::Str(text), line))
            }
            TokenKind::LPar => {
                self.advance();
                if self.eat(&TokenKind::RPar) {
                    return Ok(self.node(ExprKind::Tuple(Vec::new()), line));
                }
                let first = self.parse_test()?;
                if self.eat(&TokenKind::RPar) {
                    return Ok(first);
                }
                self.expect(&TokenKind::Comma)?;
                let mut items = vec![first];
                items.extend(self.parse_items(&TokenKind::RPar)?);
                Ok(self.node(ExprKind::Tuple(items), line))
            }
            TokenKind::LSqb => {
                self.advance();
                let items = self.parse_items(&TokenKind::RSqb)?;
                Ok(self.node(ExprKind::List(items), line))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut pairs = Vec::new();
                while self.peek_expr() != &TokenKind::RBrace {
                    let key = self.parse_test()?;
                    self.expect_op(Op::Colon)?;
                    let value = self.parse_test()?;
                    pairs.push((key, value));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace)?;
                Ok(self.node(ExprKind::Dict(pairs), line))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Comma-separated expressions up to and including `close`; a trailing
    /// comma is allowed.
    fn parse_items(&mut self, close: &TokenKind) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        while self.peek_expr() != close {
            items.push(self.parse_test()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }
}

fn parse_number(text: &str) -> Result<ExprKind, String> {
    let invalid = || format!("invalid number literal `{text}`");
    if text.ends_with(['j', 'J']) {
        return Err(format!("complex literal `{text}` is not supported"));
    }
    let digits = text.trim_end_matches(['l', 'L']);
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map(ExprKind::Int).map_err(|_| invalid());
    }
    if digits.contains(['.', 'e', 'E']) {
        return digits.parse::<f64>().map(ExprKind::Float).map_err(|_| invalid());
    }
    // Python 2 style octal, `017`.
    if digits.len() > 1 && digits.starts_with('0') {
        return i64::from_str_radix(&digits[1..], 8).map(ExprKind::Int).map_err(|_| invalid());
    }
    digits.parse::<i64>().map(ExprKind::Int).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use crate::expr::{BinOp, CmpOp, Expr, ExprKind, UnaryOp};
    use crate::parser::parse_expr;
    use pretty_assertions::assert_eq;

    fn kind(src: &str) -> ExprKind {
        parse_expr(src).unwrap().kind
    }

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::new(ExprKind::Name(n.into()), 1, 0))
    }

    fn int(v: i64) -> Box<Expr> {
        Box::new(Expr::new(ExprKind::Int(v), 1, 0))
    }

    // ── Literals ──────────────────────────────────────────────────────────

    #[test]
    fn numbers() {
        assert_eq!(kind("42"), ExprKind::Int(42));
        assert_eq!(kind("0x10"), ExprKind::Int(16));
        assert_eq!(kind("2.5"), ExprKind::Float(2.5));
        assert_eq!(kind("1e3"), ExprKind::Float(1000.0));
        assert_eq!(kind("10L"), ExprKind::Int(10));
    }

    #[test]
    fn complex_numbers_are_rejected() {
        assert!(parse_expr("3j").is_err());
    }

    #[test]
    fn adjacent_strings_concatenate() {
        assert_eq!(kind("'a' \"b\""), ExprKind::Str("ab".into()));
    }

    #[test]
    fn displays() {
        assert!(matches!(kind("[1, 2, 3,]"), ExprKind::List(v) if v.len() == 3));
        assert!(matches!(kind("(1,)"), ExprKind::Tuple(v) if v.len() == 1));
        assert!(matches!(kind("()"), ExprKind::Tuple(v) if v.is_empty()));
        assert!(matches!(kind("{'a': 1, 'b': 2}"), ExprKind::Dict(v) if v.len() == 2));
        assert_eq!(kind("(7)"), ExprKind::Int(7));
    }

    // ── Precedence ────────────────────────────────────────────────────────

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            kind("a + b * 2"),
            ExprKind::Binary {
                left: name("a"),
                op: BinOp::Add,
                right: Box::new(Expr::new(
                    ExprKind::Binary { left: name("b"), op: BinOp::Mul, right: int(2) },
                    1,
                    0,
                )),
            }
        );
    }

    #[test]
    fn power_binds_tighter_than_unary_minus() {
        let ExprKind::Unary { op, operand } = kind("-2 ** 2") else { panic!() };
        assert_eq!(op, UnaryOp::Neg);
        assert!(matches!(operand.kind, ExprKind::Binary { op: BinOp::Pow, .. }));
    }

    #[test]
    fn fused_operator_runs_are_split() {
        assert_eq!(
            kind("a*-b"),
            ExprKind::Binary {
                left: name("a"),
                op: BinOp::Mul,
                right: Box::new(Expr::new(ExprKind::Unary { op: UnaryOp::Neg, operand: name("b") }, 1, 0)),
            }
        );
    }

    #[test]
    fn chained_comparison() {
        let ExprKind::Compare { ops, comparators, .. } = kind("0 <= x < 10") else { panic!() };
        assert_eq!(ops, vec![CmpOp::LtE, CmpOp::Lt]);
        assert_eq!(comparators.len(), 2);
    }

    #[test]
    fn membership_and_identity() {
        let ExprKind::Compare { ops, .. } = kind("a not in b") else { panic!() };
        assert_eq!(ops, vec![CmpOp::NotIn]);
        let ExprKind::Compare { ops, .. } = kind("a is not None") else { panic!() };
        assert_eq!(ops, vec![CmpOp::IsNot]);
    }

    #[test]
    fn conditional_and_boolean() {
        assert!(matches!(kind("a if b and c else d"), ExprKind::IfExp { .. }));
        assert!(matches!(kind("not a or b"), ExprKind::BoolOp { .. }));
    }

    #[test]
    fn lambda() {
        let ExprKind::Lambda { params, .. } = kind("lambda x, y: x + y") else { panic!() };
        assert_eq!(params, vec!["x", "y"]);
    }

    // ── Trailers ──────────────────────────────────────────────────────────

    #[test]
    fn call_with_keywords() {
        let ExprKind::Call { args, keywords, .. } = kind("f(1, key=-2)") else { panic!() };
        assert_eq!(args.len(), 1);
        assert_eq!(keywords[0].0, "key");
    }

    #[test]
    fn attribute_chain_and_subscript() {
        let ExprKind::Attribute { value, attr } = kind("a.items[0].text") else { panic!() };
        assert_eq!(attr, "text");
        assert!(matches!(value.kind, ExprKind::Subscript { .. }));
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        assert!(parse_expr("a b").is_err());
    }
}
