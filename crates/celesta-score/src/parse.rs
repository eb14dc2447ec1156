//! Recursive-descent parser for the CelestaSQL expression subset.
//!
//! Parses exactly the canonical form [`Expr`] renders, so that
//! `parse_expr(e.csql())` reproduces `e` for any tree the parser itself can
//! produce. Chains of one operator collect into a single node with an
//! operand list; mixed chains group left-associatively.

use celesta_error::{CelestaError, CelestaResult};

use crate::expr::{Expr, LogicalOp, RelopKind, TermOp};
use crate::lex::{tokenize, Token, TokenKind};

/// Parse a single expression; trailing input is an error.
pub fn parse_expr(source: &str) -> CelestaResult<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    parser.expect(&TokenKind::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if kind != TokenKind::Eof {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> CelestaResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{kind:?}")))
        }
    }

    fn unexpected(&self, wanted: &str) -> CelestaError {
        let token = &self.tokens[self.pos];
        CelestaError::parse(format!(
            "expected {wanted}, found {:?} at offset {}",
            token.kind, token.pos
        ))
    }

    fn or_expr(&mut self) -> CelestaResult<Expr> {
        let first = self.and_expr()?;
        let mut operands = vec![first];
        while self.eat(&TokenKind::Or) {
            operands.push(self.and_expr()?);
        }
        if operands.len() == 1 {
            Ok(operands.pop().expect("one operand"))
        } else {
            Expr::logical(LogicalOp::Or, operands)
        }
    }

    fn and_expr(&mut self) -> CelestaResult<Expr> {
        let first = self.not_expr()?;
        let mut operands = vec![first];
        while self.eat(&TokenKind::And) {
            operands.push(self.not_expr()?);
        }
        if operands.len() == 1 {
            Ok(operands.pop().expect("one operand"))
        } else {
            Expr::logical(LogicalOp::And, operands)
        }
    }

    fn not_expr(&mut self) -> CelestaResult<Expr> {
        if self.eat(&TokenKind::Not) {
            let inner = self.not_expr()?;
            Expr::not(inner)
        } else {
            self.predicate()
        }
    }

    /// A term, optionally followed by one comparison-family suffix.
    fn predicate(&mut self) -> CelestaResult<Expr> {
        let left = self.additive()?;

        let relop = match self.peek() {
            TokenKind::Gt => Some(RelopKind::Gt),
            TokenKind::Lt => Some(RelopKind::Ls),
            TokenKind::GtEq => Some(RelopKind::GtEq),
            TokenKind::LtEq => Some(RelopKind::LsEq),
            TokenKind::NtEq => Some(RelopKind::NtEq),
            TokenKind::Eq => Some(RelopKind::Eq),
            TokenKind::Like => Some(RelopKind::Like),
            _ => None,
        };
        if let Some(op) = relop {
            self.advance();
            let right = self.additive()?;
            return Ok(Expr::Relop {
                left: Box::new(left),
                right: Box::new(right),
                op,
            });
        }

        if self.eat(&TokenKind::In) {
            self.expect(&TokenKind::LParen)?;
            let mut operands = vec![self.additive()?];
            while self.eat(&TokenKind::Comma) {
                operands.push(self.additive()?);
            }
            self.expect(&TokenKind::RParen)?;
            return Ok(Expr::In {
                left: Box::new(left),
                operands,
            });
        }

        if self.eat(&TokenKind::Between) {
            let lo = self.additive()?;
            self.expect(&TokenKind::And)?;
            let hi = self.additive()?;
            return Ok(Expr::Between {
                left: Box::new(left),
                lo: Box::new(lo),
                hi: Box::new(hi),
            });
        }

        if self.eat(&TokenKind::Is) {
            self.expect(&TokenKind::Null)?;
            return Expr::is_null(left);
        }

        Ok(left)
    }

    fn additive(&mut self) -> CelestaResult<Expr> {
        let first = self.multiplicative()?;
        self.operator_chain(
            first,
            |kind| match kind {
                TokenKind::Plus => Some(TermOp::Plus),
                TokenKind::Minus => Some(TermOp::Minus),
                TokenKind::Concat => Some(TermOp::Concat),
                _ => None,
            },
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> CelestaResult<Expr> {
        let first = self.unary()?;
        self.operator_chain(
            first,
            |kind| match kind {
                TokenKind::Star => Some(TermOp::Times),
                TokenKind::Slash => Some(TermOp::Over),
                _ => None,
            },
            Self::unary,
        )
    }

    /// Collect `first op a op b …` into term nodes. Runs of one operator
    /// become a single node with an operand list; an operator change wraps
    /// what was collected so far into the first operand of a fresh node,
    /// which groups mixed chains left-associatively.
    fn operator_chain(
        &mut self,
        first: Expr,
        classify: fn(&TokenKind) -> Option<TermOp>,
        operand: fn(&mut Self) -> CelestaResult<Expr>,
    ) -> CelestaResult<Expr> {
        let mut current_op: Option<TermOp> = None;
        let mut operands: Vec<Expr> = vec![first];
        while let Some(op) = classify(self.peek()) {
            self.advance();
            let rhs = operand(self)?;
            match current_op {
                None => current_op = Some(op),
                Some(prev) if prev == op => {}
                Some(prev) => {
                    let folded = Expr::term(prev, operands)?;
                    operands = vec![folded];
                    current_op = Some(op);
                }
            }
            operands.push(rhs);
        }
        match current_op {
            None => Ok(operands.pop().expect("one operand")),
            Some(op) => Expr::term(op, operands),
        }
    }

    fn unary(&mut self) -> CelestaResult<Expr> {
        if self.eat(&TokenKind::Minus) {
            let inner = self.unary()?;
            Ok(Expr::UnaryMinus(Box::new(inner)))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> CelestaResult<Expr> {
        match self.advance() {
            TokenKind::Number(text) => Ok(Expr::NumericLiteral(text)),
            TokenKind::Text(text) => Ok(Expr::TextLiteral(text)),
            TokenKind::LParen => {
                let inner = self.or_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(Expr::Parenthesized(Box::new(inner)))
            }
            TokenKind::Ident(first) => {
                if !self.eat(&TokenKind::Dot) {
                    return Expr::field_ref(None, None, &first);
                }
                let second = self.ident()?;
                if !self.eat(&TokenKind::Dot) {
                    return Expr::field_ref(None, Some(&first), &second);
                }
                let third = self.ident()?;
                Expr::field_ref(Some(&first), Some(&second), &third)
            }
            other => Err(CelestaError::parse(format!(
                "expected an expression, found {other:?}"
            ))),
        }
    }

    fn ident(&mut self) -> CelestaResult<String> {
        match self.advance() {
            TokenKind::Ident(name) => Ok(name),
            other => Err(CelestaError::parse(format!(
                "expected an identifier, found {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Parse, print, reparse: the printed form must parse to an equal tree.
    fn assert_roundtrip(source: &str) {
        let parsed = parse_expr(source).unwrap_or_else(|e| panic!("parse '{source}': {e}"));
        let printed = parsed.csql();
        let reparsed =
            parse_expr(&printed).unwrap_or_else(|e| panic!("reparse '{printed}': {e}"));
        assert_eq!(parsed, reparsed, "round-trip of '{source}' via '{printed}'");
    }

    #[test]
    fn test_roundtrip_comparisons() {
        assert_roundtrip("a > 1");
        assert_roundtrip("a >= 1");
        assert_roundtrip("a <= 1");
        assert_roundtrip("a < 1");
        assert_roundtrip("a <> b");
        assert_roundtrip("a = b");
        assert_roundtrip("name LIKE 'a%'");
    }

    #[test]
    fn test_roundtrip_compound() {
        assert_roundtrip("a = 1 AND b = 2 AND c = 3");
        assert_roundtrip("a = 1 OR b = 2 AND NOT c = 3");
        assert_roundtrip("x IN (1, 2, 3)");
        assert_roundtrip("x BETWEEN 1 AND 10");
        assert_roundtrip("x IS NULL");
        assert_roundtrip("(a = 1)");
        assert_roundtrip("g.t.col = t.col + col");
        assert_roundtrip("'it''s' || 'fine'");
        assert_roundtrip("-a * 2 + 1");
        assert_roundtrip("1 + 2 - 3 * 4 / 5");
    }

    #[test]
    fn test_chain_collection() {
        let e = parse_expr("1 + 2 + 3").unwrap();
        match &e {
            Expr::Term { op: TermOp::Plus, operands } => assert_eq!(operands.len(), 3),
            other => panic!("expected one PLUS chain, got {other:?}"),
        }
        assert_eq!(e.csql(), "1 + 2 + 3");

        // Mixed operators group left-associatively.
        let e = parse_expr("1 + 2 - 3").unwrap();
        assert_eq!(e.csql(), "1 + 2 - 3");
        match &e {
            Expr::Term { op: TermOp::Minus, operands } => {
                assert_eq!(operands.len(), 2);
                assert!(matches!(
                    operands[0],
                    Expr::Term { op: TermOp::Plus, .. }
                ));
            }
            other => panic!("expected MINUS of PLUS, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        // Multiplication binds tighter than addition.
        let e = parse_expr("1 + 2 * 3").unwrap();
        match &e {
            Expr::Term { op: TermOp::Plus, operands } => {
                assert!(matches!(
                    operands[1],
                    Expr::Term { op: TermOp::Times, .. }
                ));
            }
            other => panic!("{other:?}"),
        }

        // AND binds tighter than OR.
        let e = parse_expr("a = 1 OR b = 2 AND c = 3").unwrap();
        match &e {
            Expr::Logical { op: LogicalOp::Or, operands } => {
                assert!(matches!(
                    operands[1],
                    Expr::Logical { op: LogicalOp::And, .. }
                ));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_between_and_does_not_leak() {
        // The AND inside BETWEEN belongs to it, the second one is logical.
        let e = parse_expr("x BETWEEN 1 AND 10 AND y = 2").unwrap();
        match &e {
            Expr::Logical { op: LogicalOp::And, operands } => {
                assert_eq!(operands.len(), 2);
                assert!(matches!(operands[0], Expr::Between { .. }));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_not_requires_condition() {
        // NOT over a bare numeric term fails at construction.
        assert!(parse_expr("NOT 5").is_err());
        assert!(parse_expr("NOT a = b").is_ok());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_expr("").is_err());
        assert!(parse_expr("a +").is_err());
        assert!(parse_expr("(a = 1").is_err());
        assert!(parse_expr("a = 1 extra").is_err());
        assert!(parse_expr("x IS").is_err());
    }

    // -----------------------------------------------------------------------
    // Proptest: round-trip property over generated expression text
    // -----------------------------------------------------------------------

    fn arb_ident() -> BoxedStrategy<String> {
        prop::string::string_regex("[a-z][a-z0-9]{0,5}")
            .expect("valid regex")
            .prop_filter("must not be a keyword", |s| {
                !matches!(
                    s.to_ascii_uppercase().as_str(),
                    "AND" | "OR" | "NOT" | "IN" | "IS" | "NULL" | "LIKE" | "BETWEEN"
                )
            })
            .boxed()
    }

    fn arb_term(depth: u32) -> BoxedStrategy<String> {
        if depth == 0 {
            prop_oneof![
                any::<u32>().prop_map(|n| n.to_string()),
                (1u32..1000, 0u32..100).prop_map(|(a, b)| format!("{a}.{b}")),
                arb_ident().prop_map(|s| format!("'{s}'")),
                arb_ident(),
                (arb_ident(), arb_ident()).prop_map(|(t, c)| format!("{t}.{c}")),
            ]
            .boxed()
        } else {
            let sub = arb_term(depth - 1);
            prop_oneof![
                4 => arb_term(0),
                2 => (sub.clone(), prop_oneof![
                        Just("+"), Just("-"), Just("*"), Just("/"), Just("||")
                    ], arb_term(depth - 1))
                    .prop_map(|(l, op, r)| format!("{l} {op} {r}")),
                1 => sub.prop_map(|e| format!("-{e}")),
            ]
            .boxed()
        }
    }

    fn arb_condition(depth: u32) -> BoxedStrategy<String> {
        let simple = (arb_term(1), prop_oneof![
            Just(">"), Just("<"), Just(">="), Just("<="), Just("<>"), Just("="),
        ], arb_term(1))
            .prop_map(|(l, op, r)| format!("{l} {op} {r}"))
            .boxed();
        if depth == 0 {
            simple
        } else {
            let sub = arb_condition(depth - 1);
            prop_oneof![
                3 => simple,
                1 => (sub.clone(), sub.clone())
                    .prop_map(|(a, b)| format!("{a} AND {b}")),
                1 => (sub.clone(), sub.clone())
                    .prop_map(|(a, b)| format!("{a} OR {b}")),
                1 => sub.clone().prop_map(|c| format!("NOT {c}")),
                1 => sub.prop_map(|c| format!("({c})")),
                1 => (arb_term(1), arb_term(0), arb_term(0))
                    .prop_map(|(e, lo, hi)| format!("{e} BETWEEN {lo} AND {hi}")),
                1 => (arb_term(1), proptest::collection::vec(arb_term(0), 1..4))
                    .prop_map(|(e, items)| format!("{e} IN ({})", items.join(", "))),
                1 => arb_term(1).prop_map(|e| format!("{e} IS NULL")),
            ]
            .boxed()
        }
    }

    proptest! {
        #[test]
        fn test_roundtrip_generated(source in arb_condition(2)) {
            let parsed = parse_expr(&source).unwrap();
            let printed = parsed.csql();
            let reparsed = parse_expr(&printed).unwrap();
            prop_assert_eq!(parsed, reparsed);
        }
    }
}
