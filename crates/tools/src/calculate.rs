//! Calculator capability — evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, parentheses, unary negation, and decimal
//! numbers, with optional variable substitution. Uses a recursive-descent
//! parser; no `eval`, no dependencies beyond std.

use crate::string_param;
use async_trait::async_trait;
use lingxi_core::envelope::ToolEnvelope;
use lingxi_core::tool::{Capability, ParamMap, ToolKind};
use serde_json::json;
use std::time::Instant;

pub struct CalculateCapability;

#[async_trait]
impl Capability for CalculateCapability {
    fn kind(&self) -> ToolKind {
        ToolKind::Calculate
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression: +, -, *, /, parentheses, decimals"
    }

    fn required_params(&self) -> &'static [&'static str] {
        &["expression"]
    }

    fn optional_params(&self) -> &'static [&'static str] {
        &["variables"]
    }

    async fn invoke(&self, params: ParamMap) -> ToolEnvelope {
        let started = Instant::now();

        let Some(expression) = string_param(&params, "expression").filter(|s| !s.trim().is_empty())
        else {
            return ToolEnvelope::failure(
                "calculate",
                "invalid parameters: expression must not be empty",
                started,
            );
        };

        // Substitute variables, longest names first so `ab` wins over `a`.
        let mut substituted = expression.clone();
        let mut steps = vec![expression.clone()];
        if let Some(variables) = params.get("variables").and_then(|v| v.as_object()) {
            let mut names: Vec<&String> = variables.keys().collect();
            names.sort_by_key(|n| std::cmp::Reverse(n.len()));
            for name in names {
                let value = variable_text(&variables[name]);
                substituted = substituted.replace(name.as_str(), &value);
            }
            steps.push(format!("substituted: {substituted}"));
        }

        if !substituted
            .chars()
            .all(|c| c.is_ascii_digit() || "+-*/().".contains(c) || c.is_whitespace())
        {
            return ToolEnvelope::failure(
                "calculate",
                "expression contains unsupported characters",
                started,
            );
        }

        match evaluate(&substituted) {
            Ok(result) => {
                steps.push(format!("result: {result}"));
                // Integers serialize without a trailing .0
                let result_value = if result.fract() == 0.0 && result.abs() < 1e15 {
                    json!(result as i64)
                } else {
                    json!(result)
                };
                ToolEnvelope::ok_with(
                    ToolKind::Calculate,
                    json!({
                        "expression": expression,
                        "result": result_value,
                        "steps": steps,
                    }),
                    started,
                    false,
                    Some("local"),
                )
            }
            Err(e) => ToolEnvelope::failure("calculate", format!("calculation failed: {e}"), started),
        }
    }
}

fn variable_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Evaluate an arithmetic expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!(
            "Unexpected token at position {}: {:?}",
            parser.pos, parser.tokens[parser.pos]
        ));
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {num_str}"))?;
                tokens.push(Token::Number(num));
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.consume();
                    left += self.parse_term()?;
                }
                Token::Minus => {
                    self.consume();
                    left -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/') unary)*
    fn parse_term(&mut self) -> Result<f64, String> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.consume();
                    left *= self.parse_unary()?;
                }
                Token::Slash => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Division by zero".into());
                    }
                    left /= right;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // unary = '-' unary | primary
    fn parse_unary(&mut self) -> Result<f64, String> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let val = self.parse_unary()?;
            return Ok(-val);
        }
        self.parse_primary()
    }

    // primary = NUMBER | '(' expr ')'
    fn parse_primary(&mut self) -> Result<f64, String> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::LParen) => {
                let val = self.parse_expr()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(val),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {tok:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_addition() {
        assert_eq!(evaluate("2 + 3").unwrap(), 5.0);
    }

    #[test]
    fn operator_precedence() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
    }

    #[test]
    fn parentheses() {
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
    }

    #[test]
    fn division_by_zero() {
        assert!(evaluate("1 / 0").is_err());
    }

    #[test]
    fn unary_negation() {
        assert_eq!(evaluate("-5 + 3").unwrap(), -2.0);
    }

    #[test]
    fn invalid_expression() {
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("").is_err());
    }

    fn params(expression: &str) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("expression".into(), json!(expression));
        params
    }

    #[tokio::test]
    async fn invoke_returns_integer_result() {
        let envelope = CalculateCapability.invoke(params("2+3*4")).await;
        assert!(envelope.success);
        let data = envelope.data.unwrap();
        assert_eq!(data["result"], 14);
        assert_eq!(data["expression"], "2+3*4");
    }

    #[tokio::test]
    async fn invoke_keeps_fractional_results() {
        let envelope = CalculateCapability.invoke(params("10/4")).await;
        let data = envelope.data.unwrap();
        assert_eq!(data["result"], 2.5);
    }

    #[tokio::test]
    async fn invoke_with_variables() {
        let mut p = params("x * y + 1");
        p.insert("variables".into(), json!({"x": 3, "y": 4}));
        let envelope = CalculateCapability.invoke(p).await;
        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap()["result"], 13);
    }

    #[tokio::test]
    async fn invoke_rejects_letters() {
        let envelope = CalculateCapability.invoke(params("system('rm')")).await;
        assert!(!envelope.success);
        assert!(envelope.error.unwrap().contains("unsupported characters"));
    }

    #[tokio::test]
    async fn invoke_missing_expression_fails() {
        let envelope = CalculateCapability.invoke(ParamMap::new()).await;
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
    }

    #[tokio::test]
    async fn invoke_division_by_zero_fails() {
        let envelope = CalculateCapability.invoke(params("1/0")).await;
        assert!(!envelope.success);
        assert!(envelope.error.unwrap().contains("zero"));
    }
}
