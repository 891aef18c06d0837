//! Instruction-source parsing.
//!
//! Two surface syntaxes are accepted for every form: comma-parenthesized
//! (`ADD(t, a, b)`) and space-separated (`ADD t a b`). Addresses may be
//! decimal or `0x`-prefixed hex. Statement splitting is bracket- and
//! quote-aware so FOR bodies and quoted text may contain `;`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::instruction::{Instruction, Operand, PrintPiece};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    line: String,
}

impl ParseError {
    fn new(line: &str) -> Self {
        Self {
            line: line.to_string(),
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid instruction: {}", self.line)
    }
}

impl std::error::Error for ParseError {}

const ADDR: &str = r"0[xX][0-9a-fA-F]+|\d+";

static DECLARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^DECLARE\((\w+),\s*(-?\d+)\)$").unwrap());
static ADD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ADD\((\w+),\s*([\w\-]+),\s*([\w\-]+)\)$").unwrap());
static SUBTRACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SUBTRACT\((\w+),\s*([\w\-]+),\s*([\w\-]+)\)$").unwrap());
static PRINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PRINT\((.*)\)$").unwrap());
static SLEEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^SLEEP\((\d+)\)$").unwrap());
static FOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^FOR\(\[(.+)\],\s*(\d+)\)$").unwrap());
static READ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^READ\((\w+),\s*({ADDR})\)$")).unwrap());
static WRITE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^WRITE\(({ADDR}),\s*(\w+)\)$")).unwrap());

static DECLARE_SP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^DECLARE\s+(\w+)\s+(-?\d+)$").unwrap());
static ADD_SP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ADD\s+(\w+)\s+([\w\-]+)\s+([\w\-]+)$").unwrap());
static SUBTRACT_SP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SUBTRACT\s+(\w+)\s+([\w\-]+)\s+([\w\-]+)$").unwrap());
static READ_SP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^READ\s+(\w+)\s+({ADDR})$")).unwrap());
static WRITE_SP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^WRITE\s+({ADDR})\s+(\w+)$")).unwrap());
static SLEEP_SP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^SLEEP\s+(\d+)$").unwrap());

/// Parse a single instruction in either accepted syntax.
pub fn parse_line(line: &str) -> Result<Instruction, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::new(line));
    }

    if let Some(caps) = DECLARE_RE.captures(line).or_else(|| DECLARE_SP_RE.captures(line)) {
        let value = caps[2].parse().map_err(|_| ParseError::new(line))?;
        return Ok(Instruction::Declare {
            var: caps[1].to_string(),
            value,
        });
    }

    if let Some(caps) = ADD_RE.captures(line).or_else(|| ADD_SP_RE.captures(line)) {
        return Ok(Instruction::Add {
            target: caps[1].to_string(),
            lhs: operand(&caps[2]),
            rhs: operand(&caps[3]),
        });
    }

    if let Some(caps) = SUBTRACT_RE
        .captures(line)
        .or_else(|| SUBTRACT_SP_RE.captures(line))
    {
        return Ok(Instruction::Subtract {
            target: caps[1].to_string(),
            lhs: operand(&caps[2]),
            rhs: operand(&caps[3]),
        });
    }

    if let Some(caps) = SLEEP_RE.captures(line).or_else(|| SLEEP_SP_RE.captures(line)) {
        let ticks = caps[1].parse().map_err(|_| ParseError::new(line))?;
        return Ok(Instruction::Sleep { ticks });
    }

    if let Some(caps) = FOR_RE.captures(line) {
        let repeats = caps[2].parse().map_err(|_| ParseError::new(line))?;
        let body = split_statements(&caps[1])
            .iter()
            .map(|stmt| parse_line(stmt))
            .collect::<Result<Vec<_>, _>>()?;
        if body.is_empty() {
            return Err(ParseError::new(line));
        }
        return Ok(Instruction::For { body, repeats });
    }

    if let Some(caps) = READ_RE.captures(line).or_else(|| READ_SP_RE.captures(line)) {
        let addr = parse_address(&caps[2]).ok_or_else(|| ParseError::new(line))?;
        return Ok(Instruction::Read {
            var: caps[1].to_string(),
            addr,
        });
    }

    if let Some(caps) = WRITE_RE.captures(line).or_else(|| WRITE_SP_RE.captures(line)) {
        let addr = parse_address(&caps[1]).ok_or_else(|| ParseError::new(line))?;
        return Ok(Instruction::Write {
            addr,
            value: operand(&caps[2]),
        });
    }

    if let Some(caps) = PRINT_RE.captures(line) {
        let pieces = parse_print_expr(&caps[1]);
        return Ok(Instruction::Print { pieces });
    }

    Err(ParseError::new(line))
}

/// Parse a `;`-separated program. Separators inside `[...]` or single quotes
/// do not split.
pub fn parse_program(source: &str) -> Result<Vec<Instruction>, ParseError> {
    split_statements(source)
        .iter()
        .map(|stmt| parse_line(stmt))
        .collect()
}

/// Decimal or `0x`-prefixed hex address.
fn parse_address(token: &str) -> Option<usize> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        token.parse().ok()
    }
}

/// Integer literal first, variable reference otherwise.
fn operand(token: &str) -> Operand {
    match token.parse::<i64>() {
        Ok(value) => Operand::Literal(value),
        Err(_) => Operand::Var(token.to_string()),
    }
}

/// Split a PRINT expression on `+` outside single quotes; quoted parts become
/// text pieces, the rest become operands.
fn parse_print_expr(expr: &str) -> Vec<PrintPiece> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in expr.chars() {
        match ch {
            '\'' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '+' if !in_quotes => {
                push_print_piece(&mut pieces, &current);
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    push_print_piece(&mut pieces, &current);
    pieces
}

fn push_print_piece(pieces: &mut Vec<PrintPiece>, part: &str) {
    let part = part.trim();
    if part.is_empty() {
        return;
    }
    if part.len() >= 2 && part.starts_with('\'') && part.ends_with('\'') {
        pieces.push(PrintPiece::Text(part[1..part.len() - 1].to_string()));
    } else {
        pieces.push(PrintPiece::Value(operand(part)));
    }
}

/// Split on `;` at bracket depth zero and outside single quotes, dropping
/// empty segments.
fn split_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    for ch in source.chars() {
        match ch {
            '\'' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '[' if !in_quotes => {
                depth += 1;
                current.push(ch);
            }
            ']' if !in_quotes => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ';' if !in_quotes && depth == 0 => {
                if !current.trim().is_empty() {
                    statements.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}
