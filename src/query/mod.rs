//! Query string parser.
//!
//! The grammar is a flat list of clauses separated by whitespace. Adjacent
//! clauses joined by the keyword `or` form a group; groups intersect, clauses
//! within a group union. A leading `-` negates a clause. Property clauses use
//! `key:value` or `key=value`, numeric clauses compare with `=`, `!=`, `<`,
//! `<=`, `>`, `>=` (and `:` as equality). Values containing spaces can be
//! quoted.
//!
//! `ref` is accepted as a spelling of `to`, and id-valued properties
//! normalize dashed ids so both spellings hit the same posting list.

use crate::index::NumOp;
use crate::types::AssetId;

/// Fields that compare numerically rather than by string equality.
const NUMERIC_FIELDS: &[&str] = &["in", "out"];

/// Fields whose values are asset ids and normalize through [`AssetId::parse`].
const ID_FIELDS: &[&str] = &["id", "to", "from", "weak"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseKind {
    /// Free-text token matched against exact words and path words.
    Word(String),
    /// `key:value` string property.
    Property { name: String, value: String },
    /// `key<op>number` comparison.
    Number { name: String, op: NumOp, value: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub kind: ClauseKind,
    pub negated: bool,
}

/// A parsed query: groups intersect, clauses within a group union.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub groups: Vec<Vec<Clause>>,
}

impl Query {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Parse a query string. Returns `None` on malformed input: an unterminated
/// quote, an empty property value, a dangling `or`, or a non-numeric value
/// for a numeric field.
pub fn parse_query(input: &str) -> Option<Query> {
    let tokens = tokenize(input)?;

    let mut groups: Vec<Vec<Clause>> = Vec::new();
    let mut pending_or = false;

    for token in tokens {
        if token.eq_ignore_ascii_case("or") {
            if groups.is_empty() || pending_or {
                return None;
            }
            pending_or = true;
            continue;
        }

        let clause = parse_clause(&token)?;
        if pending_or {
            groups
                .last_mut()
                .unwrap_or_else(|| unreachable!("pending_or requires a prior group"))
                .push(clause);
            pending_or = false;
        } else {
            groups.push(vec![clause]);
        }
    }

    if pending_or {
        return None;
    }
    Some(Query { groups })
}

/// Split on whitespace outside double quotes. Quotes may wrap a whole token
/// or just the value part of `key:"some value"`.
fn tokenize(input: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return None;
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Some(tokens)
}

fn parse_clause(token: &str) -> Option<Clause> {
    let (negated, body) = match token.strip_prefix('-') {
        Some(rest) if !rest.is_empty() => (true, rest),
        _ => (false, token),
    };

    let kind = parse_kind(body)?;
    Some(Clause { kind, negated })
}

fn parse_kind(body: &str) -> Option<ClauseKind> {
    if let Some((name, op, value)) = split_operator(body) {
        let name = normalize_field(&name.to_lowercase());

        if NUMERIC_FIELDS.contains(&name.as_str()) {
            let value: u64 = value.parse().ok()?;
            return Some(ClauseKind::Number { name, op, value });
        }

        // String properties only support equality.
        if !matches!(op, NumOp::Eq) {
            return None;
        }
        if value.is_empty() {
            return None;
        }

        let value = if ID_FIELDS.contains(&name.as_str()) {
            match AssetId::parse(&value) {
                Some(id) => id.to_hex(),
                None => value.to_lowercase(),
            }
        } else {
            value.to_lowercase()
        };
        return Some(ClauseKind::Property { name, value });
    }

    Some(ClauseKind::Word(body.to_lowercase()))
}

/// Split `key<op>value`, trying two-character operators before one-character
/// ones so `>=` never parses as `>` with a stray `=` in the value.
fn split_operator(body: &str) -> Option<(String, NumOp, String)> {
    for (symbol, op) in [(">=", NumOp::Ge), ("<=", NumOp::Le), ("!=", NumOp::Ne)] {
        if let Some(pos) = body.find(symbol) {
            if pos > 0 {
                return Some((
                    body[..pos].to_string(),
                    op,
                    body[pos + 2..].to_string(),
                ));
            }
        }
    }
    for (symbol, op) in [
        ('>', NumOp::Gt),
        ('<', NumOp::Lt),
        ('=', NumOp::Eq),
        (':', NumOp::Eq),
    ] {
        if let Some(pos) = body.find(symbol) {
            if pos > 0 {
                return Some((
                    body[..pos].to_string(),
                    op,
                    body[pos + 1..].to_string(),
                ));
            }
        }
    }
    None
}

fn normalize_field(name: &str) -> String {
    match name {
        "ref" => "to".to_string(),
        other => other.to_string(),
    }
}
