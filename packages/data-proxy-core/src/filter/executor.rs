//! Query collaborator interface and the default scanning executor.

use std::cmp::Ordering;

use super::expr::{CompareOp, FilterExpr, Operand, Predicate};
use crate::error::FilterError;
use crate::types::Value;

/// Read-only relation over the proxy's unfiltered contents.
///
/// Rows are numbered by absolute row.
pub trait SourceView {
    /// Relation name
    fn name(&self) -> &str;

    fn column_names(&self) -> Vec<&str>;

    /// Row count, `None` if unknown
    fn row_count(&self) -> Option<usize>;

    /// Cell value, `Ok(None)` past the last row.
    fn value(&self, col: usize, row: usize) -> Result<Option<Value>, FilterError>;
}

/// Runs a filter against a source and returns the matching rows in order.
pub trait QueryExecutor {
    fn execute_ordered_filter(
        &self,
        expr: &FilterExpr,
        source: &dyn SourceView,
    ) -> Result<Vec<usize>, FilterError>;
}

/// Executor evaluating the filter row by row.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanExecutor;

/// Predicate with columns resolved to numbers.
enum Resolved<'e> {
    Compare(Slot<'e>, CompareOp, Slot<'e>),
    And(Box<Resolved<'e>>, Box<Resolved<'e>>),
    Or(Box<Resolved<'e>>, Box<Resolved<'e>>),
    Not(Box<Resolved<'e>>),
    IsNull(Slot<'e>, bool),
    Like(Slot<'e>, &'e str, bool),
    InList(Slot<'e>, &'e [Value], bool),
    Between(Slot<'e>, &'e Value, &'e Value, bool),
    Truth(Slot<'e>),
}

enum Slot<'e> {
    Column(usize),
    Literal(&'e Value),
}

fn resolve_operand<'e>(operand: &'e Operand, names: &[&str]) -> Result<Slot<'e>, FilterError> {
    match operand {
        Operand::Column(c) => c.resolve(names).map(Slot::Column),
        Operand::Literal(v) => Ok(Slot::Literal(v)),
    }
}

fn resolve<'e>(p: &'e Predicate, names: &[&str]) -> Result<Resolved<'e>, FilterError> {
    let op = |o| resolve_operand(o, names);
    Ok(match p {
        Predicate::Compare { left, op: cmp, right } => Resolved::Compare(op(left)?, *cmp, op(right)?),
        Predicate::And(l, r) => Resolved::And(Box::new(resolve(l, names)?), Box::new(resolve(r, names)?)),
        Predicate::Or(l, r) => Resolved::Or(Box::new(resolve(l, names)?), Box::new(resolve(r, names)?)),
        Predicate::Not(inner) => Resolved::Not(Box::new(resolve(inner, names)?)),
        Predicate::IsNull { operand, negated } => Resolved::IsNull(op(operand)?, *negated),
        Predicate::Like {
            operand,
            pattern,
            negated,
        } => Resolved::Like(op(operand)?, pattern, *negated),
        Predicate::InList {
            operand,
            list,
            negated,
        } => Resolved::InList(op(operand)?, list, *negated),
        Predicate::Between {
            operand,
            low,
            high,
            negated,
        } => Resolved::Between(op(operand)?, low, high, *negated),
        Predicate::Truth(operand) => Resolved::Truth(op(operand)?),
    })
}

fn negate(v: Option<bool>, negated: bool) -> Option<bool> {
    v.map(|b| b != negated)
}

impl Resolved<'_> {
    /// Three-valued evaluation; `None` is SQL unknown.
    fn eval(&self, row: &[Value]) -> Option<bool> {
        let get = |slot: &Slot<'_>| -> Value {
            match slot {
                Slot::Column(c) => row[*c].clone(),
                Slot::Literal(v) => (*v).clone(),
            }
        };
        match self {
            Resolved::Compare(l, op, r) => {
                let ord = get(l).compare(&get(r))?;
                Some(match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::NotEq => ord != Ordering::Equal,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::LtEq => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::GtEq => ord != Ordering::Less,
                })
            }
            Resolved::And(l, r) => match (l.eval(row), r.eval(row)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Resolved::Or(l, r) => match (l.eval(row), r.eval(row)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Resolved::Not(inner) => inner.eval(row).map(|b| !b),
            Resolved::IsNull(slot, negated) => Some(get(slot).is_null() != *negated),
            Resolved::Like(slot, pattern, negated) => match get(slot) {
                Value::Null => None,
                Value::Text(s) => negate(Some(like(&s, pattern)), *negated),
                other => negate(Some(like(&other.to_string(), pattern)), *negated),
            },
            Resolved::InList(slot, list, negated) => {
                let value = get(slot);
                if value.is_null() {
                    return None;
                }
                let found = list
                    .iter()
                    .any(|v| value.compare(v) == Some(Ordering::Equal));
                negate(Some(found), *negated)
            }
            Resolved::Between(slot, low, high, negated) => {
                let value = get(slot);
                let above = value.compare(low)? != Ordering::Less;
                let below = value.compare(high)? != Ordering::Greater;
                negate(Some(above && below), *negated)
            }
            Resolved::Truth(slot) => match get(slot) {
                Value::Null => None,
                Value::Bool(b) => Some(b),
                Value::Int(i) => Some(i != 0),
                Value::Float(x) => Some(x != 0.0),
                Value::Text(s) => Some(!s.is_empty()),
                Value::Bytes(b) => Some(!b.is_empty()),
            },
        }
    }
}

/// SQL LIKE with `%` and `_` wildcards.
fn like(text: &str, pattern: &str) -> bool {
    fn matches(t: &[char], p: &[char]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some(('%', rest)) => (0..=t.len()).any(|i| matches(&t[i..], rest)),
            Some(('_', rest)) => !t.is_empty() && matches(&t[1..], rest),
            Some((c, rest)) => t.first() == Some(c) && matches(&t[1..], rest),
        }
    }
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    matches(&t, &p)
}

impl QueryExecutor for ScanExecutor {
    fn execute_ordered_filter(
        &self,
        expr: &FilterExpr,
        source: &dyn SourceView,
    ) -> Result<Vec<usize>, FilterError> {
        let names = source.column_names();
        let predicate = expr
            .predicate
            .as_ref()
            .map(|p| resolve(p, &names))
            .transpose()?;
        let order: Vec<(usize, bool)> = expr
            .order_by
            .iter()
            .map(|t| t.column.resolve(&names).map(|c| (c, t.ascending)))
            .collect::<Result<_, _>>()?;

        let mut matched: Vec<(usize, Vec<Value>)> = Vec::new();
        let mut row = 0;
        loop {
            if source.row_count().is_some_and(|n| row >= n) {
                break;
            }
            let mut values = Vec::with_capacity(names.len());
            for col in 0..names.len() {
                match source.value(col, row)? {
                    Some(v) => values.push(v),
                    None => break,
                }
            }
            if values.len() < names.len() {
                break;
            }
            let keep = predicate
                .as_ref()
                .map_or(true, |p| p.eval(&values) == Some(true));
            if keep {
                matched.push((row, values));
            }
            row += 1;
        }

        if !order.is_empty() {
            matched.sort_by(|(_, a), (_, b)| {
                order
                    .iter()
                    .map(|&(col, asc)| {
                        let ord = a[col].sort_cmp(&b[col]);
                        if asc {
                            ord
                        } else {
                            ord.reverse()
                        }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        tracing::debug!(
            "filter '{}' on '{}' matched {} rows",
            expr,
            source.name(),
            matched.len()
        );
        Ok(matched
            .into_iter()
            .map(|(row, _)| row)
            .skip(expr.offset.unwrap_or(0))
            .take(expr.limit.unwrap_or(usize::MAX))
            .collect())
    }
}
