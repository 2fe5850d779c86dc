use std::fmt::{self, Display};

use crate::error::FilterError;
use crate::types::Value;

/// Column reference in a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRef {
    Name(String),
    /// Zero-based column number, written `_N` with N = index + 1
    Index(usize),
}

impl ColumnRef {
    /// Resolves to a column number.
    pub fn resolve(&self, names: &[&str]) -> Result<usize, FilterError> {
        match self {
            ColumnRef::Index(i) if *i < names.len() => Ok(*i),
            ColumnRef::Index(i) => Err(FilterError::UnknownColumn(format!("_{}", i + 1))),
            ColumnRef::Name(name) => names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(name))
                .ok_or_else(|| FilterError::UnknownColumn(name.clone())),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "_{}", i + 1),
            ColumnRef::Name(name)
                if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    && !name.starts_with(|c: char| c.is_ascii_digit()) =>
            {
                f.write_str(name)
            }
            ColumnRef::Name(name) => write!(f, "\"{}\"", name.replace('"', "\"\"")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(ColumnRef),
    Literal(Value),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(c) => c.fmt(f),
            Operand::Literal(v) => write_literal(f, v),
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Value::Bytes(b) => write!(f, "'{}'", Value::Bytes(b.clone())),
        other => other.fmt(f),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        })
    }
}

/// Boolean condition over one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    IsNull {
        operand: Operand,
        negated: bool,
    },
    Like {
        operand: Operand,
        pattern: String,
        negated: bool,
    },
    InList {
        operand: Operand,
        list: Vec<Value>,
        negated: bool,
    },
    Between {
        operand: Operand,
        low: Value,
        high: Value,
        negated: bool,
    },
    /// Operand used as a condition, e.g. a boolean column
    Truth(Operand),
}

impl Predicate {
    /// Whether the predicate only uses `=`, `AND` and boolean literals.
    pub fn is_strict(&self) -> bool {
        match self {
            Predicate::Compare {
                op: CompareOp::Eq, ..
            } => true,
            Predicate::And(l, r) => l.is_strict() && r.is_strict(),
            Predicate::Truth(Operand::Literal(Value::Bool(_))) => true,
            _ => false,
        }
    }
}

fn not(negated: bool) -> &'static str {
    if negated {
        "NOT "
    } else {
        ""
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Predicate::And(l, r) => write!(f, "({} AND {})", l, r),
            Predicate::Or(l, r) => write!(f, "({} OR {})", l, r),
            Predicate::Not(p) => write!(f, "NOT {}", p),
            Predicate::IsNull { operand, negated } => {
                write!(f, "{} IS {}NULL", operand, not(*negated))
            }
            Predicate::Like {
                operand,
                pattern,
                negated,
            } => write!(
                f,
                "{} {}LIKE '{}'",
                operand,
                not(*negated),
                pattern.replace('\'', "''")
            ),
            Predicate::InList {
                operand,
                list,
                negated,
            } => {
                write!(f, "{} {}IN (", operand, not(*negated))?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_literal(f, v)?;
                }
                f.write_str(")")
            }
            Predicate::Between {
                operand,
                low,
                high,
                negated,
            } => {
                write!(f, "{} {}BETWEEN ", operand, not(*negated))?;
                write_literal(f, low)?;
                f.write_str(" AND ")?;
                write_literal(f, high)
            }
            Predicate::Truth(operand) => operand.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: ColumnRef,
    pub ascending: bool,
}

/// Compiled filter: optional predicate, ordering, and paging.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterExpr {
    pub predicate: Option<Predicate>,
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl FilterExpr {
    /// Filter that only orders rows by one column.
    pub fn order_by_column(col: usize) -> Self {
        Self {
            order_by: vec![OrderTerm {
                column: ColumnRef::Index(col),
                ascending: true,
            }],
            ..Self::default()
        }
    }

    /// Orders by `col`, or flips the direction if it already is the sole ordering.
    pub fn toggle_order(&mut self, col: usize, names: &[&str]) {
        if let [term] = self.order_by.as_mut_slice() {
            if term.column.resolve(names).ok() == Some(col) {
                term.ascending = !term.ascending;
                return;
            }
        }
        self.order_by = vec![OrderTerm {
            column: ColumnRef::Index(col),
            ascending: true,
        }];
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some(p) = &self.predicate {
            write!(f, "{}", p)?;
            sep = " ";
        }
        if !self.order_by.is_empty() {
            write!(f, "{}ORDER BY ", sep)?;
            for (i, term) in self.order_by.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{} {}", term.column, if term.ascending { "ASC" } else { "DESC" })?;
            }
            sep = " ";
        }
        if let Some(limit) = self.limit {
            write!(f, "{}LIMIT {}", sep, limit)?;
            sep = " ";
        }
        if let Some(offset) = self.offset {
            write!(f, "{}OFFSET {}", sep, offset)?;
        }
        Ok(())
    }
}
