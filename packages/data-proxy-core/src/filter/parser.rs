//! Filter text to [`FilterExpr`], via `sqlparser`.

use sqlparser::ast::{
    BinaryOperator, Expr, Offset, OrderByExpr, Query, SetExpr, Statement, UnaryOperator,
    Value as SqlValue,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use super::expr::{ColumnRef, CompareOp, FilterExpr, Operand, OrderTerm, Predicate};
use crate::error::FilterError;
use crate::types::Value;

/// Name under which the proxy contents are queried.
pub const SOURCE_NAME: &str = "proxy";

/// Accepted language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Full,
    /// Only `=`, `AND` and boolean literals; no ordering or paging
    Strict,
}

fn starts_with_order_by(text: &str) -> bool {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(7)
        .collect();
    compact.eq_ignore_ascii_case("orderby")
}

/// Parses filter text.
///
/// # Arguments
/// * `text` - WHERE predicate, or an ordering clause starting with `ORDER BY`
/// * `mode` - accepted language
///
/// # Returns
/// `Result<FilterExpr, FilterError>`; syntax errors never touch any state.
pub fn parse_filter(text: &str, mode: ParseMode) -> Result<FilterExpr, FilterError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FilterError::Syntax("empty expression".to_string()));
    }
    let sql = if starts_with_order_by(text) {
        format!("SELECT _row FROM {} {}", SOURCE_NAME, text)
    } else {
        format!("SELECT _row FROM {} WHERE {}", SOURCE_NAME, text)
    };

    let mut statements = Parser::parse_sql(&PostgreSqlDialect {}, &sql)?;
    if statements.len() != 1 {
        return Err(FilterError::Syntax(format!(
            "expected one statement, got {}",
            statements.len()
        )));
    }
    let expr = match statements.remove(0) {
        Statement::Query(query) => compile_query(*query)?,
        other => {
            return Err(FilterError::Syntax(format!("not a SELECT: {}", other)));
        }
    };

    if mode == ParseMode::Strict {
        let strict = expr.predicate.as_ref().map_or(true, Predicate::is_strict)
            && expr.order_by.is_empty()
            && expr.limit.is_none()
            && expr.offset.is_none();
        if !strict {
            return Err(FilterError::Unsupported(format!(
                "'{}' uses more than equality and AND",
                expr
            )));
        }
    }
    Ok(expr)
}

fn compile_query(query: Query) -> Result<FilterExpr, FilterError> {
    let Query {
        body,
        order_by,
        limit,
        offset,
        ..
    } = query;
    let select = match *body {
        SetExpr::Select(select) => select,
        other => return Err(FilterError::Syntax(format!("not a plain SELECT: {}", other))),
    };
    if select.from.len() != 1 {
        return Err(FilterError::Syntax("filter must read a single source".to_string()));
    }

    Ok(FilterExpr {
        predicate: select.selection.map(compile_predicate).transpose()?,
        order_by: order_by
            .into_iter()
            .map(compile_order)
            .collect::<Result<_, _>>()?,
        limit: limit.map(compile_count).transpose()?,
        offset: offset.map(|Offset { value, .. }| compile_count(value)).transpose()?,
    })
}

fn compile_order(term: OrderByExpr) -> Result<OrderTerm, FilterError> {
    let column = match term.expr {
        Expr::Value(SqlValue::Number(n, _)) => {
            let position: usize = n
                .parse()
                .map_err(|_| FilterError::Syntax(format!("bad column position {}", n)))?;
            let index = position
                .checked_sub(1)
                .ok_or_else(|| FilterError::Syntax("column positions start at 1".to_string()))?;
            ColumnRef::Index(index)
        }
        other => match compile_operand(other)? {
            Operand::Column(c) => c,
            Operand::Literal(v) => {
                return Err(FilterError::Unsupported(format!("ORDER BY literal {}", v)))
            }
        },
    };
    Ok(OrderTerm {
        column,
        ascending: term.asc.unwrap_or(true),
    })
}

fn compile_count(expr: Expr) -> Result<usize, FilterError> {
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => n
            .parse()
            .map_err(|_| FilterError::Syntax(format!("bad count {}", n))),
        other => Err(FilterError::Unsupported(format!("count {}", other))),
    }
}

fn column_ref(name: &str) -> ColumnRef {
    if let Some(digits) = name.strip_prefix('_') {
        if let Ok(n) = digits.parse::<usize>() {
            if n > 0 {
                return ColumnRef::Index(n - 1);
            }
        }
    }
    ColumnRef::Name(name.to_string())
}

fn compile_literal(value: SqlValue) -> Result<Value, FilterError> {
    match value {
        SqlValue::Number(n, _) => n
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| n.parse::<f64>().map(Value::Float))
            .map_err(|_| FilterError::Syntax(format!("bad number {}", n))),
        SqlValue::SingleQuotedString(s) => Ok(Value::Text(s)),
        SqlValue::Boolean(b) => Ok(Value::Bool(b)),
        SqlValue::Null => Ok(Value::Null),
        other => Err(FilterError::Unsupported(format!("literal {}", other))),
    }
}

fn compile_operand(expr: Expr) -> Result<Operand, FilterError> {
    match expr {
        Expr::Identifier(ident) => Ok(Operand::Column(column_ref(&ident.value))),
        Expr::CompoundIdentifier(parts) => match parts.last() {
            Some(ident) => Ok(Operand::Column(column_ref(&ident.value))),
            None => Err(FilterError::Syntax("empty identifier".to_string())),
        },
        Expr::Value(v) => compile_literal(v).map(Operand::Literal),
        Expr::Nested(inner) => compile_operand(*inner),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match compile_operand(*expr)? {
            Operand::Literal(Value::Int(i)) => Ok(Operand::Literal(Value::Int(-i))),
            Operand::Literal(Value::Float(x)) => Ok(Operand::Literal(Value::Float(-x))),
            other => Err(FilterError::Unsupported(format!("negation of {}", other))),
        },
        other => Err(FilterError::Unsupported(other.to_string())),
    }
}

fn compile_literal_expr(expr: Expr) -> Result<Value, FilterError> {
    match compile_operand(expr)? {
        Operand::Literal(v) => Ok(v),
        Operand::Column(c) => Err(FilterError::Unsupported(format!(
            "column {} where a literal is expected",
            c
        ))),
    }
}

fn compile_predicate(expr: Expr) -> Result<Predicate, FilterError> {
    match expr {
        Expr::Nested(inner) => compile_predicate(*inner),
        Expr::BinaryOp { left, op, right } => {
            let op = match op {
                BinaryOperator::And => {
                    return Ok(Predicate::And(
                        Box::new(compile_predicate(*left)?),
                        Box::new(compile_predicate(*right)?),
                    ))
                }
                BinaryOperator::Or => {
                    return Ok(Predicate::Or(
                        Box::new(compile_predicate(*left)?),
                        Box::new(compile_predicate(*right)?),
                    ))
                }
                BinaryOperator::Eq => CompareOp::Eq,
                BinaryOperator::NotEq => CompareOp::NotEq,
                BinaryOperator::Lt => CompareOp::Lt,
                BinaryOperator::LtEq => CompareOp::LtEq,
                BinaryOperator::Gt => CompareOp::Gt,
                BinaryOperator::GtEq => CompareOp::GtEq,
                other => return Err(FilterError::Unsupported(format!("operator {}", other))),
            };
            Ok(Predicate::Compare {
                left: compile_operand(*left)?,
                op,
                right: compile_operand(*right)?,
            })
        }
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => Ok(Predicate::Not(Box::new(compile_predicate(*expr)?))),
        Expr::IsNull(inner) => Ok(Predicate::IsNull {
            operand: compile_operand(*inner)?,
            negated: false,
        }),
        Expr::IsNotNull(inner) => Ok(Predicate::IsNull {
            operand: compile_operand(*inner)?,
            negated: true,
        }),
        Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => match compile_literal_expr(*pattern)? {
            Value::Text(pattern) => Ok(Predicate::Like {
                operand: compile_operand(*expr)?,
                pattern,
                negated,
            }),
            other => Err(FilterError::Unsupported(format!("LIKE pattern {}", other))),
        },
        Expr::InList {
            expr,
            list,
            negated,
        } => Ok(Predicate::InList {
            operand: compile_operand(*expr)?,
            list: list
                .into_iter()
                .map(compile_literal_expr)
                .collect::<Result<_, _>>()?,
            negated,
        }),
        Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Predicate::Between {
            operand: compile_operand(*expr)?,
            low: compile_literal_expr(*low)?,
            high: compile_literal_expr(*high)?,
            negated,
        }),
        other => compile_operand(other).map(Predicate::Truth),
    }
}
