//! Filter and ordering expressions, delegated to a query executor.
//!
//! Text is read as a WHERE predicate, or as an ordering clause when it
//! starts with `ORDER BY`. Columns are named, or written `_N` for the N-th
//! column (1-based).

mod executor;
mod expr;
mod parser;

pub use executor::{QueryExecutor, ScanExecutor, SourceView};
pub use expr::{ColumnRef, CompareOp, FilterExpr, Operand, OrderTerm, Predicate};
pub use parser::{parse_filter, ParseMode, SOURCE_NAME};
