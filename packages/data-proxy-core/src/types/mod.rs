//! Typed cell values and per-cell attribute flags.

mod attributes;
mod value;

pub use attributes::ValueAttributes;
pub use value::{Value, ValueType};
