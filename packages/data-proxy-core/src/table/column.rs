//! Column definition of a base table.

use serde::{Deserialize, Serialize};

use crate::types::{Value, ValueAttributes, ValueType};

/// Column definition of a base table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Declared value type
    pub value_type: ValueType,
    /// Whether NULL is accepted
    #[serde(default = "default_true")]
    pub allow_null: bool,
    /// Value used when a row is written without this column
    #[serde(default)]
    pub default: Option<Value>,
    /// Value generated by the table on insert
    #[serde(default)]
    pub auto_increment: bool,
    /// Column can never be written through the proxy
    #[serde(default)]
    pub read_only: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnSpec {
    /// Creates a nullable column without default.
    ///
    /// # Arguments
    /// * `name` - Column name
    /// * `value_type` - Declared type
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            allow_null: true,
            default: None,
            auto_increment: false,
            read_only: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Whether the table can fill the column on its own.
    pub fn can_be_default(&self) -> bool {
        self.default.is_some() || self.auto_increment
    }

    /// Attributes every cell of this column starts with.
    pub fn base_attributes(&self) -> ValueAttributes {
        let mut attrs = ValueAttributes::empty();
        if self.allow_null {
            attrs |= ValueAttributes::CAN_BE_NULL;
        }
        if self.can_be_default() {
            attrs |= ValueAttributes::CAN_BE_DEFAULT;
        }
        if self.read_only {
            attrs |= ValueAttributes::READ_ONLY;
        }
        attrs
    }
}
