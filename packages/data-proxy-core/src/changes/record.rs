use std::collections::BTreeMap;

use crate::types::{Value, ValueAttributes};

/// Pending value of a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeValue {
    /// `None` is either NULL or "use the column default", see the flags
    pub value: Option<Value>,
    pub attributes: ValueAttributes,
}

impl ChangeValue {
    /// Explicit value (NULL is stored as `None` with `IS_NULL`).
    pub fn new(value: Value, base: ValueAttributes) -> Self {
        let mut attributes = base - ValueAttributes::IS_DEFAULT - ValueAttributes::IS_UNCHANGED;
        attributes.set(ValueAttributes::IS_NULL, value.is_null());
        let value = if value.is_null() { None } else { Some(value) };
        Self { value, attributes }
    }

    /// Column default, resolved by the base table on commit.
    pub fn default_of(default: Option<Value>, base: ValueAttributes) -> Self {
        let mut attributes = (base | ValueAttributes::IS_DEFAULT) - ValueAttributes::IS_UNCHANGED;
        attributes.set(
            ValueAttributes::IS_NULL,
            default.as_ref().map_or(true, Value::is_null),
        );
        Self {
            value: default,
            attributes,
        }
    }

    pub fn is_default(&self) -> bool {
        self.attributes.contains(ValueAttributes::IS_DEFAULT)
    }

    pub fn is_null(&self) -> bool {
        self.attributes.contains(ValueAttributes::IS_NULL)
    }

    pub fn can_be_null(&self) -> bool {
        self.attributes.contains(ValueAttributes::CAN_BE_NULL)
    }

    pub fn has_original(&self) -> bool {
        self.attributes.contains(ValueAttributes::HAS_VALUE_ORIG)
    }

    /// Value as read through the proxy.
    pub fn current(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }
}

/// Pending changes of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Row in the base table, `None` for a row that only exists here
    pub base_row: Option<usize>,
    pub marked_for_delete: bool,
    pub overrides: BTreeMap<usize, ChangeValue>,
    /// Base row values when the record was created
    pub original: Option<Vec<Value>>,
    /// Creation order, used to process records newest first
    pub(crate) seq: u64,
}

impl ChangeRecord {
    pub(crate) fn for_base_row(row: usize, original: Vec<Value>, seq: u64) -> Self {
        Self {
            base_row: Some(row),
            marked_for_delete: false,
            overrides: BTreeMap::new(),
            original: Some(original),
            seq,
        }
    }

    pub(crate) fn for_new_row(seq: u64) -> Self {
        Self {
            base_row: None,
            marked_for_delete: false,
            overrides: BTreeMap::new(),
            original: None,
            seq,
        }
    }

    pub fn is_new(&self) -> bool {
        self.base_row.is_none()
    }

    /// An existing row with nothing pending.
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && !self.marked_for_delete
    }

    pub fn original_value(&self, col: usize) -> Option<&Value> {
        self.original.as_ref().and_then(|o| o.get(col))
    }
}
