//! The polymorphic value model.
//!
//! `Value` is a closed tagged union; every operator matches it exhaustively,
//! so adding a kind is a compile-time event, not a runtime surprise. Values
//! are created fresh by every operation; nothing mutates a value already
//! handed to a caller.

pub mod broadcast;
pub mod number;
#[cfg(feature = "serde")]
pub mod repr;
pub mod strings;
pub mod table;

use crate::error::{CalcError, CalcErrorKind};

pub use number::{NumberOp, NumberValue};
pub use strings::StringValue;
pub use table::{ColumnData, TableColumn, TableValue};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(NumberValue),
    String(StringValue),
    Table(TableValue),
}

impl Value {
    pub fn scalar_number(v: f64) -> Value {
        Value::Number(NumberValue::scalar(v))
    }

    pub fn scalar_string<S: Into<String>>(s: S) -> Value {
        Value::String(StringValue::scalar(s))
    }

    /// Short kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) => "table",
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        match self {
            Value::Number(v) => v.shape(),
            Value::String(v) => v.shape(),
            Value::Table(v) => v.shape(),
        }
    }

    pub fn value_count(&self) -> usize {
        match self {
            Value::Number(v) => v.value_count(),
            Value::String(v) => v.value_count(),
            Value::Table(v) => v.value_count(),
        }
    }

    /// 1-based, bounds-checked element access returning a 1×1 value.
    pub fn at(&self, row: usize, col: usize) -> Result<Value, CalcError> {
        match self {
            Value::Number(v) => Ok(Value::Number(NumberValue::scalar_with_dims(
                v.at(row, col)?,
                *v.dims(),
            ))),
            Value::String(v) => Ok(Value::scalar_string(v.at(row, col)?)),
            Value::Table(v) => {
                let column = v.columns().get(col.wrapping_sub(1)).ok_or_else(|| {
                    CalcError::new(CalcErrorKind::IndexOutOfBounds)
                        .with_param("column", col.to_string())
                        .with_param("columns", v.column_count().to_string())
                })?;
                match &column.data {
                    ColumnData::Number(values) => Ok(Value::Number(
                        NumberValue::scalar_with_dims(values.at(row, 1)?, *values.dims()),
                    )),
                    ColumnData::String(values) => Ok(Value::scalar_string(values.at(row, 1)?)),
                }
            }
        }
    }

    pub fn as_number(&self) -> Option<&NumberValue> {
        match self {
            Value::Number(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringValue> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableValue> {
        match self {
            Value::Table(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view of this value: numbers pass through, tables flatten
    /// their numeric columns, strings have none.
    pub fn number_value(&self) -> Result<NumberValue, CalcError> {
        match self {
            Value::Number(v) => Ok(v.clone()),
            Value::Table(v) => v.number_value(),
            Value::String(_) => Err(CalcError::new(CalcErrorKind::UnknownValue)
                .with_param("reason", "string value has no numeric form")),
        }
    }

    /// The dyadic operator policy, written once: Number/Number combines
    /// directly, a Table operand applies the operation per numeric column
    /// (String columns untouched), and `+` on two strings concatenates.
    pub fn numeric_binary(op: NumberOp, left: &Value, right: &Value) -> Result<Value, CalcError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(op.apply(a, b)?)),
            (Value::Table(a), Value::Number(b)) => Ok(Value::Table(a.dyadic_number(op, b, true)?)),
            (Value::Number(a), Value::Table(b)) => Ok(Value::Table(b.dyadic_number(op, a, false)?)),
            (Value::Table(a), Value::Table(b)) => Ok(Value::Table(a.dyadic_table(op, b)?)),
            (Value::String(a), Value::String(b)) if op == NumberOp::Add => {
                Ok(Value::String(a.concat(b)?))
            }
            (a, b) => Err(CalcError::new(CalcErrorKind::UnknownValue)
                .with_param("left", a.kind_name())
                .with_param("right", b.kind_name())),
        }
    }

    /// Unary minus with the same Table pass-through policy.
    pub fn negated(&self) -> Result<Value, CalcError> {
        match self {
            Value::Number(v) => Ok(Value::Number(v.negated())),
            Value::Table(v) => Ok(Value::Table(v.map_numeric(|c| Ok(c.negated()))?)),
            Value::String(_) => Err(CalcError::new(CalcErrorKind::UnknownValue)
                .with_param("left", self.kind_name())),
        }
    }
}

impl From<NumberValue> for Value {
    fn from(v: NumberValue) -> Self {
        Value::Number(v)
    }
}

impl From<StringValue> for Value {
    fn from(v: StringValue) -> Self {
        Value::String(v)
    }
}

impl From<TableValue> for Value {
    fn from(v: TableValue) -> Self {
        Value::Table(v)
    }
}
