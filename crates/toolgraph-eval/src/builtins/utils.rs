//! Shared argument coercion helpers for the builtin catalog.

use toolgraph_common::{CalcError, CalcErrorKind, NumberValue, StringValue, TableValue, Value};

use crate::interpreter::ArgumentHandle;

/// Numeric view of one argument (tables flatten their numeric columns).
pub(crate) fn number_arg(args: &[ArgumentHandle], index: usize) -> Result<NumberValue, CalcError> {
    args[index].value()?.number_value()
}

pub(crate) fn string_arg(args: &[ArgumentHandle], index: usize) -> Result<StringValue, CalcError> {
    match args[index].value()? {
        Value::String(s) => Ok(s),
        other => Err(CalcError::new(CalcErrorKind::UnknownValue)
            .with_param("expected", "string")
            .with_param("got", other.kind_name())),
    }
}

pub(crate) fn table_arg(args: &[ArgumentHandle], index: usize) -> Result<TableValue, CalcError> {
    match args[index].value()? {
        Value::Table(t) => Ok(t),
        other => Err(CalcError::new(CalcErrorKind::UnknownValue)
            .with_param("expected", "table")
            .with_param("got", other.kind_name())),
    }
}

/// A scalar usable as a count or column index.
pub(crate) fn usize_arg(args: &[ArgumentHandle], index: usize) -> Result<usize, CalcError> {
    let value = number_arg(args, index)?;
    let raw = value.first().unwrap_or(0.0);
    if raw < 0.0 {
        return Err(CalcError::new(CalcErrorKind::IndexOutOfBounds)
            .with_param("index", raw.to_string()));
    }
    Ok(raw as usize)
}
