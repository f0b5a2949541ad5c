//! Structural builtins: reshaping, ordering, selection, table access.

use std::sync::Arc;

use toolgraph_common::{CalcError, CalcErrorKind, Value};

use super::utils::{number_arg, string_arg, table_arg, usize_arg};
use crate::function::{FnCaps, Function};
use crate::interpreter::ArgumentHandle;
use crate::traits::EvaluationContext;

/* ─────────────────────────── {transpose v} ──────────────────────────── */

struct TransposeFn;

impl Function for TransposeFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::STRUCTURAL
    }
    fn name(&self) -> &'static str {
        "transpose"
    }
    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        match args[0].value()? {
            Value::Number(v) => Ok(Value::Number(v.transpose())),
            Value::String(v) => Ok(Value::String(v.transpose())),
            Value::Table(v) => Ok(Value::Number(v.number_value()?.transpose())),
        }
    }
}

/* ─────────────────────────── {append a, b, ...} ──────────────────────────── */

struct AppendFn;

impl Function for AppendFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::STRUCTURAL
    }
    fn name(&self) -> &'static str {
        "append"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let mut acc = args[0].value()?;
        for index in 1..args.len() {
            acc = match (acc, args[index].value()?) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a.append(&b)?),
                (Value::String(a), Value::String(b)) => Value::String(a.append(&b)?),
                (a, b) => {
                    return Err(CalcError::new(CalcErrorKind::UnknownValue)
                        .with_param("left", a.kind_name())
                        .with_param("right", b.kind_name()));
                }
            };
        }
        Ok(acc)
    }
}

/* ─────────────────────────── {redim v, ncols} ──────────────────────────── */

struct RedimFn;

impl Function for RedimFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::STRUCTURAL
    }
    fn name(&self) -> &'static str {
        "redim"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let new_cols = usize_arg(args, 1)?;
        match args[0].value()? {
            Value::Number(v) => Ok(Value::Number(v.redimension(new_cols)?)),
            Value::String(v) => Ok(Value::String(v.redimension(new_cols)?)),
            Value::Table(v) => Ok(Value::Number(v.number_value()?.redimension(new_cols)?)),
        }
    }
}

/* ─────────────────────────── {indexsort v} / {sort v} ──────────────────────────── */

struct IndexSortFn;

impl Function for IndexSortFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::STRUCTURAL
    }
    fn name(&self) -> &'static str {
        "indexsort"
    }
    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        Ok(Value::Number(number_arg(args, 0)?.index_sort()))
    }
}

struct SortFn;

impl Function for SortFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::STRUCTURAL
    }
    fn name(&self) -> &'static str {
        "sort"
    }
    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        match args[0].value()? {
            Value::Number(v) => {
                let order: Vec<usize> =
                    v.index_sort().data().iter().map(|&i| i as usize).collect();
                Ok(Value::Number(v.rows_by_index(&order)?))
            }
            Value::Table(table) => {
                let keys = table.number_value()?;
                let order: Vec<usize> =
                    keys.index_sort().data().iter().map(|&i| i as usize).collect();
                Ok(Value::Table(table.rows_by_index(&order)?))
            }
            other => Err(CalcError::new(CalcErrorKind::UnknownValue)
                .with_param("expected", "number or table")
                .with_param("got", other.kind_name())),
        }
    }
}

/* ─────────────────────────── {select v, mask} ──────────────────────────── */

struct SelectFn;

impl Function for SelectFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::STRUCTURAL
    }
    fn name(&self) -> &'static str {
        "select"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let mask = number_arg(args, 1)?;
        match args[0].value()? {
            Value::Number(v) => Ok(Value::Number(v.select(&mask)?)),
            Value::String(v) => Ok(Value::String(v.select(&mask)?)),
            Value::Table(v) => {
                let indices: Vec<usize> = mask
                    .data()
                    .iter()
                    .enumerate()
                    .filter(|&(_, &keep)| keep != 0.0)
                    .map(|(i, _)| i + 1)
                    .collect();
                Ok(Value::Table(v.rows_by_index(&indices)?))
            }
        }
    }
}

/* ─────────────────────────── {filter table, predicate} ──────────────────────────── */

/// Row selection through the predicate mini-language, e.g.
/// `{filter t, "X > 3 m & name != bob"}`.
struct FilterFn;

impl Function for FilterFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::STRUCTURAL
    }
    fn name(&self) -> &'static str {
        "filter"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let table = table_arg(args, 0)?;
        let predicate = string_arg(args, 1)?;
        let selected = table.select_rows(predicate.first().unwrap_or(""), ctx.units())?;
        Ok(Value::Table(selected))
    }
}

/* ─────────────────────────── shape probes ──────────────────────────── */

struct NRowsFn;

impl Function for NRowsFn {
    fn name(&self) -> &'static str {
        "nrows"
    }
    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        Ok(Value::scalar_number(args[0].value()?.shape().0 as f64))
    }
}

struct NColsFn;

impl Function for NColsFn {
    fn name(&self) -> &'static str {
        "ncols"
    }
    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        Ok(Value::scalar_number(args[0].value()?.shape().1 as f64))
    }
}

/* ─────────────────────────── table probes ──────────────────────────── */

struct ColNamesFn;

impl Function for ColNamesFn {
    fn name(&self) -> &'static str {
        "colnames"
    }
    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        Ok(Value::String(table_arg(args, 0)?.column_names()))
    }
}

struct NumberValueFn;

impl Function for NumberValueFn {
    fn name(&self) -> &'static str {
        "numbervalue"
    }
    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        Ok(Value::Number(args[0].value()?.number_value()?))
    }
}

pub fn register_builtins() {
    use crate::function_registry::register_function;

    register_function(Arc::new(TransposeFn));
    register_function(Arc::new(AppendFn));
    register_function(Arc::new(RedimFn));
    register_function(Arc::new(IndexSortFn));
    register_function(Arc::new(SortFn));
    register_function(Arc::new(SelectFn));
    register_function(Arc::new(FilterFn));
    register_function(Arc::new(NRowsFn));
    register_function(Arc::new(NColsFn));
    register_function(Arc::new(ColNamesFn));
    register_function(Arc::new(NumberValueFn));
}
