//! Text builtins over string values.

use std::sync::Arc;

use toolgraph_common::{CalcError, StringValue, Value};

use super::utils::{number_arg, string_arg};
use crate::function::{FnCaps, Function};
use crate::interpreter::ArgumentHandle;
use crate::traits::EvaluationContext;

/* ─────────────────────────── {concat a, b, ...} ──────────────────────────── */

struct ConcatFn;

impl Function for ConcatFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT
    }
    fn name(&self) -> &'static str {
        "concat"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let mut acc = string_arg(args, 0)?;
        for index in 1..args.len() {
            acc = acc.concat(&string_arg(args, index)?)?;
        }
        Ok(Value::String(acc))
    }
}

/* ─────────────────────────── {format number, spec} ──────────────────────────── */

struct FormatFn;

impl Function for FormatFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT
    }
    fn name(&self) -> &'static str {
        "format"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let number = number_arg(args, 0)?;
        let spec = string_arg(args, 1)?;
        Ok(Value::String(StringValue::format_number(&number, &spec)?))
    }
}

/* ─────────────────────────── {join v, sep [, rowsep]} ──────────────────────────── */

struct JoinFn;

impl Function for JoinFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT
    }
    fn name(&self) -> &'static str {
        "join"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let strings = string_arg(args, 0)?;
        let col_sep = string_arg(args, 1)?;
        let row_sep = match args.get(2) {
            Some(_) => Some(string_arg(args, 2)?),
            None => None,
        };
        Ok(Value::String(strings.join(
            col_sep.first().unwrap_or(""),
            row_sep.as_ref().and_then(|s| s.first()),
        )))
    }
}

/* ─────────────────────────── {split s, sep [, rowsep]} ──────────────────────────── */

struct SplitFn;

impl Function for SplitFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT
    }
    fn name(&self) -> &'static str {
        "split"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let strings = string_arg(args, 0)?;
        let col_sep = string_arg(args, 1)?;
        let row_sep = match args.get(2) {
            Some(_) => Some(string_arg(args, 2)?),
            None => None,
        };
        Ok(Value::String(strings.split(
            col_sep.first().unwrap_or(""),
            row_sep.as_ref().and_then(|s| s.first()),
        )?))
    }
}

/* ─────────────────────────── regex: {match rx, s} … ──────────────────────────── */

struct MatchFn;

impl Function for MatchFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT
    }
    fn name(&self) -> &'static str {
        "match"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let pattern = string_arg(args, 0)?;
        let strings = string_arg(args, 1)?;
        Ok(Value::String(strings.match_pattern(&pattern)?))
    }
}

struct ReplaceFn;

impl Function for ReplaceFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT
    }
    fn name(&self) -> &'static str {
        "replace"
    }
    fn min_args(&self) -> usize {
        3
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let pattern = string_arg(args, 0)?;
        let replacement = string_arg(args, 1)?;
        let strings = string_arg(args, 2)?;
        Ok(Value::String(
            strings.replace_pattern(&pattern, &replacement)?,
        ))
    }
}

struct FindFn;

impl Function for FindFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT
    }
    fn name(&self) -> &'static str {
        "find"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let pattern = string_arg(args, 0)?;
        let strings = string_arg(args, 1)?;
        Ok(Value::Number(strings.find_pattern(&pattern)?))
    }
}

/* ─────────────────────────── case / substring / length ──────────────────────────── */

struct CaseFn {
    name: &'static str,
    upper: bool,
}

impl Function for CaseFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT | FnCaps::ELEMENTWISE
    }
    fn name(&self) -> &'static str {
        self.name
    }
    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let strings = string_arg(args, 0)?;
        Ok(Value::String(if self.upper {
            strings.to_upper()
        } else {
            strings.to_lower()
        }))
    }
}

struct SubstrFn;

impl Function for SubstrFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT | FnCaps::ELEMENTWISE
    }
    fn name(&self) -> &'static str {
        "substr"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let strings = string_arg(args, 0)?;
        let start = number_arg(args, 1)?;
        let length = match args.get(2) {
            Some(_) => Some(number_arg(args, 2)?),
            None => None,
        };
        Ok(Value::String(strings.substring(&start, length.as_ref())?))
    }
}

struct StrlenFn;

impl Function for StrlenFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT | FnCaps::ELEMENTWISE
    }
    fn name(&self) -> &'static str {
        "strlen"
    }
    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        Ok(Value::Number(string_arg(args, 0)?.char_counts()))
    }
}

/* ─────────────────────────── {indexof strings, target} ──────────────────────────── */

struct IndexOfFn;

impl Function for IndexOfFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::TEXT
    }
    fn name(&self) -> &'static str {
        "indexof"
    }
    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        let strings = string_arg(args, 0)?;
        let target = string_arg(args, 1)?;
        Ok(Value::Number(strings.index_of(target.first().unwrap_or(""))))
    }
}

pub fn register_builtins() {
    use crate::function_registry::register_function;

    register_function(Arc::new(ConcatFn));
    register_function(Arc::new(FormatFn));
    register_function(Arc::new(JoinFn));
    register_function(Arc::new(SplitFn));
    register_function(Arc::new(MatchFn));
    register_function(Arc::new(ReplaceFn));
    register_function(Arc::new(FindFn));
    register_function(Arc::new(CaseFn {
        name: "upper",
        upper: true,
    }));
    register_function(Arc::new(CaseFn {
        name: "lower",
        upper: false,
    }));
    register_function(Arc::new(SubstrFn));
    register_function(Arc::new(StrlenFn));
    register_function(Arc::new(IndexOfFn));
}
