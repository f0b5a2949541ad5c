//! Numeric builtins: elementwise maps and the nine axis reductions.

use std::f64::consts::PI;
use std::sync::Arc;

use toolgraph_common::{
    CalcError, CalcErrorKind, Dimensions, NumberValue, Value,
};

use super::utils::number_arg;
use crate::function::{FnCaps, Function};
use crate::interpreter::ArgumentHandle;
use crate::traits::EvaluationContext;

/// How an elementwise map treats its operand's dimensions.
#[derive(Clone, Copy)]
enum DimRule {
    /// Result keeps the operand's dimensions (abs, int).
    Keep,
    /// Operand dimensions halve (sqrt).
    Halve,
    /// Operand must be dimensionless (transcendentals).
    Dimensionless,
}

/// An elementwise numeric function defined by a plain `f64 -> f64` map.
struct MapFn {
    name: &'static str,
    rule: DimRule,
    f: fn(f64) -> f64,
}

impl Function for MapFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::ELEMENTWISE
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
        let operand = number_arg(args, 0)?;
        let dims = match self.rule {
            DimRule::Keep => *operand.dims(),
            DimRule::Halve => operand.dims().scaled(0.5),
            DimRule::Dimensionless => {
                if !operand.dims().is_dimensionless() {
                    return Err(CalcError::new(CalcErrorKind::UnitMismatch)
                        .with_param("function", self.name)
                        .with_param("dims", operand.dims().to_string()));
                }
                Dimensions::none()
            }
        };
        Ok(Value::Number(operand.map(dims, self.f)))
    }
}

/// A catalog entry backed by one of the value model's axis reductions.
struct AxisReduceFn {
    name: &'static str,
    reduce: fn(&NumberValue) -> NumberValue,
}

impl Function for AxisReduceFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::REDUCTION
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
        Ok(Value::Number((self.reduce)(&number_arg(args, 0)?)))
    }
}

/// An all-elements reduction spanning every argument: `{max 3, 7, 2}`.
/// Arguments must agree dimensionally.
struct SpreadReduceFn {
    name: &'static str,
    reduce: fn(&NumberValue) -> NumberValue,
    combine: fn(f64, f64) -> f64,
}

impl Function for SpreadReduceFn {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::REDUCTION
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
        let mut acc = (self.reduce)(&number_arg(args, 0)?);
        for index in 1..args.len() {
            let next = (self.reduce)(&number_arg(args, index)?);
            if !acc.dims().equal(next.dims()) {
                return Err(CalcError::new(CalcErrorKind::UnitMismatch)
                    .with_param("function", self.name)
                    .with_param("left", acc.dims().to_string())
                    .with_param("right", next.dims().to_string()));
            }
            let combined = (self.combine)(
                acc.first().unwrap_or(f64::NAN),
                next.first().unwrap_or(f64::NAN),
            );
            acc = NumberValue::scalar_with_dims(combined, *acc.dims());
        }
        Ok(Value::Number(acc))
    }
}

/* ─────────────────────────── PI ──────────────────────────── */

struct PiFn;

impl Function for PiFn {
    fn name(&self) -> &'static str {
        "pi"
    }

    fn eval(
        &self,
        _args: &[ArgumentHandle],
        _ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError> {
        Ok(Value::scalar_number(PI))
    }
}

pub fn register_builtins() {
    use crate::function_registry::register_function;

    register_function(Arc::new(PiFn));

    let maps: [(&'static str, DimRule, fn(f64) -> f64); 13] = [
        ("abs", DimRule::Keep, f64::abs),
        ("int", DimRule::Keep, f64::trunc),
        ("round", DimRule::Keep, f64::round),
        ("sqrt", DimRule::Halve, f64::sqrt),
        ("exp", DimRule::Dimensionless, f64::exp),
        ("ln", DimRule::Dimensionless, f64::ln),
        ("log", DimRule::Dimensionless, f64::log10),
        ("sin", DimRule::Dimensionless, f64::sin),
        ("cos", DimRule::Dimensionless, f64::cos),
        ("tan", DimRule::Dimensionless, f64::tan),
        ("asin", DimRule::Dimensionless, f64::asin),
        ("acos", DimRule::Dimensionless, f64::acos),
        ("atan", DimRule::Dimensionless, f64::atan),
    ];
    for (name, rule, f) in maps {
        register_function(Arc::new(MapFn { name, rule, f }));
    }

    let spreads: [(&'static str, fn(&NumberValue) -> NumberValue, fn(f64, f64) -> f64); 3] = [
        ("sum", NumberValue::sum_all, |a, b| a + b),
        ("max", NumberValue::max_all, f64::max),
        ("min", NumberValue::min_all, f64::min),
    ];
    for (name, reduce, combine) in spreads {
        register_function(Arc::new(SpreadReduceFn {
            name,
            reduce,
            combine,
        }));
    }

    let axes: [(&'static str, fn(&NumberValue) -> NumberValue); 6] = [
        ("sumrows", NumberValue::sum_rows),
        ("sumcols", NumberValue::sum_cols),
        ("maxrows", NumberValue::max_rows),
        ("maxcols", NumberValue::max_cols),
        ("minrows", NumberValue::min_rows),
        ("mincols", NumberValue::min_cols),
    ];
    for (name, reduce) in axes {
        register_function(Arc::new(AxisReduceFn { name, reduce }));
    }
}
