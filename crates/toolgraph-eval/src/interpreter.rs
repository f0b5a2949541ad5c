//! Operator-tree evaluation.
//!
//! Every node evaluates purely in terms of its children and the value
//! model; the interpreter holds no caches and no mutable state beyond the
//! bounded recursion counters embedded in reference nodes.

use toolgraph_common::{
    CalcError, CalcErrorKind, ColumnData, NumberOp, NumberValue, StringValue, UnitRegistry, Value,
    dimensions_equal,
};
use toolgraph_parse::{BinaryOp, OpNode, UnaryOp};

use crate::scope::Scope;
use crate::traits::{EvaluationContext, ToolRc};

/// Re-entry bound for a single reference node. Mutually-referencing
/// formulas hit this before any stack depth becomes dangerous; the value
/// is part of the termination contract and must not change.
pub const RECURSION_LIMIT: u8 = 3;

pub struct Interpreter<'a> {
    scope: &'a Scope,
}

impl<'a> Interpreter<'a> {
    pub fn new(scope: &'a Scope) -> Self {
        Interpreter { scope }
    }

    /// The tool on whose behalf references are being read; every value
    /// observation registers it as a requestor.
    fn requestor(&self) -> Option<&ToolRc> {
        Some(&self.scope.current)
    }

    pub fn evaluate(&self, node: &OpNode) -> Result<Value, CalcError> {
        match node {
            OpNode::NumberConstant(v) => Ok(Value::scalar_number(*v)),
            OpNode::StringConstant(s) => Ok(Value::scalar_string(s.clone())),
            OpNode::UnitConstant { value, unit } => Ok(Value::Number(
                NumberValue::scalar_with_dims(unit.to_base(*value), unit.dims),
            )),
            OpNode::Reference { path, depth } => self.eval_reference(path, depth),
            OpNode::Unary { op, expr } => self.eval_unary(*op, expr),
            OpNode::Binary { op, left, right } => self.eval_binary(*op, left, right),
            OpNode::Function { name, args } => self.eval_function(name, args),
            OpNode::Index { target, args } => self.eval_index(target, args),
        }
    }

    /* ===================  references  =================== */

    fn eval_reference(
        &self,
        path: &str,
        depth: &std::cell::Cell<u8>,
    ) -> Result<Value, CalcError> {
        if depth.get() >= RECURSION_LIMIT {
            return Err(CalcError::new(CalcErrorKind::Recursion).with_param("path", path));
        }
        depth.set(depth.get() + 1);
        let resolved = self.scope.resolve_value(path, self.requestor());
        depth.set(depth.get() - 1);
        resolved.ok_or_else(|| {
            CalcError::new(CalcErrorKind::UnknownValue).with_param("path", path)
        })
    }

    /* ===================  operators  =================== */

    fn eval_unary(&self, op: UnaryOp, expr: &OpNode) -> Result<Value, CalcError> {
        let value = self.evaluate(expr)?;
        match op {
            UnaryOp::Minus => value.negated(),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &OpNode,
        right: &OpNode,
    ) -> Result<Value, CalcError> {
        if op == BinaryOp::Range {
            return self.eval_range(left, right);
        }
        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;
        let op = match op {
            BinaryOp::Add => NumberOp::Add,
            BinaryOp::Subtract => NumberOp::Subtract,
            BinaryOp::Multiply => NumberOp::Multiply,
            BinaryOp::Divide => NumberOp::Divide,
            BinaryOp::Modulo => NumberOp::Modulo,
            BinaryOp::Power => NumberOp::Power,
            BinaryOp::Range => unreachable!(),
        };
        Value::numeric_binary(op, &l, &r)
    }

    /// `a:b` generates the inclusive column vector from a to b. Both ends
    /// must share dimensions, which the result keeps.
    fn eval_range(&self, left: &OpNode, right: &OpNode) -> Result<Value, CalcError> {
        let start = self.evaluate(left)?.number_value()?;
        let end = self.evaluate(right)?.number_value()?;
        if !dimensions_equal(start.dims(), end.dims()) {
            return Err(CalcError::new(CalcErrorKind::UnitMismatch)
                .with_param("left", start.dims().to_string())
                .with_param("right", end.dims().to_string()));
        }
        let (Some(a), Some(b)) = (start.first(), end.first()) else {
            return Err(CalcError::new(CalcErrorKind::UnknownValue)
                .with_param("reason", "empty range bound"));
        };
        Ok(Value::Number(NumberValue::sequence(a, b, *start.dims())))
    }

    /* ===================  function calls  =================== */

    fn eval_function(&self, name: &str, args: &[OpNode]) -> Result<Value, CalcError> {
        let function = crate::function_registry::get(name).ok_or_else(|| {
            CalcError::new(CalcErrorKind::UnknownFunction).with_param("name", name)
        })?;
        let handles: Vec<ArgumentHandle> =
            args.iter().map(|node| ArgumentHandle::new(node, self)).collect();
        function.eval(&handles, self)
    }

    /* ===================  index / lookup  =================== */

    /// `target[rows]` / `target[rows, cols]`. A numeric index selects
    /// 1-based rows/columns, 0 selects all; a string column index names a
    /// table column. Selecting a single table column yields the bare
    /// column value.
    fn eval_index(&self, target: &OpNode, args: &[OpNode]) -> Result<Value, CalcError> {
        let target = self.evaluate(target)?;
        let row_spec = self.evaluate(&args[0])?;
        let col_spec = match args.get(1) {
            Some(node) => Some(self.evaluate(node)?),
            None => None,
        };

        match target {
            Value::Number(matrix) => {
                let rows = index_list(&row_spec, matrix.rows())?;
                let picked = matrix.rows_by_index(&rows)?;
                match col_spec {
                    None => Ok(Value::Number(picked)),
                    Some(spec) => {
                        let cols = index_list(&spec, picked.cols())?;
                        let mut data = Vec::with_capacity(rows.len() * cols.len());
                        for row in 1..=picked.rows() {
                            for &col in &cols {
                                data.push(picked.at(row, col)?);
                            }
                        }
                        Ok(Value::Number(NumberValue::new(
                            picked.rows(),
                            cols.len(),
                            *picked.dims(),
                            data,
                        )))
                    }
                }
            }
            Value::String(matrix) => {
                let rows = index_list(&row_spec, matrix.rows())?;
                let picked = matrix.rows_by_index(&rows)?;
                match col_spec {
                    None => Ok(Value::String(picked)),
                    Some(spec) => {
                        let cols = index_list(&spec, picked.cols())?;
                        let mut data = Vec::with_capacity(rows.len() * cols.len());
                        for row in 1..=picked.rows() {
                            for &col in &cols {
                                data.push(picked.at(row, col)?.to_string());
                            }
                        }
                        Ok(Value::String(StringValue::new(
                            picked.rows(),
                            cols.len(),
                            data,
                        )))
                    }
                }
            }
            Value::Table(table) => {
                let rows = index_list(&row_spec, table.rows())?;
                let picked = table.rows_by_index(&rows)?;
                match col_spec {
                    None => Ok(Value::Table(picked)),
                    Some(Value::String(name)) => {
                        let name = name.first().unwrap_or("");
                        let column = picked.column_named(name).ok_or_else(|| {
                            CalcError::new(CalcErrorKind::UnknownValue)
                                .with_param("column", name)
                        })?;
                        Ok(column_value(&column.data))
                    }
                    Some(spec) => {
                        let cols = index_list(&spec, picked.column_count())?;
                        if cols.len() == 1 {
                            let column = &picked.columns()[cols[0] - 1];
                            return Ok(column_value(&column.data));
                        }
                        let columns: Vec<_> = cols
                            .iter()
                            .map(|&c| picked.columns()[c - 1].clone())
                            .collect();
                        Ok(Value::Table(toolgraph_common::TableValue::new(columns)?))
                    }
                }
            }
        }
    }
}

fn column_value(data: &ColumnData) -> Value {
    match data {
        ColumnData::Number(v) => Value::Number(v.clone()),
        ColumnData::String(v) => Value::String(v.clone()),
    }
}

/// Expand an index operand into a list of 1-based positions. Zero (or an
/// all-zero vector) means "all of them"; anything out of range raises.
fn index_list(spec: &Value, count: usize) -> Result<Vec<usize>, CalcError> {
    let numbers = spec.number_value().map_err(|_| {
        CalcError::new(CalcErrorKind::UnknownValue)
            .with_param("reason", "index must be numeric")
    })?;
    if numbers.first() == Some(0.0) && numbers.value_count() == 1 {
        return Ok((1..=count).collect());
    }
    let mut out = Vec::with_capacity(numbers.value_count());
    for &raw in numbers.data() {
        let index = raw as usize;
        if index == 0 || index > count {
            return Err(CalcError::new(CalcErrorKind::IndexOutOfBounds)
                .with_param("index", (raw as i64).to_string())
                .with_param("count", count.to_string()));
        }
        out.push(index);
    }
    Ok(out)
}

impl EvaluationContext for Interpreter<'_> {
    fn units(&self) -> &UnitRegistry {
        UnitRegistry::global()
    }
}

/// Lazily evaluated argument, in the style of the catalog's call
/// convention: functions receive handles and pull only what they need.
pub struct ArgumentHandle<'a, 'b> {
    node: &'a OpNode,
    interpreter: &'a Interpreter<'b>,
}

impl<'a, 'b> ArgumentHandle<'a, 'b> {
    pub fn new(node: &'a OpNode, interpreter: &'a Interpreter<'b>) -> Self {
        ArgumentHandle { node, interpreter }
    }

    pub fn value(&self) -> Result<Value, CalcError> {
        self.interpreter.evaluate(self.node)
    }

    pub fn node(&self) -> &OpNode {
        self.node
    }
}
