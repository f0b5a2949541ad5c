//! Table values: ordered named columns sharing one row count.
//!
//! Columns are independently typed (Number or String) and independently
//! unit-tagged. Dyadic numeric operations apply per numeric column while
//! String columns pass through unchanged, so a table behaves like a bundle
//! of parallel column vectors.

use std::sync::Arc;

use regex::Regex;

use crate::error::{CalcError, CalcErrorKind};
use crate::units::{Unit, UnitRegistry, dimensions_equal};
use crate::value::number::{NumberOp, NumberValue};
use crate::value::strings::StringValue;

/// Column payload, closed over the two column-capable value kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Number(NumberValue),
    String(StringValue),
}

impl ColumnData {
    pub fn rows(&self) -> usize {
        match self {
            ColumnData::Number(v) => v.rows(),
            ColumnData::String(v) => v.rows(),
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            ColumnData::Number(v) => v.cols(),
            ColumnData::String(v) => v.cols(),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, ColumnData::Number(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub data: ColumnData,
    /// Display unit applied at formatting/serialization boundaries only.
    pub display_unit: Option<Arc<Unit>>,
    pub format: Option<String>,
}

impl TableColumn {
    pub fn number<S: Into<String>>(name: S, data: NumberValue) -> Self {
        TableColumn {
            name: name.into(),
            data: ColumnData::Number(data),
            display_unit: None,
            format: None,
        }
    }

    pub fn string<S: Into<String>>(name: S, data: StringValue) -> Self {
        TableColumn {
            name: name.into(),
            data: ColumnData::String(data),
            display_unit: None,
            format: None,
        }
    }

    pub fn with_display_unit(mut self, unit: Arc<Unit>) -> Self {
        self.display_unit = Some(unit);
        self
    }

    pub fn with_format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = Some(format.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableValue {
    columns: Vec<TableColumn>,
    rows: usize,
}

impl TableValue {
    /// Columns must all be single-column values with one shared row count.
    pub fn new(columns: Vec<TableColumn>) -> Result<Self, CalcError> {
        let rows = columns.first().map(|c| c.data.rows()).unwrap_or(0);
        for column in &columns {
            if column.data.cols() != 1 || column.data.rows() != rows {
                return Err(CalcError::new(CalcErrorKind::ShapeMismatch)
                    .with_param("column", column.name.clone())
                    .with_param("rows", rows.to_string())
                    .with_param("columnRows", column.data.rows().to_string()));
            }
        }
        Ok(TableValue { columns, rows })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns.len())
    }

    pub fn value_count(&self) -> usize {
        self.rows * self.columns.len()
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    /// Case-insensitive column lookup.
    pub fn column_named(&self, name: &str) -> Option<&TableColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Column names as a 1×n string row.
    pub fn column_names(&self) -> StringValue {
        let names: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        StringValue::new(1, names.len(), names)
    }

    /// Flatten all numeric columns into one matrix. Every numeric column
    /// must share one dimension vector.
    pub fn number_value(&self) -> Result<NumberValue, CalcError> {
        let numeric: Vec<&TableColumn> =
            self.columns.iter().filter(|c| c.data.is_number()).collect();
        let Some(first) = numeric.first() else {
            return Err(CalcError::new(CalcErrorKind::UnknownValue)
                .with_param("reason", "table has no numeric columns"));
        };
        let ColumnData::Number(first_data) = &first.data else {
            unreachable!()
        };
        let dims = *first_data.dims();
        for column in &numeric {
            let ColumnData::Number(data) = &column.data else {
                unreachable!()
            };
            if !dimensions_equal(data.dims(), &dims) {
                return Err(CalcError::new(CalcErrorKind::MixedUnitsInNumericFlatten)
                    .with_param("column", column.name.clone())
                    .with_param("dims", data.dims().to_string())
                    .with_param("expected", dims.to_string()));
            }
        }
        let cols = numeric.len();
        let mut data = Vec::with_capacity(self.rows * cols);
        for row in 0..self.rows {
            for column in &numeric {
                let ColumnData::Number(values) = &column.data else {
                    unreachable!()
                };
                data.push(values.data()[row]);
            }
        }
        Ok(NumberValue::new(self.rows, cols, dims, data))
    }

    /// Rows of the table in the order given by 1-based `indices`.
    pub fn rows_by_index(&self, indices: &[usize]) -> Result<TableValue, CalcError> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let data = match &column.data {
                ColumnData::Number(v) => ColumnData::Number(v.rows_by_index(indices)?),
                ColumnData::String(v) => ColumnData::String(v.rows_by_index(indices)?),
            };
            columns.push(TableColumn {
                name: column.name.clone(),
                data,
                display_unit: column.display_unit.clone(),
                format: column.format.clone(),
            });
        }
        TableValue::new(columns)
    }

    /// Apply a numeric transform to each Number column, passing String
    /// columns through unchanged.
    pub fn map_numeric<F>(&self, f: F) -> Result<TableValue, CalcError>
    where
        F: Fn(&NumberValue) -> Result<NumberValue, CalcError>,
    {
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let data = match &column.data {
                ColumnData::Number(v) => ColumnData::Number(f(v)?),
                ColumnData::String(v) => ColumnData::String(v.clone()),
            };
            columns.push(TableColumn {
                name: column.name.clone(),
                data,
                display_unit: column.display_unit.clone(),
                format: column.format.clone(),
            });
        }
        TableValue::new(columns)
    }

    /// Table vs Number: the scalar/elementwise rule applies independently
    /// per numeric column. `table_on_left` keeps subtraction and division
    /// oriented correctly.
    pub fn dyadic_number(
        &self,
        op: NumberOp,
        other: &NumberValue,
        table_on_left: bool,
    ) -> Result<TableValue, CalcError> {
        self.map_numeric(|column| {
            if table_on_left {
                op.apply(column, other)
            } else {
                op.apply(other, column)
            }
        })
    }

    /// Table vs Table: columns pair positionally; String columns pass
    /// through from the left operand.
    pub fn dyadic_table(&self, op: NumberOp, other: &TableValue) -> Result<TableValue, CalcError> {
        if self.columns.len() != other.columns.len() {
            return Err(CalcError::new(CalcErrorKind::ColumnCountMismatch)
                .with_param("left", self.columns.len().to_string())
                .with_param("right", other.columns.len().to_string()));
        }
        let mut columns = Vec::with_capacity(self.columns.len());
        for (left, right) in self.columns.iter().zip(other.columns.iter()) {
            let data = match (&left.data, &right.data) {
                (ColumnData::Number(a), ColumnData::Number(b)) => {
                    ColumnData::Number(op.apply(a, b)?)
                }
                (ColumnData::String(a), ColumnData::String(_)) => ColumnData::String(a.clone()),
                _ => {
                    return Err(CalcError::new(CalcErrorKind::ColumnTypeMismatch)
                        .with_param("left", left.name.clone())
                        .with_param("right", right.name.clone()));
                }
            };
            columns.push(TableColumn {
                name: left.name.clone(),
                data,
                display_unit: left.display_unit.clone(),
                format: left.format.clone(),
            });
        }
        TableValue::new(columns)
    }

    /// Row selection via the predicate mini-language:
    /// `column op literal [unit]` clauses chained with a leading `&` (and,
    /// the default) or `|` (or). Comparators: `= == != < <= > >=`.
    pub fn select_rows(
        &self,
        predicate: &str,
        registry: &UnitRegistry,
    ) -> Result<TableValue, CalcError> {
        let clauses = parse_predicates(predicate)?;
        let mut mask: Option<Vec<bool>> = None;
        for (connector, clause) in clauses {
            let clause_mask = self.clause_mask(&clause, registry)?;
            mask = Some(match mask {
                None => clause_mask,
                Some(acc) => acc
                    .iter()
                    .zip(clause_mask.iter())
                    .map(|(&a, &b)| match connector {
                        Connector::And => a && b,
                        Connector::Or => a || b,
                    })
                    .collect(),
            });
        }
        let mask = mask.unwrap_or_else(|| vec![true; self.rows]);
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|&(_, &keep)| keep)
            .map(|(i, _)| i + 1)
            .collect();
        self.rows_by_index(&indices)
    }

    fn clause_mask(
        &self,
        clause: &Clause,
        registry: &UnitRegistry,
    ) -> Result<Vec<bool>, CalcError> {
        let column = self.column_named(&clause.column).ok_or_else(|| {
            CalcError::new(CalcErrorKind::UnknownValue).with_param("column", clause.column.clone())
        })?;
        match &column.data {
            ColumnData::Number(values) => {
                let mut literal = match clause.literal {
                    Literal::Number(n) => n,
                    Literal::Text(_) => {
                        return Err(CalcError::new(CalcErrorKind::ColumnTypeMismatch)
                            .with_param("column", clause.column.clone()));
                    }
                };
                if let Some(unit_name) = &clause.unit {
                    let unit = registry.lookup(unit_name)?;
                    if !dimensions_equal(&unit.dims, values.dims()) {
                        return Err(CalcError::new(CalcErrorKind::UnitMismatch)
                            .with_param("column", clause.column.clone())
                            .with_param("unit", unit_name.clone()));
                    }
                    literal = unit.to_base(literal);
                }
                Ok(values
                    .data()
                    .iter()
                    .map(|&v| clause.comparator.compare_numbers(v, literal))
                    .collect())
            }
            ColumnData::String(values) => {
                let text = match &clause.literal {
                    Literal::Text(s) => s.clone(),
                    Literal::Number(n) => n.to_string(),
                };
                Ok(values
                    .data()
                    .iter()
                    .map(|v| clause.comparator.compare_text(v, &text))
                    .collect())
            }
        }
    }
}

/* ───────────────────── predicate mini-language ───────────────────── */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    fn compare_numbers(&self, a: f64, b: f64) -> bool {
        match self {
            Comparator::Eq => a == b,
            Comparator::Ne => a != b,
            Comparator::Lt => a < b,
            Comparator::Le => a <= b,
            Comparator::Gt => a > b,
            Comparator::Ge => a >= b,
        }
    }

    fn compare_text(&self, a: &str, b: &str) -> bool {
        match self {
            Comparator::Eq => a == b,
            Comparator::Ne => a != b,
            Comparator::Lt => a < b,
            Comparator::Le => a <= b,
            Comparator::Gt => a > b,
            Comparator::Ge => a >= b,
        }
    }
}

#[derive(Debug, Clone)]
enum Literal {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone)]
struct Clause {
    column: String,
    comparator: Comparator,
    literal: Literal,
    unit: Option<String>,
}

fn parse_predicates(text: &str) -> Result<Vec<(Connector, Clause)>, CalcError> {
    // Split into clause substrings on top-level & / |, respecting quotes.
    let mut parts: Vec<(Connector, String)> = Vec::new();
    let mut current = String::new();
    let mut connector = Connector::And;
    let mut in_quotes = false;
    for ch in text.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '&' | '|' if !in_quotes => {
                parts.push((connector, current.trim().to_string()));
                connector = if ch == '&' { Connector::And } else { Connector::Or };
                current = String::new();
            }
            _ => current.push(ch),
        }
    }
    parts.push((connector, current.trim().to_string()));

    static CLAUSE_RE: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
        Regex::new(r"^\s*(\S+)\s*(==|!=|<=|>=|=|<|>)\s*(.+?)\s*$").unwrap()
    });

    let mut clauses = Vec::new();
    for (connector, part) in parts {
        if part.is_empty() {
            continue;
        }
        let captures = CLAUSE_RE.captures(&part).ok_or_else(|| {
            CalcError::new(CalcErrorKind::Syntax).with_param("predicate", part.clone())
        })?;
        let comparator = match &captures[2] {
            "=" | "==" => Comparator::Eq,
            "!=" => Comparator::Ne,
            "<" => Comparator::Lt,
            "<=" => Comparator::Le,
            ">" => Comparator::Gt,
            ">=" => Comparator::Ge,
            _ => unreachable!(),
        };
        let (literal, unit) = parse_literal(&captures[3]);
        clauses.push((
            connector,
            Clause {
                column: captures[1].to_string(),
                comparator,
                literal,
                unit,
            },
        ));
    }
    Ok(clauses)
}

fn parse_literal(text: &str) -> (Literal, Option<String>) {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return (Literal::Text(stripped.to_string()), None);
    }
    let mut pieces = text.splitn(2, char::is_whitespace);
    let head = pieces.next().unwrap_or("");
    if let Ok(number) = head.parse::<f64>() {
        let unit = pieces
            .next()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from);
        (Literal::Number(number), unit)
    } else {
        (Literal::Text(text.to_string()), None)
    }
}
