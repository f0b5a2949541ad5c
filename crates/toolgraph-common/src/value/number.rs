//! Numeric matrix values.
//!
//! A `NumberValue` is a dense row-major `rows × cols` matrix of `f64` base
//! values plus the dimension vector they share. All arithmetic happens in
//! base units; display units apply only at formatting/serialization
//! boundaries.

use crate::error::{CalcError, CalcErrorKind};
use crate::units::{Dimensions, dimensions_equal};
use crate::value::broadcast::{broadcast_shape, project_index};

#[derive(Debug, Clone, PartialEq)]
pub struct NumberValue {
    rows: usize,
    cols: usize,
    dims: Dimensions,
    data: Vec<f64>,
}

/// The dyadic numeric operators, with their unit rules, in one place.
/// Tables and the interpreter both dispatch through this so the per-column
/// pass-through policy never duplicates the unit arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl NumberOp {
    pub fn apply(&self, a: &NumberValue, b: &NumberValue) -> Result<NumberValue, CalcError> {
        match self {
            NumberOp::Add => a.add(b),
            NumberOp::Subtract => a.subtract(b),
            NumberOp::Multiply => a.multiply(b),
            NumberOp::Divide => a.divide(b),
            NumberOp::Modulo => a.modulo(b),
            NumberOp::Power => a.power(b),
        }
    }
}

impl NumberValue {
    /// Build from parts. `data.len() == rows * cols` is a structural
    /// invariant of every `NumberValue` ever constructed.
    pub fn new(rows: usize, cols: usize, dims: Dimensions, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * cols, "number value shape invariant");
        NumberValue {
            rows,
            cols,
            dims,
            data,
        }
    }

    pub fn scalar(value: f64) -> Self {
        Self::new(1, 1, Dimensions::none(), vec![value])
    }

    pub fn scalar_with_dims(value: f64, dims: Dimensions) -> Self {
        Self::new(1, 1, dims, vec![value])
    }

    /// Column vector running from `start` to `end` inclusive, stepping ±1.
    pub fn sequence(start: f64, end: f64, dims: Dimensions) -> Self {
        let count = (end - start).abs().floor() as usize + 1;
        let step = if end >= start { 1.0 } else { -1.0 };
        let data: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
        Self::new(count, 1, dims, data)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn cols(&self) -> usize {
        self.cols
    }
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
    pub fn value_count(&self) -> usize {
        self.data.len()
    }
    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn is_scalar(&self) -> bool {
        self.data.len() == 1
    }

    /// First element, for call sites that need a single number.
    pub fn first(&self) -> Option<f64> {
        self.data.first().copied()
    }

    /// 1-based, bounds-checked element access.
    pub fn at(&self, row: usize, col: usize) -> Result<f64, CalcError> {
        if row == 0 || row > self.rows || col == 0 || col > self.cols {
            return Err(CalcError::new(CalcErrorKind::IndexOutOfBounds)
                .with_param("row", row.to_string())
                .with_param("column", col.to_string())
                .with_param("rows", self.rows.to_string())
                .with_param("columns", self.cols.to_string()));
        }
        Ok(self.data[(row - 1) * self.cols + (col - 1)])
    }

    /* ───────────────────── dyadic operations ───────────────────── */

    fn dyadic<F>(&self, other: &NumberValue, dims: Dimensions, f: F) -> Result<NumberValue, CalcError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let target = broadcast_shape(self.shape(), other.shape())?;
        let mut data = Vec::with_capacity(target.0 * target.1);
        for row in 0..target.0 {
            for col in 0..target.1 {
                let a = self.data[project_index(row, col, self.shape())];
                let b = other.data[project_index(row, col, other.shape())];
                data.push(f(a, b));
            }
        }
        Ok(NumberValue::new(target.0, target.1, dims, data))
    }

    fn require_same_dims(&self, other: &NumberValue) -> Result<(), CalcError> {
        if !dimensions_equal(&self.dims, &other.dims) {
            return Err(CalcError::new(CalcErrorKind::UnitMismatch)
                .with_param("left", self.dims.to_string())
                .with_param("right", other.dims.to_string()));
        }
        Ok(())
    }

    pub fn add(&self, other: &NumberValue) -> Result<NumberValue, CalcError> {
        self.require_same_dims(other)?;
        self.dyadic(other, self.dims, |a, b| a + b)
    }

    pub fn subtract(&self, other: &NumberValue) -> Result<NumberValue, CalcError> {
        self.require_same_dims(other)?;
        self.dyadic(other, self.dims, |a, b| a - b)
    }

    pub fn multiply(&self, other: &NumberValue) -> Result<NumberValue, CalcError> {
        self.dyadic(other, self.dims.add(&other.dims), |a, b| a * b)
    }

    pub fn divide(&self, other: &NumberValue) -> Result<NumberValue, CalcError> {
        self.dyadic(other, self.dims.subtract(&other.dims), |a, b| a / b)
    }

    /// Floored modulo; dimensions subtract like division.
    pub fn modulo(&self, other: &NumberValue) -> Result<NumberValue, CalcError> {
        self.dyadic(other, self.dims.subtract(&other.dims), |a, b| {
            a - b * (a / b).floor()
        })
    }

    /// The exponent must be dimensionless; a multi-element exponent further
    /// requires a dimensionless base. Result dims are the base's scaled by
    /// the first exponent element.
    pub fn power(&self, exponent: &NumberValue) -> Result<NumberValue, CalcError> {
        if !exponent.dims.is_dimensionless() {
            return Err(CalcError::new(CalcErrorKind::UnitMismatch)
                .with_param("exponent", exponent.dims.to_string()));
        }
        if exponent.value_count() > 1 && !self.dims.is_dimensionless() {
            return Err(CalcError::new(CalcErrorKind::UnitMismatch)
                .with_param("base", self.dims.to_string()));
        }
        let n = exponent.first().unwrap_or(1.0);
        self.dyadic(exponent, self.dims.scaled(n), |a, b| a.powf(b))
    }

    /// Elementwise map preserving shape; `dims` names the result dimensions.
    pub fn map<F>(&self, dims: Dimensions, f: F) -> NumberValue
    where
        F: Fn(f64) -> f64,
    {
        NumberValue::new(
            self.rows,
            self.cols,
            dims,
            self.data.iter().map(|&v| f(v)).collect(),
        )
    }

    pub fn negated(&self) -> NumberValue {
        self.map(self.dims, |v| -v)
    }

    /* ───────────────────── reductions ─────────────────────
    Each axis is a distinct operation because call sites need exactly one
    of them, never a runtime axis parameter. */

    fn fold_all<F>(&self, f: F) -> NumberValue
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut iter = self.data.iter().copied();
        let first = iter.next().unwrap_or(f64::NAN);
        let out = iter.fold(first, f);
        NumberValue::scalar_with_dims(out, self.dims)
    }

    fn fold_rows<F>(&self, f: F) -> NumberValue
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut data = Vec::with_capacity(self.rows);
        for row in 0..self.rows {
            let base = row * self.cols;
            let mut acc = self.data[base];
            for col in 1..self.cols {
                acc = f(acc, self.data[base + col]);
            }
            data.push(acc);
        }
        NumberValue::new(self.rows, 1, self.dims, data)
    }

    fn fold_cols<F>(&self, f: F) -> NumberValue
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut data = Vec::with_capacity(self.cols);
        for col in 0..self.cols {
            let mut acc = self.data[col];
            for row in 1..self.rows {
                acc = f(acc, self.data[row * self.cols + col]);
            }
            data.push(acc);
        }
        NumberValue::new(1, self.cols, self.dims, data)
    }

    pub fn sum_all(&self) -> NumberValue {
        self.fold_all(|a, b| a + b)
    }
    pub fn sum_rows(&self) -> NumberValue {
        self.fold_rows(|a, b| a + b)
    }
    pub fn sum_cols(&self) -> NumberValue {
        self.fold_cols(|a, b| a + b)
    }
    pub fn min_all(&self) -> NumberValue {
        self.fold_all(f64::min)
    }
    pub fn min_rows(&self) -> NumberValue {
        self.fold_rows(f64::min)
    }
    pub fn min_cols(&self) -> NumberValue {
        self.fold_cols(f64::min)
    }
    pub fn max_all(&self) -> NumberValue {
        self.fold_all(f64::max)
    }
    pub fn max_rows(&self) -> NumberValue {
        self.fold_rows(f64::max)
    }
    pub fn max_cols(&self) -> NumberValue {
        self.fold_cols(f64::max)
    }

    /* ───────────────────── structural operations ───────────────────── */

    pub fn transpose(&self) -> NumberValue {
        let mut data = Vec::with_capacity(self.data.len());
        for col in 0..self.cols {
            for row in 0..self.rows {
                data.push(self.data[row * self.cols + col]);
            }
        }
        NumberValue::new(self.cols, self.rows, self.dims, data)
    }

    /// Concatenate `other`'s columns to the right of this value's. Both
    /// operands need equal dimensions; row counts must match or the smaller
    /// must divide the larger (row broadcast).
    pub fn append(&self, other: &NumberValue) -> Result<NumberValue, CalcError> {
        self.require_same_dims(other)?;
        let rows = broadcast_shape((self.rows, 1), (other.rows, 1))?.0;
        let cols = self.cols + other.cols;
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..self.cols {
                data.push(self.data[project_index(row, col, self.shape())]);
            }
            for col in 0..other.cols {
                data.push(other.data[project_index(row, col, other.shape())]);
            }
        }
        Ok(NumberValue::new(rows, cols, self.dims, data))
    }

    /// Reshape to `new_cols` columns preserving element order and count.
    pub fn redimension(&self, new_cols: usize) -> Result<NumberValue, CalcError> {
        if new_cols == 0 || self.data.len() % new_cols != 0 {
            return Err(CalcError::new(CalcErrorKind::ReshapeCountMismatch)
                .with_param("count", self.data.len().to_string())
                .with_param("columns", new_cols.to_string()));
        }
        Ok(NumberValue::new(
            self.data.len() / new_cols,
            new_cols,
            self.dims,
            self.data.clone(),
        ))
    }

    /// Stable sort of row indices by first-column value; returns the
    /// permutation as a dimensionless 1-based column vector.
    pub fn index_sort(&self) -> NumberValue {
        let mut order: Vec<usize> = (0..self.rows).collect();
        order.sort_by(|&a, &b| {
            let va = self.data[a * self.cols];
            let vb = self.data[b * self.cols];
            va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
        });
        let data: Vec<f64> = order.iter().map(|&i| (i + 1) as f64).collect();
        NumberValue::new(self.rows, 1, Dimensions::none(), data)
    }

    /// Keep the rows whose mask entry is nonzero. The mask must be a column
    /// vector with this value's row count (or broadcast to it).
    pub fn select(&self, mask: &NumberValue) -> Result<NumberValue, CalcError> {
        let rows = broadcast_shape((self.rows, 1), (mask.rows, 1))?.0;
        if rows != self.rows {
            return Err(CalcError::new(CalcErrorKind::ShapeMismatch)
                .with_param("rows", self.rows.to_string())
                .with_param("maskRows", mask.rows.to_string()));
        }
        let mut data = Vec::new();
        let mut kept = 0;
        for row in 0..self.rows {
            if mask.data[project_index(row, 0, mask.shape())] != 0.0 {
                data.extend_from_slice(&self.data[row * self.cols..(row + 1) * self.cols]);
                kept += 1;
            }
        }
        Ok(NumberValue::new(kept, self.cols, self.dims, data))
    }

    /// Rows of this value in the order given by 1-based `indices`.
    pub fn rows_by_index(&self, indices: &[usize]) -> Result<NumberValue, CalcError> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &row in indices {
            if row == 0 || row > self.rows {
                return Err(CalcError::new(CalcErrorKind::IndexOutOfBounds)
                    .with_param("row", row.to_string())
                    .with_param("rows", self.rows.to_string()));
            }
            data.extend_from_slice(&self.data[(row - 1) * self.cols..row * self.cols]);
        }
        Ok(NumberValue::new(indices.len(), self.cols, self.dims, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::dim;

    fn meters(v: f64) -> NumberValue {
        NumberValue::scalar_with_dims(v, Dimensions::single(dim::LENGTH, 1.0))
    }

    #[test]
    fn at_is_one_based_and_checked() {
        let m = NumberValue::new(2, 2, Dimensions::none(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(m.at(1, 1).unwrap(), 1.0);
        assert_eq!(m.at(2, 1).unwrap(), 3.0);
        let err = m.at(3, 1).unwrap_err();
        assert_eq!(err.kind, CalcErrorKind::IndexOutOfBounds);
        assert_eq!(err.param("row"), Some("3"));
        assert_eq!(err.param("rows"), Some("2"));
    }

    #[test]
    fn add_requires_matching_dims() {
        let err = meters(1.0).add(&NumberValue::scalar(1.0)).unwrap_err();
        assert_eq!(err.kind, CalcErrorKind::UnitMismatch);
        let ok = meters(1.0).add(&meters(2.0)).unwrap();
        assert_eq!(ok.first(), Some(3.0));
        assert!(ok.dims().equal(&Dimensions::single(dim::LENGTH, 1.0)));
    }

    #[test]
    fn multiply_and_divide_combine_dims() {
        let speed = meters(6.0)
            .divide(&NumberValue::scalar_with_dims(
                2.0,
                Dimensions::single(dim::TIME, 1.0),
            ))
            .unwrap();
        assert_eq!(speed.first(), Some(3.0));
        assert!(speed
            .dims()
            .equal(&Dimensions([1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0])));

        let area = meters(3.0).multiply(&meters(2.0)).unwrap();
        assert!(area.dims().equal(&Dimensions::single(dim::LENGTH, 2.0)));
    }

    #[test]
    fn scalar_broadcasts_over_matrix() {
        let m = NumberValue::new(2, 3, Dimensions::none(), vec![1.0; 6]);
        let out = m.add(&NumberValue::scalar(2.0)).unwrap();
        assert_eq!(out.shape(), (2, 3));
        assert!(out.data().iter().all(|&v| v == 3.0));
    }

    #[test]
    fn incompatible_shapes_mismatch() {
        let a = NumberValue::new(3, 1, Dimensions::none(), vec![1.0; 3]);
        let b = NumberValue::new(4, 1, Dimensions::none(), vec![1.0; 4]);
        assert_eq!(a.add(&b).unwrap_err().kind, CalcErrorKind::ShapeMismatch);
    }

    #[test]
    fn power_dimension_rules() {
        let squared = meters(3.0).power(&NumberValue::scalar(2.0)).unwrap();
        assert_eq!(squared.first(), Some(9.0));
        assert!(squared.dims().equal(&Dimensions::single(dim::LENGTH, 2.0)));

        // Dimensioned exponent is rejected.
        assert_eq!(
            meters(3.0).power(&meters(2.0)).unwrap_err().kind,
            CalcErrorKind::UnitMismatch
        );

        // Multi-element exponent over a dimensioned base is rejected.
        let exps = NumberValue::new(2, 1, Dimensions::none(), vec![1.0, 2.0]);
        assert_eq!(
            meters(3.0).power(&exps).unwrap_err().kind,
            CalcErrorKind::UnitMismatch
        );
        let out = NumberValue::scalar(3.0).power(&exps).unwrap();
        assert_eq!(out.data(), &[3.0, 9.0]);
    }

    #[test]
    fn reductions_by_axis() {
        let m = NumberValue::new(2, 3, Dimensions::none(), vec![1.0, 5.0, 3.0, 4.0, 2.0, 6.0]);
        assert_eq!(m.sum_all().first(), Some(21.0));
        assert_eq!(m.max_rows().data(), &[5.0, 6.0]);
        assert_eq!(m.min_cols().data(), &[1.0, 2.0, 3.0]);
        assert_eq!(m.sum_cols().shape(), (1, 3));
    }

    #[test]
    fn transpose_and_redimension() {
        let m = NumberValue::new(2, 3, Dimensions::none(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let t = m.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.at(1, 2).unwrap(), 4.0);

        let r = m.redimension(2).unwrap();
        assert_eq!(r.shape(), (3, 2));
        assert_eq!(r.at(2, 1).unwrap(), 3.0);

        assert_eq!(
            m.redimension(4).unwrap_err().kind,
            CalcErrorKind::ReshapeCountMismatch
        );
    }

    #[test]
    fn append_broadcasts_rows_and_checks_dims() {
        let a = NumberValue::new(2, 1, Dimensions::none(), vec![1.0, 2.0]);
        let b = NumberValue::scalar(9.0);
        let out = a.append(&b).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_eq!(out.at(2, 2).unwrap(), 9.0);

        assert_eq!(
            a.append(&meters(1.0)).unwrap_err().kind,
            CalcErrorKind::UnitMismatch
        );
    }

    #[test]
    fn index_sort_is_stable_permutation() {
        let m = NumberValue::new(4, 1, Dimensions::none(), vec![3.0, 1.0, 3.0, 0.5]);
        let perm = m.index_sort();
        assert_eq!(perm.data(), &[4.0, 2.0, 1.0, 3.0]);
    }

    #[test]
    fn select_keeps_nonzero_mask_rows() {
        let m = NumberValue::new(3, 2, Dimensions::none(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mask = NumberValue::new(3, 1, Dimensions::none(), vec![1.0, 0.0, 2.0]);
        let out = m.select(&mask).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_eq!(out.data(), &[1.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn sequence_runs_both_directions() {
        assert_eq!(
            NumberValue::sequence(1.0, 4.0, Dimensions::none()).data(),
            &[1.0, 2.0, 3.0, 4.0]
        );
        assert_eq!(
            NumberValue::sequence(3.0, 1.0, Dimensions::none()).data(),
            &[3.0, 2.0, 1.0]
        );
    }
}
