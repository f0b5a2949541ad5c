//! Shared broadcasting rule for all dyadic value operations.
//!
//! The result shape is the elementwise max of the operand shapes; each
//! operand index is taken modulo that operand's own row/column count. A 1×1
//! operand therefore broadcasts against anything, a 1×N operand repeats down
//! every row, and an M×1 operand repeats across every column. A count that
//! neither equals the result nor divides it evenly is a shape mismatch.

use crate::error::{CalcError, CalcErrorKind};

/// Compute the result shape for two operands, or `ShapeMismatch`.
///
/// An empty operand (zero rows or columns) short-circuits to an empty
/// result; there is nothing to combine with.
pub fn broadcast_shape(
    a: (usize, usize),
    b: (usize, usize),
) -> Result<(usize, usize), CalcError> {
    if a.0 == 0 || a.1 == 0 || b.0 == 0 || b.1 == 0 {
        return Ok((0, 0));
    }
    let rows = a.0.max(b.0);
    let cols = a.1.max(b.1);
    if rows % a.0 != 0 || rows % b.0 != 0 || cols % a.1 != 0 || cols % b.1 != 0 {
        return Err(CalcError::new(CalcErrorKind::ShapeMismatch)
            .with_param("leftRows", a.0.to_string())
            .with_param("leftColumns", a.1.to_string())
            .with_param("rightRows", b.0.to_string())
            .with_param("rightColumns", b.1.to_string()));
    }
    Ok((rows, cols))
}

/// Flattened data index of (row, col) within an operand of the given shape,
/// applying the modulo rule. Zero-based.
#[inline]
pub fn project_index(row: usize, col: usize, shape: (usize, usize)) -> usize {
    (row % shape.0) * shape.1 + (col % shape.1)
}
