//! String matrix values.
//!
//! Mirrors the numeric value's structural operations and adds the
//! text-specific surface: concatenation, number formatting, join/split,
//! regex match/replace/find, case conversion, and substrings.

use regex::Regex;

use crate::error::{CalcError, CalcErrorKind};
use crate::units::Dimensions;
use crate::value::broadcast::{broadcast_shape, project_index};
use crate::value::number::NumberValue;

#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
    rows: usize,
    cols: usize,
    data: Vec<String>,
}

impl StringValue {
    pub fn new(rows: usize, cols: usize, data: Vec<String>) -> Self {
        assert_eq!(data.len(), rows * cols, "string value shape invariant");
        StringValue { rows, cols, data }
    }

    pub fn scalar<S: Into<String>>(value: S) -> Self {
        StringValue::new(1, 1, vec![value.into()])
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
    pub fn data(&self) -> &[String] {
        &self.data
    }

    pub fn first(&self) -> Option<&str> {
        self.data.first().map(String::as_str)
    }

    /// 1-based, bounds-checked element access.
    pub fn at(&self, row: usize, col: usize) -> Result<&str, CalcError> {
        if row == 0 || row > self.rows || col == 0 || col > self.cols {
            return Err(CalcError::new(CalcErrorKind::IndexOutOfBounds)
                .with_param("row", row.to_string())
                .with_param("column", col.to_string())
                .with_param("rows", self.rows.to_string())
                .with_param("columns", self.cols.to_string()));
        }
        Ok(&self.data[(row - 1) * self.cols + (col - 1)])
    }

    /* ───────────────────── dyadic helpers ───────────────────── */

    fn dyadic<F>(&self, other: &StringValue, f: F) -> Result<StringValue, CalcError>
    where
        F: Fn(&str, &str) -> String,
    {
        let target = broadcast_shape(self.shape(), other.shape())?;
        let mut data = Vec::with_capacity(target.0 * target.1);
        for row in 0..target.0 {
            for col in 0..target.1 {
                let a = &self.data[project_index(row, col, self.shape())];
                let b = &other.data[project_index(row, col, other.shape())];
                data.push(f(a, b));
            }
        }
        Ok(StringValue::new(target.0, target.1, data))
    }

    pub fn concat(&self, other: &StringValue) -> Result<StringValue, CalcError> {
        self.dyadic(other, |a, b| format!("{a}{b}"))
    }

    /* ───────────────────── structural operations ───────────────────── */

    pub fn transpose(&self) -> StringValue {
        let mut data = Vec::with_capacity(self.data.len());
        for col in 0..self.cols {
            for row in 0..self.rows {
                data.push(self.data[row * self.cols + col].clone());
            }
        }
        StringValue::new(self.cols, self.rows, data)
    }

    pub fn append(&self, other: &StringValue) -> Result<StringValue, CalcError> {
        let rows = broadcast_shape((self.rows, 1), (other.rows, 1))?.0;
        let cols = self.cols + other.cols;
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..self.cols {
                data.push(self.data[project_index(row, col, self.shape())].clone());
            }
            for col in 0..other.cols {
                data.push(other.data[project_index(row, col, other.shape())].clone());
            }
        }
        Ok(StringValue::new(rows, cols, data))
    }

    pub fn redimension(&self, new_cols: usize) -> Result<StringValue, CalcError> {
        if new_cols == 0 || self.data.len() % new_cols != 0 {
            return Err(CalcError::new(CalcErrorKind::ReshapeCountMismatch)
                .with_param("count", self.data.len().to_string())
                .with_param("columns", new_cols.to_string()));
        }
        Ok(StringValue::new(
            self.data.len() / new_cols,
            new_cols,
            self.data.clone(),
        ))
    }

    /// 1-based flattened position of the first element equal to `target`,
    /// or 0 when absent.
    pub fn index_of(&self, target: &str) -> NumberValue {
        let position = self
            .data
            .iter()
            .position(|s| s == target)
            .map(|i| (i + 1) as f64)
            .unwrap_or(0.0);
        NumberValue::scalar(position)
    }

    pub fn select(&self, mask: &NumberValue) -> Result<StringValue, CalcError> {
        let rows = broadcast_shape((self.rows, 1), (mask.rows(), 1))?.0;
        if rows != self.rows {
            return Err(CalcError::new(CalcErrorKind::ShapeMismatch)
                .with_param("rows", self.rows.to_string())
                .with_param("maskRows", mask.rows().to_string()));
        }
        let mut data = Vec::new();
        let mut kept = 0;
        for row in 0..self.rows {
            if mask.data()[project_index(row, 0, mask.shape())] != 0.0 {
                for col in 0..self.cols {
                    data.push(self.data[row * self.cols + col].clone());
                }
                kept += 1;
            }
        }
        Ok(StringValue::new(kept, self.cols, data))
    }

    pub fn rows_by_index(&self, indices: &[usize]) -> Result<StringValue, CalcError> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &row in indices {
            if row == 0 || row > self.rows {
                return Err(CalcError::new(CalcErrorKind::IndexOutOfBounds)
                    .with_param("row", row.to_string())
                    .with_param("rows", self.rows.to_string()));
            }
            for col in 0..self.cols {
                data.push(self.data[(row - 1) * self.cols + col].clone());
            }
        }
        Ok(StringValue::new(indices.len(), self.cols, data))
    }

    /* ───────────────────── text operations ───────────────────── */

    /// Render numbers through a format spec of the form
    /// `[%][width][.precision](f|e)` or `[%]radix r` (e.g. `"8.3f"`,
    /// `"%e"`, `"16r"`). Broadcasts number against spec.
    pub fn format_number(
        number: &NumberValue,
        spec: &StringValue,
    ) -> Result<StringValue, CalcError> {
        let target = broadcast_shape(number.shape(), spec.shape())?;
        let mut data = Vec::with_capacity(target.0 * target.1);
        for row in 0..target.0 {
            for col in 0..target.1 {
                let v = number.data()[project_index(row, col, number.shape())];
                let s = &spec.data[project_index(row, col, spec.shape())];
                data.push(render_format(v, s)?);
            }
        }
        Ok(StringValue::new(target.0, target.1, data))
    }

    /// Flatten every element into one string, columns joined by `col_sep`
    /// and rows by `row_sep` (defaulting to the column separator).
    pub fn join(&self, col_sep: &str, row_sep: Option<&str>) -> StringValue {
        let row_sep = row_sep.unwrap_or(col_sep);
        let mut rows = Vec::with_capacity(self.rows);
        for row in 0..self.rows {
            let slice = &self.data[row * self.cols..(row + 1) * self.cols];
            rows.push(slice.join(col_sep));
        }
        StringValue::scalar(rows.join(row_sep))
    }

    /// Inverse of `join`: split the first element by separators. With one
    /// separator the result is a column vector; a second separator first
    /// splits rows, then columns within each row.
    pub fn split(&self, col_sep: &str, row_sep: Option<&str>) -> Result<StringValue, CalcError> {
        let source = self.first().unwrap_or("");
        match row_sep {
            None => {
                let parts: Vec<String> = source.split(col_sep).map(String::from).collect();
                let rows = parts.len();
                Ok(StringValue::new(rows, 1, parts))
            }
            Some(row_sep) => {
                let row_parts: Vec<&str> = source.split(row_sep).collect();
                let cols = row_parts
                    .first()
                    .map(|r| r.split(col_sep).count())
                    .unwrap_or(0);
                let mut data = Vec::new();
                for row in &row_parts {
                    let mut cells: Vec<String> = row.split(col_sep).map(String::from).collect();
                    if cells.len() != cols {
                        cells.resize(cols, String::new());
                    }
                    data.extend(cells.into_iter().take(cols));
                }
                Ok(StringValue::new(row_parts.len(), cols, data))
            }
        }
    }

    fn compile(pattern: &str) -> Result<Regex, CalcError> {
        Regex::new(pattern).map_err(|_| {
            CalcError::new(CalcErrorKind::BadFormat).with_param("pattern", pattern)
        })
    }

    /// Matched text per element ("" when the pattern does not match). The
    /// pattern is the first element of `pattern`, compiled once.
    pub fn match_pattern(&self, pattern: &StringValue) -> Result<StringValue, CalcError> {
        let re = Self::compile(pattern.first().unwrap_or(""))?;
        let data = self
            .data
            .iter()
            .map(|s| re.find(s).map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();
        Ok(StringValue::new(self.rows, self.cols, data))
    }

    /// Replace every match of `pattern` with `replacement` in each element.
    pub fn replace_pattern(
        &self,
        pattern: &StringValue,
        replacement: &StringValue,
    ) -> Result<StringValue, CalcError> {
        let re = Self::compile(pattern.first().unwrap_or(""))?;
        let repl = replacement.first().unwrap_or("");
        let data = self
            .data
            .iter()
            .map(|s| re.replace_all(s, repl).into_owned())
            .collect();
        Ok(StringValue::new(self.rows, self.cols, data))
    }

    /// 1-based character position of the first match per element, 0 if none.
    pub fn find_pattern(&self, pattern: &StringValue) -> Result<NumberValue, CalcError> {
        let re = Self::compile(pattern.first().unwrap_or(""))?;
        let data = self
            .data
            .iter()
            .map(|s| match re.find(s) {
                Some(m) => (s[..m.start()].chars().count() + 1) as f64,
                None => 0.0,
            })
            .collect();
        Ok(NumberValue::new(self.rows, self.cols, Dimensions::none(), data))
    }

    pub fn to_upper(&self) -> StringValue {
        StringValue::new(
            self.rows,
            self.cols,
            self.data.iter().map(|s| s.to_uppercase()).collect(),
        )
    }

    pub fn to_lower(&self) -> StringValue {
        StringValue::new(
            self.rows,
            self.cols,
            self.data.iter().map(|s| s.to_lowercase()).collect(),
        )
    }

    /// Substring per element: 1-based character `start`, optional `length`
    /// (to end of string when omitted). Broadcasts against `start`.
    pub fn substring(
        &self,
        start: &NumberValue,
        length: Option<&NumberValue>,
    ) -> Result<StringValue, CalcError> {
        let target = broadcast_shape(self.shape(), start.shape())?;
        let mut data = Vec::with_capacity(target.0 * target.1);
        for row in 0..target.0 {
            for col in 0..target.1 {
                let s = &self.data[project_index(row, col, self.shape())];
                let from = start.data()[project_index(row, col, start.shape())];
                let from = (from.max(1.0) as usize).saturating_sub(1);
                let take = match length {
                    Some(len) => {
                        len.data()[project_index(row, col, len.shape())].max(0.0) as usize
                    }
                    None => usize::MAX,
                };
                data.push(s.chars().skip(from).take(take).collect());
            }
        }
        Ok(StringValue::new(target.0, target.1, data))
    }

    pub fn char_counts(&self) -> NumberValue {
        NumberValue::new(
            self.rows,
            self.cols,
            Dimensions::none(),
            self.data.iter().map(|s| s.chars().count() as f64).collect(),
        )
    }
}

/* ───────────────────── number formatting ───────────────────── */

fn render_format(value: f64, spec: &str) -> Result<String, CalcError> {
    let bad = || CalcError::new(CalcErrorKind::BadFormat).with_param("format", spec);
    let body = spec.trim().strip_prefix('%').unwrap_or(spec.trim());
    if body.is_empty() {
        return Err(bad());
    }

    let style = body.chars().last().unwrap();
    let head = &body[..body.len() - style.len_utf8()];
    match style {
        'f' | 'e' => {
            let (width, precision) = match head.split_once('.') {
                Some((w, p)) => (
                    parse_field(w, 0).ok_or_else(bad)?,
                    parse_field(p, 6).ok_or_else(bad)?,
                ),
                None => (parse_field(head, 0).ok_or_else(bad)?, 6),
            };
            let rendered = if style == 'f' {
                format!("{value:.precision$}")
            } else {
                format!("{value:.precision$e}")
            };
            Ok(if rendered.len() < width {
                format!("{rendered:>width$}")
            } else {
                rendered
            })
        }
        'r' => {
            let radix: u32 = if head.is_empty() {
                16
            } else {
                head.parse().map_err(|_| bad())?
            };
            if !(2..=36).contains(&radix) {
                return Err(bad());
            }
            Ok(format_radix(value, radix))
        }
        _ => Err(bad()),
    }
}

fn parse_field(text: &str, default: usize) -> Option<usize> {
    if text.is_empty() {
        Some(default)
    } else {
        text.parse().ok()
    }
}

fn format_radix(value: f64, radix: u32) -> String {
    let negative = value < 0.0;
    let mut n = value.abs().round() as u64;
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        let d = (n % radix as u64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap());
        n /= radix as u64;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_broadcasts_scalars() {
        let names = StringValue::new(2, 1, vec!["a".into(), "b".into()]);
        let suffix = StringValue::scalar("!");
        let out = names.concat(&suffix).unwrap();
        assert_eq!(out.data(), &["a!".to_string(), "b!".to_string()]);
    }

    #[test]
    fn format_fixed_scientific_and_radix() {
        let n = NumberValue::scalar(3.14159);
        let out = StringValue::format_number(&n, &StringValue::scalar("8.2f")).unwrap();
        assert_eq!(out.first(), Some("    3.14"));

        let out = StringValue::format_number(&n, &StringValue::scalar("%.3e")).unwrap();
        assert_eq!(out.first(), Some("3.142e0"));

        let out =
            StringValue::format_number(&NumberValue::scalar(255.0), &StringValue::scalar("16r"))
                .unwrap();
        assert_eq!(out.first(), Some("ff"));

        let out =
            StringValue::format_number(&NumberValue::scalar(5.0), &StringValue::scalar("2r"))
                .unwrap();
        assert_eq!(out.first(), Some("101"));

        assert_eq!(
            StringValue::format_number(&n, &StringValue::scalar("zz"))
                .unwrap_err()
                .kind,
            CalcErrorKind::BadFormat
        );
    }

    #[test]
    fn join_and_split_are_inverse() {
        let m = StringValue::new(2, 2, vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        let joined = m.join(",", Some(";"));
        assert_eq!(joined.first(), Some("a,b;c,d"));
        let back = joined.split(",", Some(";")).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn split_single_separator_makes_column() {
        let s = StringValue::scalar("x|y|z");
        let out = s.split("|", None).unwrap();
        assert_eq!(out.shape(), (3, 1));
        assert_eq!(out.at(2, 1).unwrap(), "y");
    }

    #[test]
    fn regex_match_replace_find() {
        let s = StringValue::new(2, 1, vec!["abc123".into(), "nope".into()]);
        let matched = s.match_pattern(&StringValue::scalar(r"\d+")).unwrap();
        assert_eq!(matched.data(), &["123".to_string(), String::new()]);

        let replaced = s
            .replace_pattern(&StringValue::scalar(r"\d"), &StringValue::scalar("#"))
            .unwrap();
        assert_eq!(replaced.at(1, 1).unwrap(), "abc###");

        let found = s.find_pattern(&StringValue::scalar(r"\d+")).unwrap();
        assert_eq!(found.data(), &[4.0, 0.0]);
    }

    #[test]
    fn substring_is_one_based_chars() {
        let s = StringValue::scalar("héllo");
        let out = s
            .substring(&NumberValue::scalar(2.0), Some(&NumberValue::scalar(3.0)))
            .unwrap();
        assert_eq!(out.first(), Some("éll"));
        let tail = s.substring(&NumberValue::scalar(3.0), None).unwrap();
        assert_eq!(tail.first(), Some("llo"));
    }

    #[test]
    fn structural_ops_mirror_number() {
        let m = StringValue::new(2, 2, vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        assert_eq!(m.transpose().at(1, 2).unwrap(), "c");
        assert_eq!(m.redimension(1).unwrap().shape(), (4, 1));
        assert_eq!(m.index_of("c").first(), Some(3.0));
        assert_eq!(m.index_of("zz").first(), Some(0.0));

        let mask = NumberValue::new(2, 1, Dimensions::none(), vec![0.0, 1.0]);
        let kept = m.select(&mask).unwrap();
        assert_eq!(kept.shape(), (1, 2));
        assert_eq!(kept.at(1, 1).unwrap(), "c");
    }
}
