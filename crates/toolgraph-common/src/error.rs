//! Structured calculation errors.
//!
//! - **`CalcErrorKind`** : the closed set of symbolic error codes
//! - **`CalcError`**     : kind + parameter map + owner path + source fragment
//!
//! Every failure inside the core is one of these; nothing panics across a
//! Formula boundary. A `CalcError` is cheap to build incrementally with the
//! `with_*` helpers and renders a single diagnostic line via `Display`.

use std::{error::Error, fmt};

/// All recognised error codes.
///
/// Names are CamelCase (idiomatic Rust) while `Display` renders the
/// symbolic key the host's message catalog looks up.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CalcErrorKind {
    // unit system
    UnknownUnit,
    DuplicateUnit,
    OperatorInBaseUnitName,
    // value model
    IndexOutOfBounds,
    ShapeMismatch,
    UnitMismatch,
    ReshapeCountMismatch,
    MixedUnitsInNumericFlatten,
    ColumnCountMismatch,
    ColumnTypeMismatch,
    // compiler
    Syntax,
    ArgumentCount,
    ParenthesisMismatch,
    IndexMismatch,
    UnknownFunction,
    // evaluation
    Recursion,
    UnknownValue,
    BadFormat,
}

impl fmt::Display for CalcErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnknownUnit => "unknownUnit",
            Self::DuplicateUnit => "duplicateUnit",
            Self::OperatorInBaseUnitName => "operatorInBaseUnitName",
            Self::IndexOutOfBounds => "indexOutOfBounds",
            Self::ShapeMismatch => "shapeMismatch",
            Self::UnitMismatch => "unitMismatch",
            Self::ReshapeCountMismatch => "reshapeCountMismatch",
            Self::MixedUnitsInNumericFlatten => "mixedUnitsInNumericFlatten",
            Self::ColumnCountMismatch => "columnCountMismatch",
            Self::ColumnTypeMismatch => "columnTypeMismatch",
            Self::Syntax => "syntaxError",
            Self::ArgumentCount => "argumentCountError",
            Self::ParenthesisMismatch => "parenthesisMismatch",
            Self::IndexMismatch => "indexMismatch",
            Self::UnknownFunction => "unknownFunction",
            Self::Recursion => "recursionError",
            Self::UnknownValue => "unknownValue",
            Self::BadFormat => "badFormat",
        })
    }
}

impl CalcErrorKind {
    /// Compile-time errors stay sticky on a Formula until its source text
    /// is reassigned; evaluation-time errors are re-raised on every pass.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::Syntax
                | Self::ArgumentCount
                | Self::ParenthesisMismatch
                | Self::IndexMismatch
                | Self::UnknownFunction
                | Self::UnknownUnit
        )
    }
}

/// The single error struct the whole core passes around.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalcError {
    pub kind: CalcErrorKind,
    /// Ordered key/value parameter map (row, col, name, ...).
    pub params: Vec<(&'static str, String)>,
    /// Path of the node that owns the failing Formula, when known.
    pub path: Option<String>,
    /// Possibly truncated source text of the failing Formula.
    pub source: Option<String>,
}

const SOURCE_FRAGMENT_LEN: usize = 40;

impl From<CalcErrorKind> for CalcError {
    fn from(kind: CalcErrorKind) -> Self {
        Self {
            kind,
            params: Vec::new(),
            path: None,
            source: None,
        }
    }
}

impl CalcError {
    pub fn new(kind: CalcErrorKind) -> Self {
        kind.into()
    }

    /// Attach a named parameter.
    pub fn with_param<S: Into<String>>(mut self, key: &'static str, value: S) -> Self {
        self.params.push((key, value.into()));
        self
    }

    /// Attach the owning node's path.
    pub fn with_path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach the formula source text, truncated to a displayable fragment.
    pub fn with_source(mut self, source: &str) -> Self {
        let mut fragment: String = source.chars().take(SOURCE_FRAGMENT_LEN).collect();
        if fragment.len() < source.len() {
            fragment.push('…');
        }
        self.source = Some(fragment);
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for (key, value) in &self.params {
            write!(f, " {key}={value}")?;
        }
        if let Some(ref path) = self.path {
            write!(f, " [{path}]")?;
        }
        if let Some(ref source) = self.source {
            write!(f, " \"{source}\"")?;
        }
        Ok(())
    }
}

impl Error for CalcError {}

impl From<CalcError> for String {
    fn from(error: CalcError) -> Self {
        format!("{error}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_params_path_and_source() {
        let err = CalcError::new(CalcErrorKind::IndexOutOfBounds)
            .with_param("row", "4")
            .with_param("rows", "3")
            .with_path("root.x1")
            .with_source("a[4,1]");
        let rendered = err.to_string();
        assert!(rendered.starts_with("indexOutOfBounds"));
        assert!(rendered.contains("row=4"));
        assert!(rendered.contains("[root.x1]"));
        assert!(rendered.contains("\"a[4,1]\""));
    }

    #[test]
    fn long_source_is_truncated() {
        let long = "x".repeat(200);
        let err = CalcError::new(CalcErrorKind::Syntax).with_source(&long);
        let fragment = err.source.unwrap();
        assert!(fragment.chars().count() <= SOURCE_FRAGMENT_LEN + 1);
        assert!(fragment.ends_with('…'));
    }

    #[test]
    fn compile_kinds_are_sticky() {
        assert!(CalcErrorKind::UnknownFunction.is_compile_error());
        assert!(!CalcErrorKind::UnitMismatch.is_compile_error());
    }
}
