//! Meta crate that re-exports the toolgraph building blocks with sensible
//! defaults. Downstream hosts can depend on this crate and opt into
//! specific layers via feature flags while keeping access to the
//! underlying crates when deeper integration is required.

pub use toolgraph_common as common;
pub use toolgraph_parse as parse;

#[cfg(feature = "eval")]
pub use toolgraph_eval as eval;

pub use toolgraph_common::{
    CalcError, CalcErrorKind, Dimensions, NumberValue, StringValue, TableColumn, TableValue,
    Unit, UnitCalcKind, UnitRegistry, Value,
};

#[cfg(feature = "eval")]
pub use toolgraph_eval::{ExpressionTool, Formula, ModelTool, Scope, Tool, ToolRc};
