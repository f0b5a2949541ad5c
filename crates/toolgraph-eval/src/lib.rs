pub mod builtins;
pub mod engine;
pub mod function;
pub mod function_registry;
pub mod interpreter;
pub mod scope;
pub mod traits;

#[cfg(test)]
mod tests;

pub use engine::{ExpressionTool, Formula, ModelTool};
pub use function::{FnCaps, Function};
pub use interpreter::{ArgumentHandle, Interpreter, RECURSION_LIMIT};
pub use scope::Scope;
pub use traits::{EvaluationContext, Tool, ToolRc, ToolWeak};

// Re-export the layers below for downstream convenience.
pub use toolgraph_common as common;
pub use toolgraph_parse as parse;
