pub mod parser;
pub mod tokenizer;

pub use parser::{BinaryOp, FunctionResolver, OpNode, Parser, UnaryOp, parse};
pub use tokenizer::{Token, TokenType, Tokenizer};

// Re-export common types
pub use toolgraph_common::{CalcError, CalcErrorKind, Unit, UnitRegistry, Value};
