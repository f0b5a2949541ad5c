//! The core `Function` trait and its capability flags.

use toolgraph_common::{CalcError, Value};

use crate::interpreter::ArgumentHandle;
use crate::traits::EvaluationContext;

bitflags::bitflags! {
    /// Coarse properties of a builtin, used for catalog introspection.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FnCaps: u8 {
        /// Same output for the same inputs, no side effects.
        const PURE        = 0b0000_0001;
        /// Reduces a matrix (or several) to fewer values.
        const REDUCTION   = 0b0000_0010;
        /// Operates on each element independently.
        const ELEMENTWISE = 0b0000_0100;
        /// Reshapes or reorders without computing new elements.
        const STRUCTURAL  = 0b0000_1000;
        /// Text-oriented.
        const TEXT        = 0b0001_0000;
    }
}

/// An entry in the function catalog.
///
/// Arguments arrive unevaluated as [`ArgumentHandle`]s; a function pulls
/// the values it needs. Minimum arity is enforced at compile time by the
/// parser, so `eval` may index its first `min_args` handles freely.
pub trait Function: Send + Sync + 'static {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE
    }

    /// Canonical lowercase name.
    fn name(&self) -> &'static str;

    fn min_args(&self) -> usize {
        0
    }

    fn eval(
        &self,
        args: &[ArgumentHandle],
        ctx: &dyn EvaluationContext,
    ) -> Result<Value, CalcError>;
}
