//! The host-facing Tool contract.
//!
//! A Tool is a node in the surrounding dataflow graph. The engine never
//! owns Tools; it sees them as `Rc<dyn Tool>` handles, keeps only weak
//! back-references for invalidation fan-out, and drives them through this
//! object-safe trait.

use std::rc::{Rc, Weak};
use std::sync::Arc;

use toolgraph_common::{CalcError, Unit, UnitRegistry, Value};

pub type ToolRc = Rc<dyn Tool>;
pub type ToolWeak = Weak<dyn Tool>;

pub trait Tool {
    fn name(&self) -> String;

    fn parent(&self) -> Option<ToolRc>;

    /// Dotted path from the root, for diagnostics.
    fn path(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{}.{}", parent.path(), self.name()),
            None => self.name(),
        }
    }

    /// Wire this tool into a parent. Containers call this when adopting.
    fn attach(&self, _parent: ToolWeak) {}

    fn child_named(&self, _name: &str) -> Option<ToolRc> {
        None
    }

    /// The value this tool publishes under `name` ("" means the tool's
    /// primary value). Observation creates a dependency edge: a provider
    /// must record `requestor` before returning, cached hit or not.
    fn value_described_by(&self, name: &str, requestor: Option<&ToolRc>) -> Option<Value>;

    /// Clear cached state and cascade to every requestor. Implementations
    /// guard with a re-entrancy flag so requestor cycles clear each node
    /// exactly once.
    fn forget_calculated(&self) {}

    fn add_requestor(&self, _requestor: &ToolRc) {}

    /// Notification that the named formula's source text was reassigned.
    fn changed_formula(&self, _formula_name: &str) {}

    /// A display unit to infer for a bare numeric literal assigned to the
    /// named formula.
    fn default_formula_unit(&self, _formula_name: &str) -> Option<Arc<Unit>> {
        None
    }

    fn set_error(&self, _error: CalcError) {}

    fn set_warning(&self, _warning: CalcError) {}

    fn is_in_error(&self) -> bool {
        false
    }
}

/// Narrow context handed to builtin functions.
pub trait EvaluationContext {
    fn units(&self) -> &UnitRegistry;
}

/// Topmost ancestor of a tool (the tool itself when unparented).
pub fn root_of(tool: &ToolRc) -> ToolRc {
    let mut current = Rc::clone(tool);
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}
