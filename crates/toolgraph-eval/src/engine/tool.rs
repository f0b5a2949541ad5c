//! Reference Tool implementations.
//!
//! `ExpressionTool` is the canonical formula owner: node-local value
//! cache, weak requestor set, and the re-entrancy-guarded invalidation
//! cascade. `ModelTool` is a named container providing the tree that
//! name resolution walks. Hosts with richer node types implement the same
//! `Tool` trait; these two are enough to drive the engine and its tests.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use toolgraph_common::{CalcError, NumberValue, Unit, Value};

use crate::engine::formula::Formula;
use crate::scope::Scope;
use crate::traits::{Tool, ToolRc, ToolWeak};

/* ───────────────────── ExpressionTool ───────────────────── */

pub struct ExpressionTool {
    name: String,
    myself: Weak<ExpressionTool>,
    parent: RefCell<Option<ToolWeak>>,
    formula: Formula,
    cached: RefCell<Option<Value>>,
    requestors: RefCell<Vec<ToolWeak>>,
    /// Re-entrancy flag: a forget cascade touches this node once.
    forgetting: Cell<bool>,
    /// Display unit inferred for a bare numeric formula.
    default_unit: RefCell<Option<Arc<Unit>>>,
}

impl ExpressionTool {
    pub fn new(name: &str, source: &str) -> Rc<ExpressionTool> {
        let tool = Rc::new_cyclic(|me: &Weak<ExpressionTool>| ExpressionTool {
            name: name.to_string(),
            myself: me.clone(),
            parent: RefCell::new(None),
            formula: Formula::new("formula", source),
            cached: RefCell::new(None),
            requestors: RefCell::new(Vec::new()),
            forgetting: Cell::new(false),
            default_unit: RefCell::new(None),
        });
        let weak: ToolWeak = tool.myself.clone();
        tool.formula.set_owner(weak);
        tool
    }

    fn as_tool(&self) -> ToolRc {
        let rc: ToolRc = self.myself.upgrade().expect("tool is alive");
        rc
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// Reassign the formula's source text.
    pub fn set_formula(&self, source: &str) {
        self.formula.set_source(source);
    }

    pub fn set_default_unit(&self, unit: Arc<Unit>) {
        *self.default_unit.borrow_mut() = Some(unit);
    }

    /// This tool's value, computed on demand.
    pub fn value(&self) -> Option<Value> {
        self.value_described_by("", None)
    }

    /// Numeric view of this tool's value.
    pub fn number_value(&self) -> Option<NumberValue> {
        self.value().and_then(|v| v.number_value().ok())
    }

    #[cfg(test)]
    pub(crate) fn has_cached_value(&self) -> bool {
        self.cached.borrow().is_some()
    }

    #[cfg(test)]
    pub(crate) fn requestor_count(&self) -> usize {
        self.requestors.borrow().len()
    }
}

impl Tool for ExpressionTool {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn parent(&self) -> Option<ToolRc> {
        self.parent.borrow().as_ref().and_then(|weak| weak.upgrade())
    }

    fn attach(&self, parent: ToolWeak) {
        *self.parent.borrow_mut() = Some(parent);
    }

    fn value_described_by(&self, _name: &str, requestor: Option<&ToolRc>) -> Option<Value> {
        // Observation always creates the dependency edge, cached or not.
        if let Some(requestor) = requestor {
            self.add_requestor(requestor);
        }
        if let Some(value) = self.cached.borrow().clone() {
            return Some(value);
        }
        let scope = Scope::for_tool(self.as_tool());
        let computed = self.formula.value(&scope);
        *self.cached.borrow_mut() = computed.clone();
        computed
    }

    fn forget_calculated(&self) {
        if self.forgetting.get() {
            return;
        }
        self.forgetting.set(true);
        self.cached.borrow_mut().take();
        self.formula.forget_evaluation_error();
        let requestors: Vec<ToolWeak> = self.requestors.borrow().clone();
        for weak in requestors {
            if let Some(requestor) = weak.upgrade() {
                requestor.forget_calculated();
            }
        }
        self.requestors.borrow_mut().clear();
        self.forgetting.set(false);
    }

    fn add_requestor(&self, requestor: &ToolRc) {
        let mut requestors = self.requestors.borrow_mut();
        let incoming = Rc::as_ptr(requestor) as *const ();
        if !requestors
            .iter()
            .any(|w| w.as_ptr() as *const () == incoming)
        {
            requestors.push(Rc::downgrade(requestor));
        }
    }

    fn changed_formula(&self, _formula_name: &str) {
        self.forget_calculated();
    }

    fn default_formula_unit(&self, _formula_name: &str) -> Option<Arc<Unit>> {
        self.default_unit.borrow().clone()
    }

    fn set_error(&self, error: CalcError) {
        self.formula.record_error(error);
    }

    fn set_warning(&self, warning: CalcError) {
        self.formula.record_warning(warning);
    }

    fn is_in_error(&self) -> bool {
        self.formula.is_in_error()
    }
}

/* ───────────────────── ModelTool ───────────────────── */

/// A named container of tools; the unit of name resolution. A model's
/// value under a child's name is that child's value.
pub struct ModelTool {
    name: String,
    myself: Weak<ModelTool>,
    parent: RefCell<Option<ToolWeak>>,
    /// Keyed by lowercase name.
    children: RefCell<FxHashMap<String, ToolRc>>,
}

impl ModelTool {
    pub fn new(name: &str) -> Rc<ModelTool> {
        Rc::new_cyclic(|me: &Weak<ModelTool>| ModelTool {
            name: name.to_string(),
            myself: me.clone(),
            parent: RefCell::new(None),
            children: RefCell::new(FxHashMap::default()),
        })
    }

    /// Adopt a child tool, wiring its parent link.
    pub fn add_child(&self, child: ToolRc) {
        let weak: ToolWeak = self.myself.clone();
        child.attach(weak);
        self.children
            .borrow_mut()
            .insert(child.name().to_lowercase(), child);
    }

    /// Remove a child, invalidating everything that read it.
    pub fn remove_child(&self, name: &str) -> Option<ToolRc> {
        let removed = self.children.borrow_mut().remove(&name.to_lowercase());
        if let Some(child) = &removed {
            child.forget_calculated();
        }
        removed
    }
}

impl Tool for ModelTool {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn parent(&self) -> Option<ToolRc> {
        self.parent.borrow().as_ref().and_then(|weak| weak.upgrade())
    }

    fn attach(&self, parent: ToolWeak) {
        *self.parent.borrow_mut() = Some(parent);
    }

    fn child_named(&self, name: &str) -> Option<ToolRc> {
        self.children.borrow().get(&name.to_lowercase()).cloned()
    }

    fn value_described_by(&self, name: &str, requestor: Option<&ToolRc>) -> Option<Value> {
        let (head, rest) = match name.split_once('.') {
            Some((head, rest)) => (head, rest),
            None => (name, ""),
        };
        self.child_named(head)?.value_described_by(rest, requestor)
    }

    fn forget_calculated(&self) {
        for child in self.children.borrow().values() {
            child.forget_calculated();
        }
    }
}
