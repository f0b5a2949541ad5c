//! One compiled, cached expression bound to a single owning Tool.
//!
//! A Formula owns its source text and compiled tree. Recompiling happens
//! only when the source is reassigned. Errors are caught once at this
//! boundary: the first error of an evaluation pass is recorded, later
//! ones are dropped, and the value degrades to `None` — the only
//! representation of "could not compute".

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use toolgraph_common::{CalcError, UnitRegistry, Value};
use toolgraph_parse::{OpNode, parse};

use crate::interpreter::Interpreter;
use crate::scope::Scope;
use crate::traits::ToolWeak;

pub struct Formula {
    /// The formula's name on its owner (used for default-unit inference).
    name: String,
    owner: RefCell<Option<ToolWeak>>,
    source: RefCell<String>,
    tree: RefCell<Option<Rc<OpNode>>>,
    error: RefCell<Option<CalcError>>,
    warning: RefCell<Option<CalcError>>,
}

impl Formula {
    pub fn new<S: Into<String>>(name: S, source: &str) -> Formula {
        Formula {
            name: name.into(),
            owner: RefCell::new(None),
            source: RefCell::new(source.to_string()),
            tree: RefCell::new(None),
            error: RefCell::new(None),
            warning: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_owner(&self, owner: ToolWeak) {
        *self.owner.borrow_mut() = Some(owner);
    }

    pub fn source(&self) -> String {
        self.source.borrow().clone()
    }

    /// Reassigning the source is the only thing that recompiles a formula;
    /// it clears the compiled tree and both error tiers, then notifies the
    /// owner.
    pub fn set_source(&self, text: &str) {
        if *self.source.borrow() == text {
            return;
        }
        *self.source.borrow_mut() = text.to_string();
        self.tree.borrow_mut().take();
        self.error.borrow_mut().take();
        self.warning.borrow_mut().take();
        if let Some(owner) = self.owner() {
            owner.changed_formula(&self.name);
        }
    }

    fn owner(&self) -> Option<crate::traits::ToolRc> {
        self.owner.borrow().as_ref().and_then(|weak| weak.upgrade())
    }

    fn owner_path(&self) -> String {
        self.owner().map(|o| o.path()).unwrap_or_default()
    }

    pub fn is_in_error(&self) -> bool {
        self.error.borrow().is_some()
    }

    pub fn error(&self) -> Option<CalcError> {
        self.error.borrow().clone()
    }

    pub fn warning(&self) -> Option<CalcError> {
        self.warning.borrow().clone()
    }

    /// First error wins; later errors in the same pass are dropped.
    pub fn record_error(&self, error: CalcError) {
        let mut slot = self.error.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Warnings follow the same first-wins rule but never suppress a
    /// result.
    pub fn record_warning(&self, warning: CalcError) {
        let mut slot = self.warning.borrow_mut();
        if slot.is_none() {
            *slot = Some(warning);
        }
    }

    /// Invalidation hook: evaluation-tier errors clear so upstream fixes
    /// can propagate; compile-tier errors stay sticky until the source
    /// changes.
    pub fn forget_evaluation_error(&self) {
        let mut slot = self.error.borrow_mut();
        if slot.as_ref().is_some_and(|e| !e.kind.is_compile_error()) {
            slot.take();
        }
        self.warning.borrow_mut().take();
    }

    fn compile(&self) -> Option<Rc<OpNode>> {
        if let Some(tree) = self.tree.borrow().as_ref() {
            return Some(Rc::clone(tree));
        }
        let source = self.source.borrow().clone();
        if source.trim().is_empty() {
            return None;
        }
        match parse(&source, UnitRegistry::global(), &crate::function_registry::min_args) {
            Ok(mut tree) => {
                // A bare numeric literal picks up the owner's default unit
                // for this formula, if it names one.
                if let OpNode::NumberConstant(value) = tree {
                    if let Some(unit) = self
                        .owner()
                        .and_then(|o| o.default_formula_unit(&self.name))
                    {
                        tree = OpNode::UnitConstant { value, unit };
                    }
                }
                let tree = Rc::new(tree);
                *self.tree.borrow_mut() = Some(Rc::clone(&tree));
                Some(tree)
            }
            Err(error) => {
                self.record_error(
                    error.with_path(self.owner_path()).with_source(&source),
                );
                None
            }
        }
    }

    /// Compile (if needed) and evaluate against the scope. Any error from
    /// the unit system, value model, compiler, or evaluation is caught
    /// here, recorded, and converted to `None`.
    pub fn value(&self, scope: &Scope) -> Option<Value> {
        if self.is_in_error() {
            return None;
        }
        let tree = self.compile()?;
        match Interpreter::new(scope).evaluate(&tree) {
            Ok(value) => Some(value),
            Err(error) => {
                let source = self.source.borrow().clone();
                self.record_error(
                    error.with_path(self.owner_path()).with_source(&source),
                );
                None
            }
        }
    }

    /// Collect every tool this formula's compiled tree references — the
    /// same nodes evaluation would touch — as paths into `set`.
    pub fn add_input_sources(&self, scope: &Scope, set: &mut BTreeSet<String>) {
        let Some(tree) = self.compile() else {
            return;
        };
        let mut paths = Vec::new();
        tree.collect_reference_paths(&mut paths);
        for path in paths {
            if let Some(tool) = scope.resolve_tool(&path) {
                set.insert(tool.path());
            }
        }
    }
}
