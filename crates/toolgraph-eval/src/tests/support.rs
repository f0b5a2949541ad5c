//! Shared graph-building helpers for the engine tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use toolgraph_common::{ColumnData, Value};

use crate::engine::{ExpressionTool, ModelTool};
use crate::traits::{Tool, ToolRc, ToolWeak};

/// A tool publishing a fixed value — the stand-in for host node types
/// (tables, imports) that produce data rather than formulas. It still
/// honors the requestor protocol so invalidation tests can drive it.
pub struct FixedValueTool {
    name: String,
    parent: RefCell<Option<ToolWeak>>,
    value: RefCell<Value>,
    requestors: RefCell<Vec<ToolWeak>>,
    forgetting: Cell<bool>,
}

impl FixedValueTool {
    pub fn new(name: &str, value: Value) -> Rc<FixedValueTool> {
        Rc::new(FixedValueTool {
            name: name.to_string(),
            parent: RefCell::new(None),
            value: RefCell::new(value),
            requestors: RefCell::new(Vec::new()),
            forgetting: Cell::new(false),
        })
    }

    /// Replace the published value, invalidating every reader.
    pub fn set_value(&self, value: Value) {
        *self.value.borrow_mut() = value;
        self.forget_calculated();
    }
}

impl Tool for FixedValueTool {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn parent(&self) -> Option<ToolRc> {
        self.parent.borrow().as_ref().and_then(|weak| weak.upgrade())
    }

    fn attach(&self, parent: ToolWeak) {
        *self.parent.borrow_mut() = Some(parent);
    }

    fn value_described_by(&self, name: &str, requestor: Option<&ToolRc>) -> Option<Value> {
        if let Some(requestor) = requestor {
            self.add_requestor(requestor);
        }
        let value = self.value.borrow().clone();
        if name.is_empty() {
            return Some(value);
        }
        // A table answers for its column names.
        match value {
            Value::Table(table) => {
                let column = table.column_named(name)?;
                Some(match &column.data {
                    ColumnData::Number(v) => Value::Number(v.clone()),
                    ColumnData::String(v) => Value::String(v.clone()),
                })
            }
            _ => None,
        }
    }

    fn forget_calculated(&self) {
        if self.forgetting.get() {
            return;
        }
        self.forgetting.set(true);
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

    fn changed_formula(&self, _formula_name: &str) {}
}

/// A root model populated with expression tools for each (name, formula)
/// pair. Returns the model plus typed handles to the expressions.
pub fn model_with(formulas: &[(&str, &str)]) -> (Rc<ModelTool>, Vec<Rc<ExpressionTool>>) {
    let model = ModelTool::new("root");
    let mut tools = Vec::with_capacity(formulas.len());
    for (name, source) in formulas {
        let tool = ExpressionTool::new(name, source);
        model.add_child(tool.clone());
        tools.push(tool);
    }
    (model, tools)
}
