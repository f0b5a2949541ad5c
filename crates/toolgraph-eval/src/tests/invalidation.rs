//! Requestor tracking and cascading invalidation.

use toolgraph_common::Value;

use super::support::{FixedValueTool, model_with};
use crate::engine::{ExpressionTool, ModelTool};
use crate::traits::{Tool, ToolRc};

#[test]
fn values_cache_until_upstream_changes() {
    let (_model, tools) = model_with(&[("a", "5"), ("b", "a * 2"), ("c", "b + 1")]);
    let (a, b, c) = (&tools[0], &tools[1], &tools[2]);

    assert_eq!(c.number_value().unwrap().first(), Some(11.0));
    assert!(a.has_cached_value());
    assert!(b.has_cached_value());
    assert!(c.has_cached_value());

    // Reassigning a's formula invalidates its transitive requestors.
    a.set_formula("6");
    assert!(!a.has_cached_value());
    assert!(!b.has_cached_value());
    assert!(!c.has_cached_value());

    assert_eq!(c.number_value().unwrap().first(), Some(13.0));
}

#[test]
fn observation_creates_an_edge_even_on_a_cached_hit() {
    let (model, tools) = model_with(&[("a", "5"), ("b", "a * 2")]);
    let (a, b) = (&tools[0], &tools[1]);

    // Prime a's cache through b.
    assert_eq!(b.number_value().unwrap().first(), Some(10.0));

    // A later reader hits a's cache; it must still be registered.
    let c = ExpressionTool::new("c", "a + 1");
    model.add_child(c.clone());
    assert_eq!(c.number_value().unwrap().first(), Some(6.0));

    a.set_formula("7");
    assert!(!b.has_cached_value());
    assert!(!c.has_cached_value());
}

#[test]
fn cyclic_requestor_graph_clears_each_node_once() {
    let (_model, tools) = model_with(&[("x", "1"), ("y", "2")]);
    let (x, y) = (&tools[0], &tools[1]);
    x.value();
    y.value();

    // Manufacture a requestor cycle; forget must terminate and clear both.
    let x_rc: ToolRc = x.clone();
    let y_rc: ToolRc = y.clone();
    x.add_requestor(&y_rc);
    y.add_requestor(&x_rc);

    x.forget_calculated();
    assert!(!x.has_cached_value());
    assert!(!y.has_cached_value());

    // Both usable afterwards.
    assert_eq!(x.number_value().unwrap().first(), Some(1.0));
    assert_eq!(y.number_value().unwrap().first(), Some(2.0));
}

#[test]
fn removing_a_node_invalidates_downstream_readers() {
    let (model, tools) = model_with(&[("a", "2"), ("b", "a * 3"), ("c", "b + a")]);
    let (_a, b, c) = (&tools[0], &tools[1], &tools[2]);

    assert_eq!(c.number_value().unwrap().first(), Some(8.0));
    assert!(b.has_cached_value() && c.has_cached_value());

    model.remove_child("a");
    assert!(!b.has_cached_value());
    assert!(!c.has_cached_value());

    // With a gone, b degrades to null and records the failure.
    assert_eq!(b.value(), None);
    assert!(b.is_in_error());
}

#[test]
fn forgetting_clears_evaluation_errors_but_not_compile_errors() {
    let (_model, tools) = model_with(&[("a", "1 s"), ("b", "a + 2 m"), ("broken", "1 +")]);
    let (a, b, broken) = (&tools[0], &tools[1], &tools[2]);

    // b fails with a unit mismatch against a's seconds.
    assert_eq!(b.value(), None);
    assert!(b.is_in_error());

    // Fixing a propagates: the eval-tier error clears on invalidation.
    a.set_formula("1 m");
    assert!(!b.is_in_error());
    assert_eq!(b.number_value().unwrap().first(), Some(3.0));

    // Compile errors survive invalidation.
    assert_eq!(broken.value(), None);
    broken.forget_calculated();
    assert!(broken.is_in_error());
}

#[test]
fn fixed_value_tools_participate_in_the_protocol() {
    let model = ModelTool::new("root");
    let input = FixedValueTool::new("input", Value::scalar_number(4.0));
    model.add_child(input.clone());
    let double = ExpressionTool::new("double", "input * 2");
    model.add_child(double.clone());

    assert_eq!(double.number_value().unwrap().first(), Some(8.0));
    input.set_value(Value::scalar_number(10.0));
    assert!(!double.has_cached_value());
    assert_eq!(double.number_value().unwrap().first(), Some(20.0));
}

#[test]
fn requestors_are_weak_and_deduplicated() {
    let (_model, tools) = model_with(&[("a", "1"), ("b", "a + a + a")]);
    let (a, b) = (&tools[0], &tools[1]);
    // Three reads from one evaluation leave a single requestor edge.
    assert_eq!(b.number_value().unwrap().first(), Some(3.0));
    assert_eq!(a.requestor_count(), 1);
    a.forget_calculated();
    assert_eq!(a.requestor_count(), 0);
    assert!(!b.has_cached_value());
}
