//! End-to-end evaluation through formulas, scopes, and the value model.

use toolgraph_common::{
    CalcErrorKind, Dimensions, NumberValue, StringValue, TableColumn, TableValue, UnitRegistry,
    Value, dim,
};

use super::support::{FixedValueTool, model_with};
use crate::engine::{ExpressionTool, ModelTool};
use crate::traits::Tool;

fn meters_column(values: Vec<f64>) -> NumberValue {
    NumberValue::new(
        values.len(),
        1,
        Dimensions::single(dim::LENGTH, 1.0),
        values,
    )
}

#[test]
fn unit_literal_compiles_to_base_value() {
    let (_model, tools) = model_with(&[("x", "10 ft")]);
    let value = tools[0].value().unwrap();
    let number = value.as_number().unwrap();
    assert_eq!(number.shape(), (1, 1));
    assert!((number.first().unwrap() - 3.048).abs() < 1e-12);
    assert!(number.dims().equal(&Dimensions::single(dim::LENGTH, 1.0)));
}

#[test]
fn mixed_unit_addition_converts_to_base() {
    let (_model, tools) = model_with(&[("x", "3 m + 2 ft")]);
    let number = tools[0].number_value().unwrap();
    assert!((number.first().unwrap() - 3.6096).abs() < 1e-12);
}

#[test]
fn adding_incompatible_units_degrades_to_null() {
    let (_model, tools) = model_with(&[("x", "3 m + 2 s")]);
    assert_eq!(tools[0].value(), None);
    let error = tools[0].formula().error().unwrap();
    assert_eq!(error.kind, CalcErrorKind::UnitMismatch);
    assert_eq!(error.path.as_deref(), Some("root.x"));
}

#[test]
fn table_column_reference_broadcasts() {
    let model = ModelTool::new("root");
    let table = TableValue::new(vec![
        TableColumn::number("X", meters_column(vec![1.0, 2.0, 3.0])),
        TableColumn::string(
            "Name",
            StringValue::new(3, 1, vec!["a".into(), "b".into(), "c".into()]),
        ),
    ])
    .unwrap();
    model.add_child(FixedValueTool::new("table", Value::Table(table)));

    let expr = ExpressionTool::new("y", "table.X * 2");
    model.add_child(expr.clone());

    let value = expr.value().unwrap();
    let number = value.as_number().unwrap();
    assert_eq!(number.shape(), (3, 1));
    assert_eq!(number.data(), &[2.0, 4.0, 6.0]);
    assert!(number.dims().equal(&Dimensions::single(dim::LENGTH, 1.0)));
}

#[test]
fn function_call_scenario() {
    let (_model, tools) = model_with(&[("x", "{max 3, 7, 2}")]);
    assert_eq!(tools[0].number_value().unwrap().first(), Some(7.0));
}

#[test]
fn reference_chains_resolve_through_the_model() {
    let (_model, tools) = model_with(&[("a", "4"), ("b", "a * a"), ("c", "b + a")]);
    assert_eq!(tools[2].number_value().unwrap().first(), Some(20.0));
}

#[test]
fn mutual_references_stop_at_the_recursion_bound() {
    let (_model, tools) = model_with(&[("x1", "x2"), ("x2", "x1")]);
    assert_eq!(tools[0].value(), None);
    let error = tools[0].formula().error().unwrap();
    assert_eq!(error.kind, CalcErrorKind::Recursion);
}

#[test]
fn self_reference_also_stops() {
    let (_model, tools) = model_with(&[("x", "x + 1")]);
    assert_eq!(tools[0].value(), None);
    assert_eq!(
        tools[0].formula().error().unwrap().kind,
        CalcErrorKind::Recursion
    );
}

#[test]
fn compile_errors_are_sticky_until_source_changes() {
    let (_model, tools) = model_with(&[("x", "1 +")]);
    assert_eq!(tools[0].value(), None);
    let first = tools[0].formula().error().unwrap();
    assert_eq!(first.kind, CalcErrorKind::Syntax);

    // Repeated evaluation returns immediately with the same error.
    assert_eq!(tools[0].value(), None);
    assert_eq!(tools[0].formula().error().unwrap(), first);

    // Reassigning the source clears the error state.
    tools[0].set_formula("1 + 1");
    assert!(!tools[0].is_in_error());
    assert_eq!(tools[0].number_value().unwrap().first(), Some(2.0));
}

#[test]
fn unknown_function_is_a_compile_error_with_source() {
    let (_model, tools) = model_with(&[("x", "{frobnicate 1}")]);
    assert_eq!(tools[0].value(), None);
    let error = tools[0].formula().error().unwrap();
    assert_eq!(error.kind, CalcErrorKind::UnknownFunction);
    assert_eq!(error.source.as_deref(), Some("{frobnicate 1}"));
}

#[test]
fn bare_literal_picks_up_default_formula_unit() {
    let registry = UnitRegistry::global();
    let model = ModelTool::new("root");
    let expr = ExpressionTool::new("x", "10");
    expr.set_default_unit(registry.lookup("ft").unwrap());
    model.add_child(expr.clone());

    let number = expr.number_value().unwrap();
    assert!((number.first().unwrap() - 3.048).abs() < 1e-12);
    assert!(number.dims().equal(&Dimensions::single(dim::LENGTH, 1.0)));
}

#[test]
fn range_and_index_operators() {
    let (_model, tools) = model_with(&[("v", "1:5"), ("e", "(1:5)[3]"), ("m", "{max 2:9}")]);
    assert_eq!(tools[0].number_value().unwrap().shape(), (5, 1));
    assert_eq!(tools[1].number_value().unwrap().first(), Some(3.0));
    assert_eq!(tools[2].number_value().unwrap().first(), Some(9.0));
}

#[test]
fn member_access_sugar_reads_table_columns() {
    let model = ModelTool::new("root");
    let table = TableValue::new(vec![TableColumn::number(
        "X",
        meters_column(vec![5.0, 7.0]),
    )])
    .unwrap();
    model.add_child(FixedValueTool::new("t", Value::Table(table)));
    let expr = ExpressionTool::new("y", "(t)[0, \"X\"]");
    model.add_child(expr.clone());
    assert_eq!(expr.number_value().unwrap().data(), &[5.0, 7.0]);
}

#[test]
fn add_input_sources_walks_every_reference() {
    let model = ModelTool::new("root");
    let a = ExpressionTool::new("a", "1");
    let b = ExpressionTool::new("b", "2");
    let c = ExpressionTool::new("c", "a + b * a");
    model.add_child(a);
    model.add_child(b);
    model.add_child(c.clone());

    let mut set = std::collections::BTreeSet::new();
    let scope = crate::Scope::for_tool(c.clone());
    c.formula().add_input_sources(&scope, &mut set);
    assert_eq!(
        set.into_iter().collect::<Vec<_>>(),
        vec!["root.a".to_string(), "root.b".to_string()]
    );
}

#[test]
fn warnings_record_first_wins_without_suppressing_the_value() {
    use toolgraph_common::CalcError;

    let (_model, tools) = model_with(&[("x", "2 + 2")]);
    tools[0].set_warning(CalcError::new(CalcErrorKind::UnknownValue).with_param("hint", "first"));
    tools[0].set_warning(CalcError::new(CalcErrorKind::UnknownValue).with_param("hint", "second"));

    // The value still computes, and the first warning sticks.
    assert_eq!(tools[0].number_value().unwrap().first(), Some(4.0));
    let warning = tools[0].formula().warning().unwrap();
    assert_eq!(warning.param("hint"), Some("first"));
    assert!(!tools[0].is_in_error());
}

#[test]
fn string_concatenation_with_plus() {
    let (_model, tools) = model_with(&[("s", "\"tool\" + \"graph\"")]);
    let value = tools[0].value().unwrap();
    assert_eq!(value.as_string().unwrap().first(), Some("toolgraph"));
}
