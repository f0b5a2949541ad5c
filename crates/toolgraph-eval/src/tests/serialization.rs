//! JSON round-trips through the tagged value reprs.

use toolgraph_common::value::repr::{ColumnValues, ValueRepr, from_repr, to_repr};
use toolgraph_common::{
    Dimensions, NumberValue, StringValue, TableColumn, TableValue, UnitRegistry, Value, dim,
};

fn round_trip(value: &Value) -> Value {
    let registry = UnitRegistry::global();
    let repr = to_repr(value, registry);
    let json = serde_json::to_string(&repr).unwrap();
    let back: ValueRepr = serde_json::from_str(&json).unwrap();
    from_repr(&back, registry).unwrap()
}

#[test]
fn number_repr_is_tagged_and_unit_scaled() {
    let registry = UnitRegistry::global();
    let value = Value::Number(NumberValue::new(
        2,
        1,
        Dimensions::single(dim::LENGTH, 1.0),
        vec![1.0, 2.5],
    ));
    let repr = to_repr(&value, registry);
    let json = serde_json::to_value(&repr).unwrap();
    assert_eq!(json["t"], "n");
    assert_eq!(json["rows"], 2);
    assert_eq!(json["unit"], "m");

    let back = round_trip(&value);
    let number = back.as_number().unwrap();
    assert_eq!(number.shape(), (2, 1));
    for (a, b) in [1.0, 2.5].iter().zip(number.data()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn string_repr_round_trips_counts() {
    let value = Value::String(StringValue::new(
        2,
        2,
        vec!["a".into(), "b".into(), "c".into(), "d".into()],
    ));
    let registry = UnitRegistry::global();
    let json = serde_json::to_value(to_repr(&value, registry)).unwrap();
    assert_eq!(json["t"], "s");
    assert_eq!(round_trip(&value), value);
}

#[test]
fn table_repr_tags_columns_and_preserves_display_units() {
    let registry = UnitRegistry::global();
    let ft = registry.lookup("ft").unwrap();
    let feet = NumberValue::new(
        3,
        1,
        Dimensions::single(dim::LENGTH, 1.0),
        vec![0.3048, 0.6096, 0.9144],
    );
    let labels = StringValue::new(3, 1, vec!["one".into(), "two".into(), "three".into()]);
    let value = Value::Table(
        TableValue::new(vec![
            TableColumn::number("Length", feet).with_display_unit(ft),
            TableColumn::string("Label", labels).with_format("%12s"),
        ])
        .unwrap(),
    );

    let repr = to_repr(&value, registry);
    let json = serde_json::to_value(&repr).unwrap();
    assert_eq!(json["t"], "t");
    assert_eq!(json["columns"][0]["t"], "tc");
    assert_eq!(json["columns"][0]["unit"], "ft");
    assert_eq!(json["columns"][0]["values"][0], 1.0);
    assert_eq!(json["columns"][1]["t"], "tc");

    let back = round_trip(&value);
    let table = back.as_table().unwrap();
    assert_eq!(table.shape(), (3, 2));
    let repr = to_repr(&back, registry);
    let ValueRepr::Table { columns } = repr else {
        panic!("table repr expected");
    };
    match &columns[0].values {
        ColumnValues::Numbers(values) => {
            assert!((values[0] - 1.0).abs() < 1e-9);
            assert!((values[2] - 3.0).abs() < 1e-9);
        }
        other => panic!("numbers expected, got {other:?}"),
    }
}

#[test]
fn dimensionless_numbers_serialize_raw() {
    let value = Value::Number(NumberValue::new(1, 3, Dimensions::none(), vec![1.0, 2.0, 3.0]));
    let registry = UnitRegistry::global();
    let repr = to_repr(&value, registry);
    let ValueRepr::Number { unit, values, .. } = &repr else {
        panic!("number repr expected");
    };
    // "fraction" is the registered dimensionless display unit with scale 1.
    assert!(unit.is_none() || unit.as_deref() == Some("fraction"));
    assert_eq!(values, &vec![1.0, 2.0, 3.0]);
    assert_eq!(round_trip(&value).as_number().unwrap().data(), &[1.0, 2.0, 3.0]);
}
