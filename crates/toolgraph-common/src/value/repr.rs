//! Serialization reprs for values.
//!
//! Each value kind maps to an object tagged with a one-character type code:
//! `n` number, `s` string, `t` table, `tc` table column. Numbers serialize
//! through a display unit (the column's, or the default unit for the
//! value's dimensions) so stored data stays human-legible; deserializing
//! converts back to base values through the named unit.

use serde::{Deserialize, Serialize};

use crate::error::CalcError;
use crate::units::{Dimensions, UnitRegistry};
use crate::value::number::NumberValue;
use crate::value::strings::StringValue;
use crate::value::table::{ColumnData, TableColumn, TableValue};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ValueRepr {
    #[serde(rename = "n")]
    Number {
        rows: usize,
        cols: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        values: Vec<f64>,
    },
    #[serde(rename = "s")]
    String {
        rows: usize,
        cols: usize,
        values: Vec<String>,
    },
    #[serde(rename = "t")]
    Table { columns: Vec<ColumnRepr> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRepr {
    /// Always `"tc"`.
    pub t: String,
    pub name: String,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub values: ColumnValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValues {
    Numbers(Vec<f64>),
    Strings(Vec<String>),
}

/// Build the serialization repr of a value.
pub fn to_repr(value: &Value, registry: &UnitRegistry) -> ValueRepr {
    match value {
        Value::Number(v) => {
            let (unit, values) = display_values(v, registry, None);
            ValueRepr::Number {
                rows: v.rows(),
                cols: v.cols(),
                unit,
                values,
            }
        }
        Value::String(v) => ValueRepr::String {
            rows: v.rows(),
            cols: v.cols(),
            values: v.data().to_vec(),
        },
        Value::Table(v) => ValueRepr::Table {
            columns: v.columns().iter().map(|c| column_repr(c, registry)).collect(),
        },
    }
}

fn column_repr(column: &TableColumn, registry: &UnitRegistry) -> ColumnRepr {
    match &column.data {
        ColumnData::Number(v) => {
            let preferred = column.display_unit.as_ref().map(|u| u.name.clone());
            let (unit, values) = display_values(v, registry, preferred);
            ColumnRepr {
                t: "tc".to_string(),
                name: column.name.clone(),
                rows: v.rows(),
                unit,
                format: column.format.clone(),
                values: ColumnValues::Numbers(values),
            }
        }
        ColumnData::String(v) => ColumnRepr {
            t: "tc".to_string(),
            name: column.name.clone(),
            rows: v.rows(),
            unit: None,
            format: column.format.clone(),
            values: ColumnValues::Strings(v.data().to_vec()),
        },
    }
}

/// Convert base values through the preferred display unit (falling back to
/// the default unit for the dimensions). Dimensioned values with no known
/// unit serialize as raw base values with no unit name.
fn display_values(
    value: &NumberValue,
    registry: &UnitRegistry,
    preferred: Option<String>,
) -> (Option<String>, Vec<f64>) {
    let unit = match preferred {
        Some(name) => registry.lookup(&name).ok(),
        None => registry.default_unit_for(value.dims()),
    };
    match unit {
        Some(unit) => {
            let values = value.data().iter().map(|&v| unit.from_base(v)).collect();
            (Some(unit.name.clone()), values)
        }
        None => (None, value.data().to_vec()),
    }
}

/// Rebuild a value from its repr, converting data back to base values
/// through the named display units.
pub fn from_repr(repr: &ValueRepr, registry: &UnitRegistry) -> Result<Value, CalcError> {
    match repr {
        ValueRepr::Number {
            rows,
            cols,
            unit,
            values,
        } => {
            let (dims, data) = base_values(unit.as_deref(), values, registry)?;
            Ok(Value::Number(NumberValue::new(*rows, *cols, dims, data)))
        }
        ValueRepr::String { rows, cols, values } => Ok(Value::String(StringValue::new(
            *rows,
            *cols,
            values.clone(),
        ))),
        ValueRepr::Table { columns } => {
            let mut out = Vec::with_capacity(columns.len());
            for column in columns {
                let data = match &column.values {
                    ColumnValues::Numbers(values) => {
                        let (dims, data) =
                            base_values(column.unit.as_deref(), values, registry)?;
                        ColumnData::Number(NumberValue::new(column.rows, 1, dims, data))
                    }
                    ColumnValues::Strings(values) => {
                        ColumnData::String(StringValue::new(column.rows, 1, values.clone()))
                    }
                };
                let mut rebuilt = TableColumn {
                    name: column.name.clone(),
                    data,
                    display_unit: None,
                    format: column.format.clone(),
                };
                if let Some(unit) = &column.unit {
                    rebuilt.display_unit = Some(registry.lookup(unit)?);
                }
                out.push(rebuilt);
            }
            Ok(Value::Table(TableValue::new(out)?))
        }
    }
}

fn base_values(
    unit: Option<&str>,
    values: &[f64],
    registry: &UnitRegistry,
) -> Result<(Dimensions, Vec<f64>), CalcError> {
    match unit {
        Some(name) => {
            let unit = registry.lookup(name)?;
            let data = values.iter().map(|&v| unit.to_base(v)).collect();
            Ok((unit.dims, data))
        }
        None => Ok((Dimensions::none(), values.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::dim;

    #[test]
    fn number_round_trips_through_display_unit() {
        let registry = UnitRegistry::with_master_set();
        let v = Value::Number(NumberValue::new(
            2,
            1,
            Dimensions::single(dim::LENGTH, 1.0),
            vec![3.048, 6.096],
        ));
        let repr = to_repr(&v, &registry);
        match &repr {
            ValueRepr::Number { unit, .. } => assert_eq!(unit.as_deref(), Some("m")),
            other => panic!("unexpected repr {other:?}"),
        }
        let back = from_repr(&repr, &registry).unwrap();
        let original = v.as_number().unwrap();
        let rebuilt = back.as_number().unwrap();
        assert_eq!(rebuilt.shape(), original.shape());
        for (a, b) in original.data().iter().zip(rebuilt.data()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn table_round_trips_counts_and_units() {
        let registry = UnitRegistry::with_master_set();
        let ft = registry.lookup("ft").unwrap();
        let x = NumberValue::new(
            2,
            1,
            Dimensions::single(dim::LENGTH, 1.0),
            vec![0.3048, 0.6096],
        );
        let names = StringValue::new(2, 1, vec!["a".into(), "b".into()]);
        let table = TableValue::new(vec![
            TableColumn::number("X", x).with_display_unit(ft),
            TableColumn::string("Name", names),
        ])
        .unwrap();
        let v = Value::Table(table);

        let repr = to_repr(&v, &registry);
        let ValueRepr::Table { columns } = &repr else {
            panic!("table repr expected");
        };
        assert_eq!(columns[0].t, "tc");
        assert_eq!(columns[0].unit.as_deref(), Some("ft"));
        match &columns[0].values {
            ColumnValues::Numbers(values) => {
                assert!((values[0] - 1.0).abs() < 1e-9);
                assert!((values[1] - 2.0).abs() < 1e-9);
            }
            other => panic!("unexpected column values {other:?}"),
        }

        let back = from_repr(&repr, &registry).unwrap();
        assert_eq!(back.shape(), v.shape());
        let rebuilt = back.as_table().unwrap();
        let ColumnData::Number(col) = &rebuilt.column_named("X").unwrap().data else {
            panic!()
        };
        assert!((col.at(1, 1).unwrap() - 0.3048).abs() < 1e-9);
    }
}
