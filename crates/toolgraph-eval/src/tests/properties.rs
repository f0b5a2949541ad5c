//! Property tests for the unit conversion contract.

use proptest::prelude::*;

use toolgraph_common::{Dimensions, UnitCalcKind, UnitRegistry, dim};

proptest! {
    // For every scale unit in the master set: from_base(to_base(v)) ≈ v.
    #[test]
    fn scale_units_round_trip(v in -1.0e9f64..1.0e9) {
        let registry = UnitRegistry::global();
        for name in ["m", "km", "cm", "ft", "in", "mi", "g", "lb", "min", "h", "n", "j", "pa"] {
            let unit = registry.lookup(name).unwrap();
            let back = unit.from_base(unit.to_base(v));
            prop_assert!((back - v).abs() <= v.abs().max(1.0) * 1e-12);
        }
    }

    #[test]
    fn offset_units_round_trip(v in -1.0e6f64..1.0e6) {
        let registry = UnitRegistry::global();
        for name in ["degC", "degF"] {
            let unit = registry.lookup(name).unwrap();
            let back = unit.from_base(unit.to_base(v));
            prop_assert!((back - v).abs() <= v.abs().max(1.0) * 1e-9);
        }
    }

    #[test]
    fn inverse_units_round_trip(v in 1.0e-6f64..1.0e6) {
        let registry = UnitRegistry::empty();
        let unit = registry
            .register("spr", Dimensions::single(dim::TIME, -1.0), UnitCalcKind::Inverse, 60.0, 0.0)
            .unwrap();
        let back = unit.from_base(unit.to_base(v));
        prop_assert!((back - v).abs() <= v.abs().max(1.0) * 1e-9);
    }

    // Compound scales always multiply out of their constituents.
    #[test]
    fn compound_scale_matches_constituents(exp in 1u32..4) {
        let registry = UnitRegistry::global();
        let name = format!("km/h^{exp}");
        let unit = registry.lookup(&name).unwrap();
        let expected = 1000.0 / 3600.0f64.powi(exp as i32);
        prop_assert!((unit.scale - expected).abs() < 1e-12);
    }
}
