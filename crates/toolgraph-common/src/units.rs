//! Dimensional unit system.
//!
//! Quantities are stored internally in SI base units ("base value"); a
//! [`Unit`] describes how a display quantity maps onto that base
//! representation. Units are created once at startup (plus compounds parsed
//! on demand), then shared immutably by reference.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{Datelike, NaiveDate, Timelike};
use once_cell::sync::Lazy;

use crate::error::{CalcError, CalcErrorKind};

/// Number of SI base quantities tracked per unit.
pub const DIM_COUNT: usize = 7;

/// Tolerance for comparing dimension exponents. Exponents are almost always
/// small integers, but `power` multiplies them by an arbitrary scalar, so
/// fractional exponents (e.g. from square roots) are representable.
pub const DIM_TOLERANCE: f64 = 1.0e-9;

/// Exponent vector over (length, mass, time, current, temperature, amount,
/// luminous intensity).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions(pub [f64; DIM_COUNT]);

impl Dimensions {
    pub const fn none() -> Self {
        Dimensions([0.0; DIM_COUNT])
    }

    pub fn single(index: usize, exponent: f64) -> Self {
        let mut dims = [0.0; DIM_COUNT];
        dims[index] = exponent;
        Dimensions(dims)
    }

    pub fn is_dimensionless(&self) -> bool {
        self.0.iter().all(|d| d.abs() < DIM_TOLERANCE)
    }

    /// Componentwise sum (multiplication of quantities).
    pub fn add(&self, other: &Dimensions) -> Dimensions {
        let mut out = [0.0; DIM_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.0[i] + other.0[i];
        }
        Dimensions(out)
    }

    /// Componentwise difference (division of quantities).
    pub fn subtract(&self, other: &Dimensions) -> Dimensions {
        let mut out = [0.0; DIM_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.0[i] - other.0[i];
        }
        Dimensions(out)
    }

    /// Every exponent multiplied by a scalar (raising to a power).
    pub fn scaled(&self, factor: f64) -> Dimensions {
        let mut out = self.0;
        for slot in &mut out {
            *slot *= factor;
        }
        Dimensions(out)
    }

    pub fn equal(&self, other: &Dimensions) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() < DIM_TOLERANCE)
    }

    /// Stable hash key; exponents quantized to 1e-6.
    pub(crate) fn key(&self) -> [i64; DIM_COUNT] {
        let mut key = [0i64; DIM_COUNT];
        for (i, slot) in key.iter_mut().enumerate() {
            *slot = (self.0[i] * 1_000_000.0).round() as i64;
        }
        key
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; DIM_COUNT] = ["L", "M", "T", "I", "Θ", "N", "J"];
        let mut wrote = false;
        for (name, exp) in NAMES.iter().zip(self.0.iter()) {
            if exp.abs() >= DIM_TOLERANCE {
                if wrote {
                    write!(f, " ")?;
                }
                write!(f, "{name}{exp}")?;
                wrote = true;
            }
        }
        if !wrote {
            write!(f, "1")?;
        }
        Ok(())
    }
}

/// Convenience indices into a dimension vector.
pub mod dim {
    pub const LENGTH: usize = 0;
    pub const MASS: usize = 1;
    pub const TIME: usize = 2;
    pub const CURRENT: usize = 3;
    pub const TEMPERATURE: usize = 4;
    pub const AMOUNT: usize = 5;
    pub const LUMINOUS: usize = 6;
}

/// How a unit's scale/offset pair is interpreted when converting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitCalcKind {
    /// Parsed from the compound grammar; scale computed once at registration.
    Compound,
    /// `base = value * scale`
    Scale,
    /// `base = (value + offset) * scale` (temperatures)
    Offset,
    /// `base = scale / (value + offset)`
    Inverse,
    /// Calendar `yyyymmdd.hhmmss` <-> epoch seconds.
    DateTime,
}

/// A named display unit. Immutable and shared by reference after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub name: String,
    pub dims: Dimensions,
    pub kind: UnitCalcKind,
    pub scale: f64,
    pub offset: f64,
}

impl Unit {
    /// Convert a display quantity into its SI base representation.
    ///
    /// Invalid calendar values under a DateTime unit convert to NaN rather
    /// than raising; the value model treats NaN as ordinary float data.
    pub fn to_base(&self, value: f64) -> f64 {
        match self.kind {
            UnitCalcKind::Compound | UnitCalcKind::Scale => value * self.scale,
            UnitCalcKind::Offset => (value + self.offset) * self.scale,
            UnitCalcKind::Inverse => self.scale / (value + self.offset),
            UnitCalcKind::DateTime => calendar_to_seconds(value),
        }
    }

    /// Convert an SI base quantity back into this unit's display form.
    pub fn from_base(&self, value: f64) -> f64 {
        match self.kind {
            UnitCalcKind::Compound | UnitCalcKind::Scale => value / self.scale,
            UnitCalcKind::Offset => value / self.scale - self.offset,
            UnitCalcKind::Inverse => self.scale / value - self.offset,
            UnitCalcKind::DateTime => seconds_to_calendar(value),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub fn dimensions_equal(a: &Dimensions, b: &Dimensions) -> bool {
    a.equal(b)
}

/* ───────────────────── calendar conversions ─────────────────────
A DateTime quantity displays as yyyymmdd.hhmmss: 20240229.134501 is
2024-02-29 13:45:01 UTC. The base representation is seconds since the
Unix epoch so date arithmetic composes with ordinary time units.
---------------------------------------------------------------- */

fn calendar_to_seconds(value: f64) -> f64 {
    let date_part = value.trunc() as i64;
    let year = (date_part / 10_000) as i32;
    let month = ((date_part / 100) % 100) as u32;
    let day = (date_part % 100) as u32;

    let time_digits = (value.fract() * 1_000_000.0).round() as u32;
    let hour = time_digits / 10_000;
    let minute = (time_digits / 100) % 100;
    let second = time_digits % 100;

    match NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
    {
        Some(dt) => dt.and_utc().timestamp() as f64,
        None => f64::NAN,
    }
}

fn seconds_to_calendar(seconds: f64) -> f64 {
    let Some(dt) = chrono::DateTime::from_timestamp(seconds as i64, 0) else {
        return f64::NAN;
    };
    let dt = dt.naive_utc();
    let date_part =
        dt.year() as f64 * 10_000.0 + dt.month() as f64 * 100.0 + dt.day() as f64;
    let time_part =
        (dt.hour() * 10_000 + dt.minute() * 100 + dt.second()) as f64 / 1_000_000.0;
    date_part + time_part
}

/* ───────────────────────── registry ───────────────────────── */

const COMPOUND_OPERATORS: &[char] = &['-', '/', '^'];

struct RegistryInner {
    /// Lowercased name -> unit.
    by_name: HashMap<String, Arc<Unit>>,
    /// First registered unit per dimension vector, used as the default
    /// display unit for those dimensions.
    by_dims: HashMap<[i64; DIM_COUNT], Arc<Unit>>,
}

/// Name -> [`Unit`] table, plus the "default unit for these dimensions"
/// index. Lookups are case-insensitive; unknown names that use the compound
/// grammar are parsed, cached, and returned.
///
/// Interior locking exists only because the process-wide registry must be
/// `Sync`; the core itself runs on one logical thread.
pub struct UnitRegistry {
    inner: RwLock<RegistryInner>,
}

impl UnitRegistry {
    /// An empty registry with no units at all.
    pub fn empty() -> Self {
        UnitRegistry {
            inner: RwLock::new(RegistryInner {
                by_name: HashMap::new(),
                by_dims: HashMap::new(),
            }),
        }
    }

    /// A registry seeded with the master set created at startup.
    pub fn with_master_set() -> Self {
        let registry = Self::empty();
        registry.register_master_set();
        registry
    }

    /// The shared process-wide registry.
    pub fn global() -> &'static UnitRegistry {
        static GLOBAL: Lazy<UnitRegistry> = Lazy::new(UnitRegistry::with_master_set);
        &GLOBAL
    }

    /// Register a unit. Compound kinds derive dims and scale from the name
    /// via the compound grammar; for every other kind the name must not
    /// contain a compound operator character.
    pub fn register(
        &self,
        name: &str,
        dims: Dimensions,
        kind: UnitCalcKind,
        scale: f64,
        offset: f64,
    ) -> Result<Arc<Unit>, CalcError> {
        let key = name.to_lowercase();
        if self.inner.read().unwrap().by_name.contains_key(&key) {
            return Err(CalcError::new(CalcErrorKind::DuplicateUnit).with_param("name", name));
        }

        let unit = if kind == UnitCalcKind::Compound {
            let (dims, scale) = self.parse_compound(name)?;
            Unit {
                name: name.to_string(),
                dims,
                kind,
                scale,
                offset: 0.0,
            }
        } else {
            if name.contains(COMPOUND_OPERATORS) {
                return Err(
                    CalcError::new(CalcErrorKind::OperatorInBaseUnitName).with_param("name", name)
                );
            }
            Unit {
                name: name.to_string(),
                dims,
                kind,
                scale,
                offset,
            }
        };

        let unit = Arc::new(unit);
        let mut inner = self.inner.write().unwrap();
        inner.by_name.insert(key, Arc::clone(&unit));
        // Compounds are looked up by name only; named units claim the
        // default slot for their dimensions, first registration wins.
        if unit.kind != UnitCalcKind::Compound {
            inner
                .by_dims
                .entry(unit.dims.key())
                .or_insert_with(|| Arc::clone(&unit));
        }
        Ok(unit)
    }

    /// Case-insensitive lookup. A miss on a name containing compound
    /// operators parses the compound grammar, caches the result, and
    /// returns it; anything else is `UnknownUnit`.
    pub fn lookup(&self, name: &str) -> Result<Arc<Unit>, CalcError> {
        let key = name.to_lowercase();
        if let Some(unit) = self.inner.read().unwrap().by_name.get(&key) {
            return Ok(Arc::clone(unit));
        }
        if name.contains(COMPOUND_OPERATORS) {
            let (dims, scale) = self.parse_compound(name)?;
            let unit = Arc::new(Unit {
                name: name.to_string(),
                dims,
                kind: UnitCalcKind::Compound,
                scale,
                offset: 0.0,
            });
            self.inner
                .write()
                .unwrap()
                .by_name
                .insert(key, Arc::clone(&unit));
            return Ok(unit);
        }
        Err(CalcError::new(CalcErrorKind::UnknownUnit).with_param("name", name))
    }

    /// The display unit to use for quantities of these dimensions, if any
    /// named unit has been registered for them.
    pub fn default_unit_for(&self, dims: &Dimensions) -> Option<Arc<Unit>> {
        self.inner
            .read()
            .unwrap()
            .by_dims
            .get(&dims.key())
            .map(Arc::clone)
    }

    /* ───────── compound grammar ─────────
    numerator-term ('-' numerator-term)* ('/' denominator-term ('-' denominator-term)*)?
    term := base ('^' exponent)?      exponent := integer or real
    "1" is permitted as a placeholder numerator ("1/s").
    */
    fn parse_compound(&self, name: &str) -> Result<(Dimensions, f64), CalcError> {
        let mut halves = name.splitn(2, '/');
        let numerator = halves.next().unwrap_or("");
        let denominator = halves.next();

        let mut dims = Dimensions::none();
        let mut scale = 1.0;
        self.accumulate_terms(name, numerator, 1.0, &mut dims, &mut scale)?;
        if let Some(denominator) = denominator {
            self.accumulate_terms(name, denominator, -1.0, &mut dims, &mut scale)?;
        }
        Ok((dims, scale))
    }

    fn accumulate_terms(
        &self,
        compound: &str,
        terms: &str,
        sign: f64,
        dims: &mut Dimensions,
        scale: &mut f64,
    ) -> Result<(), CalcError> {
        for term in terms.split('-') {
            let term = term.trim();
            if term == "1" {
                continue;
            }
            let (base_name, exponent) = match term.split_once('^') {
                Some((base, exp)) => {
                    let exponent: f64 = exp.trim().parse().map_err(|_| {
                        CalcError::new(CalcErrorKind::UnknownUnit).with_param("name", compound)
                    })?;
                    (base.trim(), exponent)
                }
                None => (term, 1.0),
            };
            let base = self
                .inner
                .read()
                .unwrap()
                .by_name
                .get(&base_name.to_lowercase())
                .map(Arc::clone)
                .ok_or_else(|| {
                    CalcError::new(CalcErrorKind::UnknownUnit).with_param("name", compound)
                })?;
            *dims = dims.add(&base.dims.scaled(exponent * sign));
            *scale *= base.scale.powf(exponent * sign);
        }
        Ok(())
    }

    fn register_master_set(&self) {
        use UnitCalcKind::*;
        use dim::*;

        let scale = |r: &Self, name: &str, dims: Dimensions, factor: f64| {
            r.register(name, dims, Scale, factor, 0.0)
                .expect("master set registers once");
        };
        let base = |r: &Self, name: &str, index: usize| {
            scale(r, name, Dimensions::single(index, 1.0), 1.0);
        };

        // SI bases first so they claim the default-unit slots.
        base(self, "m", LENGTH);
        base(self, "kg", MASS);
        base(self, "s", TIME);
        base(self, "a", CURRENT);
        base(self, "k", TEMPERATURE);
        base(self, "mol", AMOUNT);
        base(self, "cd", LUMINOUS);

        scale(self, "fraction", Dimensions::none(), 1.0);
        scale(self, "%", Dimensions::none(), 0.01);

        let length = Dimensions::single(LENGTH, 1.0);
        scale(self, "km", length, 1000.0);
        scale(self, "cm", length, 0.01);
        scale(self, "mm", length, 0.001);
        scale(self, "micron", length, 1.0e-6);
        scale(self, "ft", length, 0.3048);
        scale(self, "in", length, 0.0254);
        scale(self, "yd", length, 0.9144);
        scale(self, "mi", length, 1609.344);

        let mass = Dimensions::single(MASS, 1.0);
        scale(self, "g", mass, 1.0e-3);
        scale(self, "mg", mass, 1.0e-6);
        scale(self, "lb", mass, 0.453_592_37);
        scale(self, "tonne", mass, 1000.0);

        let time = Dimensions::single(TIME, 1.0);
        scale(self, "min", time, 60.0);
        scale(self, "h", time, 3600.0);
        scale(self, "day", time, 86_400.0);
        scale(self, "week", time, 604_800.0);
        scale(self, "year", time, 31_556_952.0);

        self.register("degc", Dimensions::single(TEMPERATURE, 1.0), Offset, 1.0, 273.15)
            .expect("master set registers once");
        self.register(
            "degf",
            Dimensions::single(TEMPERATURE, 1.0),
            Offset,
            5.0 / 9.0,
            459.67,
        )
        .expect("master set registers once");

        // Named derived units.
        let force = Dimensions([1.0, 1.0, -2.0, 0.0, 0.0, 0.0, 0.0]);
        scale(self, "n", force, 1.0);
        scale(self, "lbf", force, 4.448_221_615_260_5);
        scale(self, "j", Dimensions([2.0, 1.0, -2.0, 0.0, 0.0, 0.0, 0.0]), 1.0);
        scale(self, "w", Dimensions([2.0, 1.0, -3.0, 0.0, 0.0, 0.0, 0.0]), 1.0);
        scale(self, "pa", Dimensions([-1.0, 1.0, -2.0, 0.0, 0.0, 0.0, 0.0]), 1.0);
        scale(self, "hz", Dimensions::single(TIME, -1.0), 1.0);
        scale(self, "liter", Dimensions::single(LENGTH, 3.0), 1.0e-3);
        scale(self, "mph", Dimensions([1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0]), 0.447_04);

        self.register("date", Dimensions::single(TIME, 1.0), DateTime, 1.0, 0.0)
            .expect("master set registers once");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = UnitRegistry::with_master_set();
        let a = reg.lookup("FT").unwrap();
        let b = reg.lookup("ft").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!((a.scale - 0.3048).abs() < 1e-12);
    }

    #[test]
    fn unknown_name_errors() {
        let reg = UnitRegistry::with_master_set();
        let err = reg.lookup("furlongish").unwrap_err();
        assert_eq!(err.kind, CalcErrorKind::UnknownUnit);
        assert_eq!(err.param("name"), Some("furlongish"));
    }

    #[test]
    fn duplicate_registration_errors() {
        let reg = UnitRegistry::with_master_set();
        let err = reg
            .register("ft", Dimensions::single(dim::LENGTH, 1.0), UnitCalcKind::Scale, 1.0, 0.0)
            .unwrap_err();
        assert_eq!(err.kind, CalcErrorKind::DuplicateUnit);
    }

    #[test]
    fn operator_in_base_name_rejected() {
        let reg = UnitRegistry::empty();
        let err = reg
            .register("m/s", Dimensions::none(), UnitCalcKind::Scale, 1.0, 0.0)
            .unwrap_err();
        assert_eq!(err.kind, CalcErrorKind::OperatorInBaseUnitName);
    }

    #[test]
    fn compound_scale_is_product_of_term_scales() {
        let reg = UnitRegistry::with_master_set();
        let kmh = reg.lookup("km/h").unwrap();
        assert!((kmh.scale - 1000.0 / 3600.0).abs() < 1e-12);
        assert!(kmh.dims.equal(&Dimensions([1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0])));

        let accel = reg.lookup("m/s^2").unwrap();
        assert!(accel.dims.equal(&Dimensions([1.0, 0.0, -2.0, 0.0, 0.0, 0.0, 0.0])));

        let torque = reg.lookup("n-m").unwrap();
        assert!(torque.dims.equal(&Dimensions([2.0, 1.0, -2.0, 0.0, 0.0, 0.0, 0.0])));

        let per_second = reg.lookup("1/s").unwrap();
        assert!(per_second.dims.equal(&Dimensions::single(dim::TIME, -1.0)));
    }

    #[test]
    fn compound_units_are_cached_not_redefaulted() {
        let reg = UnitRegistry::with_master_set();
        let first = reg.lookup("km/h").unwrap();
        let second = reg.lookup("KM/H").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        // The default for velocity dims stays the named unit, not the compound.
        let default = reg.default_unit_for(&first.dims).unwrap();
        assert_eq!(default.name, "mph");
    }

    #[test]
    fn offset_round_trip() {
        let reg = UnitRegistry::with_master_set();
        let degc = reg.lookup("degC").unwrap();
        let base = degc.to_base(100.0);
        assert!((base - 373.15).abs() < 1e-9);
        assert!((degc.from_base(base) - 100.0).abs() < 1e-9);

        let degf = reg.lookup("degF").unwrap();
        assert!((degf.to_base(32.0) - 273.15).abs() < 1e-9);
        assert!((degf.from_base(degf.to_base(-40.0)) + 40.0).abs() < 1e-9);
    }

    #[test]
    fn inverse_round_trip() {
        let reg = UnitRegistry::empty();
        let inv = reg
            .register("rate", Dimensions::single(dim::TIME, -1.0), UnitCalcKind::Inverse, 10.0, 0.0)
            .unwrap();
        let base = inv.to_base(4.0);
        assert!((base - 2.5).abs() < 1e-12);
        assert!((inv.from_base(base) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn datetime_maps_calendar_to_epoch_seconds() {
        let reg = UnitRegistry::with_master_set();
        let date = reg.lookup("date").unwrap();
        // 1970-01-01 00:00:00 is epoch zero.
        assert_eq!(date.to_base(19700101.0), 0.0);
        // One day later.
        assert_eq!(date.to_base(19700102.0), 86_400.0);
        // Round trip with a time-of-day component.
        let v = 20240229.134501;
        let secs = date.to_base(v);
        assert!((date.from_base(secs) - v).abs() < 1e-6);
        // Invalid calendar values degrade to NaN.
        assert!(date.to_base(20230230.0).is_nan());
    }

    #[test]
    fn default_unit_prefers_first_registration() {
        let reg = UnitRegistry::with_master_set();
        let meters = reg.lookup("m").unwrap();
        let default = reg.default_unit_for(&meters.dims).unwrap();
        assert_eq!(default.name, "m");
    }
}
