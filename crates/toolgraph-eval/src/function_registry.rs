//! Case-insensitive registry of the fixed function catalog.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::function::Function;

static REG: Lazy<DashMap<&'static str, Arc<dyn Function>>> = Lazy::new(DashMap::new);

pub fn register_function(f: Arc<dyn Function>) {
    debug_assert!(
        f.name().chars().all(|c| !c.is_ascii_uppercase()),
        "catalog names are canonical lowercase"
    );
    REG.insert(f.name(), f);
}

/// Case-insensitive lookup.
pub fn get(name: &str) -> Option<Arc<dyn Function>> {
    crate::builtins::ensure_loaded();
    REG.get(name.to_lowercase().as_str())
        .map(|entry| Arc::clone(entry.value()))
}

/// The compile-time resolver handed to the parser: known names map to
/// their minimum arity.
pub fn min_args(name: &str) -> Option<usize> {
    get(name).map(|f| f.min_args())
}
