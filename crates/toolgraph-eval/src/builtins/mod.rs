pub mod math;
pub mod structural;
pub mod text;
mod utils;

use std::sync::Once;

/// Load the fixed catalog exactly once per process.
pub fn ensure_loaded() {
    static LOAD: Once = Once::new();
    LOAD.call_once(|| {
        math::register_builtins();
        structural::register_builtins();
        text::register_builtins();
    });
}
