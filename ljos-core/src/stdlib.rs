//! `std:` import specifiers.
//!
//! A `std:<name>` specifier names one of the fixed runtime modules in
//! [`crate::builtins::STD_MODULES`]. Generated JavaScript imports them from
//! `<runtime_dir>/std/<name>.js`.

pub const STD_PREFIX: &str = "std:";

/// The module name of a `std:` specifier, if it is one.
pub fn std_module_name(specifier: &str) -> Option<&str> {
    specifier.strip_prefix(STD_PREFIX)
}

/// Import path of a std module in generated JavaScript.
pub fn std_module_path(runtime_dir: &str, name: &str) -> String {
    let dir = runtime_dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("std/{name}.js")
    } else {
        format!("{dir}/std/{name}.js")
    }
}
