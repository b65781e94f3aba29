//! Layer naming utilities.
//!
//! Layers that are not given an explicit name derive one from their type name,
//! made unique across the process.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

static NAME_COUNTS: Lazy<Mutex<HashMap<String, usize>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Returns a unique name derived from `base`.
///
/// The first request for a base returns it unchanged; later requests append
/// an increasing index (`base_1`, `base_2`, ...).
///
/// # Examples
///
/// ```
/// use densefeat_core::naming::unique_name;
///
/// assert_eq!(unique_name("doc_example_layer"), "doc_example_layer");
/// assert_eq!(unique_name("doc_example_layer"), "doc_example_layer_1");
/// ```
pub fn unique_name(base: &str) -> String {
    let mut counts = NAME_COUNTS.lock();
    match counts.get_mut(base) {
        Some(count) => {
            *count += 1;
            format!("{}_{}", base, count)
        }
        None => {
            counts.insert(base.to_string(), 0);
            base.to_string()
        }
    }
}

/// Converts a CamelCase type name to snake_case.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
