//! Process-wide string interning for constant terms.
//!
//! SPEC_FULL.md §3 calls for constants to be "interned read-only cells (one
//! per (type, value) pair)". For the numeric and boolean variants of
//! [`super::TedValue`] a plain value clone already satisfies that (they are
//! `Copy`-cheap), so the only variant that benefits from an explicit
//! interning table is `Str`: this module hands out the same `Arc<str>` for
//! repeated constants of the same text, the way the teacher's constant
//! tables are process-wide and explicit-teardown-optional.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

fn table() -> &'static Mutex<HashMap<Box<str>, Arc<str>>> {
    static TABLE: OnceLock<Mutex<HashMap<Box<str>, Arc<str>>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Return the interned `Arc<str>` for `s`, allocating a new entry on first
/// use. Subsequent calls with an equal string return a clone of the same
/// `Arc`.
pub fn intern_string(s: &str) -> Arc<str> {
    let mut table = table().lock().expect("string intern table poisoned");
    if let Some(existing) = table.get(s) {
        return Arc::clone(existing);
    }
    let arc: Arc<str> = Arc::from(s);
    table.insert(Box::from(s), Arc::clone(&arc));
    arc
}

/// Remove every interned string. Exposed for tests that want a clean slate;
/// production code never needs to call this (teardown is optional).
#[cfg(test)]
pub fn clear_interned() {
    table().lock().expect("string intern table poisoned").clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_strings_share_allocation() {
        clear_interned();
        let a = intern_string("hello");
        let b = intern_string("hello");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_strings_do_not_share() {
        clear_interned();
        let a = intern_string("alpha");
        let b = intern_string("beta");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
