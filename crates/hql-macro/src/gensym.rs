//! Process-wide gensym counter for macro hygiene (spec.md §4.4).

use std::cell::Cell;

thread_local! {
    static COUNTER: Cell<u64> = const { Cell::new(0) };
}

/// A fresh name guaranteed distinct from any previous gensym in this
/// process, of the form `<base>_<unique>`.
pub fn gensym(base: &str) -> String {
    COUNTER.with(|c| {
        let n = c.get();
        c.set(n + 1);
        format!("{base}_{n}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gensym_produces_distinct_names() {
        let a = gensym("p");
        let b = gensym("p");
        assert_ne!(a, b);
        assert!(a.starts_with("p_"));
    }
}
