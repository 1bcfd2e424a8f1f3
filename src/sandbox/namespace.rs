//! The fixed capability map handed to user programs.
//!
//! Each name resolves to a [`Facility`] registered by the engine's builtins.
//! Anything not listed here is a `ReferenceError` inside the sandbox.

use crate::script::builtins::facility;
use crate::script::Interpreter;

pub const ALLOW_LIST: &[&str] = &[
    "console",
    "setTimeout",
    "setInterval",
    "clearTimeout",
    "clearInterval",
    "Math",
    "Date",
    "Array",
    "Object",
    "String",
    "Number",
    "Boolean",
    "RegExp",
    "JSON",
    "Promise",
    "Map",
    "Set",
    "Reflect",
    "Error",
    "TypeError",
    "RangeError",
    "SyntaxError",
    "ReferenceError",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
];

/// Allowed names, sorted.
pub fn allow_list() -> Vec<&'static str> {
    let mut names = ALLOW_LIST.to_vec();
    names.sort_unstable();
    names
}

/// Exposes every allowed facility to `interp`.
pub fn install(interp: &mut Interpreter) {
    for name in ALLOW_LIST {
        match facility(name) {
            Some(f) => {
                let value = (f.install)(interp);
                interp.expose(name, value);
            }
            None => tracing::warn!(name, "no facility registered for allowed name"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::builtins::facilities;
    use crate::script::ExecutionLimits;

    #[test]
    fn every_allowed_name_has_a_facility() {
        for name in ALLOW_LIST {
            assert!(facility(name).is_some(), "missing facility {}", name);
        }
    }

    #[test]
    fn allow_list_is_sorted_and_unique() {
        let names = allow_list();
        assert_eq!(names.len(), ALLOW_LIST.len());
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(names[0], "Array");
    }

    #[test]
    fn install_exposes_exactly_the_allow_list() {
        let mut interp = Interpreter::new(ExecutionLimits::default());
        install(&mut interp);
        let mut exposed: Vec<&str> = interp.exposed().collect();
        exposed.sort_unstable();
        assert_eq!(exposed, allow_list());
    }

    #[test]
    fn registry_has_nothing_outside_the_allow_list() {
        for f in facilities() {
            assert!(ALLOW_LIST.contains(&f.name), "unexpected facility {}", f.name);
        }
    }
}
