//! Derived views over measurement history.

pub mod diagnostics;
