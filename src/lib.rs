//! Recursive Prompting: a templated prompt-recursion harness.
//!
//! Picks prompt templates by recursion depth, fills their placeholders
//! with text pulled from earlier responses, accumulates residue tags and
//! a fixed set of coherence metrics, and gates movement through five
//! ordered stages on threshold checks.

pub mod core;
pub mod schema;
