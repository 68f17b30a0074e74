// src/id.rs

//! Identifier bounds for stages and tasks.

use std::fmt;
use std::hash::Hash;

/// Bounds a stage/task identifier must satisfy.
///
/// Identifiers are the caller's business: the scheduler only clones them,
/// hashes them into its registry, compares them for equality, and prints
/// them in log lines and error reports (the `Display` impl is the log
/// projection). `&'static str`, `String`, integers and small enums all
/// qualify out of the box; the blanket impl opts in any type meeting the
/// bounds.
pub trait StageId: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + 'static {}

impl<T> StageId for T where T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + 'static {}
