//! Typed update vocabulary and its compiler into store update directives.

mod compiler;
mod expressions;

pub use compiler::compile;
pub use expressions::{UpdateAction, UpdateExpressions, UpdateKind};
