//! Condition and update-value expressions.
//!
//! Expressions are parsed once, when a [`Condition`] or [`ValueTemplate`] is
//! built, so malformed input fails before any store call. Store adapters
//! either render the tree into their own syntax or evaluate it directly.

pub mod ast;
mod parser;

pub use ast::{
    ArithmeticOp, AttributePath, CompareOp, ConditionExpr, FunctionName, LogicalOp, Operand,
    ValueExpr,
};
pub use parser::{parse_assignments, parse_condition, parse_value, ExpressionError};

use crate::attribute::AttributeValue;

/// A parsed boolean expression with its positional arguments bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    expression: String,
    tree: ConditionExpr,
    args: Vec<AttributeValue>,
}

impl Condition {
    /// Parses `expression` and binds `args` to its `?` and `$` placeholders in order.
    pub fn new(
        expression: impl Into<String>,
        args: Vec<AttributeValue>,
    ) -> Result<Self, ExpressionError> {
        let expression = expression.into();
        let tree = parse_condition(&expression, &args)?;
        Ok(Self {
            expression,
            tree,
            args,
        })
    }

    /// `attribute_not_exists(attr) OR attr = version`.
    pub fn version_matches(attribute: &str, version: u64) -> Self {
        let path = AttributePath::parse(attribute);
        Self {
            expression: format!("attribute_not_exists({attribute}) OR {attribute} = ?"),
            tree: ConditionExpr::Logical {
                op: LogicalOp::Or,
                left: Box::new(ConditionExpr::Function {
                    name: FunctionName::AttributeNotExists,
                    args: vec![Operand::Path(path.clone())],
                }),
                right: Box::new(ConditionExpr::Compare {
                    left: Operand::Path(path),
                    op: CompareOp::Eq,
                    right: Operand::Value(0),
                }),
            },
            args: vec![AttributeValue::from(version)],
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn tree(&self) -> &ConditionExpr {
        &self.tree
    }

    pub fn args(&self) -> &[AttributeValue] {
        &self.args
    }
}

/// A parsed `SET` right-hand side with its positional arguments bound.
///
/// Arguments consumed by `$` name placeholders stay in the list, so value
/// positions are the same as in the source expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTemplate {
    tree: ValueExpr,
    args: Vec<AttributeValue>,
}

impl ValueTemplate {
    pub fn new(template: &str, args: Vec<AttributeValue>) -> Result<Self, ExpressionError> {
        let tree = parse_value(template, &args)?;
        Ok(Self { tree, args })
    }

    /// Parses `path = template`, or several such assignments separated by
    /// commas, returning each target path with its bound template.
    pub fn assignments(
        expression: &str,
        args: Vec<AttributeValue>,
    ) -> Result<Vec<(AttributePath, Self)>, ExpressionError> {
        let assignments = parse_assignments(expression, &args)?;
        Ok(assignments
            .into_iter()
            .map(|(path, tree)| {
                let template = Self {
                    tree,
                    args: args.clone(),
                };
                (path, template)
            })
            .collect())
    }

    pub fn tree(&self) -> &ValueExpr {
        &self.tree
    }

    pub fn args(&self) -> &[AttributeValue] {
        &self.args
    }
}
