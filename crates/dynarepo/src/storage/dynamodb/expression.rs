//! Renders parsed expressions into DynamoDB expression strings.
//!
//! Every attribute name becomes a `#nN` placeholder and every value a `:vN`
//! placeholder, so reserved words and arbitrary names are always safe.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue as SdkValue;
use dynarepo_core::expression::{AttributePath, ConditionExpr, Operand, ValueExpr};
use dynarepo_core::key::RangeOperator;
use dynarepo_core::storage::{KeyCondition, UpdateDirective};
use dynarepo_core::{AttributeValue, Condition};

use super::conversions::to_sdk;

/// Collects name and value placeholders while rendering expressions for one request.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    names: HashMap<String, String>,
    placeholders: HashMap<String, String>,
    values: HashMap<String, SdkValue>,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder for one attribute name. The same name reuses its placeholder.
    fn name(&mut self, name: &str) -> String {
        if let Some(placeholder) = self.placeholders.get(name) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), name.to_string());
        self.placeholders
            .insert(name.to_string(), placeholder.clone());
        placeholder
    }

    fn path(&mut self, path: &AttributePath) -> String {
        path.segments()
            .iter()
            .map(|segment| self.name(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), to_sdk(value));
        placeholder
    }

    fn operand(&mut self, operand: &Operand, args: &[AttributeValue]) -> String {
        match operand {
            Operand::Path(path) => self.path(path),
            Operand::Value(index) => {
                let value = args.get(*index).cloned().unwrap_or(AttributeValue::Null);
                self.value(&value)
            }
        }
    }

    /// Render a condition or filter expression.
    pub fn condition(&mut self, condition: &Condition) -> String {
        self.condition_expr(condition.tree(), condition.args())
    }

    fn condition_expr(&mut self, expr: &ConditionExpr, args: &[AttributeValue]) -> String {
        match expr {
            ConditionExpr::Compare { left, op, right } => {
                let left = self.operand(left, args);
                let right = self.operand(right, args);
                format!("{left} {op} {right}")
            }
            ConditionExpr::Between { value, low, high } => {
                let value = self.operand(value, args);
                let low = self.operand(low, args);
                let high = self.operand(high, args);
                format!("{value} BETWEEN {low} AND {high}")
            }
            ConditionExpr::In { value, list } => {
                let value = self.operand(value, args);
                let list = list
                    .iter()
                    .map(|operand| self.operand(operand, args))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{value} IN ({list})")
            }
            ConditionExpr::Logical { op, left, right } => {
                let left = self.condition_expr(left, args);
                let right = self.condition_expr(right, args);
                format!("({left}) {op} ({right})")
            }
            ConditionExpr::Not(inner) => {
                let inner = self.condition_expr(inner, args);
                format!("NOT ({inner})")
            }
            ConditionExpr::Function {
                name,
                args: operands,
            } => {
                let operands = operands
                    .iter()
                    .map(|operand| self.operand(operand, args))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{name}({operands})")
            }
        }
    }

    /// Render a key condition: hash-key equality plus the optional range comparison.
    pub fn key_condition(&mut self, condition: &KeyCondition) -> String {
        let hash_name = self.name(&condition.hash_key_name);
        let hash_value = self.value(&condition.hash_key);
        let hash = format!("{hash_name} = {hash_value}");

        let Some(range) = &condition.range else {
            return hash;
        };
        let name = self.name(&range.name);
        let values: Vec<String> = range.values.iter().map(|v| self.value(v)).collect();
        let first = values.first().cloned().unwrap_or_default();
        let range = match range.op {
            RangeOperator::Equal => format!("{name} = {first}"),
            RangeOperator::NotEqual => format!("{name} <> {first}"),
            RangeOperator::LessThan => format!("{name} < {first}"),
            RangeOperator::LessOrEqual => format!("{name} <= {first}"),
            RangeOperator::GreaterThan => format!("{name} > {first}"),
            RangeOperator::GreaterOrEqual => format!("{name} >= {first}"),
            RangeOperator::BeginsWith => format!("begins_with({name}, {first})"),
            RangeOperator::Between => {
                let second = values.get(1).cloned().unwrap_or_default();
                format!("{name} BETWEEN {first} AND {second}")
            }
        };
        format!("{hash} AND {range}")
    }

    /// Render update directives as `SET ... ADD ... REMOVE ...` clauses.
    pub fn update(&mut self, directives: &[UpdateDirective]) -> String {
        let mut set = Vec::new();
        let mut add = Vec::new();
        let mut remove = Vec::new();
        for directive in directives {
            match directive {
                UpdateDirective::Set { path, value } | UpdateDirective::SetSet { path, value } => {
                    let path = self.path(path);
                    let value = self.value(value);
                    set.push(format!("{path} = {value}"));
                }
                UpdateDirective::SetIfNotExists { path, value } => {
                    let path = self.path(path);
                    let value = self.value(value);
                    set.push(format!("{path} = if_not_exists({path}, {value})"));
                }
                UpdateDirective::SetExpr { path, template } => {
                    let path = self.path(path);
                    let value = self.value_expr(template.tree(), template.args());
                    set.push(format!("{path} = {value}"));
                }
                UpdateDirective::Add { path, value } => {
                    let path = self.path(path);
                    let value = self.value(value);
                    add.push(format!("{path} {value}"));
                }
                UpdateDirective::Remove { path } => remove.push(self.path(path)),
            }
        }

        let mut clauses = Vec::new();
        if !set.is_empty() {
            clauses.push(format!("SET {}", set.join(", ")));
        }
        if !add.is_empty() {
            clauses.push(format!("ADD {}", add.join(", ")));
        }
        if !remove.is_empty() {
            clauses.push(format!("REMOVE {}", remove.join(", ")));
        }
        clauses.join(" ")
    }

    fn value_expr(&mut self, expr: &ValueExpr, args: &[AttributeValue]) -> String {
        match expr {
            ValueExpr::Operand(operand) => self.operand(operand, args),
            ValueExpr::IfNotExists { path, default } => {
                let path = self.path(path);
                let default = self.value_expr(default, args);
                format!("if_not_exists({path}, {default})")
            }
            ValueExpr::ListAppend(left, right) => {
                let left = self.value_expr(left, args);
                let right = self.value_expr(right, args);
                format!("list_append({left}, {right})")
            }
            ValueExpr::Arithmetic { op, left, right } => {
                let left = self.value_expr(left, args);
                let right = self.value_expr(right, args);
                format!("{left} {op} {right}")
            }
        }
    }

    /// `ExpressionAttributeNames`, or `None` when no names were used.
    pub fn names(&self) -> Option<HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone())
    }

    /// `ExpressionAttributeValues`, or `None` when no values were used.
    pub fn values(&self) -> Option<HashMap<String, SdkValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}
