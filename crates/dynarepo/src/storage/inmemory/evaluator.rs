//! Evaluation of parsed expressions against stored items.
//!
//! Conditions read the item as it is before the write. Update directives
//! compute every right-hand side from that same snapshot, then apply the
//! results in order.

use std::cmp::Ordering;

use dynarepo_core::expression::{
    ArithmeticOp, AttributePath, CompareOp, ConditionExpr, FunctionName, LogicalOp, Operand,
    ValueExpr,
};
use dynarepo_core::key::RangeOperator;
use dynarepo_core::storage::{KeyCondition, StoreError, StoreResult, UpdateDirective};
use dynarepo_core::{AttributeMap, AttributeValue, Condition};

/// Look up a possibly nested attribute.
pub fn get_path<'a>(item: &'a AttributeMap, path: &AttributePath) -> Option<&'a AttributeValue> {
    let (first, rest) = path.segments().split_first()?;
    let mut current = item.get(first)?;
    for segment in rest {
        current = current.as_m()?.get(segment)?;
    }
    Some(current)
}

fn set_path(
    item: &mut AttributeMap,
    path: &AttributePath,
    value: AttributeValue,
) -> StoreResult<()> {
    let Some((last, parents)) = path.segments().split_last() else {
        return Err(invalid_path(path));
    };
    let mut current = item;
    for segment in parents {
        current = match current.get_mut(segment) {
            Some(AttributeValue::M(map)) => map,
            _ => return Err(invalid_path(path)),
        };
    }
    current.insert(last.clone(), value);
    Ok(())
}

/// Removing a missing attribute, or one under a missing parent, is a no-op.
fn remove_path(item: &mut AttributeMap, path: &AttributePath) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };
    let mut current = item;
    for segment in parents {
        current = match current.get_mut(segment) {
            Some(AttributeValue::M(map)) => map,
            _ => return,
        };
    }
    current.remove(last);
}

fn invalid_path(path: &AttributePath) -> StoreError {
    StoreError::Validation(format!(
        "The document path provided in the update expression is invalid for update: {path}"
    ))
}

fn operand<'a>(
    item: &'a AttributeMap,
    operand: &Operand,
    args: &'a [AttributeValue],
) -> Option<&'a AttributeValue> {
    match operand {
        Operand::Path(path) => get_path(item, path),
        Operand::Value(index) => args.get(*index),
    }
}

/// Evaluate a condition or filter. A missing condition always holds.
pub fn matches(item: &AttributeMap, condition: Option<&Condition>) -> bool {
    condition.map_or(true, |c| evaluate(item, c.tree(), c.args()))
}

fn evaluate(item: &AttributeMap, expr: &ConditionExpr, args: &[AttributeValue]) -> bool {
    match expr {
        ConditionExpr::Compare { left, op, right } => {
            let left = operand(item, left, args);
            let right = operand(item, right, args);
            match (left, right) {
                (Some(left), Some(right)) => compare(left, *op, right),
                _ => *op == CompareOp::Ne,
            }
        }
        ConditionExpr::Between { value, low, high } => {
            match (
                operand(item, value, args),
                operand(item, low, args),
                operand(item, high, args),
            ) {
                (Some(value), Some(low), Some(high)) => between(value, low, high),
                _ => false,
            }
        }
        ConditionExpr::In { value, list } => operand(item, value, args).is_some_and(|value| {
            list.iter()
                .filter_map(|candidate| operand(item, candidate, args))
                .any(|candidate| value.store_eq(candidate))
        }),
        ConditionExpr::Logical { op, left, right } => match op {
            LogicalOp::And => evaluate(item, left, args) && evaluate(item, right, args),
            LogicalOp::Or => evaluate(item, left, args) || evaluate(item, right, args),
        },
        ConditionExpr::Not(inner) => !evaluate(item, inner, args),
        ConditionExpr::Function {
            name,
            args: operands,
        } => {
            let first = operands.first().and_then(|o| operand(item, o, args));
            let second = operands.get(1).and_then(|o| operand(item, o, args));
            match name {
                FunctionName::AttributeExists => first.is_some(),
                FunctionName::AttributeNotExists => first.is_none(),
                FunctionName::BeginsWith => match (first, second) {
                    (Some(value), Some(prefix)) => begins_with(value, prefix),
                    _ => false,
                },
                FunctionName::Contains => match (first, second) {
                    (Some(value), Some(needle)) => contains(value, needle),
                    _ => false,
                },
            }
        }
    }
}

fn compare(left: &AttributeValue, op: CompareOp, right: &AttributeValue) -> bool {
    match op {
        CompareOp::Eq => left.store_eq(right),
        CompareOp::Ne => !left.store_eq(right),
        CompareOp::Lt => left.compare(right) == Some(Ordering::Less),
        CompareOp::Le => matches!(left.compare(right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => left.compare(right) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            left.compare(right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

fn between(value: &AttributeValue, low: &AttributeValue, high: &AttributeValue) -> bool {
    compare(value, CompareOp::Ge, low) && compare(value, CompareOp::Le, high)
}

fn begins_with(value: &AttributeValue, prefix: &AttributeValue) -> bool {
    match (value, prefix) {
        (AttributeValue::S(value), AttributeValue::S(prefix)) => value.starts_with(prefix.as_str()),
        (AttributeValue::B(value), AttributeValue::B(prefix)) => value.starts_with(prefix),
        _ => false,
    }
}

fn contains(value: &AttributeValue, needle: &AttributeValue) -> bool {
    match (value, needle) {
        (AttributeValue::S(value), AttributeValue::S(needle)) => value.contains(needle.as_str()),
        (AttributeValue::Ss(set), AttributeValue::S(needle)) => set.contains(needle),
        (AttributeValue::Ns(set), AttributeValue::N(_)) => set
            .iter()
            .any(|n| AttributeValue::N(n.clone()).store_eq(needle)),
        (AttributeValue::Bs(set), AttributeValue::B(needle)) => set.contains(needle),
        (AttributeValue::L(list), needle) => list.iter().any(|v| v.store_eq(needle)),
        _ => false,
    }
}

/// Whether an item satisfies a query's key condition.
pub fn matches_key(item: &AttributeMap, condition: &KeyCondition) -> bool {
    let hash_matches = item
        .get(&condition.hash_key_name)
        .is_some_and(|value| value.store_eq(&condition.hash_key));
    if !hash_matches {
        return false;
    }
    let Some(range) = &condition.range else {
        return true;
    };
    let Some(value) = item.get(&range.name) else {
        return false;
    };
    let Some(first) = range.values.first() else {
        return false;
    };
    match range.op {
        RangeOperator::Equal => compare(value, CompareOp::Eq, first),
        RangeOperator::NotEqual => compare(value, CompareOp::Ne, first),
        RangeOperator::LessThan => compare(value, CompareOp::Lt, first),
        RangeOperator::LessOrEqual => compare(value, CompareOp::Le, first),
        RangeOperator::GreaterThan => compare(value, CompareOp::Gt, first),
        RangeOperator::GreaterOrEqual => compare(value, CompareOp::Ge, first),
        RangeOperator::BeginsWith => begins_with(value, first),
        RangeOperator::Between => range
            .values
            .get(1)
            .is_some_and(|high| between(value, first, high)),
    }
}

/// Apply update directives to an item.
pub fn apply_updates(item: &mut AttributeMap, directives: &[UpdateDirective]) -> StoreResult<()> {
    let snapshot = item.clone();
    let mut changes = Vec::with_capacity(directives.len());
    for directive in directives {
        let current = get_path(&snapshot, directive.path());
        let value = match directive {
            UpdateDirective::Set { value, .. } | UpdateDirective::SetSet { value, .. } => {
                Some(value.clone())
            }
            UpdateDirective::SetIfNotExists { value, .. } => match current {
                Some(_) => continue,
                None => Some(value.clone()),
            },
            UpdateDirective::SetExpr { template, .. } => {
                Some(value_of(&snapshot, template.tree(), template.args())?)
            }
            UpdateDirective::Add { value, .. } => Some(match current {
                Some(current) => add(current, value)?,
                None => value.clone(),
            }),
            UpdateDirective::Remove { .. } => None,
        };
        changes.push((directive.path(), value));
    }
    for (path, value) in changes {
        match value {
            Some(value) => set_path(item, path, value)?,
            None => remove_path(item, path),
        }
    }
    Ok(())
}

fn value_of(
    item: &AttributeMap,
    expr: &ValueExpr,
    args: &[AttributeValue],
) -> StoreResult<AttributeValue> {
    match expr {
        ValueExpr::Operand(o) => operand(item, o, args).cloned().ok_or_else(|| {
            StoreError::Validation(
                "The provided expression refers to an attribute that does not exist in the item"
                    .to_string(),
            )
        }),
        ValueExpr::IfNotExists { path, default } => match get_path(item, path) {
            Some(value) => Ok(value.clone()),
            None => value_of(item, default, args),
        },
        ValueExpr::ListAppend(left, right) => {
            match (value_of(item, left, args)?, value_of(item, right, args)?) {
                (AttributeValue::L(mut left), AttributeValue::L(right)) => {
                    left.extend(right);
                    Ok(AttributeValue::L(left))
                }
                (left, right) => Err(type_mismatch("list_append", &left, &right)),
            }
        }
        ValueExpr::Arithmetic { op, left, right } => {
            let left = value_of(item, left, args)?;
            let right = value_of(item, right, args)?;
            match (&left, &right) {
                (AttributeValue::N(a), AttributeValue::N(b)) => match arithmetic(a, *op, b) {
                    Some(n) => Ok(AttributeValue::N(n)),
                    None => Err(type_mismatch("arithmetic", &left, &right)),
                },
                _ => Err(type_mismatch("arithmetic", &left, &right)),
            }
        }
    }
}

fn add(current: &AttributeValue, value: &AttributeValue) -> StoreResult<AttributeValue> {
    match (current, value) {
        (AttributeValue::N(a), AttributeValue::N(b)) => arithmetic(a, ArithmeticOp::Add, b)
            .map(AttributeValue::N)
            .ok_or_else(|| type_mismatch("ADD", current, value)),
        (AttributeValue::Ss(a), AttributeValue::Ss(b)) => Ok(AttributeValue::Ss(union(a, b))),
        (AttributeValue::Ns(a), AttributeValue::Ns(b)) => Ok(AttributeValue::Ns(union(a, b))),
        (AttributeValue::Bs(a), AttributeValue::Bs(b)) => Ok(AttributeValue::Bs(union(a, b))),
        _ => Err(type_mismatch("ADD", current, value)),
    }
}

fn union<T: Clone + PartialEq>(a: &[T], b: &[T]) -> Vec<T> {
    let mut merged = a.to_vec();
    for value in b {
        if !merged.contains(value) {
            merged.push(value.clone());
        }
    }
    merged
}

/// Integer arithmetic when both sides are integers, floating point otherwise.
fn arithmetic(a: &str, op: ArithmeticOp, b: &str) -> Option<String> {
    if let (Ok(a), Ok(b)) = (a.parse::<i128>(), b.parse::<i128>()) {
        let result = match op {
            ArithmeticOp::Add => a.checked_add(b)?,
            ArithmeticOp::Subtract => a.checked_sub(b)?,
        };
        return Some(result.to_string());
    }
    let a: f64 = a.parse().ok()?;
    let b: f64 = b.parse().ok()?;
    let result = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
    };
    Some(result.to_string())
}

fn type_mismatch(operation: &str, left: &AttributeValue, right: &AttributeValue) -> StoreError {
    StoreError::Validation(format!(
        "An operand in the update expression has an incorrect data type: {operation} on {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use dynarepo_core::expression::ValueTemplate;
    use dynarepo_core::storage::RangeCondition;

    use super::*;

    fn item() -> AttributeMap {
        let mut address = AttributeMap::new();
        address.insert("City".to_string(), "Montevideo".into());

        let mut item = AttributeMap::new();
        item.insert("UUID".to_string(), "u1".into());
        item.insert("Name".to_string(), "Alice".into());
        item.insert("Age".to_string(), 30.into());
        item.insert("Scores".to_string(), vec![1, 2].into());
        item.insert(
            "Tags".to_string(),
            AttributeValue::Ss(vec!["admin".to_string()]),
        );
        item.insert("Address".to_string(), AttributeValue::M(address));
        item
    }

    fn condition(expression: &str, args: Vec<AttributeValue>) -> Condition {
        Condition::new(expression, args).unwrap()
    }

    fn holds(item: &AttributeMap, expression: &str, args: Vec<AttributeValue>) -> bool {
        matches(item, Some(&condition(expression, args)))
    }

    #[test]
    fn test_compare_numbers_numerically() {
        let item = item();
        assert!(holds(&item, "Age > ?", vec![9.into()]));
        assert!(holds(&item, "Age = ?", vec![AttributeValue::N("30.0".into())]));
        assert!(!holds(&item, "Age < ?", vec![30.into()]));
    }

    #[test]
    fn test_missing_attribute_comparisons() {
        let item = item();
        assert!(!holds(&item, "Missing = ?", vec![1.into()]));
        assert!(holds(&item, "Missing <> ?", vec![1.into()]));
        assert!(!holds(&item, "Missing < ?", vec![1.into()]));
    }

    #[test]
    fn test_functions() {
        let item = item();
        assert!(holds(&item, "attribute_exists(Name)", vec![]));
        assert!(holds(&item, "attribute_not_exists(Version)", vec![]));
        assert!(holds(&item, "begins_with(Name, ?)", vec!["Al".into()]));
        assert!(holds(&item, "contains(Tags, ?)", vec!["admin".into()]));
        assert!(holds(&item, "contains(Scores, ?)", vec![2.into()]));
        assert!(holds(&item, "Address.City = ?", vec!["Montevideo".into()]));
    }

    #[test]
    fn test_logical_between_and_in() {
        let item = item();
        let expression = "Age BETWEEN ? AND ? AND NOT Name IN (?, ?)";
        let args = vec![18.into(), 40.into(), "Bob".into(), "Carol".into()];
        assert!(holds(&item, expression, args));
        let args = vec![1.into(), "Alice".into()];
        assert!(holds(&item, "Age < ? OR Name = ?", args));
    }

    #[test]
    fn test_no_condition_matches() {
        assert!(matches(&AttributeMap::new(), None));
    }

    #[test]
    fn test_version_condition_on_new_item() {
        let condition = Condition::version_matches("Version", 0);
        assert!(matches(&AttributeMap::new(), Some(&condition)));

        let mut stored = AttributeMap::new();
        stored.insert("Version".to_string(), 2.into());
        assert!(!matches(&stored, Some(&condition)));
        assert!(matches(&stored, Some(&Condition::version_matches("Version", 2))));
    }

    #[test]
    fn test_key_condition_range_operators() {
        let mut stored = AttributeMap::new();
        stored.insert("PK".to_string(), "p".into());
        stored.insert("SK".to_string(), "ORDER#2".into());

        let key = |op, values| KeyCondition {
            hash_key_name: "PK".to_string(),
            hash_key: "p".into(),
            range: Some(RangeCondition {
                name: "SK".to_string(),
                op,
                values,
            }),
        };

        let begins = key(RangeOperator::BeginsWith, vec!["ORDER#".into()]);
        assert!(matches_key(&stored, &begins));
        let bounds = vec!["ORDER#1".into(), "ORDER#3".into()];
        let between = key(RangeOperator::Between, bounds);
        assert!(matches_key(&stored, &between));
        let less = key(RangeOperator::LessThan, vec!["ORDER#1".into()]);
        assert!(!matches_key(&stored, &less));
        let not_equal = key(RangeOperator::NotEqual, vec!["ORDER#1".into()]);
        assert!(matches_key(&stored, &not_equal));
    }

    #[test]
    fn test_apply_updates() {
        let mut item = item();
        let directives = vec![
            UpdateDirective::Set {
                path: AttributePath::parse("Name"),
                value: "Bob".into(),
            },
            UpdateDirective::SetIfNotExists {
                path: AttributePath::parse("Age"),
                value: 99.into(),
            },
            UpdateDirective::SetIfNotExists {
                path: AttributePath::parse("Nickname"),
                value: "bobby".into(),
            },
            UpdateDirective::Add {
                path: AttributePath::parse("Logins"),
                value: 1.into(),
            },
            UpdateDirective::Add {
                path: AttributePath::parse("Tags"),
                value: AttributeValue::Ss(vec!["admin".to_string(), "ops".to_string()]),
            },
            UpdateDirective::Set {
                path: AttributePath::parse("Address.City"),
                value: "Salto".into(),
            },
        ];

        apply_updates(&mut item, &directives).unwrap();

        assert_eq!(item.get("Name"), Some(&"Bob".into()));
        assert_eq!(item.get("Age"), Some(&30.into()));
        assert_eq!(item.get("Nickname"), Some(&"bobby".into()));
        assert_eq!(item.get("Logins"), Some(&1.into()));
        let tags = AttributeValue::Ss(vec!["admin".to_string(), "ops".to_string()]);
        assert_eq!(item.get("Tags"), Some(&tags));
        assert_eq!(
            get_path(&item, &AttributePath::parse("Address.City")),
            Some(&"Salto".into())
        );
    }

    #[test]
    fn test_set_expression_reads_previous_values() {
        let mut item = item();
        let directives = vec![
            UpdateDirective::SetExpr {
                path: AttributePath::parse("Age"),
                template: ValueTemplate::new("Age + ?", vec![1.into()]).unwrap(),
            },
            UpdateDirective::SetExpr {
                path: AttributePath::parse("Scores"),
                template: ValueTemplate::new("list_append(Scores, ?)", vec![vec![3].into()])
                    .unwrap(),
            },
            UpdateDirective::SetExpr {
                path: AttributePath::parse("Visits"),
                template: ValueTemplate::new("if_not_exists(Visits, ?) - ?", vec![
                    10.into(),
                    1.into(),
                ])
                .unwrap(),
            },
        ];

        apply_updates(&mut item, &directives).unwrap();

        assert_eq!(item.get("Age"), Some(&31.into()));
        assert_eq!(item.get("Scores"), Some(&vec![1, 2, 3].into()));
        assert_eq!(item.get("Visits"), Some(&9.into()));
    }

    #[test]
    fn test_add_type_mismatch() {
        let mut item = item();
        let directives = vec![UpdateDirective::Add {
            path: AttributePath::parse("Name"),
            value: 1.into(),
        }];
        assert!(matches!(
            apply_updates(&mut item, &directives),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_set_under_missing_map_fails() {
        let mut item = item();
        let directives = vec![UpdateDirective::Set {
            path: AttributePath::parse("Profile.Bio"),
            value: "hi".into(),
        }];
        assert!(matches!(
            apply_updates(&mut item, &directives),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_fractional_arithmetic() {
        let sum = arithmetic("1.5", ArithmeticOp::Add, "2");
        assert_eq!(sum.as_deref(), Some("3.5"));
        let difference = arithmetic("10", ArithmeticOp::Subtract, "3");
        assert_eq!(difference.as_deref(), Some("7"));
        assert_eq!(arithmetic("x", ArithmeticOp::Add, "1"), None);
    }
}
