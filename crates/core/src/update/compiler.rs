use std::collections::HashSet;

use crate::attribute::AttributeValue;
use crate::error::{RepositoryError, Result};
use crate::expression::{AttributePath, ValueTemplate};
use crate::key::{validate_key, Key};
use crate::storage::{UpdateDirective, UpdateItemRequest};

use super::{UpdateAction, UpdateExpressions, UpdateKind};

/// Compiles field-level changes into an update addressed by `key`.
///
/// The whole request is built or nothing is: any invalid action fails the
/// compile and no partial request escapes.
pub fn compile(key: &Key, updates: &UpdateExpressions) -> Result<UpdateItemRequest> {
    validate_key(key)?;
    if updates.is_empty() {
        return Err(RepositoryError::EmptyUpdate);
    }

    let mut seen = HashSet::new();
    let mut directives = Vec::with_capacity(updates.actions().len());
    for action in updates.actions() {
        for directive in compile_action(action)? {
            if !seen.insert(directive.path().clone()) {
                return Err(RepositoryError::DuplicateUpdatePath {
                    path: directive.path().to_string(),
                });
            }
            directives.push(directive);
        }
    }

    Ok(UpdateItemRequest {
        table_name: key.table_name().to_string(),
        key: key.to_attribute_map(),
        directives,
        condition: None,
        return_new: false,
    })
}

/// One action compiles to one directive, except `SetExpr`, which yields one
/// per assignment.
fn compile_action(action: &UpdateAction) -> Result<Vec<UpdateDirective>> {
    let path = || AttributePath::parse(&action.field);
    let value = action.value.clone();
    let directive = match action.kind {
        UpdateKind::Set => UpdateDirective::Set {
            path: path(),
            value,
        },
        UpdateKind::SetIfNotExists => UpdateDirective::SetIfNotExists {
            path: path(),
            value,
        },
        UpdateKind::SetSet if value.is_empty_set() => UpdateDirective::Remove { path: path() },
        UpdateKind::SetSet => UpdateDirective::SetSet {
            path: path(),
            value,
        },
        UpdateKind::Add => UpdateDirective::Add {
            path: path(),
            value,
        },
        UpdateKind::SetExpr => {
            let args = match value {
                AttributeValue::L(args) if !args.is_empty() => args,
                _ => return Err(RepositoryError::InvalidSliceType),
            };
            let directives = ValueTemplate::assignments(&action.field, args)?
                .into_iter()
                .map(|(path, template)| UpdateDirective::SetExpr { path, template })
                .collect();
            return Ok(directives);
        }
    };
    Ok(vec![directive])
}
