use std::fmt;

use crate::attribute::AttributeValue;

/// The kinds of field-level change an update can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Overwrite the field.
    Set,
    /// Write the field only if it has no value yet.
    SetIfNotExists,
    /// Overwrite a set-typed field.
    SetSet,
    /// Assign computed values. The field entry holds one or more
    /// comma-separated `path = template` assignments and its value is the
    /// list of arguments for their `?` and `$` placeholders.
    SetExpr,
    /// Increment a number or union into a set.
    Add,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Set => "Set",
            Self::SetIfNotExists => "SetIfNotExists",
            Self::SetSet => "SetSet",
            Self::SetExpr => "SetExpr",
            Self::Add => "Add",
        };
        f.write_str(name)
    }
}

/// One requested change: a kind, a field (or assignment for `SetExpr`) and a value.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAction {
    pub kind: UpdateKind,
    pub field: String,
    pub value: AttributeValue,
}

/// An ordered set of field-level changes, compiled into a store update.
///
/// ```ignore
/// let updates = UpdateExpressions::new()
///     .set("Name", "Alice")
///     .add("Logins", 1)
///     .set_expr("Score = Score - ?", vec![5]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpressions {
    actions: Vec<UpdateAction>,
}

impl UpdateExpressions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one kind to every `(field, value)` pair.
    pub fn from_values<I, F, V>(kind: UpdateKind, values: I) -> Self
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<String>,
        V: Into<AttributeValue>,
    {
        values
            .into_iter()
            .fold(Self::new(), |updates, (field, value)| {
                updates.push(kind, field, value)
            })
    }

    pub fn push(
        mut self,
        kind: UpdateKind,
        field: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.actions.push(UpdateAction {
            kind,
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn set(self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.push(UpdateKind::Set, field, value)
    }

    pub fn set_if_not_exists(
        self,
        field: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.push(UpdateKind::SetIfNotExists, field, value)
    }

    pub fn set_set(self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.push(UpdateKind::SetSet, field, value)
    }

    /// `assignments` is `path = template`, or several separated by commas.
    /// `args` must convert to a non-empty list; a `$` in a path takes its
    /// segment name from the argument in that position.
    pub fn set_expr(self, assignments: impl Into<String>, args: impl Into<AttributeValue>) -> Self {
        self.push(UpdateKind::SetExpr, assignments, args)
    }

    pub fn add(self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.push(UpdateKind::Add, field, value)
    }

    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
