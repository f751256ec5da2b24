use crate::attribute::{AttributeMap, AttributeValue};
use crate::expression::{AttributePath, Condition, ValueTemplate};
use crate::key::RangeOperator;

/// Fetch one item from the base table by primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct GetItemRequest {
    pub table_name: String,
    pub key: AttributeMap,
}

/// Write a whole item, optionally guarded by a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: AttributeMap,
    pub condition: Option<Condition>,
}

/// One field-level change applied by an update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateDirective {
    /// Overwrite the attribute.
    Set {
        path: AttributePath,
        value: AttributeValue,
    },
    /// Write the attribute only when it is absent.
    SetIfNotExists {
        path: AttributePath,
        value: AttributeValue,
    },
    /// Overwrite a set-typed attribute.
    SetSet {
        path: AttributePath,
        value: AttributeValue,
    },
    /// Assign the result of a value template.
    SetExpr {
        path: AttributePath,
        template: ValueTemplate,
    },
    /// Numeric increment or set union; creates the attribute when absent.
    Add {
        path: AttributePath,
        value: AttributeValue,
    },
    /// Delete the attribute. A `SetSet` with an empty set compiles to this,
    /// since the store cannot hold empty sets.
    Remove { path: AttributePath },
}

impl UpdateDirective {
    pub fn path(&self) -> &AttributePath {
        match self {
            Self::Set { path, .. }
            | Self::SetIfNotExists { path, .. }
            | Self::SetSet { path, .. }
            | Self::SetExpr { path, .. }
            | Self::Add { path, .. }
            | Self::Remove { path } => path,
        }
    }
}

/// Apply directives to one item, atomically, optionally guarded by a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemRequest {
    pub table_name: String,
    pub key: AttributeMap,
    pub directives: Vec<UpdateDirective>,
    pub condition: Option<Condition>,
    /// Ask the store to return the item as it is after the update.
    pub return_new: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: AttributeMap,
}

/// Range-key comparison in a key condition.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeCondition {
    pub name: String,
    pub op: RangeOperator,
    /// One value, or two for `Between`.
    pub values: Vec<AttributeValue>,
}

/// Hash-key equality plus optional range comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub hash_key_name: String,
    pub hash_key: AttributeValue,
    pub range: Option<RangeCondition>,
}

/// Read one page of items sharing a hash key.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub key_condition: KeyCondition,
    pub limit: Option<usize>,
    pub descending: bool,
    pub exclusive_start_key: Option<AttributeMap>,
}

/// Read one page of a full-table scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub table_name: String,
    pub limit: Option<usize>,
    pub filter: Option<Condition>,
    pub exclusive_start_key: Option<AttributeMap>,
}

/// One bounded page of results and the token to resume after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<AttributeMap>,
    pub last_evaluated_key: Option<AttributeMap>,
}

/// Put and delete requests against a single table, sent in one call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWriteRequest {
    pub table_name: String,
    pub puts: Vec<AttributeMap>,
    pub deletes: Vec<AttributeMap>,
}

impl BatchWriteRequest {
    pub fn len(&self) -> usize {
        self.puts.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetch many items of one table by primary key in one call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetRequest {
    pub table_name: String,
    pub keys: Vec<AttributeMap>,
}
