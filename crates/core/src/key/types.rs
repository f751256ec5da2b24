use std::fmt;

use crate::attribute::{AttributeMap, AttributeValue};

/// Identifies a single item: table, hash key and optional range key.
///
/// Built with the `with_*` methods, then handed to exactly one repository
/// call. `index_name` routes reads through a secondary index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Key {
    table_name: String,
    hash_key_name: Option<String>,
    hash_key: Option<AttributeValue>,
    range_key_name: Option<String>,
    range_key: Option<AttributeValue>,
    index_name: Option<String>,
}

impl Key {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_hash_key_name(mut self, name: impl Into<String>) -> Self {
        self.hash_key_name = Some(name.into());
        self
    }

    pub fn with_hash_key(mut self, value: impl Into<AttributeValue>) -> Self {
        self.hash_key = Some(value.into());
        self
    }

    pub fn with_range_key_name(mut self, name: impl Into<String>) -> Self {
        self.range_key_name = Some(name.into());
        self
    }

    pub fn with_range_key(mut self, value: impl Into<AttributeValue>) -> Self {
        self.range_key = Some(value.into());
        self
    }

    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn hash_key_name(&self) -> Option<&str> {
        self.hash_key_name.as_deref()
    }

    pub fn hash_key(&self) -> Option<&AttributeValue> {
        self.hash_key.as_ref()
    }

    pub fn range_key_name(&self) -> Option<&str> {
        self.range_key_name.as_deref()
    }

    pub fn range_key(&self) -> Option<&AttributeValue> {
        self.range_key.as_ref()
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    /// The range key name and value, only when both are set.
    pub fn range(&self) -> Option<(&str, &AttributeValue)> {
        match (&self.range_key_name, &self.range_key) {
            (Some(name), Some(value)) => Some((name, value)),
            _ => None,
        }
    }

    /// The primary-key attributes of the addressed item.
    ///
    /// Only meaningful on a validated key; missing parts are skipped.
    pub fn to_attribute_map(&self) -> AttributeMap {
        let mut map = AttributeMap::new();
        if let (Some(name), Some(value)) = (&self.hash_key_name, &self.hash_key) {
            map.insert(name.clone(), value.clone());
        }
        if let Some((name, value)) = self.range() {
            map.insert(name.to_string(), value.clone());
        }
        map
    }
}

/// Comparison applied to the range key of a [`Query`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RangeOperator {
    #[default]
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    BeginsWith,
    Between,
}

impl RangeOperator {
    /// Store operator code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Equal => "EQ",
            Self::NotEqual => "NE",
            Self::LessThan => "LT",
            Self::LessOrEqual => "LE",
            Self::GreaterThan => "GT",
            Self::GreaterOrEqual => "GE",
            Self::BeginsWith => "BEGINS_WITH",
            Self::Between => "BETWEEN",
        }
    }
}

impl fmt::Display for RangeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for RangeOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EQ" => Ok(Self::Equal),
            "NE" => Ok(Self::NotEqual),
            "LT" => Ok(Self::LessThan),
            "LE" => Ok(Self::LessOrEqual),
            "GT" => Ok(Self::GreaterThan),
            "GE" => Ok(Self::GreaterOrEqual),
            "BEGINS_WITH" => Ok(Self::BeginsWith),
            "BETWEEN" => Ok(Self::Between),
            other => Err(format!("unknown range operator: {other}")),
        }
    }
}

/// A key plus range comparison, ordering and limit for multi-item reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    key: Key,
    range_op: RangeOperator,
    limit: Option<usize>,
    descending: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.key = self.key.with_table_name(table_name);
        self
    }

    pub fn with_hash_key_name(mut self, name: impl Into<String>) -> Self {
        self.key = self.key.with_hash_key_name(name);
        self
    }

    pub fn with_hash_key(mut self, value: impl Into<AttributeValue>) -> Self {
        self.key = self.key.with_hash_key(value);
        self
    }

    pub fn with_range_key_name(mut self, name: impl Into<String>) -> Self {
        self.key = self.key.with_range_key_name(name);
        self
    }

    pub fn with_range_key(mut self, value: impl Into<AttributeValue>) -> Self {
        self.key = self.key.with_range_key(value);
        self
    }

    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.key = self.key.with_index_name(name);
        self
    }

    pub fn with_range_op(mut self, op: RangeOperator) -> Self {
        self.range_op = op;
        self
    }

    /// Caps the number of returned items. Zero means no limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn with_descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn table_name(&self) -> &str {
        self.key.table_name()
    }

    pub fn range_op(&self) -> RangeOperator {
        self.range_op
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn descending(&self) -> bool {
        self.descending
    }
}

impl From<Key> for Query {
    fn from(key: Key) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }
}
