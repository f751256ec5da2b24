//! Versioning envelope for items written with optimistic locking.

use chrono::{DateTime, Utc};

use crate::attribute::{get_optional_datetime, get_optional_number, put_optional_datetime};
use crate::attribute::{AttributeMap, AttributeValue, CodecError};

pub const VERSION_ATTRIBUTE: &str = "Version";
pub const CREATED_AT_ATTRIBUTE: &str = "CreatedAt";
pub const UPDATED_AT_ATTRIBUTE: &str = "UpdatedAt";

/// Version counter and timestamps embedded in an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    pub version: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn increase_version(&mut self) {
        self.version += 1;
    }

    /// Sets `created_at` once, if it is not set yet.
    pub fn init_created_at(&mut self) {
        if self.created_at.is_none() {
            self.created_at = Some(Utc::now());
        }
    }

    pub fn init_updated_at(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    /// Writes `Version`, `CreatedAt` and `UpdatedAt` into an item.
    pub fn encode_into(&self, item: &mut AttributeMap) {
        item.insert(
            VERSION_ATTRIBUTE.to_string(),
            AttributeValue::from(self.version),
        );
        put_optional_datetime(item, CREATED_AT_ATTRIBUTE, self.created_at.as_ref());
        put_optional_datetime(item, UPDATED_AT_ATTRIBUTE, self.updated_at.as_ref());
    }

    /// Reads the envelope back. A missing `Version` decodes as 0.
    pub fn decode_from(item: &AttributeMap) -> Result<Self, CodecError> {
        Ok(Self {
            version: get_optional_number(item, VERSION_ATTRIBUTE)?.unwrap_or(0),
            created_at: get_optional_datetime(item, CREATED_AT_ATTRIBUTE)?,
            updated_at: get_optional_datetime(item, UPDATED_AT_ATTRIBUTE)?,
        })
    }
}

/// Items that embed a [`Model`] and can be saved with optimistic locking.
pub trait Versioned {
    fn model(&self) -> &Model;

    fn model_mut(&mut self) -> &mut Model;

    fn version(&self) -> u64 {
        self.model().version
    }
}

impl Versioned for Model {
    fn model(&self) -> &Model {
        self
    }

    fn model_mut(&mut self) -> &mut Model {
        self
    }
}
