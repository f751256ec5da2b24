mod codec;
mod json;
mod value;

pub use codec::{
    datetime_to_attribute, get_bool, get_datetime, get_number, get_optional_datetime,
    get_optional_number, get_optional_string, get_string, get_string_set, put_optional_datetime,
    CodecError, ItemCodec,
};
pub use json::{attribute_to_json, item_to_json, json_to_attribute};
pub use value::{AttributeMap, AttributeValue};
