use std::cmp::Ordering;
use std::collections::HashMap;

/// A single item as stored in a table: attribute name to typed value.
pub type AttributeMap = HashMap<String, AttributeValue>;

/// Typed attribute value in the store's wire model.
///
/// Numbers are carried as decimal strings, the same way the store transmits
/// them, so no precision is lost between encode and decode.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    S(String),
    N(String),
    B(Vec<u8>),
    Bool(bool),
    Null,
    L(Vec<AttributeValue>),
    M(AttributeMap),
    Ss(Vec<String>),
    Ns(Vec<String>),
    Bs(Vec<Vec<u8>>),
}

impl AttributeValue {
    /// Creates a number attribute from anything that formats as a number.
    pub fn number(n: impl ToString) -> Self {
        Self::N(n.to_string())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::L(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_m(&self) -> Option<&AttributeMap> {
        match self {
            Self::M(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for an `SS`, `NS` or `BS` with no members.
    pub fn is_empty_set(&self) -> bool {
        match self {
            Self::Ss(set) | Self::Ns(set) => set.is_empty(),
            Self::Bs(set) => set.is_empty(),
            _ => false,
        }
    }

    /// Parses a number attribute as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_n().and_then(|n| n.parse().ok())
    }

    /// Short type descriptor as the store names it (`S`, `N`, `SS`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Bool(_) => "BOOL",
            Self::Null => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
        }
    }

    /// Compares two scalar values of the same type.
    ///
    /// Strings and binaries compare bytewise, numbers compare numerically.
    /// Returns `None` for mismatched or non-scalar types.
    pub fn compare(&self, other: &AttributeValue) -> Option<Ordering> {
        match (self, other) {
            (Self::S(a), Self::S(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Self::B(a), Self::B(b)) => Some(a.cmp(b)),
            (Self::N(a), Self::N(b)) => {
                let a: f64 = a.parse().ok()?;
                let b: f64 = b.parse().ok()?;
                a.partial_cmp(&b)
            }
            _ => None,
        }
    }

    /// Equality as the store evaluates it in conditions: numbers compare by
    /// value and sets ignore element order.
    pub fn store_eq(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (Self::N(_), Self::N(_)) => self.compare(other) == Some(Ordering::Equal),
            (Self::Ss(a), Self::Ss(b)) => same_elements(a, b),
            (Self::Ns(a), Self::Ns(b)) => {
                a.len() == b.len()
                    && a.iter().all(|x| {
                        b.iter().any(|y| {
                            AttributeValue::N(x.clone()).store_eq(&AttributeValue::N(y.clone()))
                        })
                    })
            }
            (Self::Bs(a), Self::Bs(b)) => same_elements(a, b),
            _ => self == other,
        }
    }
}

fn same_elements<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for AttributeValue {
                fn from(value: $t) -> Self {
                    Self::N(value.to_string())
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        Self::L(values.into_iter().map(Into::into).collect())
    }
}

impl From<AttributeMap> for AttributeValue {
    fn from(map: AttributeMap) -> Self {
        Self::M(map)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_compare_numerically() {
        let small = AttributeValue::from(9);
        let large = AttributeValue::from(10);
        assert_eq!(small.compare(&large), Some(Ordering::Less));
        assert!(AttributeValue::N("1.0".into()).store_eq(&AttributeValue::N("1".into())));
    }

    #[test]
    fn test_mismatched_types_do_not_compare() {
        let text = AttributeValue::from("1");
        assert_eq!(text.compare(&AttributeValue::from(1)), None);
        assert!(!AttributeValue::from("1").store_eq(&AttributeValue::from(1)));
    }

    #[test]
    fn test_vec_becomes_list() {
        let value = AttributeValue::from(vec![1, 2]);
        assert_eq!(
            value.as_l().unwrap(),
            &[AttributeValue::N("1".into()), AttributeValue::N("2".into())]
        );
    }

    #[test]
    fn test_string_sets_ignore_order() {
        let a = AttributeValue::Ss(vec!["a".into(), "b".into()]);
        let b = AttributeValue::Ss(vec!["b".into(), "a".into()]);
        assert!(a.store_eq(&b));
    }

    #[test]
    fn test_empty_set_detection() {
        assert!(AttributeValue::Ss(Vec::new()).is_empty_set());
        assert!(AttributeValue::Bs(Vec::new()).is_empty_set());
        assert!(!AttributeValue::Ns(vec!["1".into()]).is_empty_set());
        assert!(!AttributeValue::L(Vec::new()).is_empty_set());
    }

    #[test]
    fn test_none_becomes_null() {
        let value: AttributeValue = Option::<String>::None.into();
        assert!(value.is_null());
    }
}
