use crate::record::{Record, RecordData};
use std::fmt;
use std::sync::Arc;

/// Values produced by password expressions and held in record fields.
#[derive(Clone)]
pub enum Value {
    None,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Record(Arc<dyn Record>),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Integer(number)
    }
}

macro_rules! from_smaller_ints {
	($( $Int: ty )+) => {
		$(
			impl From<$Int> for Value {
				fn from(number: $Int) -> Self {
					Value::Integer(i64::from(number))
				}
			}
		)+
	}
}

from_smaller_ints! {
    i8 i16 i32
    u8 u16 u32
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Real(number)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text)
    }
}

impl<'a> From<&'a str> for Value {
    fn from(text: &'a str) -> Self {
        Value::String(text.to_string())
    }
}

impl From<RecordData> for Value {
    fn from(record: RecordData) -> Self {
        Value::Record(Arc::new(record))
    }
}

impl From<Arc<dyn Record>> for Value {
    fn from(record: Arc<dyn Record>) -> Self {
        Value::Record(record)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Real(value) => Some(value),
            Value::Integer(value) => Some(value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&dyn Record> {
        match self {
            Value::Record(record) => Some(record.as_ref()),
            _ => None,
        }
    }

    /// Truth value with the usual scripting rules: `None`, `False`, zero and
    /// the empty string are false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Boolean(value) => *value,
            Value::Integer(value) => *value != 0,
            Value::Real(value) => *value != 0.0,
            Value::String(text) => !text.is_empty(),
            Value::Record(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Real(_) => "float",
            Value::String(_) => "str",
            Value::Record(_) => "record",
        }
    }
}

/// Formats a float the way `repr()` does: the shortest digits that read
/// back as the same number, a trailing `.0` on integral values, and
/// scientific notation with a signed two-digit exponent outside
/// `1e-4 <= |x| < 1e16`.
pub(crate) fn format_real(number: f64) -> String {
    if number.is_nan() {
        return "nan".to_string();
    }
    if number.is_infinite() {
        return if number > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }

    let scientific = format!("{number:e}");
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..16).contains(&exponent) {
        if number.fract() == 0.0 { format!("{number:.1}") } else { format!("{number}") }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
    }
}

/// The `str()` form of a value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Boolean(true) => f.write_str("True"),
            Value::Boolean(false) => f.write_str("False"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Real(value) => f.write_str(&format_real(*value)),
            Value::String(text) => f.write_str(text),
            Value::Record(record) => write!(f, "{}({},)", record.model(), record.id()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(text) => write!(f, "{text:?}"),
            other => fmt::Display::fmt(other, f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Integer(a), Value::Real(b)) | (Value::Real(b), Value::Integer(a)) => (*a as f64) == *b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a.model() == b.model() && a.id() == b.id(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::from(RecordData::new("res.partner", 1)).is_truthy());
    }

    #[test]
    fn display_matches_str_builtin() {
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from(1.0).to_string(), "1.0");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(0.0).to_string(), "0.0");
        assert_eq!(Value::from(0.0001).to_string(), "0.0001");
        assert_eq!(Value::from(1e15).to_string(), "1000000000000000.0");
        assert_eq!(Value::from(1e16).to_string(), "1e+16");
        assert_eq!(Value::from(1e-5).to_string(), "1e-05");
        assert_eq!(Value::from(-1.5e-7).to_string(), "-1.5e-07");
        assert_eq!(Value::from(1.2345e100).to_string(), "1.2345e+100");
        assert_eq!(Value::from(true).to_string(), "True");
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::from(RecordData::new("sale.order", 7)).to_string(), "sale.order(7,)");
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::None);
        assert_eq!(Value::from(Some("abc")), Value::from("abc"));
    }
}
