//! Conversions between host wire values and interpreter values.

use crate::bridge::error::{BridgeError, BridgeResult};
use crate::runtime::value::{Complex, IterError, Value};
use crate::wire::WireValue;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

pub const UNCONVERTIBLE: &str = "Object type can't be converted!";

pub fn integer(value: i64) -> Value {
    Value::Int(BigInt::from(value))
}

pub fn real(value: f64) -> Value {
    Value::Float(value)
}

pub fn complex(re: f64, im: f64) -> Value {
    Value::Complex(Complex::new(re, im))
}

/// Decodes UTF-16 code units. Unpaired surrogates become U+FFFD.
pub fn unicode_string(units: &[u16]) -> Value {
    Value::str(String::from_utf16_lossy(units))
}

/// Copies exactly `len` code units (bounded by the supplied codepoints)
/// into a fresh byte string.
pub fn byte_string(codepoints: &[i64], len: usize) -> BridgeResult<Value> {
    let len = len.min(codepoints.len());
    let mut buffer: Vec<u8> = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| BridgeError::AllocationFailure)?;
    for &code in &codepoints[..len] {
        let byte = u8::try_from(code).map_err(|_| BridgeError::ByteOutOfRange { value: code })?;
        buffer.push(byte);
    }
    Ok(Value::Bytes(buffer.into()))
}

pub fn symbol(name: &str) -> BridgeResult<Value> {
    match name {
        "Null" => Ok(Value::None),
        "True" => Ok(Value::Bool(true)),
        "False" => Ok(Value::Bool(false)),
        other => Err(BridgeError::UnknownSymbol {
            name: other.to_string(),
        }),
    }
}

pub fn iterator_diagnostic(type_name: &str) -> String {
    format!("Can't get iterator for '{}'", type_name)
}

/// Converts an interpreter value into a host expression. Values with no
/// host counterpart become diagnostic strings in place.
pub fn to_wire(value: &Value) -> WireValue {
    match value {
        Value::Bool(b) => WireValue::boolean(*b),
        Value::Int(v) => match v.to_i64() {
            Some(small) => WireValue::Integer(small),
            None => WireValue::to_expression(v.to_string()),
        },
        Value::None => WireValue::null(),
        Value::Float(v) => WireValue::Real(*v),
        Value::Complex(c) => WireValue::Complex { re: c.re, im: c.im },
        Value::Bytes(bytes) => WireValue::ByteString(bytes.to_vec()),
        Value::Str(text) => WireValue::UnicodeString(text.to_string()),
        Value::Tuple(_) | Value::List(_) | Value::Set(_) => match value.try_iter() {
            Ok(items) => WireValue::list_sequence(items.map(|item| to_wire(&item)).collect()),
            Err(err) => iterator_failure(value, err),
        },
        Value::Dict(entries) => match entries.try_borrow() {
            Ok(entries) => WireValue::list_sequence(
                entries
                    .iter()
                    .map(|(key, value)| {
                        WireValue::list_sequence(vec![to_wire(key), to_wire(value)])
                    })
                    .collect(),
            ),
            Err(_) => iterator_failure(value, IterError::Unavailable),
        },
        _ => WireValue::string(UNCONVERTIBLE),
    }
}

fn iterator_failure(value: &Value, err: IterError) -> WireValue {
    tracing::warn!(kind = value.type_name(), ?err, "no iterator for value");
    WireValue::string(iterator_diagnostic(value.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn scalars_follow_conversion_precedence() {
        assert_eq!(to_wire(&Value::Bool(true)), WireValue::boolean(true));
        assert_eq!(to_wire(&integer(-7)), WireValue::Integer(-7));
        assert_eq!(to_wire(&Value::None), WireValue::null());
        assert_eq!(to_wire(&real(0.5)), WireValue::Real(0.5));
        assert_eq!(
            to_wire(&complex(1.0, 2.0)),
            WireValue::Complex { re: 1.0, im: 2.0 }
        );
    }

    #[test]
    fn big_integers_travel_as_decimal_text() {
        let big = Value::Int(BigInt::from(i64::MAX) + 1);
        assert_eq!(
            to_wire(&big),
            WireValue::to_expression("9223372036854775808")
        );
    }

    #[test]
    fn strings_keep_exact_length() {
        let bytes = byte_string(&[104, 0, 105], 3).unwrap();
        assert_eq!(to_wire(&bytes), WireValue::ByteString(vec![104, 0, 105]));
        let text = unicode_string(&"h\u{e9}\u{1f600}".encode_utf16().collect::<Vec<_>>());
        assert_eq!(to_wire(&text), WireValue::string("h\u{e9}\u{1f600}"));
    }

    #[test]
    fn byte_string_copies_at_most_len_units() {
        let bytes = byte_string(&[97, 98, 99], 2).unwrap();
        assert_eq!(bytes.repr(), "b'ab'");
        let bytes = byte_string(&[97], 5).unwrap();
        assert_eq!(bytes.repr(), "b'a'");
        assert_eq!(
            byte_string(&[97, 300], 2).unwrap_err(),
            BridgeError::ByteOutOfRange { value: 300 }
        );
    }

    #[test]
    fn symbols_are_recognized_exactly() {
        assert!(matches!(symbol("True"), Ok(Value::Bool(true))));
        assert!(matches!(symbol("Null"), Ok(Value::None)));
        assert_eq!(
            symbol("true").unwrap_err(),
            BridgeError::UnknownSymbol {
                name: "true".into()
            }
        );
    }

    #[test]
    fn dicts_become_key_value_pairs() {
        let dict = Value::Dict(Rc::new(RefCell::new(vec![(
            Value::str("a"),
            integer(1),
        )])));
        assert_eq!(to_wire(&dict).to_string(), "List[Sequence[List[Sequence[\"a\", 1]]]]");
    }

    #[test]
    fn unavailable_iterator_replaces_only_that_element() {
        let inner: crate::runtime::value::ListRef = Rc::new(RefCell::new(vec![integer(1)]));
        let outer = Value::list(vec![integer(0), Value::List(inner.clone()), Value::str("x")]);
        let _guard = inner.borrow_mut();
        assert_eq!(
            to_wire(&outer),
            WireValue::list_sequence(vec![
                WireValue::Integer(0),
                WireValue::string("Can't get iterator for 'list'"),
                WireValue::string("x"),
            ])
        );
    }

    #[test]
    fn callables_are_not_convertible() {
        let builtin = Value::Builtin(crate::runtime::builtins::Builtin::Len);
        assert_eq!(to_wire(&builtin), WireValue::string(UNCONVERTIBLE));
    }
}
