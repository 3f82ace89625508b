use crate::language::ast::{BinaryOp, CompareOp, UnaryOp};
use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    value::{Complex, DictRef, Number, Value},
};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::rc::Rc;

const MAX_INT_EXPONENT: u32 = 1 << 16;
const MAX_REPEAT: usize = 1 << 28;

pub fn unary(op: UnaryOp, operand: &Value) -> RuntimeResult<Value> {
    if op == UnaryOp::Not {
        return Ok(Value::Bool(!operand.truthy()));
    }
    let number = Number::of(operand).ok_or_else(|| {
        let symbol = if op == UnaryOp::Neg { "-" } else { "+" };
        RuntimeError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            symbol,
            operand.type_name()
        ))
    })?;
    Ok(match (op, number) {
        (UnaryOp::Neg, Number::Int(v)) => Value::Int(-v),
        (UnaryOp::Neg, Number::Float(v)) => Value::Float(-v),
        (UnaryOp::Neg, Number::Complex(c)) => Value::Complex(Complex::new(-c.re, -c.im)),
        (_, Number::Int(v)) => Value::Int(v),
        (_, Number::Float(v)) => Value::Float(v),
        (_, Number::Complex(c)) => Value::Complex(c),
    })
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> RuntimeResult<Value> {
    if let (Some(a), Some(b)) = (Number::of(left), Number::of(right)) {
        return numeric(op, a, b);
    }
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::str(joined))
        }
        (BinaryOp::Add, Value::Bytes(a), Value::Bytes(b)) => {
            Ok(Value::Bytes([&a[..], &b[..]].concat().into()))
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinaryOp::Sub, Value::Set(a), Value::Set(b)) => {
            let other = b.borrow();
            let items = a
                .borrow()
                .iter()
                .filter(|item| !other.iter().any(|x| x.py_eq(item)))
                .cloned()
                .collect();
            Ok(Value::Set(Rc::new(std::cell::RefCell::new(items))))
        }
        (BinaryOp::Mul, seq, Value::Int(_) | Value::Bool(_))
            if matches!(
                seq,
                Value::Str(_) | Value::Bytes(_) | Value::List(_) | Value::Tuple(_)
            ) =>
        {
            repeat(seq, right)
        }
        (BinaryOp::Mul, Value::Int(_) | Value::Bool(_), seq)
            if matches!(
                seq,
                Value::Str(_) | Value::Bytes(_) | Value::List(_) | Value::Tuple(_)
            ) =>
        {
            repeat(seq, left)
        }
        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

fn unsupported(symbol: &str, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol,
        left.type_name(),
        right.type_name()
    ))
}

fn repeat(seq: &Value, count: &Value) -> RuntimeResult<Value> {
    let count = match Number::of(count) {
        Some(Number::Int(v)) => v,
        _ => return Err(RuntimeError::type_error("can't multiply sequence by non-int")),
    };
    let times = if count.is_negative() {
        0
    } else {
        count.to_usize().unwrap_or(usize::MAX)
    };
    let unit = seq.len().unwrap_or(0);
    if unit.saturating_mul(times) > MAX_REPEAT {
        return Err(RuntimeError::Overflow {
            message: "repeated sequence is too long".into(),
        });
    }
    Ok(match seq {
        Value::Str(text) => Value::str(text.repeat(times)),
        Value::Bytes(bytes) => Value::Bytes(bytes.repeat(times).into()),
        Value::List(items) => {
            let items = items.borrow();
            let mut out = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            Value::list(out)
        }
        Value::Tuple(items) => {
            let mut out = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            Value::tuple(out)
        }
        _ => return Err(RuntimeError::type_error("can't multiply sequence by non-int")),
    })
}

fn numeric(op: BinaryOp, left: Number, right: Number) -> RuntimeResult<Value> {
    match (left, right) {
        (Number::Int(a), Number::Int(b)) => int_op(op, a, b),
        (a @ Number::Complex(_), b) | (a, b @ Number::Complex(_)) => {
            complex_op(op, a.to_complex(), b.to_complex())
        }
        (a, b) => float_op(op, a.to_f64(), b.to_f64()),
    }
}

/// Floor division and modulo rounding toward negative infinity.
fn floor_div_mod(a: &BigInt, b: &BigInt) -> (BigInt, BigInt) {
    let mut quotient = a / b;
    let mut remainder = a % b;
    if !remainder.is_zero() && (remainder.is_negative() != b.is_negative()) {
        quotient -= 1;
        remainder += b;
    }
    (quotient, remainder)
}

fn int_op(op: BinaryOp, a: BigInt, b: BigInt) -> RuntimeResult<Value> {
    Ok(match op {
        BinaryOp::Add => Value::Int(a + b),
        BinaryOp::Sub => Value::Int(a - b),
        BinaryOp::Mul => Value::Int(a * b),
        BinaryOp::Div => {
            if b.is_zero() {
                return Err(RuntimeError::zero_division("division by zero"));
            }
            Value::Float(int_to_f64(&a)? / int_to_f64(&b)?)
        }
        BinaryOp::FloorDiv | BinaryOp::Mod => {
            if b.is_zero() {
                return Err(RuntimeError::zero_division(
                    "integer division or modulo by zero",
                ));
            }
            let (quotient, remainder) = floor_div_mod(&a, &b);
            if op == BinaryOp::FloorDiv {
                Value::Int(quotient)
            } else {
                Value::Int(remainder)
            }
        }
        BinaryOp::Pow => {
            if b.is_negative() {
                return float_op(op, int_to_f64(&a)?, int_to_f64(&b)?);
            }
            let small_base = a.abs() <= BigInt::from(1);
            match b.to_u32() {
                Some(exponent) if small_base || exponent <= MAX_INT_EXPONENT => {
                    if small_base && exponent > 1 {
                        let parity = if a.is_negative() { exponent % 2 } else { 0 };
                        let magnitude = a.abs();
                        let result = if magnitude.is_zero() {
                            BigInt::zero()
                        } else if parity == 1 {
                            -magnitude
                        } else {
                            magnitude
                        };
                        Value::Int(result)
                    } else {
                        Value::Int(a.pow(exponent))
                    }
                }
                _ if small_base => {
                    let odd = (&b % 2u8) == BigInt::from(1);
                    Value::Int(if a.is_negative() && odd {
                        a
                    } else {
                        a.abs()
                    })
                }
                _ => {
                    return Err(RuntimeError::Overflow {
                        message: "integer exponent too large".into(),
                    })
                }
            }
        }
    })
}

fn int_to_f64(value: &BigInt) -> RuntimeResult<f64> {
    match value.to_f64() {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(RuntimeError::Overflow {
            message: "int too large to convert to float".into(),
        }),
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> RuntimeResult<Value> {
    Ok(Value::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(RuntimeError::zero_division("float division by zero"));
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(RuntimeError::zero_division("float divmod()"));
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(RuntimeError::zero_division("float modulo"));
            }
            let remainder = a % b;
            if remainder != 0.0 && (remainder < 0.0) != (b < 0.0) {
                remainder + b
            } else {
                remainder
            }
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(RuntimeError::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return complex_op(op, Complex::new(a, 0.0), Complex::new(b, 0.0));
            }
            a.powf(b)
        }
    }))
}

fn complex_op(op: BinaryOp, a: Complex, b: Complex) -> RuntimeResult<Value> {
    let result = match op {
        BinaryOp::Add => a.add(b),
        BinaryOp::Sub => a.sub(b),
        BinaryOp::Mul => a.mul(b),
        BinaryOp::Div => a
            .div(b)
            .ok_or_else(|| RuntimeError::zero_division("complex division by zero"))?,
        BinaryOp::Pow => a.pow(b).ok_or_else(|| {
            RuntimeError::zero_division("0.0 to a negative or complex power")
        })?,
        BinaryOp::FloorDiv | BinaryOp::Mod => {
            return Err(RuntimeError::type_error("can't take floor or mod of complex number."))
        }
    };
    Ok(Value::Complex(result))
}

pub fn compare(op: CompareOp, left: &Value, right: &Value) -> RuntimeResult<bool> {
    let (ordering_ok, symbol): (fn(Ordering) -> bool, &str) = match op {
        CompareOp::Eq => return Ok(left.py_eq(right)),
        CompareOp::NotEq => return Ok(!left.py_eq(right)),
        CompareOp::In => return contains(right, left),
        CompareOp::NotIn => return contains(right, left).map(|found| !found),
        CompareOp::Lt => (|o| o == Ordering::Less, "<"),
        CompareOp::LtEq => (|o| o != Ordering::Greater, "<="),
        CompareOp::Gt => (|o| o == Ordering::Greater, ">"),
        CompareOp::GtEq => (|o| o != Ordering::Less, ">="),
    };
    match left.compare(right) {
        Some(ordering) => Ok(ordering_ok(ordering)),
        None if is_nan_pair(left, right) => Ok(false),
        None => Err(RuntimeError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            symbol,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn is_nan_pair(left: &Value, right: &Value) -> bool {
    matches!(
        (Number::of(left), Number::of(right)),
        (Some(a), Some(b))
            if !matches!(a, Number::Complex(_))
                && !matches!(b, Number::Complex(_))
                && (a.to_f64().is_nan() || b.to_f64().is_nan())
    )
}

pub fn contains(container: &Value, item: &Value) -> RuntimeResult<bool> {
    match container {
        Value::Str(text) => match item {
            Value::Str(needle) => Ok(text.contains(&**needle)),
            other => Err(RuntimeError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Bytes(bytes) => match item {
            Value::Int(v) => Ok(v.to_u8().map(|b| bytes.contains(&b)).unwrap_or(false)),
            Value::Bytes(needle) => Ok(needle.is_empty()
                || bytes.windows(needle.len()).any(|window| window == &needle[..])),
            other => Err(RuntimeError::type_error(format!(
                "a bytes-like object is required, not '{}'",
                other.type_name()
            ))),
        },
        Value::List(items) | Value::Set(items) => {
            Ok(items.borrow().iter().any(|x| x.py_eq(item)))
        }
        Value::Tuple(items) => Ok(items.iter().any(|x| x.py_eq(item))),
        Value::Dict(entries) => Ok(entries.borrow().iter().any(|(key, _)| key.py_eq(item))),
        other => Err(RuntimeError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Resolves a possibly negative sequence index against `len`.
fn normalize_index(index: &Value, len: usize, kind: &str) -> RuntimeResult<usize> {
    let position = match Number::of(index) {
        Some(Number::Int(v)) => v,
        _ => {
            return Err(RuntimeError::type_error(format!(
                "{} indices must be integers, not {}",
                kind,
                index.type_name()
            )))
        }
    };
    let resolved = if position.is_negative() {
        position + BigInt::from(len)
    } else {
        position
    };
    resolved
        .to_usize()
        .filter(|i| *i < len)
        .ok_or_else(|| RuntimeError::index_error(format!("{} index out of range", kind)))
}

pub fn check_hashable(key: &Value) -> RuntimeResult<()> {
    if key.is_hashable() {
        Ok(())
    } else {
        Err(RuntimeError::type_error(format!(
            "unhashable type: '{}'",
            key.type_name()
        )))
    }
}

pub fn dict_get(entries: &DictRef, key: &Value) -> Option<Value> {
    entries
        .borrow()
        .iter()
        .find(|(k, _)| k.py_eq(key))
        .map(|(_, v)| v.clone())
}

pub fn dict_set(entries: &DictRef, key: Value, value: Value) -> RuntimeResult<()> {
    check_hashable(&key)?;
    let mut entries = entries.borrow_mut();
    if let Some(slot) = entries.iter_mut().find(|(k, _)| k.py_eq(&key)) {
        slot.1 = value;
    } else {
        entries.push((key, value));
    }
    Ok(())
}

pub fn set_add(items: &crate::runtime::value::ListRef, item: Value) -> RuntimeResult<()> {
    check_hashable(&item)?;
    let mut items = items.borrow_mut();
    if !items.iter().any(|x| x.py_eq(&item)) {
        items.push(item);
    }
    Ok(())
}

fn key_error(key: &Value) -> RuntimeError {
    RuntimeError::KeyError { key: key.repr() }
}

pub fn subscript(value: &Value, index: &Value) -> RuntimeResult<Value> {
    match value {
        Value::List(items) => {
            let items = items.borrow();
            let i = normalize_index(index, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Tuple(items) => {
            let i = normalize_index(index, items.len(), "tuple")?;
            Ok(items[i].clone())
        }
        Value::Str(text) => {
            let count = text.chars().count();
            let i = normalize_index(index, count, "string")?;
            Ok(text
                .chars()
                .nth(i)
                .map(|ch| Value::str(ch.to_string()))
                .unwrap_or(Value::None))
        }
        Value::Bytes(bytes) => {
            let i = normalize_index(index, bytes.len(), "bytes")?;
            Ok(Value::int(bytes[i]))
        }
        Value::Dict(entries) => {
            check_hashable(index)?;
            dict_get(entries, index).ok_or_else(|| key_error(index))
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub fn store_subscript(container: &Value, index: &Value, item: Value) -> RuntimeResult<()> {
    match container {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = normalize_index(index, items.len(), "list assignment")?;
            items[i] = item;
            Ok(())
        }
        Value::Dict(entries) => dict_set(entries, index.clone(), item),
        other => Err(RuntimeError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

pub fn delete_subscript(container: &Value, index: &Value) -> RuntimeResult<()> {
    match container {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = normalize_index(index, items.len(), "list assignment")?;
            items.remove(i);
            Ok(())
        }
        Value::Dict(entries) => {
            check_hashable(index)?;
            let mut entries = entries.borrow_mut();
            let position = entries
                .iter()
                .position(|(k, _)| k.py_eq(index))
                .ok_or_else(|| key_error(index))?;
            entries.remove(position);
            Ok(())
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::int(v)
    }

    #[test]
    fn floor_division_rounds_toward_negative_infinity() {
        let result = binary(BinaryOp::FloorDiv, &int(-7), &int(2)).unwrap();
        assert!(result.py_eq(&int(-4)));
        let result = binary(BinaryOp::Mod, &int(-7), &int(2)).unwrap();
        assert!(result.py_eq(&int(1)));
        let result = binary(BinaryOp::Mod, &Value::Float(-7.0), &Value::Float(2.0)).unwrap();
        assert!(result.py_eq(&Value::Float(1.0)));
    }

    #[test]
    fn true_division_produces_float() {
        let result = binary(BinaryOp::Div, &int(7), &int(2)).unwrap();
        assert!(matches!(result, Value::Float(v) if v == 3.5));
        assert!(matches!(
            binary(BinaryOp::Div, &int(1), &int(0)),
            Err(RuntimeError::ZeroDivision { .. })
        ));
    }

    #[test]
    fn large_powers_stay_exact() {
        let result = binary(BinaryOp::Pow, &int(2), &int(100)).unwrap();
        assert_eq!(result.repr(), "1267650600228229401496703205376");
        let result = binary(BinaryOp::Pow, &int(2), &int(-1)).unwrap();
        assert!(result.py_eq(&Value::Float(0.5)));
    }

    #[test]
    fn mixed_operands_report_type_names() {
        let err = binary(BinaryOp::Add, &int(1), &Value::str("a")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'"
        );
    }

    #[test]
    fn sequences_concatenate_and_repeat() {
        let result = binary(BinaryOp::Add, &Value::str("ab"), &Value::str("c")).unwrap();
        assert_eq!(result.to_string(), "abc");
        let result = binary(BinaryOp::Mul, &int(2), &Value::list(vec![int(1)])).unwrap();
        assert_eq!(result.repr(), "[1, 1]");
    }

    #[test]
    fn chained_membership_and_ordering() {
        let list = Value::list(vec![int(1), int(2)]);
        assert!(compare(CompareOp::In, &int(2), &list).unwrap());
        assert!(compare(CompareOp::NotIn, &int(3), &list).unwrap());
        assert!(compare(CompareOp::Lt, &Value::str("a"), &Value::str("b")).unwrap());
        assert!(compare(CompareOp::Lt, &int(1), &Value::str("b")).is_err());
    }

    #[test]
    fn subscripts_support_negative_indices_and_dict_keys() {
        let list = Value::list(vec![int(1), int(2)]);
        assert!(subscript(&list, &int(-1)).unwrap().py_eq(&int(2)));
        assert!(matches!(
            subscript(&list, &int(2)),
            Err(RuntimeError::IndexError { .. })
        ));
        let dict = Value::Dict(Default::default());
        store_subscript(&dict, &Value::str("k"), int(9)).unwrap();
        assert!(subscript(&dict, &Value::str("k")).unwrap().py_eq(&int(9)));
        assert_eq!(
            subscript(&dict, &Value::str("z")).unwrap_err().to_string(),
            "KeyError: 'z'"
        );
        assert!(store_subscript(&dict, &list, int(1)).is_err());
    }
}
