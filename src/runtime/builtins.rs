use crate::language::ast::BinaryOp;
use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    ops,
    value::{Complex, IterError, Number, Value},
};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

const MAX_RANGE_ITEMS: usize = 1 << 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Str,
    Repr,
    Int,
    Float,
    Complex,
    Bool,
    List,
    Tuple,
    Set,
    Dict,
    Range,
    Abs,
    Sum,
    Min,
    Max,
    Sorted,
}

const ALL: [Builtin; 17] = [
    Builtin::Len,
    Builtin::Str,
    Builtin::Repr,
    Builtin::Int,
    Builtin::Float,
    Builtin::Complex,
    Builtin::Bool,
    Builtin::List,
    Builtin::Tuple,
    Builtin::Set,
    Builtin::Dict,
    Builtin::Range,
    Builtin::Abs,
    Builtin::Sum,
    Builtin::Min,
    Builtin::Max,
    Builtin::Sorted,
];

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        ALL.iter().copied().find(|builtin| builtin.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Repr => "repr",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Complex => "complex",
            Builtin::Bool => "bool",
            Builtin::List => "list",
            Builtin::Tuple => "tuple",
            Builtin::Set => "set",
            Builtin::Dict => "dict",
            Builtin::Range => "range",
            Builtin::Abs => "abs",
            Builtin::Sum => "sum",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sorted => "sorted",
        }
    }

    pub fn call(self, args: Vec<Value>) -> RuntimeResult<Value> {
        let name = self.name();
        match self {
            Builtin::Len => {
                let [value] = exact::<1>(name, args)?;
                value.len().map(Value::int).ok_or_else(|| {
                    RuntimeError::type_error(format!(
                        "object of type '{}' has no len()",
                        value.type_name()
                    ))
                })
            }
            Builtin::Str => match optional(name, args)? {
                Some(value) => Ok(Value::str(value.to_string())),
                None => Ok(Value::str("")),
            },
            Builtin::Repr => {
                let [value] = exact::<1>(name, args)?;
                Ok(Value::str(value.repr()))
            }
            Builtin::Int => to_int(args),
            Builtin::Float => match optional(name, args)? {
                Some(value) => to_float(&value),
                None => Ok(Value::Float(0.0)),
            },
            Builtin::Complex => to_complex(args),
            Builtin::Bool => Ok(Value::Bool(
                optional(name, args)?.map(|v| v.truthy()).unwrap_or(false),
            )),
            Builtin::List => match optional(name, args)? {
                Some(value) => Ok(Value::list(collect(&value)?)),
                None => Ok(Value::list(Vec::new())),
            },
            Builtin::Tuple => match optional(name, args)? {
                Some(value) => Ok(Value::tuple(collect(&value)?)),
                None => Ok(Value::tuple(Vec::new())),
            },
            Builtin::Set => {
                let set = Rc::new(RefCell::new(Vec::new()));
                if let Some(value) = optional(name, args)? {
                    for item in collect(&value)? {
                        ops::set_add(&set, item)?;
                    }
                }
                Ok(Value::Set(set))
            }
            Builtin::Dict => to_dict(optional(name, args)?),
            Builtin::Range => range(args),
            Builtin::Abs => {
                let [value] = exact::<1>(name, args)?;
                match Number::of(&value) {
                    Some(Number::Int(v)) => Ok(Value::Int(v.abs())),
                    Some(Number::Float(v)) => Ok(Value::Float(v.abs())),
                    Some(Number::Complex(c)) => Ok(Value::Float(c.abs())),
                    None => Err(RuntimeError::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        value.type_name()
                    ))),
                }
            }
            Builtin::Sum => {
                if args.is_empty() || args.len() > 2 {
                    return Err(arity(name, "1 or 2", args.len()));
                }
                let mut args = args.into_iter();
                let iterable = args.next().unwrap_or(Value::None);
                let mut total = args.next().unwrap_or_else(|| Value::int(0));
                if matches!(total, Value::Str(_)) {
                    return Err(RuntimeError::type_error(
                        "sum() can't sum strings [use ''.join(seq) instead]",
                    ));
                }
                for item in collect(&iterable)? {
                    total = ops::binary(BinaryOp::Add, &total, &item)?;
                }
                Ok(total)
            }
            Builtin::Min => extreme(name, args, Ordering::Less),
            Builtin::Max => extreme(name, args, Ordering::Greater),
            Builtin::Sorted => {
                let [value] = exact::<1>(name, args)?;
                let mut items = collect(&value)?;
                sort_values(&mut items)?;
                Ok(Value::list(items))
            }
        }
    }
}

fn arity(name: &str, expected: &str, given: usize) -> RuntimeError {
    RuntimeError::type_error(format!(
        "{}() takes {} argument(s) ({} given)",
        name, expected, given
    ))
}

pub(crate) fn exact<const N: usize>(name: &str, args: Vec<Value>) -> RuntimeResult<[Value; N]> {
    let given = args.len();
    args.try_into()
        .map_err(|_| arity(name, &format!("exactly {}", N), given))
}

fn optional(name: &str, args: Vec<Value>) -> RuntimeResult<Option<Value>> {
    if args.len() > 1 {
        return Err(arity(name, "at most 1", args.len()));
    }
    Ok(args.into_iter().next())
}

/// Materializes an iterable into a vector of items.
pub fn collect(value: &Value) -> RuntimeResult<Vec<Value>> {
    value
        .try_iter()
        .map(Iterator::collect)
        .map_err(|err| match err {
            IterError::NotIterable => RuntimeError::type_error(format!(
                "'{}' object is not iterable",
                value.type_name()
            )),
            IterError::Unavailable => RuntimeError::Runtime {
                message: format!("{} changed size during iteration", value.type_name()),
            },
        })
}

fn to_int(args: Vec<Value>) -> RuntimeResult<Value> {
    if args.len() > 2 {
        return Err(arity("int", "at most 2", args.len()));
    }
    let mut args = args.into_iter();
    let Some(value) = args.next() else {
        return Ok(Value::int(0));
    };
    let radix = match args.next() {
        Some(base) => match Number::of(&base) {
            Some(Number::Int(v)) => v
                .to_u32()
                .filter(|r| (2..=36).contains(r))
                .ok_or_else(|| RuntimeError::value_error("int() base must be >= 2 and <= 36"))?,
            _ => return Err(RuntimeError::type_error("an integer is required")),
        },
        None => 10,
    };
    match (&value, Number::of(&value)) {
        (Value::Str(text), _) => parse_int(text, radix),
        (_, Some(_)) if radix != 10 => Err(RuntimeError::type_error(
            "int() can't convert non-string with explicit base",
        )),
        (_, Some(Number::Int(v))) => Ok(Value::Int(v)),
        (_, Some(Number::Float(v))) => float_to_int(v),
        (_, Some(Number::Complex(_))) => {
            Err(RuntimeError::type_error("can't convert complex to int"))
        }
        _ => Err(RuntimeError::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            value.type_name()
        ))),
    }
}

fn parse_int(text: &str, radix: u32) -> RuntimeResult<Value> {
    let cleaned = text.trim().replace('_', "");
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let digits = match radix {
        16 => digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits),
        _ => digits,
    };
    BigInt::parse_bytes(digits.as_bytes(), radix)
        .map(|v| Value::Int(if negative { -v } else { v }))
        .ok_or_else(|| {
            RuntimeError::value_error(format!(
                "invalid literal for int() with base {}: {}",
                radix,
                Value::str(text).repr()
            ))
        })
}

fn float_to_int(value: f64) -> RuntimeResult<Value> {
    if value.is_nan() {
        return Err(RuntimeError::value_error("cannot convert float NaN to integer"));
    }
    if value.is_infinite() {
        return Err(RuntimeError::Overflow {
            message: "cannot convert float infinity to integer".into(),
        });
    }
    BigInt::from_f64(value.trunc())
        .map(Value::Int)
        .ok_or_else(|| RuntimeError::value_error("cannot convert float to integer"))
}

fn to_float(value: &Value) -> RuntimeResult<Value> {
    match (value, Number::of(value)) {
        (Value::Str(text), _) => parse_float(text).map(Value::Float),
        (_, Some(Number::Complex(_))) => {
            Err(RuntimeError::type_error("can't convert complex to float"))
        }
        (_, Some(Number::Int(v))) => v.to_f64().filter(|f| f.is_finite()).map(Value::Float).ok_or_else(
            || RuntimeError::Overflow {
                message: "int too large to convert to float".into(),
            },
        ),
        (_, Some(number)) => Ok(Value::Float(number.to_f64())),
        _ => Err(RuntimeError::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            value.type_name()
        ))),
    }
}

fn parse_float(text: &str) -> RuntimeResult<f64> {
    text.trim().replace('_', "").parse::<f64>().map_err(|_| {
        RuntimeError::value_error(format!(
            "could not convert string to float: {}",
            Value::str(text).repr()
        ))
    })
}

fn to_complex(args: Vec<Value>) -> RuntimeResult<Value> {
    if args.len() > 2 {
        return Err(arity("complex", "at most 2", args.len()));
    }
    let mut parts = [Complex::new(0.0, 0.0); 2];
    for (slot, value) in parts.iter_mut().zip(args.iter()) {
        *slot = match Number::of(value) {
            Some(Number::Int(v)) => Complex::new(
                v.to_f64().ok_or_else(|| RuntimeError::Overflow {
                    message: "int too large to convert to float".into(),
                })?,
                0.0,
            ),
            Some(number) => number.to_complex(),
            None => {
                return Err(RuntimeError::type_error(format!(
                    "complex() argument must be a number, not '{}'",
                    value.type_name()
                )))
            }
        };
    }
    let [real, imag] = parts;
    Ok(Value::Complex(Complex::new(
        real.re - imag.im,
        real.im + imag.re,
    )))
}

fn to_dict(source: Option<Value>) -> RuntimeResult<Value> {
    let dict: crate::runtime::value::DictRef = Rc::new(RefCell::new(Vec::new()));
    match source {
        None => {}
        Some(Value::Dict(entries)) => {
            let snapshot = entries.borrow().clone();
            for (key, value) in snapshot {
                ops::dict_set(&dict, key, value)?;
            }
        }
        Some(iterable) => {
            for (position, item) in collect(&iterable)?.into_iter().enumerate() {
                let pair = collect(&item)?;
                let [key, value]: [Value; 2] = pair.try_into().map_err(|pair: Vec<Value>| {
                    RuntimeError::value_error(format!(
                        "dictionary update sequence element #{} has length {}; 2 is required",
                        position,
                        pair.len()
                    ))
                })?;
                ops::dict_set(&dict, key, value)?;
            }
        }
    }
    Ok(Value::Dict(dict))
}

fn range_bound(value: &Value) -> RuntimeResult<i64> {
    match Number::of(value) {
        Some(Number::Int(v)) => v.to_i64().ok_or_else(|| RuntimeError::Overflow {
            message: "range() argument too large".into(),
        }),
        _ => Err(RuntimeError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))),
    }
}

/// `range` materializes its items as a list.
fn range(args: Vec<Value>) -> RuntimeResult<Value> {
    let bounds = args
        .iter()
        .map(range_bound)
        .collect::<RuntimeResult<Vec<i64>>>()?;
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(arity("range", "1 to 3", args.len())),
    };
    if step == 0 {
        return Err(RuntimeError::value_error("range() arg 3 must not be zero"));
    }
    let span = if step > 0 {
        (stop as i128 - start as i128 + step as i128 - 1) / step as i128
    } else {
        (start as i128 - stop as i128 - step as i128 - 1) / (-(step as i128))
    };
    let count = span.max(0) as usize;
    if count > MAX_RANGE_ITEMS {
        return Err(RuntimeError::Overflow {
            message: "range() result has too many items".into(),
        });
    }
    let items = (0..count)
        .map(|i| Value::int(start as i128 + i as i128 * step as i128))
        .collect();
    Ok(Value::list(items))
}

fn extreme(name: &str, args: Vec<Value>, wanted: Ordering) -> RuntimeResult<Value> {
    let items = match args.len() {
        0 => return Err(arity(name, "at least 1", 0)),
        1 => collect(&args[0])?,
        _ => args,
    };
    let mut items = items.into_iter();
    let mut best = items.next().ok_or_else(|| {
        RuntimeError::value_error(format!("{}() arg is an empty sequence", name))
    })?;
    for item in items {
        if ordering(&item, &best)? == wanted {
            best = item;
        }
    }
    Ok(best)
}

fn ordering(left: &Value, right: &Value) -> RuntimeResult<Ordering> {
    if left.py_eq(right) {
        return Ok(Ordering::Equal);
    }
    left.compare(right).ok_or_else(|| {
        RuntimeError::type_error(format!(
            "'<' not supported between instances of '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))
    })
}

pub fn sort_values(items: &mut [Value]) -> RuntimeResult<()> {
    let mut failure = None;
    items.sort_by(|a, b| match ordering(a, b) {
        Ok(order) => order,
        Err(err) => {
            failure.get_or_insert(err);
            Ordering::Equal
        }
    });
    failure.map_or(Ok(()), Err)
}

const LIST_METHODS: &[&str] = &["append", "extend", "pop"];
const DICT_METHODS: &[&str] = &["keys", "values", "items", "get"];
const SET_METHODS: &[&str] = &["add"];
const STR_METHODS: &[&str] = &["upper", "lower", "strip", "split", "join", "encode"];
const BYTES_METHODS: &[&str] = &["decode"];
const CAPTURE_METHODS: &[&str] = &["write"];

pub fn has_method(receiver: &Value, name: &str) -> bool {
    let table = match receiver {
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Set(_) => SET_METHODS,
        Value::Str(_) => STR_METHODS,
        Value::Bytes(_) => BYTES_METHODS,
        Value::Capture(_) => CAPTURE_METHODS,
        _ => return false,
    };
    table.contains(&name)
}

pub fn call_method(receiver: &Value, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
    match (receiver, name) {
        (Value::List(items), "append") => {
            let [item] = exact::<1>(name, args)?;
            items.borrow_mut().push(item);
            Ok(Value::None)
        }
        (Value::List(items), "extend") => {
            let [iterable] = exact::<1>(name, args)?;
            let extra = collect(&iterable)?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        (Value::List(items), "pop") => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(RuntimeError::index_error("pop from empty list"));
            }
            let position = match optional(name, args)? {
                None => items.len() - 1,
                Some(index) => {
                    let len = items.len() as i64;
                    let raw = match Number::of(&index) {
                        Some(Number::Int(v)) => v.to_i64().unwrap_or(i64::MAX),
                        _ => {
                            return Err(RuntimeError::type_error(format!(
                                "'{}' object cannot be interpreted as an integer",
                                index.type_name()
                            )))
                        }
                    };
                    let resolved = if raw < 0 { raw + len } else { raw };
                    if !(0..len).contains(&resolved) {
                        return Err(RuntimeError::index_error("pop index out of range"));
                    }
                    resolved as usize
                }
            };
            Ok(items.remove(position))
        }
        (Value::Dict(entries), "keys" | "values" | "items") => {
            exact::<0>(name, args)?;
            let entries = entries.borrow();
            let items = entries
                .iter()
                .map(|(key, value)| match name {
                    "keys" => key.clone(),
                    "values" => value.clone(),
                    _ => Value::tuple(vec![key.clone(), value.clone()]),
                })
                .collect();
            Ok(Value::list(items))
        }
        (Value::Dict(entries), "get") => {
            if args.is_empty() || args.len() > 2 {
                return Err(arity(name, "1 or 2", args.len()));
            }
            let mut args = args.into_iter();
            let key = args.next().unwrap_or(Value::None);
            let fallback = args.next().unwrap_or(Value::None);
            ops::check_hashable(&key)?;
            Ok(ops::dict_get(entries, &key).unwrap_or(fallback))
        }
        (Value::Set(items), "add") => {
            let [item] = exact::<1>(name, args)?;
            ops::set_add(items, item)?;
            Ok(Value::None)
        }
        (Value::Str(text), "upper") => {
            exact::<0>(name, args)?;
            Ok(Value::str(text.to_uppercase()))
        }
        (Value::Str(text), "lower") => {
            exact::<0>(name, args)?;
            Ok(Value::str(text.to_lowercase()))
        }
        (Value::Str(text), "strip") => match optional(name, args)? {
            None | Some(Value::None) => Ok(Value::str(text.trim())),
            Some(Value::Str(chars)) => {
                Ok(Value::str(text.trim_matches(|ch| chars.contains(ch))))
            }
            Some(other) => Err(RuntimeError::type_error(format!(
                "strip arg must be None or str, not {}",
                other.type_name()
            ))),
        },
        (Value::Str(text), "split") => {
            let parts: Vec<Value> = match optional(name, args)? {
                None | Some(Value::None) => text.split_whitespace().map(Value::str).collect(),
                Some(Value::Str(sep)) if sep.is_empty() => {
                    return Err(RuntimeError::value_error("empty separator"))
                }
                Some(Value::Str(sep)) => text.split(&*sep).map(Value::str).collect(),
                Some(other) => {
                    return Err(RuntimeError::type_error(format!(
                        "must be str or None, not {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::list(parts))
        }
        (Value::Str(sep), "join") => {
            let [iterable] = exact::<1>(name, args)?;
            let mut pieces = Vec::new();
            for (position, item) in collect(&iterable)?.into_iter().enumerate() {
                match item {
                    Value::Str(piece) => pieces.push(piece),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            position,
                            other.type_name()
                        )))
                    }
                }
            }
            let pieces: Vec<&str> = pieces.iter().map(|piece| &**piece).collect();
            Ok(Value::str(pieces.join(&**sep)))
        }
        (Value::Str(text), "encode") => {
            check_encoding(optional(name, args)?)?;
            Ok(Value::Bytes(text.as_bytes().into()))
        }
        (Value::Bytes(bytes), "decode") => {
            check_encoding(optional(name, args)?)?;
            std::str::from_utf8(bytes)
                .map(Value::str)
                .map_err(|err| {
                    RuntimeError::value_error(format!(
                        "'utf-8' codec can't decode byte at position {}",
                        err.valid_up_to()
                    ))
                })
        }
        (Value::Capture(capture), "write") => {
            let [text] = exact::<1>(name, args)?;
            match text {
                Value::Str(text) => {
                    capture.write(&text);
                    Ok(Value::None)
                }
                other => Err(RuntimeError::type_error(format!(
                    "write() argument must be str, not {}",
                    other.type_name()
                ))),
            }
        }
        _ => Err(RuntimeError::AttributeError {
            message: format!(
                "'{}' object has no attribute '{}'",
                receiver.type_name(),
                name
            ),
        }),
    }
}

fn check_encoding(encoding: Option<Value>) -> RuntimeResult<()> {
    match encoding {
        None => Ok(()),
        Some(Value::Str(name))
            if matches!(
                name.to_ascii_lowercase().replace('_', "-").as_str(),
                "utf-8" | "utf8"
            ) =>
        {
            Ok(())
        }
        Some(Value::Str(name)) => Err(RuntimeError::value_error(format!(
            "unknown encoding: {}",
            name
        ))),
        Some(other) => Err(RuntimeError::type_error(format!(
            "encoding must be str, not {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        Builtin::lookup(name).expect("known builtin").call(args)
    }

    #[test]
    fn range_materializes_a_list() {
        let value = call("range", vec![Value::int(5), Value::int(0), Value::int(-2)]).unwrap();
        assert_eq!(value.repr(), "[5, 3, 1]");
        assert_eq!(call("range", vec![Value::int(0)]).unwrap().repr(), "[]");
        assert!(call("range", vec![Value::int(1), Value::int(2), Value::int(0)]).is_err());
    }

    #[test]
    fn int_parses_strings_and_truncates_floats() {
        assert_eq!(call("int", vec![Value::str(" -42 ")]).unwrap().repr(), "-42");
        assert_eq!(
            call("int", vec![Value::str("ff"), Value::int(16)]).unwrap().repr(),
            "255"
        );
        assert_eq!(call("int", vec![Value::Float(-2.7)]).unwrap().repr(), "-2");
        let err = call("int", vec![Value::str("x")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ValueError: invalid literal for int() with base 10: 'x'"
        );
    }

    #[test]
    fn float_accepts_special_values() {
        assert!(matches!(
            call("float", vec![Value::str("inf")]),
            Ok(Value::Float(v)) if v.is_infinite()
        ));
        assert!(call("float", vec![Value::str("abc")]).is_err());
        assert!(matches!(
            call("float", vec![Value::str("1e3")]),
            Ok(Value::Float(v)) if v == 1000.0
        ));
    }

    #[test]
    fn aggregates() {
        let items = Value::list(vec![Value::int(3), Value::int(1), Value::int(2)]);
        assert_eq!(call("sum", vec![items.clone()]).unwrap().repr(), "6");
        assert_eq!(call("min", vec![items.clone()]).unwrap().repr(), "1");
        assert_eq!(
            call("max", vec![Value::int(4), Value::int(9)]).unwrap().repr(),
            "9"
        );
        assert_eq!(call("sorted", vec![items]).unwrap().repr(), "[1, 2, 3]");
        let mixed = Value::list(vec![Value::int(1), Value::str("a")]);
        assert!(call("sorted", vec![mixed]).is_err());
    }

    #[test]
    fn dict_from_pairs_keeps_insertion_order() {
        let pairs = Value::list(vec![
            Value::tuple(vec![Value::str("b"), Value::int(1)]),
            Value::tuple(vec![Value::str("a"), Value::int(2)]),
        ]);
        let dict = call("dict", vec![pairs]).unwrap();
        assert_eq!(dict.repr(), "{'b': 1, 'a': 2}");
        let keys = call_method(&dict, "keys", Vec::new()).unwrap();
        assert_eq!(keys.repr(), "['b', 'a']");
    }

    #[test]
    fn string_methods() {
        let text = Value::str("  a b  ");
        assert_eq!(call_method(&text, "strip", vec![]).unwrap().repr(), "'a b'");
        assert_eq!(
            call_method(&text, "split", vec![]).unwrap().repr(),
            "['a', 'b']"
        );
        let joined = call_method(
            &Value::str("-"),
            "join",
            vec![Value::list(vec![Value::str("x"), Value::str("y")])],
        )
        .unwrap();
        assert_eq!(joined.repr(), "'x-y'");
        let bytes = call_method(&Value::str("hi"), "encode", vec![]).unwrap();
        assert_eq!(bytes.repr(), "b'hi'");
    }

    #[test]
    fn list_pop_reports_empty_list() {
        let list = Value::list(vec![Value::int(1)]);
        assert_eq!(call_method(&list, "pop", vec![]).unwrap().repr(), "1");
        assert_eq!(
            call_method(&list, "pop", vec![]).unwrap_err().to_string(),
            "IndexError: pop from empty list"
        );
    }

    #[test]
    fn unknown_method_is_attribute_error() {
        let err = call_method(&Value::int(1), "append", vec![]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "AttributeError: 'int' object has no attribute 'append'"
        );
    }
}
