use crate::language::ast::FunctionDef;
use crate::runtime::{builtins::Builtin, environment::Namespace};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::thread::LocalKey;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type DictRef = Rc<RefCell<Vec<(Value, Value)>>>;

/// Deepest container nesting `repr` and `py_eq` descend into.
pub const MAX_CONTAINER_DEPTH: usize = 1000;

/// A handle into the interpreter's value space. Containers are shared
/// through `Rc`; dropping the last handle releases the value.
#[derive(Clone, Debug)]
pub enum Value {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Complex(Complex),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    List(ListRef),
    Tuple(Rc<[Value]>),
    /// Insertion ordered, free of duplicates.
    Set(ListRef),
    /// Insertion ordered key/value pairs with unique keys.
    Dict(DictRef),
    Function(Rc<FunctionValue>),
    Builtin(Builtin),
    Method(Rc<BoundMethod>),
    Capture(Rc<CaptureObject>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    pub fn add(self, other: Complex) -> Complex {
        Complex::new(self.re + other.re, self.im + other.im)
    }

    pub fn sub(self, other: Complex) -> Complex {
        Complex::new(self.re - other.re, self.im - other.im)
    }

    pub fn mul(self, other: Complex) -> Complex {
        Complex::new(
            self.re * other.re - self.im * other.im,
            self.re * other.im + self.im * other.re,
        )
    }

    /// `None` on division by zero.
    pub fn div(self, other: Complex) -> Option<Complex> {
        let denom = other.re * other.re + other.im * other.im;
        if denom == 0.0 {
            return None;
        }
        Some(Complex::new(
            (self.re * other.re + self.im * other.im) / denom,
            (self.im * other.re - self.re * other.im) / denom,
        ))
    }

    pub fn abs(self) -> f64 {
        self.re.hypot(self.im)
    }

    pub fn pow(self, exponent: Complex) -> Option<Complex> {
        if self.re == 0.0 && self.im == 0.0 {
            if exponent.re == 0.0 && exponent.im == 0.0 {
                return Some(Complex::new(1.0, 0.0));
            }
            if exponent.im != 0.0 || exponent.re < 0.0 {
                return None;
            }
            return Some(Complex::new(0.0, 0.0));
        }
        let modulus = self.abs().ln();
        let arg = self.im.atan2(self.re);
        let re = exponent.re * modulus - exponent.im * arg;
        let im = exponent.im * modulus + exponent.re * arg;
        let scale = re.exp();
        Some(Complex::new(scale * im.cos(), scale * im.sin()))
    }
}

pub struct FunctionValue {
    pub def: Rc<FunctionDef>,
    pub globals: Namespace,
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.def.name)
    }
}

#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub name: String,
}

/// Stand-in for a standard stream: everything written is appended to
/// `data`, which the host side drains.
#[derive(Debug, Default)]
pub struct CaptureObject {
    data: RefCell<String>,
}

impl CaptureObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, text: &str) {
        self.data.borrow_mut().push_str(text);
    }

    pub fn data(&self) -> String {
        self.data.borrow().clone()
    }

    pub fn set_data(&self, text: String) {
        *self.data.borrow_mut() = text;
    }
}

/// Why no iterator could be produced for a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterError {
    NotIterable,
    /// The container is exclusively borrowed elsewhere.
    Unavailable,
}

impl Value {
    pub fn str(text: impl Into<Rc<str>>) -> Value {
        Value::Str(text.into())
    }

    pub fn int(value: impl Into<BigInt>) -> Value {
        Value::Int(value.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(items.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Complex(_) => "complex",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Method(_) => "method",
            Value::Capture(_) => "Capture",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(v) => !v.is_zero(),
            Value::Float(v) => *v != 0.0,
            Value::Complex(c) => c.re != 0.0 || c.im != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(items) | Value::Set(items) => {
                items.try_borrow().map(|items| !items.is_empty()).unwrap_or(true)
            }
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => entries
                .try_borrow()
                .map(|entries| !entries.is_empty())
                .unwrap_or(true),
            Value::Function(_) | Value::Builtin(_) | Value::Method(_) | Value::Capture(_) => true,
        }
    }

    pub fn is_hashable(&self) -> bool {
        match self {
            Value::List(_) | Value::Set(_) | Value::Dict(_) => false,
            Value::Tuple(items) => items.iter().all(Value::is_hashable),
            _ => true,
        }
    }

    /// Snapshot iteration: the items are copied out so the container can be
    /// mutated while the caller walks them.
    pub fn try_iter(&self) -> Result<std::vec::IntoIter<Value>, IterError> {
        let items: Vec<Value> = match self {
            Value::List(items) | Value::Set(items) => items
                .try_borrow()
                .map_err(|_| IterError::Unavailable)?
                .clone(),
            Value::Tuple(items) => items.to_vec(),
            Value::Dict(entries) => entries
                .try_borrow()
                .map_err(|_| IterError::Unavailable)?
                .iter()
                .map(|(key, _)| key.clone())
                .collect(),
            Value::Str(text) => text
                .chars()
                .map(|ch| Value::str(ch.to_string()))
                .collect(),
            Value::Bytes(bytes) => bytes.iter().map(|b| Value::int(*b)).collect(),
            _ => return Err(IterError::NotIterable),
        };
        Ok(items.into_iter())
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(text) => Some(text.chars().count()),
            Value::Bytes(bytes) => Some(bytes.len()),
            Value::List(items) | Value::Set(items) => items.try_borrow().ok().map(|items| items.len()),
            Value::Tuple(items) => Some(items.len()),
            Value::Dict(entries) => entries.try_borrow().ok().map(|entries| entries.len()),
            _ => None,
        }
    }

    /// Equality with numeric cross-type comparison.
    pub fn py_eq(&self, other: &Value) -> bool {
        if let (Some(left), Some(right)) = (Number::of(self), Number::of(other)) {
            return left.eq(&right);
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => {
                Rc::ptr_eq(a, b) || guarded_eq(addr(a), addr(b), || seq_eq(a, b))
            }
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b)
                    || guarded_eq(addr(a), addr(b), || match (a.try_borrow(), b.try_borrow()) {
                        (Ok(a), Ok(b)) => seq_eq(&a, &b),
                        _ => false,
                    })
            }
            (Value::Set(a), Value::Set(b)) => {
                Rc::ptr_eq(a, b)
                    || guarded_eq(addr(a), addr(b), || match (a.try_borrow(), b.try_borrow()) {
                        (Ok(a), Ok(b)) => {
                            a.len() == b.len()
                                && a.iter().all(|item| b.iter().any(|x| x.py_eq(item)))
                        }
                        _ => false,
                    })
            }
            (Value::Dict(a), Value::Dict(b)) => {
                Rc::ptr_eq(a, b)
                    || guarded_eq(addr(a), addr(b), || match (a.try_borrow(), b.try_borrow()) {
                        (Ok(a), Ok(b)) => {
                            a.len() == b.len()
                                && a.iter().all(|(key, value)| {
                                    b.iter().any(|(k, v)| k.py_eq(key) && v.py_eq(value))
                                })
                        }
                        _ => false,
                    })
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Capture(a), Value::Capture(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering for `<`-style comparisons; `None` when the pair is not
    /// orderable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(left), Some(right)) = (Number::of(self), Number::of(other)) {
            return left.partial_cmp(&right);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Tuple(a), Value::Tuple(b)) => {
                guarded_cmp(addr(a), addr(b), || seq_cmp(a, b))
            }
            (Value::List(a), Value::List(b)) => guarded_cmp(addr(a), addr(b), || {
                let a = a.try_borrow().ok()?;
                let b = b.try_borrow().ok()?;
                seq_cmp(&a, &b)
            }),
            _ => None,
        }
    }

    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".into(),
            Value::Bool(true) => "True".into(),
            Value::Bool(false) => "False".into(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::Complex(c) => format_complex(*c),
            Value::Str(text) => repr_str(text),
            Value::Bytes(bytes) => repr_bytes(bytes),
            Value::List(items) => guarded_repr(addr(items), "[...]", || {
                let items = items.try_borrow().ok()?;
                Some(format!("[{}]", join_repr(items.iter())))
            }),
            Value::Tuple(items) => guarded_repr(addr(items), "(...)", || {
                Some(match &items[..] {
                    [single] => format!("({},)", single.repr()),
                    items => format!("({})", join_repr(items.iter())),
                })
            }),
            Value::Set(items) => guarded_repr(addr(items), "{...}", || {
                let items = items.try_borrow().ok()?;
                Some(if items.is_empty() {
                    "set()".into()
                } else {
                    format!("{{{}}}", join_repr(items.iter()))
                })
            }),
            Value::Dict(entries) => guarded_repr(addr(entries), "{...}", || {
                let entries = entries.try_borrow().ok()?;
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key.repr(), value.repr()))
                    .collect();
                Some(format!("{{{}}}", parts.join(", ")))
            }),
            Value::Function(function) => format!("<function {}>", function.def.name),
            Value::Builtin(builtin) => format!("<built-in function {}>", builtin.name()),
            Value::Method(method) => format!(
                "<built-in method {} of {} object>",
                method.name,
                method.receiver.type_name()
            ),
            Value::Capture(_) => "<Capture object>".into(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(text) => write!(f, "{text}"),
            other => write!(f, "{}", other.repr()),
        }
    }
}

type ActiveSet = RefCell<Vec<(usize, usize)>>;

thread_local! {
    static REPR_ACTIVE: ActiveSet = RefCell::new(Vec::new());
    static EQ_ACTIVE: ActiveSet = RefCell::new(Vec::new());
    static CMP_ACTIVE: ActiveSet = RefCell::new(Vec::new());
}

enum Refused {
    Active,
    TooDeep,
}

/// Marks a container (or container pair) as in progress until dropped.
struct Reentry {
    active: &'static LocalKey<ActiveSet>,
}

impl Reentry {
    fn enter(active: &'static LocalKey<ActiveSet>, key: (usize, usize)) -> Result<Self, Refused> {
        active.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&key) {
                return Err(Refused::Active);
            }
            if stack.len() >= MAX_CONTAINER_DEPTH {
                return Err(Refused::TooDeep);
            }
            stack.push(key);
            Ok(Reentry { active })
        })
    }
}

impl Drop for Reentry {
    fn drop(&mut self) {
        self.active.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn addr<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

/// A container already being rendered higher up renders as `ellipsis`.
fn guarded_repr(key: usize, ellipsis: &str, render: impl FnOnce() -> Option<String>) -> String {
    match Reentry::enter(&REPR_ACTIVE, (key, 0)) {
        Ok(_entered) => render().unwrap_or_else(|| ellipsis.into()),
        Err(_) => ellipsis.into(),
    }
}

/// A pair already being compared higher up counts as equal, so cycles of
/// the same shape compare equal; nesting past the depth cap compares unequal.
fn guarded_eq(left: usize, right: usize, compare: impl FnOnce() -> bool) -> bool {
    match Reentry::enter(&EQ_ACTIVE, (left, right)) {
        Ok(_entered) => compare(),
        Err(Refused::Active) => true,
        Err(Refused::TooDeep) => false,
    }
}

/// Ordering a pair that is already being ordered higher up, or nested past
/// the depth cap, is unsupported.
fn guarded_cmp(
    left: usize,
    right: usize,
    compare: impl FnOnce() -> Option<Ordering>,
) -> Option<Ordering> {
    let _entered = Reentry::enter(&CMP_ACTIVE, (left, right)).ok()?;
    compare()
}

fn seq_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
}

fn seq_cmp(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if x.py_eq(y) {
            continue;
        }
        return x.compare(y);
    }
    Some(a.len().cmp(&b.len()))
}

fn join_repr<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    items.map(Value::repr).collect::<Vec<_>>().join(", ")
}

/// Numeric view used for arithmetic and cross-type comparison. Booleans
/// count as integers.
#[derive(Clone, Debug)]
pub enum Number {
    Int(BigInt),
    Float(f64),
    Complex(Complex),
}

impl Number {
    pub fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Bool(b) => Some(Number::Int(BigInt::from(*b as u8))),
            Value::Int(v) => Some(Number::Int(v.clone())),
            Value::Float(v) => Some(Number::Float(*v)),
            Value::Complex(c) => Some(Number::Complex(*c)),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Int(v) => v.to_f64().unwrap_or(f64::INFINITY),
            Number::Float(v) => *v,
            Number::Complex(c) => c.re,
        }
    }

    pub fn to_complex(&self) -> Complex {
        match self {
            Number::Complex(c) => *c,
            other => Complex::new(other.to_f64(), 0.0),
        }
    }

    fn eq(&self, other: &Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::Complex(_), _) | (_, Number::Complex(_)) => {
                self.to_complex() == other.to_complex()
            }
            _ => self.to_f64() == other.to_f64(),
        }
    }

    fn partial_cmp(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            (Number::Complex(_), _) | (_, Number::Complex(_)) => None,
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }
}

/// Formats a float the way the interpreter's `repr` does: shortest
/// round-trip digits, always marked as a float, exponent form outside
/// `1e-4 ..= 1e16`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", value);
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }
    let formatted = format!("{}", value);
    if formatted.contains('.') {
        formatted
    } else {
        format!("{formatted}.0")
    }
}

fn format_complex_part(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{}", value as i64)
    } else {
        format_float(value)
    }
}

pub fn format_complex(value: Complex) -> String {
    let imag = format_complex_part(value.im);
    if value.re == 0.0 && value.re.is_sign_positive() {
        return format!("{imag}j");
    }
    let sign = if value.im < 0.0 || (value.im == 0.0 && value.im.is_sign_negative()) {
        ""
    } else {
        "+"
    };
    format!("({}{}{}j)", format_complex_part(value.re), sign, imag)
}

fn repr_str(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch == quote => {
                out.push('\\');
                out.push(ch);
            }
            ch if (ch as u32) < 0x20 || ch as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", ch as u32));
            }
            ch => out.push(ch),
        }
    }
    out.push(quote);
    out
}

fn repr_bytes(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    let mut out = String::from("b");
    out.push(quote as char);
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            byte if byte == quote => {
                out.push('\\');
                out.push(byte as char);
            }
            0x20..=0x7e => out.push(byte as char),
            byte => out.push_str(&format!("\\x{:02x}", byte)),
        }
    }
    out.push(quote as char);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_repr_matches_interpreter_conventions() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn complex_repr() {
        assert_eq!(format_complex(Complex::new(1.0, 2.0)), "(1+2j)");
        assert_eq!(format_complex(Complex::new(0.0, 2.0)), "2j");
        assert_eq!(format_complex(Complex::new(1.5, -0.5)), "(1.5-0.5j)");
    }

    #[test]
    fn container_reprs() {
        let value = Value::tuple(vec![Value::int(1)]);
        assert_eq!(value.repr(), "(1,)");
        let value = Value::list(vec![Value::str("a'b"), Value::None]);
        assert_eq!(value.repr(), "[\"a'b\", None]");
        assert_eq!(Value::Bytes(b"a\x00".to_vec().into()).repr(), "b'a\\x00'");
    }

    #[test]
    fn numbers_compare_across_types() {
        assert!(Value::Bool(true).py_eq(&Value::int(1)));
        assert!(Value::int(2).py_eq(&Value::Float(2.0)));
        assert_eq!(
            Value::int(1).compare(&Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::int(1).compare(&Value::str("a")), None);
    }

    fn self_containing_list() -> ListRef {
        let items: ListRef = Rc::new(RefCell::new(Vec::new()));
        items.borrow_mut().push(Value::List(items.clone()));
        items
    }

    #[test]
    fn cyclic_containers_repr_with_ellipsis() {
        let items = self_containing_list();
        assert_eq!(Value::List(items.clone()).repr(), "[[...]]");

        let entries: DictRef = Rc::new(RefCell::new(Vec::new()));
        entries
            .borrow_mut()
            .push((Value::str("k"), Value::Dict(entries.clone())));
        let value = Value::tuple(vec![Value::Dict(entries.clone()), Value::List(items.clone())]);
        assert_eq!(value.repr(), "({'k': {...}}, [[...]])");

        items.borrow_mut().clear();
        entries.borrow_mut().clear();
    }

    #[test]
    fn distinct_cycles_of_the_same_shape_are_equal() {
        let a = self_containing_list();
        let b = self_containing_list();
        assert!(Value::List(a.clone()).py_eq(&Value::List(b.clone())));
        assert!(!Value::List(a.clone()).py_eq(&Value::list(vec![Value::int(1)])));

        a.borrow_mut().push(Value::int(1));
        b.borrow_mut().push(Value::int(2));
        assert_eq!(Value::List(a.clone()).compare(&Value::List(b.clone())), None);
        a.borrow_mut().clear();
        b.borrow_mut().clear();
    }

    #[test]
    fn deep_nesting_is_cut_off() {
        crate::tests::with_session_stack(|| {
            let build = || {
                let mut value = Value::list(Vec::new());
                for _ in 0..MAX_CONTAINER_DEPTH + 50 {
                    value = Value::list(vec![value]);
                }
                value
            };
            let (left, right) = (build(), build());
            let text = left.repr();
            assert!(text.starts_with("[[[["));
            assert!(text.contains("[...]"));
            assert!(!left.py_eq(&right));
            assert!(left.py_eq(&left));
        });
    }

    #[test]
    fn exclusively_borrowed_list_has_no_iterator() {
        let items: ListRef = Rc::new(RefCell::new(vec![Value::int(1)]));
        let value = Value::List(items.clone());
        let guard = items.borrow_mut();
        assert_eq!(value.try_iter().unwrap_err(), IterError::Unavailable);
        drop(guard);
        assert_eq!(value.try_iter().map(|it| it.count()), Ok(1));
    }
}
