use std::fmt;

/// A host-side expression. Compound expressions are a head applied to
/// arguments, which is how lists and `ToExpression[...]` travel.
#[derive(Clone, Debug, PartialEq)]
pub enum WireValue {
    Integer(i64),
    Real(f64),
    Complex { re: f64, im: f64 },
    ByteString(Vec<u8>),
    UnicodeString(String),
    Symbol(String),
    Function { head: String, args: Vec<WireValue> },
}

impl WireValue {
    pub fn null() -> Self {
        WireValue::Symbol("Null".into())
    }

    pub fn boolean(value: bool) -> Self {
        WireValue::Symbol(if value { "True" } else { "False" }.into())
    }

    pub fn string(text: impl Into<String>) -> Self {
        WireValue::UnicodeString(text.into())
    }

    pub fn function(head: impl Into<String>, args: Vec<WireValue>) -> Self {
        WireValue::Function {
            head: head.into(),
            args,
        }
    }

    /// `List[Sequence[items...]]`
    pub fn list_sequence(items: Vec<WireValue>) -> Self {
        Self::function("List", vec![Self::function("Sequence", items)])
    }

    /// `ToExpression["text"]`, used for integers beyond 64 bits.
    pub fn to_expression(text: impl Into<String>) -> Self {
        Self::function("ToExpression", vec![Self::string(text)])
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Symbol(name) if name == "Null")
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Integer(v) => write!(f, "{v}"),
            WireValue::Real(v) => f.write_str(&format_real(*v)),
            WireValue::Complex { re, im } => {
                write!(f, "Complex[{}, {}]", format_real(*re), format_real(*im))
            }
            WireValue::ByteString(bytes) => {
                f.write_str("\"")?;
                for &byte in bytes {
                    write_char(f, byte as char, byte >= 0x80)?;
                }
                f.write_str("\"")
            }
            WireValue::UnicodeString(text) => {
                f.write_str("\"")?;
                for ch in text.chars() {
                    write_char(f, ch, false)?;
                }
                f.write_str("\"")
            }
            WireValue::Symbol(name) => f.write_str(name),
            WireValue::Function { head, args } => {
                write!(f, "{head}[")?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
        }
    }
}

fn write_char(f: &mut fmt::Formatter<'_>, ch: char, raw_byte: bool) -> fmt::Result {
    match ch {
        '"' => f.write_str("\\\""),
        '\\' => f.write_str("\\\\"),
        '\n' => f.write_str("\\n"),
        '\t' => f.write_str("\\t"),
        '\r' => f.write_str("\\r"),
        ch if raw_byte || ch.is_control() => {
            let code = ch as u32;
            if code <= 0xff {
                write!(f, "\\.{:02x}", code)
            } else {
                write!(f, "\\:{:04x}", code)
            }
        }
        ch => write!(f, "{ch}"),
    }
}

/// Machine reals in host input form: a trailing `.` marks integral values
/// and exponents use `*^`.
pub fn format_real(value: f64) -> String {
    if value.is_nan() {
        return "Indeterminate".into();
    }
    if value.is_infinite() {
        return if value > 0.0 {
            "DirectedInfinity[1]".into()
        } else {
            "DirectedInfinity[-1]".into()
        };
    }
    let magnitude = value.abs();
    if magnitude == 0.0 || (1e-5..1e15).contains(&magnitude) {
        let text = format!("{}", value);
        return if text.contains('.') { text } else { format!("{text}.") };
    }
    let text = format!("{:e}", value);
    match text.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{mantissa}*^{exponent}"),
        Some((mantissa, exponent)) => format!("{mantissa}.*^{exponent}"),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reals_use_host_notation() {
        assert_eq!(format_real(2.0), "2.");
        assert_eq!(format_real(-0.25), "-0.25");
        assert_eq!(format_real(1.5e20), "1.5*^20");
        assert_eq!(format_real(1e-7), "1.*^-7");
        assert_eq!(format_real(f64::INFINITY), "DirectedInfinity[1]");
    }

    #[test]
    fn nested_lists_render_as_sequences() {
        let value = WireValue::list_sequence(vec![
            WireValue::Integer(1),
            WireValue::list_sequence(vec![WireValue::boolean(true)]),
            WireValue::Complex { re: 1.0, im: -2.5 },
        ]);
        assert_eq!(
            value.to_string(),
            "List[Sequence[1, List[Sequence[True]], Complex[1., -2.5]]]"
        );
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(WireValue::string("a\"b\n").to_string(), "\"a\\\"b\\n\"");
        assert_eq!(
            WireValue::ByteString(vec![b'h', 0, 0xff]).to_string(),
            "\"h\\.00\\.ff\""
        );
        assert_eq!(
            WireValue::to_expression("123").to_string(),
            "ToExpression[\"123\"]"
        );
    }
}
