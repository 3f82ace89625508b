use crate::wire::instruction::Instruction;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while, take_while_m_n},
    character::complete::{anychar, char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{all_consuming, map, map_opt, opt, recognize, value},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReadError {
    #[error("could not parse instruction near `{near}`")]
    Syntax { near: String },
    #[error("unknown instruction `{head}`")]
    UnknownHead { head: String },
    #[error("`{head}` expects {expected}")]
    Arguments {
        head: String,
        expected: &'static str,
    },
}

/// An argument as written by the host, before it is checked against the
/// instruction's signature.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Str(String),
    Int(i64),
    Real(f64),
    Symbol(String),
    List(Vec<Arg>),
}

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

#[derive(Clone)]
enum Piece<'a> {
    Text(&'a str),
    Char(char),
}

/// `\.hh` or `\:hhhh` character code escape.
fn code_escape<'a>(
    prefix: &'static str,
    digits: usize,
) -> impl FnMut(&'a str) -> IResult<&'a str, char> {
    map_opt(
        preceded(
            tag(prefix),
            take_while_m_n(digits, digits, |c: char| c.is_ascii_hexdigit()),
        ),
        |hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
    )
}

/// Host string literal. `\"`, `\\`, `\n`, `\t`, `\r` and the character
/// code escapes `\.hh`/`\:hhhh` are decoded; any other escape, including
/// the host newline escape `\012`, is kept as written.
pub fn parse_string(input: &str) -> IResult<&str, String> {
    let chunk = alt((
        map(is_not("\\\""), Piece::Text),
        value(Piece::Char('"'), tag("\\\"")),
        value(Piece::Char('\\'), tag("\\\\")),
        value(Piece::Char('\n'), tag("\\n")),
        value(Piece::Char('\t'), tag("\\t")),
        value(Piece::Char('\r'), tag("\\r")),
        map(code_escape("\\.", 2), Piece::Char),
        map(code_escape("\\:", 4), Piece::Char),
        map(recognize(pair(char('\\'), anychar)), Piece::Text),
    ));
    delimited(
        char('"'),
        fold_many0(chunk, String::new, |mut acc, piece| {
            match piece {
                Piece::Text(text) => acc.push_str(text),
                Piece::Char(ch) => acc.push(ch),
            }
            acc
        }),
        char('"'),
    )(input)
}

pub fn parse_symbol(input: &str) -> IResult<&str, String> {
    let (input, name) = recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '$'),
        take_while(|c: char| c.is_alphanumeric() || c == '$' || c == '`'),
    ))(input)?;
    Ok((input, name.to_string()))
}

/// Integers and machine reals, including `2.` and `1.5*^-3`.
pub fn parse_number(input: &str) -> IResult<&str, Arg> {
    let (input, mantissa) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit0)),
    )))(input)?;
    let (input, exponent) = opt(preceded(
        tag("*^"),
        recognize(pair(opt(one_of("+-")), digit1)),
    ))(input)?;
    let failure = || nom::Err::Error(nom::error::Error::new(mantissa, nom::error::ErrorKind::Digit));
    if !mantissa.contains('.') && exponent.is_none() {
        let value = mantissa.parse::<i64>().map_err(|_| failure())?;
        return Ok((input, Arg::Int(value)));
    }
    let text = match exponent {
        Some(exponent) => format!("{}e{}", mantissa.trim_end_matches('.'), exponent),
        None => mantissa.trim_end_matches('.').to_string(),
    };
    let value = text.parse::<f64>().map_err(|_| failure())?;
    Ok((input, Arg::Real(value)))
}

pub fn parse_list(input: &str) -> IResult<&str, Vec<Arg>> {
    delimited(
        char('{'),
        separated_list0(char(','), ws(parse_arg)),
        preceded(multispace0, char('}')),
    )(input)
}

pub fn parse_arg(input: &str) -> IResult<&str, Arg> {
    alt((
        map(parse_string, Arg::Str),
        parse_number,
        map(parse_list, Arg::List),
        map(parse_symbol, Arg::Symbol),
    ))(input)
}

/// `Head[arg, ...]` with optional surrounding whitespace.
pub fn parse_call(input: &str) -> IResult<&str, (String, Vec<Arg>)> {
    let (input, _) = multispace0(input)?;
    let (input, head) = parse_symbol(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = delimited(
        char('['),
        separated_list0(char(','), ws(parse_arg)),
        preceded(multispace0, char(']')),
    )(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, (head, args)))
}

pub fn read_instruction(line: &str) -> Result<Instruction, ReadError> {
    let (_, (head, args)) = all_consuming(parse_call)(line).map_err(|err| {
        let near = match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
            nom::Err::Incomplete(_) => "",
        };
        ReadError::Syntax {
            near: near.chars().take(32).collect(),
        }
    })?;
    instruction_from(head, args)
}

fn real_arg(arg: &Arg) -> Option<f64> {
    match arg {
        Arg::Real(v) => Some(*v),
        Arg::Int(v) => Some(*v as f64),
        _ => None,
    }
}

fn instruction_from(head: String, args: Vec<Arg>) -> Result<Instruction, ReadError> {
    let mismatch = |expected: &'static str| ReadError::Arguments {
        head: head.clone(),
        expected,
    };
    let instruction = match (head.as_str(), args.as_slice()) {
        ("PyInteger", [Arg::Str(name), Arg::Int(value)]) => Instruction::BindInteger {
            name: name.clone(),
            value: *value,
        },
        ("PyInteger", _) => return Err(mismatch("a name and an integer")),
        ("PyReal", [Arg::Str(name), number]) => Instruction::BindReal {
            name: name.clone(),
            value: real_arg(number).ok_or_else(|| mismatch("a name and a real"))?,
        },
        ("PyReal", _) => return Err(mismatch("a name and a real")),
        ("PyComplex", [Arg::Str(name), re, im]) => Instruction::BindComplex {
            name: name.clone(),
            re: real_arg(re).ok_or_else(|| mismatch("a name and two reals"))?,
            im: real_arg(im).ok_or_else(|| mismatch("a name and two reals"))?,
        },
        ("PyComplex", _) => return Err(mismatch("a name and two reals")),
        ("PyUnicodeString", [Arg::Str(name), Arg::Str(text)]) => Instruction::BindUnicodeString {
            name: name.clone(),
            units: text.encode_utf16().collect(),
        },
        ("PyUnicodeString", _) => return Err(mismatch("a name and a string")),
        ("PyString", [Arg::Str(name), Arg::List(items)]) => {
            let codepoints = items
                .iter()
                .map(|item| match item {
                    Arg::Int(v) => Some(*v),
                    _ => None,
                })
                .collect::<Option<Vec<i64>>>()
                .ok_or_else(|| mismatch("a name and a list of byte codes"))?;
            Instruction::BindByteString {
                name: name.clone(),
                codepoints,
            }
        }
        ("PyString", _) => return Err(mismatch("a name and a list of byte codes")),
        ("PySymbol", [Arg::Str(name), Arg::Symbol(symbol)]) => Instruction::BindSymbol {
            name: name.clone(),
            symbol: symbol.clone(),
        },
        ("PySymbol", _) => return Err(mismatch("a name and a symbol")),
        ("PyOpenList", [Arg::Str(name)]) => Instruction::OpenList { name: name.clone() },
        ("PyOpenList", _) => return Err(mismatch("a name")),
        ("PyCloseList", []) => Instruction::CloseList,
        ("PyCloseList", _) => return Err(mismatch("no arguments")),
        ("Py", [Arg::Str(source)]) => Instruction::Execute {
            source: source.clone(),
        },
        ("Py", _) => return Err(mismatch("a source string")),
        _ => return Err(ReadError::UnknownHead { head: head.clone() }),
    };
    Ok(instruction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_scalar_binds() {
        assert_eq!(
            read_instruction("PyInteger[\"x\", -5]").unwrap(),
            Instruction::BindInteger {
                name: "x".into(),
                value: -5
            }
        );
        assert_eq!(
            read_instruction("  PyReal[\"r\", 1.5*^3] ").unwrap(),
            Instruction::BindReal {
                name: "r".into(),
                value: 1500.0
            }
        );
        assert_eq!(
            read_instruction("PyComplex[\"z\", 1, 2.]").unwrap(),
            Instruction::BindComplex {
                name: "z".into(),
                re: 1.0,
                im: 2.0
            }
        );
    }

    #[test]
    fn reads_strings_symbols_and_lists() {
        assert_eq!(
            read_instruction("PyString[\"b\", {104, 105}]").unwrap(),
            Instruction::BindByteString {
                name: "b".into(),
                codepoints: vec![104, 105]
            }
        );
        assert_eq!(
            read_instruction("PySymbol[\"t\", True]").unwrap(),
            Instruction::BindSymbol {
                name: "t".into(),
                symbol: "True".into()
            }
        );
        assert_eq!(
            read_instruction("PyOpenList[\"l\"]").unwrap(),
            Instruction::OpenList { name: "l".into() }
        );
        assert_eq!(read_instruction("PyCloseList[]").unwrap(), Instruction::CloseList);
    }

    #[test]
    fn control_characters_survive_the_codec() {
        use crate::wire::WireValue;

        let text = "bell\u{7}, tab\t, del\u{7f} and \"quotes\"\\";
        let written = WireValue::string(text).to_string();
        assert!(written.contains("\\.07") && written.contains("\\.7f"));
        assert_eq!(parse_string(&written), Ok(("", text.to_string())));

        assert_eq!(
            parse_string(r#""\:0394\.41""#),
            Ok(("", "\u{394}A".to_string()))
        );
        assert_eq!(parse_string(r#""\.zz""#), Ok(("", "\\.zz".to_string())));
    }

    #[test]
    fn source_keeps_host_newline_escape() {
        assert_eq!(
            read_instruction(r#"Py["print \"a\"\012x = 1"]"#).unwrap(),
            Instruction::Execute {
                source: "print \"a\"\\012x = 1".into()
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            read_instruction("PyInteger[\"x\""),
            Err(ReadError::Syntax { .. })
        ));
        assert!(matches!(
            read_instruction("PyFoo[]"),
            Err(ReadError::UnknownHead { .. })
        ));
        assert!(matches!(
            read_instruction("PyInteger[\"x\", 1.5]"),
            Err(ReadError::Arguments { .. })
        ));
        assert!(read_instruction("PyInteger[\"x\", 99999999999999999999]").is_err());
    }
}
