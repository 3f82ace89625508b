use crate::bridge::{ExecutionOutcome, Session};
use crate::config::BridgeConfig;
use crate::runtime::value::Value;
use crate::tests::with_session_stack;
use crate::wire::{read_instruction, WireValue};

fn int(v: i64) -> WireValue {
    WireValue::Integer(v)
}

fn feed(session: &mut Session, line: &str) -> WireValue {
    let instruction = read_instruction(line).expect("instruction parses");
    session.handle(instruction)
}

#[test]
fn scalars_round_trip_through_bindings() {
    let mut session = Session::default();
    assert!(session.bind_integer("i", -12).is_null());
    assert!(session.bind_real("r", 0.25).is_null());
    assert!(session.bind_complex("z", 1.0, -1.0).is_null());
    assert!(session.bind_symbol("t", "True").is_null());
    assert!(session.bind_symbol("n", "Null").is_null());
    let units: Vec<u16> = "caf\u{e9}".encode_utf16().collect();
    assert!(session.bind_unicode_string("s", &units).is_null());
    assert!(session.bind_byte_string("b", &[104, 105, 0], 3).is_null());

    assert_eq!(session.run("i"), int(-12));
    assert_eq!(session.run("r"), WireValue::Real(0.25));
    assert_eq!(session.run("z"), WireValue::Complex { re: 1.0, im: -1.0 });
    assert_eq!(session.run("t"), WireValue::boolean(true));
    assert_eq!(session.run("n"), WireValue::null());
    assert_eq!(session.run("s"), WireValue::string("caf\u{e9}"));
    assert_eq!(session.run("b"), WireValue::ByteString(vec![104, 105, 0]));
}

#[test]
fn big_integers_come_back_as_decimal_text() {
    let mut session = Session::default();
    assert_eq!(
        session.run("2 ** 70"),
        WireValue::to_expression("1180591620717411303424")
    );
    assert_eq!(session.run("-(2 ** 63)"), int(i64::MIN));
}

#[test]
fn rejected_symbol_makes_no_binding() {
    let mut session = Session::default();
    let reply = session.bind_symbol("x", "Maybe");
    assert_eq!(
        reply,
        WireValue::string("Unknown symbol 'Maybe'; expected Null, True or False.")
    );
    assert!(!session.namespace().contains("x"));
    let reply = session.bind_byte_string("b", &[65, -1], 2);
    assert_eq!(reply, WireValue::string("Byte value -1 is out of range 0..255."));
    assert!(!session.namespace().contains("b"));
}

#[test]
fn nested_lists_are_built_from_instructions() {
    let mut session = Session::default();
    for line in [
        "PyOpenList[\"m\"]",
        "PyInteger[\"_\", 1]",
        "PyOpenList[\"_\"]",
        "PyReal[\"_\", 2.5]",
        "PyCloseList[]",
        "PyUnicodeString[\"_\", \"s\"]",
        "PyCloseList[]",
    ] {
        assert!(feed(&mut session, line).is_null(), "{line}");
    }
    assert_eq!(session.list_depth(), 0);
    assert_eq!(
        session.run("m").to_string(),
        "List[Sequence[1, List[Sequence[2.5]], \"s\"]]"
    );
    assert!(!session.namespace().contains("_"));
}

#[test]
fn list_nesting_is_capped_at_configured_levels() {
    let mut session = Session::default();
    for _ in 0..2048 {
        assert!(session.open_list("deep").is_null());
    }
    assert_eq!(session.list_depth(), 2048);
    assert_eq!(
        session.open_list("deep"),
        WireValue::string("Maximum level of 2048 nested lists reached.")
    );
    assert_eq!(session.list_depth(), 2048);
    for _ in 0..2048 {
        assert!(session.close_list().is_null());
    }
    assert!(session.close_list().is_null());
    assert_eq!(session.run("len(deep)"), int(1));
}

#[test]
fn expression_result_hides_printed_output() {
    let mut session = Session::default();
    assert_eq!(session.run("1+1"), int(2));
    assert_eq!(session.run("capture_stdout.write('lost')"), WireValue::null());
    assert_eq!(session.run("print 'kept'"), WireValue::string("kept\n"));
}

#[test]
fn statements_persist_bindings() {
    let mut session = Session::default();
    assert!(matches!(
        session.execute("x = 5"),
        ExecutionOutcome::StatementsRan
    ));
    assert_eq!(session.run("x"), int(5));
    assert!(matches!(
        session.execute("x"),
        ExecutionOutcome::ExpressionResult(Value::Int(_))
    ));
}

#[test]
fn printed_output_is_emitted_once() {
    let mut session = Session::default();
    assert_eq!(session.run("print('hi')"), WireValue::string("hi\n"));
    assert_eq!(session.run("pass"), WireValue::null());
}

#[test]
fn multi_line_source_uses_host_newline_escape() {
    let mut session = Session::default();
    let reply = feed(
        &mut session,
        r#"Py["def sq(n):\012    return n * n\012print sq(7)"]"#,
    );
    assert_eq!(reply, WireValue::string("49\n"));
    assert_eq!(session.run("sq(3)"), int(9));
}

#[test]
fn compile_error_reports_and_leaves_state_unchanged() {
    let mut session = Session::default();
    let before = session.namespace().len();
    let reply = session.run("def f(:");
    let WireValue::UnicodeString(report) = reply else {
        panic!("expected diagnostic text");
    };
    assert!(report.starts_with("  File \"User Input\", line 1\nSyntaxError: invalid syntax\n"));
    assert_eq!(session.namespace().len(), before);
    assert!(!session.namespace().contains("f"));
    assert_eq!(session.run("pass"), WireValue::null());
}

#[test]
fn runtime_error_emits_traceback_and_discards_stdout() {
    let mut session = Session::default();
    let reply = session.run("print 'partial'\\0121 / 0");
    assert_eq!(
        reply,
        WireValue::string(
            "Traceback (most recent call last):\n  File \"User Input\", line 2, in <module>\n\
             ZeroDivisionError: division by zero\n"
        )
    );
    assert_eq!(session.run("pass"), WireValue::null());
}

#[test]
fn unavailable_iterator_only_affects_that_element() {
    let mut session = Session::default();
    assert!(session.run("l = [1, [2], 3]").is_null());
    let Some(Value::List(outer)) = session.namespace().get("l") else {
        panic!("expected list");
    };
    let inner = outer.borrow()[1].clone();
    let Value::List(inner) = inner else {
        panic!("expected nested list");
    };
    let _guard = inner.borrow_mut();
    assert_eq!(
        session.run("l"),
        WireValue::list_sequence(vec![
            int(1),
            WireValue::string("Can't get iterator for 'list'"),
            int(3),
        ])
    );
}

#[test]
fn unconvertible_values_become_diagnostics() {
    let mut session = Session::default();
    assert_eq!(
        session.run("len"),
        WireValue::string("Object type can't be converted!")
    );
    assert_eq!(
        session.run("{'a': (1, True)}").to_string(),
        "List[Sequence[List[Sequence[\"a\", List[Sequence[1, True]]]]]]"
    );
}

#[test]
fn configured_source_name_appears_in_reports() {
    let config = BridgeConfig {
        source_name: "Notebook".into(),
        ..BridgeConfig::default()
    };
    let mut session = Session::new(config);
    let reply = session.run("missing");
    assert_eq!(
        reply,
        WireValue::string(
            "Traceback (most recent call last):\n  File \"Notebook\", line 1, in <module>\n\
             NameError: name 'missing' is not defined\n"
        )
    );
}

#[test]
fn capture_data_rejects_non_text() {
    let mut session = Session::default();
    let WireValue::UnicodeString(report) = session.run("capture_stdout.data = 3") else {
        panic!("expected traceback");
    };
    assert!(report.ends_with("TypeError: data must be str, not int\n"));
}

#[test]
fn deeply_nested_source_is_a_compile_error() {
    with_session_stack(|| {
        let mut session = Session::default();
        let depth = 10_000;
        for source in [
            format!("{}1{}", "(".repeat(depth), ")".repeat(depth)),
            format!("{}{}", "[".repeat(depth), "]".repeat(depth)),
            format!("{}1", "-".repeat(depth)),
        ] {
            let WireValue::UnicodeString(report) = session.run(&source) else {
                panic!("expected a syntax report");
            };
            assert!(report.contains("SyntaxError: too many nested parentheses"));
            assert_eq!(session.run("1+1"), int(2));
        }
    });
}

#[test]
fn self_containing_list_prints_with_ellipsis() {
    let mut session = Session::default();
    assert_eq!(
        session.run("a = []\\012a.append(a)\\012print a"),
        WireValue::string("[[...]]\n")
    );
    assert_eq!(
        session.run("d = {}\\012d['k'] = d\\012print d, repr([d])"),
        WireValue::string("{'k': {...}} [{'k': {...}}]\n")
    );
    assert_eq!(session.run("1+1"), int(2));
}

#[test]
fn cyclic_lists_compare_without_recursing_forever() {
    let mut session = Session::default();
    assert!(session
        .run("a = []\\012a.append(a)\\012b = []\\012b.append(b)")
        .is_null());
    assert_eq!(session.run("a == b"), WireValue::boolean(true));
    assert_eq!(session.run("a == [a]"), WireValue::boolean(true));
    assert_eq!(session.run("a == [b, 1]"), WireValue::boolean(false));
}
