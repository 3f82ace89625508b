use crate::{
    language::{errors::SyntaxError, span::line_of},
    runtime::error::Exception,
};
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme, NamedSource, SourceSpan};
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource<String>, source_len: usize, err: &SyntaxError) -> Self {
        let start = err.span.start.min(source_len);
        let len = err.span.len().min(source_len - start);
        Self {
            src,
            span: (start, len).into(),
            help: err.help.clone(),
            message: err.message.clone(),
            label: "here".into(),
        }
    }
}

/// Renders a syntax error the way it is shown to the host: a location
/// header, the error line, then the annotated source excerpt.
pub fn render_syntax_error(source_name: &str, source: &str, err: &SyntaxError) -> String {
    let line = line_of(source, err.span.start.min(source.len()));
    let mut out = format!(
        "  File \"{}\", line {}\nSyntaxError: {}\n",
        source_name, line, err.message
    );
    let src = NamedSource::new(source_name, source.to_string());
    let diagnostic = SyntaxDiagnostic::from_error(src, source.len(), err);
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    let mut rendered = String::new();
    if handler.render_report(&mut rendered, &diagnostic).is_ok() {
        out.push_str(&rendered);
        if !out.ends_with('\n') {
            out.push('\n');
        }
    } else if let Some(help) = &err.help {
        let _ = writeln!(out, "help: {}", help);
    }
    out
}

/// Formats an exception as a traceback, outermost frame first.
pub fn format_traceback(source_name: &str, exception: &Exception) -> String {
    let mut out = String::from("Traceback (most recent call last):\n");
    for frame in exception.trace.iter().rev() {
        let _ = writeln!(
            out,
            "  File \"{}\", line {}, in {}",
            source_name, frame.line, frame.function
        );
    }
    let _ = writeln!(out, "{}", exception.error);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::Span;
    use crate::runtime::error::{RuntimeError, TraceFrame};

    #[test]
    fn syntax_report_names_source_and_line() {
        let source = "x = 1\ndef f(:\n";
        let err = SyntaxError::new("invalid syntax", Span::new(12, 13));
        let report = render_syntax_error("User Input", source, &err);
        assert!(report.starts_with("  File \"User Input\", line 2\nSyntaxError: invalid syntax\n"));
        assert!(report.contains("def f(:"));
    }

    #[test]
    fn span_past_end_of_source_is_clamped() {
        let err = SyntaxError::new("unexpected EOF while parsing", Span::new(40, 41));
        let report = render_syntax_error("User Input", "(1,", &err);
        assert!(report.contains("unexpected EOF while parsing"));
    }

    #[test]
    fn traceback_lists_outermost_frame_first() {
        let mut exception = Exception::new(RuntimeError::zero_division("division by zero"));
        exception.trace = vec![
            TraceFrame {
                line: 2,
                function: "f".into(),
            },
            TraceFrame {
                line: 4,
                function: "<module>".into(),
            },
        ];
        assert_eq!(
            format_traceback("User Input", &exception),
            "Traceback (most recent call last):\n  File \"User Input\", line 4, in <module>\n  \
             File \"User Input\", line 2, in f\nZeroDivisionError: division by zero\n"
        );
    }
}
