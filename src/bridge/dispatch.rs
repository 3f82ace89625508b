use crate::language::errors::SyntaxError;
use crate::runtime::{
    environment::Namespace,
    error::Exception,
    interpreter::{CompileMode, Interpreter},
    value::Value,
};
use tracing::debug;

/// The four-byte newline escape the host front end leaves in source text.
pub const HOST_NEWLINE_ESCAPE: &str = "\\012";
/// Same width as the escape so reported columns stay aligned.
pub const HOST_NEWLINE_REPLACEMENT: &str = "   \n";

#[derive(Debug)]
pub enum ExecutionOutcome {
    ExpressionResult(Value),
    StatementsRan,
    CompileError(SyntaxError),
    RuntimeError(Exception),
}

impl ExecutionOutcome {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::CompileError(_) | ExecutionOutcome::RuntimeError(_)
        )
    }
}

pub fn clean_input(source: &str) -> String {
    source.replace(HOST_NEWLINE_ESCAPE, HOST_NEWLINE_REPLACEMENT)
}

/// Compiles `source` as an expression, falling back to statements only when
/// that fails, then runs it with `namespace` as globals and locals. Errors
/// are reported through the interpreter's stderr object.
pub fn execute(
    interpreter: &mut Interpreter,
    namespace: &Namespace,
    source: &str,
) -> ExecutionOutcome {
    let source = clean_input(source);
    let unit = match interpreter.compile(&source, CompileMode::Expression) {
        Ok(unit) => {
            debug!("compiled as expression");
            unit
        }
        Err(_) => match interpreter.compile(&source, CompileMode::Statements) {
            Ok(unit) => {
                debug!("compiled as statements");
                unit
            }
            Err(err) => {
                debug!(message = %err, "compile failed");
                interpreter.report_syntax_error(&source, &err);
                return ExecutionOutcome::CompileError(err);
            }
        },
    };
    let is_expression = matches!(unit, crate::language::ast::CodeUnit::Expression { .. });
    match interpreter.evaluate(&unit, namespace, namespace) {
        Ok(value) if is_expression => ExecutionOutcome::ExpressionResult(value),
        Ok(_) => ExecutionOutcome::StatementsRan,
        Err(exception) => {
            debug!(error = %exception, "evaluation raised");
            interpreter.report_exception(&exception);
            ExecutionOutcome::RuntimeError(exception)
        }
    }
}
