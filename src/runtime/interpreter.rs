use crate::diagnostics;
use crate::language::{
    ast::*,
    errors::SyntaxError,
    parser::{parse_expression, parse_statements},
    span::line_of,
};
use crate::runtime::{
    builtins::{self, Builtin},
    environment::{Environment, Namespace},
    error::{Exception, RuntimeError, RuntimeResult},
    ops,
    value::{BoundMethod, Complex, FunctionValue, Value},
};
use std::rc::Rc;
use tracing::trace;

pub const DEFAULT_RECURSION_LIMIT: usize = 256;
/// Deepest expression tree one call frame may evaluate.
pub const MAX_EXPR_DEPTH: usize = 1000;
const MODULE_FRAME: &str = "<module>";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileMode {
    /// A single expression (list), surrounding whitespace allowed.
    Expression,
    /// A module body.
    Statements,
}

pub type EvalResult<T> = Result<T, Exception>;

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

struct Frame {
    env: Environment,
    name: Rc<str>,
}

pub struct Interpreter {
    stdout: Option<Value>,
    stderr: Option<Value>,
    recursion_limit: usize,
    depth: usize,
    expr_depth: usize,
    source_name: String,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            stdout: None,
            stderr: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            depth: 0,
            expr_depth: 0,
            source_name: "<string>".into(),
        }
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit.max(1);
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Replaces the object `print` writes to.
    pub fn set_stdout(&mut self, stream: Value) {
        self.stdout = Some(stream);
    }

    /// Replaces the object error reports are written to.
    pub fn set_stderr(&mut self, stream: Value) {
        self.stderr = Some(stream);
    }

    pub fn compile(&self, source: &str, mode: CompileMode) -> Result<CodeUnit, SyntaxError> {
        match mode {
            CompileMode::Expression => {
                let expr = parse_expression(source)?;
                let line = line_of(source, expr.span.start);
                Ok(CodeUnit::Expression { expr, line })
            }
            CompileMode::Statements => parse_statements(source).map(CodeUnit::Statements),
        }
    }

    /// Runs a compiled unit. Expressions yield their value; statement
    /// bodies yield `None`.
    pub fn evaluate(
        &mut self,
        unit: &CodeUnit,
        globals: &Namespace,
        locals: &Namespace,
    ) -> EvalResult<Value> {
        let frame = Frame {
            env: Environment::new(globals.clone(), locals.clone()),
            name: MODULE_FRAME.into(),
        };
        self.depth = 0;
        self.expr_depth = 0;
        match unit {
            CodeUnit::Expression { expr, line } => self
                .eval_expr(expr, &frame)
                .map_err(|exception| exception.locate(*line, &frame.name)),
            CodeUnit::Statements(body) => match self.exec_block(body, &frame)? {
                Flow::Normal => Ok(Value::None),
                Flow::Return(_) => Err(misplaced("return", "function")),
                Flow::Break => Err(misplaced("break", "loop")),
                Flow::Continue => Err(misplaced("continue", "loop")),
            },
        }
    }

    pub fn get_attr(&self, value: &Value, name: &str) -> RuntimeResult<Value> {
        match (value, name) {
            (Value::Capture(capture), "data") => Ok(Value::str(capture.data())),
            _ if builtins::has_method(value, name) => Ok(Value::Method(Rc::new(BoundMethod {
                receiver: value.clone(),
                name: name.to_string(),
            }))),
            (Value::Complex(c), "real") => Ok(Value::Float(c.re)),
            (Value::Complex(c), "imag") => Ok(Value::Float(c.im)),
            _ => Err(no_attribute(value, name)),
        }
    }

    pub fn set_attr(&self, target: &Value, name: &str, value: Value) -> RuntimeResult<()> {
        match (target, name) {
            (Value::Capture(capture), "data") => match value {
                Value::Str(text) => {
                    capture.set_data(text.to_string());
                    Ok(())
                }
                other => Err(RuntimeError::type_error(format!(
                    "data must be str, not {}",
                    other.type_name()
                ))),
            },
            _ => Err(no_attribute(target, name)),
        }
    }

    /// Writes a syntax error report to the current stderr object.
    pub fn report_syntax_error(&mut self, source: &str, error: &SyntaxError) {
        let report = diagnostics::render_syntax_error(&self.source_name, source, error);
        self.write_stderr(&report);
    }

    /// Writes a traceback for `exception` to the current stderr object.
    pub fn report_exception(&mut self, exception: &Exception) {
        let report = diagnostics::format_traceback(&self.source_name, exception);
        self.write_stderr(&report);
    }

    fn write_stderr(&mut self, text: &str) {
        match &self.stderr {
            Some(stream) => {
                let stream = stream.clone();
                if let Err(err) = self.write_to(&stream, text) {
                    tracing::warn!(%err, "stderr object rejected report");
                }
            }
            None => eprint!("{text}"),
        }
    }

    fn write_stdout(&mut self, text: &str) -> RuntimeResult<()> {
        match &self.stdout {
            Some(stream) => {
                let stream = stream.clone();
                self.write_to(&stream, text)
            }
            None => {
                print!("{text}");
                Ok(())
            }
        }
    }

    fn write_to(&mut self, stream: &Value, text: &str) -> RuntimeResult<()> {
        let write = self.get_attr(stream, "write")?;
        self.call_value(write, vec![Value::str(text)])
            .map(|_| ())
            .map_err(|exception| exception.error)
    }

    fn exec_block(&mut self, body: &[Stmt], frame: &Frame) -> EvalResult<Flow> {
        for stmt in body {
            let flow = self
                .exec_stmt(stmt, frame)
                .map_err(|exception| exception.locate(stmt.line, &frame.name))?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, frame: &Frame) -> EvalResult<Flow> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval_expr(expr, frame)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval_expr(value, frame)?;
                for target in targets {
                    self.assign(target, value.clone(), frame)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                self.aug_assign(target, *op, value, frame)?;
            }
            StmtKind::Print { values, newline } => {
                let mut parts = Vec::with_capacity(values.len());
                for value in values {
                    parts.push(self.eval_expr(value, frame)?.to_string());
                }
                let mut text = parts.join(" ");
                if *newline {
                    text.push('\n');
                } else if !text.is_empty() {
                    text.push(' ');
                }
                self.write_stdout(&text)?;
            }
            StmtKind::If { branches, orelse } => {
                for (condition, body) in branches {
                    if self.eval_expr(condition, frame)?.truthy() {
                        return self.exec_block(body, frame);
                    }
                }
                return self.exec_block(orelse, frame);
            }
            StmtKind::While { condition, body } => {
                while self.eval_expr(condition, frame)?.truthy() {
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            StmtKind::For {
                target,
                iterable,
                body,
            } => {
                let iterable = self.eval_expr(iterable, frame)?;
                for item in builtins::collect(&iterable)? {
                    self.assign(target, item, frame)?;
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            StmtKind::FunctionDef(def) => {
                let function = FunctionValue {
                    def: def.clone(),
                    globals: frame.env.globals.clone(),
                };
                frame
                    .env
                    .assign(&def.name, Value::Function(Rc::new(function)));
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, frame)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Del(targets) => {
                for target in targets {
                    self.delete(target, frame)?;
                }
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &Target, value: Value, frame: &Frame) -> EvalResult<()> {
        match target {
            Target::Name(name) => frame.env.assign(name, value),
            Target::Subscript { value: container, index } => {
                let container = self.eval_expr(container, frame)?;
                let index = self.eval_expr(index, frame)?;
                ops::store_subscript(&container, &index, value)?;
            }
            Target::Attribute { value: object, name } => {
                let object = self.eval_expr(object, frame)?;
                self.set_attr(&object, name, value)?;
            }
            Target::Unpack(targets) => {
                let items = builtins::collect(&value)?;
                if items.len() != targets.len() {
                    return Err(unpack_error(targets.len(), items.len()).into());
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item, frame)?;
                }
            }
        }
        Ok(())
    }

    fn aug_assign(
        &mut self,
        target: &Target,
        op: BinaryOp,
        value: &Expr,
        frame: &Frame,
    ) -> EvalResult<()> {
        match target {
            Target::Name(name) => {
                let current = frame.env.lookup(name)?;
                let operand = self.eval_expr(value, frame)?;
                let updated = self.in_place(op, current, &operand)?;
                frame.env.assign(name, updated);
            }
            Target::Subscript {
                value: container,
                index,
            } => {
                let container = self.eval_expr(container, frame)?;
                let index = self.eval_expr(index, frame)?;
                let current = ops::subscript(&container, &index)?;
                let operand = self.eval_expr(value, frame)?;
                let updated = self.in_place(op, current, &operand)?;
                ops::store_subscript(&container, &index, updated)?;
            }
            Target::Attribute {
                value: object,
                name,
            } => {
                let object = self.eval_expr(object, frame)?;
                let current = self.get_attr(&object, name)?;
                let operand = self.eval_expr(value, frame)?;
                let updated = self.in_place(op, current, &operand)?;
                self.set_attr(&object, name, updated)?;
            }
            Target::Unpack(_) => {
                return Err(RuntimeError::type_error(
                    "illegal expression for augmented assignment",
                )
                .into())
            }
        }
        Ok(())
    }

    /// `+=` on a list extends it in place; everything else rebinds.
    fn in_place(&mut self, op: BinaryOp, current: Value, operand: &Value) -> RuntimeResult<Value> {
        if let (BinaryOp::Add, Value::List(items)) = (op, &current) {
            let extra = builtins::collect(operand)?;
            items.borrow_mut().extend(extra);
            return Ok(current);
        }
        ops::binary(op, &current, operand)
    }

    fn delete(&mut self, target: &Target, frame: &Frame) -> EvalResult<()> {
        match target {
            Target::Name(name) => frame.env.delete(name)?,
            Target::Subscript { value, index } => {
                let container = self.eval_expr(value, frame)?;
                let index = self.eval_expr(index, frame)?;
                ops::delete_subscript(&container, &index)?;
            }
            Target::Attribute { value, name } => {
                let object = self.eval_expr(value, frame)?;
                return Err(no_attribute(&object, name).into());
            }
            Target::Unpack(targets) => {
                for target in targets {
                    self.delete(target, frame)?;
                }
            }
        }
        Ok(())
    }

    fn eval_exprs(&mut self, exprs: &[Expr], frame: &Frame) -> EvalResult<Vec<Value>> {
        exprs.iter().map(|expr| self.eval_expr(expr, frame)).collect()
    }

    fn eval_expr(&mut self, expr: &Expr, frame: &Frame) -> EvalResult<Value> {
        if self.expr_depth >= MAX_EXPR_DEPTH {
            return Err(RuntimeError::RecursionLimit.into());
        }
        self.expr_depth += 1;
        let result = self.eval_expr_node(expr, frame);
        self.expr_depth -= 1;
        result
    }

    fn eval_expr_node(&mut self, expr: &Expr, frame: &Frame) -> EvalResult<Value> {
        let value = match &expr.kind {
            ExprKind::Int(v) => Value::Int(v.clone()),
            ExprKind::Float(v) => Value::Float(*v),
            ExprKind::Imaginary(v) => Value::Complex(Complex::new(0.0, *v)),
            ExprKind::Str(text) => Value::str(text.as_str()),
            ExprKind::Bytes(bytes) => Value::Bytes(bytes.as_slice().into()),
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::None => Value::None,
            ExprKind::Name(name) => frame.env.lookup(name)?,
            ExprKind::List(items) => Value::list(self.eval_exprs(items, frame)?),
            ExprKind::Tuple(items) => Value::tuple(self.eval_exprs(items, frame)?),
            ExprKind::Set(items) => {
                let set = Rc::new(std::cell::RefCell::new(Vec::new()));
                for item in self.eval_exprs(items, frame)? {
                    ops::set_add(&set, item)?;
                }
                Value::Set(set)
            }
            ExprKind::Dict(entries) => {
                let dict = Rc::new(std::cell::RefCell::new(Vec::new()));
                for (key, value) in entries {
                    let key = self.eval_expr(key, frame)?;
                    let value = self.eval_expr(value, frame)?;
                    ops::dict_set(&dict, key, value)?;
                }
                Value::Dict(dict)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.eval_expr(operand, frame)?;
                ops::unary(*op, &operand)?
            }
            ExprKind::Binary { left, op, right } => {
                let left = self.eval_expr(left, frame)?;
                let right = self.eval_expr(right, frame)?;
                ops::binary(*op, &left, &right)?
            }
            ExprKind::Compare { left, rest } => {
                let mut current = self.eval_expr(left, frame)?;
                for (op, operand) in rest {
                    let next = self.eval_expr(operand, frame)?;
                    if !ops::compare(*op, &current, &next)? {
                        return Ok(Value::Bool(false));
                    }
                    current = next;
                }
                Value::Bool(true)
            }
            ExprKind::Logical { left, op, right } => {
                let left = self.eval_expr(left, frame)?;
                match (op, left.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => left,
                    _ => self.eval_expr(right, frame)?,
                }
            }
            ExprKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(condition, frame)?.truthy() {
                    self.eval_expr(then_branch, frame)?
                } else {
                    self.eval_expr(else_branch, frame)?
                }
            }
            ExprKind::Call { callee, args } => {
                let callee = self.eval_expr(callee, frame)?;
                let args = self.eval_exprs(args, frame)?;
                self.call_value(callee, args)?
            }
            ExprKind::Subscript { value, index } => {
                let value = self.eval_expr(value, frame)?;
                let index = self.eval_expr(index, frame)?;
                ops::subscript(&value, &index)?
            }
            ExprKind::Attribute { value, name } => {
                let value = self.eval_expr(value, frame)?;
                self.get_attr(&value, name)?
            }
        };
        Ok(value)
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> EvalResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(&function, args),
            Value::Builtin(builtin) => Ok(Builtin::call(builtin, args)?),
            Value::Method(method) => {
                Ok(builtins::call_method(&method.receiver, &method.name, args)?)
            }
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))
            .into()),
        }
    }

    fn call_function(&mut self, function: &FunctionValue, args: Vec<Value>) -> EvalResult<Value> {
        let def = &function.def;
        if args.len() != def.params.len() {
            return Err(RuntimeError::type_error(format!(
                "{}() takes exactly {} argument{} ({} given)",
                def.name,
                def.params.len(),
                if def.params.len() == 1 { "" } else { "s" },
                args.len()
            ))
            .into());
        }
        if self.depth >= self.recursion_limit {
            return Err(RuntimeError::RecursionLimit.into());
        }
        let locals = Namespace::new();
        for (param, arg) in def.params.iter().zip(args) {
            locals.set(param, arg);
        }
        let frame = Frame {
            env: Environment::new(function.globals.clone(), locals),
            name: def.name.as_str().into(),
        };
        trace!(function = %def.name, depth = self.depth, "call");
        self.depth += 1;
        let caller_expr_depth = std::mem::replace(&mut self.expr_depth, 0);
        let outcome = self.exec_block(&def.body, &frame);
        self.expr_depth = caller_expr_depth;
        self.depth -= 1;
        match outcome.map_err(Exception::leave_frame)? {
            Flow::Normal => Ok(Value::None),
            Flow::Return(value) => Ok(value),
            Flow::Break => Err(misplaced("break", "loop").leave_frame()),
            Flow::Continue => Err(misplaced("continue", "loop").leave_frame()),
        }
    }
}

fn misplaced(keyword: &'static str, scope: &'static str) -> Exception {
    Exception::new(RuntimeError::MisplacedFlow { keyword, scope })
}

fn no_attribute(value: &Value, name: &str) -> RuntimeError {
    RuntimeError::AttributeError {
        message: format!(
            "'{}' object has no attribute '{}'",
            value.type_name(),
            name
        ),
    }
}

fn unpack_error(expected: usize, got: usize) -> RuntimeError {
    if got > expected {
        RuntimeError::value_error(format!(
            "too many values to unpack (expected {})",
            expected
        ))
    } else {
        RuntimeError::value_error(format!(
            "not enough values to unpack (expected {}, got {})",
            expected, got
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::CaptureObject;

    struct Harness {
        interpreter: Interpreter,
        namespace: Namespace,
        stdout: Rc<CaptureObject>,
    }

    impl Harness {
        fn new() -> Self {
            let mut interpreter = Interpreter::new();
            let stdout = Rc::new(CaptureObject::new());
            interpreter.set_stdout(Value::Capture(stdout.clone()));
            Self {
                interpreter,
                namespace: Namespace::new(),
                stdout,
            }
        }

        fn run(&mut self, source: &str) -> EvalResult<Value> {
            let unit = self
                .interpreter
                .compile(source, CompileMode::Statements)
                .expect("source compiles");
            self.interpreter
                .evaluate(&unit, &self.namespace, &self.namespace)
        }

        fn eval(&mut self, source: &str) -> Value {
            let unit = self
                .interpreter
                .compile(source, CompileMode::Expression)
                .expect("expression compiles");
            self.interpreter
                .evaluate(&unit, &self.namespace, &self.namespace)
                .expect("expression evaluates")
        }
    }

    #[test]
    fn functions_loops_and_print() {
        let mut h = Harness::new();
        h.run(
            "def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\n\
             total = 0\nfor i in range(5):\n    if i == 3:\n        continue\n    total += i\n\
             print fact(20), total\n",
        )
        .unwrap();
        assert_eq!(h.stdout.data(), "2432902008176640000 7\n");
    }

    #[test]
    fn print_with_trailing_comma_omits_newline() {
        let mut h = Harness::new();
        h.run("print 'a',\nprint('b')\n").unwrap();
        assert_eq!(h.stdout.data(), "a b\n");
    }

    #[test]
    fn expression_mode_returns_value() {
        let mut h = Harness::new();
        h.run("x = [1, 2]\nx += [3]\n").unwrap();
        assert_eq!(h.eval("  x  ").repr(), "[1, 2, 3]");
        assert_eq!(h.eval("1 < 2 < 3 and 'yes' or 'no'").repr(), "'yes'");
        assert_eq!(h.eval("{'a': 1}['a'] if True else 0").repr(), "1");
    }

    #[test]
    fn tuple_unpacking_and_del() {
        let mut h = Harness::new();
        h.run("a, b = 1, 2\na, b = b, a\nd = {'k': a}\ndel d['k']\n")
            .unwrap();
        assert_eq!(h.eval("(a, b, len(d))").repr(), "(2, 1, 0)");
        let err = h.run("a, b = [1, 2, 3]\n").unwrap_err();
        assert_eq!(
            err.error.to_string(),
            "ValueError: too many values to unpack (expected 2)"
        );
    }

    #[test]
    fn traceback_records_each_frame() {
        let mut h = Harness::new();
        let err = h
            .run("def inner():\n    return 1 / 0\n\ndef outer():\n    return inner()\nouter()\n")
            .unwrap_err();
        let frames: Vec<(u32, &str)> = err
            .trace
            .iter()
            .map(|frame| (frame.line, frame.function.as_str()))
            .collect();
        assert_eq!(frames, vec![(2, "inner"), (5, "outer"), (6, "<module>")]);
    }

    #[test]
    fn recursion_limit_is_enforced() {
        let mut h = Harness::new();
        h.interpreter = Interpreter::new().with_recursion_limit(10);
        let err = h.run("def f(n):\n    return f(n + 1)\nf(0)\n").unwrap_err();
        assert_eq!(err.error, RuntimeError::RecursionLimit);
    }

    #[test]
    fn long_operator_chains_hit_the_depth_limit() {
        crate::tests::with_session_stack(|| {
            let mut h = Harness::new();
            let terms = MAX_EXPR_DEPTH + 10;
            let chain = vec!["1"; terms].join(" + ");
            let err = h.run(&format!("x = {}\n", chain)).unwrap_err();
            assert_eq!(err.error, RuntimeError::RecursionLimit);
            assert!(!h.namespace.contains("x"));

            let short = vec!["1"; 50].join(" + ");
            assert_eq!(h.eval(&short).repr(), "50");
        });
    }

    #[test]
    fn flow_outside_loop_is_reported() {
        let mut h = Harness::new();
        let err = h.run("break\n").unwrap_err();
        assert_eq!(err.error.to_string(), "SyntaxError: 'break' outside loop");
    }

    #[test]
    fn capture_data_must_be_text() {
        let interpreter = Interpreter::new();
        let capture = Value::Capture(Rc::new(CaptureObject::new()));
        interpreter
            .set_attr(&capture, "data", Value::str("x"))
            .unwrap();
        assert_eq!(
            interpreter.get_attr(&capture, "data").unwrap().repr(),
            "'x'"
        );
        assert!(interpreter
            .set_attr(&capture, "data", Value::int(1))
            .is_err());
    }

    #[test]
    fn function_locals_do_not_leak() {
        let mut h = Harness::new();
        h.run("g = 1\ndef f(x):\n    y = x + g\n    return y\nr = f(2)\n")
            .unwrap();
        assert_eq!(h.eval("r").repr(), "3");
        assert!(!h.namespace.contains("y"));
    }
}
