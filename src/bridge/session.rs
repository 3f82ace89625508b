use crate::bridge::{
    builder::BuilderStack,
    capture::CaptureChannel,
    dispatch::{self, ExecutionOutcome},
    error::BridgeResult,
    marshal,
};
use crate::config::BridgeConfig;
use crate::runtime::{environment::Namespace, interpreter::Interpreter, value::Value};
use crate::wire::{Instruction, WireValue};
use tracing::{debug, info_span, warn};

/// All state one host connection needs: the interpreter, its main
/// namespace, the list builder and the capture sinks.
pub struct Session {
    interpreter: Interpreter,
    namespace: Namespace,
    builder: BuilderStack,
    capture: CaptureChannel,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl Session {
    pub fn new(config: BridgeConfig) -> Self {
        let mut interpreter = Interpreter::new()
            .with_recursion_limit(config.recursion_limit)
            .with_source_name(config.source_name.clone());
        let namespace = Namespace::new();
        let capture = CaptureChannel::install(&mut interpreter, &namespace);
        Self {
            interpreter,
            namespace,
            builder: BuilderStack::new(config.max_list_levels),
            capture,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn list_depth(&self) -> usize {
        self.builder.depth()
    }

    pub fn bind_integer(&mut self, name: &str, value: i64) -> WireValue {
        self.bind(name, Ok(marshal::integer(value)))
    }

    pub fn bind_real(&mut self, name: &str, value: f64) -> WireValue {
        self.bind(name, Ok(marshal::real(value)))
    }

    pub fn bind_complex(&mut self, name: &str, re: f64, im: f64) -> WireValue {
        self.bind(name, Ok(marshal::complex(re, im)))
    }

    pub fn bind_unicode_string(&mut self, name: &str, units: &[u16]) -> WireValue {
        self.bind(name, Ok(marshal::unicode_string(units)))
    }

    pub fn bind_byte_string(&mut self, name: &str, codepoints: &[i64], len: usize) -> WireValue {
        self.bind(name, marshal::byte_string(codepoints, len))
    }

    pub fn bind_symbol(&mut self, name: &str, symbol: &str) -> WireValue {
        self.bind(name, marshal::symbol(symbol))
    }

    fn bind(&mut self, name: &str, value: BridgeResult<Value>) -> WireValue {
        match value {
            Ok(value) => {
                self.builder.append_or_bind(name, value, &self.namespace);
                WireValue::null()
            }
            Err(err) => {
                warn!(binding = name, %err, "bind rejected");
                WireValue::string(err.to_string())
            }
        }
    }

    pub fn open_list(&mut self, name: &str) -> WireValue {
        match self.builder.open(name, &self.namespace) {
            Ok(()) => WireValue::null(),
            Err(err) => {
                warn!(binding = name, %err, "open rejected");
                WireValue::string(err.to_string())
            }
        }
    }

    pub fn close_list(&mut self) -> WireValue {
        if !self.builder.close() {
            warn!("close requested with no open list");
        }
        WireValue::null()
    }

    /// Runs source text and classifies the outcome without draining the
    /// capture sinks.
    pub fn execute(&mut self, source: &str) -> ExecutionOutcome {
        dispatch::execute(&mut self.interpreter, &self.namespace, source)
    }

    /// Runs source text and builds the reply for the host.
    pub fn run(&mut self, source: &str) -> WireValue {
        let span = info_span!("run", len = source.len());
        let _entered = span.enter();
        let stdout = self.capture.stdout();
        let stderr = self.capture.stderr();
        match dispatch::execute(&mut self.interpreter, &self.namespace, source) {
            ExecutionOutcome::ExpressionResult(value) => {
                debug!(kind = value.type_name(), "expression result");
                let reply = marshal::to_wire(&value);
                CaptureChannel::drain_silently(&self.interpreter, stdout);
                reply
            }
            ExecutionOutcome::StatementsRan => {
                debug!("statements ran");
                CaptureChannel::drain_and_emit(&self.interpreter, stdout)
            }
            ExecutionOutcome::CompileError(_) | ExecutionOutcome::RuntimeError(_) => {
                let reply = CaptureChannel::drain_and_emit(&self.interpreter, stderr);
                CaptureChannel::drain_silently(&self.interpreter, stdout);
                reply
            }
        }
    }

    pub fn handle(&mut self, instruction: Instruction) -> WireValue {
        debug!(head = instruction.head(), "instruction");
        match instruction {
            Instruction::BindInteger { name, value } => self.bind_integer(&name, value),
            Instruction::BindReal { name, value } => self.bind_real(&name, value),
            Instruction::BindComplex { name, re, im } => self.bind_complex(&name, re, im),
            Instruction::BindUnicodeString { name, units } => {
                self.bind_unicode_string(&name, &units)
            }
            Instruction::BindByteString { name, codepoints } => {
                self.bind_byte_string(&name, &codepoints, codepoints.len())
            }
            Instruction::BindSymbol { name, symbol } => self.bind_symbol(&name, &symbol),
            Instruction::OpenList { name } => self.open_list(&name),
            Instruction::CloseList => self.close_list(),
            Instruction::Execute { source } => self.run(&source),
        }
    }
}
