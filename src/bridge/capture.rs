use crate::runtime::{
    environment::Namespace,
    interpreter::Interpreter,
    value::{CaptureObject, Value},
};
use crate::wire::WireValue;
use std::rc::Rc;
use tracing::warn;

pub const STDOUT_BINDING: &str = "capture_stdout";
pub const STDERR_BINDING: &str = "capture_stderr";

/// The two text sinks standing in for the interpreter's standard streams.
pub struct CaptureChannel {
    stdout: Value,
    stderr: Value,
}

impl CaptureChannel {
    /// Creates both sinks, binds them in `namespace` and makes them the
    /// interpreter's stdout and stderr.
    pub fn install(interpreter: &mut Interpreter, namespace: &Namespace) -> Self {
        let stdout = Value::Capture(Rc::new(CaptureObject::new()));
        let stderr = Value::Capture(Rc::new(CaptureObject::new()));
        namespace.set(STDOUT_BINDING, stdout.clone());
        namespace.set(STDERR_BINDING, stderr.clone());
        interpreter.set_stdout(stdout.clone());
        interpreter.set_stderr(stderr.clone());
        Self { stdout, stderr }
    }

    pub fn stdout(&self) -> &Value {
        &self.stdout
    }

    pub fn stderr(&self) -> &Value {
        &self.stderr
    }

    /// Replies with the sink's accumulated text and clears it, or `Null`
    /// when nothing was written.
    pub fn drain_and_emit(interpreter: &Interpreter, sink: &Value) -> WireValue {
        let text = match interpreter.get_attr(sink, "data") {
            Ok(Value::Str(text)) => text,
            Ok(other) => {
                warn!(kind = other.type_name(), "capture data is not text");
                return WireValue::null();
            }
            Err(err) => {
                warn!(%err, "capture data unreadable");
                return WireValue::null();
            }
        };
        if text.is_empty() {
            return WireValue::null();
        }
        Self::drain_silently(interpreter, sink);
        WireValue::string(text.to_string())
    }

    pub fn drain_silently(interpreter: &Interpreter, sink: &Value) {
        if let Err(err) = interpreter.set_attr(sink, "data", Value::str("")) {
            warn!(%err, "could not reset capture data");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_emits_once_then_null() {
        let mut interpreter = Interpreter::new();
        let namespace = Namespace::new();
        let channel = CaptureChannel::install(&mut interpreter, &namespace);
        assert!(namespace.contains(STDOUT_BINDING));
        assert!(namespace.contains(STDERR_BINDING));
        if let Value::Capture(capture) = channel.stdout() {
            capture.write("hi\n");
        }
        assert_eq!(
            CaptureChannel::drain_and_emit(&interpreter, channel.stdout()),
            WireValue::string("hi\n")
        );
        assert!(CaptureChannel::drain_and_emit(&interpreter, channel.stdout()).is_null());
    }

    #[test]
    fn silent_drain_discards_text() {
        let mut interpreter = Interpreter::new();
        let channel = CaptureChannel::install(&mut interpreter, &Namespace::new());
        if let Value::Capture(capture) = channel.stderr() {
            capture.write("noise");
        }
        CaptureChannel::drain_silently(&interpreter, channel.stderr());
        assert!(CaptureChannel::drain_and_emit(&interpreter, channel.stderr()).is_null());
    }
}
