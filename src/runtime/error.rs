use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Exception kinds raised by the embedded interpreter. The display form is
/// the last line of a traceback.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("NameError: name '{name}' is not defined")]
    NameError { name: String },
    #[error("TypeError: {message}")]
    TypeError { message: String },
    #[error("ValueError: {message}")]
    ValueError { message: String },
    #[error("ZeroDivisionError: {message}")]
    ZeroDivision { message: String },
    #[error("IndexError: {message}")]
    IndexError { message: String },
    #[error("KeyError: {key}")]
    KeyError { key: String },
    #[error("AttributeError: {message}")]
    AttributeError { message: String },
    #[error("OverflowError: {message}")]
    Overflow { message: String },
    #[error("RecursionError: maximum recursion depth exceeded")]
    RecursionLimit,
    #[error("RuntimeError: {message}")]
    Runtime { message: String },
    #[error("SyntaxError: '{keyword}' outside {scope}")]
    MisplacedFlow {
        keyword: &'static str,
        scope: &'static str,
    },
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::TypeError {
            message: message.into(),
        }
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        RuntimeError::ValueError {
            message: message.into(),
        }
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        RuntimeError::IndexError {
            message: message.into(),
        }
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        RuntimeError::ZeroDivision {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub line: u32,
    pub function: String,
}

/// A raised exception together with the frames it unwound through,
/// innermost first.
#[derive(Debug, Error, Clone)]
#[error("{error}")]
pub struct Exception {
    pub error: RuntimeError,
    pub trace: Vec<TraceFrame>,
    located: bool,
}

impl Exception {
    pub fn new(error: RuntimeError) -> Self {
        Self {
            error,
            trace: Vec::new(),
            located: false,
        }
    }

    /// Records the statement that raised, unless a deeper statement of the
    /// same frame already did.
    pub(crate) fn locate(mut self, line: u32, function: &str) -> Self {
        if !self.located {
            self.trace.push(TraceFrame {
                line,
                function: function.to_string(),
            });
            self.located = true;
        }
        self
    }

    /// Called when the exception leaves a function frame so the caller's
    /// statement is recorded too.
    pub(crate) fn leave_frame(mut self) -> Self {
        self.located = false;
        self
    }
}

impl From<RuntimeError> for Exception {
    fn from(error: RuntimeError) -> Self {
        Exception::new(error)
    }
}
