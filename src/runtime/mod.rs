pub mod builtins;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod ops;
pub mod value;

pub use environment::Namespace;
pub use error::{Exception, RuntimeError};
pub use interpreter::{CompileMode, Interpreter};
pub use value::Value;
