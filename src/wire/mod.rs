//! Host-side wire format: instructions in, FullForm expressions out.

pub mod instruction;
pub mod reader;
pub mod value;

pub use instruction::Instruction;
pub use reader::{read_instruction, ReadError};
pub use value::WireValue;
