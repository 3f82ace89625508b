use thiserror::Error;

/// Rejections raised while binding host values. None of them is fatal; each
/// becomes the diagnostic string sent back for the instruction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Maximum level of {max} nested lists reached.")]
    CapacityExceeded { max: usize },
    #[error("Can't allocate memory for string.")]
    AllocationFailure,
    #[error("Unknown symbol '{name}'; expected Null, True or False.")]
    UnknownSymbol { name: String },
    #[error("Byte value {value} is out of range 0..255.")]
    ByteOutOfRange { value: i64 },
}

pub type BridgeResult<T> = Result<T, BridgeError>;
