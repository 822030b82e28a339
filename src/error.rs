// Script Error Handling

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    // Decode errors
    TableGap {
        offset: usize,
        code: u8,
        sub: Option<u8>,
    },
    OutOfBounds(usize),           // offset that could not be read
    MisalignedStop(usize, usize), // block start, requested stop

    // Discovery and relocation errors
    UnresolvableRoot(usize),
    DanglingPointer(usize, usize), // owning block, target
    OverlappingBlocks(usize, usize),

    // Collaborator errors
    InvalidRom(String),
    Project(String),
    Config(String),
    Io(String),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScriptError::TableGap {
                offset,
                code,
                sub: Some(sub),
            } => {
                write!(
                    f,
                    "No opcode rule for [{:02X} {:02X}] at {:#x}",
                    code, sub, offset
                )
            }
            ScriptError::TableGap {
                offset,
                code,
                sub: None,
            } => {
                write!(f, "No opcode rule for [{:02X}] at {:#x}", code, offset)
            }
            ScriptError::OutOfBounds(offset) => {
                write!(f, "Decode ran past the end of the buffer at {:#x}", offset)
            }
            ScriptError::MisalignedStop(block, stop) => {
                write!(
                    f,
                    "Block {:#x} has no instruction boundary at {:#x}",
                    block, stop
                )
            }
            ScriptError::UnresolvableRoot(address) => {
                write!(f, "Pointer {:#x} does not fall inside any block", address)
            }
            ScriptError::DanglingPointer(block, target) => {
                write!(
                    f,
                    "Block {:#x} points at {:#x}, which is not a block start",
                    block, target
                )
            }
            ScriptError::OverlappingBlocks(first, second) => {
                write!(f, "Blocks {:#x} and {:#x} overlap", first, second)
            }
            ScriptError::InvalidRom(msg) => write!(f, "Invalid EarthBound ROM: {}", msg),
            ScriptError::Project(msg) => write!(f, "CoilSnake project error: {}", msg),
            ScriptError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScriptError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        ScriptError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for ScriptError {
    fn from(e: serde_yaml::Error) -> Self {
        ScriptError::Project(e.to_string())
    }
}

impl From<toml::de::Error> for ScriptError {
    fn from(e: toml::de::Error) -> Self {
        ScriptError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;
