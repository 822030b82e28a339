use std::fmt::{self, Display, Formatter};

use crate::opcode_tables::Role;

/// A symbolic reference produced by relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Start offset of the target block
    pub target: usize,
    /// Output chunk the target block is assigned to
    pub chunk: usize,
    pub role: Role,
}

/// One operand field of a control code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Byte(u8),
    /// A 4-byte mapped address, already converted to a buffer offset.
    /// Offset 0 is the null pointer.
    Pointer(usize),
    /// A pointer after relocation
    Symbol(Symbol),
    /// A null pointer after relocation
    Null,
}

impl Operand {
    pub fn pointer_target(&self) -> Option<usize> {
        match self {
            Operand::Pointer(target) => Some(*target),
            _ => None,
        }
    }
}

/// A decoded control code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCode {
    pub code: u8,
    pub operands: Vec<Operand>,
}

impl ControlCode {
    pub fn new(code: u8, bytes: &[u8]) -> Self {
        ControlCode {
            code,
            operands: bytes.iter().map(|&b| Operand::Byte(b)).collect(),
        }
    }

    /// An explicit jump, as appended to a block that was split.
    pub fn goto(target: usize) -> Self {
        ControlCode {
            code: 0x0A,
            operands: vec![Operand::Pointer(target)],
        }
    }

    /// The first operand byte, if it is still a plain byte.
    pub fn sub(&self) -> Option<u8> {
        match self.operands.first() {
            Some(Operand::Byte(b)) => Some(*b),
            _ => None,
        }
    }

    /// Raw bytes of every leading `Byte` operand.
    pub fn leading_bytes(&self) -> Vec<u8> {
        self.operands
            .iter()
            .map_while(|op| match op {
                Operand::Byte(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    pub fn pointer_targets(&self) -> impl Iterator<Item = usize> + '_ {
        self.operands.iter().filter_map(Operand::pointer_target)
    }

    /// The role of the first relocated operand, if any.
    pub fn symbol_role(&self) -> Option<Role> {
        self.operands.iter().find_map(|op| match op {
            Operand::Symbol(symbol) => Some(symbol.role),
            _ => None,
        })
    }
}

/// A single decoded unit of script text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A literal character
    Char(char),
    /// A byte that must stay bracketed in the output (quote, backslash)
    Raw(u8),
    Control(ControlCode),
    /// Inline text substituted for a compressed-text code
    Text(String),
}

impl Token {
    pub fn as_control(&self) -> Option<&ControlCode> {
        match self {
            Token::Control(cc) => Some(cc),
            _ => None,
        }
    }
}

/// Bracketed hex form, e.g. `[1F 63 00 00 C5 00]`. Pointers print as their
/// mapped bytes; symbols print as `{e(...)}`.
impl Display for ControlCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{:02X}", self.code)?;
        for op in &self.operands {
            match op {
                Operand::Byte(b) => write!(f, " {:02X}", b)?,
                Operand::Pointer(target) => {
                    for b in crate::address::to_mapped(*target) {
                        write!(f, " {:02X}", b)?;
                    }
                }
                Operand::Symbol(symbol) => write!(
                    f,
                    " {{e({}.{})}}",
                    crate::relocate::chunk_name(symbol.chunk),
                    crate::address::label(symbol.target)
                )?,
                Operand::Null => write!(f, " 00 00 00 00")?,
            }
        }
        write!(f, "]")
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Token::Char(ch) => write!(f, "{}", ch),
            Token::Raw(b) => write!(f, "[{:02X}]", b),
            Token::Control(cc) => write!(f, "{}", cc),
            Token::Text(text) => write!(f, "{}", text),
        }
    }
}
