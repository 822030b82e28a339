use log::{trace, warn};

use crate::address;
use crate::error::{Result, ScriptError};
use crate::opcode_tables::{pointer_shape, OpcodeTable, Resolution, CONTROL_CODE_MAX};
use crate::token::{ControlCode, Operand, Token};

/// Text bytes are stored as `char + TEXT_SHIFT`.
pub const TEXT_SHIFT: u8 = 0x30;

/// Literal quote; kept bracketed so it cannot close a CCScript string.
pub const QUOTE_BYTE: u8 = 0x52;
/// Literal backslash; kept bracketed for the same reason.
pub const BACKSLASH_BYTE: u8 = 0x8C;

/// Substituted for bytes that do not shift to a printable character.
pub const PLACEHOLDER: char = '_';

/// Result of decoding one block.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub tokens: Vec<Token>,
    /// Offset of the first byte not consumed
    pub end: usize,
    /// Non-null pointer targets found in the decoded control codes
    pub pointers: Vec<usize>,
    /// True if decoding stopped on a block-ending code rather than `stop`
    pub terminated: bool,
}

/// Shift a text byte down to its character, or `None` if the result is not
/// printable.
pub fn shift_char(byte: u8) -> Option<char> {
    let ch = char::from(byte.checked_sub(TEXT_SHIFT)?);
    if ch.is_control() {
        None
    } else {
        Some(ch)
    }
}

/// Build a control code from its raw operand bytes, tagging every pointer
/// field when the code has a pointer-bearing shape.
pub fn tag_pointers(code: u8, bytes: &[u8]) -> ControlCode {
    let Some(shape) = pointer_shape(code, bytes) else {
        return ControlCode::new(code, bytes);
    };

    let mut operands = Vec::with_capacity(bytes.len());
    let mut i = 0;
    for field in shape.fields(bytes.len()) {
        operands.extend(bytes[i..field.start].iter().map(|&b| Operand::Byte(b)));
        operands.push(Operand::Pointer(address::from_mapped(&bytes[field.clone()])));
        i = field.end;
    }
    operands.extend(bytes[i..].iter().map(|&b| Operand::Byte(b)));

    ControlCode { code, operands }
}

/// Walks the text bytecode one code or character at a time.
pub struct BlockDecoder<'a> {
    rom: &'a [u8],
    table: &'a OpcodeTable,
}

impl<'a> BlockDecoder<'a> {
    pub fn new(rom: &'a [u8], table: &'a OpcodeTable) -> Self {
        BlockDecoder { rom, table }
    }

    pub fn rom(&self) -> &'a [u8] {
        self.rom
    }

    /// Decode from `start` until a block-ending code, or until `stop` is
    /// reached if given.
    ///
    /// Stepping over `stop` without landing on it is an error: `stop` must
    /// be an instruction boundary of this block.
    pub fn decode(&self, start: usize, stop: Option<usize>) -> Result<Decoded> {
        let mut tokens = Vec::new();
        let mut pointers = Vec::new();
        let mut terminated = false;
        let mut i = start;

        loop {
            if let Some(stop) = stop {
                if i == stop {
                    break;
                }
                if i > stop {
                    return Err(ScriptError::MisalignedStop(start, stop));
                }
            }

            let at = i;
            let c = *self.rom.get(at).ok_or(ScriptError::OutOfBounds(at))?;
            i += 1;

            if c <= CONTROL_CODE_MAX {
                let (len, terminates) = self.operand_length(at, c)?;
                let bytes = self
                    .rom
                    .get(i..i + len)
                    .ok_or(ScriptError::OutOfBounds(self.rom.len()))?;
                i += len;

                let cc = tag_pointers(c, bytes);
                trace!("{:#x}: {}", at, cc);
                pointers.extend(cc.pointer_targets().filter(|&target| target != 0));
                tokens.push(Token::Control(cc));

                if terminates {
                    terminated = true;
                    break;
                }
            } else if c == QUOTE_BYTE || c == BACKSLASH_BYTE {
                tokens.push(Token::Raw(c));
            } else {
                let ch = shift_char(c).unwrap_or_else(|| {
                    warn!("Invalid character {:02X} at {:#x}", c, at);
                    PLACEHOLDER
                });
                tokens.push(Token::Char(ch));
            }
        }

        Ok(Decoded {
            tokens,
            end: i,
            pointers,
            terminated,
        })
    }

    fn operand_length(&self, at: usize, code: u8) -> Result<(usize, bool)> {
        let peek = self.rom.get(at + 1..).unwrap_or(&[]);
        let resolution = self
            .table
            .length_of(code, peek)
            .map_err(|gap| ScriptError::TableGap {
                offset: at,
                code: gap.code,
                sub: gap.sub,
            })?;
        match resolution {
            Resolution::Operands(len) => Ok((len, false)),
            Resolution::Terminates(len) => Ok((len, true)),
            Resolution::NeedsMore(_) => Err(ScriptError::OutOfBounds(self.rom.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::to_mapped;
    use test_log::test;

    fn text(s: &str) -> Vec<u8> {
        s.bytes().map(|b| b + TEXT_SHIFT).collect()
    }

    fn decode(rom: &[u8], start: usize, stop: Option<usize>) -> Result<Decoded> {
        BlockDecoder::new(rom, OpcodeTable::standard()).decode(start, stop)
    }

    #[test]
    fn test_literal_block_with_goto_terminator() {
        let mut rom = vec![0xFF; 4];
        rom.extend(text("Hello"));
        rom.push(0x0A);
        rom.extend([0, 0, 0, 0]);
        rom.extend(text("next"));

        let decoded = decode(&rom, 4, None).unwrap();
        assert_eq!(decoded.end, 4 + 5 + 1 + 4);
        assert!(decoded.terminated);
        assert!(decoded.pointers.is_empty());
        assert_eq!(decoded.tokens.len(), 6);
        assert_eq!(decoded.tokens[0], Token::Char('H'));
    }

    #[test]
    fn test_end_of_block_code() {
        let mut rom = text("Hi");
        rom.push(0x02);
        let decoded = decode(&rom, 0, None).unwrap();
        assert_eq!(decoded.end, 3);
        assert_eq!(
            decoded.tokens.last(),
            Some(&Token::Control(ControlCode::new(0x02, &[])))
        );
    }

    #[test]
    fn test_pointer_list_yields_two_candidates() {
        let mut rom = vec![0x09, 0x02];
        rom.extend(to_mapped(0x5_1234));
        rom.extend(to_mapped(0x8_0000));
        rom.push(0x02);

        let decoded = decode(&rom, 0, None).unwrap();
        assert_eq!(decoded.pointers, vec![0x5_1234, 0x8_0000]);
        assert_eq!(decoded.end, rom.len());
    }

    #[test]
    fn test_null_pointers_are_not_candidates() {
        let mut rom = vec![0x08, 0, 0, 0, 0];
        rom.extend([0x1B, 0x02]);
        rom.extend(to_mapped(0x6_0000));
        rom.push(0x02);

        let decoded = decode(&rom, 0, None).unwrap();
        assert_eq!(decoded.pointers, vec![0x6_0000]);
        let call = decoded.tokens[0].as_control().unwrap();
        assert_eq!(call.operands, vec![Operand::Pointer(0)]);
    }

    #[test]
    fn test_menu_pointers_keep_trailing_byte() {
        let mut rom = vec![0x1A, 0x01];
        for target in [0x5_0000, 0, 0x5_0100, 0] {
            rom.extend(to_mapped(target));
        }
        rom.push(0x07);
        rom.push(0x02);

        let decoded = decode(&rom, 0, None).unwrap();
        assert_eq!(decoded.pointers, vec![0x5_0000, 0x5_0100]);
        let menu = decoded.tokens[0].as_control().unwrap();
        assert_eq!(menu.operands.len(), 1 + 4 + 1);
        assert_eq!(menu.operands.last(), Some(&Operand::Byte(0x07)));
    }

    #[test]
    fn test_quote_and_backslash_stay_raw() {
        let rom = vec![QUOTE_BYTE, BACKSLASH_BYTE, 0x02];
        let decoded = decode(&rom, 0, None).unwrap();
        assert_eq!(decoded.tokens[0], Token::Raw(QUOTE_BYTE));
        assert_eq!(decoded.tokens[1], Token::Raw(BACKSLASH_BYTE));
    }

    #[test]
    fn test_invalid_character_is_replaced() {
        let rom = vec![0x31, 0x02];
        let decoded = decode(&rom, 0, None).unwrap();
        assert_eq!(decoded.tokens[0], Token::Char(PLACEHOLDER));
    }

    #[test]
    fn test_stop_offset() {
        let mut rom = text("abcdef");
        rom.push(0x02);
        let decoded = decode(&rom, 0, Some(3)).unwrap();
        assert_eq!(decoded.end, 3);
        assert!(!decoded.terminated);
        assert_eq!(decoded.tokens.len(), 3);
    }

    #[test]
    fn test_stop_inside_instruction_is_an_error() {
        let mut rom = vec![0x04, 0x01, 0x00];
        rom.push(0x02);
        assert_eq!(
            decode(&rom, 0, Some(2)),
            Err(ScriptError::MisalignedStop(0, 2))
        );
    }

    #[test]
    fn test_missing_terminator_runs_out_of_bounds() {
        let rom = text("abc");
        assert_eq!(decode(&rom, 0, None), Err(ScriptError::OutOfBounds(3)));
    }

    #[test]
    fn test_truncated_operands() {
        let rom = vec![0x0A, 0x00];
        assert_eq!(decode(&rom, 0, None), Err(ScriptError::OutOfBounds(2)));
    }

    #[test]
    fn test_unknown_sub_code_is_fatal() {
        let rom = vec![0x41, 0x1F, 0x08, 0x02];
        assert_eq!(
            decode(&rom, 0, None),
            Err(ScriptError::TableGap {
                offset: 1,
                code: 0x1F,
                sub: Some(0x08)
            })
        );
    }
}
