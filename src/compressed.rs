//! Inline expansion of the compressed-text control codes `[15 xx]`,
//! `[16 xx]` and `[17 xx]`.
//!
//! The code selects a bank (0-2) and the operand an index. Together they
//! pick a 4-byte mapped pointer from a fixed table; the pointer leads to a
//! zero-terminated run of shifted characters.

use log::{debug, warn};

use crate::address::{self, MAPPED_LEN};
use crate::decoder::{shift_char, PLACEHOLDER};
use crate::error::{Result, ScriptError};
use crate::token::{Operand, Token};

/// First compressed-text code; the bank is `code - FIRST_CODE`.
pub const FIRST_CODE: u8 = 0x15;
pub const LAST_CODE: u8 = 0x17;

/// Default location of the compressed-text pointer table.
pub const DEFAULT_TABLE: usize = 0x8_CDED;

const ENTRIES_PER_BANK: usize = 0x100;

pub struct CompressedTextExpander<'a> {
    rom: &'a [u8],
    table: usize,
}

impl<'a> CompressedTextExpander<'a> {
    pub fn new(rom: &'a [u8], table: usize) -> Self {
        CompressedTextExpander { rom, table }
    }

    /// Offset of the table entry for `bank`/`index`.
    pub fn entry_offset(&self, bank: u8, index: u8) -> usize {
        self.table + (bank as usize * ENTRIES_PER_BANK + index as usize) * MAPPED_LEN
    }

    /// Text for compressed-text `code` with operand `index`.
    pub fn expand(&self, code: u8, index: u8) -> Result<String> {
        if !(FIRST_CODE..=LAST_CODE).contains(&code) {
            return Err(ScriptError::TableGap {
                offset: self.table,
                code,
                sub: Some(index),
            });
        }
        let bank = code - FIRST_CODE;
        let entry = self.entry_offset(bank, index);
        let raw = self
            .rom
            .get(entry..entry + MAPPED_LEN)
            .ok_or(ScriptError::OutOfBounds(entry))?;

        let mut at = address::from_mapped(raw);
        let mut text = String::new();
        loop {
            let byte = *self.rom.get(at).ok_or(ScriptError::OutOfBounds(at))?;
            if byte == 0 {
                break;
            }
            text.push(shift_char(byte).unwrap_or_else(|| {
                warn!("Invalid compressed character {:02X} at {:#x}", byte, at);
                PLACEHOLDER
            }));
            at += 1;
        }
        Ok(text)
    }

    /// Replace every compressed-text code in `tokens` with its text.
    /// Token positions do not change. Expanded text is not scanned again.
    pub fn expand_tokens(&self, tokens: &mut [Token]) -> Result<usize> {
        let mut expanded = 0;
        for token in tokens.iter_mut() {
            let Token::Control(cc) = token else {
                continue;
            };
            if !(FIRST_CODE..=LAST_CODE).contains(&cc.code) {
                continue;
            }
            let [Operand::Byte(index)] = cc.operands.as_slice() else {
                continue;
            };
            let text = self.expand(cc.code, *index)?;
            debug!("[{:02X} {:02X}] -> {:?}", cc.code, index, text);
            *token = Token::Text(text);
            expanded += 1;
        }
        Ok(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::to_mapped;
    use crate::decoder::TEXT_SHIFT;
    use crate::token::ControlCode;
    use test_log::test;

    const TABLE: usize = 0x40;

    fn rom_with_entry(bank: u8, index: u8, target: usize, text: &str) -> Vec<u8> {
        let mut rom = vec![0u8; 0x1000];
        let entry = TABLE + (bank as usize * 0x100 + index as usize) * 4;
        rom[entry..entry + 4].copy_from_slice(&to_mapped(target));
        for (i, b) in text.bytes().enumerate() {
            rom[target + i] = b + TEXT_SHIFT;
        }
        rom
    }

    #[test]
    fn test_bank_zero_index_zero() {
        let rom = rom_with_entry(0, 0, 0x800, "the ");
        let expander = CompressedTextExpander::new(&rom, TABLE);
        assert_eq!(expander.expand(0x15, 0).unwrap(), "the ");
    }

    #[test]
    fn test_bank_and_index_select_entry() {
        let rom = rom_with_entry(2, 0x10, 0x900, "Ness");
        let expander = CompressedTextExpander::new(&rom, TABLE);
        assert_eq!(expander.entry_offset(2, 0x10), TABLE + 0x210 * 4);
        assert_eq!(expander.expand(0x17, 0x10).unwrap(), "Ness");
    }

    #[test]
    fn test_expand_tokens_in_place() {
        let rom = rom_with_entry(1, 3, 0xA00, "you");
        let expander = CompressedTextExpander::new(&rom, TABLE);
        let mut tokens = vec![
            Token::Char('a'),
            Token::Control(ControlCode::new(0x16, &[3])),
            Token::Control(ControlCode::new(0x10, &[3])),
        ];
        assert_eq!(expander.expand_tokens(&mut tokens).unwrap(), 1);
        assert_eq!(tokens[1], Token::Text("you".to_string()));
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_unterminated_string_is_fatal() {
        let mut rom = rom_with_entry(0, 0, 0xFFE, "");
        rom[0xFFE] = 0x91;
        rom[0xFFF] = 0x91;
        let expander = CompressedTextExpander::new(&rom, TABLE);
        assert_eq!(expander.expand(0x15, 0), Err(ScriptError::OutOfBounds(0x1000)));
    }
}
