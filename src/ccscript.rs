//! Rendering of decoded blocks into CCScript source text.
//!
//! Blocks are first printed in bracketed form, with relocated pointers
//! turned into `goto(...)`, `call(...)` or `{e(...)}`. A fixed table of
//! plain string replacements then maps common control codes to CCScript
//! keywords and tidies up the quoting.

use crate::address;
use crate::opcode_tables::Role;
use crate::relocate::chunk_name;
use crate::token::{ControlCode, Operand, Token};

/// Applied in order to every rendered block.
pub const REPLACEMENTS: &[(&str, &str)] = &[
    ("[13][02]\"", "\" end"),
    ("[03][00]", "\" next\n\""),
    ("[00]", "\" newline\n\""),
    ("[02]\"", "\" eob"),
    ("[0F]", "{inc}"),
    ("[0D 00]", "{rtoarg}"),
    ("[0D 01]", "{ctoarg}"),
    ("[12]", "{clearline}"),
    ("[13]", "{wait}"),
    ("[14]", "{prompt}"),
    ("[18 00]", "{window_closetop}"),
    ("[18 04]", "{window_closeall}"),
    ("[18 06]", "{window_clear}"),
    ("[18 0A]", "{open_wallet}"),
    ("[1B 00]", "{store_registers}"),
    ("[1B 01]", "{load_registers}"),
    ("[1B 04]", "{swap}"),
    ("[1C 04]", "{open_hp}"),
    ("[1C 0D]", "{user}"),
    ("[1C 0E]", "{target}"),
    ("[1C 0F]", "{delta}"),
    ("[1C 08 01]  ", "{smash}"),
    ("[1C 08 02]  ", "{youwon}"),
    ("[1F 01 02]", "{music_stop}"),
    ("[1F 03]", "{music_resume}"),
    ("[1F 05]", "{music_switching_off}"),
    ("[1F 06]", "{music_switching_on}"),
    ("[1F B0]", "{save}"),
    ("[1F 30]", "{font_normal}"),
    ("[1F 31]", "{font_saturn}"),
    (" \"\"", ""),
    (" \"\" ", " "),
    (" \"\"", ""),
    ("\"\" ", ""),
];

fn symbol_call(cc: &ControlCode, keyword: &str) -> Option<String> {
    cc.operands.iter().find_map(|op| match op {
        Operand::Symbol(symbol) => Some(format!(
            "\" {}({}.{}) \"",
            keyword,
            chunk_name(symbol.chunk),
            address::label(symbol.target)
        )),
        _ => None,
    })
}

/// Print one token. Relocated jumps and calls break out of the string.
pub fn render_token(token: &Token) -> String {
    if let Token::Control(cc) = token {
        let keyword = match cc.symbol_role() {
            Some(Role::Goto) => Some("goto"),
            Some(Role::Call) => Some("call"),
            _ => None,
        };
        if let Some(call) = keyword.and_then(|keyword| symbol_call(cc, keyword)) {
            return call;
        }
    }
    token.to_string()
}

/// Print a block as a quoted CCScript string, before keyword replacement.
pub fn render_raw(tokens: &[Token]) -> String {
    let mut text = String::from("\"");
    for token in tokens {
        text.push_str(&render_token(token));
    }
    text.push('"');
    text
}

pub fn apply_replacements(text: &str) -> String {
    REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, &(from, to)| acc.replace(from, to))
}

/// Full CCScript body for a block.
pub fn render_block(tokens: &[Token]) -> String {
    apply_replacements(&render_raw(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Symbol;
    use test_log::test;

    fn chars(s: &str) -> Vec<Token> {
        s.chars().map(Token::Char).collect()
    }

    #[test]
    fn test_plain_block_ends_with_eob() {
        let mut tokens = chars("Hi");
        tokens.push(Token::Control(ControlCode::new(0x02, &[])));
        assert_eq!(render_block(&tokens), "\"Hi\" eob");
    }

    #[test]
    fn test_newline_and_prompt() {
        let mut tokens = chars("A");
        tokens.push(Token::Control(ControlCode::new(0x00, &[])));
        tokens.extend(chars("B"));
        tokens.push(Token::Control(ControlCode::new(0x13, &[])));
        tokens.push(Token::Control(ControlCode::new(0x02, &[])));
        assert_eq!(render_block(&tokens), "\"A\" newline\n\"B\" end");
    }

    #[test]
    fn test_goto_and_call() {
        let goto = ControlCode {
            code: 0x0A,
            operands: vec![Operand::Symbol(Symbol {
                target: 0x5_0000,
                chunk: 1,
                role: Role::Goto,
            })],
        };
        let call = ControlCode {
            code: 0x08,
            operands: vec![Operand::Symbol(Symbol {
                target: 0x5_0010,
                chunk: 0,
                role: Role::Call,
            })],
        };
        let mut tokens = vec![Token::Control(call)];
        tokens.extend(chars("x"));
        tokens.push(Token::Control(goto));
        assert_eq!(
            render_block(&tokens),
            "call(data_00.l_0xc50010) \"x\" goto(data_01.l_0xc50000)"
        );
    }

    #[test]
    fn test_null_goto_stays_bracketed() {
        let tokens = vec![Token::Control(ControlCode {
            code: 0x0A,
            operands: vec![Operand::Null],
        })];
        assert_eq!(render_block(&tokens), "\"[0A 00 00 00 00]\"");
    }

    #[test]
    fn test_embedded_symbol() {
        let tokens = vec![
            Token::Control(ControlCode {
                code: 0x1F,
                operands: vec![
                    Operand::Byte(0x63),
                    Operand::Symbol(Symbol {
                        target: 0x5_0000,
                        chunk: 2,
                        role: Role::Embed,
                    }),
                ],
            }),
            Token::Control(ControlCode::new(0x02, &[])),
        ];
        assert_eq!(
            render_block(&tokens),
            "\"[1F 63 {e(data_02.l_0xc50000)}]\" eob"
        );
    }
}
