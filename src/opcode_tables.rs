use std::collections::HashMap;
use std::ops::Range;

use crate::address::MAPPED_LEN;

/// Highest byte value that starts a control code. Everything above is text.
pub const CONTROL_CODE_MAX: u8 = 0x30;

/// How the operand length of a control code is determined.
#[derive(Debug, Clone, PartialEq)]
pub enum OpcodeRule {
    /// A fixed number of operand bytes
    Fixed(usize),
    /// A fixed number of operand bytes, after which the block ends
    Terminates(usize),
    /// `fixed + stride * operands[count_at]`
    Counted {
        fixed: usize,
        count_at: usize,
        stride: usize,
    },
    /// `then` if the first operand byte is one of `when`, else `otherwise`
    Select {
        when: &'static [u8],
        then: usize,
        otherwise: usize,
    },
    /// The first operand byte selects a rule from a sub-table
    Nested(HashMap<u8, OpcodeRule>),
}

/// Outcome of a length lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The code is followed by this many operand bytes
    Operands(usize),
    /// The code is followed by this many operand bytes and ends the block
    Terminates(usize),
    /// At least this many operand bytes must be visible to resolve the length
    NeedsMore(usize),
}

/// A lookup that fell outside the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableGap {
    pub code: u8,
    pub sub: Option<u8>,
}

// Primary table for codes 0x00..=0x30. `None` marks codes with a sub-table.
const PRIMARY: [Option<usize>; 0x31] = [
    Some(0), Some(0), Some(0), Some(0), Some(2), Some(2), Some(6), Some(2), // 00-07
    Some(4), None, Some(4), Some(1), Some(1), Some(1), Some(1), Some(0), // 08-0F
    Some(1), Some(0), Some(0), Some(0), Some(0), Some(1), Some(1), Some(1), // 10-17
    None, None, None, None, None, None, None, None, // 18-1F
    Some(0), Some(0), Some(0), Some(0), Some(0), Some(0), Some(0), Some(0), // 20-27
    Some(0), Some(0), Some(0), Some(0), Some(0), Some(0), Some(0), Some(0), // 28-2F
    Some(0), // 30
];

const WINDOW_CODES: &[(u8, usize)] = &[
    (0x00, 1), (0x01, 2), (0x02, 1), (0x03, 2), (0x04, 1), (0x05, 3),
    (0x06, 1), (0x07, 6), (0x08, 4), (0x09, 4), (0x0A, 1), (0x0D, 3),
];

const STRING_CODES: &[(u8, usize)] = &[
    (0x02, 1), (0x04, 1), (0x05, 4), (0x10, 2), (0x11, 2), (0x14, 1),
    (0x16, 3), (0x18, 2), (0x19, 3), (0x1A, 2), (0x1B, 2), (0x1C, 3),
    (0x1D, 3), (0x1E, 1), (0x1F, 1), (0x20, 1), (0x21, 2), (0x22, 5),
    (0x23, 6), (0x24, 6), (0x25, 2), (0x26, 2), (0x27, 2), (0x28, 2),
];

const MENU_CODES: &[(u8, usize)] = &[
    (0x00, 18), (0x01, 18), (0x04, 1), (0x05, 3), (0x06, 2), (0x07, 1),
    (0x08, 1), (0x09, 1), (0x0A, 1), (0x0B, 1),
];

const DISPLAY_CODES: &[(u8, usize)] = &[
    (0x00, 2), (0x01, 2), (0x02, 2), (0x03, 2), (0x04, 1), (0x05, 2),
    (0x06, 2), (0x07, 2), (0x08, 2), (0x09, 1), (0x0A, 5), (0x0B, 5),
    (0x0C, 2), (0x0D, 1), (0x0E, 1), (0x0F, 1), (0x11, 2), (0x12, 2),
    (0x13, 3), (0x14, 2), (0x15, 2),
];

const ITEM_CODES: &[(u8, usize)] = &[
    (0x00, 3), (0x01, 3), (0x02, 2), (0x03, 2), (0x04, 3), (0x05, 3),
    (0x06, 5), (0x07, 5), (0x08, 3), (0x09, 3), (0x0A, 2), (0x0B, 2),
    (0x0C, 3), (0x0D, 4), (0x0E, 3), (0x0F, 3), (0x10, 3), (0x11, 3),
    (0x12, 3), (0x13, 3), (0x14, 5), (0x15, 3), (0x17, 5), (0x18, 2),
    (0x19, 2), (0x20, 1), (0x21, 2), (0x22, 1), (0x23, 2), (0x24, 2),
];

// 0x1F C0 is counted and is added separately.
const MISC_CODES: &[(u8, usize)] = &[
    (0x00, 3), (0x01, 2), (0x02, 2), (0x03, 1), (0x04, 2), (0x05, 1),
    (0x06, 1), (0x07, 2), (0x11, 2), (0x12, 2), (0x13, 3), (0x14, 2),
    (0x15, 6), (0x16, 4), (0x17, 6), (0x18, 8), (0x19, 8), (0x1A, 4),
    (0x1B, 3), (0x1C, 3), (0x1D, 2), (0x1E, 4), (0x1F, 4), (0x20, 3),
    (0x21, 2), (0x23, 3), (0x30, 1), (0x31, 1), (0x41, 2), (0x50, 1),
    (0x51, 1), (0x52, 2), (0x60, 2), (0x61, 1), (0x62, 2), (0x63, 5),
    (0x64, 1), (0x65, 1), (0x66, 7), (0x67, 2), (0x68, 1), (0x69, 1),
    (0x71, 3), (0x81, 3), (0x83, 3), (0x90, 1), (0xA0, 1), (0xA1, 1),
    (0xA2, 1), (0xB0, 1), (0xD0, 2), (0xD1, 1), (0xD2, 2), (0xD3, 2),
    (0xE1, 4), (0xE4, 4), (0xE5, 2), (0xE6, 3), (0xE7, 3), (0xE8, 2),
    (0xE9, 3), (0xEA, 3), (0xEB, 3), (0xEC, 3), (0xED, 1), (0xEE, 3),
    (0xEF, 3), (0xF0, 1), (0xF1, 5), (0xF2, 5), (0xF3, 4), (0xF4, 3),
];

fn sub_table(entries: &[(u8, usize)]) -> HashMap<u8, OpcodeRule> {
    entries
        .iter()
        .map(|&(sub, len)| (sub, OpcodeRule::Fixed(len)))
        .collect()
}

lazy_static! {
    static ref STANDARD: OpcodeTable = OpcodeTable::build();
}

/// Operand length rules for every control code.
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    rules: HashMap<u8, OpcodeRule>,
}

impl OpcodeTable {
    /// The table for the documented EarthBound instruction set.
    pub fn standard() -> &'static OpcodeTable {
        &STANDARD
    }

    fn build() -> Self {
        let mut rules = HashMap::new();
        for (code, len) in PRIMARY.iter().enumerate() {
            if let Some(len) = len {
                rules.insert(code as u8, OpcodeRule::Fixed(*len));
            }
        }

        // End of block, and goto (which also ends the block)
        rules.insert(0x02, OpcodeRule::Terminates(0));
        rules.insert(0x0A, OpcodeRule::Terminates(4));

        rules.insert(
            0x09,
            OpcodeRule::Counted {
                fixed: 1,
                count_at: 0,
                stride: MAPPED_LEN,
            },
        );
        rules.insert(
            0x1B,
            OpcodeRule::Select {
                when: &[0x02, 0x03],
                then: 5,
                otherwise: 1,
            },
        );
        rules.insert(
            0x1E,
            OpcodeRule::Select {
                when: &[0x09],
                then: 5,
                otherwise: 3,
            },
        );

        rules.insert(0x18, OpcodeRule::Nested(sub_table(WINDOW_CODES)));
        rules.insert(0x19, OpcodeRule::Nested(sub_table(STRING_CODES)));
        rules.insert(0x1A, OpcodeRule::Nested(sub_table(MENU_CODES)));
        rules.insert(0x1C, OpcodeRule::Nested(sub_table(DISPLAY_CODES)));
        rules.insert(0x1D, OpcodeRule::Nested(sub_table(ITEM_CODES)));

        let mut misc = sub_table(MISC_CODES);
        misc.insert(
            0xC0,
            OpcodeRule::Counted {
                fixed: 2,
                count_at: 1,
                stride: MAPPED_LEN,
            },
        );
        rules.insert(0x1F, OpcodeRule::Nested(misc));

        OpcodeTable { rules }
    }

    pub fn rule(&self, code: u8) -> Option<&OpcodeRule> {
        self.rules.get(&code)
    }

    /// Resolve the operand length of `code`, given the bytes that follow it.
    pub fn length_of(&self, code: u8, peek: &[u8]) -> Result<Resolution, TableGap> {
        let rule = self.rule(code).ok_or(TableGap { code, sub: None })?;
        Self::resolve(code, rule, peek)
    }

    fn resolve(code: u8, rule: &OpcodeRule, peek: &[u8]) -> Result<Resolution, TableGap> {
        match rule {
            OpcodeRule::Fixed(len) => Ok(Resolution::Operands(*len)),
            OpcodeRule::Terminates(len) => Ok(Resolution::Terminates(*len)),
            OpcodeRule::Counted {
                fixed,
                count_at,
                stride,
            } => match peek.get(*count_at) {
                Some(&count) => Ok(Resolution::Operands(fixed + stride * count as usize)),
                None => Ok(Resolution::NeedsMore(count_at + 1)),
            },
            OpcodeRule::Select {
                when,
                then,
                otherwise,
            } => match peek.first() {
                Some(sub) if when.contains(sub) => Ok(Resolution::Operands(*then)),
                Some(_) => Ok(Resolution::Operands(*otherwise)),
                None => Ok(Resolution::NeedsMore(1)),
            },
            OpcodeRule::Nested(table) => {
                let Some(&sub) = peek.first() else {
                    return Ok(Resolution::NeedsMore(1));
                };
                let inner = table.get(&sub).ok_or(TableGap {
                    code,
                    sub: Some(sub),
                })?;
                Self::resolve(code, inner, peek)
            }
        }
    }
}

/// What a pointer operand means to the script that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Unconditional jump; the containing block ends here
    Goto,
    /// Subroutine call
    Call,
    /// Address embedded in some other control code
    Embed,
}

/// How the pointers are laid out inside a control code's operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Single,
    Group,
    GroupWithTrailing(usize),
}

/// One of the pointer-bearing control code shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerShape {
    /// Operand bytes before the first pointer
    pub prefix: usize,
    pub arity: Arity,
    pub role: Role,
}

impl PointerShape {
    const fn new(prefix: usize, arity: Arity, role: Role) -> Self {
        PointerShape {
            prefix,
            arity,
            role,
        }
    }

    /// Operand ranges holding pointers, for an operand list of `len` bytes.
    pub fn fields(&self, len: usize) -> Vec<Range<usize>> {
        let end = match self.arity {
            Arity::Single => (self.prefix + MAPPED_LEN).min(len),
            Arity::Group => len,
            Arity::GroupWithTrailing(trailing) => len.saturating_sub(trailing),
        };
        let mut fields = Vec::new();
        let mut start = self.prefix;
        while start + MAPPED_LEN <= end {
            fields.push(start..start + MAPPED_LEN);
            start += MAPPED_LEN;
        }
        fields
    }
}

/// Classify a decoded control code as one of the eight pointer shapes.
pub fn pointer_shape(code: u8, operands: &[u8]) -> Option<PointerShape> {
    let sub = operands.first().copied();
    match (code, sub) {
        (0x06, _) => Some(PointerShape::new(2, Arity::Single, Role::Embed)),
        (0x08, _) => Some(PointerShape::new(0, Arity::Single, Role::Call)),
        (0x09, _) => Some(PointerShape::new(1, Arity::Group, Role::Embed)),
        (0x0A, _) => Some(PointerShape::new(0, Arity::Single, Role::Goto)),
        (0x1A, Some(0x00 | 0x01)) => Some(PointerShape::new(
            1,
            Arity::GroupWithTrailing(1),
            Role::Embed,
        )),
        (0x1B, Some(0x02 | 0x03)) => Some(PointerShape::new(1, Arity::Single, Role::Embed)),
        (0x1F, Some(0x63)) => Some(PointerShape::new(1, Arity::Single, Role::Embed)),
        (0x1F, Some(0xC0)) => Some(PointerShape::new(2, Arity::Group, Role::Embed)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_fixed_lengths() {
        let table = OpcodeTable::standard();
        assert_eq!(table.length_of(0x00, &[]), Ok(Resolution::Operands(0)));
        assert_eq!(table.length_of(0x06, &[]), Ok(Resolution::Operands(6)));
        assert_eq!(table.length_of(0x15, &[]), Ok(Resolution::Operands(1)));
        assert_eq!(table.length_of(0x30, &[]), Ok(Resolution::Operands(0)));
    }

    #[test]
    fn test_terminators() {
        let table = OpcodeTable::standard();
        assert_eq!(table.length_of(0x02, &[]), Ok(Resolution::Terminates(0)));
        assert_eq!(table.length_of(0x0A, &[]), Ok(Resolution::Terminates(4)));
    }

    #[test]
    fn test_counted_pointer_lists() {
        let table = OpcodeTable::standard();
        assert_eq!(table.length_of(0x09, &[3]), Ok(Resolution::Operands(13)));
        assert_eq!(table.length_of(0x09, &[]), Ok(Resolution::NeedsMore(1)));
        assert_eq!(
            table.length_of(0x1F, &[0xC0, 2]),
            Ok(Resolution::Operands(10))
        );
        assert_eq!(
            table.length_of(0x1F, &[0xC0]),
            Ok(Resolution::NeedsMore(2))
        );
    }

    #[test]
    fn test_select_rules() {
        let table = OpcodeTable::standard();
        assert_eq!(table.length_of(0x1B, &[0x02]), Ok(Resolution::Operands(5)));
        assert_eq!(table.length_of(0x1B, &[0x04]), Ok(Resolution::Operands(1)));
        assert_eq!(table.length_of(0x1E, &[0x09]), Ok(Resolution::Operands(5)));
        assert_eq!(table.length_of(0x1E, &[0x00]), Ok(Resolution::Operands(3)));
    }

    #[test]
    fn test_nested_rules() {
        let table = OpcodeTable::standard();
        assert_eq!(table.length_of(0x1A, &[0x01]), Ok(Resolution::Operands(18)));
        assert_eq!(table.length_of(0x1F, &[0x66]), Ok(Resolution::Operands(7)));
        assert_eq!(table.length_of(0x1D, &[0x24]), Ok(Resolution::Operands(2)));
        assert_eq!(table.length_of(0x18, &[]), Ok(Resolution::NeedsMore(1)));
    }

    #[test]
    fn test_gaps_are_reported() {
        let table = OpcodeTable::standard();
        assert_eq!(
            table.length_of(0x1F, &[0x08]),
            Err(TableGap {
                code: 0x1F,
                sub: Some(0x08)
            })
        );
        assert_eq!(
            table.length_of(0x31, &[]),
            Err(TableGap {
                code: 0x31,
                sub: None
            })
        );
    }

    #[test]
    fn test_pointer_shapes() {
        assert_eq!(pointer_shape(0x0A, &[0; 4]).map(|s| s.role), Some(Role::Goto));
        assert_eq!(pointer_shape(0x08, &[0; 4]).map(|s| s.role), Some(Role::Call));
        assert!(pointer_shape(0x1B, &[0x00]).is_none());
        assert!(pointer_shape(0x1F, &[0x66, 0, 0, 0, 0, 0, 0]).is_none());

        let menu = pointer_shape(0x1A, &[0x00; 18]).unwrap();
        assert_eq!(menu.fields(18), vec![1..5, 5..9, 9..13, 13..17]);

        let list = pointer_shape(0x1F, &[0xC0, 2, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(list.fields(10), vec![2..6, 6..10]);

        let flag = pointer_shape(0x06, &[0; 6]).unwrap();
        assert_eq!(flag.fields(6), vec![2..6]);
    }
}
