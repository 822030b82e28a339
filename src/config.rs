use std::fs;
use std::ops::Range;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::compressed;
use crate::error::Result;
use crate::relocate::CHUNK_SIZE;

/// Text banks scanned linearly for dialogue blocks.
pub const TEXT_DATA: [[usize; 2]; 4] = [
    [0x5_0000, 0x5_1B12],
    [0x5_1B12, 0x8_BC2C],
    [0x8_D9ED, 0x9_FF2F],
    [0x2F_4E20, 0x2F_A37A],
];

/// Tables in a CoilSnake project that hold text pointers.
pub const COILSNAKE_FILES: [&str; 6] = [
    "battle_action_table.yml",
    "enemy_configuration_table.yml",
    "item_configuration_table.yml",
    "npc_config_table.yml",
    "telephone_contacts_table.yml",
    "timed_delivery_table.yml",
];

/// Field names in those tables that hold text pointers.
pub const COILSNAKE_POINTERS: [&str; 9] = [
    "Text Address",
    "Death Text Pointer",
    "Encounter Text Pointer",
    "Help Text Pointer",
    "Text Pointer 1",
    "Text Pointer 2",
    "Text Pointer",
    "Delivery Failure Text Pointer",
    "Delivery Success Text Pointer",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoilSnakeConfig {
    pub files: Vec<String>,
    pub pointer_fields: Vec<String>,
}

impl Default for CoilSnakeConfig {
    fn default() -> Self {
        CoilSnakeConfig {
            files: COILSNAKE_FILES.iter().map(|s| s.to_string()).collect(),
            pointer_fields: COILSNAKE_POINTERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Settings for one extraction run. Any key left out of a config file
/// keeps its EarthBound default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[start, end)` offsets of the linearly scanned text banks
    pub text_ranges: Vec<[usize; 2]>,
    /// Offset of the compressed-text pointer table
    pub compressed_text_table: usize,
    /// Blocks per output file
    pub chunk_size: usize,
    pub coilsnake: CoilSnakeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            text_ranges: TEXT_DATA.to_vec(),
            compressed_text_table: compressed::DEFAULT_TABLE,
            chunk_size: CHUNK_SIZE,
            coilsnake: CoilSnakeConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Scan ranges, sorted by start.
    pub fn ranges(&self) -> Vec<Range<usize>> {
        let mut ranges: Vec<Range<usize>> = self
            .text_ranges
            .iter()
            .map(|&[start, end]| start..end)
            .collect();
        ranges.sort_by_key(|range| range.start);
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptError;
    use test_log::test;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ranges()[0], 0x5_0000..0x5_1B12);
        assert_eq!(config.compressed_text_table, 0x8_CDED);
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.coilsnake.files.len(), 6);
        assert_eq!(config.coilsnake.pointer_fields.len(), 9);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
            chunk_size = 50
            text_ranges = [[0x2F4E20, 0x2FA37A], [0x50000, 0x51B12]]
            "#,
        )
        .unwrap();
        assert_eq!(config.chunk_size, 50);
        assert_eq!(config.compressed_text_table, 0x8_CDED);
        assert_eq!(
            config.ranges(),
            vec![0x5_0000..0x5_1B12, 0x2F_4E20..0x2F_A37A]
        );
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::from_toml("chunk_size = \"many\""),
            Err(ScriptError::Config(_))
        ));
    }
}
