//! CoilSnake project tables: extra pointer roots on the way in, label
//! patching on the way out.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info};
use serde_yaml::Value;

use crate::address;
use crate::config::CoilSnakeConfig;
use crate::error::{Result, ScriptError};
use crate::relocate::OutputAssignment;

/// Marker file every CoilSnake project has at its root.
pub const PROJECT_FILE: &str = "Project.snake";

/// Parse a pointer field value into a buffer offset.
///
/// CoilSnake writes `$c5xxxx`; a project we already patched holds
/// `data_NN.l_0xc5xxxx`. Null and below-bank values give `None`.
pub fn parse_pointer(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => {
            let digits = match text.split_once(".l_") {
                Some((_, label)) => label,
                None => text.as_str(),
            };
            address::parse_snes_hex(digits).filter(|&offset| offset > 0)
        }
        Value::Number(n) => n
            .as_u64()
            .and_then(|raw| address::parse_snes_hex(&format!("{:x}", raw)))
            .filter(|&offset| offset > 0),
        _ => None,
    }
}

/// Rewrite `Event Flag: <decimal>` lines to hexadecimal.
pub fn hex_event_flags(text: &str) -> String {
    const KEY: &str = "Event Flag: ";
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let rewritten = line.find(KEY).and_then(|at| {
            let value_start = at + KEY.len();
            let rest = &line[value_start..];
            let digits = rest.trim_end_matches(['\n', '\r']);
            let flag: u64 = digits.parse().ok()?;
            Some(format!(
                "{}{:#x}{}",
                &line[..value_start],
                flag,
                &rest[digits.len()..]
            ))
        });
        match rewritten {
            Some(line) => out.push_str(&line),
            None => out.push_str(line),
        }
    }
    out
}

pub struct Project {
    dir: PathBuf,
    pointer_fields: Vec<String>,
    tables: IndexMap<String, Value>,
}

impl Project {
    /// Open the project at `dir` and load every configured table.
    pub fn open<P: AsRef<Path>>(dir: P, config: &CoilSnakeConfig) -> Result<Project> {
        let dir = dir.as_ref().to_path_buf();
        let marker = dir.join(PROJECT_FILE);
        if !marker.is_file() {
            return Err(ScriptError::Project(format!(
                "Failed to open \"{}\". Invalid CoilSnake project.",
                marker.display()
            )));
        }

        let mut tables = IndexMap::new();
        for name in &config.files {
            let path = dir.join(name);
            let text = fs::read_to_string(&path).map_err(|e| {
                ScriptError::Project(format!("{}: {}", path.display(), e))
            })?;
            tables.insert(name.clone(), serde_yaml::from_str(&text)?);
            debug!("Loaded table {}", name);
        }

        Ok(Project {
            dir,
            pointer_fields: config.pointer_fields.clone(),
            tables,
        })
    }

    /// Build a project from tables already in memory.
    pub fn from_tables(
        dir: PathBuf,
        pointer_fields: Vec<String>,
        tables: IndexMap<String, Value>,
    ) -> Project {
        Project {
            dir,
            pointer_fields,
            tables,
        }
    }

    pub fn table(&self, name: &str) -> Option<&Value> {
        self.tables.get(name)
    }

    fn pointer_values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.tables
            .values()
            .filter_map(Value::as_mapping)
            .flat_map(|entries| entries.values())
            .filter_map(Value::as_mapping)
            .flat_map(move |entry| {
                self.pointer_fields
                    .iter()
                    .filter_map(move |field| entry.get(field.as_str()))
            })
    }

    /// Every text pointer in the project, sorted and deduplicated.
    pub fn roots(&self) -> Vec<usize> {
        let mut roots: Vec<usize> = self.pointer_values().filter_map(parse_pointer).collect();
        roots.sort_unstable();
        roots.dedup();
        info!("Read {} pointers from the CoilSnake project", roots.len());
        roots
    }

    /// Replace every text pointer with its `data_NN.l_0x...` label.
    pub fn patch(&mut self, assignment: &OutputAssignment) -> Result<usize> {
        let mut patched = 0;
        for table in self.tables.values_mut() {
            let Some(entries) = table.as_mapping_mut() else {
                continue;
            };
            for entry in entries.values_mut() {
                let Some(entry) = entry.as_mapping_mut() else {
                    continue;
                };
                for field in &self.pointer_fields {
                    let Some(value) = entry.get_mut(field.as_str()) else {
                        continue;
                    };
                    let Some(target) = parse_pointer(value) else {
                        continue;
                    };
                    let label = assignment.qualified_label(target).ok_or_else(|| {
                        ScriptError::Project(format!(
                            "{} {:#x} is not a known block",
                            field,
                            address::snes_address(target)
                        ))
                    })?;
                    *value = Value::String(label);
                    patched += 1;
                }
            }
        }
        info!("Patched {} project pointers", patched);
        Ok(patched)
    }

    /// Write every table back to the project directory.
    pub fn save(&self) -> Result<()> {
        for (name, table) in &self.tables {
            let text = hex_event_flags(&serde_yaml::to_string(table)?);
            fs::write(self.dir.join(name), text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const NPC_TABLE: &str = r#"
0:
  Direction: down
  Event Flag: 0
  Text Pointer 1: $c50000
  Text Pointer 2: $0
1:
  Direction: up
  Event Flag: 26
  Text Pointer 1: data_00.l_0xc50010
  Text Pointer 2: $c50000
"#;

    fn project() -> Project {
        let mut tables = IndexMap::new();
        tables.insert(
            "npc_config_table.yml".to_string(),
            serde_yaml::from_str(NPC_TABLE).unwrap(),
        );
        Project::from_tables(
            std::env::temp_dir(),
            vec!["Text Pointer 1".to_string(), "Text Pointer 2".to_string()],
            tables,
        )
    }

    #[test]
    fn test_parse_pointer_forms() {
        assert_eq!(parse_pointer(&Value::from("$c50000")), Some(0x5_0000));
        assert_eq!(
            parse_pointer(&Value::from("data_03.l_0xc5a000")),
            Some(0x5_A000)
        );
        assert_eq!(parse_pointer(&Value::from("$0")), None);
        assert_eq!(parse_pointer(&Value::from("$c00000")), None);
        assert_eq!(parse_pointer(&Value::from(12)), None);
    }

    #[test]
    fn test_roots_are_sorted_and_unique() {
        assert_eq!(project().roots(), vec![0x5_0000, 0x5_0010]);
    }

    #[test]
    fn test_patch_rewrites_pointer_fields() {
        let mut project = project();
        let assignment = OutputAssignment::new([0x5_0000, 0x5_0010], 100);
        assert_eq!(project.patch(&assignment).unwrap(), 3);

        let table = project.table("npc_config_table.yml").unwrap();
        let first = &table[0]["Text Pointer 1"];
        assert_eq!(first.as_str(), Some("data_00.l_0xc50000"));
        assert_eq!(table[0]["Text Pointer 2"].as_str(), Some("$0"));
    }

    #[test]
    fn test_patch_unknown_target_is_an_error() {
        let mut project = project();
        let assignment = OutputAssignment::new([0x5_0000], 100);
        assert!(matches!(
            project.patch(&assignment),
            Err(ScriptError::Project(_))
        ));
    }

    #[test]
    fn test_event_flags_become_hex() {
        let text = "0:\n  Event Flag: 26\n  Other: 26\n";
        assert_eq!(
            hex_event_flags(text),
            "0:\n  Event Flag: 0x1a\n  Other: 26\n"
        );
    }
}
