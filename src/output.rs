use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::address;
use crate::dialogue::Dialogue;
use crate::error::Result;
use crate::relocate::chunk_name;

fn header() -> String {
    format!(
        "/*\n * EarthBound Text Dump\n * Generated using ccscriptwriter {}.\n */\n\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Text of `data_NN.ccs` for `chunk`.
pub fn render_chunk(dialogue: &Dialogue, chunk: usize) -> String {
    let prefix = format!("{}.", chunk_name(chunk));
    let mut out = header();
    out.push_str("command e(label) \"{long label}\"\n");
    out.push_str("\n// Text Data\n");

    for block in dialogue.assignment().addresses(chunk) {
        let _ = writeln!(out, "{}:", address::label(block));
        let script = dialogue
            .scripts()
            .get(&block)
            .map(String::as_str)
            .unwrap_or_default();
        for line in script.split('\n') {
            let _ = writeln!(out, "    {}", line.replace(&prefix, ""));
        }
        out.push('\n');
    }
    out
}

/// Text of `main.ccs`: one ROM overwrite per block.
pub fn render_main(dialogue: &Dialogue) -> String {
    let mut out = header();
    out.push_str("// DO NOT EDIT THIS FILE.");
    for chunk in 0..dialogue.assignment().chunk_count() {
        let _ = write!(
            out,
            "\n\n// Memory Overwriting: {}.ccs",
            chunk_name(chunk)
        );
        for block in dialogue.assignment().addresses(chunk) {
            let _ = write!(
                out,
                "\nROM[{:#x}] = goto({}.{})",
                address::snes_address(block),
                chunk_name(chunk),
                address::label(block)
            );
        }
    }
    out.push('\n');
    out
}

/// Write `main.ccs` and every `data_NN.ccs` into `dir`.
pub fn write_dialogue<P: AsRef<Path>>(dir: P, dialogue: &Dialogue) -> Result<()> {
    let dir = dir.as_ref();
    info!("Writing data to {}...", dir.display());
    fs::create_dir_all(dir)?;

    let chunks = dialogue.assignment().chunk_count();
    for chunk in 0..chunks {
        let path = dir.join(format!("{}.ccs", chunk_name(chunk)));
        fs::write(&path, render_chunk(dialogue, chunk))?;
        debug!("Wrote {}", path.display());
    }
    fs::write(dir.join("main.ccs"), render_main(dialogue))?;
    info!("Wrote {} data files", chunks);
    Ok(())
}
