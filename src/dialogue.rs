use std::collections::BTreeMap;

use log::info;

use crate::ccscript;
use crate::compressed::CompressedTextExpander;
use crate::config::Config;
use crate::discovery::{self, BlockMap};
use crate::error::Result;
use crate::opcode_tables::OpcodeTable;
use crate::relocate::{OutputAssignment, PointerReference, Relocator};

/// All dialogue extracted from one ROM image.
pub struct Dialogue<'a> {
    rom: &'a [u8],
    config: Config,
    blocks: BlockMap,
    assignment: OutputAssignment,
    references: Vec<PointerReference>,
    scripts: BTreeMap<usize, String>,
}

impl<'a> Dialogue<'a> {
    /// Decode every text bank and resolve `roots` plus all pointers found
    /// along the way. Fails without partial output if any pointer cannot be
    /// placed.
    pub fn load(rom: &'a [u8], config: &Config, roots: &[usize]) -> Result<Self> {
        info!("Loading dialogue...");
        let blocks = discovery::discover(rom, OpcodeTable::standard(), &config.ranges(), roots)?;
        let assignment = OutputAssignment::from_blocks(&blocks, config.chunk_size);
        Ok(Dialogue {
            rom,
            config: config.clone(),
            blocks,
            assignment,
            references: Vec::new(),
            scripts: BTreeMap::new(),
        })
    }

    /// Relocate pointers, expand compressed text and render every block.
    pub fn process(&mut self) -> Result<()> {
        info!("Processing dialogue...");
        self.references = Relocator::new(&self.assignment).relocate(&mut self.blocks)?;

        let expander = CompressedTextExpander::new(self.rom, self.config.compressed_text_table);
        let mut expanded = 0;
        for block in self.blocks.values_mut() {
            expanded += expander.expand_tokens(&mut block.tokens)?;
        }
        info!("Expanded {} compressed text codes", expanded);

        self.scripts = self
            .blocks
            .iter()
            .map(|(&start, block)| (start, ccscript::render_block(&block.tokens)))
            .collect();
        Ok(())
    }

    pub fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    pub fn assignment(&self) -> &OutputAssignment {
        &self.assignment
    }

    pub fn references(&self) -> &[PointerReference] {
        &self.references
    }

    /// Rendered CCScript per block start. Empty until `process` has run.
    pub fn scripts(&self) -> &BTreeMap<usize, String> {
        &self.scripts
    }
}
