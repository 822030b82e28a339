use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use log::{debug, info, warn};

use crate::decoder::{BlockDecoder, Decoded};
use crate::error::{Result, ScriptError};
use crate::opcode_tables::OpcodeTable;
use crate::token::{ControlCode, Token};

/// A contiguous run of decoded script.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub start: usize,
    /// Offset of the first byte after the block
    pub end: usize,
    pub tokens: Vec<Token>,
}

impl Block {
    fn from_decoded(start: usize, decoded: Decoded) -> Self {
        Block {
            start,
            end: decoded.end,
            tokens: decoded.tokens,
        }
    }

    pub fn contains(&self, offset: usize) -> bool {
        (self.start..self.end).contains(&offset)
    }

    /// Every non-null pointer target held by this block's control codes.
    pub fn pointer_targets(&self) -> impl Iterator<Item = usize> + '_ {
        self.tokens
            .iter()
            .filter_map(Token::as_control)
            .flat_map(ControlCode::pointer_targets)
            .filter(|&target| target != 0)
    }
}

/// Blocks keyed by start offset.
pub type BlockMap = BTreeMap<usize, Block>;

/// Drives decoding to a fixpoint: every pointer seen ends up at the start
/// of some block.
pub struct DiscoveryScheduler<'a> {
    decoder: BlockDecoder<'a>,
    blocks: BlockMap,
    pending: BTreeSet<usize>,
    splits: usize,
}

impl<'a> DiscoveryScheduler<'a> {
    pub fn new(rom: &'a [u8], table: &'a OpcodeTable) -> Self {
        DiscoveryScheduler {
            decoder: BlockDecoder::new(rom, table),
            blocks: BTreeMap::new(),
            pending: BTreeSet::new(),
            splits: 0,
        }
    }

    pub fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    pub fn into_blocks(self) -> BlockMap {
        self.blocks
    }

    pub fn pending(&self) -> impl Iterator<Item = &usize> {
        self.pending.iter()
    }

    /// Decode `range` block by block; each terminator starts the next block.
    /// The last block may run past `range.end`.
    pub fn scan_range(&mut self, range: Range<usize>) -> Result<()> {
        let mut at = range.start;
        if let Some(previous) = self.blocks.range(..=at).next_back().map(|(_, b)| b) {
            if previous.end > at {
                warn!(
                    "Block {:#x} runs into scan range {:#x}..{:#x}, resuming at {:#x}",
                    previous.start, range.start, range.end, previous.end
                );
                at = previous.end;
            }
        }

        let before = self.blocks.len();
        while at < range.end {
            let decoded = self.decoder.decode(at, None)?;
            let next = decoded.end;
            self.insert(at, decoded);
            at = next;
        }
        info!(
            "Scanned {:#x}..{:#x}: {} blocks",
            range.start,
            range.end,
            self.blocks.len() - before
        );
        Ok(())
    }

    /// Queue externally supplied pointer roots. Null roots are dropped.
    pub fn add_roots<I: IntoIterator<Item = usize>>(&mut self, roots: I) {
        self.pending.extend(roots.into_iter().filter(|&root| root != 0));
    }

    /// Resolve pending pointers until none remain.
    pub fn run(&mut self) -> Result<()> {
        info!("Checking pointers...");
        while let Some(pointer) = self.pending.pop_first() {
            self.resolve(pointer)?;
        }
        info!(
            "Discovery complete: {} blocks, {} splits",
            self.blocks.len(),
            self.splits
        );
        Ok(())
    }

    fn insert(&mut self, start: usize, decoded: Decoded) {
        self.pending.extend(decoded.pointers.iter().copied());
        self.blocks.insert(start, Block::from_decoded(start, decoded));
    }

    /// Decode a fresh block at `start`, bounded by `stop`. If the bound is hit
    /// before a terminator, an explicit jump to it is appended.
    fn decode_bounded(&mut self, start: usize, stop: Option<usize>) -> Result<()> {
        let mut decoded = self.decoder.decode(start, stop)?;
        if let (false, Some(stop)) = (decoded.terminated, stop) {
            decoded.tokens.push(Token::Control(ControlCode::goto(stop)));
        }
        self.insert(start, decoded);
        Ok(())
    }

    fn resolve(&mut self, pointer: usize) -> Result<()> {
        if pointer == 0 || self.blocks.contains_key(&pointer) {
            return Ok(());
        }
        if pointer >= self.decoder.rom().len() {
            return Err(ScriptError::UnresolvableRoot(pointer));
        }

        let (lower, lower_end) = self
            .blocks
            .range(..pointer)
            .next_back()
            .map(|(&start, block)| (start, block.end))
            .ok_or(ScriptError::UnresolvableRoot(pointer))?;
        let higher = self
            .blocks
            .range(pointer + 1..)
            .next()
            .map(|(&start, _)| start);

        if pointer < lower_end {
            debug!("Splitting block {:#x} at {:#x}", lower, pointer);
            let head = self
                .decoder
                .decode(lower, Some(pointer))
                .map_err(|e| match e {
                    ScriptError::MisalignedStop(..) => ScriptError::UnresolvableRoot(pointer),
                    other => other,
                })?;
            if head.end != pointer {
                return Err(ScriptError::UnresolvableRoot(pointer));
            }
            let mut tokens = head.tokens;
            tokens.push(Token::Control(ControlCode::goto(pointer)));
            self.blocks.insert(
                lower,
                Block {
                    start: lower,
                    end: pointer,
                    tokens,
                },
            );
            self.decode_bounded(pointer, Some(lower_end))?;
            self.splits += 1;
        } else {
            debug!(
                "Pointer {:#x} lies past block {:#x}, decoding up to {:?}",
                pointer, lower, higher
            );
            self.decode_bounded(pointer, higher)?;
        }
        Ok(())
    }

    /// Check that blocks are disjoint and that every pointer resolves to a
    /// block start.
    pub fn verify(&self) -> Result<()> {
        verify(&self.blocks)
    }
}

pub fn verify(blocks: &BlockMap) -> Result<()> {
    let mut previous: Option<&Block> = None;
    for block in blocks.values() {
        if let Some(previous) = previous {
            if previous.end > block.start {
                return Err(ScriptError::OverlappingBlocks(previous.start, block.start));
            }
        }
        for target in block.pointer_targets() {
            if !blocks.contains_key(&target) {
                return Err(ScriptError::DanglingPointer(block.start, target));
            }
        }
        previous = Some(block);
    }
    Ok(())
}

/// Scan `ranges`, fold in `roots`, and run discovery to its fixpoint.
pub fn discover(
    rom: &[u8],
    table: &OpcodeTable,
    ranges: &[Range<usize>],
    roots: &[usize],
) -> Result<BlockMap> {
    let mut scheduler = DiscoveryScheduler::new(rom, table);
    for range in ranges {
        scheduler.scan_range(range.clone())?;
    }
    scheduler.add_roots(roots.iter().copied());
    scheduler.run()?;
    scheduler.verify()?;
    Ok(scheduler.into_blocks())
}
