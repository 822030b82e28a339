use indexmap::IndexMap;
use log::{debug, info};

use crate::address;
use crate::discovery::BlockMap;
use crate::error::{Result, ScriptError};
use crate::opcode_tables::{pointer_shape, Arity, Role};
use crate::token::{ControlCode, Operand, Symbol, Token};

/// Blocks per output chunk.
pub const CHUNK_SIZE: usize = 100;

/// Name of the output unit for `chunk`, e.g. `data_07`.
pub fn chunk_name(chunk: usize) -> String {
    format!("data_{:02}", chunk)
}

/// Block address to output chunk, fixed once discovery has finished.
#[derive(Debug, Clone, Default)]
pub struct OutputAssignment {
    /// Insertion order is ascending address order
    chunks: IndexMap<usize, usize>,
    chunk_size: usize,
}

impl OutputAssignment {
    /// Sort `addresses` and bucket every `chunk_size` of them into one chunk.
    pub fn new<I: IntoIterator<Item = usize>>(addresses: I, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let mut sorted: Vec<usize> = addresses.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let chunks = sorted
            .into_iter()
            .enumerate()
            .map(|(k, addr)| (addr, k / chunk_size))
            .collect();
        OutputAssignment { chunks, chunk_size }
    }

    pub fn from_blocks(blocks: &BlockMap, chunk_size: usize) -> Self {
        Self::new(blocks.keys().copied(), chunk_size)
    }

    pub fn chunk_of(&self, addr: usize) -> Option<usize> {
        self.chunks.get(&addr).copied()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len().div_ceil(self.chunk_size)
    }

    /// Addresses assigned to `chunk`, ascending.
    pub fn addresses(&self, chunk: usize) -> impl Iterator<Item = usize> + '_ {
        self.chunks
            .iter()
            .skip(chunk * self.chunk_size)
            .take(self.chunk_size)
            .map(|(&addr, _)| addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.chunks.iter().map(|(&addr, &chunk)| (addr, chunk))
    }

    /// Qualified label for the block at `addr`, e.g. `data_00.l_0xc50000`.
    pub fn qualified_label(&self, addr: usize) -> Option<String> {
        self.chunk_of(addr)
            .map(|chunk| format!("{}.{}", chunk_name(chunk), address::label(addr)))
    }
}

/// A pointer-bearing control code found in a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerReference {
    pub block: usize,
    /// Index into the block's token list
    pub token: usize,
    /// Pointer targets in operand order; 0 is null
    pub targets: Vec<usize>,
    pub arity: Arity,
    pub role: Role,
}

fn shape_of(cc: &ControlCode) -> Option<(Arity, Role)> {
    pointer_shape(cc.code, &cc.leading_bytes()).map(|shape| (shape.arity, shape.role))
}

/// Every pointer reference in `blocks`, in address then token order.
pub fn collect_references(blocks: &BlockMap) -> Vec<PointerReference> {
    let mut references = Vec::new();
    for (&start, block) in blocks {
        for (index, token) in block.tokens.iter().enumerate() {
            let Some(cc) = token.as_control() else {
                continue;
            };
            let targets: Vec<usize> = cc.pointer_targets().collect();
            if targets.is_empty() {
                continue;
            }
            let Some((arity, role)) = shape_of(cc) else {
                continue;
            };
            references.push(PointerReference {
                block: start,
                token: index,
                targets,
                arity,
                role,
            });
        }
    }
    references
}

/// Rewrites pointer operands into symbolic references.
pub struct Relocator<'a> {
    assignment: &'a OutputAssignment,
}

impl<'a> Relocator<'a> {
    pub fn new(assignment: &'a OutputAssignment) -> Self {
        Relocator { assignment }
    }

    fn symbolize(&self, block: usize, target: usize, role: Role) -> Result<Operand> {
        if target == 0 {
            return Ok(Operand::Null);
        }
        let chunk = self
            .assignment
            .chunk_of(target)
            .ok_or(ScriptError::DanglingPointer(block, target))?;
        Ok(Operand::Symbol(Symbol {
            target,
            chunk,
            role,
        }))
    }

    /// Rewrite one reference in place.
    pub fn apply(&self, blocks: &mut BlockMap, reference: &PointerReference) -> Result<()> {
        let mut operands = Vec::new();
        {
            let Some(Token::Control(cc)) = blocks
                .get(&reference.block)
                .and_then(|block| block.tokens.get(reference.token))
            else {
                return Err(ScriptError::DanglingPointer(
                    reference.block,
                    reference.targets.first().copied().unwrap_or(0),
                ));
            };
            for operand in &cc.operands {
                operands.push(match operand {
                    Operand::Pointer(target) => {
                        self.symbolize(reference.block, *target, reference.role)?
                    }
                    other => other.clone(),
                });
            }
        }

        if let Some(Token::Control(cc)) = blocks
            .get_mut(&reference.block)
            .and_then(|block| block.tokens.get_mut(reference.token))
        {
            cc.operands = operands;
        }
        Ok(())
    }

    /// Rewrite every pointer in `blocks`. Returns the references rewritten.
    pub fn relocate(&self, blocks: &mut BlockMap) -> Result<Vec<PointerReference>> {
        let references = collect_references(blocks);
        for reference in &references {
            self.apply(blocks, reference)?;
        }
        debug!("Rewrote {} pointer references", references.len());
        info!(
            "Assigned {} blocks to {} chunks",
            self.assignment.len(),
            self.assignment.chunk_count()
        );
        Ok(references)
    }
}
