//! Content-addressed node storage.
//!
//! The cache maps `(board, sign_to_move)` to a [`Node`], merging
//! transpositions into one shared node. Entries live in fixed-capacity blocks
//! that are never moved or freed while the cache exists; a hash index of
//! power-of-two size chains entries per bucket. When the live game advances,
//! `cleanup` recycles every entry whose position can no longer be reached into
//! a free buffer, reusing their edge storage on the next insert.
//!
//! Nodes are addressed through [`NodeId`] handles carrying a generation, so a
//! handle that outlives its entry is detected on lookup.

use crate::node::{Node, NodeId};
use crate::stats::TimedStat;
use gomoku_core::{Board, Sign, ZobristHashing};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::debug;

/// Cells packed per compressed word (two bits each).
const CELLS_PER_WORD: usize = 32;

/// Board snapshot stored with each entry for exact equality checks.
#[derive(Debug, Clone, Default)]
struct CompressedBoard {
    words: Vec<u64>,
}

impl CompressedBoard {
    fn word_count(board: &Board) -> usize {
        board.size().div_ceil(CELLS_PER_WORD)
    }

    /// Pack word `index` of a live board.
    #[inline]
    fn pack_word(board: &Board, index: usize) -> u64 {
        let cells = board.cells();
        let start = index * CELLS_PER_WORD;
        let end = (start + CELLS_PER_WORD).min(cells.len());
        cells[start..end]
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, s)| acc | (s.to_u8() as u64) << (2 * i))
    }

    fn store(&mut self, board: &Board) {
        self.words.clear();
        self.words
            .extend((0..Self::word_count(board)).map(|i| Self::pack_word(board, i)));
    }

    fn equals(&self, board: &Board) -> bool {
        self.words.len() == Self::word_count(board)
            && self
                .words
                .iter()
                .enumerate()
                .all(|(i, w)| *w == Self::pack_word(board, i))
    }

    /// Every stone of `from` is present, with the same sign, in this board.
    fn is_transition_possible_from(&self, from: &Board) -> bool {
        self.words.len() == Self::word_count(from)
            && self.words.iter().enumerate().all(|(i, to)| {
                let from = Self::pack_word(from, i);
                ((from ^ to) & from) == 0
            })
    }
}

#[derive(Debug, Default)]
struct Entry {
    hash: u64,
    board: CompressedBoard,
    sign_to_move: Sign,
    generation: u32,
    live: bool,
    /// Next entry in the bucket chain, or in the free buffer.
    next: Option<u32>,
    node: Node,
}

/// Counters describing cache occupancy and operation timings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeCacheStats {
    pub number_of_bins: usize,
    pub stored_nodes: usize,
    pub allocated_nodes: usize,
    pub stored_edges: usize,
    pub allocated_edges: usize,
    pub load_factor: f64,
    pub memory_bytes: usize,
    pub nb_recycled: u64,
    pub seek: TimedStat,
    pub insert: TimedStat,
    pub remove: TimedStat,
    pub resize: TimedStat,
    pub cleanup: TimedStat,
}

impl fmt::Display for NodeCacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----NodeCacheStats----")?;
        writeln!(f, "bins        = {}", self.number_of_bins)?;
        writeln!(f, "load factor = {:.3}", self.load_factor)?;
        writeln!(
            f,
            "nodes       = {} stored / {} allocated",
            self.stored_nodes, self.allocated_nodes
        )?;
        writeln!(
            f,
            "edges       = {} stored / {} allocated",
            self.stored_edges, self.allocated_edges
        )?;
        writeln!(f, "memory      = {:.2} MB", self.memory_bytes as f64 / 1048576.0)?;
        writeln!(f, "recycled    = {}", self.nb_recycled)?;
        writeln!(f, "seek    : {}", self.seek)?;
        writeln!(f, "insert  : {}", self.insert)?;
        writeln!(f, "remove  : {}", self.remove)?;
        writeln!(f, "resize  : {}", self.resize)?;
        write!(f, "cleanup : {}", self.cleanup)
    }
}

#[derive(Debug)]
pub struct NodeCache {
    hashing: ZobristHashing,
    bins: Vec<Option<u32>>,
    blocks: Vec<Vec<Entry>>,
    block_size: usize,
    free_head: Option<u32>,
    stored_nodes: usize,
    stats: NodeCacheStats,
}

impl NodeCache {
    /// Create a cache for boards of the given shape. `number_of_bins` is
    /// rounded up to a power of two.
    pub fn new(rows: usize, cols: usize, number_of_bins: usize, block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self {
            hashing: ZobristHashing::new(rows, cols),
            bins: vec![None; number_of_bins.max(1).next_power_of_two()],
            blocks: Vec::new(),
            block_size,
            free_head: None,
            stored_nodes: 0,
            stats: NodeCacheStats::default(),
        }
    }

    pub fn rows(&self) -> usize {
        self.hashing.rows()
    }

    pub fn cols(&self) -> usize {
        self.hashing.cols()
    }

    #[inline]
    pub fn number_of_bins(&self) -> usize {
        self.bins.len()
    }

    #[inline]
    pub fn stored_nodes(&self) -> usize {
        self.stored_nodes
    }

    #[inline]
    pub fn allocated_nodes(&self) -> usize {
        self.blocks.len() * self.block_size
    }

    pub fn load_factor(&self) -> f64 {
        self.stored_nodes as f64 / self.bins.len() as f64
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & (self.bins.len() - 1)
    }

    #[inline]
    fn entry(&self, slot: u32) -> &Entry {
        let slot = slot as usize;
        &self.blocks[slot / self.block_size][slot % self.block_size]
    }

    #[inline]
    fn entry_mut(&mut self, slot: u32) -> &mut Entry {
        let slot = slot as usize;
        &mut self.blocks[slot / self.block_size][slot % self.block_size]
    }

    /// Node behind a handle.
    ///
    /// # Panics
    /// Debug builds assert the handle is not stale.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        let entry = self.entry(id.slot);
        debug_assert!(
            entry.live && entry.generation == id.generation,
            "stale node id {}",
            id
        );
        &entry.node
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        let entry = self.entry_mut(id.slot);
        debug_assert!(
            entry.live && entry.generation == id.generation,
            "stale node id {}",
            id
        );
        &mut entry.node
    }

    /// Whether the handle still refers to the node it was issued for.
    pub fn is_live(&self, id: NodeId) -> bool {
        let slot = id.slot as usize;
        slot < self.allocated_nodes() && {
            let entry = self.entry(id.slot);
            entry.live && entry.generation == id.generation
        }
    }

    pub fn try_get(&self, id: NodeId) -> Option<&Node> {
        self.is_live(id).then(|| &self.entry(id.slot).node)
    }

    /// Look up a position without modifying the cache.
    pub fn seek(&self, board: &Board, sign_to_move: Sign) -> Option<NodeId> {
        let hash = self.hashing.hash(board, sign_to_move);
        let mut current = self.bins[self.bucket_of(hash)];
        while let Some(slot) = current {
            let entry = self.entry(slot);
            if entry.hash == hash && entry.sign_to_move == sign_to_move && entry.board.equals(board)
            {
                return Some(NodeId {
                    slot,
                    generation: entry.generation,
                });
            }
            current = entry.next;
        }
        None
    }

    /// [`seek`](Self::seek) recorded in the cache statistics.
    pub fn timed_seek(&mut self, board: &Board, sign_to_move: Sign) -> Option<NodeId> {
        let start = Instant::now();
        let result = self.seek(board, sign_to_move);
        self.stats.seek.record_since(start);
        result
    }

    /// Store a new node with `number_of_edges` default edges.
    ///
    /// The position must not already be present.
    pub fn insert(&mut self, board: &Board, sign_to_move: Sign, number_of_edges: usize) -> NodeId {
        debug_assert!(
            self.seek(board, sign_to_move).is_none(),
            "position is already in the cache"
        );
        let start = Instant::now();

        if self.load_factor() >= 1.0 {
            self.resize(self.bins.len() * 2);
        }

        let hash = self.hashing.hash(board, sign_to_move);
        let bucket = self.bucket_of(hash);
        let slot = self.acquire_slot();
        let head = self.bins[bucket];

        let entry = self.entry_mut(slot);
        entry.hash = hash;
        entry.board.store(board);
        entry.sign_to_move = sign_to_move;
        entry.live = true;
        entry.next = head;
        entry.node.reset(board.move_count(), sign_to_move);
        entry.node.create_edges(number_of_edges);
        let id = NodeId {
            slot,
            generation: entry.generation,
        };

        self.bins[bucket] = Some(slot);
        self.stored_nodes += 1;
        self.stats.insert.record_since(start);
        id
    }

    /// Unlink a position and move its entry to the free buffer. No-op when
    /// the position is absent.
    pub fn remove(&mut self, board: &Board, sign_to_move: Sign) {
        let start = Instant::now();
        let hash = self.hashing.hash(board, sign_to_move);
        let bucket = self.bucket_of(hash);

        let mut previous: Option<u32> = None;
        let mut current = self.bins[bucket];
        while let Some(slot) = current {
            let entry = self.entry(slot);
            let next = entry.next;
            if entry.hash == hash && entry.sign_to_move == sign_to_move && entry.board.equals(board)
            {
                match previous {
                    Some(p) => self.entry_mut(p).next = next,
                    None => self.bins[bucket] = next,
                }
                self.recycle(slot);
                break;
            }
            previous = current;
            current = next;
        }
        self.stats.remove.record_since(start);
    }

    /// Recycle every entry that cannot be reached by playing forward from
    /// `new_board` with `sign_to_move` to play.
    pub fn cleanup(&mut self, new_board: &Board, sign_to_move: Sign) {
        let start = Instant::now();
        let before = self.stored_nodes;

        for bucket in 0..self.bins.len() {
            let mut current = self.bins[bucket].take();
            let mut tail: Option<u32> = None;
            while let Some(slot) = current {
                let next = self.entry(slot).next;
                if self.is_reachable(slot, new_board, sign_to_move) {
                    self.entry_mut(slot).next = None;
                    match tail {
                        Some(t) => self.entry_mut(t).next = Some(slot),
                        None => self.bins[bucket] = Some(slot),
                    }
                    tail = Some(slot);
                } else {
                    self.recycle(slot);
                }
                current = next;
            }
        }

        self.stats.cleanup.record_since(start);
        debug!(
            removed = before - self.stored_nodes,
            remaining = self.stored_nodes,
            "node cache cleanup"
        );
    }

    fn is_reachable(&self, slot: u32, from: &Board, sign_to_move: Sign) -> bool {
        let entry = self.entry(slot);
        let stored_depth = entry.node.depth();
        if stored_depth < from.move_count() {
            return false;
        }
        let expected_sign = if (stored_depth - from.move_count()) % 2 == 0 {
            sign_to_move
        } else {
            sign_to_move.invert()
        };
        entry.sign_to_move == expected_sign && entry.board.is_transition_possible_from(from)
    }

    /// Re-hash every live entry into `number_of_bins` buckets (rounded up to
    /// a power of two). Node handles stay valid.
    pub fn resize(&mut self, number_of_bins: usize) {
        let start = Instant::now();
        let new_size = number_of_bins.max(1).next_power_of_two();
        let old_bins = std::mem::replace(&mut self.bins, vec![None; new_size]);

        for head in old_bins {
            let mut current = head;
            while let Some(slot) = current {
                let entry = self.entry(slot);
                let next = entry.next;
                let bucket = self.bucket_of(entry.hash);
                let head = self.bins[bucket];
                self.entry_mut(slot).next = head;
                self.bins[bucket] = Some(slot);
                current = next;
            }
        }

        self.stats.resize.record_since(start);
        debug!(bins = new_size, stored = self.stored_nodes, "node cache resized");
    }

    /// Recycle every entry.
    pub fn clear(&mut self) {
        for bucket in 0..self.bins.len() {
            let mut current = self.bins[bucket].take();
            while let Some(slot) = current {
                current = self.entry(slot).next;
                self.recycle(slot);
            }
        }
        debug_assert_eq!(self.stored_nodes, 0);
    }

    fn acquire_slot(&mut self) -> u32 {
        let slot = match self.free_head {
            Some(slot) => slot,
            None => self.allocate_block(),
        };
        self.free_head = self.entry(slot).next;
        slot
    }

    /// Append a block to the arena and chain its slots into the free buffer.
    /// Returns the first new slot.
    fn allocate_block(&mut self) -> u32 {
        let first = self.allocated_nodes();
        let mut block = Vec::with_capacity(self.block_size);
        block.resize_with(self.block_size, Entry::default);
        // Chain the new slots in ascending order in front of the free buffer.
        for (i, entry) in block.iter_mut().enumerate() {
            entry.next = if i + 1 < self.block_size {
                Some((first + i + 1) as u32)
            } else {
                self.free_head
            };
        }
        self.blocks.push(block);
        self.free_head = Some(first as u32);
        first as u32
    }

    fn recycle(&mut self, slot: u32) {
        let head = self.free_head;
        let entry = self.entry_mut(slot);
        debug_assert!(entry.live);
        entry.live = false;
        entry.generation = entry.generation.wrapping_add(1);
        entry.node.reset(0, Sign::None);
        entry.next = head;
        self.free_head = Some(slot);
        self.stored_nodes -= 1;
        self.stats.nb_recycled += 1;
    }

    /// Approximate heap footprint in bytes.
    pub fn memory(&self) -> usize {
        let entries = self.allocated_nodes() * std::mem::size_of::<Entry>();
        let bins = self.bins.len() * std::mem::size_of::<Option<u32>>();
        let edges: usize = self
            .blocks
            .iter()
            .flatten()
            .map(|e| {
                e.node.edge_capacity() * std::mem::size_of::<crate::edge::Edge>()
                    + e.board.words.capacity() * 8
            })
            .sum();
        entries + bins + edges
    }

    /// Snapshot of the occupancy counters.
    pub fn stats(&self) -> NodeCacheStats {
        let (stored_edges, allocated_edges) = self
            .blocks
            .iter()
            .flatten()
            .fold((0, 0), |(stored, allocated), e| {
                let live_edges = if e.live { e.node.number_of_edges() } else { 0 };
                (stored + live_edges, allocated + e.node.edge_capacity())
            });
        NodeCacheStats {
            number_of_bins: self.bins.len(),
            stored_nodes: self.stored_nodes,
            allocated_nodes: self.allocated_nodes(),
            stored_edges,
            allocated_edges,
            load_factor: self.load_factor(),
            memory_bytes: self.memory(),
            ..self.stats.clone()
        }
    }

    /// Handles of every live node, in bucket order.
    pub fn live_nodes(&self) -> Vec<NodeId> {
        let mut result = Vec::with_capacity(self.stored_nodes);
        for head in &self.bins {
            let mut current = *head;
            while let Some(slot) = current {
                let entry = self.entry(slot);
                result.push(NodeId {
                    slot,
                    generation: entry.generation,
                });
                current = entry.next;
            }
        }
        result
    }
}
