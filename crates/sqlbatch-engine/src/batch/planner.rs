//! Chunk planner
//!
//! Splits a fan-out request's bind sets into consecutive, size-bounded
//! chunks. The plan is lazy: chunks borrow from the request and are produced
//! one at a time, in order.

use std::iter::FusedIterator;
use std::ops::Range;

use sqlbatch_core::BindSet;

/// A consecutive run of bind sets executed under one transaction boundary
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// 0-based chunk index
    pub index: usize,
    /// Position of the chunk's first bind set in the whole request
    pub offset: usize,
    pub binds: &'a [BindSet],
}

impl<'a> Chunk<'a> {
    pub fn len(&self) -> usize {
        self.binds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binds.is_empty()
    }

    /// Range of request bind positions this chunk covers
    pub fn bind_range(&self) -> Range<usize> {
        self.offset..self.offset + self.binds.len()
    }
}

/// Ordered, single-pass sequence of chunks over a bind slice
#[derive(Debug, Clone)]
pub struct ChunkPlan<'a> {
    binds: &'a [BindSet],
    cap: usize,
    next_index: usize,
    offset: usize,
}

impl<'a> ChunkPlan<'a> {
    /// A plan with exactly one chunk covering every bind set
    pub fn single(binds: &'a [BindSet]) -> Self {
        Self {
            binds,
            cap: binds.len().max(1),
            next_index: 0,
            offset: 0,
        }
    }

    /// Total number of chunks the plan yields, including those already yielded
    pub fn chunk_count(&self) -> usize {
        if self.binds.is_empty() {
            1
        } else {
            self.binds.len().div_ceil(self.cap)
        }
    }

    /// Chunk size bound
    pub fn cap(&self) -> usize {
        self.cap
    }
}

/// Plan `binds` into chunks of at most `cap` bind sets (`cap` below 1 is treated as 1)
pub fn plan_chunks(binds: &[BindSet], cap: usize) -> ChunkPlan<'_> {
    ChunkPlan {
        binds,
        cap: cap.max(1),
        next_index: 0,
        offset: 0,
    }
}

impl<'a> Iterator for ChunkPlan<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.chunk_count() {
            return None;
        }
        let end = (self.offset + self.cap).min(self.binds.len());
        let chunk = Chunk {
            index: self.next_index,
            offset: self.offset,
            binds: &self.binds[self.offset..end],
        };
        self.next_index += 1;
        self.offset = end;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chunk_count() - self.next_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkPlan<'_> {}

impl FusedIterator for ChunkPlan<'_> {}
