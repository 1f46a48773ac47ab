// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

use std::iter::FusedIterator;

/// The edges of one graph round, as a bounded iterator of 1-based ordinals.
///
/// Iterating through `by_ref()` lets a caller stop early and pick up where it left off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeBatch {
    total: u64,
    produced: u64,
}

impl EdgeBatch {
    pub fn new(total: u64) -> Self {
        Self { total, produced: 0 }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of ordinals handed out so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn remaining(&self) -> u64 {
        self.total - self.produced
    }

    pub fn is_exhausted(&self) -> bool {
        self.produced == self.total
    }
}

impl Iterator for EdgeBatch {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.is_exhausted() {
            return None;
        }
        self.produced += 1;
        Some(self.produced)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl FusedIterator for EdgeBatch {}
