use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::slug::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteRange {
    pub byte_start: usize,
    pub byte_end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            byte_start: start,
            byte_end: end.max(start),
        }
    }

    pub fn to_range(self) -> Range<usize> {
        self.byte_start..self.byte_end
    }

    pub fn is_empty(&self) -> bool {
        self.byte_start >= self.byte_end
    }

    pub fn start(&self) -> usize {
        self.byte_start
    }

    pub fn end(&self) -> usize {
        self.byte_end
    }

    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.byte_start < other.byte_end && other.byte_start < self.byte_end
    }
}

/// A hashtag to be wrapped in a link to its tag page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLink<'a> {
    pub index: ByteRange,
    pub tag: &'a Tag,
}
