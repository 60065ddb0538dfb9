// Atlas — batch.rs
// Fixed-size batching over a single-pass record stream.
// Author: d65v <https://github.com/d65v>

use crate::Result;

/// Groups a fallible stream into ordered, non-overlapping batches of at most
/// `max` items. Only one batch is held in memory at a time.
///
/// A stream error is yielded as soon as it is seen and ends the batch stream;
/// items buffered before it are dropped.
pub struct Batches<I> {
    inner: I,
    max: usize,
    done: bool,
}

impl<I> Batches<I> {
    pub fn new(inner: I, max: usize) -> Self {
        Self {
            inner,
            max: max.max(1),
            done: false,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max
    }
}

impl<T, I> Iterator for Batches<I>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut batch = Vec::new();
        while batch.len() < self.max {
            match self.inner.next() {
                Some(Ok(item)) => batch.push(item),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
