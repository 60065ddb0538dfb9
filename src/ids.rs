// Atlas — ids.rs
// Identifier normalization: peek the first datum once, decide whether ids
// must be synthesized, then resume the stream without loss or duplication.
// Author: d65v <https://github.com/d65v>

use serde_json::Value;

use crate::record::{b64int, Fields};
use crate::settings::{ATLAS_DEFAULT_ID_FIELD, MAX_ID_LENGTH};
use crate::{AtlasError, Result};

/// How identifiers are handled for a whole upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMode {
    /// Every datum gets `b64int(n)` in iteration order.
    Synthesize,
    /// Caller-supplied identifiers are passed through.
    PassThrough,
}

// ── Stage 1: Peek ─────────────────────────────────────────────────────────────

/// A stream whose first item has been pulled but not yet emitted.
pub struct Peeked<T, I> {
    first: T,
    rest: I,
}

/// Pull exactly one item from `items`.
///
/// Returns `Ok(None)` for an empty stream. An error on the first item is
/// returned as-is.
pub fn peek_first<T, I>(mut items: I) -> Result<Option<Peeked<T, I>>>
where
    I: Iterator<Item = Result<T>>,
{
    match items.next() {
        None => Ok(None),
        Some(first) => Ok(Some(Peeked {
            first: first?,
            rest: items,
        })),
    }
}

impl<T: Fields, I> Peeked<T, I> {
    /// The sample used for validation and the synthesis decision.
    pub fn first(&self) -> &T {
        &self.first
    }

    /// Mode this stream would be normalized with under `id_field`.
    pub fn id_mode(&self, id_field: &str) -> IdMode {
        if id_field == ATLAS_DEFAULT_ID_FIELD && !self.first.fields().contains_key(id_field) {
            IdMode::Synthesize
        } else {
            IdMode::PassThrough
        }
    }

    // ── Stage 2: Resume ───────────────────────────────────────────────────────

    /// Fix the id mode from the first item and resume the stream with it.
    pub fn assign_ids(self, id_field: &str) -> IdAssigner<T, I> {
        let mode = self.id_mode(id_field);
        if mode == IdMode::Synthesize {
            log::warn!(
                "An ID field was not specified in your data so one was generated for you in insertion order."
            );
        }
        IdAssigner {
            first: Some(self.first),
            rest: self.rest,
            field: id_field.to_string(),
            mode,
            position: 0,
        }
    }
}

/// Emits the peeked item, then the remainder, with identifiers normalized.
pub struct IdAssigner<T, I> {
    first: Option<T>,
    rest: I,
    field: String,
    mode: IdMode,
    position: u64,
}

impl<T, I> IdAssigner<T, I> {
    pub fn mode(&self) -> IdMode {
        self.mode
    }

    /// Number of items emitted so far.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<T, I> IdAssigner<T, I>
where
    T: Fields,
{
    fn normalize(&mut self, mut item: T) -> Result<T> {
        let position = self.position;
        self.position += 1;
        match self.mode {
            IdMode::Synthesize => {
                item.fields_mut()
                    .insert(self.field.clone(), Value::String(b64int(position)));
                Ok(item)
            }
            IdMode::PassThrough => {
                check_id(item.fields().get(&self.field), &self.field, position)?;
                Ok(item)
            }
        }
    }
}

/// Reject a missing or null id, or a string id over [`MAX_ID_LENGTH`] characters.
pub(crate) fn check_id(value: Option<&Value>, field: &str, position: u64) -> Result<()> {
    match value {
        None | Some(Value::Null) => Err(AtlasError::validation(format!(
            "datum {} is missing the id field `{}`",
            position, field
        ))),
        Some(Value::String(s)) if s.chars().count() > MAX_ID_LENGTH => {
            Err(AtlasError::validation(format!(
                "datum {} has an id longer than {} characters",
                position, MAX_ID_LENGTH
            )))
        }
        Some(_) => Ok(()),
    }
}

impl<T, I> Iterator for IdAssigner<T, I>
where
    T: Fields,
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.first.take() {
            Some(first) => first,
            None => match self.rest.next()? {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            },
        };
        Some(self.normalize(item))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
