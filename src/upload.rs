// Atlas — upload.rs
// Dataset session interface, batch transmission, and the first-upload
// rollback policy.
// Author: d65v <https://github.com/d65v>

use serde::{Deserialize, Serialize};

use crate::batch::Batches;
use crate::record::{EmbeddedRecord, Record};
use crate::settings::UPLOAD_BATCH_SIZE;
use crate::{AtlasError, Result};

// ── Collaborator Interface ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Embedding,
}

/// Everything needed to create or open a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    /// `name` or `organization/name`
    pub identifier: String,
    pub description: String,
    pub unique_id_field: String,
    pub modality: Modality,
    pub is_public: bool,
    pub reset_if_exists: bool,
    pub add_if_exists: bool,
}

/// Projection and topic-model parameters for a new index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexRequest {
    pub name: String,
    /// Text field to embed; `None` for uploaded embeddings.
    pub indexed_field: Option<String>,
    pub colorable_fields: Vec<String>,
    pub build_topic_model: bool,
    pub topic_label_field: Option<String>,
    pub projection_n_neighbors: u32,
    pub projection_epochs: u32,
    pub projection_spread: f32,
    pub duplicate_detection: bool,
    pub duplicate_threshold: f32,
}

/// A remote index created over a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHandle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub projection_ids: Vec<String>,
}

/// A remote dataset that records can be appended to.
pub trait DatasetSession {
    fn identifier(&self) -> &str;

    /// Number of records the dataset currently holds.
    fn total_datums(&self) -> Result<u64>;

    fn add_records(&mut self, batch: &[Record]) -> Result<()>;

    fn add_embeddings(&mut self, batch: &[EmbeddedRecord]) -> Result<()>;

    /// Remove the whole dataset.
    fn delete(&mut self) -> Result<()>;

    fn create_index(&mut self, request: &IndexRequest) -> Result<IndexHandle>;

    /// Refresh existing maps after an incremental append.
    fn rebuild_maps(&mut self) -> Result<()>;

    /// Pull the latest remote state after a successful upload.
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Creates or opens dataset sessions.
pub trait DatasetProvider {
    type Session: DatasetSession;

    fn create_or_open(&self, spec: &DatasetSpec) -> Result<Self::Session>;
}

/// Something that can be sent in a batch.
pub trait Payload: Sized {
    fn transmit<S: DatasetSession + ?Sized>(session: &mut S, batch: &[Self]) -> Result<()>;
}

impl Payload for Record {
    fn transmit<S: DatasetSession + ?Sized>(session: &mut S, batch: &[Self]) -> Result<()> {
        session.add_records(batch)
    }
}

impl Payload for EmbeddedRecord {
    fn transmit<S: DatasetSession + ?Sized>(session: &mut S, batch: &[Self]) -> Result<()> {
        session.add_embeddings(batch)
    }
}

// ── Transmission ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub batches: usize,
    pub records: u64,
}

/// Result of pushing every batch of one upload.
#[derive(Debug)]
pub enum UploadOutcome {
    Completed(UploadStats),
    /// Transmission stopped at the first failure; `stats` counts what was sent.
    Failed { error: AtlasError, stats: UploadStats },
}

impl UploadOutcome {
    pub fn stats(&self) -> UploadStats {
        match self {
            UploadOutcome::Completed(stats) => *stats,
            UploadOutcome::Failed { stats, .. } => *stats,
        }
    }
}

/// Send batches one at a time until the stream ends or something fails.
///
/// Never deletes and never retries; deciding what to do with a failure is
/// left to [`next_step`].
pub fn transmit<S, T, I>(session: &mut S, batches: I) -> UploadOutcome
where
    S: DatasetSession + ?Sized,
    T: Payload,
    I: Iterator<Item = Result<Vec<T>>>,
{
    let mut stats = UploadStats::default();
    for batch in batches {
        let sent = batch.and_then(|batch| {
            T::transmit(session, &batch)?;
            Ok(batch.len())
        });
        match sent {
            Ok(n) => {
                stats.batches += 1;
                stats.records += n as u64;
                log::debug!(
                    "{}: sent batch {} ({} records, {} total)",
                    session.identifier(),
                    stats.batches,
                    n,
                    stats.records
                );
            }
            Err(error) => return UploadOutcome::Failed { error, stats },
        }
    }
    UploadOutcome::Completed(stats)
}

// ── Rollback Policy ───────────────────────────────────────────────────────────

/// What to do once transmission has finished, carrying what that step needs.
#[derive(Debug)]
pub enum NextStep {
    /// First upload succeeded: build the index.
    BuildIndex(UploadStats),
    /// Append to an existing dataset succeeded: refresh its maps.
    RebuildMaps(UploadStats),
    /// First upload failed: delete the dataset, then report the error.
    RollbackAndFail(AtlasError),
    /// Append failed: keep what was sent, report the error.
    Fail { error: AtlasError, stats: UploadStats },
}

/// Decide the follow-up from whether the dataset was empty before the upload
/// and how transmission ended.
pub fn next_step(fresh: bool, outcome: UploadOutcome) -> NextStep {
    match (fresh, outcome) {
        (true, UploadOutcome::Completed(stats)) => NextStep::BuildIndex(stats),
        (false, UploadOutcome::Completed(stats)) => NextStep::RebuildMaps(stats),
        (true, UploadOutcome::Failed { error, .. }) => NextStep::RollbackAndFail(error),
        (false, UploadOutcome::Failed { error, stats }) => NextStep::Fail { error, stats },
    }
}

// ── Uploader ──────────────────────────────────────────────────────────────────

/// What a successful upload did after its batches were accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadReport {
    Indexed {
        stats: UploadStats,
        index: IndexHandle,
    },
    MapsRebuilt {
        stats: UploadStats,
    },
}

/// Drives one upload: batching, transmission, rollback, and indexing.
#[derive(Debug, Clone)]
pub struct Uploader {
    batch_size: usize,
}

impl Default for Uploader {
    fn default() -> Self {
        Self {
            batch_size: UPLOAD_BATCH_SIZE,
        }
    }
}

impl Uploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the batch size (mostly useful for tests).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Upload `items` to `session`.
    ///
    /// The dataset's record count is read once, before the first batch. If it
    /// was empty and any batch fails, the dataset is deleted (best-effort) and
    /// the original error is returned. On success a fresh dataset gets
    /// `create_index(index)`, an existing one gets `rebuild_maps()`.
    ///
    /// # Errors
    /// Returns the first transmission error, or the error of the follow-up call.
    pub fn run<S, T, I>(&self, session: &mut S, items: I, index: &IndexRequest) -> Result<UploadReport>
    where
        S: DatasetSession + ?Sized,
        T: Payload,
        I: Iterator<Item = Result<T>>,
    {
        let fresh = session.total_datums()? == 0;

        let outcome = transmit(session, Batches::new(items, self.batch_size));

        match next_step(fresh, outcome) {
            NextStep::BuildIndex(stats) => {
                log::info!(
                    "{}: uploaded {} records in {} batches; creating index '{}'",
                    session.identifier(),
                    stats.records,
                    stats.batches,
                    index.name
                );
                let handle = session.create_index(index)?;
                Ok(UploadReport::Indexed {
                    stats,
                    index: handle,
                })
            }
            NextStep::RebuildMaps(stats) => {
                log::info!(
                    "{}: appended {} records; rebuilding maps",
                    session.identifier(),
                    stats.records
                );
                session.rebuild_maps()?;
                Ok(UploadReport::MapsRebuilt { stats })
            }
            NextStep::RollbackAndFail(error) => {
                log::info!(
                    "{}: Deleting dataset due to failure in initial upload.",
                    session.identifier()
                );
                if let Err(e) = session.delete() {
                    log::warn!(
                        "{}: cleanup delete failed: {}",
                        session.identifier(),
                        e
                    );
                }
                Err(error)
            }
            NextStep::Fail { error, stats } => {
                log::warn!(
                    "{}: upload failed after {} records; earlier batches were kept",
                    session.identifier(),
                    stats.records
                );
                Err(error)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
