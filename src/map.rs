// Atlas — map.rs
// The two entry points: map a stream of text records, or map precomputed
// embeddings with optional metadata.
// Author: d65v <https://github.com/d65v>

use crate::ids::{check_id, peek_first, IdMode, Peeked};
use crate::input::{embedded_records, Embeddings, IntoRecords};
use crate::naming::{random_name, NameGenerator};
use crate::record::{Fields, Record};
use crate::settings::{
    ATLAS_DEFAULT_ID_FIELD, DEFAULT_DESCRIPTION, DEFAULT_DUPLICATE_THRESHOLD,
    DEFAULT_PROJECTION_EPOCHS, DEFAULT_PROJECTION_N_NEIGHBORS, DEFAULT_PROJECTION_SPREAD,
};
use crate::upload::{
    DatasetProvider, DatasetSession, DatasetSpec, IndexRequest, Modality, Payload, UploadReport,
    Uploader,
};
use crate::{AtlasError, Result};

// ── Options ───────────────────────────────────────────────────────────────────

/// Projection hyperparameters for the map layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionParams {
    pub n_neighbors: u32,
    pub epochs: u32,
    pub spread: f32,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            n_neighbors: DEFAULT_PROJECTION_N_NEIGHBORS,
            epochs: DEFAULT_PROJECTION_EPOCHS,
            spread: DEFAULT_PROJECTION_SPREAD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapOptions {
    /// Unique identifier field; synthesized when left at the default and absent
    pub id_field: String,
    /// Dataset and map name, `name` or `organization/name`
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    /// Fields the map can be colored by; must appear in the data
    pub colorable_fields: Vec<String>,
    pub build_topic_model: bool,
    pub topic_label_field: Option<String>,
    pub reset_project_if_exists: bool,
    pub add_datums_if_exists: bool,
    pub projection: ProjectionParams,
    /// Text maps only
    pub duplicate_detection: bool,
    pub duplicate_threshold: f32,
    /// Deprecated: accepted and ignored
    pub shard_size: Option<usize>,
    /// Deprecated: accepted and ignored
    pub num_workers: Option<usize>,
    /// Names the dataset when `name` is unset
    pub name_generator: NameGenerator,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            id_field: ATLAS_DEFAULT_ID_FIELD.to_string(),
            name: None,
            description: None,
            is_public: true,
            colorable_fields: Vec::new(),
            build_topic_model: true,
            topic_label_field: None,
            reset_project_if_exists: false,
            add_datums_if_exists: false,
            projection: ProjectionParams::default(),
            duplicate_detection: true,
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
            shard_size: None,
            num_workers: None,
            name_generator: random_name,
        }
    }
}

impl MapOptions {
    fn dataset_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => (self.name_generator)(),
        }
    }

    fn warn_deprecated(&self) {
        if self.shard_size.is_some() {
            log::warn!(
                "Passing `shard_size` is deprecated and will raise an error in a future release"
            );
        }
        if self.num_workers.is_some() {
            log::warn!(
                "Passing `num_workers` is deprecated and will raise an error in a future release"
            );
        }
    }

    fn check_flags(&self) -> Result<()> {
        if self.reset_project_if_exists && self.add_datums_if_exists {
            return Err(AtlasError::validation(
                "reset_project_if_exists and add_datums_if_exists cannot both be set",
            ));
        }
        if self.id_field.trim().is_empty() {
            return Err(AtlasError::validation("id_field cannot be empty"));
        }
        Ok(())
    }

    fn dataset_spec(&self, identifier: &str, modality: Modality) -> DatasetSpec {
        DatasetSpec {
            identifier: identifier.to_string(),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            unique_id_field: self.id_field.clone(),
            modality,
            is_public: self.is_public,
            reset_if_exists: self.reset_project_if_exists,
            add_if_exists: self.add_datums_if_exists,
        }
    }

    fn index_request(&self, name: &str, indexed_field: Option<&str>) -> IndexRequest {
        let text = indexed_field.is_some();
        IndexRequest {
            name: name.to_string(),
            indexed_field: indexed_field.map(str::to_string),
            colorable_fields: self.colorable_fields.clone(),
            build_topic_model: self.build_topic_model,
            topic_label_field: self.topic_label_field.clone(),
            projection_n_neighbors: self.projection.n_neighbors,
            projection_epochs: self.projection.epochs,
            projection_spread: self.projection.spread,
            duplicate_detection: text && self.duplicate_detection,
            duplicate_threshold: self.duplicate_threshold,
        }
    }
}

// ── Sample Validation ─────────────────────────────────────────────────────────

/// Check the first datum against the options before anything leaves the machine.
fn validate_sample<T, I>(
    peeked: &Peeked<T, I>,
    options: &MapOptions,
    indexed_field: Option<&str>,
) -> Result<()>
where
    T: Fields,
{
    let sample: &Record = peeked.first().fields();
    let synthesized = peeked.id_mode(&options.id_field) == IdMode::Synthesize;

    if !synthesized {
        if !sample.contains_key(&options.id_field) {
            return Err(AtlasError::validation(format!(
                "id field `{}` is not present in your data",
                options.id_field
            )));
        }
        check_id(sample.get(&options.id_field), &options.id_field, 0)?;
    }

    if let Some(field) = indexed_field {
        if !sample.contains_key(field) {
            return Err(AtlasError::validation(format!(
                "indexed field `{}` is not present in your data",
                field
            )));
        }
    }

    for field in &options.colorable_fields {
        if field != &options.id_field && !sample.contains_key(field) {
            return Err(AtlasError::validation(format!(
                "Cannot color by field `{}` as it is not present in the metadata.",
                field
            )));
        }
    }

    if let Some(field) = &options.topic_label_field {
        if !sample.contains_key(field) {
            return Err(AtlasError::validation(format!(
                "topic label field `{}` is not present in your data",
                field
            )));
        }
    }

    Ok(())
}

// ── Shared Pipeline ───────────────────────────────────────────────────────────

fn upload_peeked<P, T, I>(
    provider: &P,
    peeked: Peeked<T, I>,
    options: &MapOptions,
    modality: Modality,
    indexed_field: Option<&str>,
) -> Result<P::Session>
where
    P: DatasetProvider,
    T: Fields + Payload,
    I: Iterator<Item = Result<T>>,
{
    validate_sample(&peeked, options, indexed_field)?;

    let name = options.dataset_name();
    let index = options.index_request(&name, indexed_field);
    let mut session = provider.create_or_open(&options.dataset_spec(&name, modality))?;

    options.warn_deprecated();

    let (what, done) = match modality {
        Modality::Text => ("text", "Text upload succeeded."),
        Modality::Embedding => ("embeddings", "Embedding upload succeeded."),
    };
    log::info!("Uploading {} to Atlas.", what);

    let items = peeked.assign_ids(&options.id_field);
    let report = Uploader::new().run(&mut session, items, &index)?;
    log::info!("{}", done);

    if let UploadReport::Indexed { index, .. } = &report {
        log::info!(
            "{}: map `{}` is building ({})",
            session.identifier(),
            index.name,
            index.id
        );
    }

    session.refresh()?;
    Ok(session)
}

// ── Entry Points ──────────────────────────────────────────────────────────────

/// Generate or update a map of text records.
///
/// Returns `Ok(None)` without contacting the server when `data` is empty.
///
/// # Errors
/// `AtlasError::Validation` for bad input or options, before any remote call;
/// any remote failure after the dataset's rollback policy has been applied.
pub fn map_text<'a, P, D>(
    provider: &P,
    data: D,
    indexed_field: &str,
    options: &MapOptions,
) -> Result<Option<P::Session>>
where
    P: DatasetProvider,
    D: IntoRecords<'a>,
{
    options.check_flags()?;

    let peeked = match peek_first(data.into_records())? {
        Some(p) => p,
        None => {
            log::warn!("Passed data has no samples. No dataset will be created");
            return Ok(None);
        }
    };

    upload_peeked(provider, peeked, options, Modality::Text, Some(indexed_field)).map(Some)
}

/// Map precomputed embeddings, one metadata record per embedding row.
///
/// # Errors
/// `AtlasError::Validation` for empty or non-finite embeddings, metadata of the
/// wrong length, or bad options; any remote failure after rollback.
pub fn map_embeddings<P>(
    provider: &P,
    embeddings: &Embeddings,
    metadata: Option<Vec<Record>>,
    options: &MapOptions,
) -> Result<P::Session>
where
    P: DatasetProvider,
{
    options.check_flags()?;
    embeddings.validate()?;

    let items = embedded_records(embeddings, metadata)?;
    let peeked = peek_first(items)?
        .ok_or_else(|| AtlasError::validation("Your embeddings cannot be empty"))?;

    upload_peeked(provider, peeked, options, Modality::Embedding, None)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(v: serde_json::Value) -> Peeked<Record, std::vec::IntoIter<Result<Record>>> {
        let items = vec![Ok(v.as_object().cloned().unwrap())].into_iter();
        peek_first(items).unwrap().unwrap()
    }

    #[test]
    fn test_defaults() {
        let o = MapOptions::default();
        assert_eq!(o.id_field, "id_");
        assert!(o.is_public);
        assert!(o.build_topic_model);
        assert_eq!(o.projection.n_neighbors, 15);
        assert_eq!(o.projection.epochs, 50);
        assert!((o.duplicate_threshold - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_dataset_name_prefers_explicit() {
        fn fixed() -> String {
            "fixed-name".into()
        }
        let named = MapOptions {
            name: Some("org/news".into()),
            name_generator: fixed,
            ..Default::default()
        };
        assert_eq!(named.dataset_name(), "org/news");
        let unnamed = MapOptions {
            name_generator: fixed,
            ..Default::default()
        };
        assert_eq!(unnamed.dataset_name(), "fixed-name");
    }

    #[test]
    fn test_conflicting_flags() {
        let o = MapOptions {
            reset_project_if_exists: true,
            add_datums_if_exists: true,
            ..Default::default()
        };
        assert!(matches!(o.check_flags(), Err(AtlasError::Validation(_))));
    }

    #[test]
    fn test_validate_colorable_fields() {
        let peeked = sample(json!({"text": "hi", "label": 1}));
        let ok = MapOptions {
            colorable_fields: vec!["label".into(), "id_".into()],
            ..Default::default()
        };
        assert!(validate_sample(&peeked, &ok, Some("text")).is_ok());

        let bad = MapOptions {
            colorable_fields: vec!["missing".into()],
            ..Default::default()
        };
        let err = validate_sample(&peeked, &bad, Some("text")).unwrap_err();
        assert!(err.to_string().contains("Cannot color by field `missing`"));
    }

    #[test]
    fn test_validate_indexed_field() {
        let peeked = sample(json!({"body": "hi"}));
        let err = validate_sample(&peeked, &MapOptions::default(), Some("text")).unwrap_err();
        assert!(matches!(err, AtlasError::Validation(_)));
    }

    #[test]
    fn test_validate_custom_id_field() {
        let peeked = sample(json!({"text": "hi"}));
        let o = MapOptions {
            id_field: "uid".into(),
            ..Default::default()
        };
        assert!(validate_sample(&peeked, &o, Some("text")).is_err());
    }

    #[test]
    fn test_validate_topic_label_field() {
        let peeked = sample(json!({"text": "hi"}));
        let o = MapOptions {
            topic_label_field: Some("title".into()),
            ..Default::default()
        };
        assert!(validate_sample(&peeked, &o, Some("text")).is_err());
    }

    #[test]
    fn test_index_request_for_embeddings_skips_duplicates() {
        let o = MapOptions::default();
        let req = o.index_request("m", None);
        assert!(req.indexed_field.is_none());
        assert!(!req.duplicate_detection);
        let text = o.index_request("m", Some("text"));
        assert!(text.duplicate_detection);
        assert_eq!(text.indexed_field.as_deref(), Some("text"));
    }

    #[test]
    fn test_dataset_spec_defaults() {
        let spec = MapOptions::default().dataset_spec("news", Modality::Text);
        assert_eq!(spec.description, DEFAULT_DESCRIPTION);
        assert_eq!(spec.unique_id_field, "id_");
        assert!(spec.is_public);
    }
}
