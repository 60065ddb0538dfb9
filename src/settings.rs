// Atlas — settings.rs
// Well-known field names, limits, and projection defaults.
// Author: d65v <https://github.com/d65v>

/// Identifier field synthesized when the caller does not bring their own.
pub const ATLAS_DEFAULT_ID_FIELD: &str = "id_";

/// Longest string identifier the service accepts.
pub const MAX_ID_LENGTH: usize = 36;

/// Records per upload request.
pub const UPLOAD_BATCH_SIZE: usize = 100_000;

pub const DEFAULT_API_URL: &str = "https://api-atlas.nomic.ai";

pub const DEFAULT_DESCRIPTION: &str = "A description for your map.";

pub const DEFAULT_PROJECTION_N_NEIGHBORS: u32 = 15;
pub const DEFAULT_PROJECTION_EPOCHS: u32 = 50;
pub const DEFAULT_PROJECTION_SPREAD: f32 = 1.0;

pub const DEFAULT_DUPLICATE_THRESHOLD: f32 = 0.1;
