// Atlas — npy.rs
// NumPy .npy reader for float32 embedding matrices of shape (N, D).
//
// .npy format (simplified):
//   - Magic:   \x93NUMPY
//   - Version: 1.0 or 2.0
//   - Header:  variable-length dict describing dtype, shape, order
//   - Data:    raw little-endian float32 values (row-major)
//
// Author: d65v <https://github.com/d65v>

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::input::Embeddings;
use crate::{AtlasError, Result};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub rows: usize,
    pub cols: usize,
    pub fortran_order: bool,
}

fn npy_err(msg: impl Into<String>) -> AtlasError {
    AtlasError::Npy(msg.into())
}

// ── Header ────────────────────────────────────────────────────────────────────

/// Parse a v1.0 / v2.0 header. Returns the header and the data offset.
///
/// # Errors
/// `AtlasError::Npy` for bad magic, unsupported versions, non-float32 dtypes,
/// big-endian data, or a shape that is not 2-D.
pub fn parse_header(data: &[u8]) -> Result<(NpyHeader, usize)> {
    if data.len() < 10 || !data.starts_with(NPY_MAGIC) {
        return Err(npy_err("not a .npy file (bad magic bytes)"));
    }

    let major = data[6];
    let minor = data[7];

    // Header length: 2 bytes (v1) or 4 bytes (v2) little-endian
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([data[8], data[9]]) as usize, 10usize),
        2 | 3 if data.len() >= 12 => (
            u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize,
            12usize,
        ),
        _ => {
            return Err(npy_err(format!(
                "unsupported .npy version {}.{}",
                major, minor
            )))
        }
    };

    let header_end = header_start
        .checked_add(header_len)
        .ok_or_else(|| npy_err("header length too large"))?;
    if data.len() < header_end {
        return Err(npy_err("file too short for declared header"));
    }

    let header = std::str::from_utf8(&data[header_start..header_end])
        .map_err(|_| npy_err("header is not valid UTF-8"))?;

    let descr = dict_value(header, "descr")
        .ok_or_else(|| npy_err("no 'descr' key"))?
        .trim_matches(|c| c == '\'' || c == '"');
    match descr {
        "<f4" | "=f4" => {}
        ">f4" => return Err(npy_err("big-endian float32 is not supported")),
        other => {
            return Err(npy_err(format!(
                "unsupported dtype {} (need float32)",
                other
            )))
        }
    }

    let fortran_order = dict_value(header, "fortran_order")
        .map(|v| v.starts_with("True"))
        .unwrap_or(false);

    let shape = dict_value(header, "shape").ok_or_else(|| npy_err("no 'shape' key"))?;
    let inner = shape
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .ok_or_else(|| npy_err("malformed shape"))?;
    let dims: Vec<usize> = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| npy_err(format!("bad dimension '{}'", s))))
        .collect::<Result<_>>()?;

    if dims.len() != 2 {
        return Err(npy_err("array must be 2-D (N, D)"));
    }

    Ok((
        NpyHeader {
            rows: dims[0],
            cols: dims[1],
            fortran_order,
        },
        header_end,
    ))
}

/// Raw text following `'key':` in the header dict.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let single = format!("'{}':", key);
    let double = format!("\"{}\":", key);
    let start = header
        .find(&single)
        .map(|i| i + single.len())
        .or_else(|| header.find(&double).map(|i| i + double.len()))?;
    let rest = header[start..].trim_start();
    if rest.starts_with('(') {
        return Some(rest);
    }
    let end = rest.find([',', '}']).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

// ── Data ──────────────────────────────────────────────────────────────────────

/// Decode a complete .npy buffer into an embedding matrix.
pub fn parse_embeddings(raw: &[u8]) -> Result<Embeddings> {
    let (header, offset) = parse_header(raw)?;

    let expected = header
        .rows
        .checked_mul(header.cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| npy_err("shape too large"))?;
    let available = raw.len() - offset;
    if available < expected {
        return Err(npy_err(format!(
            "data section too small: expected {} bytes, got {}",
            expected, available
        )));
    }

    let values: Vec<f32> = raw[offset..offset + expected]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    let values = if header.fortran_order {
        transpose(&values, header.rows, header.cols)
    } else {
        values
    };

    if header.cols == 0 {
        return Err(npy_err("embedding dimension is zero"));
    }
    Embeddings::new(values, header.cols)
}

/// Column-major to row-major.
fn transpose(values: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; values.len()];
    for c in 0..cols {
        for r in 0..rows {
            out[r * cols + c] = values[c * rows + r];
        }
    }
    out
}

/// Read an embedding matrix from a .npy file.
pub fn read_embeddings(path: impl AsRef<Path>) -> Result<Embeddings> {
    let mut raw = Vec::new();
    File::open(path.as_ref())?.read_to_end(&mut raw)?;
    parse_embeddings(&raw)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
