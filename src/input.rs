// Atlas — input.rs
// Input adapters: normalize tabular, columnar, JSON, and embedding inputs
// into a lazy, single-pass stream of records in original order.
// Author: d65v <https://github.com/d65v>

use serde_json::Value;

use crate::record::{EmbeddedRecord, Record};
use crate::{AtlasError, Result};

/// Lazy record stream produced by every adapter.
pub type Records<'a> = Box<dyn Iterator<Item = Result<Record>> + 'a>;

/// Lazy stream of metadata records paired with embedding rows.
pub type EmbeddedRecords<'a> = Box<dyn Iterator<Item = Result<EmbeddedRecord>> + 'a>;

/// Anything that can be read as a sequence of records.
///
/// Adapting is pure: nothing is read until the returned iterator is pulled.
pub trait IntoRecords<'a> {
    fn into_records(self) -> Records<'a>;
}

impl<'a> IntoRecords<'a> for Vec<Record> {
    fn into_records(self) -> Records<'a> {
        Box::new(self.into_iter().map(Ok::<Record, AtlasError>))
    }
}

/// Borrowed records are shallow-copied; the caller's data is left untouched.
impl<'a> IntoRecords<'a> for &'a [Record] {
    fn into_records(self) -> Records<'a> {
        Box::new(self.iter().cloned().map(Ok::<Record, AtlasError>))
    }
}

impl<'a> IntoRecords<'a> for &'a Vec<Record> {
    fn into_records(self) -> Records<'a> {
        self.as_slice().into_records()
    }
}

/// A stream that is already fallible, e.g. a line reader; passed through as is.
impl<'a> IntoRecords<'a> for Records<'a> {
    fn into_records(self) -> Records<'a> {
        self
    }
}

// ── JSON Rows ─────────────────────────────────────────────────────────────────

/// An iterable of arbitrary JSON values, each expected to be an object.
pub struct JsonRows<I>(pub I);

impl<'a, I> IntoRecords<'a> for JsonRows<I>
where
    I: IntoIterator<Item = Value>,
    I::IntoIter: 'a,
{
    fn into_records(self) -> Records<'a> {
        Box::new(
            self.0
                .into_iter()
                .enumerate()
                .map(|(i, value)| match value {
                    Value::Object(map) => Ok(map),
                    other => Err(AtlasError::validation(format!(
                        "datum {} is not a mapping (found {})",
                        i,
                        json_kind(&other)
                    ))),
                }),
        )
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Row-Oriented Table ────────────────────────────────────────────────────────

/// Row-oriented tabular data: a header plus positional rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn zip_row(columns: &[String], index: usize, row: Vec<Value>) -> Result<Record> {
    if row.len() != columns.len() {
        return Err(AtlasError::validation(format!(
            "row {} has {} values but the table has {} columns",
            index,
            row.len(),
            columns.len()
        )));
    }
    Ok(columns.iter().cloned().zip(row).collect())
}

impl<'a> IntoRecords<'a> for RowTable {
    fn into_records(self) -> Records<'a> {
        let columns = self.columns;
        Box::new(
            self.rows
                .into_iter()
                .enumerate()
                .map(move |(i, row)| zip_row(&columns, i, row)),
        )
    }
}

impl<'a> IntoRecords<'a> for &'a RowTable {
    fn into_records(self) -> Records<'a> {
        Box::new(
            self.rows
                .iter()
                .enumerate()
                .map(move |(i, row)| zip_row(&self.columns, i, row.clone())),
        )
    }
}

// ── Columnar Table ────────────────────────────────────────────────────────────

/// Column-oriented tabular data. All columns have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTable {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
    num_rows: usize,
}

impl ColumnTable {
    /// Build a table from named columns.
    ///
    /// # Errors
    /// Returns `AtlasError::Validation` if the columns differ in length or a
    /// name repeats.
    pub fn new(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let num_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let mut names = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());

        for (name, column) in columns {
            if column.len() != num_rows {
                return Err(AtlasError::validation(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    column.len(),
                    num_rows
                )));
            }
            if names.contains(&name) {
                return Err(AtlasError::validation(format!("duplicate column '{}'", name)));
            }
            names.push(name);
            data.push(column);
        }

        Ok(Self {
            names,
            columns: data,
            num_rows,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Materialize one row as a record.
    pub fn row(&self, index: usize) -> Option<Record> {
        if index >= self.num_rows {
            return None;
        }
        Some(
            self.names
                .iter()
                .zip(&self.columns)
                .map(|(name, col)| (name.clone(), col[index].clone()))
                .collect(),
        )
    }
}

impl<'a> IntoRecords<'a> for &'a ColumnTable {
    fn into_records(self) -> Records<'a> {
        Box::new(
            (0..self.num_rows)
                .filter_map(move |i| self.row(i))
                .map(Ok::<Record, AtlasError>),
        )
    }
}

impl<'a> IntoRecords<'a> for ColumnTable {
    fn into_records(self) -> Records<'a> {
        let names = self.names;
        let mut cursors: Vec<_> = self.columns.into_iter().map(Vec::into_iter).collect();
        Box::new((0..self.num_rows).map(move |_| -> Result<Record> {
            let mut record = Record::new();
            for (name, cursor) in names.iter().zip(cursors.iter_mut()) {
                record.insert(name.clone(), cursor.next().unwrap_or(Value::Null));
            }
            Ok(record)
        }))
    }
}

// ── Embeddings ────────────────────────────────────────────────────────────────

/// A dense row-major `[rows, dim]` array of f32 embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    values: Vec<f32>,
    dim: usize,
}

impl Embeddings {
    /// Wrap a flat row-major buffer.
    ///
    /// # Errors
    /// Returns `AtlasError::Validation` if `dim` is zero or does not divide the
    /// buffer length.
    pub fn new(values: Vec<f32>, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(AtlasError::validation("embedding dimension must be positive"));
        }
        if values.len() % dim != 0 {
            return Err(AtlasError::validation(format!(
                "{} values cannot be split into rows of {}",
                values.len(),
                dim
            )));
        }
        Ok(Self { values, dim })
    }

    /// Build from nested rows, which must all have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map(Vec::len).unwrap_or(0);
        let mut values = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(AtlasError::validation(format!(
                    "embedding row {} has {} dimensions, expected {}",
                    i,
                    row.len(),
                    dim
                )));
            }
            values.extend(row);
        }
        if dim == 0 {
            return Ok(Self { values, dim: 1 });
        }
        Self::new(values, dim)
    }

    pub fn rows(&self) -> usize {
        self.values.len() / self.dim
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        self.values.chunks_exact(self.dim).nth(index)
    }

    pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.values.chunks_exact(self.dim)
    }

    /// Reject empty arrays and non-finite values before anything is uploaded.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(AtlasError::validation("Your embeddings cannot be empty"));
        }
        if let Some(pos) = self.values.iter().position(|x| !x.is_finite()) {
            return Err(AtlasError::validation(format!(
                "embedding row {} contains NaN or Inf",
                pos / self.dim
            )));
        }
        Ok(())
    }
}

/// Pair each embedding row with its sidecar metadata record.
///
/// Without metadata every row starts from an empty record.
///
/// # Errors
/// Returns `AtlasError::Validation` if the metadata length differs from the
/// number of embedding rows.
pub fn embedded_records<'a>(
    embeddings: &'a Embeddings,
    metadata: Option<Vec<Record>>,
) -> Result<EmbeddedRecords<'a>> {
    let rows = embeddings.iter_rows().map(<[f32]>::to_vec);
    match metadata {
        Some(data) => {
            if data.len() != embeddings.rows() {
                return Err(AtlasError::validation(format!(
                    "metadata has {} entries but there are {} embeddings",
                    data.len(),
                    embeddings.rows()
                )));
            }
            let paired = data
                .into_iter()
                .zip(rows)
                .map(|(fields, embedding)| EmbeddedRecord { fields, embedding });
            Ok(Box::new(paired.map(Ok::<EmbeddedRecord, AtlasError>)))
        }
        None => {
            let bare = rows.map(|embedding| EmbeddedRecord {
                fields: Record::new(),
                embedding,
            });
            Ok(Box::new(bare.map(Ok::<EmbeddedRecord, AtlasError>)))
        }
    }
}

// ── Arrow (optional) ──────────────────────────────────────────────────────────

#[cfg(feature = "arrow")]
mod arrow_rows {
    use arrow::array::{
        Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
        LargeStringArray, StringArray, UInt32Array, UInt64Array,
    };
    use arrow::datatypes::DataType;
    use arrow::record_batch::RecordBatch;
    use serde_json::Value;

    use super::{IntoRecords, Records};
    use crate::record::Record;
    use crate::{AtlasError, Result};

    fn downcast<T: 'static>(col: &ArrayRef) -> Result<&T> {
        col.as_any().downcast_ref::<T>().ok_or_else(|| {
            AtlasError::validation(format!("column type {} failed to downcast", col.data_type()))
        })
    }

    /// Read one cell of a supported column type as JSON. Nulls become `null`.
    pub(super) fn cell(col: &ArrayRef, idx: usize) -> Result<Value> {
        if col.is_null(idx) {
            return Ok(Value::Null);
        }
        let value = match col.data_type() {
            DataType::Utf8 => Value::from(downcast::<StringArray>(col)?.value(idx)),
            DataType::LargeUtf8 => Value::from(downcast::<LargeStringArray>(col)?.value(idx)),
            DataType::Boolean => Value::from(downcast::<BooleanArray>(col)?.value(idx)),
            DataType::Int32 => Value::from(downcast::<Int32Array>(col)?.value(idx)),
            DataType::Int64 => Value::from(downcast::<Int64Array>(col)?.value(idx)),
            DataType::UInt32 => Value::from(downcast::<UInt32Array>(col)?.value(idx)),
            DataType::UInt64 => Value::from(downcast::<UInt64Array>(col)?.value(idx)),
            DataType::Float32 => Value::from(downcast::<Float32Array>(col)?.value(idx) as f64),
            DataType::Float64 => Value::from(downcast::<Float64Array>(col)?.value(idx)),
            other => {
                return Err(AtlasError::validation(format!(
                    "unsupported arrow column type {}",
                    other
                )))
            }
        };
        Ok(value)
    }

    impl<'a> IntoRecords<'a> for &'a RecordBatch {
        fn into_records(self) -> Records<'a> {
            let names: Vec<String> = self
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect();
            Box::new((0..self.num_rows()).map(move |row| -> Result<Record> {
                let mut record = Record::new();
                for (name, col) in names.iter().zip(self.columns()) {
                    record.insert(name.clone(), cell(col, row)?);
                }
                Ok(record)
            }))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_vec_records_preserve_order() {
        let data = vec![rec(json!({"a": 1})), rec(json!({"a": 2}))];
        let out: Vec<Record> = data.into_records().collect::<Result<_>>().unwrap();
        assert_eq!(out[0]["a"], 1);
        assert_eq!(out[1]["a"], 2);
    }

    #[test]
    fn test_borrowed_records_are_copied() {
        let data = vec![rec(json!({"a": 1}))];
        let mut out: Vec<Record> = (&data).into_records().collect::<Result<_>>().unwrap();
        out[0].insert("a".into(), json!(99));
        assert_eq!(data[0]["a"], 1);
    }

    #[test]
    fn test_json_rows_rejects_non_mapping() {
        let rows = vec![json!({"a": 1}), json!([1, 2])];
        let mut it = JsonRows(rows).into_records();
        assert!(it.next().unwrap().is_ok());
        let err = it.next().unwrap().unwrap_err();
        assert!(matches!(err, AtlasError::Validation(_)));
        assert!(err.to_string().contains("datum 1"));
    }

    #[test]
    fn test_json_rows_is_lazy() {
        let mut pulled = 0;
        let source = (0..10).map(|i| {
            pulled += 1;
            json!({ "i": i })
        });
        let mut it = JsonRows(source).into_records();
        it.next();
        drop(it);
        assert_eq!(pulled, 1);
    }

    #[test]
    fn test_row_table() {
        let mut table = RowTable::new(vec!["text".into(), "label".into()]);
        table.push_row(vec![json!("hello"), json!(0)]);
        table.push_row(vec![json!("world"), json!(1)]);
        let out: Vec<Record> = (&table).into_records().collect::<Result<_>>().unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1]["text"], "world");
        let keys: Vec<&String> = out[0].keys().collect();
        assert_eq!(keys, vec!["text", "label"]);
    }

    #[test]
    fn test_row_table_arity_mismatch() {
        let mut table = RowTable::new(vec!["a".into(), "b".into()]);
        table.push_row(vec![json!(1)]);
        let first = table.into_records().next().unwrap();
        assert!(matches!(first, Err(AtlasError::Validation(_))));
    }

    #[test]
    fn test_column_table() {
        let table = ColumnTable::new(vec![
            ("text".into(), vec![json!("a"), json!("b"), json!("c")]),
            ("n".into(), vec![json!(1), json!(2), json!(3)]),
        ])
        .unwrap();
        assert_eq!(table.num_rows(), 3);
        let borrowed: Vec<Record> = (&table).into_records().collect::<Result<_>>().unwrap();
        let owned: Vec<Record> = table.into_records().collect::<Result<_>>().unwrap();
        assert_eq!(borrowed, owned);
        assert_eq!(owned[2]["text"], "c");
        assert_eq!(owned[2]["n"], 3);
    }

    #[test]
    fn test_column_table_length_mismatch() {
        let err = ColumnTable::new(vec![
            ("a".into(), vec![json!(1), json!(2)]),
            ("b".into(), vec![json!(1)]),
        ])
        .unwrap_err();
        assert!(matches!(err, AtlasError::Validation(_)));
    }

    #[test]
    fn test_embeddings_shape() {
        let e = Embeddings::new(vec![0.0; 12], 4).unwrap();
        assert_eq!(e.rows(), 3);
        assert_eq!(e.row(2).unwrap().len(), 4);
        assert!(e.row(3).is_none());
        assert!(Embeddings::new(vec![0.0; 10], 4).is_err());
        assert!(Embeddings::new(vec![], 0).is_err());
    }

    #[test]
    fn test_embeddings_from_rows_ragged() {
        let err = Embeddings::from_rows(vec![vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, AtlasError::Validation(_)));
    }

    #[test]
    fn test_embeddings_validate() {
        let empty = Embeddings::from_rows(vec![]).unwrap();
        assert!(empty.validate().is_err());
        let nan = Embeddings::from_rows(vec![vec![1.0, 0.0], vec![f32::NAN, 0.0]]).unwrap();
        let err = nan.validate().unwrap_err();
        assert!(err.to_string().contains("row 1"));
        let ok = Embeddings::from_rows(vec![vec![1.0, 0.0]]).unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_embedded_records_metadata_mismatch() {
        let e = Embeddings::from_rows(vec![vec![1.0], vec![2.0]]).unwrap();
        let result = embedded_records(&e, Some(vec![Record::new()]));
        assert!(matches!(result, Err(AtlasError::Validation(_))));
    }

    #[test]
    fn test_embedded_records_pairs_rows() {
        let e = Embeddings::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let meta = vec![rec(json!({"k": "a"})), rec(json!({"k": "b"}))];
        let out: Vec<EmbeddedRecord> = embedded_records(&e, Some(meta))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(out[1].fields["k"], "b");
        assert_eq!(out[1].embedding, vec![3.0, 4.0]);

        let bare: Vec<EmbeddedRecord> = embedded_records(&e, None)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert!(bare[0].fields.is_empty());
    }

    #[cfg(feature = "arrow")]
    #[test]
    fn test_record_batch_rows() {
        use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
        use arrow::record_batch::RecordBatch;
        use std::sync::Arc;

        let text: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), None]));
        let n: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
        let x: ArrayRef = Arc::new(Float64Array::from(vec![0.5, 1.5]));
        let batch = RecordBatch::try_from_iter(vec![("text", text), ("n", n), ("x", x)]).unwrap();

        let out: Vec<Record> = (&batch).into_records().collect::<Result<_>>().unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["text"], "a");
        assert_eq!(out[1]["text"], Value::Null);
        assert_eq!(out[1]["n"], 2);
        assert_eq!(out[0]["x"], 0.5);
    }
}
