// Atlas — tests/common/mod.rs
// In-memory dataset provider that records every call made against it.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};

use atlas::{
    AtlasError, DatasetProvider, DatasetSession, DatasetSpec, EmbeddedRecord, IndexHandle,
    IndexRequest, Record,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateOrOpen(DatasetSpec),
    AddRecords(usize),
    AddEmbeddings(usize),
    Delete,
    CreateIndex(IndexRequest),
    RebuildMaps,
    Refresh,
}

#[derive(Debug, Default)]
pub struct Remote {
    pub calls: Vec<Call>,
    /// Records already in the dataset when it is opened
    pub existing: u64,
    /// 1-based batch number rejected by the server
    pub fail_on_batch: Option<usize>,
    pub fail_delete: bool,
    pub batches_seen: usize,
    /// Value of the id field for every accepted record, in order
    pub ids: Vec<Value>,
    pub id_field: String,
}

impl Remote {
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::AddRecords(n) | Call::AddEmbeddings(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| wanted(c)).count()
    }
}

#[derive(Clone, Default)]
pub struct FakeProvider {
    pub remote: Rc<RefCell<Remote>>,
}

impl FakeProvider {
    pub fn existing(records: u64) -> Self {
        let provider = Self::default();
        provider.remote.borrow_mut().existing = records;
        provider
    }

    pub fn failing_on_batch(self, batch: usize) -> Self {
        self.remote.borrow_mut().fail_on_batch = Some(batch);
        self
    }

    pub fn failing_delete(self) -> Self {
        self.remote.borrow_mut().fail_delete = true;
        self
    }
}

#[derive(Debug)]
pub struct FakeSession {
    name: String,
    remote: Rc<RefCell<Remote>>,
}

impl DatasetProvider for FakeProvider {
    type Session = FakeSession;

    fn create_or_open(&self, spec: &DatasetSpec) -> atlas::Result<FakeSession> {
        let mut remote = self.remote.borrow_mut();
        remote.calls.push(Call::CreateOrOpen(spec.clone()));
        remote.id_field = spec.unique_id_field.clone();
        Ok(FakeSession {
            name: spec.identifier.clone(),
            remote: Rc::clone(&self.remote),
        })
    }
}

impl FakeSession {
    fn accept(&mut self, rows: &[&Record], call: Call) -> atlas::Result<()> {
        let mut remote = self.remote.borrow_mut();
        remote.calls.push(call);
        remote.batches_seen += 1;
        if remote.fail_on_batch == Some(remote.batches_seen) {
            return Err(AtlasError::Remote {
                status: 500,
                message: "upload rejected".into(),
            });
        }
        let field = remote.id_field.clone();
        for row in rows {
            let id = row.get(&field).cloned().unwrap_or(Value::Null);
            remote.ids.push(id);
        }
        Ok(())
    }
}

impl DatasetSession for FakeSession {
    fn identifier(&self) -> &str {
        &self.name
    }

    fn total_datums(&self) -> atlas::Result<u64> {
        Ok(self.remote.borrow().existing)
    }

    fn add_records(&mut self, batch: &[Record]) -> atlas::Result<()> {
        let rows: Vec<&Record> = batch.iter().collect();
        self.accept(&rows, Call::AddRecords(batch.len()))
    }

    fn add_embeddings(&mut self, batch: &[EmbeddedRecord]) -> atlas::Result<()> {
        let rows: Vec<&Record> = batch.iter().map(|r| &r.fields).collect();
        self.accept(&rows, Call::AddEmbeddings(batch.len()))
    }

    fn delete(&mut self) -> atlas::Result<()> {
        let mut remote = self.remote.borrow_mut();
        remote.calls.push(Call::Delete);
        if remote.fail_delete {
            return Err(AtlasError::Remote {
                status: 503,
                message: "delete unavailable".into(),
            });
        }
        Ok(())
    }

    fn create_index(&mut self, request: &IndexRequest) -> atlas::Result<IndexHandle> {
        self.remote
            .borrow_mut()
            .calls
            .push(Call::CreateIndex(request.clone()));
        Ok(IndexHandle {
            id: "index-1".into(),
            name: request.name.clone(),
            projection_ids: vec!["projection-1".into()],
        })
    }

    fn rebuild_maps(&mut self) -> atlas::Result<()> {
        self.remote.borrow_mut().calls.push(Call::RebuildMaps);
        Ok(())
    }

    fn refresh(&mut self) -> atlas::Result<()> {
        self.remote.borrow_mut().calls.push(Call::Refresh);
        Ok(())
    }
}

/// `n` records of the form `{"text": "document i"}`.
pub fn text_records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| record(json!({ "text": format!("document {}", i) })))
        .collect()
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}
