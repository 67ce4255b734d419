//! Durable mapping from batch arrival time to the flow records received.
//!
//! The on-disk form is a single JSON object keyed by the stringified
//! timestamp. Writes go to a sibling temporary file which is renamed over
//! the store, so readers only ever see a complete document.

use crate::flow::FlowRecord;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

mod key;
mod writer;


pub use key::{BatchKey, BatchKeyError, KeySource};
pub use writer::{StoreWriter, WriterClosed, WriterHandle, WriterSummary};

pub type Batches = BTreeMap<BatchKey, Vec<FlowRecord>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {action} {path:?}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path:?} is not a JSON object of batches")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("batch {0} already exists")]
    DuplicateKey(BatchKey),
}

impl StoreError {
    fn io(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> StoreError {
        let path = path.to_path_buf();
        move |source| StoreError::Io {
            action,
            path,
            source,
        }
    }
}

#[derive(Debug)]
pub struct BatchStore {
    path: PathBuf,
    batches: Batches,
    unreadable: Unreadable,
}

impl BatchStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    /// Entries that cannot be read are held as written and go back into the
    /// file on every persist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let (batches, unreadable) = read_document(&path)?;
        if !unreadable.is_empty() {
            warn!(
                path = ?path,
                entries = unreadable.len(),
                "Keeping unreadable store entries as-is"
            );
        }
        Ok(Self {
            path,
            batches,
            unreadable,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn batches(&self) -> &Batches {
        &self.batches
    }

    pub fn into_batches(self) -> Batches {
        self.batches
    }

    /// Newest key in the file, counting batches held unread.
    pub fn last_key(&self) -> Option<&BatchKey> {
        let readable = self.batches.keys().next_back();
        let held = self.unreadable.values.keys().next_back();
        readable.max(held)
    }

    pub fn record_count(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    /// Number of keys, batches and records carried through without being read.
    pub fn unreadable(&self) -> usize {
        self.unreadable.len()
    }

    /// Adds a batch in memory. Existing batches are never replaced.
    pub fn append(&mut self, key: BatchKey, records: Vec<FlowRecord>) -> Result<(), StoreError> {
        if self.batches.contains_key(&key) || self.unreadable.values.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key));
        }
        self.batches.insert(key, records);
        Ok(())
    }

    pub fn persist(&self) -> Result<(), StoreError> {
        let document = Document {
            batches: &self.batches,
            unreadable: &self.unreadable,
        };
        write_atomically(&self.path, &document)?;
        debug!(path = ?self.path, batches = self.batches.len(), "Persisted batch store");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Unreadable {
    /// Entries whose key is not a timestamp, or repeats an earlier one.
    keys: Vec<(String, Box<RawValue>)>,
    /// Timestamped entries whose value is not a list.
    values: BTreeMap<BatchKey, Box<RawValue>>,
    /// Records that did not parse, with their position in the batch.
    records: BTreeMap<BatchKey, Vec<(usize, Box<RawValue>)>>,
}

impl Unreadable {
    fn len(&self) -> usize {
        self.keys.len() + self.values.len() + self.records.values().map(Vec::len).sum::<usize>()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads every batch at `path`. A missing or blank file is an empty store.
/// Entries that cannot be understood are skipped with a warning; only a
/// document that is not a JSON object fails the load.
pub fn load(path: &Path) -> Result<Batches, StoreError> {
    read_document(path).map(|(batches, _)| batches)
}

fn read_document(path: &Path) -> Result<(Batches, Unreadable), StoreError> {
    let mut batches = Batches::new();
    let mut unreadable = Unreadable::default();

    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = ?path, "No store yet; starting empty");
            return Ok((batches, unreadable));
        }
        Err(e) => return Err(StoreError::io("read", path)(e)),
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok((batches, unreadable));
    }

    let document: Vec<(String, Box<RawValue>)> = serde_json::from_slice::<RawEntries>(&raw)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?
        .0;

    for (text, value) in document {
        let key = match BatchKey::parse(&text) {
            Ok(key) if !batches.contains_key(&key) && !unreadable.values.contains_key(&key) => key,
            Ok(key) => {
                warn!(path = ?path, batch = %key, "Skipping repeated batch key");
                unreadable.keys.push((text, value));
                continue;
            }
            Err(error) => {
                warn!(path = ?path, %error, "Skipping batch with unreadable key");
                unreadable.keys.push((text, value));
                continue;
            }
        };
        let Ok(items) = serde_json::from_str::<Vec<Box<RawValue>>>(value.get()) else {
            warn!(path = ?path, batch = %key, "Skipping batch that is not a list of records");
            unreadable.values.insert(key, value);
            continue;
        };

        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match FlowRecord::from_json(item.get()) {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(path = ?path, batch = %key, index, %error, "Skipping unreadable flow record");
                    unreadable.records.entry(key.clone()).or_default().push((index, item));
                }
            }
        }
        batches.insert(key, records);
    }

    debug!(path = ?path, batches = batches.len(), "Loaded batch store");
    Ok((batches, unreadable))
}

/// Top-level entries in file order, keeping repeated keys.
struct RawEntries(Vec<(String, Box<RawValue>)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object of batches")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// The batches plus everything held unread, in the stored layout.
struct Document<'a> {
    batches: &'a Batches,
    unreadable: &'a Unreadable,
}

impl Serialize for Document<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let held = self.unreadable;
        let mut map = serializer.serialize_map(None)?;
        for (key, records) in self.batches {
            let batch = Batch {
                records,
                unreadable: held.records.get(key).map(Vec::as_slice).unwrap_or_default(),
            };
            map.serialize_entry(key.as_str(), &batch)?;
        }
        for (key, value) in &held.values {
            map.serialize_entry(key.as_str(), value)?;
        }
        for (text, value) in &held.keys {
            map.serialize_entry(text, value)?;
        }
        map.end()
    }
}

/// One batch with its unread records put back at their original positions.
struct Batch<'a> {
    records: &'a [FlowRecord],
    unreadable: &'a [(usize, Box<RawValue>)],
}

impl Serialize for Batch<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len() + self.unreadable.len()))?;
        let mut records = self.records.iter();
        let mut held = self.unreadable.iter().peekable();
        let mut position = 0;
        loop {
            if let Some((_, value)) = held.next_if(|(index, _)| *index <= position) {
                seq.serialize_element(value)?;
            } else if let Some(record) = records.next() {
                seq.serialize_element(record)?;
            } else if let Some((_, value)) = held.next() {
                seq.serialize_element(value)?;
            } else {
                break;
            }
            position += 1;
        }
        seq.end()
    }
}

/// Writes `batches` to `path` atomically: temporary file, fsync, rename.
pub fn persist(path: &Path, batches: &Batches) -> Result<(), StoreError> {
    write_atomically(path, batches)?;
    debug!(path = ?path, batches = batches.len(), "Persisted batch store");
    Ok(())
}

fn write_atomically(path: &Path, document: &impl Serialize) -> Result<(), StoreError> {
    let tmp = temporary_path(path);

    let file = File::create(&tmp).map_err(StoreError::io("create", &tmp))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, document)
        .map_err(io::Error::from)
        .map_err(StoreError::io("write", &tmp))?;
    writer.flush().map_err(StoreError::io("write", &tmp))?;
    let file = writer
        .into_inner()
        .map_err(|e| StoreError::io("write", &tmp)(e.into_error()))?;
    file.sync_all().map_err(StoreError::io("sync", &tmp))?;
    drop(file);

    fs::rename(&tmp, path).map_err(StoreError::io("replace", path))
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("flows.json"));
    name.push(".tmp");
    path.with_file_name(name)
}
