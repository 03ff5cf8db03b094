//! Chunked durable writes.
//!
//! The backend accepts at most [`MAX_BATCH`] documents per multi-put.
//! [`BatchedWriter`] pulls records from any iterator, fills one chunk at a
//! time and flushes it, so peak memory is one chunk regardless of how many
//! records the iterator yields.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::kv::{KvStore, MAX_BATCH};

/// Writes record streams to a [`KvStore`] in bounded chunks.
#[derive(Clone)]
pub struct BatchedWriter {
    store: Arc<dyn KvStore>,
    batch_size: usize,
}

impl BatchedWriter {
    /// Create a writer using the largest batch the backend accepts.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            batch_size: MAX_BATCH,
        }
    }

    /// Use a smaller chunk size. Values are clamped to `1..=MAX_BATCH`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write every `(key, record)` pair and return how many were written.
    ///
    /// Records keep their input order within and across chunks. If a chunk
    /// fails, writing stops and [`Error::ChunkFailed`] reports how many
    /// records made it into earlier chunks.
    pub fn write_all<I, T>(&self, collection: &str, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = (String, T)>,
        T: Serialize,
    {
        let mut chunk: Vec<(String, Value)> = Vec::with_capacity(self.batch_size);
        let mut written = 0;
        let mut chunk_index = 0;

        for (key, record) in records {
            chunk.push((key, serde_json::to_value(record)?));
            if chunk.len() == self.batch_size {
                self.flush(collection, &mut chunk, chunk_index, &mut written)?;
                chunk_index += 1;
            }
        }

        if !chunk.is_empty() {
            self.flush(collection, &mut chunk, chunk_index, &mut written)?;
        }

        Ok(written)
    }

    fn flush(
        &self,
        collection: &str,
        chunk: &mut Vec<(String, Value)>,
        chunk_index: usize,
        written: &mut usize,
    ) -> Result<()> {
        self.store
            .put_multi(collection, chunk)
            .map_err(|source| Error::ChunkFailed {
                chunk: chunk_index,
                written: *written,
                source: Box::new(source),
            })?;

        *written += chunk.len();
        debug!(
            "Wrote chunk {} of {} records to {} ({} total)",
            chunk_index,
            chunk.len(),
            collection,
            written
        );
        chunk.clear();
        Ok(())
    }
}
