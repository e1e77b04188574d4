//! Single-pass iterator over a fetched result batch.

use std::iter::FusedIterator;

use dune_core::{JobId, ResultMetadata, ResultRow};
use serde_json::Value;

/// Rows of a finished job, yielded once in platform order.
///
/// The whole batch is fetched before the first row is yielded; iteration
/// only hands the rows out. Once exhausted it stays exhausted.
#[derive(Debug)]
pub struct ResultRows {
    job_id: JobId,
    metadata: Vec<ResultMetadata>,
    rows: std::vec::IntoIter<ResultRow>,
}

impl ResultRows {
    /// Flatten the `data` of each result record into rows.
    ///
    /// An array contributes each element as a row, `null` contributes
    /// nothing, and any other value is a row by itself.
    pub fn from_records(
        job_id: JobId,
        metadata: Vec<ResultMetadata>,
        records: impl IntoIterator<Item = Value>,
    ) -> Self {
        let mut rows = Vec::new();
        for data in records {
            match data {
                Value::Array(items) => rows.extend(items),
                Value::Null => {}
                row => rows.push(row),
            }
        }
        Self {
            job_id,
            metadata,
            rows: rows.into_iter(),
        }
    }

    /// The job these rows belong to.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Result metadata (error text, runtime, generation time, columns).
    pub fn metadata(&self) -> &[ResultMetadata] {
        &self.metadata
    }

    /// Column names of the first result, if the platform reported them.
    pub fn columns(&self) -> &[String] {
        self.metadata.first().map_or(&[][..], |m| m.columns.as_slice())
    }
}

impl Iterator for ResultRows {
    type Item = ResultRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for ResultRows {}

impl FusedIterator for ResultRows {}
