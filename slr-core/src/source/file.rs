//! Precomputed vectors from a TSV file

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use async_trait::async_trait;
use log::{info, warn};
use rustc_hash::FxHashMap;

use super::VectorSource;
use crate::error::{Error, Result};
use crate::vector::{SparseVector, parse_dense_row};

/// Why a row could not be turned into a vector
#[derive(Debug, Clone, PartialEq)]
enum InvalidRow {
    Malformed(String),
    Mismatch { expected: usize, got: usize },
}

impl InvalidRow {
    fn from_error(error: Error, line_no: usize) -> Result<Self> {
        match error {
            Error::MalformedVectorValue(msg) => {
                Ok(Self::Malformed(format!("line {}: {}", line_no, msg)))
            }
            Error::DimensionMismatch { expected, got } => Ok(Self::Mismatch { expected, got }),
            other => Err(other),
        }
    }

    fn to_error(&self) -> Error {
        match self {
            Self::Malformed(msg) => Error::MalformedVectorValue(msg.clone()),
            Self::Mismatch { expected, got } => Error::DimensionMismatch {
                expected: *expected,
                got: *got,
            },
        }
    }
}

/// Vectors loaded from `id \t v0 \t v1 ...` rows
///
/// Column `i + 1` holds the activation of dimension `i`; zeros are dropped.
/// Rows are kept in file order. A row that does not parse is remembered with
/// its error, which is returned when that id is asked for; the other rows
/// stay usable. Repeated ids fail the whole file.
#[derive(Debug, Default)]
pub struct TsvVectorFile {
    ids: Vec<String>,
    rows: FxHashMap<String, std::result::Result<SparseVector, InvalidRow>>,
    skipped_lines: usize,
}

impl TsvVectorFile {
    pub fn open(path: impl AsRef<Path>, dimensionality: u32) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let vectors = Self::parse(BufReader::new(file), dimensionality)?;
        info!(
            "Loaded {} vectors from {} ({} invalid rows, {} lines without id)",
            vectors.len(),
            path.display(),
            vectors.num_invalid(),
            vectors.skipped_lines
        );
        Ok(vectors)
    }

    pub fn parse<R: BufRead>(reader: R, dimensionality: u32) -> Result<Self> {
        let mut vectors = Self::default();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = line_no + 1;
            if line.trim().is_empty() {
                continue;
            }
            let mut cells = line.split('\t');
            let id = cells.next().map(str::trim).unwrap_or("");
            if id.is_empty() {
                warn!("line {}: missing id, skipped", line_no);
                vectors.skipped_lines += 1;
                continue;
            }
            if vectors.rows.contains_key(id) {
                return Err(Error::DuplicateDocument(id.to_string()));
            }
            let row = match parse_dense_row(cells, dimensionality) {
                Ok(vector) => Ok(vector),
                Err(e) => {
                    let invalid = InvalidRow::from_error(e, line_no)?;
                    warn!("line {}: vector for '{}' rejected: {}", line_no, id, invalid.to_error());
                    Err(invalid)
                }
            };
            vectors.ids.push(id.to_string());
            vectors.rows.insert(id.to_string(), row);
        }
        Ok(vectors)
    }

    /// Vector of a valid row
    pub fn get(&self, id: &str) -> Option<&SparseVector> {
        self.rows.get(id).and_then(|row| row.as_ref().ok())
    }

    /// Vector of `id`, or the error its row failed with
    pub fn vector(&self, id: &str) -> Result<&SparseVector> {
        match self.rows.get(id) {
            Some(Ok(vector)) => Ok(vector),
            Some(Err(invalid)) => Err(invalid.to_error()),
            None => Err(Error::DocumentNotFound(id.to_string())),
        }
    }

    /// Rows in file order, invalid ones with their error
    pub fn iter(&self) -> impl Iterator<Item = (&str, Result<&SparseVector>)> + '_ {
        self.ids.iter().map(|id| (id.as_str(), self.vector(id)))
    }

    /// Rows with an id, valid or not
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn num_invalid(&self) -> usize {
        self.rows.values().filter(|row| row.is_err()).count()
    }

    /// Lines dropped because they had no id
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }
}

#[async_trait]
impl VectorSource for TsvVectorFile {
    /// Looks the vector up by id; the content is ignored
    async fn vectorize(&self, id: &str, _content: &str) -> Result<SparseVector> {
        self.vector(id).cloned()
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
