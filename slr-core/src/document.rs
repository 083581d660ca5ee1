//! Per-document encoding
//!
//! A document is turned into its encoded terms plus optional stored data:
//! a small string dictionary with the vector (`slr`) and/or the source
//! content (`raw`), and an exact packed copy of the vector.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analysis::SlrTokenizer;
use crate::codec::{EncodedTerm, VectorCodec};
use crate::config::{IndexConfig, QuantizationConfig};
use crate::error::{Error, Result};
use crate::pack;
use crate::source::VectorSource;
use crate::vector::SparseVector;

/// Stored dictionary for inspection; never parsed back
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl StoredRecord {
    /// `{"raw": "...", "slr": "{3: 0.9, 50: 0.89}"}`
    pub fn render(&self) -> String {
        let mut map = BTreeMap::new();
        if let Some(slr) = &self.slr {
            map.insert("slr", slr.as_str());
        }
        if let Some(raw) = &self.raw {
            map.insert("raw", raw.as_str());
        }
        format!("{:?}", map)
    }

    pub fn is_empty(&self) -> bool {
        self.slr.is_none() && self.raw.is_none()
    }
}

/// A document ready to be indexed
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDocument {
    pub id: String,
    pub terms: Vec<EncodedTerm>,
    pub stored: Option<StoredRecord>,
    /// Exact packed vector, see [`pack`](crate::pack)
    pub exact: Option<Vec<u8>>,
}

/// Encodes documents under one quantization config and index options
#[derive(Debug, Clone)]
pub struct DocumentEncoder {
    codec: VectorCodec,
    config: IndexConfig,
}

impl DocumentEncoder {
    pub fn new(quantization: QuantizationConfig, config: IndexConfig) -> Self {
        Self {
            codec: VectorCodec::new(quantization),
            config,
        }
    }

    pub fn codec(&self) -> &VectorCodec {
        &self.codec
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Encode a document whose vector is already known
    pub fn encode(
        &self,
        id: &str,
        vector: &SparseVector,
        raw: Option<&str>,
    ) -> Result<EncodedDocument> {
        let terms = self.codec.encode_vector(vector)?;
        if terms.len() < vector.len() {
            debug!(
                "document '{}': {} of {} dimensions below resolution",
                id,
                vector.len() - terms.len(),
                vector.len()
            );
        }

        Ok(EncodedDocument {
            id: id.to_string(),
            terms,
            stored: self.stored_record(vector, raw),
            exact: self.exact_copy(vector)?,
        })
    }

    /// Encode a document given as SLR content (`00030.9000000 ...`)
    ///
    /// Terms come straight from [`SlrTokenizer`]; the stored vector and the
    /// exact copy hold the quantized values, the content itself is the raw text.
    pub fn encode_slr(&self, id: &str, content: &str) -> Result<EncodedDocument> {
        if content.trim().is_empty() {
            return Err(Error::EmptyDocument(id.to_string()));
        }
        let terms = SlrTokenizer::new(self.codec, content).terms()?;
        let vector = if self.config.store_slr || self.config.store_exact {
            self.codec.decode_vector(&terms)?
        } else {
            SparseVector::new()
        };
        Ok(EncodedDocument {
            id: id.to_string(),
            stored: self.stored_record(&vector, Some(content)),
            exact: self.exact_copy(&vector)?,
            terms,
        })
    }

    fn stored_record(&self, vector: &SparseVector, raw: Option<&str>) -> Option<StoredRecord> {
        if !self.config.store_slr && !self.config.store_raw {
            return None;
        }
        Some(StoredRecord {
            slr: self.config.store_slr.then(|| slr_string(vector)),
            raw: if self.config.store_raw {
                raw.map(str::to_string)
            } else {
                None
            },
        })
    }

    fn exact_copy(&self, vector: &SparseVector) -> Result<Option<Vec<u8>>> {
        if self.config.store_exact {
            pack::pack_vector(vector).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Vectorize `content` with `source`, then encode
    pub async fn encode_content(
        &self,
        id: &str,
        content: &str,
        source: &dyn VectorSource,
    ) -> Result<EncodedDocument> {
        if content.trim().is_empty() {
            return Err(Error::EmptyDocument(id.to_string()));
        }
        let vector = source.vectorize(id, content).await?;
        self.encode(id, &vector, Some(content))
    }
}

/// `{3: 0.9, 50: 0.89}`
fn slr_string(vector: &SparseVector) -> String {
    format!("{:?}", vector.iter().collect::<BTreeMap<u32, f64>>())
}
