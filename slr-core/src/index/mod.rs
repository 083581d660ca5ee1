//! In-memory inverted index over dimension tokens
//!
//! `IndexBuilder` collects encoded documents (single writer, batch); `build`
//! freezes them into an immutable [`MemoryIndex`] that implements
//! [`PostingReader`] and can be shared across queries.
//!
//! On disk an index directory holds:
//! - `quantization.json`: the [`QuantizationConfig`] used for every posting
//! - `postings.bin`: token -> block posting list
//! - `documents.json`: external ids and stored data, by internal doc id

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::config::{IndexConfig, QuantizationConfig};
use crate::document::{DocumentEncoder, EncodedDocument, StoredRecord};
use crate::error::{Error, Result};
use crate::pack;
use crate::postings::{BlockPostingIterator, BlockPostingList, PostingReader};
use crate::source::VectorSource;
use crate::vector::SparseVector;
use crate::{DocId, Weight};

pub const POSTINGS_FILENAME: &str = "postings.bin";
pub const DOCUMENTS_FILENAME: &str = "documents.json";

const POSTINGS_MAGIC: u32 = 0x534C_5250; // "SLRP"
const POSTINGS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentEntry {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stored: Option<StoredRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exact: Option<Vec<u8>>,
}

/// Collects documents and builds a [`MemoryIndex`]
pub struct IndexBuilder {
    encoder: DocumentEncoder,
    postings: FxHashMap<String, Vec<(DocId, Weight)>>,
    documents: Vec<DocumentEntry>,
    id_map: FxHashMap<String, DocId>,
}

impl IndexBuilder {
    pub fn new(quantization: QuantizationConfig, config: IndexConfig) -> Self {
        Self {
            encoder: DocumentEncoder::new(quantization, config),
            postings: FxHashMap::default(),
            documents: Vec::new(),
            id_map: FxHashMap::default(),
        }
    }

    pub fn encoder(&self) -> &DocumentEncoder {
        &self.encoder
    }

    pub fn num_docs(&self) -> u32 {
        self.documents.len() as u32
    }

    /// Encode and add a document with a known vector
    pub fn add_vector(
        &mut self,
        id: &str,
        vector: &SparseVector,
        raw: Option<&str>,
    ) -> Result<DocId> {
        let document = self.encoder.encode(id, vector, raw)?;
        self.add_encoded(document)
    }

    /// Vectorize `content` with `source`, encode and add
    pub async fn add_document(
        &mut self,
        id: &str,
        content: &str,
        source: &dyn VectorSource,
    ) -> Result<DocId> {
        let document = self.encoder.encode_content(id, content, source).await?;
        self.add_encoded(document)
    }

    /// Add a document given as SLR content text
    pub fn add_slr(&mut self, id: &str, content: &str) -> Result<DocId> {
        let document = self.encoder.encode_slr(id, content)?;
        self.add_encoded(document)
    }

    /// Add an encoded document; nothing is added when it is rejected
    pub fn add_encoded(&mut self, document: EncodedDocument) -> Result<DocId> {
        if self.id_map.contains_key(&document.id) {
            return Err(Error::DuplicateDocument(document.id));
        }
        if self.documents.len() >= DocId::MAX as usize {
            return Err(Error::Config("index is full".into()));
        }

        let codec = self.encoder.codec();
        let mut seen = FxHashSet::default();
        for term in &document.terms {
            let dimension = codec.parse_token(&term.token)?;
            if term.weight == 0 {
                return Err(Error::ZeroActivation(dimension));
            }
            if !seen.insert(term.token.as_str()) {
                return Err(Error::Corruption(format!(
                    "document '{}' repeats dimension {}",
                    document.id, dimension
                )));
            }
        }

        let doc_id = self.documents.len() as DocId;
        for term in document.terms {
            self.postings
                .entry(term.token)
                .or_default()
                .push((doc_id, term.weight));
        }
        self.id_map.insert(document.id.clone(), doc_id);
        self.documents.push(DocumentEntry {
            id: document.id,
            stored: document.stored,
            exact: document.exact,
        });
        Ok(doc_id)
    }

    pub fn build(self) -> Result<MemoryIndex> {
        let block_size = self.encoder.config().block_size;
        let postings = self
            .postings
            .into_iter()
            .map(|(token, postings)| {
                // doc ids were assigned in increasing order
                let list = BlockPostingList::from_postings_with_block_size(&postings, block_size)?;
                Ok((token, list))
            })
            .collect::<Result<FxHashMap<_, _>>>()?;

        info!(
            "Built index: docs={}, terms={}, block_size={}",
            self.documents.len(),
            postings.len(),
            block_size
        );

        Ok(MemoryIndex {
            quantization: *self.encoder.codec().config(),
            postings,
            documents: self.documents,
            id_map: self.id_map,
        })
    }
}

/// Immutable token -> posting list index
#[derive(Debug)]
pub struct MemoryIndex {
    quantization: QuantizationConfig,
    postings: FxHashMap<String, BlockPostingList>,
    documents: Vec<DocumentEntry>,
    id_map: FxHashMap<String, DocId>,
}

impl MemoryIndex {
    /// External id of an internal doc id
    pub fn doc_id(&self, doc: DocId) -> Option<&str> {
        self.documents.get(doc as usize).map(|d| d.id.as_str())
    }

    /// Internal doc id of an external id
    pub fn internal_id(&self, id: &str) -> Option<DocId> {
        self.id_map.get(id).copied()
    }

    pub fn stored(&self, doc: DocId) -> Option<&StoredRecord> {
        self.documents
            .get(doc as usize)
            .and_then(|d| d.stored.as_ref())
    }

    /// Exact (dimension, value) pairs, when the index keeps them
    pub fn exact_vector(&self, doc: DocId) -> Result<Option<Vec<(i32, f64)>>> {
        let entry = self
            .documents
            .get(doc as usize)
            .ok_or_else(|| Error::DocumentNotFound(doc.to_string()))?;
        entry.exact.as_deref().map(pack::unpack).transpose()
    }

    pub fn posting_list(&self, token: &str) -> Option<&BlockPostingList> {
        self.postings.get(token)
    }

    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }

    /// Tokens in dictionary (= dimension) order
    pub fn terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = self.postings.keys().map(String::as_str).collect();
        terms.sort_unstable();
        terms
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        self.quantization.save(dir)?;

        let mut writer = BufWriter::new(File::create(dir.join(POSTINGS_FILENAME))?);
        writer.write_u32::<LittleEndian>(POSTINGS_MAGIC)?;
        writer.write_u32::<LittleEndian>(POSTINGS_VERSION)?;
        writer.write_u32::<LittleEndian>(self.postings.len() as u32)?;
        for token in self.terms() {
            writer.write_u32::<LittleEndian>(token.len() as u32)?;
            writer.write_all(token.as_bytes())?;
            self.postings[token].serialize(&mut writer)?;
        }
        writer.flush()?;

        let mut writer = BufWriter::new(File::create(dir.join(DOCUMENTS_FILENAME))?);
        serde_json::to_writer(&mut writer, &self.documents)?;
        writer.flush()?;

        debug!("Saved index to {}", dir.display());
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let quantization = QuantizationConfig::load(dir)?;

        let mut reader = BufReader::new(File::open(dir.join(POSTINGS_FILENAME))?);
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != POSTINGS_MAGIC {
            return Err(Error::Corruption(format!(
                "bad postings magic {:#x}",
                magic
            )));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != POSTINGS_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported postings version {}",
                version
            )));
        }
        let num_terms = reader.read_u32::<LittleEndian>()? as usize;
        let mut postings = FxHashMap::default();
        for _ in 0..num_terms {
            let len = reader.read_u32::<LittleEndian>()? as u64;
            let mut token = Vec::new();
            reader.by_ref().take(len).read_to_end(&mut token)?;
            if token.len() as u64 != len {
                return Err(Error::Corruption("truncated token".into()));
            }
            let token = String::from_utf8(token)
                .map_err(|e| Error::Corruption(format!("invalid token: {}", e)))?;
            let list = BlockPostingList::deserialize(&mut reader)?;
            postings.insert(token, list);
        }

        let documents: Vec<DocumentEntry> =
            serde_json::from_reader(BufReader::new(File::open(dir.join(DOCUMENTS_FILENAME))?))?;
        if let Some((token, last)) = postings
            .iter()
            .filter_map(|(token, list)| list.last_doc().map(|d| (token, d)))
            .find(|&(_, d)| d as usize >= documents.len())
        {
            return Err(Error::Corruption(format!(
                "postings of '{}' reference doc {} but the index has {} documents",
                token,
                last,
                documents.len()
            )));
        }
        let id_map = documents
            .iter()
            .enumerate()
            .map(|(doc, entry)| (entry.id.clone(), doc as DocId))
            .collect();

        info!(
            "Loaded index from {}: docs={}, terms={}",
            dir.display(),
            documents.len(),
            postings.len()
        );

        Ok(Self {
            quantization,
            postings,
            documents,
            id_map,
        })
    }
}

impl PostingReader for MemoryIndex {
    type Source<'a> = BlockPostingIterator<'a>;

    fn postings(&self, token: &str) -> Option<Self::Source<'_>> {
        self.postings.get(token).map(BlockPostingList::iterator)
    }

    fn quantization(&self) -> &QuantizationConfig {
        &self.quantization
    }

    fn num_docs(&self) -> u32 {
        self.documents.len() as u32
    }
}
