//! Vector sources: where sparse vectors for documents and queries come from
//!
//! - [`LiteralSource`]: `dim:value dim:value ...` text
//! - [`ContentsSource`]: the content is a whitespace separated dense row
//! - [`ProcessSource`]: an external model process, one call per text
//! - [`TsvVectorFile`]: precomputed vectors keyed by document/query id

mod file;
mod process;

pub use file::TsvVectorFile;
pub use process::ProcessSource;

use async_trait::async_trait;
use log::warn;

use crate::config::{QuantizationConfig, VectorSourceConfig};
use crate::error::Result;
use crate::vector::{SparseVector, parse_contents, parse_literal};

/// Produces the sparse vector of a document or query
#[async_trait]
pub trait VectorSource: Send + Sync {
    /// Vector for `content`; `id` is the document or query id
    async fn vectorize(&self, id: &str, content: &str) -> Result<SparseVector>;

    /// Like [`vectorize`](Self::vectorize) but degrades to an empty vector
    ///
    /// An empty query vector matches nothing, so a failing source yields no
    /// hits instead of an error.
    async fn vectorize_or_empty(&self, id: &str, content: &str) -> SparseVector {
        match self.vectorize(id, content).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("{} source failed for '{}', using empty vector: {}", self.name(), id, e);
                SparseVector::new()
            }
        }
    }

    fn name(&self) -> &'static str;
}

/// Parses `dim:value` text; malformed input rejects the whole vector
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralSource;

#[async_trait]
impl VectorSource for LiteralSource {
    async fn vectorize(&self, _id: &str, content: &str) -> Result<SparseVector> {
        parse_literal(content)
    }

    fn name(&self) -> &'static str {
        "literal"
    }
}

/// Reads the content as a dense row, skipping unparseable cells
#[derive(Debug, Clone, Copy)]
pub struct ContentsSource {
    dimensionality: u32,
}

impl ContentsSource {
    pub fn new(dimensionality: u32) -> Self {
        Self { dimensionality }
    }
}

#[async_trait]
impl VectorSource for ContentsSource {
    async fn vectorize(&self, _id: &str, content: &str) -> Result<SparseVector> {
        Ok(parse_contents(content, self.dimensionality))
    }

    fn name(&self) -> &'static str {
        "contents"
    }
}

/// Instantiate the configured source
///
/// A file source is loaded eagerly; its rows are checked against the
/// dimensionality of `quantization`.
pub fn source_from_config(
    config: &VectorSourceConfig,
    quantization: &QuantizationConfig,
) -> Result<Box<dyn VectorSource>> {
    Ok(match config {
        VectorSourceConfig::Literal => Box::new(LiteralSource),
        VectorSourceConfig::Contents => Box::new(ContentsSource::new(quantization.dimensionality())),
        VectorSourceConfig::Process(process) => Box::new(ProcessSource::new(process.clone())),
        VectorSourceConfig::File { path } => {
            Box::new(TsvVectorFile::open(path, quantization.dimensionality())?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_literal_source() {
        let source = LiteralSource;
        let v = source.vectorize("q1", "3:0.9 50:0.89").await.unwrap();
        assert_eq!(v.len(), 2);
        assert!(matches!(
            source.vectorize("q1", "3:abc").await,
            Err(Error::MalformedVectorValue(_))
        ));
        assert!(source.vectorize_or_empty("q1", "3:abc").await.is_empty());
    }

    #[tokio::test]
    async fn test_contents_source() {
        let source = ContentsSource::new(4);
        let v = source.vectorize("d1", "0 0.5 x 0.25 0.75").await.unwrap();
        assert_eq!(v.iter().collect::<Vec<_>>(), vec![(1, 0.5), (3, 0.25)]);
    }

    #[tokio::test]
    async fn test_source_from_config() {
        let quantization = QuantizationConfig::default();
        let source = source_from_config(&VectorSourceConfig::Literal, &quantization).unwrap();
        assert_eq!(source.name(), "literal");
        let source = source_from_config(&VectorSourceConfig::Contents, &quantization).unwrap();
        assert_eq!(source.name(), "contents");

        let missing = VectorSourceConfig::File {
            path: "/nonexistent/vectors.tsv".into(),
        };
        assert!(matches!(
            source_from_config(&missing, &quantization),
            Err(Error::Io(_))
        ));
    }
}
