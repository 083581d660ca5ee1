//! Index operations: build, search, info

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use slr_core::{
    IndexBuilder, IndexConfig, MemoryIndex, PostingReader, QuantizationConfig, QueryBuilder,
    SearchConfig, TsvVectorFile, VectorSourceConfig, source_from_config,
};

/// Where documents come from when building an index
pub enum IndexInput {
    /// Precomputed TSV vectors (`id \t v0 \t v1 ...`)
    Vectors(PathBuf),
    /// `id \t slr content` lines, as written by `encode`
    Slr(PathBuf),
    /// `id \t content` lines vectorized by the configured source
    Documents {
        path: PathBuf,
        source: VectorSourceConfig,
    },
}

/// Read a `VectorSourceConfig` JSON file, literal when absent
pub fn load_source_config(path: Option<&Path>) -> Result<VectorSourceConfig> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read source config: {:?}", path))?;
            serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse source config: {:?}", path))
        }
        None => Ok(VectorSourceConfig::default()),
    }
}

pub async fn build_index(
    index_path: &Path,
    quantization: QuantizationConfig,
    config: IndexConfig,
    input: IndexInput,
    progress_interval: usize,
) -> Result<usize> {
    let mut builder = IndexBuilder::new(quantization, config);
    let mut failed = 0usize;

    match input {
        IndexInput::Vectors(path) => {
            let vectors = TsvVectorFile::open(&path, quantization.dimensionality())
                .with_context(|| format!("Failed to load vectors: {:?}", path))?;
            for (id, vector) in vectors.iter() {
                if let Err(e) = vector.and_then(|v| builder.add_vector(id, v, None)) {
                    warn!("Skipping document '{}': {}", id, e);
                    failed += 1;
                }
                log_progress(builder.num_docs() as usize, progress_interval);
            }
        }
        IndexInput::Slr(path) => {
            for row in read_rows(&path)? {
                let Some((id, content)) = row? else {
                    failed += 1;
                    continue;
                };
                if let Err(e) = builder.add_slr(&id, &content) {
                    warn!("Skipping document '{}': {}", id, e);
                    failed += 1;
                }
                log_progress(builder.num_docs() as usize, progress_interval);
            }
        }
        IndexInput::Documents { path, source } => {
            let source = source_from_config(&source, &quantization)
                .context("Failed to create vector source")?;
            for row in read_rows(&path)? {
                let Some((id, content)) = row? else {
                    failed += 1;
                    continue;
                };
                if let Err(e) = builder.add_document(&id, &content, source.as_ref()).await {
                    warn!("Skipping document '{}': {}", id, e);
                    failed += 1;
                }
                log_progress(builder.num_docs() as usize, progress_interval);
            }
        }
    }

    let index = builder.build()?;
    index
        .save(index_path)
        .with_context(|| format!("Failed to save index: {:?}", index_path))?;

    let num_docs = index.num_docs() as usize;
    info!(
        "Indexed {} documents ({} failed) into {:?}",
        num_docs, failed, index_path
    );
    Ok(num_docs)
}

/// `id \t content` rows; `None` for a line without a tab (logged)
fn read_rows(path: &Path) -> Result<impl Iterator<Item = Result<Option<(String, String)>>>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open documents: {:?}", path))?;
    Ok(BufReader::new(file)
        .lines()
        .enumerate()
        .filter_map(|(line_no, line)| {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() {
                return None;
            }
            match line.split_once('\t') {
                Some((id, content)) => Some(Ok(Some((id.trim().to_string(), content.to_string())))),
                None => {
                    warn!("line {}: expected 'id<TAB>content'", line_no + 1);
                    Some(Ok(None))
                }
            }
        }))
}

fn log_progress(count: usize, interval: usize) {
    if interval > 0 && count > 0 && count % interval == 0 {
        info!("Progress: {} documents", count);
    }
}

pub struct SearchArgs {
    pub index: PathBuf,
    pub queries: PathBuf,
    pub source: VectorSourceConfig,
    pub search: SearchConfig,
    pub tag: String,
    pub output: Option<PathBuf>,
    pub exhaustive: bool,
}

/// Run `qid \t query` lines and write a TREC run: `qid Q0 docid rank score tag`
pub async fn run_search(args: SearchArgs) -> Result<usize> {
    let index = MemoryIndex::load(&args.index)
        .with_context(|| format!("Failed to load index: {:?}", args.index))?;
    let quantization = *index.quantization();
    let source =
        source_from_config(&args.source, &quantization).context("Failed to create vector source")?;
    let builder = QueryBuilder::from_search_config(quantization, &args.search);

    let queries = File::open(&args.queries)
        .with_context(|| format!("Failed to open queries: {:?}", args.queries))?;
    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create run file: {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut num_queries = 0usize;
    for (line_no, line) in BufReader::new(queries).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let Some((qid, text)) = line.split_once('\t') else {
            warn!("line {}: expected 'qid<TAB>query'", line_no + 1);
            continue;
        };
        let qid = qid.trim();

        let vector = source.vectorize_or_empty(qid, text).await;
        let query = match builder.build(&vector) {
            Ok(query) => query,
            Err(e) => {
                warn!("Query '{}' skipped: {}", qid, e);
                continue;
            }
        };
        let hits = if args.exhaustive {
            query.search_exhaustive(&index, args.search.top_k)?
        } else {
            query.search(&index, args.search.top_k)?
        };

        for (rank, hit) in hits.iter().enumerate() {
            let docid = index.doc_id(hit.doc_id).unwrap_or("?");
            writeln!(
                out,
                "{} Q0 {} {} {:.6} {}",
                qid,
                docid,
                rank + 1,
                hit.score,
                args.tag
            )?;
        }
        num_queries += 1;
    }
    out.flush()?;

    info!("Ran {} queries against {:?}", num_queries, args.index);
    Ok(num_queries)
}

pub fn show_info(index_path: &Path) -> Result<()> {
    let index = MemoryIndex::load(index_path)
        .with_context(|| format!("Failed to load index: {:?}", index_path))?;
    let quantization = index.quantization();

    println!("Index: {:?}", index_path);
    println!("  Documents: {}", index.num_docs());
    println!("  Dimension tokens: {}", index.num_terms());
    println!(
        "  Quantization: precision={}, multiplier={}, dimensionality={}, token_width={}",
        quantization.precision(),
        quantization.multiplier(),
        quantization.dimensionality(),
        quantization.token_width()
    );
    let postings: u64 = index
        .terms()
        .iter()
        .filter_map(|t| index.posting_list(t))
        .map(|l| l.doc_count() as u64)
        .sum();
    println!("  Postings: {}", postings);
    Ok(())
}
