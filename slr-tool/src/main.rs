//! SLR Tool - CLI for sparse latent representation encoding and search
//!
//! # Vector Commands
//!
//! - `encode` - Quantize `id<TAB>dim:value ...` lines into tokens, weights and SLR content
//! - `pack` - Pack `dim=value ...` pairs into exact 12-byte records (hex)
//! - `unpack` - Decode hex records back into `dim=value` pairs
//!
//! # Index Commands
//!
//! - `index` - Build an index from vectors, SLR content or documents and save it
//! - `search` - Run queries against a saved index and write a TREC run
//! - `info` - Display index information
//!
//! # Examples
//!
//! ## Index precomputed vectors
//! ```bash
//! slr-tool index -i ./slr_index --vectors vectors.tsv -p 7 -D 30522
//! ```
//!
//! ## Index SLR content produced by `encode`
//! ```bash
//! slr-tool encode -i vectors.txt -p 7 -D 30522 | jq -r '[.id, .content] | @tsv' > slr.tsv
//! slr-tool index -i ./slr_index --slr slr.tsv -p 7 -D 30522
//! ```
//!
//! ## Search with a model process producing query vectors
//! ```bash
//! slr-tool search -i ./slr_index -q queries.tsv --source model.json -k 1000 > run.txt
//! ```

mod index_ops;
mod vector_ops;

use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use slr_core::config::{DEFAULT_DIMENSIONALITY, DEFAULT_PRECISION};
use slr_core::{IndexConfig, QuantizationConfig, SearchConfig, postings::BLOCK_SIZE};

use index_ops::{IndexInput, SearchArgs, build_index, load_source_config, run_search, show_info};
use vector_ops::{encode_vectors, pack_to_hex, unpack_hex};

#[derive(Parser)]
#[command(name = "slr-tool")]
#[command(version, about = "CLI for sparse latent representation encoding and search")]
#[command(after_help = "Use 'slr-tool <command> --help' for more information.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // === Vector Commands ===
    /// Encode `id<TAB>dim:value ...` lines into JSONL (tokens, weights, content)
    Encode {
        /// Input file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Decimal digits kept per activation
        #[arg(short, long, default_value_t = DEFAULT_PRECISION)]
        precision: u32,

        /// Number of dimensions
        #[arg(short = 'D', long, default_value_t = DEFAULT_DIMENSIONALITY)]
        dimensionality: u32,
    },

    /// Pack `dim=value ...` pairs into exact records, printed as hex
    Pack {
        /// Pairs, e.g. "3=0.9 50=0.89"
        pairs: String,
    },

    /// Unpack hex records into `dim=value` pairs
    Unpack {
        /// Hex string produced by `pack`
        hex: String,
    },

    // === Index Commands ===
    /// Build an index and save it to a directory
    Index {
        /// Path to the index directory
        #[arg(short, long)]
        index: PathBuf,

        /// Precomputed vectors (`id<TAB>v0<TAB>v1 ...`)
        #[arg(long)]
        vectors: Option<PathBuf>,

        /// SLR content rows (`id<TAB>00030.9000000 ...`), e.g. from `encode`
        #[arg(long)]
        slr: Option<PathBuf>,

        /// Documents (`id<TAB>content`) vectorized by --source
        #[arg(short, long)]
        documents: Option<PathBuf>,

        /// Vector source config JSON (default: literal `dim:value` content)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Decimal digits kept per activation
        #[arg(short, long, default_value_t = DEFAULT_PRECISION)]
        precision: u32,

        /// Number of dimensions
        #[arg(short = 'D', long, default_value_t = DEFAULT_DIMENSIONALITY)]
        dimensionality: u32,

        /// Postings per block
        #[arg(short, long, default_value_t = BLOCK_SIZE)]
        block_size: usize,

        /// Store the vector string of each document
        #[arg(long, default_value = "false")]
        store_slr: bool,

        /// Store the raw content of each document
        #[arg(long, default_value = "false")]
        store_raw: bool,

        /// Keep an exact packed copy of each vector
        #[arg(long, default_value = "false")]
        store_exact: bool,

        /// Log progress every N documents (0 to disable)
        #[arg(long, default_value = "100000")]
        progress: usize,
    },

    /// Run `qid<TAB>query` lines and write a TREC run
    Search {
        /// Path to the index directory
        #[arg(short, long)]
        index: PathBuf,

        /// Queries file
        #[arg(short, long)]
        queries: PathBuf,

        /// Vector source config JSON (default: literal `dim:value` queries)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Hits per query
        #[arg(short, long, default_value = "1000")]
        k: usize,

        /// Pruning factor: 1.0 exact, lower is faster and approximate
        #[arg(long, default_value = "1.0")]
        heap_factor: f32,

        /// Keep only the N query dimensions with the largest weights
        #[arg(long)]
        max_query_dims: Option<usize>,

        /// Drop query dimensions with |weight| below this
        #[arg(long, default_value = "0.0")]
        weight_threshold: f32,

        /// Run tag written in the last column
        #[arg(short, long, default_value = "slr")]
        tag: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable pruning (reference scan)
        #[arg(long, default_value = "false")]
        exhaustive: bool,
    },

    /// Show index info
    Info {
        /// Path to the index directory
        #[arg(short, long)]
        index: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("slr_tool=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            precision,
            dimensionality,
        } => {
            let quantization = QuantizationConfig::new(precision, dimensionality)?;
            let stdout = io::stdout().lock();
            match input {
                Some(path) => {
                    let file = std::fs::File::open(&path)
                        .with_context(|| format!("Failed to open input: {:?}", path))?;
                    encode_vectors(BufReader::new(file), stdout, quantization)?;
                }
                None => {
                    encode_vectors(io::stdin().lock(), stdout, quantization)?;
                }
            }
        }
        Commands::Pack { pairs } => {
            println!("{}", pack_to_hex(&pairs)?);
        }
        Commands::Unpack { hex } => {
            println!("{}", unpack_hex(&hex)?);
        }
        Commands::Index {
            index,
            vectors,
            slr,
            documents,
            source,
            precision,
            dimensionality,
            block_size,
            store_slr,
            store_raw,
            store_exact,
            progress,
        } => {
            let quantization = QuantizationConfig::new(precision, dimensionality)?;
            let config = IndexConfig {
                block_size,
                store_slr,
                store_raw,
                store_exact,
            };
            let input = match (vectors, slr, documents) {
                (Some(path), None, None) => IndexInput::Vectors(path),
                (None, Some(path), None) => IndexInput::Slr(path),
                (None, None, Some(path)) => IndexInput::Documents {
                    path,
                    source: load_source_config(source.as_deref())?,
                },
                _ => anyhow::bail!("exactly one of --vectors, --slr or --documents is required"),
            };
            info!(
                "Building index: precision={}, dimensionality={}, block_size={}",
                precision, dimensionality, block_size
            );
            build_index(&index, quantization, config, input, progress).await?;
        }
        Commands::Search {
            index,
            queries,
            source,
            k,
            heap_factor,
            max_query_dims,
            weight_threshold,
            tag,
            output,
            exhaustive,
        } => {
            let search = SearchConfig {
                top_k: k,
                heap_factor,
                max_query_dims,
                weight_threshold,
            };
            run_search(SearchArgs {
                index,
                queries,
                source: load_source_config(source.as_deref())?,
                search,
                tag,
                output,
                exhaustive,
            })
            .await?;
        }
        Commands::Info { index } => {
            show_info(&index)?;
        }
    }

    Ok(())
}
