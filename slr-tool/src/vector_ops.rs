//! Vector operations: encode, pack, unpack

use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use slr_core::{EncodedTerm, QuantizationConfig, VectorCodec, pack, render_content, vector};

#[derive(Serialize)]
struct EncodedLine<'a> {
    id: &'a str,
    terms: Vec<EncodedTerm>,
    content: String,
}

/// Encode `id \t dim:value ...` lines into JSONL
///
/// Each output object carries the encoded terms and the SLR content text.
/// Lines that fail to parse or encode are logged and counted, not fatal.
pub fn encode_vectors<R: BufRead, W: Write>(
    reader: R,
    mut writer: W,
    quantization: QuantizationConfig,
) -> Result<(usize, usize)> {
    let codec = VectorCodec::new(quantization);
    let mut encoded = 0usize;
    let mut failed = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input line")?;
        if line.trim().is_empty() {
            continue;
        }
        let Some((id, text)) = line.split_once('\t') else {
            warn!("line {}: expected 'id<TAB>dim:value ...'", line_no + 1);
            failed += 1;
            continue;
        };

        let result = vector::parse_literal(text).and_then(|v| {
            let terms = codec.encode_vector(&v)?;
            let content = render_content(&codec, &v)?;
            Ok((terms, content))
        });
        match result {
            Ok((terms, content)) => {
                serde_json::to_writer(
                    &mut writer,
                    &EncodedLine {
                        id: id.trim(),
                        terms,
                        content,
                    },
                )?;
                writeln!(writer)?;
                encoded += 1;
            }
            Err(e) => {
                warn!("line {} ({}): {}", line_no + 1, id, e);
                failed += 1;
            }
        }
    }
    writer.flush()?;

    info!("Encoded {} vectors, {} failed", encoded, failed);
    Ok((encoded, failed))
}

/// Pack `dim=value ...` into hex
pub fn pack_to_hex(text: &str) -> Result<String> {
    let packed = pack::pack_str(text)?;
    Ok(packed.iter().map(|b| format!("{:02x}", b)).collect())
}

/// Unpack hex records into `dim=value,dim=value`
pub fn unpack_hex(hex: &str) -> Result<String> {
    let bytes = decode_hex(hex.trim())?;
    Ok(pack::describe(&bytes)?)
}

fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        bail!("Invalid hex string of length {}", hex.len());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .with_context(|| format!("Invalid hex byte '{}'", &hex[i..i + 2]))
        })
        .collect()
}
