//! Text forms of sparse vectors

use log::debug;

use super::SparseVector;
use crate::error::{Error, Result};

/// Parse `dim:value dim:value ...`
///
/// Any malformed pair rejects the whole vector. Zero values are dropped and a
/// repeated dimension keeps its last value.
pub fn parse_literal(text: &str) -> Result<SparseVector> {
    let mut vector = SparseVector::new();
    for pair in text.split_whitespace() {
        let (dim, value) = pair.split_once(':').ok_or_else(|| {
            Error::MalformedVectorValue(format!("expected dim:value, got '{}'", pair))
        })?;
        vector.insert(parse_dimension(dim)?, parse_value(value)?);
    }
    Ok(vector)
}

/// Parse the single stdout line of an external vector process
///
/// Accepts `(dim, value, dim, value, ...)` or `[dim value ...]`: bracket,
/// parenthesis and comma punctuation is treated as whitespace and the rest
/// alternates dimension / value.
pub fn parse_process_output(line: &str) -> Result<SparseVector> {
    let cleaned: String = line
        .chars()
        .map(|c| match c {
            '[' | ']' | '(' | ')' | ',' => ' ',
            c => c,
        })
        .collect();
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.len() % 2 != 0 {
        return Err(Error::MalformedVectorValue(format!(
            "odd number of tokens ({}) in process output",
            tokens.len()
        )));
    }

    let mut vector = SparseVector::new();
    for pair in tokens.chunks_exact(2) {
        vector.insert(parse_dimension(pair[0])?, parse_value(pair[1])?);
    }
    Ok(vector)
}

/// Parse a dense row (one value per dimension, dimension = position)
///
/// Every cell must be numeric. Rows longer than `dimensionality` are rejected.
pub fn parse_dense_row<'a>(
    cells: impl IntoIterator<Item = &'a str>,
    dimensionality: u32,
) -> Result<SparseVector> {
    let mut vector = SparseVector::new();
    let mut count = 0usize;
    for cell in cells {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        if count >= dimensionality as usize {
            return Err(Error::DimensionMismatch {
                expected: dimensionality as usize,
                got: count + 1,
            });
        }
        vector.insert(count as u32, parse_value(cell)?);
        count += 1;
    }
    Ok(vector)
}

/// Lenient dense parse of document contents
///
/// Cells that are not numbers are skipped but still occupy their position.
/// Positions past `dimensionality` are ignored.
pub fn parse_contents(text: &str, dimensionality: u32) -> SparseVector {
    let mut vector = SparseVector::new();
    for (position, cell) in text.split_whitespace().enumerate() {
        if position >= dimensionality as usize {
            debug!(
                "contents longer than dimensionality {}, ignoring the rest",
                dimensionality
            );
            break;
        }
        match parse_value(cell) {
            Ok(value) => {
                vector.insert(position as u32, value);
            }
            Err(_) => debug!("skipping non-numeric cell '{}' at {}", cell, position),
        }
    }
    vector
}

fn parse_dimension(text: &str) -> Result<u32> {
    text.trim().parse::<u32>().map_err(|_| {
        Error::MalformedVectorValue(format!("invalid dimension '{}'", text))
    })
}

fn parse_value(text: &str) -> Result<f64> {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(Error::MalformedVectorValue(format!(
            "invalid activation '{}'",
            text
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal() {
        let v = parse_literal("3:0.9 50:0.89 72:0.99").unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v.get(50), 0.89);
    }

    #[test]
    fn test_parse_literal_extra_whitespace_and_zero() {
        let v = parse_literal("  3:0.9\t\t7:0   50:0.89\n").unwrap();
        assert_eq!(v.iter().collect::<Vec<_>>(), vec![(3, 0.9), (50, 0.89)]);
    }

    #[test]
    fn test_parse_literal_malformed_value() {
        assert!(matches!(
            parse_literal("3:abc"),
            Err(Error::MalformedVectorValue(_))
        ));
        // No partial vector on a later failure
        assert!(parse_literal("3:0.9 50:").is_err());
        assert!(parse_literal("3:0.9 x:0.5").is_err());
        assert!(parse_literal("3-0.9").is_err());
        assert!(parse_literal("3:NaN").is_err());
    }

    #[test]
    fn test_parse_literal_empty() {
        assert!(parse_literal("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_process_output_tuple_form() {
        let v = parse_process_output("[(3, 0.9), (50, 0.89)]").unwrap();
        assert_eq!(v.iter().collect::<Vec<_>>(), vec![(3, 0.9), (50, 0.89)]);
    }

    #[test]
    fn test_parse_process_output_bracket_form() {
        let v = parse_process_output("[3 0.9 50 0.89]").unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v.get(3), 0.9);
    }

    #[test]
    fn test_parse_process_output_odd_tokens() {
        assert!(matches!(
            parse_process_output("(3, 0.9, 50)"),
            Err(Error::MalformedVectorValue(_))
        ));
    }

    #[test]
    fn test_parse_dense_row() {
        let v = parse_dense_row(["0", "0.5", "0.0", "1e-3"], 4).unwrap();
        assert_eq!(v.iter().collect::<Vec<_>>(), vec![(1, 0.5), (3, 0.001)]);

        assert!(matches!(
            parse_dense_row(["0.1", "0.2", "0.3"], 2),
            Err(Error::DimensionMismatch {
                expected: 2,
                got: 3
            })
        ));
        assert!(parse_dense_row(["0.1", "oops"], 2).is_err());
    }

    #[test]
    fn test_parse_contents_lenient() {
        let v = parse_contents("0.0 0.4 word 0.2", 10);
        assert_eq!(v.iter().collect::<Vec<_>>(), vec![(1, 0.4), (3, 0.2)]);

        let truncated = parse_contents("0.1 0.2 0.3", 2);
        assert_eq!(truncated.len(), 2);
    }
}
