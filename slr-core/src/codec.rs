//! Quantizing codec for sparse vector entries
//!
//! Each non-zero entry becomes an [`EncodedTerm`]:
//! - **token**: the dimension index, zero-padded to the configured token width
//!   so that dictionary order equals numeric dimension order
//! - **weight**: the activation as a fixed-point integer with `precision`
//!   decimal digits, stored in the posting weight channel
//!
//! Quantization works on the decimal text of the value, not on binary floats:
//! the digits are shifted by the exponent (if any) and the first `precision`
//! fractional digits are kept, together with any integer digits. This makes
//! `0.9` encode to exactly `9 * 10^(precision-1)` and keeps
//! `decode(encode(v))` within `10^-precision` of `v`.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::Weight;
use crate::config::QuantizationConfig;
use crate::error::{Error, Result};
use crate::vector::SparseVector;

/// A dimension token with its quantized weight
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodedTerm {
    pub token: String,
    pub weight: Weight,
}

/// Encoder/decoder bound to one quantization config
#[derive(Debug, Clone, Copy)]
pub struct VectorCodec {
    config: QuantizationConfig,
}

impl VectorCodec {
    pub fn new(config: QuantizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QuantizationConfig {
        &self.config
    }

    /// Zero-padded token for a dimension
    pub fn token(&self, dimension: u32) -> Result<String> {
        self.check_dimension(dimension as u64)?;
        Ok(format!(
            "{:0width$}",
            dimension,
            width = self.config.token_width()
        ))
    }

    /// Recover the dimension index from a token
    pub fn parse_token(&self, token: &str) -> Result<u32> {
        if token.len() != self.config.token_width() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::MalformedVectorValue(format!(
                "'{}' is not a {}-digit dimension token",
                token,
                self.config.token_width()
            )));
        }
        let dimension: u64 = token
            .parse()
            .map_err(|_| Error::MalformedVectorValue(format!("invalid token '{}'", token)))?;
        self.check_dimension(dimension)?;
        Ok(dimension as u32)
    }

    /// Quantize the decimal text of an activation into a posting weight
    pub fn quantize(&self, dimension: u32, text: &str) -> Result<Weight> {
        let decimal = Decimal::parse(text)?;
        if decimal.is_zero() {
            return Err(Error::ZeroActivation(dimension));
        }
        if decimal.negative {
            return Err(Error::NegativeActivation(dimension));
        }
        match decimal.fixed_point(self.config.precision())? {
            0 => Err(Error::ZeroActivation(dimension)),
            weight => Ok(weight),
        }
    }

    /// Encode one entry given the decimal text of its value
    pub fn encode(&self, dimension: u32, text: &str) -> Result<EncodedTerm> {
        let token = self.token(dimension)?;
        let weight = self.quantize(dimension, text)?;
        Ok(EncodedTerm { token, weight })
    }

    /// Encode one entry given a float
    ///
    /// The value is rendered with the shortest decimal text that reads back as
    /// the same float, then quantized like [`encode`](Self::encode).
    pub fn encode_value(&self, dimension: u32, value: f64) -> Result<EncodedTerm> {
        if !value.is_finite() {
            return Err(Error::MalformedVectorValue(format!(
                "non-finite activation {} at dimension {}",
                value, dimension
            )));
        }
        self.encode(dimension, &value.to_string())
    }

    /// Encode every entry of a vector in dimension order
    ///
    /// Entries below the quantization resolution are skipped: a zero weight
    /// would be indistinguishable from an absent dimension.
    pub fn encode_vector(&self, vector: &SparseVector) -> Result<Vec<EncodedTerm>> {
        let mut terms = Vec::with_capacity(vector.len());
        for (dimension, value) in vector.iter() {
            match self.encode_value(dimension, value) {
                Ok(term) => terms.push(term),
                Err(Error::ZeroActivation(_)) => {
                    debug!(
                        "dimension {} value {} below resolution 1e-{}, skipped",
                        dimension,
                        value,
                        self.config.precision()
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(terms)
    }

    /// Weight back to its fixed-point value
    #[inline]
    pub fn dequantize(&self, weight: Weight) -> f64 {
        weight as f64 / self.config.multiplier() as f64
    }

    /// Inverse of encode (lossy beyond `precision` digits)
    pub fn decode(&self, term: &EncodedTerm) -> Result<(u32, f64)> {
        Ok((self.parse_token(&term.token)?, self.dequantize(term.weight)))
    }

    /// Decode a list of terms back into a vector
    pub fn decode_vector(&self, terms: &[EncodedTerm]) -> Result<SparseVector> {
        let mut vector = SparseVector::new();
        for term in terms {
            let (dimension, value) = self.decode(term)?;
            vector.insert(dimension, value);
        }
        Ok(vector)
    }

    fn check_dimension(&self, dimension: u64) -> Result<()> {
        if dimension >= self.config.dimensionality() as u64 {
            return Err(Error::DimensionOutOfRange {
                dimension,
                dimensionality: self.config.dimensionality(),
            });
        }
        Ok(())
    }
}

/// Decimal digits of `u32::MAX`
const MAX_WEIGHT_DIGITS: i64 = 10;

/// Decimal text split into sign, digit string and decimal point position
///
/// `digits` holds integer and fraction digits concatenated with leading zeros
/// removed, so it is empty for zero and starts with a non-zero digit
/// otherwise. The value is `0.d1d2d3... * 10^point`: the decimal point sits
/// after `point` digits (negative `point` means leading zeros after the point).
#[derive(Debug)]
struct Decimal {
    negative: bool,
    digits: Vec<u8>,
    point: i64,
}

impl Decimal {
    /// Parse `[+-]ddd[.ddd][(e|E)[+-]dd]`
    fn parse(text: &str) -> Result<Self> {
        let malformed = || Error::MalformedVectorValue(format!("invalid activation '{}'", text));
        let s = text.trim();

        let (negative, s) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let (mantissa, exponent) = match s.find(['e', 'E']) {
            Some(pos) => {
                let exp_text = &s[pos + 1..];
                let exponent: i64 = exp_text.parse().map_err(|_| malformed())?;
                (&s[..pos], exponent)
            }
            None => (s, 0),
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (mantissa, ""),
        };
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(malformed());
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(malformed());
        }

        let mut digits: Vec<u8> = int_part
            .bytes()
            .chain(frac_part.bytes())
            .map(|b| b - b'0')
            .collect();
        let leading_zeros = digits.iter().take_while(|&&d| d == 0).count();
        digits.drain(..leading_zeros);
        let point = (int_part.len() as i64)
            .checked_add(exponent)
            .and_then(|p| p.checked_sub(leading_zeros as i64))
            .ok_or_else(malformed)?;

        Ok(Self {
            negative,
            digits,
            point,
        })
    }

    fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    /// Truncate to `precision` fractional digits and read as an integer
    ///
    /// Takes the digits left of position `point + precision`; digits beyond
    /// the available ones are '0' (right padding), positions before the first
    /// digit are leading zeros (the exponent shift).
    fn fixed_point(&self, precision: u32) -> Result<Weight> {
        let end = self.point.saturating_add(precision as i64);
        if self.is_zero() || end <= 0 {
            return Ok(0);
        }
        // The first digit is non-zero, so `end` digits mean at least 10^(end-1)
        if end > MAX_WEIGHT_DIGITS {
            return Err(Error::WeightOverflow(format!(
                "activation needs {} digits at precision {}, a u32 weight holds {}",
                end, precision, MAX_WEIGHT_DIGITS
            )));
        }
        let mut weight: u64 = 0;
        for i in 0..end.max(0) {
            let digit = self.digits.get(i as usize).copied().unwrap_or(0);
            weight = weight
                .checked_mul(10)
                .and_then(|w| w.checked_add(digit as u64))
                .filter(|&w| w <= Weight::MAX as u64)
                .ok_or_else(|| {
                    Error::WeightOverflow(format!(
                        "activation with {} integer digits does not fit a u32 weight at precision {}",
                        self.point, precision
                    ))
                })?;
        }
        Ok(weight as Weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(precision: u32) -> VectorCodec {
        VectorCodec::new(QuantizationConfig::new(precision, 10_000).unwrap())
    }

    #[test]
    fn test_encode_plain_fraction() {
        let term = codec(7).encode(3, "0.9").unwrap();
        assert_eq!(term.token, "0003");
        assert_eq!(term.weight, 9_000_000);
        let (dim, value) = codec(7).decode(&term).unwrap();
        assert_eq!(dim, 3);
        assert!((value - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_encode_truncates_long_fraction() {
        assert_eq!(codec(7).quantize(1, "0.123456789").unwrap(), 1_234_567);
        assert_eq!(codec(3).quantize(1, "0.9999").unwrap(), 999);
    }

    #[test]
    fn test_encode_negative_exponent_shift() {
        // 9.5e-05 = 0.000095 -> e-1 = 4 zeros before the mantissa digits
        assert_eq!(codec(7).quantize(1, "9.5e-05").unwrap(), 950);
        assert_eq!(codec(9).quantize(1, "1.234E-3").unwrap(), 1_234_000);
        assert_eq!(codec(7).quantize(1, "9.0e-1").unwrap(), 9_000_000);
        // multi-digit mantissa integer part shifts the same way
        assert_eq!(codec(7).quantize(1, "12.5e-2").unwrap(), 1_250_000);
    }

    #[test]
    fn test_encode_positive_exponent_and_integer_part() {
        assert_eq!(codec(7).quantize(1, "1.5").unwrap(), 15_000_000);
        assert_eq!(codec(7).quantize(1, "1.2E+1").unwrap(), 120_000_000);
        assert_eq!(codec(7).quantize(1, "0.05e1").unwrap(), 5_000_000);
    }

    #[test]
    fn test_encode_short_forms() {
        assert_eq!(codec(4).quantize(1, ".5").unwrap(), 5000);
        assert_eq!(codec(4).quantize(1, "2.").unwrap(), 20000);
        assert_eq!(codec(4).quantize(1, "+0.25").unwrap(), 2500);
    }

    #[test]
    fn test_encode_below_resolution_is_zero() {
        assert!(matches!(
            codec(7).quantize(5, "1e-8"),
            Err(Error::ZeroActivation(5))
        ));
        assert!(matches!(
            codec(7).quantize(5, "0.0"),
            Err(Error::ZeroActivation(5))
        ));
        assert!(matches!(
            codec(7).quantize(5, "-0.0"),
            Err(Error::ZeroActivation(5))
        ));
    }

    #[test]
    fn test_encode_rejects_negative() {
        assert!(matches!(
            codec(7).quantize(5, "-0.5"),
            Err(Error::NegativeActivation(5))
        ));
        // sign wins over magnitude
        assert!(matches!(
            codec(9).quantize(5, "-5.0"),
            Err(Error::NegativeActivation(5))
        ));
        assert!(matches!(
            codec(7).quantize(5, "-1e300"),
            Err(Error::NegativeActivation(5))
        ));
        assert!(matches!(
            codec(7).quantize(5, "-0e300"),
            Err(Error::ZeroActivation(5))
        ));
    }

    #[test]
    fn test_extreme_exponents_are_bounded() {
        for text in ["0e1000000000000", "0.000e+99999999999", "000.0E-99999999999"] {
            assert!(
                matches!(codec(9).quantize(1, text), Err(Error::ZeroActivation(1))),
                "{}",
                text
            );
        }
        assert!(matches!(
            codec(7).quantize(1, "1e999999999999"),
            Err(Error::WeightOverflow(_))
        ));
        assert!(matches!(
            codec(7).quantize(1, "5e-999999999999"),
            Err(Error::ZeroActivation(1))
        ));
        // leading zeros do not count against the weight width
        assert_eq!(
            codec(7).quantize(1, "0000000000000.5").unwrap(),
            5_000_000
        );
    }

    #[test]
    fn test_weight_width_limit() {
        // 4294967295 is u32::MAX, one more overflows
        assert_eq!(codec(1).quantize(1, "429496729.5").unwrap(), u32::MAX);
        assert!(matches!(
            codec(1).quantize(1, "429496729.6"),
            Err(Error::WeightOverflow(_))
        ));
        assert!(matches!(
            codec(1).quantize(1, "1000000000"),
            Err(Error::WeightOverflow(_))
        ));
    }

    #[test]
    fn test_encode_malformed() {
        for text in ["", "-", ".", "abc", "0.5x", "1e", "1e+", "0..5", "1.0e-0.5", "e5"] {
            assert!(
                matches!(codec(7).quantize(1, text), Err(Error::MalformedVectorValue(_))),
                "expected malformed for '{}'",
                text
            );
        }
    }

    #[test]
    fn test_weight_overflow() {
        assert!(matches!(
            codec(9).quantize(1, "5.0"),
            Err(Error::WeightOverflow(_))
        ));
        assert!(matches!(
            codec(7).quantize(1, "1e300"),
            Err(Error::WeightOverflow(_))
        ));
        assert_eq!(codec(9).quantize(1, "4.294967295").unwrap(), u32::MAX);
    }

    #[test]
    fn test_token_padding_and_range() {
        let c = codec(7);
        assert_eq!(c.token(0).unwrap(), "0000");
        assert_eq!(c.token(9999).unwrap(), "9999");
        assert!(matches!(
            c.token(10_000),
            Err(Error::DimensionOutOfRange {
                dimension: 10_000,
                ..
            })
        ));
        assert_eq!(c.parse_token("0042").unwrap(), 42);
        assert!(c.parse_token("42").is_err());
        assert!(c.parse_token("00a2").is_err());
    }

    #[test]
    fn test_token_order_matches_dimension_order() {
        let c = codec(7);
        let mut tokens: Vec<String> = [700u32, 5, 9999, 42, 0]
            .iter()
            .map(|&d| c.token(d).unwrap())
            .collect();
        tokens.sort();
        let dims: Vec<u32> = tokens.iter().map(|t| c.parse_token(t).unwrap()).collect();
        assert_eq!(dims, vec![0, 5, 42, 700, 9999]);
    }

    #[test]
    fn test_encode_value_uses_decimal_text() {
        let c = codec(7);
        assert_eq!(c.encode_value(3, 0.9).unwrap().weight, 9_000_000);
        assert_eq!(c.encode_value(3, 0.89).unwrap().weight, 8_900_000);
        assert_eq!(c.encode_value(3, 1e-5).unwrap().weight, 100);
        assert!(c.encode_value(3, f64::NAN).is_err());
    }

    #[test]
    fn test_roundtrip_within_resolution() {
        for precision in 1..=9 {
            let c = codec(precision);
            let resolution = 10f64.powi(-(precision as i32));
            for (i, value) in [0.9, 0.123456789, 0.5, 0.000_123, 0.987_654_321, 0.1]
                .iter()
                .enumerate()
            {
                match c.encode_value(i as u32, *value) {
                    Ok(term) => {
                        let (dim, decoded) = c.decode(&term).unwrap();
                        assert_eq!(dim, i as u32);
                        assert!(
                            (decoded - value).abs() < resolution,
                            "precision {} value {} decoded {}",
                            precision,
                            value,
                            decoded
                        );
                    }
                    Err(Error::ZeroActivation(_)) => assert!(*value < resolution),
                    Err(e) => panic!("unexpected error {:?}", e),
                }
            }
        }
    }

    #[test]
    fn test_encode_vector_skips_unrepresentable() {
        let c = codec(3);
        let v = SparseVector::from_pairs([(1, 0.5), (2, 0.0001), (3, 0.25)]);
        let terms = c.encode_vector(&v).unwrap();
        assert_eq!(
            terms,
            vec![
                EncodedTerm {
                    token: "0001".into(),
                    weight: 500
                },
                EncodedTerm {
                    token: "0003".into(),
                    weight: 250
                },
            ]
        );
        let decoded = c.decode_vector(&terms).unwrap();
        assert_eq!(decoded.get(1), 0.5);
        assert_eq!(decoded.get(2), 0.0);
    }

    #[test]
    fn test_encode_vector_propagates_range_errors() {
        let c = codec(3);
        let v = SparseVector::from_pairs([(1, 0.5), (20_000, 0.5)]);
        assert!(matches!(
            c.encode_vector(&v),
            Err(Error::DimensionOutOfRange { .. })
        ));
    }
}
