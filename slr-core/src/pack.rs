//! Exact, order-preserving packing of (dimension, value) pairs
//!
//! Each pair becomes a 12-byte record:
//!
//! ```text
//! [dimension: 4 bytes BE sortable i32][value: 8 bytes BE sortable f64]
//! ```
//!
//! Sortable encodings flip bits so that unsigned byte-wise comparison of a
//! field matches numeric comparison of the original value. Records are
//! concatenated in input order with no header, length or checksum.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::vector::SparseVector;

/// Bytes per packed record
pub const RECORD_SIZE: usize = 4 + 8;

const SIGN_32: u32 = 0x8000_0000;
const SIGN_64: u64 = 0x8000_0000_0000_0000;
const MAGNITUDE_64: i64 = 0x7fff_ffff_ffff_ffff;

/// i32 -> u32 whose unsigned order matches signed order
#[inline]
pub fn sortable_i32(value: i32) -> u32 {
    (value as u32) ^ SIGN_32
}

#[inline]
pub fn from_sortable_i32(sortable: u32) -> i32 {
    (sortable ^ SIGN_32) as i32
}

/// f64 -> u64 whose unsigned order matches float order (-0.0 sorts before 0.0)
#[inline]
pub fn sortable_f64(value: f64) -> u64 {
    let bits = value.to_bits() as i64;
    ((bits ^ ((bits >> 63) & MAGNITUDE_64)) as u64) ^ SIGN_64
}

#[inline]
pub fn from_sortable_f64(sortable: u64) -> f64 {
    let bits = (sortable ^ SIGN_64) as i64;
    f64::from_bits((bits ^ ((bits >> 63) & MAGNITUDE_64)) as u64)
}

/// Write one record into `dest[..RECORD_SIZE]`
#[inline]
pub fn encode_record(dimension: i32, value: f64, dest: &mut [u8]) {
    BigEndian::write_u32(&mut dest[..4], sortable_i32(dimension));
    BigEndian::write_u64(&mut dest[4..RECORD_SIZE], sortable_f64(value));
}

/// Read one record from `src[..RECORD_SIZE]`
#[inline]
pub fn decode_record(src: &[u8]) -> (i32, f64) {
    let dimension = from_sortable_i32(BigEndian::read_u32(&src[..4]));
    let value = from_sortable_f64(BigEndian::read_u64(&src[4..RECORD_SIZE]));
    (dimension, value)
}

/// Pack pairs in input order
pub fn pack(pairs: &[(i32, f64)]) -> Vec<u8> {
    let mut packed = vec![0u8; pairs.len() * RECORD_SIZE];
    for (record, &(dimension, value)) in packed.chunks_exact_mut(RECORD_SIZE).zip(pairs) {
        encode_record(dimension, value, record);
    }
    packed
}

/// Unpack a buffer produced by [`pack`]; no partial decode on bad length
pub fn unpack(bytes: &[u8]) -> Result<Vec<(i32, f64)>> {
    check_length(bytes)?;
    Ok(bytes.chunks_exact(RECORD_SIZE).map(decode_record).collect())
}

/// Pack a sparse vector in dimension order
pub fn pack_vector(vector: &SparseVector) -> Result<Vec<u8>> {
    let pairs = vector
        .iter()
        .map(|(dimension, value)| {
            i32::try_from(dimension)
                .map(|d| (d, value))
                .map_err(|_| Error::DimensionOutOfRange {
                    dimension: dimension as u64,
                    dimensionality: i32::MAX as u32,
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(pack(&pairs))
}

/// Parse `dim=value dim=value ...`
pub fn parse_pairs(text: &str) -> Result<Vec<(i32, f64)>> {
    text.split_whitespace()
        .map(|element| {
            let malformed =
                || Error::MalformedVectorValue(format!("expected dim=value, got '{}'", element));
            let (dim, value) = element.split_once('=').ok_or_else(malformed)?;
            let dim: i32 = dim.parse().map_err(|_| malformed())?;
            let value: f64 = value.parse().map_err(|_| malformed())?;
            Ok((dim, value))
        })
        .collect()
}

/// Parse and pack `dim=value dim=value ...`
pub fn pack_str(text: &str) -> Result<Vec<u8>> {
    Ok(pack(&parse_pairs(text)?))
}

/// The 4-byte sortable dimension prefix of every record, concatenated
pub fn keys(bytes: &[u8]) -> Result<Vec<u8>> {
    check_length(bytes)?;
    Ok(bytes
        .chunks_exact(RECORD_SIZE)
        .flat_map(|record| record[..4].iter().copied())
        .collect())
}

/// Human readable `dim=value,dim=value` rendering for inspection
pub fn describe(bytes: &[u8]) -> Result<String> {
    Ok(unpack(bytes)?
        .iter()
        .map(|(dim, value)| format!("{}={}", dim, value))
        .collect::<Vec<_>>()
        .join(","))
}

/// Index of the first record whose dimension is >= `dimension`
///
/// Records must be sorted by dimension. Compares raw key bytes, no decoding.
pub fn lower_bound(bytes: &[u8], dimension: i32) -> Result<usize> {
    check_length(bytes)?;
    let mut key = [0u8; 4];
    BigEndian::write_u32(&mut key, sortable_i32(dimension));
    let count = bytes.len() / RECORD_SIZE;
    let (mut lo, mut hi) = (0usize, count);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let offset = mid * RECORD_SIZE;
        if bytes[offset..offset + 4] < key[..] {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

fn check_length(bytes: &[u8]) -> Result<()> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(Error::TruncatedRecord {
            len: bytes.len(),
            record_size: RECORD_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_bit_exact() {
        let pairs = vec![
            (3, 0.9),
            (-7, -1.5e-300),
            (i32::MAX, f64::MAX),
            (i32::MIN, f64::MIN_POSITIVE),
            (0, -0.0),
            (1, f64::INFINITY),
            (2, f64::NEG_INFINITY),
            (4, 5e-324),
        ];
        let packed = pack(&pairs);
        assert_eq!(packed.len(), pairs.len() * RECORD_SIZE);

        let unpacked = unpack(&packed).unwrap();
        for ((d1, v1), (d2, v2)) in pairs.iter().zip(&unpacked) {
            assert_eq!(d1, d2);
            assert_eq!(v1.to_bits(), v2.to_bits());
        }
    }

    #[test]
    fn test_nan_payload_survives() {
        let nan = f64::from_bits(0x7ff8_0000_0000_1234);
        let unpacked = unpack(&pack(&[(1, nan)])).unwrap();
        assert_eq!(unpacked[0].1.to_bits(), nan.to_bits());
    }

    #[test]
    fn test_input_order_kept() {
        let pairs = vec![(50, 0.89), (3, 0.9), (72, 0.99)];
        assert_eq!(unpack(&pack(&pairs)).unwrap(), pairs);
    }

    #[test]
    fn test_truncated_record() {
        let mut packed = pack(&[(1, 0.5), (2, 0.25)]);
        packed.pop();
        assert!(matches!(
            unpack(&packed),
            Err(Error::TruncatedRecord {
                len: 23,
                record_size: 12
            })
        ));
        assert!(unpack(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_bytes_sort_numerically() {
        let dims = [i32::MIN, -1000, -1, 0, 1, 2, 255, 256, 70_000, i32::MAX];
        for pair in dims.windows(2) {
            let a = pack(&[(pair[0], 1.0)]);
            let b = pack(&[(pair[1], 1.0)]);
            assert!(a < b, "{} should sort before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_value_bytes_sort_numerically() {
        let values = [
            f64::NEG_INFINITY,
            -1e10,
            -1.0,
            -1e-300,
            -0.0,
            0.0,
            1e-300,
            0.89,
            0.9,
            1.0,
            1e10,
            f64::INFINITY,
        ];
        for pair in values.windows(2) {
            let a = sortable_f64(pair[0]).to_be_bytes();
            let b = sortable_f64(pair[1]).to_be_bytes();
            assert!(a < b, "{} should sort before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_pack_str_and_describe() {
        let packed = pack_str("3=0.9 50=0.89\t-2=1.5").unwrap();
        assert_eq!(describe(&packed).unwrap(), "3=0.9,50=0.89,-2=1.5");
        assert!(matches!(
            pack_str("3:0.9"),
            Err(Error::MalformedVectorValue(_))
        ));
        assert!(pack_str("3=abc").is_err());
    }

    #[test]
    fn test_keys() {
        let packed = pack(&[(1, 0.5), (2, 0.25)]);
        let keys = keys(&packed).unwrap();
        assert_eq!(keys.len(), 8);
        assert_eq!(&keys[..4], &sortable_i32(1).to_be_bytes());
        assert_eq!(&keys[4..], &sortable_i32(2).to_be_bytes());
    }

    #[test]
    fn test_lower_bound_on_raw_bytes() {
        let packed = pack(&[(-5, 0.1), (3, 0.9), (50, 0.89), (72, 0.99)]);
        assert_eq!(lower_bound(&packed, -10).unwrap(), 0);
        assert_eq!(lower_bound(&packed, 3).unwrap(), 1);
        assert_eq!(lower_bound(&packed, 4).unwrap(), 2);
        assert_eq!(lower_bound(&packed, 100).unwrap(), 4);
    }

    #[test]
    fn test_pack_vector() {
        let v = SparseVector::from_pairs([(50, 0.89), (3, 0.9)]);
        let unpacked = unpack(&pack_vector(&v).unwrap()).unwrap();
        assert_eq!(unpacked, vec![(3, 0.9), (50, 0.89)]);

        let too_large = SparseVector::from_pairs([(u32::MAX, 0.5)]);
        assert!(pack_vector(&too_large).is_err());
    }
}
