//! End-to-end tests for sparse dot-product scoring and top-k retrieval
//!
//! Tests cover:
//! - Score correctness (aggregate score equals the sparse dot product)
//! - Pruning soundness (Block-Max WAND top-k equals the exhaustive scan)
//! - Retrievability (every matching doc found when k is large)
//! - Edge cases (missing dimensions, single dimension, config mismatch)

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::config::{IndexConfig, QuantizationConfig, SearchConfig};
    use crate::error::Error;
    use crate::index::{IndexBuilder, MemoryIndex};
    use crate::postings::PostingReader;
    use crate::query::{QueryBuilder, ScoredDoc};
    use crate::vector::SparseVector;

    fn quantization() -> QuantizationConfig {
        QuantizationConfig::new(7, 10_000).unwrap()
    }

    fn build_index(docs: &[(&str, SparseVector)], block_size: usize) -> MemoryIndex {
        let config = IndexConfig {
            block_size,
            ..Default::default()
        };
        let mut builder = IndexBuilder::new(quantization(), config);
        for (id, vector) in docs {
            builder.add_vector(id, vector, None).unwrap();
        }
        builder.build().unwrap()
    }

    /// Random corpus with a skewed weight distribution so blocks differ
    fn random_corpus(rng: &mut StdRng, num_docs: usize, num_dims: u32) -> Vec<SparseVector> {
        (0..num_docs)
            .map(|_| {
                let mut vector = SparseVector::new();
                for dim in 0..num_dims {
                    if rng.random_bool(0.3) {
                        let value: f64 = rng.random::<f64>().powi(3);
                        vector.insert(dim, value.max(1e-6));
                    }
                }
                vector
            })
            .collect()
    }

    fn random_query(rng: &mut StdRng, num_dims: u32) -> SparseVector {
        let num_terms = rng.random_range(1..=6);
        let mut query = SparseVector::new();
        for _ in 0..num_terms {
            let dim = rng.random_range(0..num_dims + 2);
            query.insert(dim, rng.random_range(0.05..2.0));
        }
        query
    }

    #[test]
    fn test_concrete_scenario() {
        let index = build_index(
            &[
                ("a", SparseVector::from_pairs([(3, 0.9), (50, 0.89)])),
                ("b", SparseVector::from_pairs([(3, 0.9)])),
            ],
            128,
        );
        let query = QueryBuilder::new(quantization())
            .build_literal("3:0.9 50:0.89")
            .unwrap();
        let results = query.search(&index, 10).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(index.doc_id(results[0].doc_id), Some("a"));
        // 0.9 * 0.9 + 0.89 * 0.89
        assert!((results[0].score - 1.6021).abs() < 1e-5);
        // no posting at dimension 50: only 0.9 * 0.9
        assert_eq!(index.doc_id(results[1].doc_id), Some("b"));
        assert!((results[1].score - 0.81).abs() < 1e-6);
    }

    #[test]
    fn test_score_matches_dot_product() {
        let mut rng = StdRng::seed_from_u64(7);
        let corpus = random_corpus(&mut rng, 200, 30);
        let ids: Vec<String> = (0..corpus.len()).map(|i| format!("doc{}", i)).collect();
        let docs: Vec<(&str, SparseVector)> = ids
            .iter()
            .map(String::as_str)
            .zip(corpus.iter().cloned())
            .collect();
        let index = build_index(&docs, 16);

        for _ in 0..20 {
            let query_vector = random_query(&mut rng, 30);
            let query = QueryBuilder::new(quantization()).build(&query_vector).unwrap();
            let results = query.search(&index, 1000).unwrap();
            for hit in &results {
                let expected = query_vector.dot(&corpus[hit.doc_id as usize]);
                // truncation to 7 digits per dimension plus f32 accumulation
                assert!(
                    (hit.score as f64 - expected).abs() < 1e-4,
                    "doc {} score {} expected {}",
                    hit.doc_id,
                    hit.score,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_all_matching_docs_retrieved() {
        let mut rng = StdRng::seed_from_u64(11);
        let corpus = random_corpus(&mut rng, 300, 20);
        let ids: Vec<String> = (0..corpus.len()).map(|i| i.to_string()).collect();
        let docs: Vec<(&str, SparseVector)> = ids
            .iter()
            .map(String::as_str)
            .zip(corpus.iter().cloned())
            .collect();
        let index = build_index(&docs, 8);

        let query_vector = SparseVector::from_pairs([(2, 0.5), (7, 1.0)]);
        let query = QueryBuilder::new(quantization()).build(&query_vector).unwrap();
        let results = query.search(&index, usize::MAX).unwrap();
        let expected = corpus
            .iter()
            .filter(|v| v.contains(2) || v.contains(7))
            .count();
        assert_eq!(results.len(), expected);
    }

    #[test]
    fn test_pruning_matches_exhaustive() {
        let mut rng = StdRng::seed_from_u64(42);
        for (round, &block_size) in [4usize, 8, 16, 128].iter().enumerate() {
            let num_dims = 12 + round as u32 * 4;
            let corpus = random_corpus(&mut rng, 400 + round * 150, num_dims);
            let ids: Vec<String> = (0..corpus.len()).map(|i| format!("d{}", i)).collect();
            let docs: Vec<(&str, SparseVector)> = ids
                .iter()
                .map(String::as_str)
                .zip(corpus.into_iter())
                .collect();
            let index = build_index(&docs, block_size);

            for _ in 0..25 {
                let query = QueryBuilder::new(quantization())
                    .build(&random_query(&mut rng, num_dims))
                    .unwrap();
                for k in [1usize, 2, 3, 5, 10, 37, 100, 10_000] {
                    let pruned = query.search(&index, k).unwrap();
                    let exact = query.search_exhaustive(&index, k).unwrap();
                    assert_eq!(
                        pruned, exact,
                        "block_size={} k={} query={}",
                        block_size, k, query
                    );
                }
            }
        }
    }

    #[test]
    fn test_pruning_with_tied_scores() {
        // Many identical documents: ties must resolve to the lowest doc ids
        let docs: Vec<(String, SparseVector)> = (0..100)
            .map(|i| {
                let value = if i % 10 == 0 { 0.9 } else { 0.5 };
                (format!("t{}", i), SparseVector::from_pairs([(1, value), (2, 0.25)]))
            })
            .collect();
        let docs: Vec<(&str, SparseVector)> =
            docs.iter().map(|(id, v)| (id.as_str(), v.clone())).collect();
        let index = build_index(&docs, 4);

        let query = QueryBuilder::new(quantization())
            .build_literal("1:1.0 2:1.0")
            .unwrap();
        for k in [1, 5, 10, 15, 50] {
            let pruned = query.search(&index, k).unwrap();
            assert_eq!(pruned, query.search_exhaustive(&index, k).unwrap());
        }
        let top: Vec<u32> = query
            .search(&index, 12)
            .unwrap()
            .iter()
            .map(|r| r.doc_id)
            .collect();
        assert_eq!(top, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 1, 2]);
    }

    #[test]
    fn test_single_dimension_query() {
        let mut rng = StdRng::seed_from_u64(3);
        let corpus = random_corpus(&mut rng, 500, 4);
        let ids: Vec<String> = (0..corpus.len()).map(|i| i.to_string()).collect();
        let docs: Vec<(&str, SparseVector)> = ids
            .iter()
            .map(String::as_str)
            .zip(corpus.iter().cloned())
            .collect();
        let index = build_index(&docs, 8);

        let query = QueryBuilder::new(quantization())
            .build_literal("1:0.7")
            .unwrap();
        for k in [1, 3, 10, 40] {
            let pruned = query.search(&index, k).unwrap();
            let exact = query.search_exhaustive(&index, k).unwrap();
            assert_eq!(pruned, exact, "k={}", k);
            assert!(pruned.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[test]
    fn test_missing_dimensions() {
        let index = build_index(
            &[("a", SparseVector::from_pairs([(3, 0.9)]))],
            128,
        );
        let builder = QueryBuilder::new(quantization());

        // dimension 77 has no postings and contributes nothing
        let results = builder
            .build_literal("3:0.5 77:0.9")
            .unwrap()
            .search(&index, 10)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.45).abs() < 1e-6);

        let none = builder
            .build_literal("77:0.9")
            .unwrap()
            .search(&index, 10)
            .unwrap();
        assert!(none.is_empty());

        let empty = builder.build_literal("").unwrap().search(&index, 10).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_negative_query_weight() {
        let index = build_index(
            &[
                ("a", SparseVector::from_pairs([(1, 0.5), (2, 0.5)])),
                ("b", SparseVector::from_pairs([(1, 0.4)])),
                ("c", SparseVector::from_pairs([(2, 0.9)])),
            ],
            1,
        );
        let query = QueryBuilder::new(quantization())
            .build_literal("1:1.0 2:-1.0")
            .unwrap();
        let results: Vec<ScoredDoc> = query.search(&index, 2).unwrap();
        assert_eq!(results, query.search_exhaustive(&index, 2).unwrap());
        assert_eq!(index.doc_id(results[0].doc_id), Some("b"));
        assert_eq!(index.doc_id(results[1].doc_id), Some("a"));
        assert!(results[1].score.abs() < 1e-6);
    }

    #[test]
    fn test_quantization_mismatch() {
        let index = build_index(&[("a", SparseVector::from_pairs([(3, 0.9)]))], 128);
        let other = QuantizationConfig::new(6, 10_000).unwrap();
        let query = QueryBuilder::new(other).build_literal("3:0.9").unwrap();
        assert!(matches!(query.search(&index, 10), Err(Error::Config(_))));
        assert_eq!(index.quantization().precision(), 7);
    }

    #[test]
    fn test_approximate_search() {
        let mut rng = StdRng::seed_from_u64(99);
        let corpus = random_corpus(&mut rng, 500, 10);
        let ids: Vec<String> = (0..corpus.len()).map(|i| i.to_string()).collect();
        let docs: Vec<(&str, SparseVector)> = ids
            .iter()
            .map(String::as_str)
            .zip(corpus.into_iter())
            .collect();
        let index = build_index(&docs, 16);

        let config = SearchConfig {
            heap_factor: 0.5,
            ..Default::default()
        };
        let query = QueryBuilder::from_search_config(quantization(), &config)
            .build_literal("0:1.0 3:0.5 7:0.25")
            .unwrap();
        let approx = query.search(&index, 10).unwrap();
        let all = query.search_exhaustive(&index, usize::MAX).unwrap();
        assert_eq!(approx.len(), 10);
        assert!(approx.windows(2).all(|w| w[0].score >= w[1].score));
        // approximate hits may be missing, but the ones returned are fully scored
        for hit in &approx {
            assert!(all.contains(hit), "hit {:?} not scored exactly", hit);
        }
        assert!(approx[0].score <= all[0].score);
    }
}
