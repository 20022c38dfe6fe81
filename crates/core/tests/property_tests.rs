//! Property tests for chunk sizes and search ordering.

use finrag_core::{
    ChunkMetadata, ChunkingConfig, Collection, DistanceMetric, DraftChunk, TextSplitter,
};
use proptest::prelude::*;

const DIM: usize = 8;

fn arb_vector() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, DIM)
}

fn arb_metric() -> impl Strategy<Value = DistanceMetric> {
    prop_oneof![Just(DistanceMetric::Cosine), Just(DistanceMetric::L2)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn chunks_never_exceed_chunk_size(
        text in "[a-zA-Z .\n]{0,1500}",
        chunk_size in 20usize..300,
        overlap_ratio in 0.0f64..0.9,
    ) {
        let chunk_overlap = ((chunk_size as f64) * overlap_ratio) as usize;
        let splitter = TextSplitter::new(ChunkingConfig {
            chunk_size,
            chunk_overlap,
            min_chars: 1,
        })
        .unwrap();

        let chunks = splitter.split(&text);

        prop_assert!(chunks.iter().all(|chunk| chunk.chars().count() <= chunk_size));
        prop_assert!(chunks.iter().all(|chunk| !chunk.trim().is_empty()));
        prop_assert_eq!(chunks.is_empty(), text.trim().is_empty());
    }

    #[test]
    fn search_is_bounded_and_ordered(
        vectors in proptest::collection::vec(arb_vector(), 0..30),
        query in arb_vector(),
        k in 0usize..40,
        metric in arb_metric(),
    ) {
        let mut collection = Collection::new(DIM, metric);
        let drafts = (0..vectors.len())
            .map(|index| DraftChunk::new(format!("chunk {index}"), ChunkMetadata::new("p.pdf")))
            .collect::<Vec<_>>();
        let stored = vectors.len();
        collection.append(drafts, vectors).unwrap();

        let results = collection.search(&query, k).unwrap();

        prop_assert_eq!(results.len(), k.min(stored));
        prop_assert!(results.windows(2).all(|pair| pair[0].distance <= pair[1].distance));
        prop_assert!(results.windows(2).all(|pair| pair[0].score >= pair[1].score));
        prop_assert!(results.iter().all(|result| result.score > 0.0 && result.score <= 1.0));
    }

    #[test]
    fn appends_keep_every_earlier_entry(
        batches in proptest::collection::vec(proptest::collection::vec(arb_vector(), 1..5), 1..6),
    ) {
        let mut collection = Collection::new(DIM, DistanceMetric::Cosine);
        let mut expected = 0usize;

        for batch in batches {
            let drafts = batch
                .iter()
                .map(|_| DraftChunk::new("text", ChunkMetadata::new("p.pdf")))
                .collect::<Vec<_>>();
            let keys = collection.append(drafts, batch).unwrap();

            prop_assert_eq!(keys.first().copied(), Some(expected as u64));
            expected += keys.len();
            prop_assert_eq!(collection.len(), expected);
            prop_assert_eq!(collection.index().len(), expected);
        }
    }
}
