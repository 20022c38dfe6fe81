use crate::error::SearchError;
use crate::index::FlatIndex;
use crate::models::{Chunk, DistanceMetric, DraftChunk, SearchResult};
use std::collections::{BTreeMap, BTreeSet};

/// Append-only mapping from an explicit key to its vector and chunk. The
/// index only ever sees keys, so the two halves cannot drift apart.
#[derive(Debug, Clone)]
pub struct Collection {
    index: FlatIndex,
    chunks: BTreeMap<u64, Chunk>,
    next_key: u64,
}

impl Collection {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            index: FlatIndex::new(dimension, metric),
            chunks: BTreeMap::new(),
            next_key: 0,
        }
    }

    /// Rebuilds a collection from persisted parts. Callers are expected to
    /// have checked that keys line up.
    pub(crate) fn from_parts(index: FlatIndex, chunks: BTreeMap<u64, Chunk>) -> Self {
        let next_key = chunks
            .keys()
            .next_back()
            .map_or(0, |last| last.saturating_add(1));

        Self {
            index,
            chunks,
            next_key,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    /// Chunks in key order, which is insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.chunks.values()
    }

    pub fn get(&self, key: u64) -> Option<&Chunk> {
        self.chunks.get(&key)
    }

    pub fn sources(&self) -> Vec<String> {
        self.chunks
            .values()
            .map(|chunk| chunk.metadata.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Keys and stores `drafts` with their vectors in one step. Nothing is
    /// stored if any vector has the wrong dimension.
    pub fn append(
        &mut self,
        drafts: Vec<DraftChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<u64>, SearchError> {
        if drafts.len() != vectors.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                vectors.len(),
                drafts.len()
            )));
        }

        let keys = (0..drafts.len() as u64)
            .map(|offset| self.next_key + offset)
            .collect::<Vec<_>>();

        let entries = keys.iter().copied().zip(vectors).collect::<Vec<_>>();
        self.index.add(&entries)?;

        for (key, draft) in keys.iter().copied().zip(drafts) {
            self.chunks.insert(key, draft.into_chunk(key));
        }
        self.next_key += keys.len() as u64;

        Ok(keys)
    }

    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchResult>, SearchError> {
        let hits = self.index.search(query_vector, k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(key, distance)| {
                self.chunks
                    .get(&key)
                    .map(|chunk| SearchResult::from_chunk(chunk, distance))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn draft(content: &str) -> DraftChunk {
        DraftChunk::new(content, ChunkMetadata::new("report.pdf"))
    }

    #[test]
    fn append_assigns_sequential_keys_across_calls() {
        let mut collection = Collection::new(2, DistanceMetric::Cosine);

        let first = collection
            .append(vec![draft("a"), draft("b")], vec![vec![1.0, 0.0], vec![0.0, 1.0]])
            .unwrap();
        let second = collection.append(vec![draft("c")], vec![vec![1.0, 1.0]]).unwrap();

        assert_eq!(first, vec![0, 1]);
        assert_eq!(second, vec![2]);
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.index().len(), 3);
        assert_eq!(collection.get(2).map(|chunk| chunk.content.as_str()), Some("c"));
    }

    #[test]
    fn rejected_append_leaves_collection_unchanged() {
        let mut collection = Collection::new(2, DistanceMetric::Cosine);
        collection.append(vec![draft("a")], vec![vec![1.0, 0.0]]).unwrap();

        let result = collection.append(vec![draft("b"), draft("c")], vec![vec![1.0, 0.0], vec![1.0]]);
        assert!(matches!(result, Err(SearchError::DimensionMismatch { .. })));

        let mismatched = collection.append(vec![draft("d")], Vec::new());
        assert!(matches!(mismatched, Err(SearchError::Request(_))));

        assert_eq!(collection.len(), 1);
        assert_eq!(collection.index().len(), 1);
        let next = collection.append(vec![draft("e")], vec![vec![0.0, 1.0]]).unwrap();
        assert_eq!(next, vec![1]);
    }

    #[test]
    fn search_maps_keys_back_to_chunks() {
        let mut collection = Collection::new(2, DistanceMetric::Cosine);
        collection
            .append(
                vec![draft("east"), draft("north")],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .unwrap();

        let results = collection.search(&[0.1, 1.0], 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "north");
        assert_eq!(results[0].embedding_id, 1);
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn from_parts_continues_after_highest_key() {
        let mut source = Collection::new(2, DistanceMetric::L2);
        source
            .append(vec![draft("a"), draft("b")], vec![vec![1.0, 0.0], vec![0.0, 1.0]])
            .unwrap();

        let chunks = source
            .chunks()
            .map(|chunk| (chunk.embedding_id, chunk.clone()))
            .collect();
        let mut rebuilt = Collection::from_parts(source.index().clone(), chunks);

        let keys = rebuilt.append(vec![draft("c")], vec![vec![1.0, 1.0]]).unwrap();
        assert_eq!(keys, vec![2]);
        assert_eq!(rebuilt.sources(), vec!["report.pdf".to_string()]);
    }
}
