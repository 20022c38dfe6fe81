use crate::error::SearchError;
use crate::models::DistanceMetric;

/// Exact nearest-neighbour index over keyed vectors. Append-only: there is
/// no delete or update.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    keys: Vec<u64>,
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            keys: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    pub fn entries(&self) -> impl Iterator<Item = (u64, &[f32])> + '_ {
        self.keys
            .iter()
            .copied()
            .zip(self.vectors.chunks_exact(self.dimension.max(1)))
    }

    /// Checks every vector before appending any, so a rejected batch leaves
    /// the index untouched.
    pub fn add(&mut self, entries: &[(u64, Vec<f32>)]) -> Result<(), SearchError> {
        for (_, vector) in entries {
            self.check_dimension(vector)?;
        }

        self.keys.reserve(entries.len());
        self.vectors.reserve(entries.len() * self.dimension);
        for (key, vector) in entries {
            self.keys.push(*key);
            self.vectors.extend_from_slice(vector);
        }

        Ok(())
    }

    /// Up to `k` `(key, distance)` pairs, closest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>, SearchError> {
        self.check_dimension(query)?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = norm(query);
        let mut scored = self
            .entries()
            .map(|(key, vector)| (key, self.distance(query, query_norm, vector)))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| {
            left.1
                .total_cmp(&right.1)
                .then_with(|| left.0.cmp(&right.0))
        });
        scored.truncate(k);

        Ok(scored)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), SearchError> {
        if vector.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn distance(&self, query: &[f32], query_norm: f32, vector: &[f32]) -> f32 {
        match self.metric {
            DistanceMetric::L2 => query
                .iter()
                .zip(vector)
                .map(|(left, right)| (left - right) * (left - right))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::Cosine => {
                let vector_norm = norm(vector);
                if query_norm == 0.0 || vector_norm == 0.0 {
                    return 1.0;
                }
                let dot = query
                    .iter()
                    .zip(vector)
                    .map(|(left, right)| left * right)
                    .sum::<f32>();
                let cosine = (dot / (query_norm * vector_norm)).clamp(-1.0, 1.0);
                1.0 - cosine
            }
        }
    }
}

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|value| value * value).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(metric: DistanceMetric) -> FlatIndex {
        let mut index = FlatIndex::new(2, metric);
        index
            .add(&[
                (10, vec![1.0, 0.0]),
                (11, vec![0.0, 1.0]),
                (12, vec![0.7, 0.7]),
            ])
            .expect("matching dimensions");
        index
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = FlatIndex::new(3, DistanceMetric::Cosine);
        assert!(index.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn search_returns_keys_closest_first() {
        let index = sample(DistanceMetric::Cosine);
        let hits = index.search(&[1.0, 0.1], 3).unwrap();

        let keys = hits.iter().map(|(key, _)| *key).collect::<Vec<_>>();
        assert_eq!(keys, vec![10, 12, 11]);
        assert!(hits.windows(2).all(|pair| pair[0].1 <= pair[1].1));
        assert!(hits.iter().all(|(_, distance)| *distance >= 0.0));
    }

    #[test]
    fn search_is_bounded_by_k_and_size() {
        let index = sample(DistanceMetric::L2);
        assert_eq!(index.search(&[0.0, 0.0], 2).unwrap().len(), 2);
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 3);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn l2_distance_is_euclidean() {
        let index = sample(DistanceMetric::L2);
        let hits = index.search(&[0.0, 4.0], 1).unwrap();
        assert_eq!(hits[0].0, 11);
        assert!((hits[0].1 - 3.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vectors_sit_at_unit_cosine_distance() {
        let mut index = FlatIndex::new(2, DistanceMetric::Cosine);
        index.add(&[(0, vec![0.0, 0.0])]).unwrap();
        let hits = index.search(&[1.0, 1.0], 1).unwrap();
        assert_eq!(hits, vec![(0, 1.0)]);
    }

    #[test]
    fn wrong_dimension_rejects_whole_batch() {
        let mut index = sample(DistanceMetric::Cosine);
        let result = index.add(&[(13, vec![1.0, 1.0]), (14, vec![1.0, 1.0, 1.0])]);

        assert!(matches!(
            result,
            Err(SearchError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert_eq!(index.len(), 3);
        assert_eq!(index.keys(), &[10, 11, 12]);
    }

    #[test]
    fn wrong_query_dimension_is_an_error() {
        let index = sample(DistanceMetric::L2);
        assert!(index.search(&[1.0], 1).is_err());
    }
}
