//! Brute-force exact search. Used below the small-dataset threshold,
//! where an ANN structure's overhead isn't worth paying.

use super::{AnnBackend, Candidate};
use crate::error::VectorError;

#[derive(Debug, Default)]
pub struct FlatBackend {
    vectors: Vec<Option<Vec<f32>>>,
}

impl FlatBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnnBackend for FlatBackend {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn add(&mut self, vector: &[f32]) -> Result<usize, VectorError> {
        self.vectors.push(Some(vector.to_vec()));
        Ok(self.vectors.len() - 1)
    }

    fn remove(&mut self, position: usize) {
        if let Some(slot) = self.vectors.get_mut(position) {
            *slot = None;
        }
    }

    fn search(&self, query: &[f32], k: usize, is_deleted: &dyn Fn(usize) -> bool) -> Vec<Candidate> {
        let mut scored: Vec<Candidate> = self
            .vectors
            .iter()
            .enumerate()
            .filter_map(|(position, vector)| {
                if is_deleted(position) {
                    return None;
                }
                vector.as_ref().map(|v| Candidate {
                    position,
                    score: dot(query, v),
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    fn len(&self) -> usize {
        self.vectors.iter().filter(|v| v.is_some()).count()
    }

    fn get_vector(&self, position: usize) -> Option<Vec<f32>> {
        self.vectors.get(position)?.clone()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_nearest_first() {
        let mut backend = FlatBackend::new();
        backend.add(&[1.0, 0.0]).unwrap();
        backend.add(&[0.0, 1.0]).unwrap();
        backend.add(&[0.9, 0.1]).unwrap();
        let results = backend.search(&[1.0, 0.0], 2, &|_| false);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].position, 0);
    }

    #[test]
    fn skips_deleted_positions() {
        let mut backend = FlatBackend::new();
        backend.add(&[1.0, 0.0]).unwrap();
        backend.add(&[0.9, 0.1]).unwrap();
        backend.remove(0);
        let results = backend.search(&[1.0, 0.0], 2, &|p| p == 0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].position, 1);
    }
}
