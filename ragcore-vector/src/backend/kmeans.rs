//! Minimal Lloyd's-algorithm k-means, shared by the inverted-list backend
//! and the inverted-list + product-quantization backend for cluster
//! training.

use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Run k-means for `iterations` rounds over `points` (each a slice of
/// length `dim`), returning `k` centroids (each length `dim`). If
/// `points` has fewer than `k` entries, centroids are padded by cycling
/// through the available points.
#[must_use]
pub fn kmeans(points: &[Vec<f32>], k: usize, dim: usize, iterations: usize) -> Vec<Vec<f32>> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut indices: Vec<usize> = (0..points.len()).collect();
    indices.shuffle(&mut rng);

    let mut centroids: Vec<Vec<f32>> = (0..k)
        .map(|i| points[indices[i % indices.len()]].clone())
        .collect();

    let mut assignments = vec![0usize; points.len()];
    for _ in 0..iterations {
        for (i, point) in points.iter().enumerate() {
            let mut best = 0;
            let mut best_dist = f32::MAX;
            for (c, centroid) in centroids.iter().enumerate() {
                let dist = squared_distance(point, centroid);
                if dist < best_dist {
                    best_dist = dist;
                    best = c;
                }
            }
            assignments[i] = best;
        }

        let mut sums = vec![vec![0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for (i, point) in points.iter().enumerate() {
            let cluster = assignments[i];
            counts[cluster] += 1;
            for (d, value) in point.iter().enumerate() {
                sums[cluster][d] += value;
            }
        }

        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            for d in 0..dim {
                centroids[c][d] = sums[c][d] / counts[c] as f32;
            }
        }
    }

    centroids
}

#[must_use]
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[must_use]
pub fn nearest_centroid(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            squared_distance(point, a)
                .partial_cmp(&squared_distance(point, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map_or(0, |(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_obvious_clusters() {
        let points = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 9.9],
        ];
        let centroids = kmeans(&points, 2, 2, 10);
        assert_eq!(centroids.len(), 2);
        let c0 = nearest_centroid(&points[0], &centroids);
        let c1 = nearest_centroid(&points[1], &centroids);
        assert_eq!(c0, c1);
        let c2 = nearest_centroid(&points[2], &centroids);
        assert_ne!(c0, c2);
    }
}
