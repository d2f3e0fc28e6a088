//! K-means clustering of event feature vectors
//!
//! Lloyd iterations with "points" initialisation: the initial centroids are
//! distinct events drawn at random. Runs a fixed number of iterations rather
//! than testing for convergence. A centroid that loses all of its members
//! keeps its previous position.

use crate::error::AnalysisError;
use rand::seq::index;
use rand::Rng;

/// Number of Lloyd iterations
pub const KMEANS_ITERATIONS: usize = 30;

/// Result of a clustering run
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// One centroid per cluster
    pub centroids: Vec<Vec<f32>>,
    /// Cluster label for every point, in `0..centroids.len()`
    pub labels: Vec<usize>,
}

impl Clustering {
    pub fn num_clusters(&self) -> usize {
        self.centroids.len()
    }

    /// Number of points carrying each label
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Cluster `points` into `k` groups
pub fn kmeans<R: Rng + ?Sized>(
    points: &[Vec<f32>],
    k: usize,
    iterations: usize,
    rng: &mut R,
) -> Result<Clustering, AnalysisError> {
    if k == 0 {
        return Err(AnalysisError::InvalidGroupCount(k));
    }
    if points.is_empty() {
        return Err(AnalysisError::EmptyFeatures);
    }

    let mut centroids = initial_points(points, k, rng);
    let mut labels = assign(points, &centroids);
    let mut warned = false;

    for _ in 0..iterations {
        labels = assign(points, &centroids);
        let empty = update_means(points, &labels, &mut centroids);
        if empty > 0 && !warned {
            tracing::warn!("{} cluster(s) are empty, keeping previous centroids", empty);
            warned = true;
        }
    }

    Ok(Clustering { centroids, labels })
}

/// Draw `k` starting centroids from the data.
///
/// Centroids are drawn without replacement from the distinct points while
/// there are enough of them, so no two clusters start on the same spot.
fn initial_points<R: Rng + ?Sized>(points: &[Vec<f32>], k: usize, rng: &mut R) -> Vec<Vec<f32>> {
    let mut distinct: Vec<&Vec<f32>> = Vec::new();
    for p in points {
        if !distinct.contains(&p) {
            distinct.push(p);
        }
    }

    if k <= distinct.len() {
        index::sample(rng, distinct.len(), k)
            .into_iter()
            .map(|i| distinct[i].clone())
            .collect()
    } else {
        (0..k)
            .map(|_| points[rng.gen_range(0..points.len())].clone())
            .collect()
    }
}

/// Label every point with its nearest centroid. Ties go to the lower index.
fn assign(points: &[Vec<f32>], centroids: &[Vec<f32>]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            let mut best = 0;
            let mut best_dist = f32::INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let dist = squared_distance(p, centroid);
                if dist < best_dist {
                    best_dist = dist;
                    best = c;
                }
            }
            best
        })
        .collect()
}

/// Move each centroid to the mean of its members. Returns the number of
/// clusters left without members.
fn update_means(points: &[Vec<f32>], labels: &[usize], centroids: &mut [Vec<f32>]) -> usize {
    let dims = centroids.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0f32; dims]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (acc, v) in sums[label].iter_mut().zip(point) {
            *acc += v;
        }
    }

    let mut empty = 0;
    for ((centroid, sum), &count) in centroids.iter_mut().zip(sums).zip(&counts) {
        if count == 0 {
            empty += 1;
            continue;
        }
        *centroid = sum.into_iter().map(|v| v / count as f32).collect();
    }
    empty
}

#[inline]
fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_blobs() -> Vec<Vec<f32>> {
        let mut points = Vec::new();
        for i in 0..10 {
            let d = i as f32 * 0.01;
            points.push(vec![0.1 + d, 0.1 - d]);
            points.push(vec![0.9 - d, 0.9 + d]);
        }
        points
    }

    #[test]
    fn test_labels_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let points = two_blobs();
        let result = kmeans(&points, 4, KMEANS_ITERATIONS, &mut rng).unwrap();
        assert_eq!(result.labels.len(), points.len());
        assert!(result.labels.iter().all(|&l| l < 4));
        assert_eq!(result.cluster_sizes().iter().sum::<usize>(), points.len());
    }

    #[test]
    fn test_separates_blobs() {
        let mut rng = StdRng::seed_from_u64(5);
        let points = two_blobs();
        let result = kmeans(&points, 2, KMEANS_ITERATIONS, &mut rng).unwrap();

        // Even indices form one blob, odd indices the other
        let a = result.labels[0];
        let b = result.labels[1];
        assert_ne!(a, b);
        for (i, &label) in result.labels.iter().enumerate() {
            assert_eq!(label, if i % 2 == 0 { a } else { b });
        }
    }

    #[test]
    fn test_single_cluster() {
        let mut rng = StdRng::seed_from_u64(9);
        let result = kmeans(&two_blobs(), 1, KMEANS_ITERATIONS, &mut rng).unwrap();
        assert!(result.labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_more_clusters_than_points() {
        let mut rng = StdRng::seed_from_u64(2);
        let points = vec![vec![0.0], vec![1.0]];
        let result = kmeans(&points, 5, KMEANS_ITERATIONS, &mut rng).unwrap();
        assert_eq!(result.num_clusters(), 5);
        assert!(result.labels.iter().all(|&l| l < 5));
    }

    #[test]
    fn test_duplicate_points_split() {
        // Two distinct points, each repeated
        let mut points = vec![vec![0.0, 1.0]; 10];
        points.extend(vec![vec![1.0, 0.0]; 10]);
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = kmeans(&points, 2, KMEANS_ITERATIONS, &mut rng).unwrap();
            assert_eq!(result.cluster_sizes(), vec![10, 10]);
        }
    }

    #[test]
    fn test_invalid_input() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            kmeans(&two_blobs(), 0, 1, &mut rng),
            Err(AnalysisError::InvalidGroupCount(0))
        );
        assert_eq!(kmeans(&[], 2, 1, &mut rng), Err(AnalysisError::EmptyFeatures));
    }
}
