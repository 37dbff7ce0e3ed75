//! Vector distance metrics. Every function returns a "higher is better"
//! similarity score so callers never need to know which metric is active
//! when ranking: Euclidean distance is negated to fit the same ordering.

use docstore_core::schema::DistanceMetric;

pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum()
}

pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return 0.0;
    }
    dot(a, b) / denom
}

pub fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

pub fn norm(v: &[f32]) -> f64 {
    dot(v, v).sqrt()
}

/// Similarity score under `metric`, ordered so that larger is always a
/// closer match.
pub fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f64 {
    match metric {
        DistanceMetric::Cosine => cosine(a, b),
        DistanceMetric::Dot => dot(a, b),
        DistanceMetric::Euclidean => -euclidean(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_maximal_cosine_similarity() {
        let v = vec![1.0_f32, 2.0, 3.0];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_zero_cosine_similarity() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![0.0_f32, 1.0];
        assert!(cosine(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn euclidean_score_prefers_closer_vectors() {
        let origin = vec![0.0_f32, 0.0];
        let near = vec![1.0_f32, 0.0];
        let far = vec![5.0_f32, 0.0];
        assert!(score(DistanceMetric::Euclidean, &origin, &near) > score(DistanceMetric::Euclidean, &origin, &far));
    }
}
