//! Shared math utilities for the ONNX backend.
//!
//! Bounding-box overlap for detection post-processing and vector
//! similarity for embedding comparison.

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Dot product of L2-normalized vectors equals cosine similarity.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}

/// `1 - cosine_similarity`, floored at zero against rounding noise.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    (1.0 - cosine_similarity(a, b)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bbox_iou_no_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [20.0, 20.0, 30.0, 30.0];
        assert_eq!(bbox_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_bbox_iou_perfect_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_relative_eq!(bbox_iou(&a, &a), 1.0);
    }

    #[test]
    fn test_bbox_iou_partial_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [5.0, 5.0, 15.0, 15.0];
        assert_relative_eq!(bbox_iou(&a, &b), 25.0 / 175.0);
    }

    #[test]
    fn test_l2_normalize_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_relative_eq!(v[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(v[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cosine_distance_identical_is_zero() {
        let a = vec![0.6, 0.8];
        assert_relative_eq!(cosine_distance(&a, &a), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_distance_orthogonal_is_one() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_relative_eq!(cosine_distance(&a, &b), 1.0);
    }

    #[test]
    fn test_cosine_distance_opposite_is_two() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert_relative_eq!(cosine_distance(&a, &b), 2.0);
    }
}
