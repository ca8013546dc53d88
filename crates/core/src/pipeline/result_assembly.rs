use crate::pipeline::face_image::FaceImage;

/// A probe together with its aggregate statistics against the references.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredImage<T> {
    pub image: T,
    pub average_distance: f64,
    pub verified_ratio: f64,
}

/// Three parallel sequences ordered by ascending distance.
///
/// An empty bucket assembles to one placeholder image with empty
/// `distances` and `ratios`; that asymmetry marks the sentinel for image
/// consumers that cannot accept a zero-length batch.
#[derive(Clone, Debug, PartialEq)]
pub struct AssembledResult<T> {
    pub images: Vec<T>,
    pub distances: Vec<f64>,
    pub ratios: Vec<f64>,
}

impl<T> AssembledResult<T> {
    /// True when `images` holds only the empty-bucket sentinel.
    pub fn is_placeholder(&self) -> bool {
        self.distances.is_empty() && !self.images.is_empty()
    }

    /// Number of real (non-sentinel) entries.
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Distances rendered with three decimals, e.g. `"0.215"`.
    pub fn formatted_distances(&self) -> Vec<String> {
        self.distances.iter().map(|d| format!("{d:.3}")).collect()
    }

    /// `(image, distance, ratio)` triples; empty for the sentinel form.
    pub fn entries(&self) -> impl Iterator<Item = (&T, f64, f64)> {
        self.images
            .iter()
            .zip(self.distances.iter().copied())
            .zip(self.ratios.iter().copied())
            .map(|((image, distance), ratio)| (image, distance, ratio))
    }
}

/// Stable-sorts `bucket` by ascending distance and splits it into parallel sequences.
pub fn assemble<T: FaceImage>(mut bucket: Vec<ScoredImage<T>>) -> AssembledResult<T> {
    if bucket.is_empty() {
        return AssembledResult {
            images: vec![T::placeholder()],
            distances: Vec::new(),
            ratios: Vec::new(),
        };
    }

    bucket.sort_by(|a, b| a.average_distance.total_cmp(&b.average_distance));

    let mut result = AssembledResult {
        images: Vec::with_capacity(bucket.len()),
        distances: Vec::with_capacity(bucket.len()),
        ratios: Vec::with_capacity(bucket.len()),
    };
    for scored in bucket {
        result.images.push(scored.image);
        result.distances.push(scored.average_distance);
        result.ratios.push(scored.verified_ratio);
    }
    result
}
