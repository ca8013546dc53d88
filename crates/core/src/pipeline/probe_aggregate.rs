use crate::detection::domain::face_verifier::Comparison;

/// Per-probe statistics over all of its reference comparisons.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeAggregate {
    /// Arithmetic mean of the per-reference distances.
    pub average_distance: f64,
    /// Share of references the backend verified, rounded to two decimals.
    pub verified_ratio: f64,
}

/// Which side of the threshold a probe falls on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bucket {
    Verified,
    Rejected,
}

impl ProbeAggregate {
    /// Strictly below `threshold` is verified; equality is rejected.
    pub fn classify(&self, threshold: f64) -> Bucket {
        if self.average_distance < threshold {
            Bucket::Verified
        } else {
            Bucket::Rejected
        }
    }
}

/// Running sum and counts for one probe.
#[derive(Clone, Debug, Default)]
pub struct ProbeAccumulator {
    total_distance: f64,
    verified_count: usize,
    count: usize,
}

impl ProbeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, comparison: &Comparison) {
        self.total_distance += comparison.distance;
        if comparison.verified {
            self.verified_count += 1;
        }
        self.count += 1;
    }

    /// `None` until at least one comparison has been pushed.
    pub fn finish(&self) -> Option<ProbeAggregate> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(ProbeAggregate {
            average_distance: self.total_distance / n,
            verified_ratio: round_to_hundredths(self.verified_count as f64 / n),
        })
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
