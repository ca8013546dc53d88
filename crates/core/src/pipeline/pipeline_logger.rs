use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting progress sink for pipeline runs.
///
/// A run announces its total step count once, then advances one step per
/// backend call. Purely observational: no method can influence control flow.
pub trait PipelineLogger: Send {
    /// Start a run of `total_steps` steps.
    fn begin(&mut self, total_steps: usize);

    /// Record one completed step.
    fn advance(&mut self);

    /// Record how long a named stage took for one step.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn begin(&mut self, _total_steps: usize) {}
    fn advance(&mut self) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI-oriented logger with throttled progress, per-stage timing and a
/// summary report at the end of a run.
///
/// Progress output is emitted every `throttle_steps` steps and on the last one.
pub struct StdoutPipelineLogger {
    throttle_steps: usize,
    timings: HashMap<String, Vec<f64>>,
    start_time: Instant,
    total_steps: usize,
    completed_steps: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_steps: usize) -> Self {
        Self {
            throttle_steps: throttle_steps.max(1),
            timings: HashMap::new(),
            start_time: Instant::now(),
            total_steps: 0,
            completed_steps: 0,
            messages: Vec::new(),
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.completed_steps
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Returns the formatted summary string, or `None` if no step ran.
    pub fn summary_string(&self) -> Option<String> {
        if self.completed_steps == 0 && self.timings.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let steps = self.completed_steps;
        let mut lines = Vec::new();

        lines.push(format!(
            "Pipeline summary ({steps}/{} steps, {:.1}s total):",
            self.total_steps,
            elapsed_ms / 1000.0
        ));

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = if durations.is_empty() {
                0.0
            } else {
                total_ms / durations.len() as f64
            };
            let pct = if elapsed_ms > 0.0 {
                total_ms / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({pct:4.1}%)"
            ));
        }

        if steps > 0 && elapsed_ms > 0.0 {
            let rate = steps as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {rate:.1} steps/s"));
        }

        Some(lines.join("\n"))
    }

    /// Returns the timing data for a given stage.
    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn begin(&mut self, total_steps: usize) {
        self.total_steps = total_steps;
        self.completed_steps = 0;
        self.start_time = Instant::now();
    }

    fn advance(&mut self) {
        self.completed_steps += 1;
        let (current, total) = (self.completed_steps, self.total_steps);
        if total > 0 && (current % self.throttle_steps == 0 || current == total) {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Progress: {current}/{total} steps ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
