use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for the monitoring loop.
///
/// Keeps the consumer loop independent of where its telemetry goes
/// (log crate, dashboards, tests).
pub trait PipelineLogger: Send {
    /// Report that `cycles` detection cycles have completed.
    fn cycle(&mut self, cycles: u64);

    /// Record how long a named stage took for one cycle.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. queue depth, best score).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Used when embedding and in tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn cycle(&mut self, _cycles: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count, sum and maximum of one stage or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub count: u64,
    pub sum: f64,
    pub max: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        if self.count == 0 || value > self.max {
            self.max = value;
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Aggregates per-stage timings and metrics and reports through `log`.
///
/// Only running aggregates are kept, so memory stays flat however long the
/// monitor runs. Cycle progress is logged every `throttle_cycles` cycles.
pub struct LogPipelineLogger {
    throttle_cycles: u64,
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
    start_time: Instant,
    cycles: u64,
}

impl LogPipelineLogger {
    pub fn new(throttle_cycles: u64) -> Self {
        Self {
            throttle_cycles: throttle_cycles.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            cycles: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let cycles = self.cycles;
        let mut lines = vec![format!(
            "Monitor summary ({cycles} cycles, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, agg) in stages {
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  max {:6.1}ms  total {:7.0}ms",
                agg.average(),
                agg.max,
                agg.sum
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, agg) in names {
            lines.push(format!("  {name}: avg {:.2}", agg.average()));
        }

        if cycles > 0 && elapsed_ms > 0.0 {
            let fps = cycles as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timing_for(&self, stage: &str) -> Option<Aggregate> {
        self.timings.get(stage).copied()
    }

    pub fn metric_for(&self, name: &str) -> Option<Aggregate> {
        self.metrics.get(name).copied()
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn cycle(&mut self, cycles: u64) {
        self.cycles = cycles;
        if cycles % self.throttle_cycles == 0 {
            log::info!("Processed {cycles} cycles");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        match self.timings.get_mut(stage) {
            Some(agg) => agg.record(duration_ms),
            None => {
                let mut agg = Aggregate::default();
                agg.record(duration_ms);
                self.timings.insert(stage.to_string(), agg);
            }
        }
    }

    fn metric(&mut self, name: &str, value: f64) {
        match self.metrics.get_mut(name) {
            Some(agg) => agg.record(value),
            None => {
                let mut agg = Aggregate::default();
                agg.record(value);
                self.metrics.insert(name.to_string(), agg);
            }
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
