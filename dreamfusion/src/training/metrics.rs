//! Scalar metric logging.

use std::collections::BTreeMap;

/// Receives named scalars during training.
///
/// Logging never fails; implementations drop what they cannot record.
pub trait MetricsLogger {
    /// Record `value` under `name` at `step`.
    fn log_scalar(&mut self, name: &str, value: f32, step: usize);
}

impl<T: MetricsLogger + ?Sized> MetricsLogger for &mut T {
    fn log_scalar(&mut self, name: &str, value: f32, step: usize) {
        (**self).log_scalar(name, value, step)
    }
}

impl<T: MetricsLogger + ?Sized> MetricsLogger for Box<T> {
    fn log_scalar(&mut self, name: &str, value: f32, step: usize) {
        (**self).log_scalar(name, value, step)
    }
}

/// Forwards every scalar to the `log` facade at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetricsLogger;

impl MetricsLogger for LogMetricsLogger {
    fn log_scalar(&mut self, name: &str, value: f32, step: usize) {
        log::debug!("step {} {} = {:.6}", step, name, value);
    }
}

/// In-memory record of every logged scalar.
#[derive(Debug, Clone, Default)]
pub struct MetricsHistory {
    series: BTreeMap<String, Vec<(usize, f32)>>,
}

impl MetricsHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Values logged under `name`, in order.
    pub fn values(&self, name: &str) -> Vec<f32> {
        self.series
            .get(name)
            .map(|s| s.iter().map(|&(_, v)| v).collect())
            .unwrap_or_default()
    }

    /// `(step, value)` pairs logged under `name`.
    pub fn entries(&self, name: &str) -> &[(usize, f32)] {
        self.series.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// How many times `name` was logged.
    pub fn count(&self, name: &str) -> usize {
        self.entries(name).len()
    }

    /// Most recent value of `name`.
    pub fn last(&self, name: &str) -> Option<f32> {
        self.entries(name).last().map(|&(_, v)| v)
    }

    /// All logged names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.series.clear();
    }
}

impl MetricsLogger for MetricsHistory {
    fn log_scalar(&mut self, name: &str, value: f32, step: usize) {
        self.series
            .entry(name.to_string())
            .or_default()
            .push((step, value));
    }
}

/// Sends every scalar to two loggers.
#[derive(Debug, Clone, Default)]
pub struct TeeLogger<A, B> {
    /// First receiver.
    pub first: A,
    /// Second receiver.
    pub second: B,
}

impl<A, B> TeeLogger<A, B> {
    /// Combine two loggers.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: MetricsLogger, B: MetricsLogger> MetricsLogger for TeeLogger<A, B> {
    fn log_scalar(&mut self, name: &str, value: f32, step: usize) {
        self.first.log_scalar(name, value, step);
        self.second.log_scalar(name, value, step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history() {
        let mut history = MetricsHistory::new();
        history.log_scalar("train/loss_sds", 1.0, 0);
        history.log_scalar("train/loss_sds", 0.5, 1);
        history.log_scalar("train_params/lambda_sds", 1.0, 1);

        assert_eq!(history.values("train/loss_sds"), vec![1.0, 0.5]);
        assert_eq!(history.count("train/loss_sds"), 2);
        assert_eq!(history.last("train/loss_sds"), Some(0.5));
        assert_eq!(history.entries("train/loss_sds")[1], (1, 0.5));
        assert_eq!(history.count("missing"), 0);
        assert_eq!(
            history.names().collect::<Vec<_>>(),
            vec!["train/loss_sds", "train_params/lambda_sds"]
        );
    }

    #[test]
    fn test_tee_and_references() {
        fn log_twice(mut logger: impl MetricsLogger) {
            logger.log_scalar("a", 1.0, 0);
            logger.log_scalar("a", 2.0, 1);
        }

        let mut tee = TeeLogger::new(MetricsHistory::new(), LogMetricsLogger);
        log_twice(&mut tee);
        let boxed: Box<dyn MetricsLogger> = Box::new(LogMetricsLogger);
        log_twice(boxed);
        assert_eq!(tee.first.values("a"), vec![1.0, 2.0]);
    }
}
