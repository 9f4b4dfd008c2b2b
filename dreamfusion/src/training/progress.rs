//! Training progress counters.

use serde::{Deserialize, Serialize};

/// Position in training, used to resolve step-dependent weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgress {
    /// Completed epochs.
    pub epoch: usize,
    /// Optimizer updates so far.
    pub global_step: usize,
    /// Lowest loss seen.
    pub best_loss: f32,
    /// Exponential moving average of the loss.
    pub avg_loss: f32,
    loss_ema_factor: f32,
}

impl Default for TrainingProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingProgress {
    /// Progress at the start of training.
    pub fn new() -> Self {
        Self {
            epoch: 0,
            global_step: 0,
            best_loss: f32::INFINITY,
            avg_loss: 0.0,
            loss_ema_factor: 0.99,
        }
    }

    /// Progress at a given position, with no loss history.
    pub fn at(epoch: usize, global_step: usize) -> Self {
        Self {
            epoch,
            global_step,
            ..Self::new()
        }
    }

    /// Record one optimizer update.
    pub fn on_step(&mut self, loss: f32) {
        self.global_step += 1;

        if self.global_step == 1 {
            self.avg_loss = loss;
        } else {
            self.avg_loss = self.loss_ema_factor * self.avg_loss + (1.0 - self.loss_ema_factor) * loss;
        }

        if loss < self.best_loss {
            self.best_loss = loss;
        }
    }

    /// Record the end of an epoch.
    pub fn on_epoch(&mut self) {
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress() {
        let mut progress = TrainingProgress::new();
        assert_eq!(progress.global_step, 0);

        progress.on_step(1.0);
        assert_eq!(progress.global_step, 1);
        assert!((progress.avg_loss - 1.0).abs() < 1e-6);

        progress.on_step(0.0);
        assert!((progress.avg_loss - 0.99).abs() < 1e-6);
        assert_eq!(progress.best_loss, 0.0);

        progress.on_epoch();
        assert_eq!(progress.epoch, 1);
    }

    #[test]
    fn test_at() {
        let progress = TrainingProgress::at(2, 300);
        assert_eq!((progress.epoch, progress.global_step), (2, 300));
        assert!(progress.best_loss.is_infinite());
    }
}
