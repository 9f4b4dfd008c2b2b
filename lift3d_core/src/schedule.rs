//! Step-dependent scalar schedules.
//!
//! A schedule is either a constant or a clamped linear ramp:
//!
//! - `0.5` → constant
//! - `[start_value, end_value, end_step]` → ramp starting at step 0
//! - `[start_step, start_value, end_value, end_step]` → ramp between two steps
//!
//! An integer `end_step` ramps over global training steps, a float `end_step`
//! ramps over epochs. This mirrors how weights are written in experiment
//! configs, so `5000` and `5000.0` mean different things.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::{CoreError, Result};

/// A possibly step-dependent scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleSpec {
    /// A fixed value.
    Constant(f64),
    /// A linear ramp, see the module docs for the accepted layouts.
    Ramp(Vec<Number>),
}

impl From<f64> for ScheduleSpec {
    fn from(value: f64) -> Self {
        ScheduleSpec::Constant(value)
    }
}

impl ScheduleSpec {
    /// A constant schedule.
    pub fn constant(value: f64) -> Self {
        ScheduleSpec::Constant(value)
    }

    /// A ramp over global steps.
    pub fn linear_steps(start_step: u64, start_value: f64, end_value: f64, end_step: u64) -> Self {
        ScheduleSpec::Ramp(vec![
            Number::from(start_step),
            float(start_value),
            float(end_value),
            Number::from(end_step),
        ])
    }

    /// A ramp over epochs.
    pub fn linear_epochs(start_epoch: f64, start_value: f64, end_value: f64, end_epoch: f64) -> Self {
        ScheduleSpec::Ramp(vec![
            float(start_epoch),
            float(start_value),
            float(end_value),
            float(end_epoch),
        ])
    }

    /// Check the schedule layout without resolving it.
    pub fn validate(&self) -> Result<()> {
        match self {
            ScheduleSpec::Constant(_) => Ok(()),
            ScheduleSpec::Ramp(_) => self.ramp().map(|_| ()),
        }
    }

    /// Resolve the schedule at the given training position.
    pub fn resolve(&self, epoch: usize, global_step: usize) -> Result<f32> {
        match self {
            ScheduleSpec::Constant(value) => Ok(*value as f32),
            ScheduleSpec::Ramp(_) => {
                let ramp = self.ramp()?;
                let current = if ramp.by_step {
                    global_step as f64
                } else {
                    epoch as f64
                };
                let t = ((current - ramp.start) / (ramp.end - ramp.start)).clamp(0.0, 1.0);
                Ok((ramp.start_value + (ramp.end_value - ramp.start_value) * t) as f32)
            }
        }
    }

    fn ramp(&self) -> Result<Ramp> {
        let values = match self {
            ScheduleSpec::Ramp(values) => values,
            ScheduleSpec::Constant(_) => return Err(CoreError::InvalidSchedule { len: 1 }),
        };

        let (start, rest) = match values.len() {
            3 => (0.0, &values[..]),
            4 => (as_f64(&values[0]), &values[1..]),
            len => return Err(CoreError::InvalidSchedule { len }),
        };

        let end_number = &rest[2];
        let end = as_f64(end_number);
        if end <= start {
            return Err(CoreError::DegenerateSchedule { start, end });
        }

        Ok(Ramp {
            start,
            start_value: as_f64(&rest[0]),
            end_value: as_f64(&rest[1]),
            end,
            by_step: !end_number.is_f64(),
        })
    }
}

struct Ramp {
    start: f64,
    start_value: f64,
    end_value: f64,
    end: f64,
    by_step: bool,
}

fn as_f64(number: &Number) -> f64 {
    number.as_f64().unwrap_or(0.0)
}

fn float(value: f64) -> Number {
    Number::from_f64(value).unwrap_or_else(|| Number::from(0))
}

/// Named loss weights, each a [`ScheduleSpec`].
///
/// Keys follow the `lambda_<term>` convention; a loss term `loss_<term>` is
/// weighted by `lambda_<term>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LossWeights {
    weights: BTreeMap<String, ScheduleSpec>,
}

impl LossWeights {
    /// Create an empty weight table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a weight.
    pub fn with(mut self, name: impl Into<String>, spec: impl Into<ScheduleSpec>) -> Self {
        self.weights.insert(name.into(), spec.into());
        self
    }

    /// Add or replace a weight in place.
    pub fn insert(&mut self, name: impl Into<String>, spec: impl Into<ScheduleSpec>) {
        self.weights.insert(name.into(), spec.into());
    }

    /// Look up a weight by name.
    pub fn get(&self, name: &str) -> Result<&ScheduleSpec> {
        self.weights.get(name).ok_or_else(|| CoreError::MissingWeight {
            name: name.to_string(),
        })
    }

    /// Whether a weight is configured.
    pub fn contains(&self, name: &str) -> bool {
        self.weights.contains_key(name)
    }

    /// Resolve a weight by name.
    pub fn resolve(&self, name: &str, epoch: usize, global_step: usize) -> Result<f32> {
        self.get(name)?.resolve(epoch, global_step)
    }

    /// Weight name for a loss term name (`loss_x` → `lambda_x`).
    ///
    /// Returns `None` if the name is not a loss term.
    pub fn weight_name_for(loss_name: &str) -> Option<String> {
        loss_name
            .strip_prefix("loss_")
            .map(|term| format!("lambda_{}", term))
    }

    /// Iterate over all weights in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScheduleSpec)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of configured weights.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether no weights are configured.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Validate every configured spec.
    pub fn validate(&self) -> Result<()> {
        self.weights.values().try_for_each(ScheduleSpec::validate)
    }
}
