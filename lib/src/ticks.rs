/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::iter::FusedIterator;

pub const DEFAULT_NUM_TICKS: usize = 5;

/// Axis ticks from a rounded starting point up to the first tick at or
/// beyond the maximum. The last tick may exceed the maximum.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct Ticks {
    first: f64,
    step: f64,
    max: f64,
}

/// Choose a "nice" tick interval (1, 2 or 5 times a power of ten) giving
/// roughly `num_ticks` ticks between `min` and `max`.
pub fn calculate_ticks(min: f64, max: f64, num_ticks: usize) -> Ticks {
    let single = Ticks {
        first: max,
        step: 0.0,
        max,
    };

    if !(min < max && min.is_finite() && max.is_finite()) {
        return single;
    }

    let raw = (max - min) / num_ticks.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let residue = (raw / magnitude).ceil();
    let step = magnitude
        * if residue > 5.0 {
            10.0
        } else if residue > 2.0 {
            5.0
        } else if residue > 1.0 {
            2.0
        } else {
            1.0
        };

    if !(step > 0.0 && step.is_finite()) {
        return single;
    }

    Ticks {
        first: (((min - 1.0) / step).floor() * step).max(0.0),
        step,
        max,
    }
}

impl Ticks {
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn iter(&self) -> TickIter {
        TickIter {
            ticks: *self,
            next: Some(self.first),
        }
    }
}

impl IntoIterator for Ticks {
    type Item = f64;
    type IntoIter = TickIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &Ticks {
    type Item = f64;
    type IntoIter = TickIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Each tick is the previous one plus the step, so rounding errors
/// accumulate the same way as on the chart axis.
#[derive(Clone, Debug)]
pub struct TickIter {
    ticks: Ticks,
    next: Option<f64>,
}

impl Iterator for TickIter {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let tick = self.next?;
        // Also stops on NaN.
        self.next = (tick < self.ticks.max).then(|| tick + self.ticks.step);
        Some(tick)
    }
}

impl FusedIterator for TickIter {}
