/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::fmt::Display;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Non-finite input yields 0.
pub fn nano_to_milli(nanos: f64) -> f64 {
    match nanos.is_finite() {
        true => nanos / NANOS_PER_MILLI,
        false => 0.0,
    }
}

/// Non-finite input yields 0.
pub fn milli_to_nano(millis: f64) -> f64 {
    match millis.is_finite() {
        true => millis * NANOS_PER_MILLI,
        false => 0.0,
    }
}

/// Relative change against a benchmark period, in percent.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct Benchmark {
    percent: f64,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Trend {
    Flat,
    Up,
    Down,
}

impl Benchmark {
    pub fn new(percent: f64) -> Option<Self> {
        percent.is_finite().then_some(Self { percent })
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn trend(&self) -> Trend {
        if self.percent > 0.0 {
            Trend::Up
        } else if self.percent < 0.0 {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    /// Increases (in latency or errors) are bad.
    pub fn color(&self) -> &'static str {
        match self.trend() {
            Trend::Flat => "#9ea8a9",
            Trend::Up => "#c23f25",
            Trend::Down => "#3f7e23",
        }
    }
}

impl Trend {
    pub fn arrow(self) -> &'static str {
        match self {
            Trend::Flat => "-",
            Trend::Up => "\u{25B4}",
            Trend::Down => "\u{25BE}",
        }
    }
}

impl Display for Benchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}% {}", self.percent.abs(), self.trend().arrow())
    }
}
