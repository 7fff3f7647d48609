//! Demo mode - simulated instruments for running without hardware
//!
//! The pressure simulator idles around ambient and now and then runs a
//! pressurise / hold / release cycle like a dissolution experiment. The
//! temperature simulator settles towards the bath set-point with a slow
//! wobble. Both add a little measurement noise and can be told to fail.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

use super::SampleSource;
use crate::protocol::SourceError;
use crate::state::Quantity;

/// Ambient pressure [bar]
const AMBIENT_BAR: f64 = 1.013;

/// How a demo source misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FailurePlan {
    /// Every poll succeeds
    #[default]
    Never,
    /// Each poll fails with the given probability
    Intermittent(f64),
    /// Succeeds this many times, then fails forever
    DieAfter(u64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cycle {
    /// Vessel open to ambient
    Ambient,
    /// Pressure rising towards the set-point
    Pressurise { start_s: f64 },
    /// At set-point
    Hold { start_s: f64 },
    /// Venting back to ambient
    Release { start_s: f64 },
}

/// Simulated temperature or pressure source
pub struct DemoSource {
    name: String,
    quantity: Quantity,
    started: Instant,
    rng: StdRng,
    failure: FailurePlan,
    /// Artificial I/O latency per poll
    latency: Duration,
    polls: u64,
    cycle: Cycle,
    next_cycle_at_s: f64,
    set_point_bar: f64,
}

impl DemoSource {
    /// Create a simulator for `quantity`
    pub fn new(name: impl Into<String>, quantity: Quantity) -> Self {
        Self::with_rng(name, quantity, StdRng::from_entropy())
    }

    /// Deterministic simulator for tests
    pub fn with_seed(name: impl Into<String>, quantity: Quantity, seed: u64) -> Self {
        Self::with_rng(name, quantity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(name: impl Into<String>, quantity: Quantity, mut rng: StdRng) -> Self {
        let next_cycle_at_s = rng.gen_range(20.0..40.0);
        Self {
            name: name.into(),
            quantity,
            started: Instant::now(),
            rng,
            failure: FailurePlan::Never,
            latency: Duration::ZERO,
            polls: 0,
            cycle: Cycle::Ambient,
            next_cycle_at_s,
            set_point_bar: 5.0,
        }
    }

    /// Make the source fail according to `plan`
    pub fn with_failures(mut self, plan: FailurePlan) -> Self {
        self.failure = plan;
        self
    }

    /// Block this long inside every poll
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Value of the simulated quantity `t` seconds into the simulation
    pub fn value_at(&mut self, t: f64) -> f64 {
        let noise: f64 = self.rng.gen_range(-1.0..1.0);
        match self.quantity {
            Quantity::Temperature => {
                let settle = 21.0 - 1.5 * (-t / 300.0).exp();
                settle + 0.05 * (t * 0.02).sin() + 0.004 * noise
            }
            Quantity::Pressure => {
                self.update_cycle(t);
                self.target_pressure(t) + 0.002 * noise
            }
        }
    }

    fn update_cycle(&mut self, t: f64) {
        const PRESSURISE_S: f64 = 10.0;
        const HOLD_S: f64 = 60.0;
        const RELEASE_S: f64 = 5.0;

        match self.cycle {
            Cycle::Ambient => {
                if t >= self.next_cycle_at_s {
                    self.set_point_bar = self.rng.gen_range(3.0..7.0);
                    self.cycle = Cycle::Pressurise { start_s: t };
                }
            }
            Cycle::Pressurise { start_s } => {
                if t >= start_s + PRESSURISE_S {
                    self.cycle = Cycle::Hold { start_s: t };
                }
            }
            Cycle::Hold { start_s } => {
                if t >= start_s + HOLD_S {
                    self.cycle = Cycle::Release { start_s: t };
                }
            }
            Cycle::Release { start_s } => {
                if t >= start_s + RELEASE_S {
                    self.cycle = Cycle::Ambient;
                    self.next_cycle_at_s = t + self.rng.gen_range(60.0..120.0);
                }
            }
        }
    }

    fn target_pressure(&self, t: f64) -> f64 {
        const PRESSURISE_S: f64 = 10.0;
        const RELEASE_S: f64 = 5.0;

        match self.cycle {
            Cycle::Ambient => AMBIENT_BAR,
            Cycle::Pressurise { start_s } => {
                let progress = ((t - start_s) / PRESSURISE_S).clamp(0.0, 1.0);
                AMBIENT_BAR + (self.set_point_bar - AMBIENT_BAR) * progress
            }
            // Slow decay while gas dissolves into the liquid
            Cycle::Hold { start_s } => {
                let dissolved = 0.05 * (1.0 - (-(t - start_s) / 30.0).exp());
                self.set_point_bar * (1.0 - dissolved)
            }
            Cycle::Release { start_s } => {
                let progress = ((t - start_s) / RELEASE_S).clamp(0.0, 1.0);
                let from = self.set_point_bar * 0.95;
                from + (AMBIENT_BAR - from) * progress
            }
        }
    }

    fn should_fail(&mut self) -> bool {
        match self.failure {
            FailurePlan::Never => false,
            FailurePlan::Intermittent(p) => self.rng.gen_bool(p.clamp(0.0, 1.0)),
            FailurePlan::DieAfter(n) => self.polls > n,
        }
    }
}

impl SampleSource for DemoSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn quantity(&self) -> Quantity {
        self.quantity
    }

    fn acquire(&mut self) -> Result<f64, SourceError> {
        self.polls += 1;
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if self.should_fail() {
            return Err(SourceError::InvalidResponse("simulated failure".to_string()));
        }
        let t = self.started.elapsed().as_secs_f64();
        Ok(self.value_at(t))
    }
}
