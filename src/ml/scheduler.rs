// ============================================================
// Layer 5 — Learning-Rate Schedulers
// ============================================================
// A scheduler is bound to an optimizer's base learning rate and is
// advanced once per training batch:
//
//   construction   → optimizer.set_lr(scheduler.learning_rate())
//   after step t   → optimizer.set_lr(scheduler.step())
//
// so the rate used by update t is lr(t), with lr(0) applied before
// the first batch.
//
//   library:  StepLR, ExponentialLR, CosineAnnealingLR (burn::lr_scheduler)
//   plugins:  OneCycleLR — cosine warm-up to max_lr, then cosine decay
//
// CosineAnnealingLR's period and the one-cycle length default to
// steps_per_epoch · n_epochs. burn's cosine schedule restarts from the
// base rate once the period is over.
//
// Reference: Smith & Topin (2017) Super-Convergence
//            Loshchilov & Hutter (2016) SGDR

use anyhow::Result;
use burn::lr_scheduler::{
    cosine::CosineAnnealingLrSchedulerConfig,
    exponential::ExponentialLrSchedulerConfig,
    step::StepLrSchedulerConfig,
    LrScheduler as BurnLrScheduler,
};
use serde::Deserialize;
use std::f64::consts::PI;

use crate::domain::config::ComponentSpec;
use crate::domain::error::{ComponentError, ComponentKind};
use crate::ml::registry::TieredRegistry;

pub trait LrScheduler: Send {
    /// Advance one step and return the new rate.
    fn step(&mut self) -> f64;

    /// The rate for the current step.
    fn learning_rate(&self) -> f64;
}

/// What every scheduler is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleContext {
    pub base_lr:         f64,
    pub steps_per_epoch: usize,
    pub n_epochs:        usize,
}

impl ScheduleContext {
    pub fn total_steps(&self) -> usize {
        (self.steps_per_epoch * self.n_epochs).max(1)
    }
}

pub type SchedulerCtor = fn(&ComponentSpec, ScheduleContext) -> Result<Box<dyn LrScheduler>, ComponentError>;

pub fn scheduler_registry() -> TieredRegistry<SchedulerCtor> {
    let mut registry = TieredRegistry::new(ComponentKind::Scheduler);
    registry
        .library
        .register("StepLR", step_lr as SchedulerCtor)
        .register("ExponentialLR", exponential_lr as SchedulerCtor)
        .register("CosineAnnealingLR", cosine_annealing_lr as SchedulerCtor);
    registry
        .plugins
        .register("OneCycleLR", one_cycle_lr as SchedulerCtor);
    registry
}

/// Resolve the `scheduler` section against the optimizer's base rate.
pub fn get_scheduler(spec: &ComponentSpec, ctx: ScheduleContext) -> Result<Box<dyn LrScheduler>> {
    let registry = scheduler_registry();
    let (origin, ctor) = registry.resolve(&spec.name)?;
    let scheduler = ctor(spec, ctx)?;
    tracing::info!(
        "Scheduler '{}' ({:?}): {} steps/epoch × {} epochs, initial lr={:e}",
        spec.name, origin, ctx.steps_per_epoch, ctx.n_epochs, scheduler.learning_rate()
    );
    Ok(scheduler)
}

/// Drives one of burn's schedulers. burn's first `step()` yields lr(0),
/// so it is taken at construction and cached.
struct BurnSchedule<S: BurnLrScheduler> {
    inner:   S,
    current: f64,
}

impl<S: BurnLrScheduler + 'static> BurnSchedule<S> {
    fn boxed(mut inner: S) -> Box<dyn LrScheduler> {
        let current = inner.step();
        Box::new(Self { inner, current })
    }
}

impl<S: BurnLrScheduler> LrScheduler for BurnSchedule<S> {
    fn step(&mut self) -> f64 {
        self.current = self.inner.step();
        self.current
    }

    fn learning_rate(&self) -> f64 {
        self.current
    }
}

/// Any schedule expressible as a pure function of the step index.
struct FnSchedule<F: Fn(usize) -> f64 + Send> {
    lr_at: F,
    step:  usize,
}

impl<F: Fn(usize) -> f64 + Send> FnSchedule<F> {
    fn boxed(lr_at: F) -> Box<dyn LrScheduler>
    where
        F: 'static,
    {
        Box::new(Self { lr_at, step: 0 })
    }
}

impl<F: Fn(usize) -> f64 + Send> LrScheduler for FnSchedule<F> {
    fn step(&mut self) -> f64 {
        self.step = self.step.saturating_add(1);
        self.learning_rate()
    }

    fn learning_rate(&self) -> f64 {
        (self.lr_at)(self.step)
    }
}

fn invalid(spec: &ComponentSpec, reason: &str) -> ComponentError {
    ComponentError::invalid(ComponentKind::Scheduler, &spec.name, reason)
}

// ─── StepLR ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepSettings {
    step_size: usize,
    #[serde(default = "default_step_gamma")]
    gamma:     f64,
}

fn default_step_gamma() -> f64 { 0.1 }

fn step_lr(spec: &ComponentSpec, ctx: ScheduleContext) -> Result<Box<dyn LrScheduler>, ComponentError> {
    let s: StepSettings = spec.settings_as(ComponentKind::Scheduler)?;
    let scheduler = StepLrSchedulerConfig::new(ctx.base_lr, s.step_size)
        .with_gamma(s.gamma)
        .init()
        .map_err(|reason| invalid(spec, &reason))?;
    Ok(BurnSchedule::boxed(scheduler))
}

// ─── ExponentialLR ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExponentialSettings {
    gamma: f64,
}

fn exponential_lr(spec: &ComponentSpec, ctx: ScheduleContext) -> Result<Box<dyn LrScheduler>, ComponentError> {
    let s: ExponentialSettings = spec.settings_as(ComponentKind::Scheduler)?;
    let scheduler = ExponentialLrSchedulerConfig::new(ctx.base_lr, s.gamma)
        .init()
        .map_err(|reason| invalid(spec, &reason))?;
    Ok(BurnSchedule::boxed(scheduler))
}

// ─── CosineAnnealingLR ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CosineSettings {
    #[serde(default)]
    t_max:   Option<usize>,
    #[serde(default)]
    eta_min: f64,
}

fn cosine_annealing_lr(spec: &ComponentSpec, ctx: ScheduleContext) -> Result<Box<dyn LrScheduler>, ComponentError> {
    let s: CosineSettings = spec.settings_as(ComponentKind::Scheduler)?;
    let t_max = s.t_max.unwrap_or_else(|| ctx.total_steps());
    let scheduler = CosineAnnealingLrSchedulerConfig::new(ctx.base_lr, t_max)
        .with_min_lr(s.eta_min)
        .init()
        .map_err(|reason| invalid(spec, &reason))?;
    Ok(BurnSchedule::boxed(scheduler))
}

// ─── OneCycleLR ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OneCycleSettings {
    /// Peak rate; defaults to the optimizer's lr
    #[serde(default)]
    max_lr:           Option<f64>,
    #[serde(default = "default_pct_start")]
    pct_start:        f64,
    #[serde(default = "default_div_factor")]
    div_factor:       f64,
    #[serde(default = "default_final_div_factor")]
    final_div_factor: f64,
    #[serde(default)]
    total_steps:      Option<usize>,
}

fn default_pct_start()        -> f64 { 0.3 }
fn default_div_factor()       -> f64 { 25.0 }
fn default_final_div_factor() -> f64 { 1e4 }

fn one_cycle_lr(spec: &ComponentSpec, ctx: ScheduleContext) -> Result<Box<dyn LrScheduler>, ComponentError> {
    let s: OneCycleSettings = spec.settings_as(ComponentKind::Scheduler)?;
    if !(s.pct_start > 0.0 && s.pct_start < 1.0) {
        return Err(invalid(spec, "pct_start must be in (0, 1)"));
    }
    if s.div_factor <= 0.0 || s.final_div_factor <= 0.0 {
        return Err(invalid(spec, "div factors must be > 0"));
    }

    let total   = s.total_steps.unwrap_or_else(|| ctx.total_steps()).max(2);
    let max_lr  = s.max_lr.unwrap_or(ctx.base_lr);
    let initial = max_lr / s.div_factor;
    let min_lr  = initial / s.final_div_factor;
    // Last index of the warm-up phase and of the whole schedule.
    let peak    = ((s.pct_start * total as f64).round() as usize).clamp(1, total - 1);
    let last    = total - 1;

    let anneal = |from: f64, to: f64, progress: f64| to + (from - to) * 0.5 * (1.0 + (PI * progress).cos());

    Ok(FnSchedule::boxed(move |t| {
        if t <= peak {
            anneal(initial, max_lr, t as f64 / peak as f64)
        } else {
            let progress = ((t - peak) as f64 / (last - peak).max(1) as f64).min(1.0);
            anneal(max_lr, min_lr, progress)
        }
    }))
}
