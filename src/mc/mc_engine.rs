// src/mc/mc_engine.rs
use crate::error::{validation::*, PricerResult};
use crate::math_utils::Timer;
use crate::mc::payoffs::Payoff;
use crate::rng::{self, RngFactory};
use crate::surface::LocalVolSurface;
use ndarray::Array2;
use rand::Rng;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Volatility driving the simulated paths
#[derive(Debug, Clone)]
pub enum VolSource {
    /// Same σ at every step
    Constant(f64),
    /// σ(t, S_t) looked up on a local volatility surface, clamped to its grid
    Surface(Arc<LocalVolSurface>),
}

impl VolSource {
    /// Volatility at elapsed time `t` (years) and price `s`
    #[inline]
    pub fn sigma(&self, t: f64, s: f64) -> f64 {
        match self {
            VolSource::Constant(sigma) => *sigma,
            VolSource::Surface(surface) => surface.local_vol(s, t),
        }
    }

    pub fn validate(&self) -> PricerResult<()> {
        match self {
            VolSource::Constant(sigma) => {
                validate_non_negative("sigma", *sigma)?;
                validate_finite("sigma", *sigma)
            }
            VolSource::Surface(_) => Ok(()),
        }
    }
}

impl From<f64> for VolSource {
    fn from(sigma: f64) -> Self {
        VolSource::Constant(sigma)
    }
}

impl From<Arc<LocalVolSurface>> for VolSource {
    fn from(surface: Arc<LocalVolSurface>) -> Self {
        VolSource::Surface(surface)
    }
}

impl From<LocalVolSurface> for VolSource {
    fn from(surface: LocalVolSurface) -> Self {
        VolSource::Surface(Arc::new(surface))
    }
}

#[derive(Debug, Clone)]
pub struct McConfig {
    pub s0: f64,
    pub r: f64,
    pub payoff: Payoff,
    /// Number of daily steps per path
    pub path_length: usize,
    pub iterations: usize,
    pub vol: VolSource,
    pub seed: u64,
    /// Paths kept in the result for inspection; never affects the price
    pub max_archived_paths: usize,
    /// Spread iterations over the rayon pool
    pub parallel: bool,
    pub trading_days_per_year: f64,
}

impl McConfig {
    /// Validate the Monte Carlo configuration
    pub fn validate(&self) -> PricerResult<()> {
        validate_iterations(self.iterations)?;
        validate_path_length(self.path_length)?;
        validate_positive("s0", self.s0)?;
        validate_finite("s0", self.s0)?;
        validate_finite("r", self.r)?;
        validate_positive("strike", self.payoff.strike())?;
        validate_positive("trading_days_per_year", self.trading_days_per_year)?;
        self.vol.validate()?;
        Ok(())
    }

    /// Step size in years
    pub fn dt(&self) -> f64 {
        1.0 / self.trading_days_per_year
    }

    /// Path horizon in years, `path_length / trading_days_per_year`
    pub fn horizon(&self) -> f64 {
        self.path_length as f64 / self.trading_days_per_year
    }
}

impl Default for McConfig {
    fn default() -> Self {
        McConfig {
            s0: 100.0,
            r: 0.035,
            payoff: Payoff::AsianCall { k: 100.0 },
            path_length: 30,
            iterations: 1000,
            vol: VolSource::Constant(0.2),
            seed: 12345,
            max_archived_paths: 200,
            parallel: true,
            trading_days_per_year: 252.0,
        }
    }
}

/// Output of one pricing run
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Discounted mean payoff over every iteration
    pub price: f64,
    /// Standard error of `price`
    pub std_error: f64,
    pub discount_factor: f64,
    /// Undiscounted payoff of every iteration, in iteration order
    pub payoffs: Vec<f64>,
    /// The first `max_archived_paths` paths, one per row, seed price in column 0
    pub paths: Array2<f64>,
    /// Share of iterations whose terminal price finished in the money
    pub itm_probability: f64,
    pub mean_final_price: f64,
}

struct PathOutcome {
    payoff: f64,
    terminal: f64,
    archived: Option<Vec<f64>>,
}

/// Walk one path of `cfg.path_length` daily steps
///
/// # Math Framework
///
/// Log-Euler step of the risk-neutral SDE `dS = r S dt + σ(t, S) S dW`:
/// ```text
/// S_{t+Δt} = S_t * exp((r - σ²/2)Δt + σ√Δt * Z)
/// ```
/// with `σ = σ(t, S_t)` frozen over the step and `Z ~ N(0,1)` drawn per step.
/// For a constant σ this is the exact GBM transition.
pub fn walk_path<R: Rng + ?Sized>(cfg: &McConfig, rng: &mut R) -> Vec<f64> {
    let dt = cfg.dt();
    let sqrt_dt = dt.sqrt();

    let mut path = Vec::with_capacity(cfg.path_length + 1);
    path.push(cfg.s0);

    let mut current_s = cfg.s0;
    for step in 0..cfg.path_length {
        let t = step as f64 * dt;
        let sigma = cfg.vol.sigma(t, current_s);
        let z = rng::get_normal_draw(rng);
        current_s *= ((cfg.r - 0.5 * sigma * sigma) * dt + sigma * sqrt_dt * z).exp();
        path.push(current_s);
    }
    path
}

/// Monte Carlo price of `cfg.payoff`
///
/// # Algorithm
///
/// 1. Iteration `i` walks one path with its own generator seeded from
///    `seed + i`, so a path's draws never depend on which worker runs it.
/// 2. Outcomes are collected in iteration order and reduced sequentially,
///    making the price independent of the number of threads.
/// 3. `price = e^(-r·path_length/252) · mean(payoffs)`
///
/// Only the first `max_archived_paths` paths are kept; statistics always use
/// every iteration.
///
/// # Errors
///
/// Only an invalid configuration is an error. A non-finite estimate is
/// returned as is and logged at `warn`.
pub fn simulate(cfg: &McConfig) -> PricerResult<SimulationResult> {
    cfg.validate()?;
    let timer = Timer::new();

    let n = cfg.iterations;
    let factory = RngFactory::new(cfg.seed);
    let discount = (-cfg.r * cfg.horizon()).exp();

    let run = |i: usize| {
        let mut rng = factory.create_std_rng(i as u64);
        let path = walk_path(cfg, &mut rng);
        let terminal = path[path.len() - 1];
        let payoff = cfg.payoff.calculate(&path);
        trace!(iteration = i, payoff, terminal, "path complete");
        PathOutcome {
            payoff,
            terminal,
            archived: (i < cfg.max_archived_paths).then_some(path),
        }
    };

    let outcomes: Vec<PathOutcome> = if cfg.parallel {
        (0..n).into_par_iter().map(run).collect()
    } else {
        (0..n).map(run).collect()
    };

    let mut payoffs = Vec::with_capacity(n);
    let mut archive = Vec::with_capacity(cfg.max_archived_paths.min(n));
    let mut sum_payoff = 0.0;
    let mut sum_payoff_sq = 0.0;
    let mut sum_terminal = 0.0;
    let mut itm_count = 0usize;
    for outcome in outcomes {
        sum_payoff += outcome.payoff;
        sum_payoff_sq += outcome.payoff * outcome.payoff;
        sum_terminal += outcome.terminal;
        if cfg.payoff.in_the_money(outcome.terminal) {
            itm_count += 1;
        }
        payoffs.push(outcome.payoff);
        if let Some(path) = outcome.archived {
            archive.push(path);
        }
    }

    let n_f = n as f64;
    let mean_payoff = sum_payoff / n_f;
    let price = discount * mean_payoff;

    let std_error = if n > 1 {
        let sample_var = ((sum_payoff_sq - n_f * mean_payoff * mean_payoff) / (n_f - 1.0)).max(0.0);
        discount * (sample_var / n_f).sqrt()
    } else {
        0.0
    };

    // a blown-up path poisons the mean; report it but keep the batch
    if !price.is_finite() {
        warn!(price, "Monte Carlo price estimate is not finite");
    }

    let columns = cfg.path_length + 1;
    let paths = Array2::from_shape_fn((archive.len(), columns), |(i, j)| archive[i][j]);

    debug!(
        iterations = n,
        path_length = cfg.path_length,
        price,
        std_error,
        elapsed_ms = timer.elapsed_ms(),
        "Monte Carlo pricing complete"
    );

    Ok(SimulationResult {
        price,
        std_error,
        discount_factor: discount,
        payoffs,
        paths,
        itm_probability: itm_count as f64 / n_f,
        mean_final_price: sum_terminal / n_f,
    })
}
