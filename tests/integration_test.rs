// tests/integration_test.rs
use approx::{assert_abs_diff_eq, assert_relative_eq};
use chrono::{Duration, NaiveDate};
use dupire_mc::analytics::bs_analytic::{bs_call_price, bs_price, bs_put_price};
use dupire_mc::analytics::implied_vol::{implied_volatility, solve, IvOutcome, RejectReasons, SolverConfig};
use dupire_mc::chain::{
    annotate_implied_vols, is_eligible, median_implied_vol, ChainCache, ChainKey, ContractRow,
    ExerciseStyle, MarketSnapshot,
};
use dupire_mc::mc::mc_engine::{simulate, McConfig, VolSource};
use dupire_mc::mc::payoffs::{fixing_average, Payoff};
use dupire_mc::surface::anomaly::gradient_anomalies;
use dupire_mc::surface::IvPoint;
use dupire_mc::{LocalVolSurface, OptionQuote, OptionType, PricerError, SurfaceConfig, VolSurfaceGrid};
use ndarray::Array2;
use std::sync::Arc;

const STRIKES: [f64; 5] = [80.0, 90.0, 100.0, 110.0, 120.0];
const MATURITY_DAYS: [f64; 5] = [30.0, 60.0, 90.0, 120.0, 150.0];

fn flat_grid(vol: f64) -> VolSurfaceGrid {
    VolSurfaceGrid::from_axes(&STRIKES, &MATURITY_DAYS, Array2::from_elem((5, 5), vol)).unwrap()
}

fn flat_surface(vol: f64) -> LocalVolSurface {
    LocalVolSurface::build(&flat_grid(vol), 100.0, 0.05, 0.0, &SurfaceConfig::default()).unwrap()
}

#[test]
fn test_known_benchmark_call_price() {
    let price = bs_call_price(100.0, 100.0, 1.0, 0.05, 0.0, 0.2);
    assert_abs_diff_eq!(price, 10.4506, epsilon = 1e-4);
}

#[test]
fn test_put_call_parity_with_dividends() {
    let s = 100.0;
    let r = 0.05;
    let mut max_error: f64 = 0.0;

    for &k in &[80.0, 100.0, 120.0] {
        for &t in &[0.1, 0.5, 2.0] {
            for &sigma in &[0.1, 0.3, 0.8] {
                for &d in &[0.0, 0.02, 0.05] {
                    let call = bs_call_price(s, k, t, r, d, sigma);
                    let put = bs_put_price(s, k, t, r, d, sigma);
                    let forward_gap = s * (-d * t).exp() - k * (-r * t).exp();
                    let error = (call - put - forward_gap).abs();
                    max_error = max_error.max(error);
                    assert!(
                        error < 1e-5,
                        "parity broken at K={}, T={}, sigma={}, d={}: error {}",
                        k, t, sigma, d, error
                    );
                }
            }
        }
    }
    println!("\nMax put-call parity error: {:.2e}", max_error);
}

#[test]
fn test_implied_vol_round_trip() {
    let fair = bs_call_price(100.0, 100.0, 1.0, 0.05, 0.0, 0.25);
    let quote = OptionQuote::new(100.0, 0.0, fair, 100.0, 1.0, 0.05, OptionType::Call).unwrap();
    let recovered = implied_volatility(&quote, 0.1, &SolverConfig::default());
    assert_abs_diff_eq!(recovered, 0.25, epsilon = 1e-4);
}

#[test]
fn test_arbitrage_price_is_undefined() {
    let quote = OptionQuote::new(100.0, 0.0, 105.0, 100.0, 1.0, 0.05, OptionType::Call).unwrap();
    let cfg = SolverConfig::default();
    assert!(implied_volatility(&quote, 0.1, &cfg).is_nan());
    match solve(&quote, 0.1, &cfg) {
        IvOutcome::Rejected(reasons) => assert!(reasons.contains(RejectReasons::ABOVE_UPPER_BOUND)),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[test]
fn test_flat_surface_dupire_identity() {
    let lv = flat_surface(0.2);
    let raw = lv.raw();
    for i in 1..4 {
        for j in 1..4 {
            assert_abs_diff_eq!(raw[[i, j]], 0.2, epsilon = 0.01);
        }
    }
    assert_abs_diff_eq!(lv.local_vol(100.0, 90.0 / 365.0), 0.2, epsilon = 0.01);
    assert_abs_diff_eq!(lv.local_vol(95.0, 0.2), 0.2, epsilon = 0.01);
}

/// Gatheral local variance for the total variance `w(y, T) = T (a + b y²)`.
fn quadratic_smile_local_variance(a: f64, b: f64, y: f64, t: f64) -> f64 {
    let w = t * (a + b * y * y);
    let dw_dy = 2.0 * b * t * y;
    let d2w_dy2 = 2.0 * b * t;
    let dw_dt = a + b * y * y;
    let denom = 1.0 - (y / w) * dw_dy
        + 0.25 * (-0.25 - 1.0 / w + y * y / (w * w)) * dw_dy * dw_dy
        + 0.5 * d2w_dy2;
    dw_dt / denom
}

/// Skewed surface with r != q exercises the carry correction and every
/// log-moneyness term of the denominator.
#[test]
fn test_skewed_surface_matches_closed_form_local_vol() {
    let (a, b) = (0.04, 0.3);
    let (spot, r, q) = (100.0, 0.05, 0.01);
    let strikes: Vec<f64> = (0..121).map(|i| 70.0 + 0.5 * i as f64).collect();
    let days: Vec<f64> = (0..41).map(|j| 30.0 + 10.0 * j as f64).collect();
    let log_moneyness = |k: f64, t: f64| (k / (spot * ((r - q) * t).exp())).ln();

    let vols = Array2::from_shape_fn((strikes.len(), days.len()), |(i, j)| {
        let y = log_moneyness(strikes[i], days[j] / 365.0);
        (a + b * y * y).sqrt()
    });
    let grid = VolSurfaceGrid::from_axes(&strikes, &days, vols).unwrap();
    let lv = LocalVolSurface::build(&grid, spot, r, q, &SurfaceConfig::default()).unwrap();

    // the outer two strike rows and the first/last maturity use one-sided differences
    let mut max_error: f64 = 0.0;
    for i in 2..strikes.len() - 2 {
        for j in 1..days.len() - 1 {
            let t = days[j] / 365.0;
            let expected = quadratic_smile_local_variance(a, b, log_moneyness(strikes[i], t), t).sqrt();
            let error = (lv.raw()[[i, j]] - expected).abs();
            max_error = max_error.max(error);
            assert!(
                error < 1e-5,
                "local vol at K={}, {} days: got {}, expected {}",
                strikes[i], days[j], lv.raw()[[i, j]], expected
            );
        }
    }
    println!("\nMax interior local vol error (skewed surface): {:.2e}", max_error);

    // dropping the carry term would shift the wings by far more than the tolerance
    let no_carry = quadratic_smile_local_variance(a, b, (strikes[20] / spot).ln(), days[20] / 365.0).sqrt();
    assert!((lv.raw()[[20, 20]] - no_carry).abs() > 1e-3);
}

/// With no strike dependence the local variance is the forward variance dw/dT.
#[test]
fn test_term_structure_local_variance_is_forward_variance() {
    let days: [f64; 8] = [30.0, 45.0, 60.0, 90.0, 120.0, 180.0, 270.0, 365.0];
    // implied variance a + c T, so w = a T + c T² and dw/dT = a + 2 c T
    let (a, c) = (0.04, 0.02);
    let vols = Array2::from_shape_fn((STRIKES.len(), days.len()), |(_, j)| (a + c * days[j] / 365.0).sqrt());
    let grid = VolSurfaceGrid::from_axes(&STRIKES, &days, vols).unwrap();
    let lv = LocalVolSurface::build(&grid, 100.0, 0.05, 0.01, &SurfaceConfig::default()).unwrap();

    for i in 0..STRIKES.len() {
        for j in 1..days.len() - 1 {
            let t = days[j] / 365.0;
            assert_abs_diff_eq!(lv.raw()[[i, j]], (a + 2.0 * c * t).sqrt(), epsilon = 1e-9);
        }
    }
    assert_eq!(lv.diagnostics().fallback_cells, 0);
}

#[test]
fn test_nan_hole_is_filled() {
    let mut vols = Array2::from_elem((5, 5), 0.2);
    vols[[2, 2]] = f64::NAN;
    let grid = VolSurfaceGrid::from_axes(&STRIKES, &MATURITY_DAYS, vols).unwrap();
    let lv = LocalVolSurface::build(&grid, 100.0, 0.05, 0.0, &SurfaceConfig::default()).unwrap();

    assert!(lv.raw().iter().all(|v| !v.is_nan()));
    assert_abs_diff_eq!(lv.raw()[[2, 2]], 0.2, epsilon = 0.05);
    assert!(lv.diagnostics().filled_cells >= 1);
}

#[test]
fn test_queries_outside_grid_are_clamped() {
    let lv = flat_surface(0.2);
    let queries = [
        (1e6, 0.2),
        (1e-3, 0.2),
        (100.0, 50.0),
        (100.0, -1.0),
        (0.0, 0.0),
        (f64::INFINITY, f64::INFINITY),
    ];
    for (strike, time) in queries {
        let v = lv.local_vol(strike, time);
        assert!(v.is_finite(), "lookup at ({}, {}) gave {}", strike, time, v);
    }
    assert_eq!(lv.local_vol(1e6, 50.0), lv.raw()[[4, 4]]);
    assert_eq!(lv.local_vol(1e-3, -1.0), lv.raw()[[0, 0]]);
}

#[test]
fn test_zero_volatility_drift() {
    let cfg = McConfig {
        s0: 100.0,
        r: 0.05,
        payoff: Payoff::asian(OptionType::Call, 100.0),
        path_length: 30,
        iterations: 1000,
        vol: VolSource::Constant(1e-5),
        ..Default::default()
    };
    let result = simulate(&cfg).unwrap();
    let expected = 100.0 * (0.05f64 * 30.0 / 252.0).exp();
    assert_relative_eq!(result.mean_final_price, expected, max_relative = 1e-4);
}

#[test]
fn test_asian_averaging_reconstruction() {
    let cfg = McConfig {
        s0: 100.0,
        r: 0.05,
        payoff: Payoff::asian(OptionType::Call, 50.0),
        path_length: 10,
        iterations: 100,
        vol: VolSource::Constant(0.2),
        ..Default::default()
    };
    let result = simulate(&cfg).unwrap();
    assert_eq!(result.paths.nrows(), 100);

    let mean_payoff = result
        .paths
        .rows()
        .into_iter()
        .map(|row| {
            let path = row.to_vec();
            (fixing_average(&path) - 50.0).max(0.0)
        })
        .sum::<f64>()
        / 100.0;
    let reconstructed = mean_payoff * (-0.05f64 * 10.0 / 252.0).exp();

    assert_abs_diff_eq!(reconstructed, result.price, epsilon = 1e-5);
}

#[test]
fn test_price_invariant_to_worker_count() {
    let cfg = McConfig {
        iterations: 2_000,
        path_length: 21,
        ..Default::default()
    };

    let run_on = |threads: usize| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
            .install(|| simulate(&cfg).unwrap())
    };

    let single = run_on(1);
    let many = run_on(4);
    assert_eq!(single.price, many.price);
    assert_eq!(single.std_error, many.std_error);
    assert_eq!(single.itm_probability, many.itm_probability);
}

#[test]
fn test_archive_cap_does_not_change_price() {
    let base = McConfig {
        iterations: 1_000,
        ..Default::default()
    };
    let small = McConfig {
        max_archived_paths: 5,
        ..base.clone()
    };

    let full = simulate(&base).unwrap();
    let capped = simulate(&small).unwrap();
    assert_eq!(full.paths.nrows(), 200);
    assert_eq!(capped.paths.nrows(), 5);
    assert_eq!(full.price, capped.price);
    assert_eq!(full.payoffs, capped.payoffs);
}

#[test]
fn test_flat_surface_simulation_matches_constant_vol() {
    let surface = Arc::new(flat_surface(0.2));
    let constant = McConfig {
        s0: 100.0,
        r: 0.05,
        path_length: 60,
        iterations: 2_000,
        vol: VolSource::Constant(0.2),
        ..Default::default()
    };
    let local = McConfig {
        vol: VolSource::Surface(Arc::clone(&surface)),
        ..constant.clone()
    };

    let a = simulate(&constant).unwrap();
    let b = simulate(&local).unwrap();
    assert_relative_eq!(a.price, b.price, max_relative = 1e-6);
}

#[test]
fn test_european_monte_carlo_vs_black_scholes() {
    let cfg = McConfig {
        s0: 100.0,
        r: 0.05,
        payoff: Payoff::european(OptionType::Call, 100.0),
        path_length: 252,
        iterations: 20_000,
        vol: VolSource::Constant(0.2),
        seed: 42,
        max_archived_paths: 0,
        ..Default::default()
    };
    let result = simulate(&cfg).unwrap();
    let analytic = bs_price(OptionType::Call, 100.0, 100.0, 1.0, 0.05, 0.0, 0.2);

    let abs_error = (result.price - analytic).abs();
    println!("\nMC Price: {}", result.price);
    println!("Analytic Price: {}", analytic);
    println!("Standard Error: {}", result.std_error);

    assert!(result.paths.is_empty());
    assert!(
        abs_error < 4.0 * result.std_error,
        "MC price {} more than 4 standard errors from {}",
        result.price,
        analytic
    );
}

fn synthetic_chain(valuation: NaiveDate, market: &MarketSnapshot, vol: f64) -> Vec<ContractRow> {
    let mut rows = Vec::new();
    for days in [30, 60, 90, 120] {
        let expiry = valuation + Duration::days(days);
        let t = days as f64 / 365.0;
        for strike in [75.0, 80.0, 85.0, 90.0, 95.0, 105.0, 110.0, 115.0, 120.0, 125.0] {
            let option_type = if strike < market.spot {
                OptionType::Put
            } else {
                OptionType::Call
            };
            let price = bs_price(
                option_type,
                market.spot,
                strike,
                t,
                market.rate,
                market.dividend_yield,
                vol,
            );
            rows.push(ContractRow {
                symbol: format!("TEST{}{}{}", days, option_type, strike),
                underlying: "TEST".to_string(),
                strike,
                close_price: price,
                expiration_date: expiry,
                option_type,
                style: ExerciseStyle::American,
                open_interest: 100,
                size: 100,
            });
        }
    }
    rows
}

#[test]
fn test_chain_to_asian_price_pipeline() {
    let valuation = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
    let market = MarketSnapshot::new(100.0, 0.01, 0.035).unwrap();

    let mut cache: ChainCache<Vec<ContractRow>> = ChainCache::new();
    let key = ChainKey::new(["TEST"], 1000);
    let rows = cache
        .get_or_try_load(&key, |_| Ok::<_, PricerError>(synthetic_chain(valuation, &market, 0.25)))
        .unwrap();

    let eligible: Vec<ContractRow> = rows
        .iter()
        .filter(|row| is_eligible(row, market.spot))
        .cloned()
        .collect();
    assert!(eligible.len() >= 8);

    let priced = annotate_implied_vols(&eligible, &market, valuation, &SolverConfig::default()).unwrap();
    assert!(priced.len() >= 8);
    for contract in &priced {
        assert_abs_diff_eq!(contract.implied_vol, 0.25, epsilon = 1e-3);
    }
    assert_abs_diff_eq!(median_implied_vol(&priced).unwrap(), 0.25, epsilon = 1e-3);

    let points: Vec<IvPoint> = priced.iter().map(|c| c.iv_point()).collect();
    let grid = VolSurfaceGrid::from_scattered(&points, 5).unwrap();
    assert_eq!(grid.shape(), (5, 5));
    assert!(!gradient_anomalies(grid.implied_vols(), 0.05).iter().any(|&flag| flag));

    let surface = LocalVolSurface::build(
        &grid,
        market.spot,
        market.rate,
        market.dividend_yield,
        &SurfaceConfig::default(),
    )
    .unwrap();
    assert_abs_diff_eq!(surface.local_vol(100.0, 60.0 / 365.0), 0.25, epsilon = 0.02);

    let cfg = McConfig {
        s0: market.spot,
        r: market.rate,
        payoff: Payoff::asian(OptionType::Put, 100.0),
        path_length: 30,
        iterations: 2_000,
        vol: surface.into(),
        ..Default::default()
    };
    let result = simulate(&cfg).unwrap();
    assert!(result.price.is_finite() && result.price > 0.0);
    assert!(result.itm_probability > 0.0 && result.itm_probability < 1.0);

    // a second request for the same chain comes from the cache
    let again = cache
        .get_or_try_load(&key, |_| Err(PricerError::InvalidGrid { reason: "unreachable".into() }))
        .unwrap();
    assert!(Arc::ptr_eq(&rows, &again));
}
