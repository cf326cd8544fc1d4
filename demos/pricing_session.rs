// demos/pricing_session.rs
//! End-to-end session on a synthetic chain: implied vols, local volatility
//! surface, Asian option prices, CSV diagnostics.
//!
//! Run with `RUST_LOG=dupire_mc=debug cargo run --example pricing_session`.

use chrono::{Duration, Local, NaiveDate};
use dupire_mc::analytics::bs_analytic;
use dupire_mc::analytics::implied_vol::SolverConfig;
use dupire_mc::chain::{
    annotate_implied_vols, is_eligible, median_implied_vol, ChainCache, ChainKey, ContractRow,
    ExerciseStyle, MarketSnapshot,
};
use dupire_mc::math_utils::Timer;
use dupire_mc::mc::mc_engine::{simulate, McConfig, VolSource};
use dupire_mc::mc::payoffs::Payoff;
use dupire_mc::output;
use dupire_mc::surface::anomaly::gradient_anomalies;
use dupire_mc::surface::IvPoint;
use dupire_mc::{LocalVolSurface, OptionType, PricerResult, SurfaceConfig, VolSurfaceGrid};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const SYMBOL: &str = "DEMO";

/// Skewed smile with a mild term structure
fn smile(spot: f64, strike: f64, years: f64) -> f64 {
    let x = (strike / spot).ln();
    0.22 - 0.15 * x + 0.6 * x * x + 0.02 * years.sqrt()
}

fn listed_chain(market: &MarketSnapshot, valuation: NaiveDate) -> Vec<ContractRow> {
    let mut rows = Vec::new();
    for days in [14, 30, 45, 60, 90, 120, 180, 270, 365] {
        let expiration_date = valuation + Duration::days(days);
        let years = days as f64 / 365.0;
        for step in -12..=12 {
            let strike = market.spot + 2.5 * step as f64;
            for option_type in [OptionType::Call, OptionType::Put] {
                let close_price = bs_analytic::bs_price(
                    option_type,
                    market.spot,
                    strike,
                    years,
                    market.rate,
                    market.dividend_yield,
                    smile(market.spot, strike, years),
                );
                rows.push(ContractRow {
                    symbol: format!("{}{}{}{}", SYMBOL, days, option_type, strike),
                    underlying: SYMBOL.to_string(),
                    strike,
                    close_price: (close_price * 100.0).round() / 100.0,
                    expiration_date,
                    option_type,
                    style: ExerciseStyle::American,
                    open_interest: 500,
                    size: 100,
                });
            }
        }
    }
    rows
}

fn main() -> PricerResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Running dupire-mc pricing session\n");

    let valuation = Local::now().date_naive();
    let market = MarketSnapshot::from_annual_dividend(100.0, 1.2, 0.035)?;
    let solver = SolverConfig::default();

    // --- Chain Loading ---
    println!("--- Chain Loading ---");
    let mut cache: ChainCache<Vec<ContractRow>> = ChainCache::new();
    let key = ChainKey::new([SYMBOL], 1000);
    let chain = cache.get_or_try_load(&key, |_| Ok::<_, dupire_mc::PricerError>(listed_chain(&market, valuation)))?;
    let eligible: Vec<ContractRow> = chain
        .iter()
        .filter(|row| is_eligible(row, market.spot))
        .cloned()
        .collect();
    println!("Contracts listed: {}, eligible: {}\n", chain.len(), eligible.len());

    // --- Implied Volatility ---
    println!("--- Implied Volatility ---");
    let mut timer = Timer::new();
    let priced = annotate_implied_vols(&eligible, &market, valuation, &solver)?;
    println!(
        "Solved {} of {} contracts ({:.2} ms)",
        priced.len(),
        eligible.len(),
        timer.elapsed_ms()
    );
    let median_vol = median_implied_vol(&priced).unwrap_or(solver.initial_guess);
    println!("Median implied volatility: {:.4}\n", median_vol);

    // --- Local Volatility Surface ---
    println!("--- Local Volatility Surface ---");
    timer.start();
    let points: Vec<IvPoint> = priced.iter().map(|c| c.iv_point()).collect();
    let grid = VolSurfaceGrid::from_scattered(&points, 20)?;
    let surface = Arc::new(LocalVolSurface::build(
        &grid,
        market.spot,
        market.rate,
        market.dividend_yield,
        &SurfaceConfig::default(),
    )?);
    let diagnostics = surface.diagnostics();
    println!(
        "Grid {:?} built in {:.2} ms ({} fallback cells, {} filled cells)",
        grid.shape(),
        timer.elapsed_ms(),
        diagnostics.fallback_cells,
        diagnostics.filled_cells
    );
    let anomalies = gradient_anomalies(grid.implied_vols(), 0.05).iter().filter(|&&f| f).count();
    println!("Implied vol anomalies above threshold: {}", anomalies);
    for (strike, days) in [(90.0, 30.0), (100.0, 90.0), (110.0, 180.0)] {
        println!(
            "  local vol at K={:>6.1}, {:>3} days: {:.4}",
            strike,
            days,
            surface.local_vol(strike, days / 365.0)
        );
    }
    println!();

    // --- Asian Option Pricing ---
    println!("--- Asian Option Pricing ---");
    let base = McConfig {
        s0: market.spot,
        r: market.rate,
        payoff: Payoff::asian(OptionType::Call, 100.0),
        path_length: 30,
        iterations: 50_000,
        seed: 12345,
        ..Default::default()
    };

    for (label, vol) in [
        ("constant median vol", VolSource::Constant(median_vol)),
        ("local vol surface", VolSource::Surface(Arc::clone(&surface))),
    ] {
        let cfg = McConfig { vol, ..base.clone() };
        timer.start();
        let result = simulate(&cfg)?;
        let elapsed = timer.elapsed_ms();
        println!(
            "Asian call ({}): {:.4} ± {:.4} ({:.2} ms, ITM {:.1}%)",
            label,
            result.price,
            result.std_error,
            elapsed,
            100.0 * result.itm_probability
        );
        println!(
            "Throughput: {:.2} paths/sec",
            cfg.iterations as f64 / (elapsed / 1000.0)
        );

        if matches!(cfg.vol, VolSource::Surface(_)) {
            // --- CSV Output ---
            let out_dir = Path::new("results");
            std::fs::create_dir_all(out_dir)?;
            output::write_paths_csv(out_dir.join("asian_paths.csv"), &result.paths)?;
            output::write_grid_csv(
                out_dir.join("local_vol.csv"),
                surface.strikes(),
                &grid.maturity_axis(),
                surface.raw(),
            )?;
            output::write_summary_csv(
                out_dir.join("asian_summary.csv"),
                &[
                    ("price", format!("{:.6}", result.price)),
                    ("std_error", format!("{:.6}", result.std_error)),
                    ("mean_final_price", format!("{:.6}", result.mean_final_price)),
                    ("archived_paths", result.paths.nrows().to_string()),
                ],
            )?;
            println!("Diagnostics written to {}", out_dir.display());
        }
    }

    Ok(())
}
