// scripts/benchmark.rs
use dupire_mc::analytics::bs_analytic;
use dupire_mc::analytics::implied_vol::{implied_volatility, SolverConfig};
use dupire_mc::math_utils::Timer;
use dupire_mc::mc::mc_engine::{simulate, McConfig, VolSource};
use dupire_mc::mc::payoffs::Payoff;
use dupire_mc::{LocalVolSurface, OptionQuote, OptionType, PricerResult, SurfaceConfig, VolSurfaceGrid};
use ndarray::Array2;
use rayon::prelude::*;
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::Command;
use std::sync::Arc;

#[derive(Debug)]
struct SystemInfo {
    os: String,
    cpu_cores: usize,
    rust_version: String,
    rustc_flags: String,
    rayon_threads: usize,
}

impl SystemInfo {
    fn gather() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            cpu_cores: num_cpus::get(),
            rust_version: Self::get_rust_version(),
            rustc_flags: env::var("RUSTFLAGS").unwrap_or_else(|_| "default".to_string()),
            rayon_threads: rayon::current_num_threads(),
        }
    }

    fn get_rust_version() -> String {
        Command::new("rustc")
            .arg("--version")
            .output()
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
            .unwrap_or_else(|_| "Unknown Rust version".to_string())
    }
}

#[derive(Debug)]
struct BenchmarkResult {
    name: String,
    /// Quotes solved, grid cells built or paths simulated
    units: usize,
    time_ms: f64,
    throughput_per_sec: f64,
    value: f64,
    reference_value: Option<f64>,
}

impl BenchmarkResult {
    fn new(name: String, units: usize, time_ms: f64, value: f64, reference_value: Option<f64>) -> Self {
        Self {
            name,
            units,
            time_ms,
            throughput_per_sec: units as f64 / (time_ms / 1000.0),
            value,
            reference_value,
        }
    }

    fn relative_error(&self) -> Option<f64> {
        self.reference_value
            .map(|reference| (self.value - reference).abs() / reference.abs())
    }
}

fn smile(strike: f64, years: f64) -> f64 {
    let x = (strike / 100.0).ln();
    0.2 - 0.1 * x + 0.5 * x * x + 0.03 * years.sqrt()
}

fn run_implied_vol_benchmarks() -> PricerResult<Vec<BenchmarkResult>> {
    let cfg = SolverConfig::default();
    let mut quotes = Vec::new();
    for i in 0..100 {
        let strike = 60.0 + 0.8 * i as f64;
        for days in [14.0, 30.0, 60.0, 90.0, 180.0, 365.0, 730.0] {
            let t = days / 365.0;
            let option_type = if strike < 100.0 { OptionType::Put } else { OptionType::Call };
            let price = bs_analytic::bs_price(option_type, 100.0, strike, t, 0.04, 0.01, smile(strike, t));
            quotes.push(OptionQuote::new(100.0, 0.01, price, strike, t, 0.04, option_type)?);
        }
    }

    println!("Solving {} quotes...", quotes.len());
    let mut results = Vec::new();

    let timer = Timer::new();
    let solved: Vec<f64> = quotes
        .iter()
        .map(|q| implied_volatility(q, cfg.initial_guess, &cfg))
        .collect();
    let defined = solved.iter().filter(|v| !v.is_nan()).count();
    results.push(BenchmarkResult::new(
        "Implied Vol (sequential)".to_string(),
        quotes.len(),
        timer.elapsed_ms(),
        defined as f64,
        Some(quotes.len() as f64),
    ));

    let timer = Timer::new();
    let solved: Vec<f64> = quotes
        .par_iter()
        .map(|q| implied_volatility(q, cfg.initial_guess, &cfg))
        .collect();
    let defined = solved.iter().filter(|v| !v.is_nan()).count();
    results.push(BenchmarkResult::new(
        "Implied Vol (rayon)".to_string(),
        quotes.len(),
        timer.elapsed_ms(),
        defined as f64,
        Some(quotes.len() as f64),
    ));

    Ok(results)
}

fn smile_grid(n: usize) -> PricerResult<VolSurfaceGrid> {
    let strikes: Vec<f64> = (0..n).map(|i| 70.0 + 60.0 * i as f64 / (n - 1) as f64).collect();
    let days: Vec<f64> = (0..n).map(|j| 14.0 + 716.0 * j as f64 / (n - 1) as f64).collect();
    let vols = Array2::from_shape_fn((n, n), |(i, j)| smile(strikes[i], days[j] / 365.0));
    VolSurfaceGrid::from_axes(&strikes, &days, vols)
}

fn run_surface_benchmarks() -> PricerResult<Vec<BenchmarkResult>> {
    let mut results = Vec::new();
    for n in [10, 25, 50, 100] {
        println!("Building {}x{} local volatility surface...", n, n);
        let grid = smile_grid(n)?;
        let timer = Timer::new();
        let surface = LocalVolSurface::build(&grid, 100.0, 0.04, 0.01, &SurfaceConfig::default())?;
        let time_ms = timer.elapsed_ms();
        results.push(BenchmarkResult::new(
            format!("Dupire Surface {}x{}", n, n),
            n * n,
            time_ms,
            surface.local_vol(100.0, 0.5),
            None,
        ));
    }
    Ok(results)
}

fn run_monte_carlo_benchmarks() -> PricerResult<Vec<BenchmarkResult>> {
    let mut results = Vec::new();
    let surface = Arc::new(LocalVolSurface::build(
        &smile_grid(25)?,
        100.0,
        0.04,
        0.01,
        &SurfaceConfig::default(),
    )?);

    for iterations in [10_000, 100_000, 1_000_000] {
        println!("Running Monte Carlo with {} iterations...", iterations);

        // Daily-stepped European call against its closed form
        let cfg = McConfig {
            s0: 100.0,
            r: 0.05,
            payoff: Payoff::european(OptionType::Call, 100.0),
            path_length: 252,
            iterations,
            vol: VolSource::Constant(0.2),
            seed: 42,
            ..Default::default()
        };
        let timer = Timer::new();
        let result = simulate(&cfg)?;
        results.push(BenchmarkResult::new(
            format!("European Call ({}k paths)", iterations / 1000),
            iterations,
            timer.elapsed_ms(),
            result.price,
            Some(bs_analytic::bs_call_price(100.0, 100.0, 1.0, 0.05, 0.0, 0.2)),
        ));

        let cfg = McConfig {
            payoff: Payoff::asian(OptionType::Call, 100.0),
            path_length: 30,
            vol: VolSource::Surface(Arc::clone(&surface)),
            r: 0.04,
            ..cfg
        };
        let timer = Timer::new();
        let result = simulate(&cfg)?;
        results.push(BenchmarkResult::new(
            format!("Asian Call Local Vol ({}k paths)", iterations / 1000),
            iterations,
            timer.elapsed_ms(),
            result.price,
            None,
        ));
    }
    Ok(results)
}

fn run_thread_scaling_benchmarks() -> PricerResult<Vec<BenchmarkResult>> {
    let mut results = Vec::new();
    let cfg = McConfig {
        iterations: 200_000,
        path_length: 63,
        ..Default::default()
    };

    let mut threads = 1;
    while threads <= num_cpus::get() {
        println!("Thread scaling: {} threads...", threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| dupire_mc::PricerError::InvalidConfiguration {
                field: "num_threads".to_string(),
                reason: e.to_string(),
            })?;
        let timer = Timer::new();
        let result = pool.install(|| simulate(&cfg))?;
        results.push(BenchmarkResult::new(
            format!("Asian Call {} threads", threads),
            cfg.iterations,
            timer.elapsed_ms(),
            result.price,
            None,
        ));
        threads *= 2;
    }
    Ok(results)
}

fn write_results_to_csv(
    results: &[BenchmarkResult],
    system_info: &SystemInfo,
    filename: &str,
) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(filename)?);

    // Write system information as comments
    writeln!(file, "# System Information")?;
    writeln!(file, "# OS: {}", system_info.os)?;
    writeln!(file, "# CPU Cores: {}", system_info.cpu_cores)?;
    writeln!(file, "# Rust Version: {}", system_info.rust_version)?;
    writeln!(file, "# RUSTFLAGS: {}", system_info.rustc_flags)?;
    writeln!(file, "# Rayon Threads: {}", system_info.rayon_threads)?;
    writeln!(
        file,
        "# Benchmark Date: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(file, "#")?;

    writeln!(
        file,
        "Benchmark,Units,Time_ms,Throughput_per_sec,Value,Reference_Value,Relative_Error"
    )?;

    for result in results {
        writeln!(
            file,
            "{},{},{:.2},{:.0},{:.6},{},{}",
            result.name,
            result.units,
            result.time_ms,
            result.throughput_per_sec,
            result.value,
            result
                .reference_value
                .map(|v| format!("{:.6}", v))
                .unwrap_or_else(|| "N/A".to_string()),
            result
                .relative_error()
                .map(|e| format!("{:.6}", e))
                .unwrap_or_else(|| "N/A".to_string())
        )?;
    }
    file.flush()?;

    println!("Results written to {}", filename);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("dupire-mc Benchmark Suite");
    println!("=========================\n");

    let system_info = SystemInfo::gather();
    println!("System Information:");
    println!("  OS: {}", system_info.os);
    println!("  CPU Cores: {}", system_info.cpu_cores);
    println!("  Rust Version: {}", system_info.rust_version);
    println!("  RUSTFLAGS: {}", system_info.rustc_flags);
    println!("  Rayon Threads: {}", system_info.rayon_threads);
    println!();

    let mut results = run_implied_vol_benchmarks()?;
    results.extend(run_surface_benchmarks()?);
    results.extend(run_monte_carlo_benchmarks()?);
    results.extend(run_thread_scaling_benchmarks()?);

    println!("\nBenchmark Results:");
    println!("{:<36} {:>10} {:>12} {:>16} {:>12}", "Benchmark", "Units", "Time (ms)", "Throughput/s", "Value");
    for result in &results {
        println!(
            "{:<36} {:>10} {:>12.2} {:>16.0} {:>12.6}",
            result.name, result.units, result.time_ms, result.throughput_per_sec, result.value
        );
    }
    println!();

    let filename = env::args().nth(1).unwrap_or_else(|| "benchmark_results.csv".to_string());
    write_results_to_csv(&results, &system_info, &filename)?;
    Ok(())
}
