// tests/implied_vol_test.rs
use approx::assert_abs_diff_eq;
use dupire_mc::analytics::bs_analytic::bs_price;
use dupire_mc::analytics::implied_vol::{
    implied_volatility, screen_quote, solve, IvOutcome, RejectReasons, SolveMethod, SolverConfig,
};
use dupire_mc::{OptionQuote, OptionType};

fn quote_for(option_type: OptionType, strike: f64, expiry: f64, dividend_yield: f64, sigma: f64) -> OptionQuote {
    let price = bs_price(option_type, 100.0, strike, expiry, 0.05, dividend_yield, sigma);
    OptionQuote::new(100.0, dividend_yield, price, strike, expiry, 0.05, option_type).unwrap()
}

#[test]
fn test_round_trip_across_strikes_expiries_and_vols() {
    let cfg = SolverConfig::default();
    let mut worst: f64 = 0.0;

    for option_type in [OptionType::Call, OptionType::Put] {
        for strike in [90.0, 100.0, 110.0] {
            for expiry in [0.5, 1.0] {
                for sigma in [0.15, 0.3, 0.6] {
                    let quote = quote_for(option_type, strike, expiry, 0.02, sigma);
                    let recovered = implied_volatility(&quote, cfg.initial_guess, &cfg);
                    let error = (recovered - sigma).abs();
                    worst = worst.max(error);
                    assert!(
                        error < 1e-4,
                        "{} K={} T={} sigma={} recovered {}",
                        option_type,
                        strike,
                        expiry,
                        sigma,
                        recovered
                    );
                }
            }
        }
    }
    println!("\nWorst implied volatility error: {:e}", worst);
}

#[test]
fn test_bisection_takes_over_when_newton_fails() {
    // a far out-of-the-money call has almost no vega at the initial guess
    let quote = quote_for(OptionType::Call, 160.0, 0.5, 0.0, 0.8);
    match solve(&quote, 0.1, &SolverConfig::default()) {
        IvOutcome::Converged { sigma, method, .. } => {
            assert_eq!(method, SolveMethod::Bisection);
            assert_abs_diff_eq!(sigma, 0.8, epsilon = 1e-4);
        }
        other => panic!("expected convergence, got {:?}", other),
    }
}

#[test]
fn test_bisection_only_configuration() {
    let cfg = SolverConfig {
        max_newton_iterations: 0,
        ..Default::default()
    };
    let quote = quote_for(OptionType::Put, 95.0, 1.0, 0.0, 0.35);
    match solve(&quote, 0.1, &cfg) {
        IvOutcome::Converged { sigma, method, .. } => {
            assert_eq!(method, SolveMethod::Bisection);
            assert_abs_diff_eq!(sigma, 0.35, epsilon = 1e-4);
        }
        other => panic!("expected convergence, got {:?}", other),
    }
}

#[test]
fn test_pre_filter_reasons() {
    let cfg = SolverConfig::default();

    let short = quote_for(OptionType::Call, 100.0, 3.0 / 365.0, 0.0, 0.2);
    assert!(screen_quote(&short, &cfg).contains(RejectReasons::NEAR_EXPIRY));
    assert!(implied_volatility(&short, 0.1, &cfg).is_nan());

    let wing = quote_for(OptionType::Put, 25.0, 1.0, 0.0, 0.9);
    assert!(screen_quote(&wing, &cfg).contains(RejectReasons::EXTREME_MONEYNESS));

    let below = OptionQuote::new(100.0, 0.0, 1.0, 80.0, 1.0, 0.05, OptionType::Call).unwrap();
    assert!(screen_quote(&below, &cfg).contains(RejectReasons::BELOW_INTRINSIC));

    // the upper bound applies to puts as well
    let rich_put = OptionQuote::new(100.0, 0.0, 101.0, 160.0, 1.0, 0.05, OptionType::Put).unwrap();
    assert!(screen_quote(&rich_put, &cfg).contains(RejectReasons::ABOVE_UPPER_BOUND));

    let fair = quote_for(OptionType::Call, 100.0, 1.0, 0.0, 0.2);
    assert!(screen_quote(&fair, &cfg).is_empty());
}

#[test]
fn test_volatility_above_cap_is_undefined() {
    let cfg = SolverConfig {
        max_vol: 1.0,
        ..Default::default()
    };
    let quote = quote_for(OptionType::Call, 100.0, 1.0, 0.0, 2.0);
    assert!(matches!(solve(&quote, 0.1, &cfg), IvOutcome::AboveMaxVol { .. }));
    assert!(implied_volatility(&quote, 0.1, &cfg).is_nan());
}
