// src/analytics/bs_analytic.rs
//! Analytical Black-Scholes formulas for European options and Greeks
//!
//! # Mathematical Foundation
//!
//! Under the Black-Scholes model with continuous dividend yield `d`, the
//! underlying follows:
//! ```text
//! dS_t = (r - d) S_t dt + σ S_t dW_t
//! ```
//!
//! and European prices have closed forms in the cumulative normal Φ(x):
//! ```text
//! d₁ = [ln(S/K) + (r - d + σ²/2)T] / (σ√T)
//! d₂ = d₁ - σ√T
//! ```
//!
//! All functions are pure. The `σ√T` denominator is undefined for `σ ≤ 0`
//! or `T ≤ 0`; callers guard those cases (the implied volatility solver
//! never evaluates them).

use crate::contract::{OptionQuote, OptionType};
use crate::math_utils::{norm_cdf, norm_pdf};

/// Black-Scholes d₁ term
pub fn d1(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    ((s / k).ln() + (r - d + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

/// Black-Scholes d₂ term, `d₁ - σ√T`
pub fn d2(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    d1(s, k, t, r, d, sigma) - sigma * t.sqrt()
}

/// Black-Scholes European call option price
///
/// # Formula
/// ```text
/// C = S e^(-dT) Φ(d₁) - K e^(-rT) Φ(d₂)
/// ```
pub fn bs_call_price(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    let d1 = d1(s, k, t, r, d, sigma);
    let d2 = d1 - sigma * t.sqrt();
    s * (-d * t).exp() * norm_cdf(d1) - k * (-r * t).exp() * norm_cdf(d2)
}

/// Black-Scholes European put option price
///
/// # Formula
/// ```text
/// P = K e^(-rT) Φ(-d₂) - S e^(-dT) Φ(-d₁)
/// ```
pub fn bs_put_price(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    let d1 = d1(s, k, t, r, d, sigma);
    let d2 = d1 - sigma * t.sqrt();
    k * (-r * t).exp() * norm_cdf(-d2) - s * (-d * t).exp() * norm_cdf(-d1)
}

/// Price of either option type
pub fn bs_price(
    option_type: OptionType,
    s: f64,
    k: f64,
    t: f64,
    r: f64,
    d: f64,
    sigma: f64,
) -> f64 {
    match option_type {
        OptionType::Call => bs_call_price(s, k, t, r, d, sigma),
        OptionType::Put => bs_put_price(s, k, t, r, d, sigma),
    }
}

/// Black-Scholes Vega (∂V/∂σ), identical for calls and puts
///
/// # Formula
/// ```text
/// ν = S e^(-dT) φ(d₁) √T
/// ```
pub fn bs_vega(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    let d1 = d1(s, k, t, r, d, sigma);
    s * (-d * t).exp() * norm_pdf(d1) * t.sqrt()
}

/// Black-Scholes Delta (∂V/∂S) for European call, `e^(-dT) Φ(d₁)`
pub fn bs_call_delta(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    (-d * t).exp() * norm_cdf(d1(s, k, t, r, d, sigma))
}

/// Black-Scholes Delta for European put, `e^(-dT) (Φ(d₁) - 1)`
pub fn bs_put_delta(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    (-d * t).exp() * (norm_cdf(d1(s, k, t, r, d, sigma)) - 1.0)
}

/// Black-Scholes Gamma (∂²V/∂S²), same for calls and puts
///
/// # Formula
/// ```text
/// Γ = e^(-dT) φ(d₁) / (S σ √T)
/// ```
pub fn bs_gamma(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    let d1 = d1(s, k, t, r, d, sigma);
    (-d * t).exp() * norm_pdf(d1) / (s * sigma * t.sqrt())
}

/// Black-Scholes Theta (∂V/∂t) for European call, per year
///
/// # Formula
/// ```text
/// Θ = -S e^(-dT) φ(d₁) σ/(2√T) - r K e^(-rT) Φ(d₂) + d S e^(-dT) Φ(d₁)
/// ```
pub fn bs_call_theta(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    let d1 = d1(s, k, t, r, d, sigma);
    let d2 = d1 - sigma * t.sqrt();
    let carry = s * (-d * t).exp();
    (-carry * norm_pdf(d1) * sigma) / (2.0 * t.sqrt()) - r * k * (-r * t).exp() * norm_cdf(d2)
        + d * carry * norm_cdf(d1)
}

/// Black-Scholes Rho (∂V/∂r) for European call, `K T e^(-rT) Φ(d₂)`
pub fn bs_call_rho(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    k * t * (-r * t).exp() * norm_cdf(d2(s, k, t, r, d, sigma))
}

/// Black-Scholes Rho for European put, `-K T e^(-rT) Φ(-d₂)`
pub fn bs_put_rho(s: f64, k: f64, t: f64, r: f64, d: f64, sigma: f64) -> f64 {
    -k * t * (-r * t).exp() * norm_cdf(-d2(s, k, t, r, d, sigma))
}

/// Contract terms bundled with a default volatility.
///
/// Every method takes an optional `sigma` that overrides the default for
/// that call only, so root finders can evaluate many trial volatilities
/// against one immutable value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackScholes {
    pub spot: f64,
    pub strike: f64,
    /// Years to expiry
    pub expiry: f64,
    pub rate: f64,
    pub dividend_yield: f64,
    /// Volatility used when a call passes `None`
    pub sigma: f64,
}

impl BlackScholes {
    pub fn new(spot: f64, strike: f64, expiry: f64, rate: f64, dividend_yield: f64, sigma: f64) -> Self {
        Self {
            spot,
            strike,
            expiry,
            rate,
            dividend_yield,
            sigma,
        }
    }

    pub fn from_quote(quote: &OptionQuote, sigma: f64) -> Self {
        Self::new(
            quote.spot,
            quote.strike,
            quote.expiry,
            quote.rate,
            quote.dividend_yield,
            sigma,
        )
    }

    #[inline]
    fn vol(&self, sigma: Option<f64>) -> f64 {
        sigma.unwrap_or(self.sigma)
    }

    pub fn d1(&self, sigma: Option<f64>) -> f64 {
        d1(self.spot, self.strike, self.expiry, self.rate, self.dividend_yield, self.vol(sigma))
    }

    pub fn d2(&self, sigma: Option<f64>) -> f64 {
        d2(self.spot, self.strike, self.expiry, self.rate, self.dividend_yield, self.vol(sigma))
    }

    pub fn call_price(&self, sigma: Option<f64>) -> f64 {
        bs_call_price(self.spot, self.strike, self.expiry, self.rate, self.dividend_yield, self.vol(sigma))
    }

    pub fn put_price(&self, sigma: Option<f64>) -> f64 {
        bs_put_price(self.spot, self.strike, self.expiry, self.rate, self.dividend_yield, self.vol(sigma))
    }

    pub fn price(&self, option_type: OptionType, sigma: Option<f64>) -> f64 {
        match option_type {
            OptionType::Call => self.call_price(sigma),
            OptionType::Put => self.put_price(sigma),
        }
    }

    pub fn vega(&self, sigma: Option<f64>) -> f64 {
        bs_vega(self.spot, self.strike, self.expiry, self.rate, self.dividend_yield, self.vol(sigma))
    }

    /// Discounted forward `S e^(-dT)`, the no-arbitrage ceiling of any option price
    pub fn discounted_spot(&self) -> f64 {
        self.spot * (-self.dividend_yield * self.expiry).exp()
    }

    /// Present value of the strike, `K e^(-rT)`
    pub fn discounted_strike(&self) -> f64 {
        self.strike * (-self.rate * self.expiry).exp()
    }
}
