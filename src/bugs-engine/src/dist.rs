// Copyright 2025 The Bugs Engine Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::f64::consts::PI;

use rand::Rng;

use crate::common::Result;
use crate::comp_err;
use crate::float::{ln_gamma, phi};
use crate::value::{DenseArray, Scalar, Value};

/// is_distribution_fn reports whether a name constructs a distribution.
/// These calls are never constant-folded; they evaluate to `Distribution`
/// values when a node function runs.
pub fn is_distribution_fn(name: &str) -> bool {
    matches!(
        name,
        "dnorm"
            | "dbern"
            | "dbin"
            | "dcat"
            | "dgamma"
            | "dbeta"
            | "dunif"
            | "dpois"
            | "dexp"
            | "dflat"
            | "dmnorm"
            | "dwish"
    ) || is_bounding_fn(name)
}

/// is_bounding_fn matches the canonical truncation/censoring wrappers that
/// AST normalization lowers `T(l,u)` / `C(l,u)` suffixes into.
pub fn is_bounding_fn(name: &str) -> bool {
    matches!(
        name,
        "truncated"
            | "truncated_lower"
            | "truncated_upper"
            | "censored"
            | "censored_lower"
            | "censored_upper"
    )
}

/// A square matrix stored row-major, as used by the multivariate
/// distributions.
#[derive(Clone, Debug, PartialEq)]
pub struct SquareMatrix {
    pub dim: usize,
    pub cells: Vec<f64>,
}

impl SquareMatrix {
    fn from_dense(name: &str, a: &DenseArray) -> Result<Self> {
        if a.shape.len() != 2 || a.shape[0] != a.shape[1] || a.shape[0] == 0 {
            return comp_err!(
                BadDistributionArgs,
                format!("{} expects a square matrix, got shape {:?}", name, a.shape)
            );
        }
        Ok(SquareMatrix {
            dim: a.shape[0],
            cells: a.f64_cells(),
        })
    }

    fn at(&self, r: usize, c: usize) -> f64 {
        self.cells[r * self.dim + c]
    }

    /// cholesky returns the lower-triangular factor L with self = L·Lᵀ,
    /// or an error when the matrix is not positive definite.
    fn cholesky(&self) -> Result<Vec<f64>> {
        let n = self.dim;
        let mut l = vec![0.0f64; n * n];
        for i in 0..n {
            for j in 0..=i {
                let mut sum = self.at(i, j);
                for k in 0..j {
                    sum -= l[i * n + k] * l[j * n + k];
                }
                if i == j {
                    if sum <= 0.0 {
                        return comp_err!(
                            BadDistributionArgs,
                            "precision matrix is not positive definite"
                        );
                    }
                    l[i * n + i] = sum.sqrt();
                } else {
                    l[i * n + j] = sum / l[j * n + j];
                }
            }
        }
        Ok(l)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Distribution {
    /// dnorm(mu, tau) — mean and precision, per the language convention.
    Normal { mean: f64, precision: f64 },
    Bernoulli { p: f64 },
    /// dbin(p, n)
    Binomial { p: f64, n: i64 },
    /// dcat(p[]) — outcomes are 1-based category indices.
    Categorical { p: Vec<f64> },
    /// dgamma(shape, rate)
    Gamma { shape: f64, rate: f64 },
    Beta { alpha: f64, beta: f64 },
    Uniform { lower: f64, upper: f64 },
    Poisson { rate: f64 },
    Exponential { rate: f64 },
    /// dflat() — the improper flat prior.
    Flat,
    /// dmnorm(mu[], T[,]) — mean vector and precision matrix.
    MvNormal { mean: Vec<f64>, precision: SquareMatrix },
    /// dwish(R[,], k) — scale matrix and degrees of freedom.
    Wishart { scale: SquareMatrix, df: f64 },
    Truncated {
        base: Box<Distribution>,
        lower: Option<f64>,
        upper: Option<f64>,
    },
    Censored {
        base: Box<Distribution>,
        lower: Option<f64>,
        upper: Option<f64>,
    },
}

fn want_f64(name: &str, v: &Value) -> Result<f64> {
    match v.as_f64() {
        Some(x) => Ok(x),
        None => comp_err!(
            BadDistributionArgs,
            format!("{} expects scalar parameters", name)
        ),
    }
}

fn want_vec(name: &str, v: &Value) -> Result<Vec<f64>> {
    match v.as_array() {
        Some(a) if a.shape.len() == 1 => Ok(a.f64_cells()),
        _ => comp_err!(BadDistributionArgs, format!("{} expects a vector", name)),
    }
}

fn check_arity(name: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() != n {
        return comp_err!(
            BadDistributionArgs,
            format!("{} takes {} parameters, got {}", name, n, args.len())
        );
    }
    Ok(())
}

fn positive(name: &str, what: &str, x: f64) -> Result<f64> {
    if x > 0.0 && x.is_finite() {
        Ok(x)
    } else {
        comp_err!(BadDistributionArgs, format!("{}: {} must be positive", name, what))
    }
}

fn probability(name: &str, x: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&x) {
        Ok(x)
    } else {
        comp_err!(
            BadDistributionArgs,
            format!("{}: probability out of [0, 1]", name)
        )
    }
}

/// construct builds a distribution object from a constructor name and its
/// evaluated parameters, validating parameter domains.
pub fn construct(name: &str, args: &[Value]) -> Result<Distribution> {
    let dist = match name {
        "dnorm" => {
            check_arity(name, args, 2)?;
            Distribution::Normal {
                mean: want_f64(name, &args[0])?,
                precision: positive(name, "precision", want_f64(name, &args[1])?)?,
            }
        }
        "dbern" => {
            check_arity(name, args, 1)?;
            Distribution::Bernoulli {
                p: probability(name, want_f64(name, &args[0])?)?,
            }
        }
        "dbin" => {
            check_arity(name, args, 2)?;
            let p = probability(name, want_f64(name, &args[0])?)?;
            let n = match args[1].as_scalar() {
                Some(s) => s.as_index()?,
                None => return comp_err!(BadDistributionArgs, "dbin expects integer n"),
            };
            if n < 0 {
                return comp_err!(BadDistributionArgs, "dbin: n must be non-negative");
            }
            Distribution::Binomial { p, n }
        }
        "dcat" => {
            check_arity(name, args, 1)?;
            let p = want_vec(name, &args[0])?;
            if p.is_empty() || p.iter().any(|&x| x < 0.0) {
                return comp_err!(BadDistributionArgs, "dcat: weights must be non-negative");
            }
            Distribution::Categorical { p }
        }
        "dgamma" => {
            check_arity(name, args, 2)?;
            Distribution::Gamma {
                shape: positive(name, "shape", want_f64(name, &args[0])?)?,
                rate: positive(name, "rate", want_f64(name, &args[1])?)?,
            }
        }
        "dbeta" => {
            check_arity(name, args, 2)?;
            Distribution::Beta {
                alpha: positive(name, "alpha", want_f64(name, &args[0])?)?,
                beta: positive(name, "beta", want_f64(name, &args[1])?)?,
            }
        }
        "dunif" => {
            check_arity(name, args, 2)?;
            let lower = want_f64(name, &args[0])?;
            let upper = want_f64(name, &args[1])?;
            if upper <= lower {
                return comp_err!(BadDistributionArgs, "dunif: upper must exceed lower");
            }
            Distribution::Uniform { lower, upper }
        }
        "dpois" => {
            check_arity(name, args, 1)?;
            Distribution::Poisson {
                rate: positive(name, "rate", want_f64(name, &args[0])?)?,
            }
        }
        "dexp" => {
            check_arity(name, args, 1)?;
            Distribution::Exponential {
                rate: positive(name, "rate", want_f64(name, &args[0])?)?,
            }
        }
        "dflat" => {
            check_arity(name, args, 0)?;
            Distribution::Flat
        }
        "dmnorm" => {
            check_arity(name, args, 2)?;
            let mean = want_vec(name, &args[0])?;
            let precision = match args[1].as_array() {
                Some(a) => SquareMatrix::from_dense(name, a)?,
                None => {
                    return comp_err!(BadDistributionArgs, "dmnorm expects a precision matrix")
                }
            };
            if precision.dim != mean.len() {
                return comp_err!(
                    BadDistributionArgs,
                    format!(
                        "dmnorm: mean length {} does not match precision dimension {}",
                        mean.len(),
                        precision.dim
                    )
                );
            }
            Distribution::MvNormal { mean, precision }
        }
        "dwish" => {
            check_arity(name, args, 2)?;
            let scale = match args[0].as_array() {
                Some(a) => SquareMatrix::from_dense(name, a)?,
                None => return comp_err!(BadDistributionArgs, "dwish expects a scale matrix"),
            };
            let df = want_f64(name, &args[1])?;
            if df < scale.dim as f64 {
                return comp_err!(
                    BadDistributionArgs,
                    "dwish: degrees of freedom below dimension"
                );
            }
            Distribution::Wishart { scale, df }
        }
        _ => return comp_err!(UndefinedDistribution, name),
    };
    Ok(dist)
}

/// bound wraps a base distribution with truncation or censoring bounds, as
/// produced by the canonical `truncated*`/`censored*` calls.
pub fn bound(
    name: &str,
    base: Distribution,
    lower: Option<f64>,
    upper: Option<f64>,
) -> Result<Distribution> {
    if lower.is_none() && upper.is_none() {
        return Ok(base);
    }
    if let (Some(lo), Some(hi)) = (lower, upper) {
        if hi <= lo {
            return comp_err!(
                BadDistributionArgs,
                format!("{}: upper bound must exceed lower", name)
            );
        }
    }
    let censored = name.starts_with("censored");
    Ok(if censored {
        Distribution::Censored {
            base: Box::new(base),
            lower,
            upper,
        }
    } else {
        Distribution::Truncated {
            base: Box::new(base),
            lower,
            upper,
        }
    })
}

impl Distribution {
    /// is_discrete reports whether outcomes are integral.
    pub fn is_discrete(&self) -> bool {
        match self {
            Distribution::Bernoulli { .. }
            | Distribution::Binomial { .. }
            | Distribution::Categorical { .. }
            | Distribution::Poisson { .. } => true,
            Distribution::Truncated { base, .. } | Distribution::Censored { base, .. } => {
                base.is_discrete()
            }
            _ => false,
        }
    }

    /// log_density scores a value under this distribution.
    pub fn log_density(&self, value: &Value) -> Result<f64> {
        match self {
            Distribution::MvNormal { mean, precision } => {
                let x = match value.as_array() {
                    Some(a) if a.shape.len() == 1 && a.len() == mean.len() => a.f64_cells(),
                    _ => {
                        return comp_err!(
                            ShapeMismatch,
                            "dmnorm scores vectors of the mean's length"
                        )
                    }
                };
                let l = precision.cholesky()?;
                let n = precision.dim;
                let log_det: f64 = (0..n).map(|i| l[i * n + i].ln()).sum::<f64>() * 2.0;
                let centered: Vec<f64> =
                    x.iter().zip(mean.iter()).map(|(a, b)| a - b).collect();
                // quadratic form (x-μ)ᵀ P (x-μ) through the factor: ‖Lᵀ(x-μ)‖²
                let mut quad = 0.0;
                for j in 0..n {
                    let mut dot = 0.0;
                    for i in j..n {
                        dot += l[i * n + j] * centered[i];
                    }
                    quad += dot * dot;
                }
                Ok(0.5 * (log_det - n as f64 * (2.0 * PI).ln() - quad))
            }
            _ => {
                let x = match value.as_f64() {
                    Some(x) => x,
                    None => {
                        return comp_err!(ShapeMismatch, "scalar distribution scored with array")
                    }
                };
                self.scalar_log_density(x)
            }
        }
    }

    fn scalar_log_density(&self, x: f64) -> Result<f64> {
        let ld = match self {
            Distribution::Normal { mean, precision } => {
                0.5 * (precision.ln() - (2.0 * PI).ln()) - 0.5 * precision * (x - mean).powi(2)
            }
            Distribution::Bernoulli { p } => {
                if x == 1.0 {
                    p.ln()
                } else if x == 0.0 {
                    (1.0 - p).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
            Distribution::Binomial { p, n } => {
                if x < 0.0 || x > *n as f64 || x.fract() != 0.0 {
                    f64::NEG_INFINITY
                } else {
                    let n = *n as f64;
                    ln_gamma(n + 1.0) - ln_gamma(x + 1.0) - ln_gamma(n - x + 1.0)
                        + x * p.ln()
                        + (n - x) * (1.0 - p).ln()
                }
            }
            Distribution::Categorical { p } => {
                let total: f64 = p.iter().sum();
                let k = x as usize;
                if x.fract() != 0.0 || k < 1 || k > p.len() {
                    f64::NEG_INFINITY
                } else {
                    (p[k - 1] / total).ln()
                }
            }
            Distribution::Gamma { shape, rate } => {
                shape * rate.ln() - ln_gamma(*shape) + (shape - 1.0) * x.ln() - rate * x
            }
            Distribution::Beta { alpha, beta } => {
                ln_gamma(alpha + beta) - ln_gamma(*alpha) - ln_gamma(*beta)
                    + (alpha - 1.0) * x.ln()
                    + (beta - 1.0) * (1.0 - x).ln()
            }
            Distribution::Uniform { lower, upper } => {
                if x < *lower || x > *upper {
                    f64::NEG_INFINITY
                } else {
                    -(upper - lower).ln()
                }
            }
            Distribution::Poisson { rate } => {
                if x < 0.0 || x.fract() != 0.0 {
                    f64::NEG_INFINITY
                } else {
                    x * rate.ln() - rate - ln_gamma(x + 1.0)
                }
            }
            Distribution::Exponential { rate } => {
                if x < 0.0 {
                    f64::NEG_INFINITY
                } else {
                    rate.ln() - rate * x
                }
            }
            Distribution::Flat => 0.0,
            Distribution::Wishart { .. } => {
                return comp_err!(
                    UnsupportedExpression,
                    "dwish density is not supported by this engine"
                )
            }
            Distribution::MvNormal { .. } => unreachable!("handled by log_density"),
            Distribution::Truncated { base, lower, upper } => {
                let in_lower = lower.map(|lo| x >= lo).unwrap_or(true);
                let in_upper = upper.map(|hi| x <= hi).unwrap_or(true);
                if !in_lower || !in_upper {
                    return Ok(f64::NEG_INFINITY);
                }
                let mass_hi = match upper {
                    Some(hi) => base.cdf(*hi)?,
                    None => 1.0,
                };
                let mass_lo = match lower {
                    Some(lo) => base.cdf(*lo)?,
                    None => 0.0,
                };
                base.scalar_log_density(x)? - (mass_hi - mass_lo).ln()
            }
            Distribution::Censored { base, lower, upper } => {
                if let Some(lo) = lower {
                    if x <= *lo {
                        return Ok(base.cdf(*lo)?.ln());
                    }
                }
                if let Some(hi) = upper {
                    if x >= *hi {
                        return Ok((1.0 - base.cdf(*hi)?).ln());
                    }
                }
                base.scalar_log_density(x)?
            }
        };
        Ok(ld)
    }

    /// cdf is available for the distributions with a closed form; it backs
    /// the `cdf`/`cumulative` primitive and truncation normalization.
    pub fn cdf(&self, x: f64) -> Result<f64> {
        let p = match self {
            Distribution::Normal { mean, precision } => {
                phi((x - mean) * precision.sqrt())
            }
            Distribution::Uniform { lower, upper } => {
                ((x - lower) / (upper - lower)).clamp(0.0, 1.0)
            }
            Distribution::Exponential { rate } => {
                if x < 0.0 {
                    0.0
                } else {
                    1.0 - (-rate * x).exp()
                }
            }
            Distribution::Bernoulli { p } => {
                if x < 0.0 {
                    0.0
                } else if x < 1.0 {
                    1.0 - p
                } else {
                    1.0
                }
            }
            Distribution::Truncated { base, lower, upper } => {
                let mass_lo = match lower {
                    Some(lo) => base.cdf(*lo)?,
                    None => 0.0,
                };
                let mass_hi = match upper {
                    Some(hi) => base.cdf(*hi)?,
                    None => 1.0,
                };
                ((base.cdf(x)? - mass_lo) / (mass_hi - mass_lo)).clamp(0.0, 1.0)
            }
            _ => {
                return comp_err!(
                    UnsupportedExpression,
                    "cdf is not available for this distribution"
                )
            }
        };
        Ok(p)
    }

    /// sample draws one value; consumers use this for chain initialization.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<Value> {
        let v = match self {
            Distribution::Normal { mean, precision } => {
                Value::Scalar(Scalar::Real(mean + std_normal(rng) / precision.sqrt()))
            }
            Distribution::Bernoulli { p } => {
                Value::Scalar(Scalar::Int((rng.gen::<f64>() < *p) as i64))
            }
            Distribution::Binomial { p, n } => {
                let mut successes = 0;
                for _ in 0..*n {
                    if rng.gen::<f64>() < *p {
                        successes += 1;
                    }
                }
                Value::Scalar(Scalar::Int(successes))
            }
            Distribution::Categorical { p } => {
                let total: f64 = p.iter().sum();
                let mut u = rng.gen::<f64>() * total;
                let mut outcome = p.len();
                for (i, w) in p.iter().enumerate() {
                    if u < *w {
                        outcome = i + 1;
                        break;
                    }
                    u -= w;
                }
                Value::Scalar(Scalar::Int(outcome as i64))
            }
            Distribution::Gamma { shape, rate } => {
                Value::Scalar(Scalar::Real(sample_gamma(rng, *shape) / rate))
            }
            Distribution::Beta { alpha, beta } => {
                let a = sample_gamma(rng, *alpha);
                let b = sample_gamma(rng, *beta);
                Value::Scalar(Scalar::Real(a / (a + b)))
            }
            Distribution::Uniform { lower, upper } => {
                Value::Scalar(Scalar::Real(lower + rng.gen::<f64>() * (upper - lower)))
            }
            Distribution::Poisson { rate } => {
                // Knuth's product method; model rates are small
                let threshold = (-rate).exp();
                let mut k = 0i64;
                let mut prod = rng.gen::<f64>();
                while prod > threshold {
                    k += 1;
                    prod *= rng.gen::<f64>();
                }
                Value::Scalar(Scalar::Int(k))
            }
            Distribution::Exponential { rate } => {
                Value::Scalar(Scalar::Real(-rng.gen::<f64>().ln() / rate))
            }
            Distribution::Flat => {
                return comp_err!(
                    UnsupportedExpression,
                    "dflat is improper and cannot be sampled"
                )
            }
            Distribution::MvNormal { mean, precision } => {
                let n = precision.dim;
                let l = precision.cholesky()?;
                let z: Vec<f64> = (0..n).map(|_| std_normal(rng)).collect();
                // solve Lᵀ y = z by back substitution, then shift by the mean
                let mut y = vec![0.0f64; n];
                for i in (0..n).rev() {
                    let mut sum = z[i];
                    for k in (i + 1)..n {
                        sum -= l[k * n + i] * y[k];
                    }
                    y[i] = sum / l[i * n + i];
                }
                Value::Array(DenseArray::vector(
                    y.iter()
                        .zip(mean.iter())
                        .map(|(a, b)| Scalar::Real(a + b))
                        .collect(),
                ))
            }
            Distribution::Wishart { .. } => {
                return comp_err!(
                    UnsupportedExpression,
                    "dwish sampling is not supported by this engine"
                )
            }
            Distribution::Truncated { base, lower, upper } => {
                for _ in 0..1000 {
                    let v = base.sample(rng)?;
                    if let Some(x) = v.as_f64() {
                        let ok_lo = lower.map(|lo| x >= lo).unwrap_or(true);
                        let ok_hi = upper.map(|hi| x <= hi).unwrap_or(true);
                        if ok_lo && ok_hi {
                            return Ok(v);
                        }
                    }
                }
                return comp_err!(
                    BadDistributionArgs,
                    "truncated region has negligible mass"
                );
            }
            Distribution::Censored { base, lower, upper } => {
                let v = base.sample(rng)?;
                let x = match v.as_f64() {
                    Some(x) => x,
                    None => return Ok(v),
                };
                let x = match (lower, upper) {
                    (Some(lo), _) if x < *lo => *lo,
                    (_, Some(hi)) if x > *hi => *hi,
                    _ => x,
                };
                Value::Scalar(Scalar::Real(x))
            }
        };
        Ok(v)
    }
}

fn std_normal<R: Rng>(rng: &mut R) -> f64 {
    // Box-Muller
    let u1: f64 = rng.gen::<f64>().max(1e-300);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn sample_gamma<R: Rng>(rng: &mut R, shape: f64) -> f64 {
    // Marsaglia & Tsang, with the a < 1 boost
    if shape < 1.0 {
        let u: f64 = rng.gen::<f64>().max(1e-300);
        return sample_gamma(rng, shape + 1.0) * u.powf(1.0 / shape);
    }
    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = std_normal(rng);
        let v = (1.0 + c * x).powi(3);
        if v <= 0.0 {
            continue;
        }
        let u: f64 = rng.gen::<f64>().max(1e-300);
        if u.ln() < 0.5 * x * x + d - d * v + d * v.ln() {
            return d * v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn real(x: f64) -> Value {
        Value::Scalar(Scalar::Real(x))
    }

    #[test]
    fn construct_validates_domains() {
        assert!(construct("dnorm", &[real(0.0), real(1.0)]).is_ok());
        assert!(construct("dnorm", &[real(0.0), real(-1.0)]).is_err());
        assert!(construct("dbern", &[real(1.5)]).is_err());
        assert!(construct("dunif", &[real(2.0), real(1.0)]).is_err());
        assert!(construct("dnope", &[]).is_err());
    }

    #[test]
    fn normal_log_density() {
        let d = construct("dnorm", &[real(0.0), real(1.0)]).unwrap();
        // standard normal at 0: -0.5 ln(2π)
        let expect = -0.5 * (2.0 * PI).ln();
        assert!(approx_eq!(
            f64,
            expect,
            d.log_density(&real(0.0)).unwrap(),
            epsilon = 1e-12
        ));
    }

    #[test]
    fn gamma_log_density() {
        let d = construct("dgamma", &[real(2.0), real(3.0)]).unwrap();
        // shape 2, rate 3 at x=1: 2 ln 3 - lnΓ(2) + ln 1 - 3
        let expect = 2.0 * 3.0f64.ln() - 3.0;
        assert!(approx_eq!(
            f64,
            expect,
            d.log_density(&real(1.0)).unwrap(),
            epsilon = 1e-9
        ));
    }

    #[test]
    fn truncated_renormalizes() {
        let base = construct("dnorm", &[real(0.0), real(1.0)]).unwrap();
        let half = bound("truncated_lower", base.clone(), Some(0.0), None).unwrap();
        let expect = base.log_density(&real(1.0)).unwrap() - 0.5f64.ln();
        assert!(approx_eq!(
            f64,
            expect,
            half.log_density(&real(1.0)).unwrap(),
            epsilon = 1e-6
        ));
        assert_eq!(
            f64::NEG_INFINITY,
            half.log_density(&real(-1.0)).unwrap()
        );
    }

    #[test]
    fn mvnormal_log_density_identity_precision() {
        let mu = Value::Array(DenseArray::vector(vec![
            Scalar::Real(0.0),
            Scalar::Real(0.0),
        ]));
        let prec = Value::Array(DenseArray {
            shape: vec![2, 2],
            cells: vec![
                Scalar::Real(1.0),
                Scalar::Real(0.0),
                Scalar::Real(0.0),
                Scalar::Real(1.0),
            ],
        });
        let d = construct("dmnorm", &[mu, prec]).unwrap();
        let x = Value::Array(DenseArray::vector(vec![
            Scalar::Real(1.0),
            Scalar::Real(2.0),
        ]));
        // independent standard normals: sum of two scalar densities
        let scalar = construct("dnorm", &[real(0.0), real(1.0)]).unwrap();
        let expect = scalar.log_density(&real(1.0)).unwrap()
            + scalar.log_density(&real(2.0)).unwrap();
        assert!(approx_eq!(
            f64,
            expect,
            d.log_density(&x).unwrap(),
            epsilon = 1e-9
        ));
    }

    #[test]
    fn sampling_respects_bounds() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let base = construct("dnorm", &[real(0.0), real(1.0)]).unwrap();
        let trunc = bound("truncated", base, Some(-1.0), Some(1.0)).unwrap();
        for _ in 0..100 {
            let x = trunc.sample(&mut rng).unwrap().as_f64().unwrap();
            assert!((-1.0..=1.0).contains(&x));
        }
    }
}
