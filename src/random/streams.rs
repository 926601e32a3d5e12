//! Random-variate streams layered over the Wichmann–Hill core.
//!
//! Each stream owns a private generator copy and produces the next variate
//! on [`draw`](UniformStream::draw). Streams are finite-state: restarting
//! a sequence means rebuilding the stream with the same seeds.

use crate::error::{SimulationError, SimulationResult};
use crate::random::prng::{Seeds, WichmannHill};

fn require_finite(name: &str, value: f64) -> SimulationResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimulationError::InvalidParameter(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

/// Uniform distribution on `[lo, hi]`.
#[derive(Debug, Clone)]
pub struct UniformStream {
    r#gen: WichmannHill,
    lo: f64,
    range: f64,
}

impl UniformStream {
    /// A uniform stream seeded from the cache.
    pub fn new(lo: f64, hi: f64) -> SimulationResult<UniformStream> {
        Self::with_seeds(lo, hi, None)
    }

    /// A uniform stream with an explicit seed triple.
    pub fn with_seeds(lo: f64, hi: f64, seeds: Option<Seeds>) -> SimulationResult<UniformStream> {
        require_finite("lo", lo)?;
        require_finite("hi", hi)?;
        if lo > hi {
            return Err(SimulationError::InvalidParameter(format!(
                "uniform bounds are inverted: lo={lo} > hi={hi}"
            )));
        }
        Ok(UniformStream {
            r#gen: seeds.map_or_else(WichmannHill::new, WichmannHill::with_seeds),
            lo,
            range: hi - lo,
        })
    }

    /// The next variate.
    pub fn draw(&mut self) -> f64 {
        self.lo + self.range * self.r#gen.next_f64()
    }
}

/// Exponential distribution with the given mean.
#[derive(Debug, Clone)]
pub struct ExponentialStream {
    r#gen: WichmannHill,
    mean: f64,
}

impl ExponentialStream {
    /// An exponential stream seeded from the cache.
    pub fn new(mean: f64) -> SimulationResult<ExponentialStream> {
        Self::with_seeds(mean, None)
    }

    /// An exponential stream with an explicit seed triple.
    pub fn with_seeds(mean: f64, seeds: Option<Seeds>) -> SimulationResult<ExponentialStream> {
        require_finite("mean", mean)?;
        if mean <= 0.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "exponential mean must be positive, got {mean}"
            )));
        }
        Ok(ExponentialStream {
            r#gen: seeds.map_or_else(WichmannHill::new, WichmannHill::with_seeds),
            mean,
        })
    }

    /// The next variate, `-mean * ln(1 - U)`; a draw of exactly 1 is
    /// rejected and redrawn.
    pub fn draw(&mut self) -> f64 {
        loop {
            let u = self.r#gen.next_f64();
            if u != 1.0 {
                return -self.mean * (1.0 - u).ln();
            }
        }
    }
}

/// Normal distribution via the polar Box–Muller method; the paired sample
/// is cached and returned by the following draw.
#[derive(Debug, Clone)]
pub struct NormalStream {
    r#gen: WichmannHill,
    mean: f64,
    stddev: f64,
    cached: f64,
}

impl NormalStream {
    /// A normal stream seeded from the cache.
    pub fn new(mean: f64, stddev: f64) -> SimulationResult<NormalStream> {
        Self::with_seeds(mean, stddev, None)
    }

    /// A normal stream with an explicit seed triple.
    pub fn with_seeds(
        mean: f64,
        stddev: f64,
        seeds: Option<Seeds>,
    ) -> SimulationResult<NormalStream> {
        require_finite("mean", mean)?;
        require_finite("stddev", stddev)?;
        if stddev < 0.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "normal stddev must be non-negative, got {stddev}"
            )));
        }
        Ok(NormalStream {
            r#gen: seeds.map_or_else(WichmannHill::new, WichmannHill::with_seeds),
            mean,
            stddev,
            cached: 0.0,
        })
    }

    /// The next variate.
    pub fn draw(&mut self) -> f64 {
        let unit = if self.cached != 0.0 {
            let x = self.cached;
            self.cached = 0.0;
            x
        } else {
            let (v1, v2, s) = loop {
                let v1 = 2.0 * self.r#gen.next_f64() - 1.0;
                let v2 = 2.0 * self.r#gen.next_f64() - 1.0;
                let s = v1 * v1 + v2 * v2;
                if s < 1.0 && s != 0.0 {
                    break (v1, v2, s);
                }
            };
            let scale = ((-2.0 * s.ln()) / s).sqrt();
            self.cached = v2 * scale;
            v1 * scale
        };
        self.mean + unit * self.stddev
    }
}

/// Erlang distribution with the given mean and standard deviation.
///
/// The stage count is `k = ceil((mean/stddev)^2)`; a variate is
/// `-(mean/k) * ln(U_1 ... U_k)`.
#[derive(Debug, Clone)]
pub struct ErlangStream {
    r#gen: WichmannHill,
    mean: f64,
    k: u32,
}

impl ErlangStream {
    /// An Erlang stream seeded from the cache.
    pub fn new(mean: f64, stddev: f64) -> SimulationResult<ErlangStream> {
        Self::with_seeds(mean, stddev, None)
    }

    /// An Erlang stream with an explicit seed triple.
    pub fn with_seeds(
        mean: f64,
        stddev: f64,
        seeds: Option<Seeds>,
    ) -> SimulationResult<ErlangStream> {
        require_finite("mean", mean)?;
        require_finite("stddev", stddev)?;
        if mean <= 0.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "erlang mean must be positive, got {mean}"
            )));
        }
        if stddev <= 0.0 || stddev > mean {
            return Err(SimulationError::InvalidParameter(format!(
                "erlang requires 0 < stddev <= mean, got stddev={stddev}, mean={mean}"
            )));
        }
        let k = (mean / stddev).powi(2).ceil() as u32;
        Ok(ErlangStream {
            r#gen: seeds.map_or_else(WichmannHill::new, WichmannHill::with_seeds),
            mean,
            k,
        })
    }

    /// Number of exponential stages.
    pub fn stages(&self) -> u32 {
        self.k
    }

    /// The next variate.
    pub fn draw(&mut self) -> f64 {
        let mut z = 1.0;
        for _ in 0..self.k {
            z *= self.r#gen.next_f64();
        }
        -(self.mean / f64::from(self.k)) * z.ln()
    }
}

/// Hyperexponential distribution: a two-phase exponential mixture for
/// coefficients of variation above 1.
#[derive(Debug, Clone)]
pub struct HyperExponentialStream {
    r#gen: WichmannHill,
    mean: f64,
    p: f64,
}

impl HyperExponentialStream {
    /// A hyperexponential stream seeded from the cache.
    pub fn new(mean: f64, stddev: f64) -> SimulationResult<HyperExponentialStream> {
        Self::with_seeds(mean, stddev, None)
    }

    /// A hyperexponential stream with an explicit seed triple.
    pub fn with_seeds(
        mean: f64,
        stddev: f64,
        seeds: Option<Seeds>,
    ) -> SimulationResult<HyperExponentialStream> {
        require_finite("mean", mean)?;
        require_finite("stddev", stddev)?;
        if mean <= 0.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "hyperexponential mean must be positive, got {mean}"
            )));
        }
        if stddev <= mean {
            return Err(SimulationError::InvalidParameter(format!(
                "hyperexponential requires stddev > mean (CV > 1), got stddev={stddev}, mean={mean}"
            )));
        }
        let cv = stddev / mean;
        let p = 0.5 * (1.0 - ((cv * cv - 1.0) / (cv * cv + 1.0)).sqrt());
        Ok(HyperExponentialStream {
            r#gen: seeds.map_or_else(WichmannHill::new, WichmannHill::with_seeds),
            mean,
            p,
        })
    }

    /// The next variate.
    pub fn draw(&mut self) -> f64 {
        let z = if self.r#gen.next_f64() > self.p {
            self.mean / (1.0 - self.p)
        } else {
            self.mean / self.p
        };
        -0.5 * z * self.r#gen.next_f64().ln()
    }
}

/// Triangular distribution with lower limit `a`, upper limit `b` and
/// mode `c`, sampled through the piecewise inverse CDF.
#[derive(Debug, Clone)]
pub struct TriangularStream {
    r#gen: WichmannHill,
    a: f64,
    b: f64,
    c: f64,
}

impl TriangularStream {
    /// A triangular stream seeded from the cache.
    pub fn new(a: f64, b: f64, c: f64) -> SimulationResult<TriangularStream> {
        Self::with_seeds(a, b, c, None)
    }

    /// A triangular stream with an explicit seed triple.
    pub fn with_seeds(
        a: f64,
        b: f64,
        c: f64,
        seeds: Option<Seeds>,
    ) -> SimulationResult<TriangularStream> {
        require_finite("a", a)?;
        require_finite("b", b)?;
        require_finite("c", c)?;
        if !(a < b && a <= c && c <= b) {
            return Err(SimulationError::InvalidParameter(format!(
                "triangular requires a < b and a <= c <= b, got a={a}, b={b}, c={c}"
            )));
        }
        Ok(TriangularStream {
            r#gen: seeds.map_or_else(WichmannHill::new, WichmannHill::with_seeds),
            a,
            b,
            c,
        })
    }

    /// The next variate.
    pub fn draw(&mut self) -> f64 {
        let split = (self.c - self.a) / (self.b - self.a);
        let u = self.r#gen.next_f64();
        if u < split {
            self.a + (u * (self.b - self.a) * (self.c - self.a)).sqrt()
        } else {
            self.b - ((1.0 - u) * (self.b - self.a) * (self.b - self.c)).sqrt()
        }
    }
}

/// A Bernoulli draw: true with probability `p`.
#[derive(Debug, Clone)]
pub struct Draw {
    r#gen: WichmannHill,
    p: f64,
}

impl Draw {
    /// A draw stream seeded from the cache.
    pub fn new(p: f64) -> SimulationResult<Draw> {
        Self::with_seeds(p, None)
    }

    /// A draw stream with an explicit seed triple.
    pub fn with_seeds(p: f64, seeds: Option<Seeds>) -> SimulationResult<Draw> {
        require_finite("p", p)?;
        if !(0.0..=1.0).contains(&p) {
            return Err(SimulationError::InvalidParameter(format!(
                "draw probability must lie in [0, 1], got {p}"
            )));
        }
        Ok(Draw {
            r#gen: seeds.map_or_else(WichmannHill::new, WichmannHill::with_seeds),
            p,
        })
    }

    /// True when the next uniform draw falls below `p`.
    pub fn draw(&mut self) -> bool {
        self.r#gen.next_f64() < self.p
    }
}
