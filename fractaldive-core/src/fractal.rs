use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::error::CoreError;

/// Which escape-time family to iterate.
///
/// An immutable value object: switching sets replaces the value rather than
/// mutating it. The discriminant is matched once per pixel run, outside the
/// inner loop (see [`crate::iterator`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FractalSet {
    /// `z ← z² + c`, `z₀ = 0`, `c` = pixel.
    Mandelbrot,
    /// `z ← z² + c`, `z₀` = pixel, `c` fixed.
    Julia { c: Complex },
    /// `z ← (|re|, |im|)² + c`.
    BurningShip,
    /// `z ← conj(z)² + c`.
    Tricorn,
    /// `z ← z^power + c` for a real (possibly non-integer) power.
    Multibrot { power: f64 },
}

/// Named Julia constants accepted by the text form (`julia:dendrite`).
pub const JULIA_PRESETS: &[(&str, Complex)] = &[
    ("dendrite", Complex { re: 0.0, im: 1.0 }),
    ("rabbit", Complex { re: -0.123, im: 0.745 }),
    ("san-marco", Complex { re: -0.75, im: 0.0 }),
    ("siegel", Complex { re: -0.391, im: -0.587 }),
    ("dragon", Complex { re: -0.8, im: 0.156 }),
    ("classic", Complex { re: -0.7, im: 0.27015 }),
];

/// Named multibrot exponents accepted by the text form (`multibrot:cubic`).
pub const MULTIBROT_PRESETS: &[(&str, f64)] = &[("cubic", 3.0), ("quartic", 4.0), ("quintic", 5.0)];

impl FractalSet {
    pub fn julia(re: f64, im: f64) -> Self {
        Self::Julia {
            c: Complex::new(re, im),
        }
    }

    pub fn multibrot(power: f64) -> Self {
        Self::Multibrot { power }
    }

    /// Short discriminator used in persisted state and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mandelbrot => "mandelbrot",
            Self::Julia { .. } => "julia",
            Self::BurningShip => "burning-ship",
            Self::Tricorn => "tricorn",
            Self::Multibrot { .. } => "multibrot",
        }
    }

    /// Where each family's interesting region sits at zoom 1.
    pub fn default_center(&self) -> Complex {
        match self {
            Self::Mandelbrot => Complex::new(-0.5, 0.0),
            Self::Julia { .. } => Complex::ZERO,
            Self::BurningShip => Complex::new(-0.4, -0.5),
            Self::Tricorn => Complex::new(-0.3, 0.0),
            Self::Multibrot { .. } => Complex::ZERO,
        }
    }

    /// `true` when the quadratic perturbation recurrence applies.
    pub fn supports_perturbation(&self) -> bool {
        matches!(self, Self::Mandelbrot | Self::Julia { .. })
    }

    /// Split a view-plane point into the `(z₀, c)` pair the recurrence starts from.
    #[inline]
    pub fn seed(&self, point: Complex) -> (Complex, Complex) {
        match *self {
            Self::Julia { c } => (point, c),
            _ => (Complex::ZERO, point),
        }
    }
}

impl Default for FractalSet {
    fn default() -> Self {
        Self::Mandelbrot
    }
}

impl fmt::Display for FractalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Julia { c } => write!(f, "julia:{},{}", c.re, c.im),
            Self::Multibrot { power } => write!(f, "multibrot:{power}"),
            other => f.write_str(other.kind()),
        }
    }
}

impl FromStr for FractalSet {
    type Err = CoreError;

    /// Parse the text form written by `Display`, or a named preset.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| CoreError::ParseFractalSet {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = s.trim();
        let (kind, arg) = match trimmed.split_once(':') {
            Some((k, a)) => (k.trim().to_ascii_lowercase(), Some(a.trim())),
            None => (trimmed.to_ascii_lowercase(), None),
        };

        match (kind.as_str(), arg) {
            ("mandelbrot", None) => Ok(Self::Mandelbrot),
            ("burning-ship" | "burningship", None) => Ok(Self::BurningShip),
            ("tricorn", None) => Ok(Self::Tricorn),
            ("julia", Some(arg)) => {
                if let Some(&(_, c)) = JULIA_PRESETS.iter().find(|(name, _)| name.eq_ignore_ascii_case(arg)) {
                    return Ok(Self::Julia { c });
                }
                let (re, im) = arg
                    .split_once(',')
                    .ok_or_else(|| err("expected `julia:<re>,<im>` or a preset name"))?;
                let re = parse_finite(re).ok_or_else(|| err("bad real part"))?;
                let im = parse_finite(im).ok_or_else(|| err("bad imaginary part"))?;
                Ok(Self::julia(re, im))
            }
            ("multibrot", Some(arg)) => {
                if let Some(&(_, p)) = MULTIBROT_PRESETS.iter().find(|(name, _)| name.eq_ignore_ascii_case(arg)) {
                    return Ok(Self::multibrot(p));
                }
                let power = parse_finite(arg).ok_or_else(|| err("bad power"))?;
                Ok(Self::multibrot(power))
            }
            ("julia" | "multibrot", None) => Err(err("missing parameter")),
            ("mandelbrot" | "burning-ship" | "burningship" | "tricorn", Some(_)) => {
                Err(err("this family takes no parameter"))
            }
            _ => Err(err("unknown fractal family")),
        }
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Iteration parameters
// ---------------------------------------------------------------------------

/// Step budget and bailout for one evaluation.
///
/// The squared bailout is cached and recomputed on deserialization so
/// persisted parameters never drift from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationParams {
    pub max_iterations: u32,
    pub bailout: f64,
    #[serde(skip)]
    bailout_sq: f64,
}

impl<'de> Deserialize<'de> for IterationParams {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            max_iterations: u32,
            #[serde(default = "default_bailout")]
            bailout: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.max_iterations, raw.bailout).map_err(serde::de::Error::custom)
    }
}

fn default_bailout() -> f64 {
    IterationParams::DEFAULT_BAILOUT
}

impl IterationParams {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 256;
    /// Bailout used for visible pixels.
    pub const DEFAULT_BAILOUT: f64 = 2.0;
    /// Bailout used for reference orbits, so samples stay defined a little
    /// past the visible escape radius.
    pub const REFERENCE_BAILOUT: f64 = 16.0;

    pub fn new(max_iterations: u32, bailout: f64) -> crate::Result<Self> {
        if max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(max_iterations));
        }
        if bailout <= 0.0 || !bailout.is_finite() {
            return Err(CoreError::InvalidBailout(bailout));
        }
        Ok(Self {
            max_iterations,
            bailout,
            bailout_sq: bailout * bailout,
        })
    }

    #[inline]
    pub fn bailout_sq(&self) -> f64 {
        self.bailout_sq
    }

    pub fn with_max_iterations(self, max_iterations: u32) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            ..self
        }
    }

    pub fn with_bailout(self, bailout: f64) -> crate::Result<Self> {
        Self::new(self.max_iterations, bailout)
    }
}

impl Default for IterationParams {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            bailout: Self::DEFAULT_BAILOUT,
            bailout_sq: Self::DEFAULT_BAILOUT * Self::DEFAULT_BAILOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-pixel result
// ---------------------------------------------------------------------------

/// Outcome of iterating one point.
///
/// For escaped points `final_z` is the first iterate outside the bailout
/// circle; smooth coloring reads its magnitude. Bounded points report
/// `iterations == max_iterations`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelResult {
    pub iterations: u32,
    pub final_z: Complex,
    pub escaped: bool,
}

impl PixelResult {
    #[inline]
    pub fn escaped(iterations: u32, final_z: Complex) -> Self {
        Self {
            iterations,
            final_z,
            escaped: true,
        }
    }

    #[inline]
    pub fn bounded(max_iterations: u32, final_z: Complex) -> Self {
        Self {
            iterations: max_iterations,
            final_z,
            escaped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let p = IterationParams::default();
        assert_eq!(p.max_iterations, 256);
        assert_eq!(p.bailout_sq(), 4.0);
    }

    #[test]
    fn invalid_params() {
        assert!(IterationParams::new(0, 2.0).is_err());
        assert!(IterationParams::new(10, 0.0).is_err());
        assert!(IterationParams::new(10, -1.0).is_err());
        assert!(IterationParams::new(10, f64::NAN).is_err());
        assert!(IterationParams::new(10, f64::INFINITY).is_err());
    }

    #[test]
    fn params_deserialize_recomputes_square() {
        let p: IterationParams =
            serde_json::from_str(r#"{"max_iterations": 100, "bailout": 16.0}"#).unwrap();
        assert_eq!(p.bailout_sq(), 256.0);
        let bad = serde_json::from_str::<IterationParams>(r#"{"max_iterations": 0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn text_form_round_trips() {
        let sets = [
            FractalSet::Mandelbrot,
            FractalSet::BurningShip,
            FractalSet::Tricorn,
            FractalSet::julia(-0.123, 0.745),
            FractalSet::julia(0.1 + 0.2, -1e-300),
            FractalSet::multibrot(3.0),
            FractalSet::multibrot(2.5),
            FractalSet::multibrot(-2.0),
        ];
        for set in sets {
            let text = set.to_string();
            let parsed: FractalSet = text.parse().unwrap();
            assert_eq!(parsed, set, "round trip of {text}");
        }
    }

    #[test]
    fn julia_round_trip_is_bit_identical() {
        let set = FractalSet::julia(0.1 + 0.2, std::f64::consts::PI);
        let FractalSet::Julia { c } = set.to_string().parse::<FractalSet>().unwrap() else {
            panic!("expected julia");
        };
        assert_eq!(c.re.to_bits(), (0.1f64 + 0.2).to_bits());
        assert_eq!(c.im.to_bits(), std::f64::consts::PI.to_bits());
    }

    #[test]
    fn presets_parse() {
        assert_eq!("julia:dendrite".parse::<FractalSet>().unwrap(), FractalSet::julia(0.0, 1.0));
        assert_eq!("julia:Rabbit".parse::<FractalSet>().unwrap(), FractalSet::julia(-0.123, 0.745));
        assert_eq!("multibrot:cubic".parse::<FractalSet>().unwrap(), FractalSet::multibrot(3.0));
    }

    #[test]
    fn malformed_text_is_rejected() {
        for bad in ["", "julia", "julia:1", "julia:a,b", "multibrot:inf", "mandelbrot:2", "newton"] {
            assert!(bad.parse::<FractalSet>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn serde_tagged_form() {
        let json = serde_json::to_string(&FractalSet::julia(0.0, 1.0)).unwrap();
        assert!(json.contains(r#""kind":"julia""#));
        let back: FractalSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FractalSet::julia(0.0, 1.0));
    }

    #[test]
    fn seed_splits_by_family() {
        let p = Complex::new(0.1, 0.2);
        assert_eq!(FractalSet::Mandelbrot.seed(p), (Complex::ZERO, p));
        let julia = FractalSet::julia(0.0, 1.0);
        assert_eq!(julia.seed(p), (p, Complex::new(0.0, 1.0)));
    }
}
