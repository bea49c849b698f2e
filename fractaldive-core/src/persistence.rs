//! Text codec for a view and its companion display settings.
//!
//! The form is a URL fragment: `#x=-0.5&y=0&z=1&set=julia:dendrite&theme=fire`.
//! Parsing never fails. Each malformed field is dropped and replaced by its
//! default, and a view missing any of `x`, `y` or `z` falls back to the
//! active set's default view.

use std::fmt::Write as _;

use tracing::debug;

use crate::complex_dd::ComplexDD;
use crate::double_double::DoubleDouble;
use crate::fractal::FractalSet;
use crate::view::ViewState;

/// A view plus the optional settings stored next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRecord {
    pub view: ViewState,
    pub set: FractalSet,
    pub theme: Option<String>,
    /// Color scale name (`log` or `linear`), interpreted by the renderer.
    pub scale: Option<String>,
    pub offset: Option<usize>,
}

impl Default for ViewRecord {
    fn default() -> Self {
        Self::new(ViewState::default(), FractalSet::default())
    }
}

impl ViewRecord {
    pub fn new(view: ViewState, set: FractalSet) -> Self {
        Self {
            view,
            set,
            theme: None,
            scale: None,
            offset: None,
        }
    }

    /// Decode a fragment, with or without the leading `#`.
    pub fn parse(hash: &str) -> Self {
        let mut x = None;
        let mut y = None;
        let mut z = None;
        let mut xl = 0.0;
        let mut yl = 0.0;
        let mut record = Self::default();

        for pair in hash.trim().trim_start_matches('#').split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "x" => x = finite(value),
                "y" => y = finite(value),
                "z" => z = finite(value).filter(|z| *z > 0.0),
                "xl" => xl = finite(value).unwrap_or(0.0),
                "yl" => yl = finite(value).unwrap_or(0.0),
                "set" => match value.parse() {
                    Ok(set) => record.set = set,
                    Err(e) => debug!(%e, "ignoring stored fractal set"),
                },
                "theme" if !value.is_empty() => record.theme = Some(value.to_string()),
                "scale" if !value.is_empty() => record.scale = Some(value.to_ascii_lowercase()),
                "offset" => record.offset = value.parse().ok(),
                _ => {}
            }
        }

        record.view = match (x, y, z) {
            (Some(x), Some(y), Some(z)) => {
                let center = ComplexDD::new(DoubleDouble::new(x, xl), DoubleDouble::new(y, yl));
                ViewState::from_center(center, z).unwrap_or_else(|_| ViewState::default_for(&record.set))
            }
            _ => ViewState::default_for(&record.set),
        };
        record
    }

    /// Encode as a fragment that [`parse`](Self::parse) restores exactly.
    pub fn to_hash(&self) -> String {
        let c = self.view.center();
        let mut out = format!("#x={:?}&y={:?}&z={:?}", c.re.hi, c.im.hi, self.view.zoom());
        if c.re.lo != 0.0 {
            let _ = write!(out, "&xl={:?}", c.re.lo);
        }
        if c.im.lo != 0.0 {
            let _ = write!(out, "&yl={:?}", c.im.lo);
        }
        let _ = write!(out, "&set={}", self.set);
        if let Some(theme) = &self.theme {
            let _ = write!(out, "&theme={theme}");
        }
        if let Some(scale) = &self.scale {
            let _ = write!(out, "&scale={scale}");
        }
        if let Some(offset) = self.offset {
            let _ = write!(out, "&offset={offset}");
        }
        out
    }
}

fn finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::Complex;

    #[test]
    fn empty_hash_is_default_view() {
        for hash in ["", "#", "#foo=bar", "#x=1&y=2"] {
            let r = ViewRecord::parse(hash);
            assert_eq!(r.view, ViewState::new(-0.5, 0.0, 1.0).unwrap(), "{hash:?}");
            assert_eq!(r.set, FractalSet::Mandelbrot);
        }
    }

    #[test]
    fn parses_view_fields() {
        let r = ViewRecord::parse("#x=-0.75&y=0.1&z=250");
        assert_eq!(r.view.center_x(), -0.75);
        assert_eq!(r.view.center_y(), 0.1);
        assert_eq!(r.view.zoom(), 250.0);
        assert_eq!(r.theme, None);
    }

    #[test]
    fn malformed_fields_fall_back() {
        let r = ViewRecord::parse("#x=abc&y=0&z=1");
        assert_eq!(r.view, ViewState::default());
        let r = ViewRecord::parse("#x=0&y=0&z=-5");
        assert_eq!(r.view, ViewState::default());
        let r = ViewRecord::parse("#x=0&y=0&z=NaN");
        assert_eq!(r.view, ViewState::default());
        let r = ViewRecord::parse("#x=0.1&y=0.2&z=3&set=spiral&offset=-2");
        assert_eq!(r.view.zoom(), 3.0);
        assert_eq!(r.set, FractalSet::Mandelbrot);
        assert_eq!(r.offset, None);
    }

    #[test]
    fn missing_view_uses_set_default() {
        let r = ViewRecord::parse("#set=burning-ship");
        assert_eq!(r.set, FractalSet::BurningShip);
        assert_eq!(r.view, ViewState::default_for(&FractalSet::BurningShip));
    }

    #[test]
    fn companion_fields() {
        let r = ViewRecord::parse("x=0&y=0&z=2&set=julia:rabbit&theme=fire&scale=LINEAR&offset=3");
        assert_eq!(r.set, FractalSet::julia(-0.123, 0.745));
        assert_eq!(r.theme.as_deref(), Some("fire"));
        assert_eq!(r.scale.as_deref(), Some("linear"));
        assert_eq!(r.offset, Some(3));
    }

    #[test]
    fn hash_round_trip_is_exact() {
        let center = ComplexDD::from_f64(-1.7490863748149414, 0.1)
            .offset(Complex::new(1.2345e-19, -9.87e-20));
        let view = ViewState::from_center(center, 3.3e17).unwrap();
        let mut record = ViewRecord::new(view, FractalSet::multibrot(3.5));
        record.theme = Some("ocean".into());
        record.scale = Some("log".into());
        record.offset = Some(5);

        let hash = record.to_hash();
        assert!(hash.contains("&xl="));
        let back = ViewRecord::parse(&hash);
        assert_eq!(back, record);
        assert_eq!(back.view.center().re.lo, center.re.lo);
    }

    #[test]
    fn shallow_hash_omits_low_words() {
        let record = ViewRecord::new(ViewState::new(-0.5, 0.0, 1.0).unwrap(), FractalSet::Tricorn);
        let hash = record.to_hash();
        assert_eq!(hash, "#x=-0.5&y=0.0&z=1.0&set=tricorn");
        assert_eq!(ViewRecord::parse(&hash), record);
    }
}
