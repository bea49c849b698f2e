//! Text scripts of view interactions, one command per line.

use std::str::FromStr;
use std::time::Duration;

use fractaldive_core::FractalSet;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    ZoomIn { x: f64, y: f64 },
    ZoomOut { x: f64, y: f64 },
    Wheel { x: f64, y: f64, factor: f64 },
    Pan { dx: f64, dy: f64 },
    DragStart,
    DragEnd,
    Reset,
    Goto { x: f64, y: f64, zoom: f64 },
    Tick(Duration),
    Set(FractalSet),
    Render,
}

impl FromStr for ScriptCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or("empty command")?;
        let args: Vec<&str> = words.collect();

        let command = match (name, args.as_slice()) {
            ("zoom-in", [x, y]) => Self::ZoomIn {
                x: number(x)?,
                y: number(y)?,
            },
            ("zoom-out", [x, y]) => Self::ZoomOut {
                x: number(x)?,
                y: number(y)?,
            },
            ("wheel", [x, y, factor]) => Self::Wheel {
                x: number(x)?,
                y: number(y)?,
                factor: number(factor)?,
            },
            ("pan", [dx, dy]) => Self::Pan {
                dx: number(dx)?,
                dy: number(dy)?,
            },
            ("drag-start", []) => Self::DragStart,
            ("drag-end", []) => Self::DragEnd,
            ("reset", []) => Self::Reset,
            ("goto", [x, y, zoom]) => Self::Goto {
                x: number(x)?,
                y: number(y)?,
                zoom: number(zoom)?,
            },
            ("tick", [ms]) => {
                let ms: u64 = ms.parse().map_err(|_| format!("invalid duration: {ms}"))?;
                Self::Tick(Duration::from_millis(ms))
            }
            ("set", [set]) => Self::Set(set.parse().map_err(|e| format!("{e}"))?),
            ("render", []) => Self::Render,
            (
                "zoom-in" | "zoom-out" | "wheel" | "pan" | "drag-start" | "drag-end" | "reset" | "goto"
                | "tick" | "set" | "render",
                _,
            ) => return Err(format!("wrong number of arguments for '{name}'")),
            _ => return Err(format!("unknown command '{name}'")),
        };
        Ok(command)
    }
}

fn number(word: &str) -> Result<f64, String> {
    word.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid number: {word}"))
}

/// Parse a whole script. Blank lines and `#` comments are skipped.
pub fn parse_script(text: &str) -> Result<Vec<ScriptCommand>, AppError> {
    text.lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let line = raw.split('#').next().unwrap_or("").trim();
            (!line.is_empty()).then_some((i + 1, line))
        })
        .map(|(line, text)| {
            text.parse()
                .map_err(|message| AppError::Script { line, message })
        })
        .collect()
}
