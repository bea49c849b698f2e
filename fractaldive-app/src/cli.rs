//! Command-line parsing. Arguments are parsed by hand; there are only three
//! commands and a handful of positional values.

use std::path::PathBuf;

use crate::error::AppError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
fractaldive - deep-zoom escape-time fractal renderer

USAGE:
    fractaldive render [#hash] [out.png]
    fractaldive zoom   [#hash] [target-zoom] [out-dir]
    fractaldive script <file> [out.png]

The view hash has the form '#x=-0.5&y=0&z=1&set=mandelbrot&theme=fire'.
Without a hash the last saved view is restored (when enabled in the
preferences file), otherwise the default view of the set is used.

SCRIPT COMMANDS (one per line, '#' starts a comment):
    zoom-in PX PY          animated 2x zoom toward a screen point
    zoom-out PX PY         animated 2x zoom away from a screen point
    wheel PX PY FACTOR     instant zoom by FACTOR about a screen point
    pan DX DY              move the view by a screen-pixel delta
    drag-start / drag-end  bracket a drag gesture
    reset                  animate back to the default view
    goto X Y ZOOM          jump to an explicit view
    tick MS                advance the animation clock
    set SET                switch fractal (mandelbrot, julia:rabbit, ...)
    render                 render the current view

ENVIRONMENT VARIABLES:
    RUST_LOG               log filter (default: info)";

pub const DEFAULT_OUTPUT: &str = "fractaldive.png";
pub const DEFAULT_FRAMES_DIR: &str = "frames";
pub const DEFAULT_TARGET_ZOOM: f64 = 1e6;

/// A parsed invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Render {
        hash: Option<String>,
        output: PathBuf,
    },
    Zoom {
        hash: Option<String>,
        target_zoom: f64,
        out_dir: PathBuf,
    },
    Script {
        file: PathBuf,
        output: Option<PathBuf>,
    },
    Help,
    Version,
}

impl Command {
    /// Parse the arguments that follow the program name.
    pub fn parse(args: &[String]) -> Result<Self, AppError> {
        let Some((command, rest)) = args.split_first() else {
            return Ok(Self::Help);
        };
        match command.as_str() {
            "--help" | "-h" | "help" => Ok(Self::Help),
            "--version" | "-V" => Ok(Self::Version),
            "render" => {
                let mut hash = None;
                let mut output = None;
                for arg in rest {
                    if is_hash(arg) && hash.is_none() {
                        hash = Some(arg.clone());
                    } else if output.is_none() {
                        output = Some(PathBuf::from(arg));
                    } else {
                        return Err(unexpected(arg));
                    }
                }
                Ok(Self::Render {
                    hash,
                    output: output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
                })
            }
            "zoom" => {
                let mut hash = None;
                let mut target_zoom = None;
                let mut out_dir = None;
                for arg in rest {
                    if is_hash(arg) && hash.is_none() {
                        hash = Some(arg.clone());
                    } else if let (None, Ok(z)) = (target_zoom, arg.parse::<f64>()) {
                        if !(z.is_finite() && z > 0.0) {
                            return Err(AppError::Usage(format!("invalid target zoom: {arg}")));
                        }
                        target_zoom = Some(z);
                    } else if out_dir.is_none() {
                        out_dir = Some(PathBuf::from(arg));
                    } else {
                        return Err(unexpected(arg));
                    }
                }
                Ok(Self::Zoom {
                    hash,
                    target_zoom: target_zoom.unwrap_or(DEFAULT_TARGET_ZOOM),
                    out_dir: out_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_FRAMES_DIR)),
                })
            }
            "script" => match rest {
                [file] => Ok(Self::Script {
                    file: PathBuf::from(file),
                    output: None,
                }),
                [file, output] => Ok(Self::Script {
                    file: PathBuf::from(file),
                    output: Some(PathBuf::from(output)),
                }),
                [] => Err(AppError::Usage("script needs a file".into())),
                [_, _, extra, ..] => Err(unexpected(extra)),
            },
            other => Err(AppError::Usage(format!("unknown command: {other}"))),
        }
    }
}

fn is_hash(arg: &str) -> bool {
    arg.starts_with('#')
}

fn unexpected(arg: &str) -> AppError {
    AppError::Usage(format!("unexpected argument: {arg}"))
}
