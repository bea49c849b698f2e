mod app_dir;
mod cli;
mod error;
mod preferences;
mod script;
mod session;

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use tracing::{error, info};

use fractaldive_core::{ViewRecord, ViewState};
use fractaldive_render::{
    export_png, render_zoom_sequence, ExportMetadata, FrameSpec, Palette, RenderBuffer, ZoomSequence,
};

use cli::Command;
use error::AppError;
use preferences::Preferences;
use session::Session;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Run with --help for usage information.");
            return ExitCode::from(2);
        }
    };

    let mut prefs = Preferences::load();
    let result = match command {
        Command::Help => {
            println!("{}", cli::HELP_TEXT);
            Ok(())
        }
        Command::Version => {
            println!("fractaldive {}", cli::VERSION);
            Ok(())
        }
        Command::Render { hash, output } => run_render(&mut prefs, hash.as_deref(), &output),
        Command::Zoom {
            hash,
            target_zoom,
            out_dir,
        } => run_zoom(&prefs, hash.as_deref(), target_zoom, &out_dir),
        Command::Script { file, output } => run_script(&mut prefs, &file, output.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// The view to start from: an explicit hash, else the saved view, else the default.
fn starting_record(prefs: &Preferences, hash: Option<&str>) -> ViewRecord {
    match (hash, &prefs.last_view) {
        (Some(hash), _) => ViewRecord::parse(hash),
        (None, Some(last)) if prefs.restore_last_view => {
            info!(view = %last, "Restoring last view");
            ViewRecord::parse(last)
        }
        _ => ViewRecord::default(),
    }
}

fn save_view(prefs: &mut Preferences, session: &Session) {
    prefs.last_view = Some(session.record().to_hash());
    prefs.save();
}

fn write_frame(session: &Session, spec: &FrameSpec, pixels: &RenderBuffer, path: &Path) -> Result<(), AppError> {
    let meta = ExportMetadata::new(spec.view, &spec.set, spec.max_iterations, session.palette());
    export_png(pixels, path, &meta)?;
    Ok(())
}

fn run_render(prefs: &mut Preferences, hash: Option<&str>, output: &Path) -> Result<(), AppError> {
    let record = starting_record(prefs, hash);
    let mut session = Session::new(&record, prefs)?;
    let spec = session.frame_spec();
    let frame = session.render()?;
    info!(
        elapsed_ms = frame.elapsed.as_millis(),
        glitched = frame.glitched,
        escaped = frame.iterations.escaped_count(),
        "Rendered still"
    );
    write_frame(&session, &spec, &frame.pixels, output)?;
    save_view(prefs, &session);
    Ok(())
}

fn run_zoom(prefs: &Preferences, hash: Option<&str>, target_zoom: f64, out_dir: &Path) -> Result<(), AppError> {
    let record = starting_record(prefs, hash);
    let target = ViewState::from_center(record.view.center(), target_zoom)?;
    let sequence = ZoomSequence::new(target, record.view.zoom(), prefs.zoom_frames.max(1));
    std::fs::create_dir_all(out_dir)?;

    let palette = Palette::new(&session::colors_for(&record, prefs));
    let cancel = AtomicBool::new(false);
    let frames = render_zoom_sequence(
        &sequence,
        &record.set,
        (prefs.width, prefs.height),
        prefs.default_max_iterations,
        &palette,
        &cancel,
        |index, spec, pixels| {
            let meta = ExportMetadata::new(spec.view, &spec.set, spec.max_iterations, &palette);
            export_png(pixels, &out_dir.join(format!("frame_{index:05}.png")), &meta)
        },
    )?;
    info!(frames, dir = %out_dir.display(), "Zoom sequence written");
    Ok(())
}

fn run_script(prefs: &mut Preferences, file: &Path, output: Option<&Path>) -> Result<(), AppError> {
    let text = std::fs::read_to_string(file)?;
    let commands = script::parse_script(&text)?;
    let record = starting_record(prefs, None);
    let mut session = Session::new(&record, prefs)?;

    let last = session.run_script(&commands)?;
    match (last, output) {
        (Some((spec, frame)), Some(path)) => write_frame(&session, &spec, &frame.pixels, path)?,
        (None, Some(_)) => info!("Script rendered nothing; no image written"),
        _ => {}
    }
    save_view(prefs, &session);
    info!(
        view = %session.record().to_hash(),
        animating = session.view().is_animating(),
        references = session.references_computed(),
        "Script finished"
    );
    Ok(())
}
