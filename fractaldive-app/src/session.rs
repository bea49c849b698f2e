//! Ties the view model, the reference-orbit service and the worker pool
//! together for the headless commands.

use tracing::{debug, info};

use fractaldive_core::{ReferenceOrbitService, Strategy, ViewModel, ViewRecord};
use fractaldive_render::{
    theme_by_name, ColorScale, ColorSettings, CompletedFrame, FrameSpec, Palette, TileScheduler,
};

use crate::error::AppError;
use crate::preferences::Preferences;
use crate::script::ScriptCommand;

pub struct Session {
    view: ViewModel,
    service: ReferenceOrbitService,
    scheduler: TileScheduler,
    max_iterations: u32,
    colors: ColorSettings,
}

impl Session {
    /// Start from a restored view. Companion settings in `record` win over
    /// the preferences.
    pub fn new(record: &ViewRecord, prefs: &Preferences) -> Result<Self, AppError> {
        let view = ViewModel::with_state(record.set, record.view, prefs.width, prefs.height)?;
        let colors = colors_for(record, prefs);
        let mut scheduler = TileScheduler::new(prefs.resolved_worker_count())?;
        scheduler.set_palette(Palette::new(&colors));
        debug!(
            set = %record.set,
            workers = scheduler.worker_count(),
            theme = colors.theme.name,
            "Session started"
        );
        Ok(Self {
            view,
            service: ReferenceOrbitService::new(),
            scheduler,
            max_iterations: prefs.default_max_iterations,
            colors,
        })
    }

    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    pub fn colors(&self) -> &ColorSettings {
        &self.colors
    }

    pub fn palette(&self) -> &Palette {
        self.scheduler.palette()
    }

    pub fn references_computed(&self) -> u64 {
        self.service.computed()
    }

    /// Snapshot of the view's destination, with the active color settings.
    pub fn record(&self) -> ViewRecord {
        let mut record = ViewRecord::new(self.view.target(), *self.view.set());
        record.theme = Some(self.colors.theme.name.to_string());
        record.scale = Some(self.colors.scale.to_string());
        record.offset = Some(self.colors.offset);
        record
    }

    /// The frame for what is currently on screen.
    pub fn frame_spec(&self) -> FrameSpec {
        let (width, height) = self.view.size();
        FrameSpec::new(self.view.current(), *self.view.set(), width, height, self.max_iterations)
    }

    /// Render the current view on the worker pool.
    ///
    /// A deep view gets a reference orbit first. While animating or dragging
    /// the existing orbit is kept, and a frame with too many glitches drops
    /// the orbit so the next settled render selects a new one.
    pub fn render(&mut self) -> Result<CompletedFrame, AppError> {
        let spec = self.frame_spec();
        let viewport = spec.viewport();
        let orbit = match viewport.strategy(&spec.set) {
            Strategy::Perturbation => self.service.orbit_for(
                &viewport,
                &spec.set,
                spec.max_iterations,
                self.view.allows_reference_refresh(),
            ),
            _ => None,
        };
        let frame = self.scheduler.render_blocking(&spec, orbit)?;
        if frame.needs_new_reference() {
            self.service.invalidate();
        }
        Ok(frame)
    }

    /// Apply one script command. Returns a frame for `render`.
    pub fn apply(&mut self, command: &ScriptCommand) -> Result<Option<CompletedFrame>, AppError> {
        match *command {
            ScriptCommand::ZoomIn { x, y } => self.view.zoom_at(x, y, true),
            ScriptCommand::ZoomOut { x, y } => self.view.zoom_at(x, y, false),
            ScriptCommand::Wheel { x, y, factor } => {
                if !self.view.zoom_at_instant(x, y, factor) {
                    debug!(factor, "Ignored wheel zoom");
                }
            }
            ScriptCommand::Pan { dx, dy } => self.view.pan(dx, dy),
            ScriptCommand::DragStart => self.view.set_dragging(true),
            ScriptCommand::DragEnd => self.view.set_dragging(false),
            ScriptCommand::Reset => self.view.reset(),
            ScriptCommand::Goto { x, y, zoom } => self.view.navigate_to(x, y, zoom)?,
            ScriptCommand::Tick(dt) => {
                self.view.tick(dt);
            }
            ScriptCommand::Set(set) => {
                self.view.set_fractal(set);
                self.service.invalidate();
            }
            ScriptCommand::Render => return self.render().map(Some),
        }
        Ok(None)
    }

    /// Replay a script and return the last rendered frame with its spec.
    pub fn run_script(
        &mut self,
        commands: &[ScriptCommand],
    ) -> Result<Option<(FrameSpec, CompletedFrame)>, AppError> {
        let mut last = None;
        for command in commands {
            let spec = self.frame_spec();
            if let Some(frame) = self.apply(command)? {
                info!(
                    task_id = frame.task_id,
                    zoom = self.view.current().zoom(),
                    elapsed_ms = frame.elapsed.as_millis(),
                    "Rendered script frame"
                );
                last = Some((spec, frame));
            }
        }
        Ok(last)
    }
}

pub(crate) fn colors_for(record: &ViewRecord, prefs: &Preferences) -> ColorSettings {
    let mut colors = prefs.color_settings();
    if let Some(theme) = &record.theme {
        colors.theme = theme_by_name(theme);
    }
    if let Some(scale) = record.scale.as_deref().and_then(|s| s.parse::<ColorScale>().ok()) {
        colors.scale = scale;
    }
    if let Some(offset) = record.offset {
        colors.offset = offset;
    }
    colors
}
