//! PNG export with embedded metadata (tEXt chunks), and the zoom-sequence
//! batch loop used for video frames.

use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use fractaldive_core::{FractalSet, ReferenceOrbitService, ViewRecord, ViewState};

use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::palette::Palette;
use crate::protocol::FrameSpec;
use crate::renderer::{render_frame, RenderCancel};

pub const SOFTWARE: &str = "fractaldive";

/// Metadata to embed in an exported PNG as tEXt chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportMetadata {
    pub software: String,
    pub view_hash: String,
    pub set: String,
    pub max_iterations: u32,
    pub theme: String,
    pub scale: String,
}

impl ExportMetadata {
    /// Describe a frame rendered with `palette`.
    pub fn new(view: ViewState, set: &FractalSet, max_iterations: u32, palette: &Palette) -> Self {
        let mut record = ViewRecord::new(view, *set);
        record.theme = Some(palette.name().to_string());
        record.scale = Some(palette.scale().to_string());
        Self {
            software: SOFTWARE.to_string(),
            view_hash: record.to_hash(),
            set: set.to_string(),
            max_iterations,
            theme: palette.name().to_string(),
            scale: palette.scale().to_string(),
        }
    }

    fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Software", self.software.clone()),
            ("fractaldive.View", self.view_hash.clone()),
            ("fractaldive.Set", self.set.clone()),
            ("fractaldive.MaxIterations", self.max_iterations.to_string()),
            ("fractaldive.Theme", self.theme.clone()),
            ("fractaldive.Scale", self.scale.clone()),
        ]
    }
}

/// Write an RGBA buffer as a PNG file with embedded view metadata.
///
/// Uses the `png` crate directly so custom tEXt chunks can be added.
pub fn export_png(buffer: &RenderBuffer, path: &Path, metadata: &ExportMetadata) -> crate::Result<()> {
    if buffer.width == 0 || buffer.height == 0 {
        return Err(RenderError::InvalidDimensions {
            width: buffer.width,
            height: buffer.height,
        });
    }
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, buffer.width, buffer.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    for (key, value) in metadata.pairs() {
        encoder.add_text_chunk(key.to_string(), value)?;
    }

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&buffer.pixels)?;
    png_writer.finish()?;

    info!(
        width = buffer.width,
        height = buffer.height,
        path = %path.display(),
        "Exported PNG"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Zoom sequences
// ---------------------------------------------------------------------------

/// A zoom from `start_zoom` to the target's zoom, centered on the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomSequence {
    pub target: ViewState,
    pub start_zoom: f64,
    pub frames: u32,
}

impl ZoomSequence {
    pub fn new(target: ViewState, start_zoom: f64, frames: u32) -> Self {
        Self {
            target,
            start_zoom,
            frames,
        }
    }

    /// View of frame `index`, with zoom interpolated geometrically.
    pub fn frame_view(&self, index: u32) -> crate::Result<ViewState> {
        let end = self.target.zoom();
        let zoom = if self.frames <= 1 {
            end
        } else {
            let t = index.min(self.frames - 1) as f64 / (self.frames - 1) as f64;
            self.start_zoom * (end / self.start_zoom).powf(t)
        };
        Ok(ViewState::from_center(self.target.center(), zoom)?)
    }
}

/// Render every frame of `sequence` one at a time.
///
/// `cancel` is checked before each frame; once it is set the loop stops
/// and returns [`RenderError::Cancelled`]. Each colorized frame is handed
/// to `sink` with its index. Returns the number of frames rendered.
pub fn render_zoom_sequence<F>(
    sequence: &ZoomSequence,
    set: &FractalSet,
    size: (u32, u32),
    max_iterations: u32,
    palette: &Palette,
    cancel: &AtomicBool,
    mut sink: F,
) -> crate::Result<u32>
where
    F: FnMut(u32, &FrameSpec, &RenderBuffer) -> crate::Result<()>,
{
    let mut service = ReferenceOrbitService::new();
    let render_cancel = RenderCancel::new();

    for index in 0..sequence.frames {
        if cancel.load(Ordering::Relaxed) {
            info!(rendered = index, "Zoom sequence cancelled");
            return Err(RenderError::Cancelled);
        }
        let spec = FrameSpec::new(sequence.frame_view(index)?, *set, size.0, size.1, max_iterations);
        let result = render_frame(&spec, &mut service, &render_cancel)?;
        let pixels = palette.colorize(&result.iterations);
        debug!(
            index,
            zoom = spec.view.zoom(),
            elapsed_ms = result.elapsed.as_millis(),
            "Sequence frame rendered"
        );
        sink(index, &spec, &pixels)?;
    }
    info!(
        frames = sequence.frames,
        references = service.computed(),
        "Zoom sequence complete"
    );
    Ok(sequence.frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{theme_by_name, ColorScale, ColorSettings};

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::create_dir_all(&dir);
        dir
    }

    fn metadata() -> ExportMetadata {
        let palette = Palette::new(&ColorSettings {
            theme: theme_by_name("fire"),
            scale: ColorScale::Linear,
            offset: 0,
        });
        ExportMetadata::new(
            ViewState::new(-0.4, -0.5, 1.0).unwrap(),
            &FractalSet::BurningShip,
            100,
            &palette,
        )
    }

    #[test]
    fn metadata_describes_view() {
        let meta = metadata();
        assert_eq!(meta.software, "fractaldive");
        assert_eq!(meta.set, "burning-ship");
        assert_eq!(meta.theme, "fire");
        assert_eq!(meta.scale, "linear");
        let record = ViewRecord::parse(&meta.view_hash);
        assert_eq!(record.view.center_x(), -0.4);
        assert_eq!(record.set, FractalSet::BurningShip);
    }

    #[test]
    fn export_embeds_text_chunks() {
        let buffer = RenderBuffer::new(3, 2);
        let dir = temp_dir("fractaldive_test_export");
        let path = dir.join("meta.png");
        export_png(&buffer, &path, &metadata()).expect("export should succeed");

        let decoder = png::Decoder::new(std::fs::File::open(&path).expect("file should exist"));
        let reader = decoder.read_info().expect("should read info");
        let info = reader.info();
        assert_eq!((info.width, info.height), (3, 2));
        let texts = &info.uncompressed_latin1_text;
        assert!(texts.iter().any(|t| t.keyword == "Software" && t.text == "fractaldive"));
        assert!(texts.iter().any(|t| t.keyword == "fractaldive.Set" && t.text == "burning-ship"));
        assert!(texts.iter().any(|t| t.keyword == "fractaldive.MaxIterations" && t.text == "100"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let buffer = RenderBuffer::new(0, 0);
        let path = std::env::temp_dir().join("fractaldive_never_written.png");
        assert!(matches!(
            export_png(&buffer, &path, &metadata()),
            Err(RenderError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn sequence_zoom_is_geometric() {
        let seq = ZoomSequence::new(ViewState::new(-0.75, 0.1, 1000.0).unwrap(), 1.0, 4);
        let zooms: Vec<f64> = (0..4).map(|i| seq.frame_view(i).unwrap().zoom()).collect();
        assert_eq!(zooms[0], 1.0);
        assert!((zooms[1] - 10.0).abs() < 1e-9);
        assert!((zooms[2] - 100.0).abs() < 1e-7);
        assert!((zooms[3] - 1000.0).abs() < 1e-6);
        assert_eq!(seq.frame_view(2).unwrap().center(), seq.target.center());
    }

    #[test]
    fn single_frame_sequence_is_the_target() {
        let seq = ZoomSequence::new(ViewState::new(0.0, 0.0, 50.0).unwrap(), 1.0, 1);
        assert_eq!(seq.frame_view(0).unwrap().zoom(), 50.0);
    }

    #[test]
    fn sequence_hands_every_frame_to_sink() {
        let seq = ZoomSequence::new(ViewState::new(-0.75, 0.1, 64.0).unwrap(), 1.0, 3);
        let cancel = AtomicBool::new(false);
        let mut seen = Vec::new();
        let n = render_zoom_sequence(
            &seq,
            &FractalSet::Mandelbrot,
            (24, 16),
            100,
            &Palette::default(),
            &cancel,
            |i, spec, buf| {
                seen.push((i, spec.view.zoom(), buf.pixels.len()));
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(n, 3);
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|&(_, _, len)| len == 24 * 16 * 4));
        assert!(seen[2].1 > seen[0].1);
    }

    #[test]
    fn sequence_stops_when_cancelled() {
        let seq = ZoomSequence::new(ViewState::new(-0.75, 0.1, 64.0).unwrap(), 1.0, 5);
        let cancel = AtomicBool::new(false);
        let mut frames = 0;
        let result = render_zoom_sequence(
            &seq,
            &FractalSet::Mandelbrot,
            (8, 8),
            50,
            &Palette::default(),
            &cancel,
            |i, _, _| {
                frames += 1;
                if i == 1 {
                    cancel.store(true, Ordering::Relaxed);
                }
                Ok(())
            },
        );
        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert_eq!(frames, 2);
    }
}
