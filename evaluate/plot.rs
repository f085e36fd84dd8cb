//! ROC / precision-recall figure rendering.
//!
//! The figure holds two panels side by side: ROC curves with the chance diagonal on
//! the left, precision-recall curves on the right, one line and one legend entry per
//! submission. Text is rasterised from a TrueType font; when none can be found the
//! panels are still drawn, just without captions, tick labels or legends.

use crate::config::PlotConfig;
use crate::curves::CurveSeries;
use plotters::prelude::*;
use plotters::style::{FontStyle, register_font};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

const FONT_FAMILY: &str = "sans-serif";
const POINTS_PER_INCH: f64 = 72.0;

const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to draw figure: {0}")]
    Drawing(String),
    #[error("Font '{path}' could not be loaded: {reason}")]
    Font { path: PathBuf, reason: String },
}

/// Whether text made it into the rendered figure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextRendering {
    Labelled,
    Unlabelled,
}

/// Renders the two-panel figure to `path` as PNG.
pub fn render_curves(
    path: &Path,
    series: &[CurveSeries],
    config: &PlotConfig,
) -> Result<TextRendering, PlotError> {
    let text = ensure_font(config.font_path.as_deref())?;
    if text == TextRendering::Unlabelled {
        log::warn!("No TrueType font found; the figure will be drawn without text");
    }

    let (width, height) = config.pixel_size();
    let scale = Scale::new(config.dpi);
    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(drawing_error)?;
    let (left, right) = root.split_horizontally((width / 2) as i32);

    draw_panel(
        &left,
        Panel::Roc,
        series.iter().map(|s| (s.roc.as_slice(), s.roc_legend())),
        text,
        &scale,
    )?;
    draw_panel(
        &right,
        Panel::PrecisionRecall,
        series.iter().map(|s| (s.pr.as_slice(), s.pr_legend())),
        text,
        &scale,
    )?;

    root.present().map_err(drawing_error)?;
    log::info!(
        "Wrote {}x{} figure with {} curves per panel to '{}'",
        width,
        height,
        series.len(),
        path.display()
    );
    Ok(text)
}

#[derive(Clone, Copy, Debug)]
enum Panel {
    Roc,
    PrecisionRecall,
}

impl Panel {
    fn caption(self) -> &'static str {
        match self {
            Self::Roc => "ROC curve",
            Self::PrecisionRecall => "Precision-recall curve",
        }
    }

    fn axis_descriptions(self) -> (&'static str, &'static str) {
        match self {
            Self::Roc => ("False positive rate", "True positive rate"),
            Self::PrecisionRecall => ("Recall", "Precision"),
        }
    }

    fn legend_position(self) -> SeriesLabelPosition {
        match self {
            Self::Roc => SeriesLabelPosition::LowerRight,
            Self::PrecisionRecall => SeriesLabelPosition::LowerLeft,
        }
    }
}

/// Converts typographic points to pixels at the figure's dpi.
struct Scale {
    pixels_per_point: f64,
}

impl Scale {
    fn new(dpi: u32) -> Self {
        Self {
            pixels_per_point: f64::from(dpi) / POINTS_PER_INCH,
        }
    }

    fn pt(&self, points: f64) -> f64 {
        points * self.pixels_per_point
    }

    fn px(&self, points: f64) -> u32 {
        (points * self.pixels_per_point).round().max(1.0) as u32
    }
}

fn draw_panel<'a, DB, I>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    panel: Panel,
    curves: I,
    text: TextRendering,
    scale: &Scale,
) -> Result<(), PlotError>
where
    DB: DrawingBackend,
    I: Iterator<Item = (&'a [(f64, f64)], String)>,
{
    let labelled = text == TextRendering::Labelled;
    let mut builder = ChartBuilder::on(area);
    builder.margin(scale.px(8.0));
    if labelled {
        builder
            .caption(panel.caption(), (FONT_FAMILY, scale.pt(14.0)))
            .x_label_area_size(scale.px(32.0))
            .y_label_area_size(scale.px(40.0));
    }
    let mut chart = builder
        .build_cartesian_2d(0f64..1f64, 0f64..1.05f64)
        .map_err(drawing_error)?;

    if labelled {
        let (x_desc, y_desc) = panel.axis_descriptions();
        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .label_style((FONT_FAMILY, scale.pt(10.0)))
            .axis_desc_style((FONT_FAMILY, scale.pt(11.0)))
            .light_line_style(WHITE.mix(0.0))
            .draw()
            .map_err(drawing_error)?;
    } else {
        chart
            .plotting_area()
            .draw(&Rectangle::new(
                [(0.0, 0.0), (1.0, 1.05)],
                BLACK.stroke_width(scale.px(0.8)),
            ))
            .map_err(drawing_error)?;
    }

    if let Panel::Roc = panel {
        chart
            .draw_series(LineSeries::new(
                vec![(0.0, 0.0), (1.0, 1.0)],
                BLACK.mix(0.4).stroke_width(scale.px(1.0)),
            ))
            .map_err(drawing_error)?;
    }

    let line_width = scale.px(1.5);
    let legend_length = scale.px(20.0) as i32;
    for (index, (points, legend)) in curves.enumerate() {
        if points.is_empty() {
            log::warn!("{legend}: curve is undefined and is left out of the figure");
            continue;
        }
        let style = Palette99::pick(index).stroke_width(line_width);
        let drawn = chart
            .draw_series(LineSeries::new(points.iter().copied(), style))
            .map_err(drawing_error)?;
        if labelled {
            drawn.label(legend).legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + legend_length, y)], style)
            });
        }
    }

    if labelled {
        chart
            .configure_series_labels()
            .position(panel.legend_position())
            .label_font((FONT_FAMILY, scale.pt(9.0)))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(drawing_error)?;
    }
    Ok(())
}

fn drawing_error<E: std::error::Error + Send + Sync>(
    err: plotters::drawing::DrawingAreaErrorKind<E>,
) -> PlotError {
    PlotError::Drawing(err.to_string())
}

static REGISTERED_FONT: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Registers a font for the figure text once per process.
///
/// An explicitly configured font must load; otherwise the first readable system
/// candidate is used, and having none is not an error.
fn ensure_font(configured: Option<&str>) -> Result<TextRendering, PlotError> {
    if let Some(path) = configured {
        let path = PathBuf::from(path);
        if REGISTERED_FONT.get().and_then(|p| p.as_ref()) == Some(&path) {
            return Ok(TextRendering::Labelled);
        }
        let bytes = fs::read(&path).map_err(|e| PlotError::Font {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        register(&path, bytes)?;
        let _ = REGISTERED_FONT.set(Some(path));
        return Ok(TextRendering::Labelled);
    }

    let registered = REGISTERED_FONT.get_or_init(|| {
        SYSTEM_FONT_CANDIDATES.iter().find_map(|candidate| {
            let path = PathBuf::from(candidate);
            let bytes = fs::read(&path).ok()?;
            match register(&path, bytes) {
                Ok(()) => {
                    log::debug!("Using font '{}'", path.display());
                    Some(path)
                }
                Err(err) => {
                    log::debug!("{err}");
                    None
                }
            }
        })
    });
    Ok(if registered.is_some() {
        TextRendering::Labelled
    } else {
        TextRendering::Unlabelled
    })
}

fn register(path: &Path, bytes: Vec<u8>) -> Result<(), PlotError> {
    // The font registry keeps a 'static reference; fonts are registered at most once
    // per path, so the leak is bounded.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    register_font(FONT_FAMILY, FontStyle::Normal, bytes).map_err(|_| PlotError::Font {
        path: path.to_path_buf(),
        reason: "not a valid TrueType/OpenType font".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_config() -> PlotConfig {
        PlotConfig {
            width_in: 4.0,
            height_in: 2.0,
            dpi: 50,
            font_path: None,
        }
    }

    #[test]
    fn renders_png_with_or_without_fonts() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("roc_pr_curves.png");
        let series = vec![CurveSeries {
            label: "challenge-teamA-run1".to_string(),
            roc: vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)],
            pr: vec![(0.0, 1.0), (1.0, 1.0)],
            roc_auc: 1.0,
            average_precision: 1.0,
        }];
        render_curves(&path, &series, &small_config()).expect("render");
        let bytes = fs::read(&path).expect("read png");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn missing_configured_font_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let mut config = small_config();
        config.font_path = Some(dir.path().join("absent.ttf").to_string_lossy().into_owned());
        let err = render_curves(&dir.path().join("out.png"), &[], &config).expect_err("font");
        assert!(matches!(err, PlotError::Font { .. }));
    }

    #[test]
    fn configured_file_that_is_not_a_font_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let font = dir.path().join("broken.ttf");
        fs::write(&font, b"not a font").expect("write font");
        let mut config = small_config();
        config.font_path = Some(font.to_string_lossy().into_owned());
        let err = render_curves(&dir.path().join("out.png"), &[], &config).expect_err("font");
        match err {
            PlotError::Font { path, reason } => {
                assert_eq!(path, font);
                assert_eq!(reason, "not a valid TrueType/OpenType font");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn point_scale_tracks_dpi() {
        assert_eq!(Scale::new(72).px(10.0), 10);
        assert_eq!(Scale::new(300).px(1.5), 6);
        assert_eq!(Scale::new(10).px(0.1), 1);
    }
}
