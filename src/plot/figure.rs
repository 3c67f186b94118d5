//! Three-panel diagnostic figure, rendered with Plotters.
//!
//! Panels, left to right:
//! 1. calibration curve: standards plus the fitted line
//! 2. studentised residuals with the ±2 outlier band
//! 3. % relative error with the 15% (caution) and 20% (failure) lines
//!
//! Figure data is assembled first ([`DiagnosticFigure::build`]) and rendering
//! only draws it, so the data prep is testable without touching the filesystem.
//! Log axes are drawn by plotting `log10` values with power-of-ten tick labels.
//! Text uses an embedded DejaVu Sans, so no system fonts are needed.

use std::error::Error;
use std::path::Path;
use std::sync::OnceLock;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontStyle, register_font};

use crate::domain::{CalibrationDataset, DiagnosticsResult, ImageFormat};
use crate::error::AppError;
use crate::fit::FittedModel;
use crate::plot::config::{AxisScale, AxisSettings, FigureSettings, PlotConfiguration};
use crate::report::{RELATIVE_ERROR_CAUTION, RELATIVE_ERROR_FAILURE, STUDENTIZED_THRESHOLD};

/// Number of samples along the fitted calibration line.
pub const LINE_SAMPLES: usize = 1000;

const MARKER_FILL: RGBColor = RGBColor(31, 119, 180);
const CAUTION: RGBColor = RGBColor(214, 180, 0);

const FONT_FAMILY: &str = "sans-serif";
static SANS_SERIF: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Register the embedded font under `sans-serif` once per process.
fn ensure_fonts() -> Result<(), AppError> {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    let ok = *REGISTERED.get_or_init(|| register_font(FONT_FAMILY, FontStyle::Normal, SANS_SERIF).is_ok());
    if ok {
        Ok(())
    } else {
        Err(AppError::Render("embedded font could not be loaded".to_string()))
    }
}

/// A horizontal dashed reference line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceLine {
    pub y: f64,
    pub color: RGBColor,
}

/// Everything needed to draw one panel, in data coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub axes: AxisSettings,
    pub points: Vec<(f64, f64)>,
    pub line: Vec<(f64, f64)>,
    pub references: Vec<ReferenceLine>,
}

impl Panel {
    fn new(y_label: &str, points: Vec<(f64, f64)>) -> Self {
        Self {
            axes: AxisSettings::with_labels("concentration", y_label),
            points,
            line: Vec::new(),
            references: Vec::new(),
        }
    }

    fn map(&self, (x, y): (f64, f64)) -> Option<(f64, f64)> {
        Some((self.axes.x_scale.transform(x)?, self.axes.y_scale.transform(y)?))
    }

    /// Points and line in plotting coordinates; masked values are dropped.
    fn plotted(&self) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
        let points = self.points.iter().filter_map(|p| self.map(*p)).collect();
        let line = self.line.iter().filter_map(|p| self.map(*p)).collect();
        (points, line)
    }

    /// Axis ranges in plotting coordinates.
    fn ranges(&self, points: &[(f64, f64)], line: &[(f64, f64)]) -> Result<((f64, f64), (f64, f64)), AppError> {
        let xs = points.iter().chain(line).map(|p| p.0);
        let ys = points
            .iter()
            .chain(line)
            .map(|p| p.1)
            .chain(self.references.iter().filter_map(|r| self.axes.y_scale.transform(r.y)));

        let x = match self.axes.x_limits {
            Some(lim) => scaled_limits(lim, self.axes.x_scale, &self.axes.x_label)?,
            None => padded_range(xs),
        };
        let y = match self.axes.y_limits {
            Some(lim) => scaled_limits(lim, self.axes.y_scale, &self.axes.y_label)?,
            None => padded_range(ys),
        };
        Ok((x, y))
    }
}

fn scaled_limits((lo, hi): (f64, f64), scale: AxisScale, label: &str) -> Result<(f64, f64), AppError> {
    match (scale.transform(lo), scale.transform(hi)) {
        (Some(lo), Some(hi)) if lo < hi => Ok((lo, hi)),
        _ => Err(AppError::Config(format!(
            "Axis limits ({lo}, {hi}) are not valid for the `{label}` axis scale"
        ))),
    }
}

/// Data extent plus 5% on each side; degenerate extents get a unit window.
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !(lo.is_finite() && hi.is_finite()) {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    if span <= f64::EPSILON * lo.abs().max(1.0) {
        let pad = (lo.abs() * 0.1).max(0.5);
        return (lo - pad, hi + pad);
    }
    (lo - span * 0.05, hi + span * 0.05)
}

/// Fully configured figure ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticFigure {
    pub settings: FigureSettings,
    pub panels: [Panel; 3],
}

impl DiagnosticFigure {
    /// Assemble panel data and apply the plot configuration.
    ///
    /// Per-panel directives are applied first, then global directives to every
    /// panel, then figure directives.
    pub fn build(
        dataset: &CalibrationDataset,
        diagnostics: &DiagnosticsResult,
        model: &FittedModel,
        config: &PlotConfiguration,
    ) -> Result<Self, AppError> {
        let slope = model.slope();
        if slope == 0.0 || !slope.is_finite() {
            return Err(AppError::Fit(format!(
                "slope {slope} cannot be inverted to draw the calibration line"
            )));
        }

        let concentrations = dataset.concentrations();
        let max_c = concentrations.iter().cloned().fold(0.0, f64::max);

        let mut calibration = Panel::new(
            "response",
            dataset.points().iter().map(|p| (p.concentration, p.response)).collect(),
        );
        calibration.line = (0..LINE_SAMPLES)
            .map(|i| {
                let c = max_c * i as f64 / (LINE_SAMPLES - 1) as f64;
                (c, model.response_at(c))
            })
            .collect();

        let mut residuals = Panel::new(
            "studentised residuals",
            concentrations
                .iter()
                .copied()
                .zip(diagnostics.studentized_residuals.iter().copied())
                .collect(),
        );
        residuals.references = vec![
            ReferenceLine {
                y: STUDENTIZED_THRESHOLD,
                color: RED,
            },
            ReferenceLine {
                y: -STUDENTIZED_THRESHOLD,
                color: RED,
            },
        ];

        let mut errors = Panel::new(
            "% relative error",
            concentrations
                .iter()
                .copied()
                .zip(diagnostics.relative_errors.iter().copied())
                .collect(),
        );
        errors.references = vec![
            ReferenceLine {
                y: RELATIVE_ERROR_CAUTION,
                color: CAUTION,
            },
            ReferenceLine {
                y: RELATIVE_ERROR_FAILURE,
                color: RED,
            },
        ];

        let mut panels = [calibration, residuals, errors];
        let scoped = [&config.calibration, &config.residuals, &config.errors];
        for (panel, directives) in panels.iter_mut().zip(scoped) {
            for directive in directives.iter().chain(&config.global) {
                directive.apply(&mut panel.axes);
            }
        }

        let mut settings = FigureSettings::default();
        for directive in &config.figure {
            directive.apply(&mut settings);
        }

        // Reject unusable settings here, before anything is written.
        settings.pixel_size()?;
        for panel in &panels {
            let (points, line) = panel.plotted();
            panel.ranges(&points, &line)?;
        }

        Ok(Self { settings, panels })
    }

    /// Render to `path` in the requested format.
    pub fn render(&self, path: &Path, format: ImageFormat) -> Result<(), AppError> {
        ensure_fonts()?;
        let size = self.settings.pixel_size()?;
        let result = match format {
            ImageFormat::Svg => self.draw(SVGBackend::new(path, size).into_drawing_area()),
            ImageFormat::Png => self.draw(BitMapBackend::new(path, size).into_drawing_area()),
        };
        result.map_err(|e| AppError::Render(format!("'{}': {e}", path.display())))
    }

    fn draw<DB>(&self, root: DrawingArea<DB, Shift>) -> Result<(), Box<dyn Error>>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let k = self.settings.scale();
        root.fill(&WHITE)?;

        let body = match &self.settings.title {
            Some(title) => root.titled(title, (FONT_FAMILY, 20.0 * k))?,
            None => root.clone(),
        };

        for (area, panel) in body.split_evenly((1, 3)).iter().zip(&self.panels) {
            draw_panel(area, panel, k)?;
        }

        root.present()?;
        Ok(())
    }
}

fn draw_panel<DB>(area: &DrawingArea<DB, Shift>, panel: &Panel, k: f64) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (points, line) = panel.plotted();
    let ((x0, x1), (y0, y1)) = panel.ranges(&points, &line)?;
    let px = |v: f64| (v * k).round() as u32;

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(px(8.0))
        .x_label_area_size(px(40.0))
        .y_label_area_size(px(60.0));
    if let Some(title) = &panel.axes.title {
        builder.caption(title, (FONT_FAMILY, 16.0 * k));
    }
    let mut chart = builder.build_cartesian_2d(x0..x1, y0..y1)?;

    let x_scale = panel.axes.x_scale;
    let y_scale = panel.axes.y_scale;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(panel.axes.x_label.as_str())
        .y_desc(panel.axes.y_label.as_str())
        .x_labels(6)
        .y_labels(6)
        .x_label_formatter(&|v| x_scale.tick_label(*v))
        .y_label_formatter(&|v| y_scale.tick_label(*v))
        .label_style((FONT_FAMILY, 11.0 * k))
        .axis_desc_style((FONT_FAMILY, 13.0 * k))
        .draw()?;

    for reference in &panel.references {
        if let Some(y) = y_scale.transform(reference.y) {
            let style = reference.color.stroke_width(px(1.5).max(1));
            chart.draw_series(dashes(x0, x1, y).map(|seg| PathElement::new(seg, style)))?;
        }
    }

    if !line.is_empty() {
        chart.draw_series(LineSeries::new(line.iter().copied(), BLACK.stroke_width(px(1.5).max(1))))?;
    }

    let radius = px(4.0).max(2);
    chart.draw_series(
        points
            .iter()
            .map(|&p| Circle::new(p, radius, MARKER_FILL.mix(0.7).filled())),
    )?;
    chart.draw_series(points.iter().map(|&p| Circle::new(p, radius, BLACK.stroke_width(1))))?;

    Ok(())
}

/// Dash segments for a horizontal line at `y` across `[x0, x1]`.
fn dashes(x0: f64, x1: f64, y: f64) -> impl Iterator<Item = Vec<(f64, f64)>> {
    const DASHES: usize = 40;
    let step = (x1 - x0) / DASHES as f64;
    (0..DASHES).map(move |i| {
        let start = x0 + step * i as f64;
        vec![(start, y), (start + step * 0.6, y)]
    })
}
