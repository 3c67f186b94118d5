//! Plot customization directives.
//!
//! A plot configuration is a closed set of named directives grouped into five
//! scopes (calibration axes, residual axes, error axes, all axes, figure). Each
//! directive is parsed from a `name -> value` entry and applied with an explicit
//! `match`; unknown names are configuration errors.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AppError;

/// Which axis of a panel a directive targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisScale {
    #[default]
    Linear,
    /// Base-10 logarithmic; non-positive values are masked.
    Log,
}

impl AxisScale {
    /// Map a data value into plotting coordinates, or `None` if it cannot be shown.
    pub fn transform(self, v: f64) -> Option<f64> {
        if !v.is_finite() {
            return None;
        }
        match self {
            AxisScale::Linear => Some(v),
            AxisScale::Log if v > 0.0 => Some(v.log10()),
            AxisScale::Log => None,
        }
    }

    /// Tick label for a plotting coordinate.
    pub fn tick_label(self, v: f64) -> String {
        match self {
            AxisScale::Linear => format_tick(v),
            AxisScale::Log => format_tick(10f64.powf(v)),
        }
    }
}

fn format_tick(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && !(1e-3..1e5).contains(&a) {
        return format!("{v:.1e}");
    }
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Resolved settings of one panel.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSettings {
    pub title: Option<String>,
    pub x_label: String,
    pub y_label: String,
    pub x_scale: AxisScale,
    pub y_scale: AxisScale,
    pub x_limits: Option<(f64, f64)>,
    pub y_limits: Option<(f64, f64)>,
}

impl AxisSettings {
    pub fn with_labels(x_label: &str, y_label: &str) -> Self {
        Self {
            title: None,
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            x_scale: AxisScale::Linear,
            y_scale: AxisScale::Linear,
            x_limits: None,
            y_limits: None,
        }
    }
}

/// A single adjustment to a panel.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisDirective {
    SetLabel(Axis, String),
    SetScale(Axis, AxisScale),
    SetLimits(Axis, f64, f64),
    SetTitle(String),
}

impl AxisDirective {
    /// Parse a `name -> value` entry, e.g. `"set_xscale": "log"`.
    pub fn parse(name: &str, value: &Value) -> Result<Self, AppError> {
        let directive = match name {
            "set_xlabel" => AxisDirective::SetLabel(Axis::X, expect_str(name, value)?),
            "set_ylabel" => AxisDirective::SetLabel(Axis::Y, expect_str(name, value)?),
            "set_xscale" => AxisDirective::SetScale(Axis::X, parse_scale(name, value)?),
            "set_yscale" => AxisDirective::SetScale(Axis::Y, parse_scale(name, value)?),
            "set_xlim" => {
                let (lo, hi) = parse_pair(name, value)?;
                AxisDirective::SetLimits(Axis::X, lo, hi)
            }
            "set_ylim" => {
                let (lo, hi) = parse_pair(name, value)?;
                AxisDirective::SetLimits(Axis::Y, lo, hi)
            }
            "set_title" => AxisDirective::SetTitle(expect_str(name, value)?),
            other => {
                return Err(AppError::Config(format!(
                    "Unknown axis directive `{other}` (expected one of set_xlabel, set_ylabel, set_xscale, set_yscale, set_xlim, set_ylim, set_title)"
                )));
            }
        };
        Ok(directive)
    }

    pub fn apply(&self, axes: &mut AxisSettings) {
        match self {
            AxisDirective::SetLabel(Axis::X, text) => axes.x_label = text.clone(),
            AxisDirective::SetLabel(Axis::Y, text) => axes.y_label = text.clone(),
            AxisDirective::SetScale(Axis::X, scale) => axes.x_scale = *scale,
            AxisDirective::SetScale(Axis::Y, scale) => axes.y_scale = *scale,
            AxisDirective::SetLimits(Axis::X, lo, hi) => axes.x_limits = Some((*lo, *hi)),
            AxisDirective::SetLimits(Axis::Y, lo, hi) => axes.y_limits = Some((*lo, *hi)),
            AxisDirective::SetTitle(text) => axes.title = Some(text.clone()),
        }
    }
}

/// Resolved figure-level settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureSettings {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: f64,
    pub title: Option<String>,
}

impl Default for FigureSettings {
    /// Landscape A4 width, half A4 height.
    fn default() -> Self {
        Self {
            width_in: 29.7 / 2.54,
            height_in: 21.0 / (2.0 * 2.54),
            dpi: 100.0,
            title: None,
        }
    }
}

/// Largest rendered width or height, in pixels.
pub const MAX_IMAGE_SIDE: f64 = 16_384.0;

impl FigureSettings {
    /// Rendered size in pixels; each side must be between 1 and [`MAX_IMAGE_SIDE`].
    pub fn pixel_size(&self) -> Result<(u32, u32), AppError> {
        let side = |inches: f64| {
            let px = (inches * self.dpi).round();
            if (1.0..=MAX_IMAGE_SIDE).contains(&px) {
                Ok(px as u32)
            } else {
                Err(AppError::Config(format!(
                    "Figure of {:.2} x {:.2} in at {} dpi is outside 1..={MAX_IMAGE_SIDE} pixels per side",
                    self.width_in, self.height_in, self.dpi
                )))
            }
        };
        Ok((side(self.width_in)?, side(self.height_in)?))
    }

    /// Multiplier applied to fonts, markers and margins.
    pub fn scale(&self) -> f64 {
        self.dpi / 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FigureDirective {
    SetSizeInches(f64, f64),
    SetDpi(f64),
    SetTitle(String),
}

impl FigureDirective {
    pub fn parse(name: &str, value: &Value) -> Result<Self, AppError> {
        let directive = match name {
            "set_size_inches" => {
                let (w, h) = parse_pair(name, value)?;
                if w <= 0.0 || h <= 0.0 {
                    return Err(AppError::Config(format!("`{name}` needs positive width and height")));
                }
                FigureDirective::SetSizeInches(w, h)
            }
            "set_dpi" => {
                let dpi = expect_f64(name, value)?;
                if dpi <= 0.0 {
                    return Err(AppError::Config(format!("`{name}` must be positive")));
                }
                FigureDirective::SetDpi(dpi)
            }
            "suptitle" => FigureDirective::SetTitle(expect_str(name, value)?),
            other => {
                return Err(AppError::Config(format!(
                    "Unknown figure directive `{other}` (expected one of set_size_inches, set_dpi, suptitle)"
                )));
            }
        };
        Ok(directive)
    }

    pub fn apply(&self, figure: &mut FigureSettings) {
        match self {
            FigureDirective::SetSizeInches(w, h) => {
                figure.width_in = *w;
                figure.height_in = *h;
            }
            FigureDirective::SetDpi(dpi) => figure.dpi = *dpi,
            FigureDirective::SetTitle(text) => figure.title = Some(text.clone()),
        }
    }
}

/// Directives for every scope. The default is "no customization".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotConfiguration {
    pub calibration: Vec<AxisDirective>,
    pub residuals: Vec<AxisDirective>,
    pub errors: Vec<AxisDirective>,
    /// Applied to every panel, after the panel's own directives.
    pub global: Vec<AxisDirective>,
    pub figure: Vec<FigureDirective>,
}

/// On-disk layout of a plot configuration file: one optional object per scope.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlotConfigFile {
    #[serde(alias = "calibration")]
    calibration_attrs: Option<Map<String, Value>>,
    #[serde(alias = "residuals")]
    residual_attrs: Option<Map<String, Value>>,
    #[serde(alias = "errors")]
    errors_attrs: Option<Map<String, Value>>,
    #[serde(alias = "global")]
    global_attrs: Option<Map<String, Value>>,
    #[serde(alias = "figure")]
    figure_attrs: Option<Map<String, Value>>,
}

impl PlotConfiguration {
    /// Build from a JSON object such as
    /// `{"global_attrs": {"set_xlabel": "concentration (µg/mL)"}, "residual_attrs": {"set_xscale": "log"}}`.
    pub fn from_json(value: &Value) -> Result<Self, AppError> {
        if !value.is_object() {
            return Err(AppError::Config("Plot configuration must be a JSON object".to_string()));
        }
        let file = PlotConfigFile::deserialize(value)
            .map_err(|e| AppError::Config(format!("Invalid plot configuration: {e}")))?;

        Ok(Self {
            calibration: parse_axis_scope(file.calibration_attrs.as_ref())?,
            residuals: parse_axis_scope(file.residual_attrs.as_ref())?,
            errors: parse_axis_scope(file.errors_attrs.as_ref())?,
            global: parse_axis_scope(file.global_attrs.as_ref())?,
            figure: file
                .figure_attrs
                .iter()
                .flatten()
                .map(|(name, v)| FigureDirective::parse(name, v))
                .collect::<Result<_, _>>()?,
        })
    }
}

fn parse_axis_scope(entries: Option<&Map<String, Value>>) -> Result<Vec<AxisDirective>, AppError> {
    entries
        .into_iter()
        .flatten()
        .map(|(name, v)| AxisDirective::parse(name, v))
        .collect()
}

fn expect_str(name: &str, value: &Value) -> Result<String, AppError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::Config(format!("`{name}` expects a string, got {value}")))
}

fn expect_f64(name: &str, value: &Value) -> Result<f64, AppError> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::Config(format!("`{name}` expects a number, got {value}")))
}

fn parse_scale(name: &str, value: &Value) -> Result<AxisScale, AppError> {
    match expect_str(name, value)?.as_str() {
        "linear" => Ok(AxisScale::Linear),
        "log" => Ok(AxisScale::Log),
        other => Err(AppError::Config(format!(
            "`{name}` supports \"linear\" or \"log\", got \"{other}\""
        ))),
    }
}

fn parse_pair(name: &str, value: &Value) -> Result<(f64, f64), AppError> {
    let err = || AppError::Config(format!("`{name}` expects a two-number array, got {value}"));
    let items = value.as_array().filter(|a| a.len() == 2).ok_or_else(err)?;
    let lo = items[0].as_f64().filter(|v| v.is_finite()).ok_or_else(err)?;
    let hi = items[1].as_f64().filter(|v| v.is_finite()).ok_or_else(err)?;
    if name.ends_with("lim") && lo >= hi {
        return Err(AppError::Config(format!("`{name}` lower bound must be below upper bound")));
    }
    Ok((lo, hi))
}
