use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::PlotCategory;

const SECTION_FILES: &str = "files";
const SECTION_SETTINGS: &str = "settings";
const SECTION_FILTERING: &str = "filtering";
const SECTION_FONTS: &str = "fonts";
const SECTION_COLORS: &str = "colors";
const SECTION_AXIS: &str = "axis";
const SECTION_MANUAL_Y_LIMITS: &str = "manual_y_limits";
const SECTION_OUTPUT: &str = "output";

const KNOWN_SECTIONS: [&str; 8] = [
    SECTION_FILES,
    SECTION_SETTINGS,
    SECTION_FILTERING,
    SECTION_FONTS,
    SECTION_COLORS,
    SECTION_AXIS,
    SECTION_MANUAL_Y_LIMITS,
    SECTION_OUTPUT,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThermalConfig {
    pub files: FileSettings,
    pub settings: RunSettings,
    pub filtering: Filtering,
    pub fonts: FontSettings,
    pub colors: ColorSettings,
    pub axis: AxisSettings,
    pub manual_y_limits: BTreeMap<String, AxisBounds>,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub simulation_data: PathBuf,
    pub limits: PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            simulation_data: PathBuf::from("simulation_data.csv"),
            limits: PathBuf::from("component_limits.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    pub generate_individual_plots: bool,
    pub generate_full_plots: bool,
    pub generate_zoomed_plots: bool,
    pub generate_deck_plots: bool,
    pub generate_deck_zoomed_plots: bool,
    pub orbit_period_min: f64,
    pub zoom_orbits: f64,
    pub zoom_window_min: Option<f64>,
    pub interpolation_points: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            generate_individual_plots: true,
            generate_full_plots: true,
            generate_zoomed_plots: true,
            generate_deck_plots: true,
            generate_deck_zoomed_plots: true,
            orbit_period_min: 95.0,
            zoom_orbits: 2.0,
            zoom_window_min: None,
            interpolation_points: 5000,
        }
    }
}

impl RunSettings {
    pub fn zoom_duration_min(&self) -> f64 {
        self.zoom_window_min
            .unwrap_or(self.orbit_period_min * self.zoom_orbits)
    }

    pub fn category_enabled(&self, category: PlotCategory) -> bool {
        match category {
            PlotCategory::Full => self.generate_individual_plots && self.generate_full_plots,
            PlotCategory::Zoomed => self.generate_individual_plots && self.generate_zoomed_plots,
            PlotCategory::Deck => self.generate_deck_plots,
            PlotCategory::DeckZoomed => self.generate_deck_zoomed_plots,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Filtering {
    pub exclude_components: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontSettings {
    pub family: String,
    pub full_title: u32,
    pub full_labels: u32,
    pub full_ticks: u32,
    pub zoomed_title: u32,
    pub zoomed_labels: u32,
    pub zoomed_ticks: u32,
    pub zoomed_legend: u32,
    pub deck_title: u32,
    pub deck_labels: u32,
    pub deck_ticks: u32,
    pub deck_legend: u32,
    pub deck_zoomed_title: u32,
    pub deck_zoomed_labels: u32,
    pub deck_zoomed_ticks: u32,
    pub deck_zoomed_legend: u32,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            family: "sans-serif".to_string(),
            full_title: 32,
            full_labels: 24,
            full_ticks: 18,
            zoomed_title: 32,
            zoomed_labels: 24,
            zoomed_ticks: 18,
            zoomed_legend: 18,
            deck_title: 40,
            deck_labels: 30,
            deck_ticks: 22,
            deck_legend: 22,
            deck_zoomed_title: 40,
            deck_zoomed_labels: 30,
            deck_zoomed_ticks: 22,
            deck_zoomed_legend: 22,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSizes {
    pub title: u32,
    pub labels: u32,
    pub ticks: u32,
    pub legend: u32,
}

impl FontSettings {
    pub fn sizes(&self, category: PlotCategory) -> FontSizes {
        match category {
            PlotCategory::Full => FontSizes {
                title: self.full_title,
                labels: self.full_labels,
                ticks: self.full_ticks,
                legend: self.full_ticks,
            },
            PlotCategory::Zoomed => FontSizes {
                title: self.zoomed_title,
                labels: self.zoomed_labels,
                ticks: self.zoomed_ticks,
                legend: self.zoomed_legend,
            },
            PlotCategory::Deck => FontSizes {
                title: self.deck_title,
                labels: self.deck_labels,
                ticks: self.deck_ticks,
                legend: self.deck_legend,
            },
            PlotCategory::DeckZoomed => FontSizes {
                title: self.deck_zoomed_title,
                labels: self.deck_zoomed_labels,
                ticks: self.deck_zoomed_ticks,
                legend: self.deck_zoomed_legend,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorSettings {
    pub line_thickness: u32,
    pub individual_line: String,
    pub zoom_max_line: String,
    pub zoom_min_line: String,
    pub zoom_limit_line_style: LineStyle,
    pub legend_frame: String,
    pub legend_background: String,
    pub legend_opacity: f64,
    pub palette: Vec<String>,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            line_thickness: 2,
            individual_line: "#1f77b4".to_string(),
            zoom_max_line: "red".to_string(),
            zoom_min_line: "blue".to_string(),
            zoom_limit_line_style: LineStyle::Dashed,
            legend_frame: "black".to_string(),
            legend_background: "white".to_string(),
            legend_opacity: 1.0,
            palette: [
                "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2",
                "#7f7f7f", "#bcbd22", "#17becf",
            ]
            .iter()
            .map(|color| color.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct AxisBounds {
    pub lo: f64,
    pub hi: f64,
}

impl TryFrom<Vec<f64>> for AxisBounds {
    type Error = String;

    fn try_from(values: Vec<f64>) -> std::result::Result<Self, Self::Error> {
        match values.as_slice() {
            [lo, hi] if lo.is_finite() && hi.is_finite() && lo < hi => Ok(Self { lo: *lo, hi: *hi }),
            [lo, hi] => Err(format!("axis range [{lo}, {hi}] must be finite with lo < hi")),
            other => Err(format!(
                "axis range needs exactly two values, got {}",
                other.len()
            )),
        }
    }
}

impl From<AxisBounds> for Vec<f64> {
    fn from(bounds: AxisBounds) -> Self {
        vec![bounds.lo, bounds.hi]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAxisRange", into = "RawAxisRange")]
pub enum AxisRange {
    Auto,
    Fixed(AxisBounds),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawAxisRange {
    Keyword(String),
    Bounds(Vec<f64>),
}

impl TryFrom<RawAxisRange> for AxisRange {
    type Error = String;

    fn try_from(raw: RawAxisRange) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawAxisRange::Keyword(keyword) if keyword.trim().eq_ignore_ascii_case("auto") => {
                Ok(Self::Auto)
            }
            RawAxisRange::Keyword(keyword) => {
                Err(format!("expected \"auto\" or [lo, hi], got \"{keyword}\""))
            }
            RawAxisRange::Bounds(values) => AxisBounds::try_from(values).map(Self::Fixed),
        }
    }
}

impl From<AxisRange> for RawAxisRange {
    fn from(range: AxisRange) -> Self {
        match range {
            AxisRange::Auto => Self::Keyword("auto".to_string()),
            AxisRange::Fixed(bounds) => Self::Bounds(bounds.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxisSettings {
    pub time_tick_interval: f64,
    pub zoom_time_tick_interval: f64,
    pub y_tick_interval: f64,
    pub full_y_range: AxisRange,
    pub zoomed_y_range: AxisRange,
    pub deck_y_range: AxisRange,
    pub deck_zoomed_y_range: AxisRange,
}

impl Default for AxisSettings {
    fn default() -> Self {
        Self {
            time_tick_interval: 100.0,
            zoom_time_tick_interval: 10.0,
            y_tick_interval: 5.0,
            full_y_range: AxisRange::Auto,
            zoomed_y_range: AxisRange::Auto,
            deck_y_range: AxisRange::Auto,
            deck_zoomed_y_range: AxisRange::Auto,
        }
    }
}

impl AxisSettings {
    pub fn y_range(&self, category: PlotCategory) -> AxisRange {
        match category {
            PlotCategory::Full => self.full_y_range,
            PlotCategory::Zoomed => self.zoomed_y_range,
            PlotCategory::Deck => self.deck_y_range,
            PlotCategory::DeckZoomed => self.deck_zoomed_y_range,
        }
    }

    pub fn time_tick(&self, category: PlotCategory) -> f64 {
        if category.is_zoomed() {
            self.zoom_time_tick_interval
        } else {
            self.time_tick_interval
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub root_prefix: String,
    pub individual_size: [u32; 2],
    pub deck_size: [u32; 2],
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            root_prefix: "Thermal_Analysis_Output".to_string(),
            individual_size: [1800, 900],
            deck_size: [2400, 1350],
        }
    }
}

impl OutputSettings {
    pub fn image_size(&self, category: PlotCategory) -> (u32, u32) {
        let [width, height] = if category.is_consolidated() {
            self.deck_size
        } else {
            self.individual_size
        };
        (width, height)
    }
}

impl ThermalConfig {
    pub fn load(path: &Path) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        if !path.exists() {
            record(
                &mut warnings,
                format!(
                    "config file {} not found, using built-in defaults",
                    path.display()
                ),
            );
            return (Self::default(), warnings);
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                record(
                    &mut warnings,
                    format!(
                        "failed to read config file {}: {err}; using built-in defaults",
                        path.display()
                    ),
                );
                return (Self::default(), warnings);
            }
        };

        let config = Self::from_toml_str(&contents, &mut warnings);
        info!(path = %path.display(), warnings = warnings.len(), "loaded configuration");
        (config, warnings)
    }

    pub fn from_toml_str(contents: &str, warnings: &mut Vec<String>) -> Self {
        let root = match contents.parse::<toml::Table>() {
            Ok(root) => root,
            Err(err) => {
                record(
                    warnings,
                    format!("config is not valid TOML ({err}); using built-in defaults"),
                );
                return Self::default();
            }
        };

        for (section, value) in &root {
            if !KNOWN_SECTIONS.contains(&section.as_str()) {
                record(warnings, format!("ignoring unknown config section [{section}]"));
            } else if !value.is_table() {
                record(
                    warnings,
                    format!("config entry '{section}' must be a [section]; using defaults"),
                );
            }
        }

        Self {
            files: merge_section(SECTION_FILES, root.get(SECTION_FILES), warnings),
            settings: merge_section(SECTION_SETTINGS, root.get(SECTION_SETTINGS), warnings),
            filtering: merge_section(SECTION_FILTERING, root.get(SECTION_FILTERING), warnings),
            fonts: merge_section(SECTION_FONTS, root.get(SECTION_FONTS), warnings),
            colors: merge_section(SECTION_COLORS, root.get(SECTION_COLORS), warnings),
            axis: merge_section(SECTION_AXIS, root.get(SECTION_AXIS), warnings),
            manual_y_limits: merge_manual_limits(root.get(SECTION_MANUAL_Y_LIMITS), warnings),
            output: merge_section(SECTION_OUTPUT, root.get(SECTION_OUTPUT), warnings),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }

    pub fn is_excluded(&self, component_name: &str) -> bool {
        self.filtering
            .exclude_components
            .iter()
            .any(|excluded| excluded.trim() == component_name.trim())
    }

    pub fn manual_y_limit(&self, name: &str) -> Option<AxisBounds> {
        self.manual_y_limits.get(name.trim()).copied()
    }
}

fn record(warnings: &mut Vec<String>, message: String) {
    warn!("{message}");
    warnings.push(message);
}

/// Applies the user's keys one at a time on top of the section defaults,
/// keeping each key only if the section still deserializes with it.
fn merge_section<T>(section: &str, raw: Option<&toml::Value>, warnings: &mut Vec<String>) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    let Some(user) = raw.and_then(toml::Value::as_table) else {
        return T::default();
    };

    let mut merged = match toml::Value::try_from(T::default()) {
        Ok(toml::Value::Table(table)) => table,
        _ => return T::default(),
    };

    for (key, value) in user {
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value.clone());
        match toml::Value::Table(candidate.clone()).try_into::<T>() {
            Ok(_) => merged = candidate,
            Err(err) => record(
                warnings,
                format!(
                    "ignoring config key {section}.{key}: {}; default kept",
                    err.message()
                ),
            ),
        }
    }

    toml::Value::Table(merged).try_into().unwrap_or_default()
}

fn merge_manual_limits(
    raw: Option<&toml::Value>,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, AxisBounds> {
    let mut limits = BTreeMap::new();
    let Some(user) = raw.and_then(toml::Value::as_table) else {
        return limits;
    };

    for (name, value) in user {
        match value.clone().try_into::<AxisBounds>() {
            Ok(bounds) => {
                limits.insert(name.trim().to_string(), bounds);
            }
            Err(err) => record(
                warnings,
                format!(
                    "ignoring manual y limit for '{name}': {}",
                    err.message()
                ),
            ),
        }
    }

    limits
}

pub fn write_template(path: &Path) -> Result<()> {
    let body = ThermalConfig::default().to_toml()?;
    let contents = format!(
        "# thermal-report configuration. Every key is optional.\n\
         # Axis ranges take \"auto\" or [lo, hi]. Add per-component or per-deck\n\
         # y ranges under [manual_y_limits], e.g. \"VD01 FOG\" = [-20, 60].\n\
         # Set settings.zoom_window_min to override zoom_orbits * orbit_period_min.\n\n\
         {body}"
    );
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
