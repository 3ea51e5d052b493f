use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle};
use tracing::{debug, info, warn};

use super::data::Dataset;
use super::evaluate::min_max;
use super::interpolate::{pchip_resample, prepare_samples};
use super::output::RunOutput;
use crate::config::{AxisBounds, AxisRange, ColorSettings, FontSizes, LineStyle, ThermalConfig};
use crate::model::{Component, PlotCategory, PlotCounts, ZoomWindow};
use crate::util::{ensure_directory, sanitize_file_stem};

const MAX_TICKS: usize = 60;
const DEFAULT_Y_STEP: f64 = 5.0;
const TIME_AXIS_LABEL: &str = "Time (minutes)";
const TEMPERATURE_AXIS_LABEL: &str = "Temperature (°C)";
const GRID_COLOR: RGBColor = RGBColor(220, 220, 220);

#[derive(Debug, Clone, PartialEq)]
pub enum PlotUnit {
    Component(usize),
    Deck { name: String, members: Vec<usize> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotJob {
    pub category: PlotCategory,
    pub path: PathBuf,
    pub title: String,
    pub unit: PlotUnit,
}

pub fn plan_plots(dataset: &Dataset, config: &ThermalConfig, output: &RunOutput) -> Vec<PlotJob> {
    let mut jobs = Vec::new();
    let mut taken = HashSet::new();

    for category in PlotCategory::ALL {
        if !config.settings.category_enabled(category) {
            debug!(category = category.file_prefix(), "plot category disabled");
            continue;
        }
        let folder = output.category_dir(category);

        if category.is_consolidated() {
            for deck in &dataset.decks {
                let stem = format!("{}_{}", category.file_prefix(), sanitize_file_stem(&deck.name));
                jobs.push(PlotJob {
                    category,
                    path: unique_path(&folder, &stem, &mut taken),
                    title: plot_title(category, &deck.name),
                    unit: PlotUnit::Deck {
                        name: deck.name.clone(),
                        members: consolidated_members(dataset, &deck.members, config),
                    },
                });
            }
        } else {
            for (index, component) in dataset.components.iter().enumerate() {
                let display = component.display_name();
                let stem = format!("{}_{}", category.file_prefix(), sanitize_file_stem(&display));
                let deck_folder = folder.join(sanitize_file_stem(&component.deck));
                jobs.push(PlotJob {
                    category,
                    path: unique_path(&deck_folder, &stem, &mut taken),
                    title: plot_title(category, &display),
                    unit: PlotUnit::Component(index),
                });
            }
        }
    }

    jobs
}

pub fn consolidated_members(dataset: &Dataset, members: &[usize], config: &ThermalConfig) -> Vec<usize> {
    members
        .iter()
        .copied()
        .filter(|&index| {
            dataset
                .components
                .get(index)
                .is_some_and(|component| !config.is_excluded(&component.name))
        })
        .collect()
}

fn plot_title(category: PlotCategory, subject: &str) -> String {
    match category {
        PlotCategory::Full => format!("{subject}: Full Temperature Profile"),
        PlotCategory::Zoomed => format!("{subject}: Zoomed Temperature Profile"),
        PlotCategory::Deck => format!("Deck {subject}: Consolidated Temperature Profile"),
        PlotCategory::DeckZoomed => format!("Deck {subject}: Consolidated Zoomed Profile"),
    }
}

fn unique_path(folder: &Path, stem: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let mut candidate = folder.join(format!("{stem}.png"));
    let mut counter = 2;
    while taken.contains(&candidate) {
        candidate = folder.join(format!("{stem}_{counter}.png"));
        counter += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

/// Tick positions every `interval` from `start`, always ending with `end`.
pub fn time_ticks(start: f64, end: f64, interval: f64) -> Vec<f64> {
    if start.is_nan() || end.is_nan() || end <= start {
        return vec![start];
    }
    let span = end - start;
    let step = if interval.is_finite() && interval > 0.0 {
        interval.max(span / MAX_TICKS as f64)
    } else {
        span
    };

    let mut ticks = Vec::new();
    let mut k = 0usize;
    loop {
        let tick = start + step * k as f64;
        if tick >= end - step * 1e-9 {
            break;
        }
        ticks.push(tick);
        k += 1;
    }
    ticks.push(end);
    ticks
}

pub fn value_ticks(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    let span = hi - lo;
    let step = axis_step(step).max(span / MAX_TICKS as f64);
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

fn axis_step(step: f64) -> f64 {
    if step.is_finite() && step > 0.0 {
        step
    } else {
        DEFAULT_Y_STEP
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YRange {
    pub lo: f64,
    pub hi: f64,
    pub widened: bool,
}

/// Uses `requested` when given, otherwise snaps the data extremes outward to
/// multiples of `step`. A requested range is widened, never clipped, so no
/// sample falls outside the axis.
pub fn resolve_y_range(requested: Option<AxisBounds>, data: Option<(f64, f64)>, step: f64) -> YRange {
    let step = axis_step(step);
    let floor = |value: f64| (value / step).floor() * step;
    let ceil = |value: f64| (value / step).ceil() * step;

    match (requested, data) {
        (Some(bounds), Some((data_lo, data_hi))) => {
            let lo = if data_lo < bounds.lo { floor(data_lo) } else { bounds.lo };
            let hi = if data_hi > bounds.hi { ceil(data_hi) } else { bounds.hi };
            YRange {
                lo,
                hi,
                widened: lo != bounds.lo || hi != bounds.hi,
            }
        }
        (Some(bounds), None) => YRange {
            lo: bounds.lo,
            hi: bounds.hi,
            widened: false,
        },
        (None, Some((data_lo, data_hi))) => {
            let lo = floor(data_lo);
            let mut hi = ceil(data_hi);
            if hi <= lo {
                hi = lo + step;
            }
            YRange {
                lo,
                hi,
                widened: false,
            }
        }
        (None, None) => YRange {
            lo: 0.0,
            hi: step,
            widened: false,
        },
    }
}

fn requested_y_range(config: &ThermalConfig, category: PlotCategory, name: &str) -> Option<AxisBounds> {
    config
        .manual_y_limit(name)
        .or(match config.axis.y_range(category) {
            AxisRange::Fixed(bounds) => Some(bounds),
            AxisRange::Auto => None,
        })
}

pub fn dash_segments(lo: f64, hi: f64, style: LineStyle) -> Vec<(f64, f64)> {
    let span = hi - lo;
    let pieces = match style {
        LineStyle::Solid => return vec![(lo, hi)],
        LineStyle::Dashed => 40.0,
        LineStyle::Dotted => 120.0,
    };
    if span.is_nan() || span <= 0.0 {
        return vec![(lo, hi)];
    }

    let period = span / pieces;
    let mark = period * 0.5;
    let mut segments = Vec::new();
    let mut start = lo;
    while start < hi {
        segments.push((start, (start + mark).min(hi)));
        start += period;
    }
    segments
}

pub fn parse_color(value: &str) -> Option<RGBColor> {
    let value = value.trim().to_ascii_lowercase();

    if let Some(hex) = value.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).ok();
        return match hex.len() {
            6 => Some(RGBColor(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                let expand = |index: usize| channel(&hex[index..index + 1].repeat(2));
                Some(RGBColor(expand(0)?, expand(1)?, expand(2)?))
            }
            _ => None,
        };
    }

    let rgb = match value.as_str() {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "brown" => (165, 42, 42),
        "pink" => (255, 192, 203),
        "gray" | "grey" => (128, 128, 128),
        "olive" => (128, 128, 0),
        "cyan" => (0, 255, 255),
        "magenta" => (255, 0, 255),
        "yellow" => (255, 255, 0),
        "navy" => (0, 0, 128),
        "teal" => (0, 128, 128),
        _ => return None,
    };
    Some(RGBColor(rgb.0, rgb.1, rgb.2))
}

#[derive(Clone)]
pub struct PlotStyles {
    pub line_thickness: u32,
    pub individual_line: RGBColor,
    pub zoom_max_line: RGBColor,
    pub zoom_min_line: RGBColor,
    pub zoom_limit_line_style: LineStyle,
    pub legend_frame: RGBColor,
    pub legend_background: RGBColor,
    pub legend_opacity: f64,
    pub palette: Vec<RGBColor>,
}

impl PlotStyles {
    pub fn from_config(colors: &ColorSettings, warnings: &mut Vec<String>) -> Self {
        let defaults = ColorSettings::default();
        let mut resolve = |key: &str, value: &str, fallback: &str| {
            parse_color(value).unwrap_or_else(|| {
                let message = format!("unknown color '{value}' for colors.{key}; using {fallback}");
                warn!("{message}");
                warnings.push(message);
                parse_color(fallback).unwrap_or(BLACK)
            })
        };

        let individual_line = resolve("individual_line", &colors.individual_line, &defaults.individual_line);
        let zoom_max_line = resolve("zoom_max_line", &colors.zoom_max_line, &defaults.zoom_max_line);
        let zoom_min_line = resolve("zoom_min_line", &colors.zoom_min_line, &defaults.zoom_min_line);
        let legend_frame = resolve("legend_frame", &colors.legend_frame, &defaults.legend_frame);
        let legend_background = resolve(
            "legend_background",
            &colors.legend_background,
            &defaults.legend_background,
        );

        let mut palette = colors
            .palette
            .iter()
            .filter_map(|entry| {
                let parsed = parse_color(entry);
                if parsed.is_none() {
                    let message = format!("unknown palette color '{entry}' skipped");
                    warn!("{message}");
                    warnings.push(message);
                }
                parsed
            })
            .collect::<Vec<RGBColor>>();
        if palette.is_empty() {
            palette = defaults.palette.iter().filter_map(|entry| parse_color(entry)).collect();
        }

        Self {
            line_thickness: colors.line_thickness.max(1),
            individual_line,
            zoom_max_line,
            zoom_min_line,
            zoom_limit_line_style: colors.zoom_limit_line_style,
            legend_frame,
            legend_background,
            legend_opacity: if colors.legend_opacity.is_finite() {
                colors.legend_opacity.clamp(0.0, 1.0)
            } else {
                1.0
            },
            palette,
        }
    }

    pub fn palette_color(&self, position: usize) -> RGBColor {
        self.palette
            .get(position % self.palette.len().max(1))
            .copied()
            .unwrap_or(self.individual_line)
    }
}

pub struct Curve {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
}

pub struct Level {
    pub label: String,
    pub value: f64,
    pub at_time: f64,
    pub color: RGBColor,
}

pub struct ChartSpec {
    pub title: String,
    pub x_range: (f64, f64),
    pub x_ticks: Vec<f64>,
    pub y_range: YRange,
    pub y_ticks: Vec<f64>,
    pub curves: Vec<Curve>,
    pub levels: Vec<Level>,
    pub legend: bool,
}

pub struct PlotContext<'a> {
    pub dataset: &'a Dataset,
    pub config: &'a ThermalConfig,
    pub window: &'a ZoomWindow,
    pub styles: &'a PlotStyles,
}

impl PlotContext<'_> {
    fn x_range(&self, category: PlotCategory) -> (f64, f64) {
        let (lo, hi) = if category.is_zoomed() {
            (self.window.start_min, self.window.end_min)
        } else {
            self.dataset.time_span().unwrap_or((0.0, 0.0))
        };
        if hi > lo { (lo, hi) } else { (lo - 1.0, lo + 1.0) }
    }

    fn samples(&self, component: &Component, category: PlotCategory) -> Vec<(f64, f64)> {
        let window = self.window;
        prepare_samples(
            component
                .series
                .samples()
                .filter(|(time, _)| !category.is_zoomed() || window.contains(*time)),
        )
    }

    fn resample(&self, samples: &[(f64, f64)]) -> Vec<(f64, f64)> {
        pchip_resample(samples, self.config.settings.interpolation_points)
    }
}

pub fn build_chart(job: &PlotJob, ctx: &PlotContext<'_>) -> Option<ChartSpec> {
    let category = job.category;
    let styles = ctx.styles;
    let mut curves = Vec::new();
    let mut levels = Vec::new();
    let mut extremes = Vec::new();

    let range_name = match &job.unit {
        PlotUnit::Component(index) => {
            let component = ctx.dataset.components.get(*index)?;
            let samples = ctx.samples(component, category);
            if samples.is_empty() {
                return None;
            }
            extremes.extend(samples.iter().map(|(_, value)| *value));

            if category.is_zoomed() {
                levels.extend(extreme_levels(&samples, styles));
            }
            curves.push(Curve {
                label: "Temperature".to_string(),
                points: ctx.resample(&samples),
                color: styles.individual_line,
            });
            component.name.clone()
        }
        PlotUnit::Deck { name, members } => {
            let all_members = ctx
                .dataset
                .decks
                .iter()
                .find(|deck| &deck.name == name)
                .map(|deck| deck.members.as_slice())
                .unwrap_or(members.as_slice());

            for &index in members {
                let Some(component) = ctx.dataset.components.get(index) else {
                    continue;
                };
                let samples = ctx.samples(component, category);
                if samples.is_empty() {
                    continue;
                }
                extremes.extend(samples.iter().map(|(_, value)| *value));
                let position = all_members.iter().position(|&m| m == index).unwrap_or(index);
                curves.push(Curve {
                    label: component.display_name(),
                    points: ctx.resample(&samples),
                    color: styles.palette_color(position),
                });
            }
            if curves.is_empty() {
                return None;
            }
            name.clone()
        }
    };

    let data_range = min_max(extremes);
    let y_range = resolve_y_range(
        requested_y_range(ctx.config, category, &range_name),
        data_range,
        ctx.config.axis.y_tick_interval,
    );
    if y_range.widened {
        info!(
            plot = %job.path.display(),
            lo = y_range.lo,
            hi = y_range.hi,
            "widened configured y range to fit the data"
        );
    }

    let x_range = ctx.x_range(category);
    Some(ChartSpec {
        title: job.title.clone(),
        x_range,
        x_ticks: time_ticks(x_range.0, x_range.1, ctx.config.axis.time_tick(category)),
        y_range,
        y_ticks: value_ticks(y_range.lo, y_range.hi, ctx.config.axis.y_tick_interval),
        legend: category.is_zoomed() || category.is_consolidated(),
        curves,
        levels,
    })
}

fn extreme_levels(samples: &[(f64, f64)], styles: &PlotStyles) -> Vec<Level> {
    let Some(&(max_time, max_value)) = samples.iter().reduce(|best, point| {
        if point.1 > best.1 { point } else { best }
    }) else {
        return Vec::new();
    };
    let Some(&(min_time, min_value)) = samples.iter().reduce(|best, point| {
        if point.1 < best.1 { point } else { best }
    }) else {
        return Vec::new();
    };

    vec![
        Level {
            label: format!("Max: {max_value:.2}°C"),
            value: max_value,
            at_time: max_time,
            color: styles.zoom_max_line,
        },
        Level {
            label: format!("Min: {min_value:.2}°C"),
            value: min_value,
            at_time: min_time,
            color: styles.zoom_min_line,
        },
    ]
}

pub fn render_all(jobs: &[PlotJob], ctx: &PlotContext<'_>) -> (PlotCounts, Vec<String>) {
    let mut counts = PlotCounts::default();
    let mut warnings = Vec::new();

    for job in jobs {
        match render_job(job, ctx) {
            Ok(true) => counts.written += 1,
            Ok(false) => counts.unavailable += 1,
            Err(err) => {
                let message = format!("failed to render {}: {err:#}", job.path.display());
                warn!("{message}");
                warnings.push(message);
                counts.failed += 1;
            }
        }
    }

    info!(
        written = counts.written,
        unavailable = counts.unavailable,
        failed = counts.failed,
        "rendered plots"
    );
    (counts, warnings)
}

fn render_job(job: &PlotJob, ctx: &PlotContext<'_>) -> Result<bool> {
    if let Some(parent) = job.path.parent() {
        ensure_directory(parent)?;
    }

    let size = ctx.config.output.image_size(job.category);
    let fonts = ctx.config.fonts.sizes(job.category);
    let family = ctx.config.fonts.family.as_str();

    match build_chart(job, ctx) {
        Some(spec) => {
            draw_chart(&job.path, size, &spec, ctx.styles, family, fonts)
                .with_context(|| format!("drawing '{}'", job.title))?;
            debug!(path = %job.path.display(), "wrote plot");
            Ok(true)
        }
        None => {
            draw_unavailable(&job.path, size, &job.title, family, fonts)
                .with_context(|| format!("drawing placeholder for '{}'", job.title))?;
            warn!(path = %job.path.display(), "no plottable data; wrote placeholder image");
            Ok(false)
        }
    }
}

fn font(family: &str, size: u32, style: FontStyle) -> FontDesc<'_> {
    FontDesc::new(FontFamily::from(family), f64::from(size), style)
}

fn tick_label(value: f64) -> String {
    let value = value + 0.0;
    if (value - value.round()).abs() < 1e-9 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

fn draw_chart(
    path: &Path,
    size: (u32, u32),
    spec: &ChartSpec,
    styles: &PlotStyles,
    family: &str,
    fonts: FontSizes,
) -> Result<()> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_lo, x_hi) = spec.x_range;
    let (y_lo, y_hi) = (spec.y_range.lo, spec.y_range.hi);

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, font(family, fonts.title, FontStyle::Bold))
        .margin(fonts.ticks)
        .x_label_area_size(fonts.ticks * 2 + fonts.labels * 2)
        .y_label_area_size(fonts.ticks * 3 + fonts.labels * 2)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    // Axis lines and descriptions only; ticks come from the configured intervals.
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(0)
        .y_labels(0)
        .x_desc(TIME_AXIS_LABEL)
        .y_desc(TEMPERATURE_AXIS_LABEL)
        .axis_desc_style(font(family, fonts.labels, FontStyle::Normal))
        .draw()?;

    let grid = GRID_COLOR.stroke_width(1);
    chart.draw_series(
        spec.x_ticks
            .iter()
            .map(|&x| PathElement::new(vec![(x, y_lo), (x, y_hi)], grid)),
    )?;
    chart.draw_series(
        spec.y_ticks
            .iter()
            .map(|&y| PathElement::new(vec![(x_lo, y), (x_hi, y)], grid)),
    )?;

    let gap = (fonts.ticks / 2).max(4) as i32;
    let tick_font = font(family, fonts.ticks, FontStyle::Normal).color(&BLACK);
    let below = tick_font.pos(Pos::new(HPos::Center, VPos::Top));
    let left_of = tick_font.pos(Pos::new(HPos::Right, VPos::Center));
    for &x in &spec.x_ticks {
        let (px, py) = chart.backend_coord(&(x, y_lo));
        root.draw(&Text::new(tick_label(x), (px, py + gap), below.clone()))?;
    }
    for &y in &spec.y_ticks {
        let (px, py) = chart.backend_coord(&(x_lo, y));
        root.draw(&Text::new(tick_label(y), (px - gap, py), left_of.clone()))?;
    }

    let stroke = styles.line_thickness;
    for curve in &spec.curves {
        let style = curve.color.stroke_width(stroke);
        chart
            .draw_series(LineSeries::new(curve.points.iter().copied(), style))?
            .label(curve.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], style));
    }

    for level in &spec.levels {
        let style = level.color.stroke_width(stroke);
        let y = level.value;
        chart
            .draw_series(
                dash_segments(x_lo, x_hi, styles.zoom_limit_line_style)
                    .into_iter()
                    .map(move |(a, b)| PathElement::new(vec![(a, y), (b, y)], style)),
            )?
            .label(level.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], style));
        chart.draw_series(std::iter::once(Circle::new(
            (level.at_time, level.value),
            stroke * 3 + 2,
            level.color.filled(),
        )))?;
    }

    if spec.legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&styles.legend_background.mix(styles.legend_opacity))
            .border_style(&styles.legend_frame)
            .label_font(font(family, fonts.legend, FontStyle::Normal))
            .draw()?;
    }

    root.present()?;
    Ok(())
}

fn draw_unavailable(
    path: &Path,
    size: (u32, u32),
    title: &str,
    family: &str,
    fonts: FontSizes,
) -> Result<()> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let (width, height) = size;
    let left = (width / 10) as i32;
    let middle = (height / 2) as i32;
    root.draw(&Text::new(
        title.to_string(),
        (left, middle - fonts.title as i32 * 2),
        font(family, fonts.title, FontStyle::Bold).color(&BLACK),
    ))?;
    root.draw(&Text::new(
        "Data unavailable: no numeric readings in this range".to_string(),
        (left, middle),
        font(family, fonts.labels, FontStyle::Normal).color(&RED),
    ))?;

    root.present()?;
    Ok(())
}
