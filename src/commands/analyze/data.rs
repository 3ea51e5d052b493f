use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{info, warn};

use super::naming::NamingConvention;
use crate::model::{Component, Deck, TimeSeries};

// `Time, s`, `time (min)`, `Time [h]` and plain `Time`.
const TIME_HEADER_PATTERN: &str =
    r"(?i)^time\s*(?:[,(\[]\s*(?P<unit>s|sec|secs|seconds|min|mins|minutes|h|hr|hrs|hours)\s*[)\]]?)?$";

/// Unit of the source time column; everything downstream works in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    pub fn to_minutes(self, value: f64) -> f64 {
        match self {
            Self::Seconds => value / 60.0,
            Self::Minutes => value,
            Self::Hours => value * 60.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Minutes => "min",
            Self::Hours => "h",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQuality {
    pub blank_rows: usize,
    pub bad_time_rows: usize,
    pub unreadable_rows: usize,
    pub non_monotonic_steps: usize,
    pub non_numeric_cells: usize,
    pub dropped_time_columns: Vec<String>,
    pub duplicate_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub source: PathBuf,
    pub time_header: String,
    pub time_unit: TimeUnit,
    /// Row times in minutes, in file order.
    pub times: Vec<f64>,
    pub components: Vec<Component>,
    pub decks: Vec<Deck>,
    pub quality: DataQuality,
}

impl Dataset {
    /// Earliest and latest time in the file, regardless of row order.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        let mut iter = self.times.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    pub fn component_names(&self) -> Vec<String> {
        self.components.iter().map(|c| c.name.clone()).collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        let quality = &self.quality;
        let mut warnings = Vec::new();

        if quality.bad_time_rows > 0 {
            warnings.push(format!(
                "{} row(s) skipped because the time cell was not numeric",
                quality.bad_time_rows
            ));
        }
        if quality.unreadable_rows > 0 {
            warnings.push(format!(
                "{} row(s) skipped because they could not be read",
                quality.unreadable_rows
            ));
        }
        if quality.non_monotonic_steps > 0 {
            warnings.push(format!(
                "time column decreases at {} row(s); series used as given",
                quality.non_monotonic_steps
            ));
        }
        if quality.non_numeric_cells > 0 {
            warnings.push(format!(
                "{} non-numeric cell(s) treated as missing",
                quality.non_numeric_cells
            ));
        }
        for header in &quality.dropped_time_columns {
            warnings.push(format!("extra time column '{header}' ignored"));
        }
        for name in &quality.duplicate_names {
            warnings.push(format!("component '{name}' appears in more than one column"));
        }
        for component in &self.components {
            if component.series.sample_count() == 0 {
                warnings.push(format!("component '{}' has no numeric readings", component.name));
            }
        }

        warnings
    }
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        bail!("simulation data file not found: {}", path.display());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open simulation data {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header row of {}", path.display()))?
        .iter()
        .map(|header| header.trim().trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<String>>();

    let layout = ColumnLayout::from_headers(&headers)
        .with_context(|| format!("unusable header row in {}", path.display()))?;

    let naming = NamingConvention::new()?;
    let mut components = layout
        .component_columns
        .iter()
        .map(|&column| {
            let name = headers[column].clone();
            let parsed = naming.parse(&name);
            Component {
                name,
                deck: parsed.deck,
                label: parsed.label,
                series: TimeSeries::default(),
                missing_cells: 0,
            }
        })
        .collect::<Vec<Component>>();

    let mut quality = DataQuality {
        dropped_time_columns: layout
            .dropped_time_columns
            .iter()
            .map(|&column| headers[column].clone())
            .collect(),
        ..DataQuality::default()
    };

    let mut times = Vec::new();
    for (row_index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(row = row_index + 2, error = %err, "skipping unreadable data row");
                quality.unreadable_rows += 1;
                continue;
            }
        };

        if record.iter().all(|cell| cell.trim().is_empty()) {
            quality.blank_rows += 1;
            continue;
        }

        let Some(raw_time) = record.get(layout.time_column).and_then(parse_number) else {
            warn!(row = row_index + 2, "skipping row with non-numeric time");
            quality.bad_time_rows += 1;
            continue;
        };
        let time = layout.time_unit.to_minutes(raw_time);

        for (component, &column) in components.iter_mut().zip(&layout.component_columns) {
            let cell = record.get(column).unwrap_or("");
            let value = parse_number(cell);
            if value.is_none() {
                component.missing_cells += 1;
                if !cell.trim().is_empty() {
                    quality.non_numeric_cells += 1;
                }
            }
            component.series.points.push((time, value));
        }
        times.push(time);
    }

    quality.non_monotonic_steps = times.windows(2).filter(|pair| pair[1] < pair[0]).count();
    quality.duplicate_names = duplicate_names(&components);
    let decks = group_decks(&components);

    let dataset = Dataset {
        source: path.to_path_buf(),
        time_header: headers[layout.time_column].clone(),
        time_unit: layout.time_unit,
        times,
        components,
        decks,
        quality,
    };

    if dataset.times.is_empty() {
        warn!(path = %path.display(), "simulation data has no usable rows");
    }
    for message in dataset.warnings() {
        warn!("{message}");
    }
    info!(
        path = %path.display(),
        rows = dataset.times.len(),
        components = dataset.components.len(),
        decks = dataset.decks.len(),
        time_column = %dataset.time_header,
        time_unit = dataset.time_unit.as_str(),
        "loaded simulation data"
    );

    Ok(dataset)
}

/// Blank, non-numeric and non-finite cells are all "missing".
pub fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnLayout {
    time_column: usize,
    time_unit: TimeUnit,
    component_columns: Vec<usize>,
    dropped_time_columns: Vec<usize>,
}

impl ColumnLayout {
    /// A `Time, min` column wins; otherwise the first column is time, with
    /// its unit read from the header and seconds assumed when none is given.
    fn from_headers(headers: &[String]) -> Result<Self> {
        if headers.is_empty() || headers.iter().all(|header| header.is_empty()) {
            bail!("header row is empty");
        }

        let pattern = Regex::new(TIME_HEADER_PATTERN).context("failed to compile time header regex")?;
        let units = headers
            .iter()
            .map(|header| time_unit_of(&pattern, header))
            .collect::<Vec<Option<TimeUnit>>>();

        let (time_column, time_unit) = units
            .iter()
            .position(|unit| *unit == Some(TimeUnit::Minutes))
            .map(|column| (column, TimeUnit::Minutes))
            .unwrap_or_else(|| (0, units[0].unwrap_or(TimeUnit::Seconds)));

        let mut component_columns = Vec::new();
        let mut dropped_time_columns = Vec::new();
        for (column, header) in headers.iter().enumerate() {
            if column == time_column {
                continue;
            }
            if units[column].is_some() {
                dropped_time_columns.push(column);
            } else if !header.is_empty() {
                component_columns.push(column);
            }
        }

        if component_columns.is_empty() {
            bail!("no component columns after the time column");
        }

        Ok(Self {
            time_column,
            time_unit,
            component_columns,
            dropped_time_columns,
        })
    }
}

fn time_unit_of(pattern: &Regex, header: &str) -> Option<TimeUnit> {
    let captures = pattern.captures(header.trim())?;

    let unit = match captures.name("unit").map(|m| m.as_str().to_ascii_lowercase()) {
        Some(unit) if unit.starts_with('m') => TimeUnit::Minutes,
        Some(unit) if unit.starts_with('h') => TimeUnit::Hours,
        _ => TimeUnit::Seconds,
    };
    Some(unit)
}

fn duplicate_names(components: &[Component]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for component in components {
        *seen.entry(component.name.as_str()).or_default() += 1;
    }

    let mut duplicates: Vec<String> = Vec::new();
    for component in components {
        let repeated = seen.get(component.name.as_str()).copied().unwrap_or(0) > 1;
        if repeated && !duplicates.contains(&component.name) {
            duplicates.push(component.name.clone());
        }
    }
    duplicates
}

pub fn group_decks(components: &[Component]) -> Vec<Deck> {
    let mut decks: Vec<Deck> = Vec::new();
    for (index, component) in components.iter().enumerate() {
        match decks.iter_mut().find(|deck| deck.name == component.deck) {
            Some(deck) => deck.members.push(index),
            None => decks.push(Deck {
                name: component.deck.clone(),
                members: vec![index],
            }),
        }
    }
    decks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn time_headers_map_to_units() {
        let pattern = Regex::new(TIME_HEADER_PATTERN).unwrap();

        assert_eq!(time_unit_of(&pattern, " Time, min "), Some(TimeUnit::Minutes));
        assert_eq!(time_unit_of(&pattern, "time (Hours)"), Some(TimeUnit::Hours));
        assert_eq!(time_unit_of(&pattern, "Time [sec]"), Some(TimeUnit::Seconds));
        assert_eq!(time_unit_of(&pattern, "TIME"), Some(TimeUnit::Seconds));
        assert_eq!(time_unit_of(&pattern, "Timer_FOG"), None);
        assert_eq!(time_unit_of(&pattern, "VD01 FOG"), None);
    }

    #[test]
    fn minutes_column_is_used_directly() {
        let (_dir, path) = write_csv("\"Time, min\",VD01 FOG,VD01 BATT\n0,10,\n10,45,\n");
        let dataset = load_dataset(&path).unwrap();

        assert_eq!(dataset.time_unit, TimeUnit::Minutes);
        assert_eq!(dataset.times, vec![0.0, 10.0]);
        assert_eq!(dataset.components.len(), 2);
        assert_eq!(dataset.components[0].series.sample_count(), 2);
        assert_eq!(dataset.components[1].series.sample_count(), 0);
        assert_eq!(dataset.components[1].missing_cells, 2);
        assert_eq!(dataset.decks.len(), 1);
        assert_eq!(dataset.decks[0].members, vec![0, 1]);
    }

    #[test]
    fn seconds_column_is_converted_and_redundant_time_dropped() {
        let (_dir, path) = write_csv("\"Time, s\",VD01_FOG.T,Time [h]\n0,1,0\n120,2,0.03\n");
        let dataset = load_dataset(&path).unwrap();

        assert_eq!(dataset.time_unit, TimeUnit::Seconds);
        assert_eq!(dataset.times, vec![0.0, 2.0]);
        assert_eq!(dataset.component_names(), vec!["VD01_FOG.T".to_string()]);
        assert_eq!(dataset.components[0].label, "FOG");
        assert_eq!(dataset.quality.dropped_time_columns, vec!["Time [h]".to_string()]);
    }

    #[test]
    fn minutes_column_wins_over_leading_seconds_column() {
        let (_dir, path) = write_csv("\"Time, s\",\"Time, min\",VD01 FOG\n60,1,5\n120,2,6\n");
        let dataset = load_dataset(&path).unwrap();

        assert_eq!(dataset.time_header, "Time, min");
        assert_eq!(dataset.times, vec![1.0, 2.0]);
        assert_eq!(dataset.component_names(), vec!["VD01 FOG".to_string()]);
    }

    #[test]
    fn unlabelled_first_column_is_assumed_seconds() {
        let (_dir, path) = write_csv("t,VD01 FOG\n0,1\n60,2\n");
        let dataset = load_dataset(&path).unwrap();
        assert_eq!(dataset.time_unit, TimeUnit::Seconds);
        assert_eq!(dataset.times, vec![0.0, 1.0]);
    }

    #[test]
    fn bad_cells_become_missing_and_rows_are_cleaned() {
        let (_dir, path) = write_csv(
            "\"Time, min\",VD01 FOG,VD02 RW\n0,1,2\n,,\nabc,3,4\n5,n/a,6\n3,7\n",
        );
        let dataset = load_dataset(&path).unwrap();

        assert_eq!(dataset.times, vec![0.0, 5.0, 3.0]);
        assert_eq!(dataset.quality.blank_rows, 1);
        assert_eq!(dataset.quality.bad_time_rows, 1);
        assert_eq!(dataset.quality.non_numeric_cells, 1);
        assert_eq!(dataset.quality.non_monotonic_steps, 1);

        let fog = &dataset.components[0];
        assert_eq!(fog.series.points, vec![(0.0, Some(1.0)), (5.0, None), (3.0, Some(7.0))]);
        let wheel = &dataset.components[1];
        assert_eq!(wheel.missing_cells, 1);
        assert_eq!(dataset.time_span(), Some((0.0, 5.0)));
        assert!(dataset.warnings().iter().any(|w| w.contains("decreases")));
    }

    #[test]
    fn decks_group_in_first_appearance_order() {
        let (_dir, path) = write_csv("\"Time, min\",VD02 A,VD01 B,VD02 C\n0,1,2,3\n");
        let dataset = load_dataset(&path).unwrap();

        let names = dataset.decks.iter().map(|d| d.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["VD02", "VD01"]);
        assert_eq!(dataset.decks[0].members, vec![0, 2]);
    }

    #[test]
    fn duplicate_headers_are_kept_and_reported() {
        let (_dir, path) = write_csv("\"Time, min\",VD01 FOG,VD01 FOG\n0,1,2\n");
        let dataset = load_dataset(&path).unwrap();
        assert_eq!(dataset.components.len(), 2);
        assert_eq!(dataset.quality.duplicate_names, vec!["VD01 FOG".to_string()]);
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dataset(&dir.path().join("absent.csv")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn header_without_components_is_fatal() {
        let (_dir, path) = write_csv("\"Time, min\"\n0\n1\n");
        assert!(load_dataset(&path).is_err());

        let (_dir, path) = write_csv("");
        assert!(load_dataset(&path).is_err());
    }

    #[test]
    fn parse_number_rejects_blank_and_non_finite() {
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("-3e1"), Some(-30.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("--"), None);
    }
}
