use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::model::{LimitsRecord, PLACEHOLDER_LIMIT};

const COMPONENT_NAME_COLUMN: &str = "ComponentName";
const ACCEPTANCE_MIN_COLUMN: &str = "Acceptance_Min";
const ACCEPTANCE_MAX_COLUMN: &str = "Acceptance_Max";

#[derive(Debug, Clone, Default)]
pub struct LimitsTable {
    records: Vec<LimitsRecord>,
    index: HashMap<String, usize>,
    pub warnings: Vec<String>,
}

impl LimitsTable {
    pub fn get(&self, component_name: &str) -> Option<&LimitsRecord> {
        self.index
            .get(component_name.trim())
            .and_then(|&position| self.records.get(position))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[LimitsRecord] {
        &self.records
    }

    /// First record for a name wins; later duplicates are reported.
    fn insert(&mut self, record: LimitsRecord) {
        let key = record.component_name.trim().to_string();
        if self.index.contains_key(&key) {
            self.warn(format!(
                "duplicate limits row for '{key}' ignored; the first row is used"
            ));
            return;
        }
        self.index.insert(key, self.records.len());
        self.records.push(record);
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Loads the limits file, bootstrapping it when absent and appending a
/// placeholder row for every component that has none. Existing rows are
/// never rewritten. Returns the table and the names whose placeholder rows
/// were saved. I/O failures leave the placeholders in memory with a warning.
pub fn ensure_limits(path: &Path, component_names: &[String]) -> (LimitsTable, Vec<String>) {
    let mut wanted: Vec<&str> = Vec::new();
    for name in component_names {
        let name = name.trim();
        if !wanted.contains(&name) {
            wanted.push(name);
        }
    }

    let existing = if path.exists() {
        match fs::read(path).with_context(|| format!("failed to read limits file {}", path.display())) {
            Ok(existing) => existing,
            Err(err) => return (in_memory_only(&wanted, &err), Vec::new()),
        }
    } else {
        Vec::new()
    };

    if existing.iter().all(u8::is_ascii_whitespace) {
        let mut table = LimitsTable::default();
        for name in &wanted {
            table.insert(LimitsRecord::placeholder(name));
        }
        if let Err(err) = write_new_limits_file(path, &wanted) {
            table.warn(format!("{err:#}; placeholder limits kept in memory only"));
            return (table, Vec::new());
        }
        info!(
            path = %path.display(),
            components = wanted.len(),
            "limits file not found; wrote placeholder limits"
        );
        let created = wanted.iter().map(|name| name.to_string()).collect();
        return (table, created);
    }

    let (mut table, headers) = match read_limits(&existing, path) {
        Ok(parsed) => parsed,
        Err(err) => return (in_memory_only(&wanted, &err), Vec::new()),
    };

    let mut missing = wanted
        .iter()
        .filter(|name| table.get(name).is_none())
        .map(|name| name.to_string())
        .collect::<Vec<String>>();
    for name in &missing {
        table.insert(LimitsRecord::placeholder(name));
    }

    let Some(headers) = headers else {
        // Without a ComponentName column, appending would corrupt the file.
        table.warn(format!(
            "limits file {} has no {COMPONENT_NAME_COLUMN} column; placeholder limits used in memory only",
            path.display()
        ));
        return (table, Vec::new());
    };

    if !missing.is_empty() {
        match append_placeholders(path, &existing, &headers, &missing) {
            Ok(()) => info!(
                path = %path.display(),
                appended = missing.len(),
                "appended placeholder limits for new components"
            ),
            Err(err) => {
                table.warn(format!("{err:#}; placeholder limits kept in memory only"));
                missing.clear();
            }
        }
    }

    info!(path = %path.display(), records = table.len(), "loaded component limits");
    (table, missing)
}

fn in_memory_only(names: &[&str], err: &anyhow::Error) -> LimitsTable {
    let mut table = LimitsTable::default();
    table.warn(format!("{err:#}; placeholder limits used for every component"));
    for name in names {
        table.insert(LimitsRecord::placeholder(name));
    }
    table
}

/// Parses existing limits. Rows with unparseable numbers stay in the table
/// as in-memory placeholders. The returned headers are `None` when the file
/// has no `ComponentName` column.
fn read_limits(contents: &[u8], path: &Path) -> Result<(LimitsTable, Option<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents);

    let header_record = reader
        .headers()
        .with_context(|| format!("failed to read header row of {}", path.display()))?
        .clone();
    let headers = header_record
        .iter()
        .map(|header| header.to_string())
        .collect::<Vec<String>>();

    let mut table = LimitsTable::default();
    let Some(name_column) = headers.iter().position(|h| h == COMPONENT_NAME_COLUMN) else {
        return Ok((table, None));
    };

    for (row_index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                table.warn(format!(
                    "limits row {} could not be read: {err}",
                    row_index + 2
                ));
                continue;
            }
        };

        let name = record.get(name_column).unwrap_or("").trim().to_string();
        if name.is_empty() {
            continue;
        }

        match record.deserialize::<LimitsRecord>(Some(&header_record)) {
            Ok(parsed) => table.insert(parsed),
            Err(err) => {
                table.warn(format!(
                    "limits for '{name}' could not be parsed ({err}); treated as placeholder"
                ));
                table.insert(LimitsRecord::placeholder(&name));
            }
        }
    }

    Ok((table, Some(headers)))
}

fn write_new_limits_file(path: &Path, names: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    let headers = [COMPONENT_NAME_COLUMN, ACCEPTANCE_MIN_COLUMN, ACCEPTANCE_MAX_COLUMN].map(String::from);
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create limits file {}", path.display()))?;
    writer
        .write_record(&headers)
        .with_context(|| format!("failed to write limits file {}", path.display()))?;
    let sentinel = placeholder_cell();
    for name in names {
        writer
            .write_record(placeholder_row(&headers, name, &sentinel))
            .with_context(|| format!("failed to write limits file {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush limits file {}", path.display()))?;
    Ok(())
}

fn append_placeholders(
    path: &Path,
    existing: &[u8],
    headers: &[String],
    names: &[String],
) -> Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open limits file {} for append", path.display()))?;

    if !existing.ends_with(b"\n") {
        file.write_all(b"\n")
            .with_context(|| format!("failed to append to limits file {}", path.display()))?;
    }

    let sentinel = placeholder_cell();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(file);

    for name in names {
        writer
            .write_record(placeholder_row(headers, name, &sentinel))
            .with_context(|| format!("failed to append to limits file {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush limits file {}", path.display()))?;
    Ok(())
}

fn placeholder_cell() -> String {
    PLACEHOLDER_LIMIT.to_string()
}

fn placeholder_row<'a>(headers: &[String], name: &'a str, sentinel: &'a str) -> Vec<&'a str> {
    headers
        .iter()
        .map(|header| match header.as_str() {
            COMPONENT_NAME_COLUMN => name,
            ACCEPTANCE_MIN_COLUMN | ACCEPTANCE_MAX_COLUMN => sentinel,
            _ => "",
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn bootstraps_missing_file_with_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");

        let (table, created) = ensure_limits(&path, &names(&["VD01 FOG", "VD01 BATT"]));

        assert_eq!(created, names(&["VD01 FOG", "VD01 BATT"]));
        assert!(table.get("VD01 FOG").unwrap().is_placeholder());
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("ComponentName,Acceptance_Min,Acceptance_Max"));
        assert!(written.ends_with("VD01 FOG,-999,-999\nVD01 BATT,-999,-999\n"));
    }

    #[test]
    fn appends_only_missing_components_and_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");
        let original = "ComponentName,Acceptance_Min,Acceptance_Max\nVD01 FOG,-10,60";
        fs::write(&path, original).unwrap();

        let (table, created) = ensure_limits(&path, &names(&["VD01 FOG", "VD01 BATT"]));

        assert_eq!(created, names(&["VD01 BATT"]));
        let fog = table.get("VD01 FOG").unwrap();
        assert_eq!((fog.acceptance_min, fog.acceptance_max), (-10.0, 60.0));
        assert!(table.get("VD01 BATT").unwrap().is_placeholder());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(original));
        assert!(written.ends_with("VD01 BATT,-999,-999\n"));
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");
        let components = names(&["VD01 FOG", "VD02 RW"]);

        ensure_limits(&path, &components);
        let first = fs::read_to_string(&path).unwrap();
        let (table, created) = ensure_limits(&path, &components);

        assert!(created.is_empty());
        assert_eq!(table.len(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn optional_design_columns_survive_and_extra_columns_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");
        fs::write(
            &path,
            "ComponentName,Acceptance_Min,Acceptance_Max,Design_Min,Design_Max\nVD01 FOG,-10,50,-15,55\n",
        )
        .unwrap();

        let (table, _) = ensure_limits(&path, &names(&["VD01 FOG", "VD03 HTR"]));

        assert_eq!(table.get("VD01 FOG").unwrap().design_max, Some(55.0));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("VD03 HTR,-999,-999,,\n"));
    }

    #[test]
    fn unparseable_row_becomes_in_memory_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");
        let original = "ComponentName,Acceptance_Min,Acceptance_Max\nVD01 FOG,cold,60\n";
        fs::write(&path, original).unwrap();

        let (table, created) = ensure_limits(&path, &names(&["VD01 FOG"]));

        assert!(created.is_empty());
        assert!(table.get("VD01 FOG").unwrap().is_placeholder());
        assert_eq!(table.warnings.len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn file_without_name_column_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");
        let original = "Name,Min,Max\nVD01 FOG,-10,60\n";
        fs::write(&path, original).unwrap();

        let (table, created) = ensure_limits(&path, &names(&["VD01 FOG"]));

        assert!(created.is_empty());
        assert!(table.get("VD01 FOG").unwrap().is_placeholder());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn duplicate_rows_keep_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");
        fs::write(
            &path,
            "ComponentName,Acceptance_Min,Acceptance_Max\nVD01 FOG,-10,60\nVD01 FOG,0,1\n",
        )
        .unwrap();

        let (table, _) = ensure_limits(&path, &names(&["VD01 FOG"]));
        assert_eq!(table.get("VD01 FOG").unwrap().acceptance_max, 60.0);
        assert_eq!(table.warnings.len(), 1);
    }

    #[test]
    fn unwritable_location_keeps_placeholders_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("limits.csv");

        let (table, created) = ensure_limits(&path, &names(&["VD01 FOG", "VD01 BATT"]));

        assert!(created.is_empty());
        assert_eq!(table.len(), 2);
        assert!(table.get("VD01 BATT").unwrap().is_placeholder());
        assert_eq!(table.warnings.len(), 1);
        assert!(table.warnings[0].contains("kept in memory only"));
    }

    #[test]
    fn unreadable_limits_path_falls_back_to_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");
        fs::create_dir(&path).unwrap();

        let (table, created) = ensure_limits(&path, &names(&["VD01 FOG"]));

        assert!(created.is_empty());
        assert!(table.get("VD01 FOG").unwrap().is_placeholder());
        assert!(table.warnings[0].contains("failed to read limits file"));
        assert!(path.is_dir());
    }
}
