use serde::{Deserialize, Serialize};

/// Sentinel written for both acceptance limits of a bootstrapped row.
pub const PLACEHOLDER_LIMIT: f64 = -999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
    Undefined,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Undefined => "UNDEFINED",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub points: Vec<(f64, Option<f64>)>,
}

impl TimeSeries {
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|(time, value)| value.map(|value| (*time, value)))
    }

    pub fn sample_count(&self) -> usize {
        self.points.iter().filter(|(_, value)| value.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub deck: String,
    pub label: String,
    pub series: TimeSeries,
    pub missing_cells: usize,
}

impl Component {
    pub fn display_name(&self) -> String {
        if self.label == self.deck {
            self.deck.clone()
        } else {
            format!("{} {}", self.deck, self.label)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    pub name: String,
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LimitsRecord {
    #[serde(rename = "ComponentName")]
    pub component_name: String,
    #[serde(rename = "Acceptance_Min")]
    pub acceptance_min: f64,
    #[serde(rename = "Acceptance_Max")]
    pub acceptance_max: f64,
    #[serde(rename = "Design_Min", default)]
    pub design_min: Option<f64>,
    #[serde(rename = "Design_Max", default)]
    pub design_max: Option<f64>,
}

impl LimitsRecord {
    pub fn placeholder(component_name: &str) -> Self {
        Self {
            component_name: component_name.to_string(),
            acceptance_min: PLACEHOLDER_LIMIT,
            acceptance_max: PLACEHOLDER_LIMIT,
            design_min: None,
            design_max: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.acceptance_min == PLACEHOLDER_LIMIT && self.acceptance_max == PLACEHOLDER_LIMIT
    }

    pub fn is_inverted(&self) -> bool {
        self.acceptance_min > self.acceptance_max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub component_name: String,
    pub deck: String,
    pub label: String,
    pub sample_count: usize,
    pub observed_min: Option<f64>,
    pub observed_max: Option<f64>,
    pub observed_min_zoomed: Option<f64>,
    pub observed_max_zoomed: Option<f64>,
    pub acceptance_min: f64,
    pub acceptance_max: f64,
    /// Cold margin: observed minimum above the acceptance minimum.
    pub margin_min: Option<f64>,
    /// Hot margin: acceptance maximum above the observed maximum.
    pub margin_max: Option<f64>,
    pub status: Status,
    pub placeholder_limits: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoomWindow {
    pub start_min: f64,
    pub end_min: f64,
    pub clamped: bool,
}

impl ZoomWindow {
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_min && time <= self.end_min
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pass: usize,
    pub fail: usize,
    pub undefined: usize,
}

impl StatusCounts {
    pub fn tally(results: &[EvaluationResult]) -> Self {
        let mut counts = Self::default();
        for result in results {
            match result.status {
                Status::Pass => counts.pass += 1,
                Status::Fail => counts.fail += 1,
                Status::Undefined => counts.undefined += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlotCounts {
    pub written: usize,
    pub unavailable: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub output_root: String,
    pub data_file: String,
    pub data_sha256: String,
    pub limits_file: String,
    pub limits_sha256: Option<String>,
    pub zoom_window: ZoomWindow,
    pub component_count: usize,
    pub deck_count: usize,
    pub counts: StatusCounts,
    pub plots: PlotCounts,
    pub created_placeholders: Vec<String>,
    pub warnings: Vec<String>,
    pub results: Vec<EvaluationResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotCategory {
    Full,
    Zoomed,
    Deck,
    DeckZoomed,
}

impl PlotCategory {
    pub const ALL: [PlotCategory; 4] = [
        PlotCategory::Full,
        PlotCategory::Zoomed,
        PlotCategory::Deck,
        PlotCategory::DeckZoomed,
    ];

    pub fn folder_name(self) -> &'static str {
        match self {
            Self::Full => "Component_Plots_Full_Profile",
            Self::Zoomed => "Component_Plots_Zoomed_Profile",
            Self::Deck => "Component_Plots_Consolidated_Decks",
            Self::DeckZoomed => "Component_Plots_Consolidated_Decks_Zoomed",
        }
    }

    pub fn file_prefix(self) -> &'static str {
        match self {
            Self::Full => "Plot_Full",
            Self::Zoomed => "Plot_Zoomed",
            Self::Deck => "Plot_Deck",
            Self::DeckZoomed => "Plot_Deck_Zoomed",
        }
    }

    pub fn is_zoomed(self) -> bool {
        matches!(self, Self::Zoomed | Self::DeckZoomed)
    }

    pub fn is_consolidated(self) -> bool {
        matches!(self, Self::Deck | Self::DeckZoomed)
    }
}
