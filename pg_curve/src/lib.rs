//! PlayGraph curve reconstruction: turn the pixel-space play graphs embedded in
//! scraped record pages back into game/balance series, repair the known
//! censoring defects and stitch the days into one all-time curve.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod censor;
pub mod cumulative;
pub mod day;
pub mod extract;
pub mod extrapolate;
pub mod pipeline;
pub mod report;
pub mod transform;

pub use censor::detect_censor_flags;
pub use cumulative::{build_cumulative, chart_segments, verify_monotonic, ChartSegment, Cumulative};
pub use day::{process_day, DayOutput};
pub use extract::{extract_actual_games, extract_play_graphs, select_target_graph};
pub use extrapolate::{
    estimate_slope_before_bottom, extrapolate, find_bottom_start_index, ExtrapolationConfig,
    MAX_EXTRAPOLATED_POINTS,
};
pub use pipeline::{collect_batch, process_batch, BatchOutput, DayDocument};
pub use report::{CollectingSink, Diagnostic, DiagnosticSink, Level, NullSink, RejectReason};
pub use transform::{rescale_to_games, to_series};

/// The one historically truncated day that gets the extrapolation treatment by default.
pub const SPECIAL_DAY: &str = "2024-08-31";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PgError {
    #[error("invalid day key '{0}': expected YYYY-MM-DD")]
    InvalidDay(String),
    #[error("no PlayGraph payload with the required fields was found")]
    NoTargetGraph,
    #[error("target graph has no points")]
    EmptySeries,
    #[error("day series goes backwards in game count at point {index}")]
    NonMonotonicDay { index: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("cumulative game count went backwards at index {index}: {prev} -> {next}")]
    Integrity { index: usize, prev: f64, next: f64 },
}

/// Calendar day a record page belongs to. Orders chronologically and prints as `YYYY-MM-DD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(DayKey)
    }

    pub fn parse(input: &str) -> Result<Self, PgError> {
        NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .map(DayKey)
            .map_err(|_| PgError::InvalidDay(input.to_string()))
    }

    /// First valid `YYYY-MM-DD` token found anywhere in the path.
    pub fn from_path(path: &Path) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid day regex"));
        let text = path.to_string_lossy();
        re.find_iter(&text)
            .find_map(|m| DayKey::parse(m.as_str()).ok())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = PgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DayKey::parse(s)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct GraphRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl GraphRect {
    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }
}

/// Axis range the widget was drawn with (`PLAY_INFO`).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct AxisRange {
    #[serde(rename = "total")]
    pub total_games: f64,
    #[serde(rename = "min")]
    pub min_balance: f64,
    #[serde(rename = "max")]
    pub max_balance: f64,
}

/// One embedded `PlayGraph` widget in pixel space, as authored by the site.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PixelGraph {
    #[serde(rename = "GRAPH_RECT")]
    pub rect: GraphRect,
    #[serde(rename = "PLAY_INFO")]
    pub axis: AxisRange,
    #[serde(rename = "PLAY_LOG")]
    pub points: Vec<(f64, f64)>,
}

impl PixelGraph {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A reconstructed sample: games played and net balance, one decimal.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DomainPoint {
    pub game: f64,
    pub diff: f64,
    #[serde(default)]
    pub extrapolated: bool,
}

impl DomainPoint {
    pub fn new(game: f64, diff: f64) -> Self {
        Self {
            game,
            diff,
            extrapolated: false,
        }
    }

    pub fn synthetic(game: f64, diff: f64) -> Self {
        Self {
            game,
            diff,
            extrapolated: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CensorFlags {
    pub censored_right: bool,
    pub censored_bottom: bool,
}

impl CensorFlags {
    pub fn any(&self) -> bool {
        self.censored_right || self.censored_bottom
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DailySummary {
    pub day: DayKey,
    pub last_diff: f64,
    pub actual_games: Option<u64>,
    pub censored_right: bool,
    pub censored_bottom: bool,
    pub special_rule_applied: bool,
    pub extrapolated_points_count: usize,
    pub rescaled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CumulativePoint {
    pub cum_game: f64,
    pub cum_diff: f64,
    pub day: DayKey,
    pub extrapolated: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Stretch each day so its last point lands on the page's reported game count.
    pub rescale_to_actual_games: bool,
    /// Days whose truncated graph is continued by [`extrapolate`], with their constants.
    pub special_days: BTreeMap<DayKey, ExtrapolationConfig>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            rescale_to_actual_games: true,
            special_days: DayKey::from_ymd(2024, 8, 31)
                .map(|day| (day, ExtrapolationConfig::default()))
                .into_iter()
                .collect(),
        }
    }
}
