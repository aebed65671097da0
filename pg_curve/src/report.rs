//! Structured diagnostics emitted by the pipeline. The library never prints;
//! callers decide where events go by handing in a [`DiagnosticSink`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CensorFlags, DayKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Debug,
    Info,
    Warn,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// JSON failed to parse, also after stripping line breaks.
    MalformedJson(String),
    /// One of `GRAPH_RECT`, `PLAY_INFO`, `PLAY_LOG` is absent.
    MissingFields(Vec<String>),
    /// Fields are present but do not have the widget's shape.
    InvalidShape(String),
    /// Zero or negative width/height; the pixel mapping cannot be inverted.
    DegenerateRect,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MalformedJson(err) => write!(f, "malformed JSON ({})", err),
            RejectReason::MissingFields(keys) => write!(f, "missing {}", keys.join(", ")),
            RejectReason::InvalidShape(err) => write!(f, "unexpected payload shape ({})", err),
            RejectReason::DegenerateRect => write!(f, "degenerate graph rectangle"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// Payload number `occurrence` only parsed after removing line breaks.
    PayloadRecovered { occurrence: usize },
    PayloadRejected {
        occurrence: usize,
        reason: RejectReason,
    },
    TargetSelected {
        day: DayKey,
        candidates: usize,
        points: usize,
    },
    Rescaled {
        day: DayKey,
        actual_games: u64,
        last_game: f64,
    },
    RescaleSkipped { day: DayKey, actual_games: u64 },
    Censored { day: DayKey, flags: CensorFlags },
    SpecialRuleApplied {
        day: DayKey,
        slope: f64,
        extrapolated_points: usize,
    },
    DaySkipped { day: DayKey, reason: String },
    DuplicateDay { day: DayKey },
    /// A later page for an already processed day failed; the earlier one stays.
    LaterPageFailed { day: DayKey, reason: String },
}

impl Diagnostic {
    pub fn level(&self) -> Level {
        match self {
            Diagnostic::TargetSelected { .. } | Diagnostic::Rescaled { .. } => Level::Debug,
            Diagnostic::PayloadRecovered { .. }
            | Diagnostic::RescaleSkipped { .. }
            | Diagnostic::Censored { .. }
            | Diagnostic::SpecialRuleApplied { .. } => Level::Info,
            Diagnostic::PayloadRejected { .. }
            | Diagnostic::DaySkipped { .. }
            | Diagnostic::DuplicateDay { .. }
            | Diagnostic::LaterPageFailed { .. } => Level::Warn,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::PayloadRecovered { occurrence } => {
                write!(f, "PlayGraph #{} parsed after stripping line breaks", occurrence)
            }
            Diagnostic::PayloadRejected { occurrence, reason } => {
                write!(f, "PlayGraph #{} discarded: {}", occurrence, reason)
            }
            Diagnostic::TargetSelected {
                day,
                candidates,
                points,
            } => write!(
                f,
                "{}: target graph has {} points ({} candidates)",
                day, points, candidates
            ),
            Diagnostic::Rescaled {
                day,
                actual_games,
                last_game,
            } => write!(
                f,
                "{}: rescaled last game {:.1} -> {}",
                day, last_game, actual_games
            ),
            Diagnostic::RescaleSkipped { day, actual_games } => write!(
                f,
                "{}: right-censored ({} games), keeping widget scale",
                day, actual_games
            ),
            Diagnostic::Censored { day, flags } => write!(
                f,
                "{}: censored right={} bottom={}",
                day, flags.censored_right, flags.censored_bottom
            ),
            Diagnostic::SpecialRuleApplied {
                day,
                slope,
                extrapolated_points,
            } => write!(
                f,
                "{}: extrapolated {} points (slope {:.4})",
                day, extrapolated_points, slope
            ),
            Diagnostic::DaySkipped { day, reason } => write!(f, "{}: skipped ({})", day, reason),
            Diagnostic::DuplicateDay { day } => {
                write!(f, "{}: duplicate page, keeping the later one", day)
            }
            Diagnostic::LaterPageFailed { day, reason } => write!(
                f,
                "{}: later page failed ({}), keeping the earlier one",
                day, reason
            ),
        }
    }
}

pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Keeps every event in order; used by tests and for per-day buffering.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn replay_into(self, sink: &mut dyn DiagnosticSink) {
        for event in self.events {
            sink.emit(event);
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter().filter(|e| e.level() == Level::Warn)
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.events.push(diagnostic);
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&mut self, _diagnostic: Diagnostic) {}
}
