//! Stitch per-day series into one all-time curve.
//!
//! Each day is moved to start at (0, 0) and then shifted by the net change of
//! every earlier day, so the carry is the day's delta rather than its absolute
//! end value. Days whose pages do not start at zero therefore stitch cleanly.

use std::collections::{BTreeMap, HashSet};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{CumulativePoint, DayKey, DomainPoint, PgError};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Cumulative {
    pub points: Vec<CumulativePoint>,
    pub duplicates_removed: usize,
    pub non_finite_removed: usize,
}

/// A contiguous run of real or extrapolated points. Every run after the first
/// begins with the previous run's last point so the drawn line has no gaps.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSegment {
    pub extrapolated: bool,
    pub points: Vec<(f64, f64)>,
}

fn dedup_key(cum_game: f64) -> OrderedFloat<f64> {
    OrderedFloat((cum_game * 1e6).round() / 1e6)
}

fn is_finite_point(point: &CumulativePoint) -> bool {
    point.cum_game.is_finite() && point.cum_diff.is_finite()
}

pub fn build_cumulative(
    days: &BTreeMap<DayKey, Vec<DomainPoint>>,
) -> Result<Cumulative, PgError> {
    let total: usize = days.values().map(Vec::len).sum();
    let mut stitched = Vec::with_capacity(total);
    let mut cum_game = 0.0;
    let mut cum_diff = 0.0;

    for (day, series) in days {
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            continue;
        };
        for point in series {
            stitched.push(CumulativePoint {
                cum_game: cum_game + (point.game - first.game),
                cum_diff: cum_diff + (point.diff - first.diff),
                day: *day,
                extrapolated: point.extrapolated,
            });
        }
        let delta_game = last.game - first.game;
        let delta_diff = last.diff - first.diff;
        // A corrupt day must not poison the carry for the days after it.
        if delta_game.is_finite() && delta_diff.is_finite() {
            cum_game += delta_game;
            cum_diff += delta_diff;
        }
    }

    let base = stitched
        .iter()
        .find(|p| is_finite_point(p))
        .map(|p| p.cum_diff)
        .unwrap_or(0.0);

    let mut out = Cumulative::default();
    let mut seen: HashSet<OrderedFloat<f64>> = HashSet::with_capacity(stitched.len());
    for mut point in stitched {
        point.cum_diff -= base;
        if !is_finite_point(&point) {
            out.non_finite_removed += 1;
            continue;
        }
        if !seen.insert(dedup_key(point.cum_game)) {
            out.duplicates_removed += 1;
            continue;
        }
        out.points.push(point);
    }

    verify_monotonic(&out.points)?;
    out.points
        .sort_by(|a, b| a.cum_game.total_cmp(&b.cum_game));
    Ok(out)
}

/// Fails on the first point whose cumulative game count is below its predecessor.
pub fn verify_monotonic(points: &[CumulativePoint]) -> Result<(), PgError> {
    for (index, pair) in points.windows(2).enumerate() {
        if pair[1].cum_game < pair[0].cum_game {
            return Err(PgError::Integrity {
                index: index + 1,
                prev: pair[0].cum_game,
                next: pair[1].cum_game,
            });
        }
    }
    Ok(())
}

pub fn chart_segments(points: &[CumulativePoint]) -> Vec<ChartSegment> {
    let mut segments: Vec<ChartSegment> = Vec::new();
    for point in points {
        let xy = (point.cum_game, point.cum_diff);
        let continues = segments
            .last()
            .is_some_and(|seg| seg.extrapolated == point.extrapolated);
        if continues {
            if let Some(seg) = segments.last_mut() {
                seg.points.push(xy);
            }
            continue;
        }
        let mut run = Vec::new();
        if let Some(&joint) = segments.last().and_then(|seg| seg.points.last()) {
            run.push(joint);
        }
        run.push(xy);
        segments.push(ChartSegment {
            extrapolated: point.extrapolated,
            points: run,
        });
    }
    segments
}
