//! One record page in, one reconstructed day out.

use serde::{Deserialize, Serialize};

use crate::censor::detect_censor_flags;
use crate::extract::{extract_actual_games, extract_play_graphs, select_target_graph};
use crate::extrapolate::{extrapolate, projection_slope};
use crate::report::{Diagnostic, DiagnosticSink};
use crate::transform::{rescale_to_games, to_series};
use crate::{DailySummary, DayKey, DomainPoint, Params, PgError};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DayOutput {
    pub day: DayKey,
    pub series: Vec<DomainPoint>,
    pub summary: DailySummary,
}

/// Run extraction, transform, censor detection and (for configured days)
/// extrapolation over one page. `actual_games` overrides the count printed in
/// the page when the caller knows better.
pub fn process_day(
    day: DayKey,
    html: &str,
    actual_games: Option<u64>,
    params: &Params,
    sink: &mut dyn DiagnosticSink,
) -> Result<DayOutput, PgError> {
    let graphs = extract_play_graphs(html, sink);
    let target = select_target_graph(&graphs).ok_or(PgError::NoTargetGraph)?;
    sink.emit(Diagnostic::TargetSelected {
        day,
        candidates: graphs.len(),
        points: target.len(),
    });

    let mut series = to_series(target);
    if series.is_empty() {
        return Err(PgError::EmptySeries);
    }
    check_day_order(&series)?;

    let actual_games = actual_games.or_else(|| extract_actual_games(html));
    let flags = detect_censor_flags(target, actual_games);
    if flags.any() {
        sink.emit(Diagnostic::Censored { day, flags });
    }

    let mut rescaled = false;
    if let (true, Some(games)) = (params.rescale_to_actual_games, actual_games) {
        if flags.censored_right {
            sink.emit(Diagnostic::RescaleSkipped {
                day,
                actual_games: games,
            });
        } else {
            let last_game = series.last().map(|p| p.game).unwrap_or(0.0);
            rescaled = rescale_to_games(&mut series, games);
            if rescaled {
                sink.emit(Diagnostic::Rescaled {
                    day,
                    actual_games: games,
                    last_game,
                });
            }
        }
    }

    let mut extrapolated_points_count = 0;
    let special = params.special_days.get(&day);
    if let Some(config) = special {
        let slope = projection_slope(&series, config);
        extrapolated_points_count = extrapolate(&mut series, config)?;
        sink.emit(Diagnostic::SpecialRuleApplied {
            day,
            slope,
            extrapolated_points: extrapolated_points_count,
        });
    }

    let last_diff = series.last().map(|p| p.diff).ok_or(PgError::EmptySeries)?;
    let summary = DailySummary {
        day,
        last_diff,
        actual_games,
        censored_right: flags.censored_right,
        censored_bottom: flags.censored_bottom,
        special_rule_applied: special.is_some(),
        extrapolated_points_count,
        rescaled,
    };

    Ok(DayOutput {
        day,
        series,
        summary,
    })
}

fn check_day_order(series: &[DomainPoint]) -> Result<(), PgError> {
    match series.windows(2).position(|w| w[1].game < w[0].game) {
        Some(index) => Err(PgError::NonMonotonicDay { index: index + 1 }),
        None => Ok(()),
    }
}
