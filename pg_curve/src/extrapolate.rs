//! Continuation of a graph that was clipped at the bottom edge. This is a
//! narrow repair for individually configured days, not a forecasting model.

use serde::{Deserialize, Serialize};

use crate::censor::BOTTOM_CENSOR_MIN_BALANCE;
use crate::transform::round_tenth;
use crate::{DomainPoint, PgError};

/// Upper bound on synthetic points per day.
pub const MAX_EXTRAPOLATED_POINTS: usize = 100_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtrapolationConfig {
    /// Stop once the projected game count reaches this value.
    pub target_game: f64,
    /// Projected balance never goes below this.
    pub target_min_diff: f64,
    pub step_game: f64,
    /// Balance at which the widget clips.
    pub bottom_value: f64,
    pub bottom_eps: f64,
    /// Points before the clip used for the slope fit.
    pub window_size: usize,
}

impl ExtrapolationConfig {
    /// Reject step and target values the projection cannot work with. A series
    /// starting at `from_game` must reach the target within
    /// [`MAX_EXTRAPOLATED_POINTS`] steps.
    pub fn validate(&self, from_game: f64) -> Result<(), PgError> {
        if !(self.step_game.is_finite() && self.step_game > 0.0) {
            return Err(PgError::InvalidParameter(format!(
                "step_game must be positive, got {}",
                self.step_game
            )));
        }
        if !self.target_game.is_finite() {
            return Err(PgError::InvalidParameter(format!(
                "target_game must be finite, got {}",
                self.target_game
            )));
        }
        let steps = ((self.target_game - from_game) / self.step_game).ceil();
        if steps > MAX_EXTRAPOLATED_POINTS as f64 {
            return Err(PgError::InvalidParameter(format!(
                "target_game {} is more than {} steps of {} away",
                self.target_game, MAX_EXTRAPOLATED_POINTS, self.step_game
            )));
        }
        Ok(())
    }
}

impl Default for ExtrapolationConfig {
    fn default() -> Self {
        Self {
            target_game: 10073.0,
            target_min_diff: -3000.0,
            step_game: 50.0,
            bottom_value: BOTTOM_CENSOR_MIN_BALANCE,
            bottom_eps: 10.0,
            window_size: 5,
        }
    }
}

/// Index of the first point within `eps` of `bottom_value`.
pub fn find_bottom_start_index(series: &[DomainPoint], bottom_value: f64, eps: f64) -> Option<usize> {
    series
        .iter()
        .position(|p| (p.diff - bottom_value).abs() <= eps)
}

/// Least-squares slope (balance per game) over the `window_size` points that
/// precede `bottom_index`. Degenerate windows give a flat slope.
pub fn estimate_slope_before_bottom(
    series: &[DomainPoint],
    bottom_index: usize,
    window_size: usize,
) -> f64 {
    if bottom_index < 2 || bottom_index > series.len() {
        return 0.0;
    }
    let start = bottom_index.saturating_sub(window_size);
    let window = &series[start..bottom_index];
    if window.len() < 2 {
        return 0.0;
    }

    let n = window.len() as f64;
    let (sum_x, sum_y, sum_xy, sum_xx) =
        window
            .iter()
            .fold((0.0, 0.0, 0.0, 0.0), |(sx, sy, sxy, sxx), p| {
                (
                    sx + p.game,
                    sy + p.diff,
                    sxy + p.game * p.diff,
                    sxx + p.game * p.game,
                )
            });
    let denom = n * sum_xx - sum_x * sum_x;
    if !denom.is_finite() || denom.abs() < 1e-12 {
        return 0.0;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}

/// Slope the projection would use for `series` under `config`.
pub fn projection_slope(series: &[DomainPoint], config: &ExtrapolationConfig) -> f64 {
    find_bottom_start_index(series, config.bottom_value, config.bottom_eps)
        .map(|idx| estimate_slope_before_bottom(series, idx, config.window_size))
        .unwrap_or(0.0)
}

/// Append synthetic points from the last point until `target_game` is reached.
/// Existing points are left untouched. Returns how many points were added.
pub fn extrapolate(
    series: &mut Vec<DomainPoint>,
    config: &ExtrapolationConfig,
) -> Result<usize, PgError> {
    let Some(last) = series.last().copied() else {
        config.validate(0.0)?;
        return Ok(0);
    };
    config.validate(last.game)?;

    let slope = projection_slope(series, config);
    let mut game = last.game;
    let mut diff = last.diff;
    let mut added = 0usize;
    while game < config.target_game && added < MAX_EXTRAPOLATED_POINTS {
        game += config.step_game;
        diff = (diff + slope * config.step_game).max(config.target_min_diff);
        series.push(DomainPoint::synthetic(round_tenth(game), round_tenth(diff)));
        added += 1;
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[(f64, f64)]) -> Vec<DomainPoint> {
        points.iter().map(|&(g, d)| DomainPoint::new(g, d)).collect()
    }

    #[test]
    fn test_bottom_start_within_eps() {
        let series = line(&[(0.0, 0.0), (100.0, -1500.0), (200.0, -1991.0), (300.0, -2000.0)]);
        assert_eq!(find_bottom_start_index(&series, -2000.0, 10.0), Some(2));
        assert_eq!(find_bottom_start_index(&series, -2000.0, 5.0), Some(3));
        assert_eq!(find_bottom_start_index(&series, -5000.0, 10.0), None);
    }

    #[test]
    fn test_slope_fits_window_before_bottom() {
        let series = line(&[
            (0.0, 500.0),
            (100.0, 0.0),
            (200.0, -500.0),
            (300.0, -1000.0),
            (400.0, -1500.0),
            (500.0, -2000.0),
            (600.0, -2000.0),
        ]);
        let slope = estimate_slope_before_bottom(&series, 5, 5);
        assert!((slope + 5.0).abs() < 1e-9);
        // window clipped to the start of the series
        let slope = estimate_slope_before_bottom(&series, 3, 5);
        assert!((slope + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_windows_are_flat() {
        let series = line(&[(0.0, 0.0), (100.0, -2000.0)]);
        assert_eq!(estimate_slope_before_bottom(&series, 1, 5), 0.0);
        let vertical = line(&[(100.0, 0.0), (100.0, -500.0), (100.0, -2000.0)]);
        assert_eq!(estimate_slope_before_bottom(&vertical, 2, 5), 0.0);
        assert_eq!(estimate_slope_before_bottom(&vertical, 10, 5), 0.0);
    }

    #[test]
    fn test_terminates_at_target() {
        let mut series = line(&[(0.0, 0.0), (300.0, 120.0)]);
        let cfg = ExtrapolationConfig {
            target_game: 500.0,
            ..ExtrapolationConfig::default()
        };
        let added = extrapolate(&mut series, &cfg).unwrap();
        assert_eq!(added, 4);
        let games: Vec<f64> = series[2..].iter().map(|p| p.game).collect();
        assert_eq!(games, vec![350.0, 400.0, 450.0, 500.0]);
        assert!(series[2..].iter().all(|p| p.extrapolated && p.diff == 120.0));
        assert_eq!(series[..2], line(&[(0.0, 0.0), (300.0, 120.0)])[..]);
    }

    #[test]
    fn test_overshoot_is_at_most_one_step() {
        let mut series = line(&[(0.0, 0.0), (310.0, 0.0)]);
        let cfg = ExtrapolationConfig {
            target_game: 500.0,
            ..ExtrapolationConfig::default()
        };
        extrapolate(&mut series, &cfg).unwrap();
        let last = series.last().unwrap().game;
        assert!(last >= 500.0 && last < 500.0 + 50.0);
    }

    #[test]
    fn test_floor_clamp_holds() {
        let mut series = line(&[
            (0.0, 0.0),
            (100.0, -500.0),
            (200.0, -1000.0),
            (300.0, -1500.0),
            (400.0, -2000.0),
            (500.0, -2000.0),
        ]);
        let cfg = ExtrapolationConfig {
            target_game: 2000.0,
            ..ExtrapolationConfig::default()
        };
        let added = extrapolate(&mut series, &cfg).unwrap();
        assert_eq!(added, 30);
        let synthetic: Vec<&DomainPoint> = series.iter().filter(|p| p.extrapolated).collect();
        // slope -5/game: -2250, -2500, -2750, -3000, then clamped
        assert_eq!(synthetic[0].diff, -2250.0);
        assert_eq!(synthetic[3].diff, -3000.0);
        assert!(synthetic.iter().all(|p| p.diff >= -3000.0));
        assert!(synthetic[3..].iter().all(|p| p.diff == -3000.0));
    }

    #[test]
    fn test_no_bottom_means_flat_continuation() {
        let mut series = line(&[(0.0, 0.0), (100.0, 300.0), (200.0, 600.0)]);
        let cfg = ExtrapolationConfig {
            target_game: 300.0,
            ..ExtrapolationConfig::default()
        };
        assert_eq!(extrapolate(&mut series, &cfg).unwrap(), 2);
        assert!(series[3..].iter().all(|p| p.diff == 600.0));
    }

    #[test]
    fn test_rejects_non_positive_step() {
        let mut series = line(&[(0.0, 0.0)]);
        let cfg = ExtrapolationConfig {
            step_game: 0.0,
            ..ExtrapolationConfig::default()
        };
        assert!(matches!(
            extrapolate(&mut series, &cfg),
            Err(PgError::InvalidParameter(_))
        ));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_rejects_unreachable_target() {
        let mut series = line(&[(0.0, 0.0), (100.0, -10.0)]);
        let cfg = ExtrapolationConfig {
            target_game: 1e12,
            ..ExtrapolationConfig::default()
        };
        assert!(matches!(
            extrapolate(&mut series, &cfg),
            Err(PgError::InvalidParameter(_))
        ));
        assert_eq!(series.len(), 2);

        let inf = ExtrapolationConfig {
            target_game: f64::INFINITY,
            ..ExtrapolationConfig::default()
        };
        assert!(inf.validate(0.0).is_err());
        // exactly at the cap is still fine
        let at_cap = ExtrapolationConfig {
            target_game: 50.0 * MAX_EXTRAPOLATED_POINTS as f64,
            ..ExtrapolationConfig::default()
        };
        assert!(at_cap.validate(0.0).is_ok());
    }

    #[test]
    fn test_empty_series_is_left_alone() {
        let mut series = Vec::new();
        assert_eq!(extrapolate(&mut series, &ExtrapolationConfig::default()).unwrap(), 0);
        assert!(series.is_empty());
    }
}
