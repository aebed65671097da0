//! Detect when the fixed-size widget clipped a session at its axis limits.

use crate::{CensorFlags, PixelGraph};

/// Largest game axis the widget draws; longer sessions are cut at the right edge.
pub const RIGHT_CENSOR_TOTAL_GAMES: f64 = 8000.0;
/// Lowest balance the widget draws; deeper losses flatten out along the bottom.
pub const BOTTOM_CENSOR_MIN_BALANCE: f64 = -2000.0;
pub const BOTTOM_MARGIN_PX: f64 = 5.0;
pub const BOTTOM_RUN_LEN: usize = 3;

pub fn detect_censor_flags(graph: &PixelGraph, actual_games: Option<u64>) -> CensorFlags {
    CensorFlags {
        censored_right: is_censored_right(graph, actual_games),
        censored_bottom: is_censored_bottom(graph),
    }
}

fn is_censored_right(graph: &PixelGraph, actual_games: Option<u64>) -> bool {
    graph.axis.total_games == RIGHT_CENSOR_TOTAL_GAMES
        && actual_games.is_some_and(|games| games as f64 > RIGHT_CENSOR_TOTAL_GAMES)
}

fn is_censored_bottom(graph: &PixelGraph) -> bool {
    if graph.axis.min_balance != BOTTOM_CENSOR_MIN_BALANCE {
        return false;
    }
    let threshold = graph.rect.bottom() - BOTTOM_MARGIN_PX;
    let mut run = 0usize;
    for &(_, py) in &graph.points {
        if py >= threshold {
            run += 1;
            if run >= BOTTOM_RUN_LEN {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AxisRange, GraphRect};

    fn graph(total: f64, min: f64, ys: &[f64]) -> PixelGraph {
        PixelGraph {
            rect: GraphRect {
                x: 119.0,
                y: 68.0,
                w: 893.0,
                h: 646.0,
            },
            axis: AxisRange {
                total_games: total,
                min_balance: min,
                max_balance: 4000.0,
            },
            points: ys
                .iter()
                .enumerate()
                .map(|(i, &py)| (119.0 + i as f64 * 10.0, py))
                .collect(),
        }
    }

    #[test]
    fn test_right_censor_thresholds() {
        let g = graph(8000.0, -2000.0, &[391.0, 400.0]);
        assert!(detect_censor_flags(&g, Some(8500)).censored_right);
        assert!(!detect_censor_flags(&g, Some(7000)).censored_right);
        assert!(!detect_censor_flags(&g, Some(8000)).censored_right);
        assert!(!detect_censor_flags(&g, None).censored_right);

        let wider = graph(10000.0, -2000.0, &[391.0]);
        assert!(!detect_censor_flags(&wider, Some(8500)).censored_right);
    }

    #[test]
    fn test_bottom_censor_needs_three_in_a_row() {
        // bottom edge at 714, threshold 709
        let three = graph(8000.0, -2000.0, &[500.0, 710.0, 714.0, 713.0, 600.0]);
        assert!(detect_censor_flags(&three, None).censored_bottom);

        let two = graph(8000.0, -2000.0, &[500.0, 710.0, 714.0, 600.0, 712.0, 709.5]);
        assert!(!detect_censor_flags(&two, None).censored_bottom);
    }

    #[test]
    fn test_bottom_censor_requires_floor_axis() {
        let g = graph(8000.0, -3000.0, &[714.0, 714.0, 714.0, 714.0]);
        assert_eq!(detect_censor_flags(&g, Some(9000)), CensorFlags {
            censored_right: true,
            censored_bottom: false,
        });
    }
}
