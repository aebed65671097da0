use crate::{DomainPoint, PixelGraph};

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Invert the widget's linear pixel mapping. Pixel y grows downwards while the
/// balance grows upwards, so the balance is measured down from `max`.
pub fn to_series(graph: &PixelGraph) -> Vec<DomainPoint> {
    let rect = &graph.rect;
    let axis = &graph.axis;
    let span = axis.max_balance - axis.min_balance;

    graph
        .points
        .iter()
        .map(|&(px, py)| {
            let game = (px - rect.x) / rect.w * axis.total_games;
            let diff = axis.max_balance - (py - rect.y) / rect.h * span;
            DomainPoint::new(round_tenth(game), round_tenth(diff))
        })
        .collect()
}

/// Scale game values so the last point equals `actual_games`. Returns whether
/// anything changed. A count of zero is treated as unknown.
pub fn rescale_to_games(series: &mut [DomainPoint], actual_games: u64) -> bool {
    if actual_games == 0 {
        return false;
    }
    let Some(last) = series.last() else {
        return false;
    };
    if !(last.game > 0.0) {
        return false;
    }
    let target = actual_games as f64;
    if (last.game - target).abs() < f64::EPSILON {
        return false;
    }
    let factor = target / last.game;
    for point in series.iter_mut() {
        point.game = round_tenth(point.game * factor);
    }
    true
}
