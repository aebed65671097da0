use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use pg_curve::{CumulativePoint, DailySummary, DomainPoint};

fn create_writer(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(csv::Writer::from_writer(file))
}

pub fn write_day_csv(series: &[DomainPoint], path: &Path) -> Result<()> {
    let mut writer = create_writer(path)?;
    write_day_rows(series, &mut writer)
}

pub fn write_summary_csv(summaries: &[DailySummary], path: &Path) -> Result<()> {
    let mut writer = create_writer(path)?;
    write_summary_rows(summaries, &mut writer)
}

pub fn write_cumulative_csv(points: &[CumulativePoint], path: &Path) -> Result<()> {
    let mut writer = create_writer(path)?;
    write_cumulative_rows(points, &mut writer)
}

pub fn write_day_rows<W: Write>(series: &[DomainPoint], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(["game", "diff", "extrapolated"])?;
    for point in series {
        writer.write_record([
            format!("{:.1}", point.game),
            format!("{:.1}", point.diff),
            point.extrapolated.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary_rows<W: Write>(
    summaries: &[DailySummary],
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    writer.write_record([
        "day",
        "last_diff",
        "actual_games",
        "censored_right",
        "censored_bottom",
        "special_rule_applied",
        "extrapolated_points_count",
        "rescaled",
    ])?;
    for summary in summaries {
        writer.write_record([
            summary.day.to_string(),
            format!("{:.1}", summary.last_diff),
            summary
                .actual_games
                .map(|g| g.to_string())
                .unwrap_or_default(),
            summary.censored_right.to_string(),
            summary.censored_bottom.to_string(),
            summary.special_rule_applied.to_string(),
            summary.extrapolated_points_count.to_string(),
            summary.rescaled.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_cumulative_rows<W: Write>(
    points: &[CumulativePoint],
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    writer.write_record(["cum_game", "cum_diff", "day", "extrapolated"])?;
    for point in points {
        writer.write_record([
            format!("{:.1}", point.cum_game),
            format!("{:.1}", point.cum_diff),
            point.day.to_string(),
            point.extrapolated.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_curve::DayKey;

    fn render<F>(write: F) -> String
    where
        F: FnOnce(&mut csv::Writer<Vec<u8>>) -> Result<()>,
    {
        let mut writer = csv::Writer::from_writer(Vec::new());
        write(&mut writer).unwrap();
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_day_rows() {
        let series = vec![DomainPoint::new(0.0, 0.0), DomainPoint::synthetic(8050.0, -2012.5)];
        let text = render(|w| write_day_rows(&series, w));
        assert_eq!(text, "game,diff,extrapolated\n0.0,0.0,false\n8050.0,-2012.5,true\n");
    }

    #[test]
    fn test_summary_rows_leave_unknown_games_blank() {
        let day = DayKey::parse("2024-08-31").unwrap();
        let summaries = vec![
            DailySummary {
                day,
                last_diff: -2525.0,
                actual_games: Some(10073),
                censored_right: true,
                censored_bottom: true,
                special_rule_applied: true,
                extrapolated_points_count: 42,
                rescaled: false,
            },
            DailySummary {
                day: DayKey::parse("2024-09-01").unwrap(),
                last_diff: 120.0,
                actual_games: None,
                censored_right: false,
                censored_bottom: false,
                special_rule_applied: false,
                extrapolated_points_count: 0,
                rescaled: false,
            },
        ];
        let text = render(|w| write_summary_rows(&summaries, w));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2024-08-31,-2525.0,10073,true,true,true,42,false");
        assert_eq!(lines[2], "2024-09-01,120.0,,false,false,false,0,false");
    }

    #[test]
    fn test_cumulative_rows() {
        let points = vec![CumulativePoint {
            cum_game: 180.0,
            cum_diff: 20.0,
            day: DayKey::parse("2024-08-02").unwrap(),
            extrapolated: false,
        }];
        let text = render(|w| write_cumulative_rows(&points, w));
        assert_eq!(text, "cum_game,cum_diff,day,extrapolated\n180.0,20.0,2024-08-02,false\n");
    }
}
