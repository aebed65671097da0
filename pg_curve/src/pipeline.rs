//! Batch driver: isolate per-day failures, then stitch the survivors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cumulative::{build_cumulative, Cumulative};
use crate::day::{process_day, DayOutput};
use crate::report::{Diagnostic, DiagnosticSink};
use crate::{DailySummary, DayKey, DomainPoint, Params, PgError};

/// One record page handed in by the caller.
#[derive(Clone, Debug)]
pub struct DayDocument {
    pub day: DayKey,
    pub html: String,
    pub actual_games: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    pub days: BTreeMap<DayKey, Vec<DomainPoint>>,
    /// Chronological.
    pub summaries: Vec<DailySummary>,
    pub cumulative: Cumulative,
    pub skipped: Vec<DayKey>,
}

impl BatchOutput {
    pub fn special_days(&self) -> impl Iterator<Item = &DailySummary> {
        self.summaries.iter().filter(|s| s.special_rule_applied)
    }

    pub fn censored_days(&self) -> impl Iterator<Item = &DailySummary> {
        self.summaries
            .iter()
            .filter(|s| s.censored_right || s.censored_bottom)
    }
}

/// Process every document sequentially and stitch the result.
pub fn process_batch(
    documents: &[DayDocument],
    params: &Params,
    sink: &mut dyn DiagnosticSink,
) -> Result<BatchOutput, PgError> {
    let mut results = Vec::with_capacity(documents.len());
    for doc in documents {
        let result = process_day(doc.day, &doc.html, doc.actual_games, params, sink);
        results.push((doc.day, result));
    }
    collect_batch(results, sink)
}

/// Fold per-day results (in input order) into a batch. Failed days are
/// reported and skipped. For repeated days the later successful page replaces
/// an earlier one, while a later failure leaves an earlier success in place.
/// Only an integrity failure of the stitched curve is returned as an error.
pub fn collect_batch<I>(results: I, sink: &mut dyn DiagnosticSink) -> Result<BatchOutput, PgError>
where
    I: IntoIterator<Item = (DayKey, Result<DayOutput, PgError>)>,
{
    let mut kept: BTreeMap<DayKey, DayOutput> = BTreeMap::new();
    // Failures not (yet) covered by a successful page for the same day.
    let mut failed: BTreeMap<DayKey, String> = BTreeMap::new();

    for (day, result) in results {
        match result {
            Ok(output) => {
                let replaced = kept.insert(day, output).is_some();
                let recovered = failed.remove(&day).is_some();
                if replaced || recovered {
                    sink.emit(Diagnostic::DuplicateDay { day });
                }
            }
            Err(err) if kept.contains_key(&day) => {
                sink.emit(Diagnostic::LaterPageFailed {
                    day,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                failed.insert(day, err.to_string());
            }
        }
    }

    let mut skipped = Vec::with_capacity(failed.len());
    for (day, reason) in failed {
        sink.emit(Diagnostic::DaySkipped { day, reason });
        skipped.push(day);
    }

    let mut days = BTreeMap::new();
    let mut summaries = Vec::with_capacity(kept.len());
    for (day, output) in kept {
        summaries.push(output.summary);
        days.insert(day, output.series);
    }
    let cumulative = build_cumulative(&days)?;

    Ok(BatchOutput {
        days,
        summaries,
        cumulative,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::tests::page;
    use crate::report::CollectingSink;
    use crate::SPECIAL_DAY;

    fn doc(day: &str, html: String) -> DayDocument {
        DayDocument {
            day: DayKey::parse(day).unwrap(),
            html,
            actual_games: None,
        }
    }

    #[test]
    fn test_bad_day_does_not_abort_batch() {
        let docs = vec![
            doc("2024-08-02", page(&[(0.0, 0.0), (80.0, -30.0)], None)),
            doc("2024-08-01", page(&[(0.0, 0.0), (100.0, 50.0)], None)),
            doc("2024-08-03", "<html>maintenance</html>".to_string()),
        ];
        let mut sink = CollectingSink::default();
        let out = process_batch(&docs, &Params::default(), &mut sink).unwrap();

        assert_eq!(out.summaries.len(), 2);
        assert_eq!(out.summaries[0].day.to_string(), "2024-08-01");
        assert_eq!(out.skipped, vec![DayKey::parse("2024-08-03").unwrap()]);
        assert!(sink.events.iter().any(|e| matches!(e, Diagnostic::DaySkipped { .. })));

        let last = out.cumulative.points.last().unwrap();
        assert!((last.cum_game - 180.0).abs() <= 0.2);
        assert!((last.cum_diff - 20.0).abs() <= 0.2);
        assert_eq!(out.cumulative.points[0].cum_diff, 0.0);
    }

    fn good_day(day: DayKey) -> Result<DayOutput, PgError> {
        process_day(
            day,
            &page(&[(0.0, 0.0), (400.0, 100.0)], None),
            None,
            &Params::default(),
            &mut CollectingSink::default(),
        )
    }

    #[test]
    fn test_duplicate_day_keeps_later_page() {
        let day = DayKey::parse("2024-02-01").unwrap();
        let results = vec![(day, Err(PgError::NoTargetGraph)), (day, good_day(day))];
        let mut sink = CollectingSink::default();
        let out = collect_batch(results, &mut sink).unwrap();
        assert_eq!(out.summaries.len(), 1);
        assert!(out.skipped.is_empty());
        assert_eq!(sink.events, vec![Diagnostic::DuplicateDay { day }]);
    }

    #[test]
    fn test_failed_later_page_keeps_earlier_one() {
        let day = DayKey::parse("2024-02-01").unwrap();
        let results = vec![(day, good_day(day)), (day, Err(PgError::NoTargetGraph))];
        let mut sink = CollectingSink::default();
        let out = collect_batch(results, &mut sink).unwrap();
        assert_eq!(out.summaries.len(), 1);
        assert!(out.skipped.is_empty());
        assert_eq!(sink.events.len(), 1);
        assert!(matches!(
            &sink.events[0],
            Diagnostic::LaterPageFailed { day: d, .. } if *d == day
        ));
        assert!(!sink
            .events
            .iter()
            .any(|e| matches!(e, Diagnostic::DaySkipped { .. })));
    }

    #[test]
    fn test_special_day_points_flow_into_cumulative() {
        let docs = vec![
            doc(
                SPECIAL_DAY,
                page(&[(0.0, 0.0), (4000.0, -1000.0), (7000.0, -2000.0), (8000.0, -2000.0)], Some(10073)),
            ),
            doc("2024-09-01", page(&[(0.0, 0.0), (500.0, 200.0)], None)),
        ];
        let out = process_batch(&docs, &Params::default(), &mut CollectingSink::default()).unwrap();
        assert_eq!(out.special_days().count(), 1);
        assert_eq!(out.censored_days().count(), 1);

        let points = &out.cumulative.points;
        let first_synthetic = points.iter().position(|p| p.extrapolated).unwrap();
        let last_synthetic = points.iter().rposition(|p| p.extrapolated).unwrap();
        assert!(points[first_synthetic..=last_synthetic].iter().all(|p| p.extrapolated));
        assert!(points[last_synthetic + 1..]
            .iter()
            .all(|p| !p.extrapolated && p.day.to_string() == "2024-09-01"));
        assert!(points.windows(2).all(|w| w[1].cum_game > w[0].cum_game));
    }
}
