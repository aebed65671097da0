//! Locate the `new PlayGraph(<id>, '<json>')` invocations in a record page and
//! decode their payloads into [`PixelGraph`]s.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::report::{Diagnostic, DiagnosticSink, RejectReason};
use crate::PixelGraph;

const REQUIRED_KEYS: [&str; 3] = ["GRAPH_RECT", "PLAY_INFO", "PLAY_LOG"];

fn play_graph_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"new PlayGraph\([^,]+,\s*'([^']+)'\)").expect("valid PlayGraph regex")
    })
}

fn actual_games_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<td class="cName">ゲーム数</td>\s*<td class="param">(\d+)G</td>"#)
            .expect("valid game count regex")
    })
}

/// Decode every embedded graph in document order. Bad payloads are reported and
/// skipped; they never abort the scan.
pub fn extract_play_graphs(html: &str, sink: &mut dyn DiagnosticSink) -> Vec<PixelGraph> {
    let mut graphs = Vec::new();
    for (occurrence, caps) in play_graph_regex().captures_iter(html).enumerate() {
        let Some(payload) = caps.get(1) else {
            continue;
        };
        match decode_payload(payload.as_str()) {
            Ok((graph, recovered)) => {
                if recovered {
                    sink.emit(Diagnostic::PayloadRecovered { occurrence });
                }
                graphs.push(graph);
            }
            Err(reason) => sink.emit(Diagnostic::PayloadRejected { occurrence, reason }),
        }
    }
    graphs
}

fn decode_payload(raw: &str) -> Result<(PixelGraph, bool), RejectReason> {
    let (value, recovered) = match serde_json::from_str::<JsonValue>(raw) {
        Ok(value) => (value, false),
        Err(_) => {
            let cleaned: String = raw.chars().filter(|c| *c != '\n' && *c != '\r').collect();
            let value = serde_json::from_str::<JsonValue>(&cleaned)
                .map_err(|e| RejectReason::MalformedJson(e.to_string()))?;
            (value, true)
        }
    };
    validate_payload(value).map(|graph| (graph, recovered))
}

fn validate_payload(value: JsonValue) -> Result<PixelGraph, RejectReason> {
    {
        let object = value
            .as_object()
            .ok_or_else(|| RejectReason::InvalidShape("payload is not an object".into()))?;
        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| object.get(**key).map_or(true, JsonValue::is_null))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RejectReason::MissingFields(missing));
        }
    }

    let graph: PixelGraph =
        serde_json::from_value(value).map_err(|e| RejectReason::InvalidShape(e.to_string()))?;
    // Also catches NaN.
    if !(graph.rect.w > 0.0 && graph.rect.h > 0.0) {
        return Err(RejectReason::DegenerateRect);
    }
    Ok(graph)
}

/// The graph with the most points; the first one wins a tie.
pub fn select_target_graph(graphs: &[PixelGraph]) -> Option<&PixelGraph> {
    graphs.iter().fold(None, |best, graph| match best {
        Some(current) if current.len() >= graph.len() => Some(current),
        _ => Some(graph),
    })
}

/// Game count printed in the page's session table (`ゲーム数 ... NNNNG`).
pub fn extract_actual_games(html: &str) -> Option<u64> {
    actual_games_regex()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
