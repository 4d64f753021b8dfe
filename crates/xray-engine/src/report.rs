//! Trace output formats: text lines, JSON, and an HTML flow-diagram report.
//!
//! The text format is one line per event, indented by call depth. The JSON
//! format is the serde representation of the event sequence and round-trips.
//! The report format does not draw anything itself: it writes a diagram
//! description (mermaid flowchart syntax) into a minimal HTML page that pulls
//! the renderer from a CDN when opened.

use std::io::Write;
use std::path::Path;

use crate::event::{BranchKind, TraceEvent};

/// One line per event, indented two spaces per call depth.
pub fn format_events(events: &[TraceEvent]) -> String {
    let mut out = String::new();
    let mut depth: usize = 0;
    for event in events {
        if matches!(event, TraceEvent::FunctionExit { .. }) {
            depth = depth.saturating_sub(1);
        }
        out.push_str(&format!(
            "[{:>10.6}] {}{}\n",
            event.timestamp(),
            "  ".repeat(depth),
            describe(event)
        ));
        if matches!(event, TraceEvent::FunctionEntry { .. }) {
            depth += 1;
        }
    }
    out
}

/// Pretty-printed JSON array of event objects.
pub fn dump_json(events: &[TraceEvent]) -> String {
    serde_json::to_string_pretty(events).unwrap_or_else(|_| "[]".to_string())
}

/// Writes a self-contained HTML page describing the trace as a flowchart.
pub fn write_report(events: &[TraceEvent], path: &Path) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(render_report(events).as_bytes())
}

/// Timestamp-free description of one event, shared by the text format and
/// the diagram node labels.
fn describe(event: &TraceEvent) -> String {
    match event {
        TraceEvent::FunctionEntry { function, args, .. } => {
            let rendered: Vec<String> =
                args.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("CALL {}({})", function, rendered.join(", "))
        }
        TraceEvent::FunctionExit {
            function,
            return_value,
            ..
        } => match return_value {
            Some(value) => format!("RET {function} -> {value}"),
            None => format!("RET {function}"),
        },
        TraceEvent::Branch {
            kind,
            condition,
            variables,
            result,
            ..
        } => {
            let keyword = match kind {
                BranchKind::Conditional => "if",
                BranchKind::LoopCondition => "while",
                BranchKind::ExceptGuard => "except",
            };
            let rendered: Vec<String> =
                variables.iter().map(|(k, v)| format!("{k}={v}")).collect();
            if rendered.is_empty() {
                format!("BR {keyword} ({condition}) -> {result}")
            } else {
                format!(
                    "BR {keyword} ({condition}) [{}] -> {result}",
                    rendered.join(", ")
                )
            }
        }
        TraceEvent::Await {
            expression, result, ..
        } => format!("AWAIT {expression} -> {result}"),
        TraceEvent::Yield { value, .. } => format!("YIELD {value}"),
        TraceEvent::YieldResume { sent, .. } => format!("RESUME {sent}"),
    }
}

fn render_report(events: &[TraceEvent]) -> String {
    let mut diagram = String::from("flowchart TD\n");
    for (i, event) in events.iter().enumerate() {
        let label = escape_label(&describe(event));
        let node = match event {
            // Decision points render as diamonds, suspensions as stadiums.
            TraceEvent::Branch { .. } => format!("  e{i}{{\"{label}\"}}\n"),
            TraceEvent::Await { .. }
            | TraceEvent::Yield { .. }
            | TraceEvent::YieldResume { .. } => format!("  e{i}([\"{label}\"])\n"),
            _ => format!("  e{i}[\"{label}\"]\n"),
        };
        diagram.push_str(&node);
        if i > 0 {
            diagram.push_str(&format!("  e{} --> e{}\n", i - 1, i));
        }
    }
    if events.is_empty() {
        diagram.push_str("  empty[\"no events recorded\"]\n");
    }

    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Trace report</title>\n</head>\n<body>\n\
         <pre class=\"mermaid\">\n{diagram}</pre>\n\
         <script type=\"module\">\n\
         import mermaid from \"https://cdn.jsdelivr.net/npm/mermaid@11/dist/mermaid.esm.min.mjs\";\n\
         mermaid.initialize({{ startOnLoad: true }});\n\
         </script>\n</body>\n</html>\n"
    )
}

/// Mermaid labels are double-quoted; quotes inside become entity escapes.
fn escape_label(text: &str) -> String {
    text.replace('"', "#quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_events() -> Vec<TraceEvent> {
        vec![
            TraceEvent::FunctionEntry {
                function: "app.count".into(),
                args: vec![("limit".into(), "2".into())],
                timestamp: 0.000001,
            },
            TraceEvent::Branch {
                function: "app.count".into(),
                kind: BranchKind::LoopCondition,
                condition: "i < limit".into(),
                variables: vec![("i".into(), "0".into()), ("limit".into(), "2".into())],
                result: true,
                timestamp: 0.000002,
            },
            TraceEvent::FunctionExit {
                function: "app.count".into(),
                return_value: Some("2".into()),
                timestamp: 0.000003,
            },
        ]
    }

    #[test]
    fn text_format_indents_by_call_depth() {
        let text = format_events(&sample_events());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("CALL app.count(limit=2)"));
        assert!(lines[1].contains("  BR while (i < limit) [i=0, limit=2] -> true"));
        assert!(lines[2].contains("RET app.count -> 2"));
        // The branch line is indented one level deeper than the call.
        let call_pad = lines[0].find("CALL").unwrap();
        let branch_pad = lines[1].find("BR").unwrap();
        assert_eq!(branch_pad, call_pad + 2);
    }

    #[test]
    fn json_dump_roundtrips() {
        let events = sample_events();
        let json = dump_json(&events);
        let back: Vec<TraceEvent> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, events);
    }

    #[test]
    fn report_file_contains_diagram_and_renderer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.html");
        write_report(&sample_events(), &path).unwrap();
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("flowchart TD"));
        assert!(html.contains("mermaid"));
        assert!(html.contains("e0 --> e1"));
        // Branch nodes are decision diamonds.
        assert!(html.contains("e1{\""));
    }

    #[test]
    fn quotes_in_labels_are_escaped() {
        let events = vec![TraceEvent::Yield {
            function: "app.g".into(),
            value: "\"x\"".into(),
            timestamp: 0.0,
        }];
        let html = render_report(&events);
        assert!(html.contains("#quot;x#quot;"));
        assert!(!html.contains("[\"YIELD \"x\"\"]"));
    }

    #[test]
    fn empty_trace_still_renders() {
        let html = render_report(&[]);
        assert!(html.contains("no events recorded"));
    }
}
