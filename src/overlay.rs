//! Pure transcript logic behind the message popup: filtering the flat
//! message log down to a selection, clustering by time, and the cosmetic
//! command/response labelling. No DOM access in this module.

use unicode_segmentation::UnicodeSegmentation;
use crate::constants::{MESSAGE_GROUP_THRESHOLD_MS, MESSAGE_TRUNCATE_GRAPHEMES};
use crate::models::{AgentMessage, Connection};

/// Cosmetic label derived from message content. Display only; nothing
/// branches on this for control flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageLabel {
    Command,
    Response,
    Plain,
}

/// Messages touching either endpoint of a connection, ascending by
/// timestamp. The sort is stable, so equal timestamps keep insertion order.
/// Symmetric in the endpoint pair: (A,B) and (B,A) select the same set.
pub fn messages_for_connection(conn: &Connection, log: &[AgentMessage]) -> Vec<AgentMessage> {
    let mut selected: Vec<AgentMessage> = log
        .iter()
        .filter(|m| {
            m.from_agent == conn.from_box
                || m.from_agent == conn.to_box
                || m.to_agent == conn.from_box
                || m.to_agent == conn.to_box
        })
        .cloned()
        .collect();
    selected.sort_by(|a, b| {
        a.timestamp_ms
            .partial_cmp(&b.timestamp_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    selected
}

/// Messages sent by one box, ascending by timestamp.
pub fn messages_for_box(box_id: &str, log: &[AgentMessage]) -> Vec<AgentMessage> {
    let mut selected: Vec<AgentMessage> = log
        .iter()
        .filter(|m| m.from_agent == box_id)
        .cloned()
        .collect();
    selected.sort_by(|a, b| {
        a.timestamp_ms
            .partial_cmp(&b.timestamp_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    selected
}

/// Splits an already-sorted sequence into visual clusters. A new cluster
/// starts whenever the gap to the previous message exceeds the threshold.
pub fn group_messages(messages: &[AgentMessage], threshold_ms: f64) -> Vec<Vec<AgentMessage>> {
    let mut groups: Vec<Vec<AgentMessage>> = Vec::new();
    for msg in messages {
        match groups.last_mut() {
            Some(group) => {
                let last_ts = group.last().map(|m| m.timestamp_ms).unwrap_or(0.0);
                if msg.timestamp_ms - last_ts <= threshold_ms {
                    group.push(msg.clone());
                } else {
                    groups.push(vec![msg.clone()]);
                }
            }
            None => groups.push(vec![msg.clone()]),
        }
    }
    groups
}

pub fn group_messages_default(messages: &[AgentMessage]) -> Vec<Vec<AgentMessage>> {
    group_messages(messages, MESSAGE_GROUP_THRESHOLD_MS)
}

/// Substring heuristics: response markers win over command verbs so that
/// "Generated code" is not mislabelled by its "generate" stem.
pub fn classify_message(content: &str) -> MessageLabel {
    if content.contains("```") || content.contains("Generated") || content.contains("Complete") {
        return MessageLabel::Response;
    }
    let lower = content.to_lowercase();
    if lower.contains("generate") || lower.contains("create") || lower.contains("run") {
        return MessageLabel::Command;
    }
    MessageLabel::Plain
}

/// Grapheme-aware truncation so multi-byte content never splits mid-glyph.
pub fn truncate_content(content: &str, budget: usize) -> String {
    let graphemes: Vec<&str> = content.graphemes(true).collect();
    if graphemes.len() <= budget {
        content.to_string()
    } else {
        let mut truncated: String = graphemes[..budget].concat();
        truncated.push('…');
        truncated
    }
}

pub fn truncate_content_default(content: &str) -> String {
    truncate_content(content, MESSAGE_TRUNCATE_GRAPHEMES)
}

/// "HH:MM:SS" for the cluster header; falls back to the raw value when the
/// timestamp is out of chrono's range.
pub fn format_timestamp(timestamp_ms: f64) -> String {
    match chrono::DateTime::from_timestamp_millis(timestamp_ms as i64) {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => format!("{}", timestamp_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;

    fn msg(from: &str, to: &str, content: &str, ts: f64) -> AgentMessage {
        AgentMessage {
            id: format!("m-{}-{}", from, ts),
            from_agent: from.to_string(),
            to_agent: to.to_string(),
            content: content.to_string(),
            timestamp_ms: ts,
        }
    }

    fn conn(from: &str, to: &str) -> Connection {
        Connection {
            id: "c1".to_string(),
            from_box: from.to_string(),
            from_side: Side::Right,
            to_box: to.to_string(),
            to_side: Side::Left,
            pinned: false,
        }
    }

    #[test]
    fn test_connection_filter_membership_and_order() {
        let log = vec![
            msg("coder", "tester", "code ready", 300.0),
            msg("coordinator", "coder", "generate code", 100.0),
            msg("tester", "runner", "tests ready", 200.0),
            msg("other", "elsewhere", "noise", 50.0),
        ];
        let selected = messages_for_connection(&conn("coordinator", "coder"), &log);
        let contents: Vec<&str> = selected.iter().map(|m| m.content.as_str()).collect();
        // "tests ready" neither starts nor ends at an endpoint of this edge
        assert_eq!(contents, vec!["generate code", "code ready"]);
    }

    #[test]
    fn test_connection_filter_is_symmetric() {
        let log = vec![
            msg("a", "b", "one", 1.0),
            msg("b", "a", "two", 2.0),
            msg("a", "c", "three", 3.0),
            msg("d", "b", "four", 4.0),
        ];
        let forward = messages_for_connection(&conn("a", "b"), &log);
        let reverse = messages_for_connection(&conn("b", "a"), &log);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_stable_sort_keeps_insertion_order_on_ties() {
        let log = vec![
            msg("a", "b", "first", 100.0),
            msg("a", "b", "second", 100.0),
            msg("a", "b", "third", 100.0),
        ];
        let selected = messages_for_connection(&conn("a", "b"), &log);
        let contents: Vec<&str> = selected.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_box_filter_matches_sender_only() {
        let log = vec![
            msg("a", "b", "sent by a", 1.0),
            msg("b", "a", "sent to a", 2.0),
        ];
        let selected = messages_for_box("a", &log);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].content, "sent by a");
    }

    #[test]
    fn test_grouping_splits_on_threshold() {
        let log = vec![
            msg("a", "b", "m0", 0.0),
            msg("a", "b", "m1", 1000.0),
            msg("a", "b", "m2", 7000.0),
            msg("a", "b", "m3", 7500.0),
        ];
        let groups = group_messages(&log, 5000.0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 2);
        assert_eq!(groups[0][1].content, "m1");
        assert_eq!(groups[1][0].content, "m2");
    }

    #[test]
    fn test_grouping_empty_input() {
        assert!(group_messages(&[], 5000.0).is_empty());
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify_message("Please generate a parser"), MessageLabel::Command);
        assert_eq!(classify_message("run the test suite"), MessageLabel::Command);
        assert_eq!(
            classify_message("Generated code:\n```python\npass\n```"),
            MessageLabel::Response
        );
        assert_eq!(classify_message("Workflow Complete"), MessageLabel::Response);
        assert_eq!(classify_message("hello there"), MessageLabel::Plain);
    }

    #[test]
    fn test_truncation_on_grapheme_boundary() {
        let short = "short message";
        assert_eq!(truncate_content(short, 20), short);

        let long = "ab🇩🇪cdef";
        let truncated = truncate_content(long, 3);
        assert_eq!(truncated, "ab🇩🇪…");
    }
}
