//! End-of-room reporting
//!
//! When a room is destroyed its final score is handed to every registered
//! [`Reporter`]. Reporters run on a blocking task and never hold up the
//! teardown of the room; email or spreadsheet exporters plug in by
//! implementing the trait.

use enum_map::EnumMap;
use serde::Serialize;

use crate::{protocol::RoomInfo, topic::Topic};

/// Read-only snapshot of a room's final state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// The room
    pub room: RoomInfo,
    /// Number of right answers for each topic
    pub score: EnumMap<Topic, usize>,
    /// Number of right answers across all topics
    pub total: usize,
    /// Keys answered right for each topic, sorted
    pub answered: EnumMap<Topic, Vec<String>>,
    /// When the room was torn down
    pub finished_at: web_time::SystemTime,
}

/// A consumer of room summaries
pub trait Reporter: Send + Sync {
    /// Handles the summary of a destroyed room
    ///
    /// Runs on a blocking thread; may perform I/O.
    fn report(&self, summary: &RoomSummary);
}

/// Writes summaries to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, summary: &RoomSummary) {
        tracing::info!(
            room = %summary.room.name,
            school = summary.room.school.as_deref().unwrap_or_default(),
            group = summary.room.group.as_deref().unwrap_or_default(),
            total = summary.total,
            score = ?summary.score,
            "room finished"
        );
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Collects every summary it receives
    #[derive(Debug, Clone, Default)]
    pub(crate) struct CollectingReporter(pub(crate) Arc<Mutex<Vec<RoomSummary>>>);

    impl Reporter for CollectingReporter {
        fn report(&self, summary: &RoomSummary) {
            self.0.lock().unwrap().push(summary.clone());
        }
    }

    fn summary() -> RoomSummary {
        let mut answered: EnumMap<Topic, Vec<String>> = EnumMap::default();
        answered[Topic::ByGloss] = vec!["gloss of 1".to_owned()];
        RoomSummary {
            room: RoomInfo {
                name: "R1".to_owned(),
                school: Some("Katy".to_owned()),
                group: None,
            },
            score: EnumMap::from_fn(|topic| usize::from(topic == Topic::ByGloss)),
            total: 1,
            answered,
            finished_at: web_time::SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_summary_wire_format() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["room"]["name"], "R1");
        assert_eq!(json["score"]["ByGloss"], 1);
        assert_eq!(json["answered"]["ByGloss"][0], "gloss of 1");
        assert!(json.get("finishedAt").is_some());
    }

    #[test]
    fn test_reporters_receive_summary() {
        let collector = CollectingReporter::default();
        let reporters: Vec<Box<dyn Reporter>> =
            vec![Box::new(LogReporter), Box::new(collector.clone())];
        let summary = summary();
        for reporter in &reporters {
            reporter.report(&summary);
        }
        assert_eq!(collector.0.lock().unwrap().as_slice(), &[summary]);
    }
}
