//! Scoring for a room
//!
//! The score of a topic is the number of distinct questions marked as
//! answered right. Marking the same question twice never double-counts,
//! and marking it wrong removes it again.

use std::collections::HashSet;

use enum_map::EnumMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::topic::Topic;

/// The set of answered question keys for each topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreState {
    answered: EnumMap<Topic, HashSet<String>>,
}

/// Score counts sent to admins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreMessage {
    /// Number of right answers for each topic
    pub score: EnumMap<Topic, usize>,
}

impl ScoreState {
    /// Records a right answer to `key` under `topic`
    ///
    /// # Returns
    ///
    /// `true` if the question was not already counted
    pub fn mark_right(&mut self, topic: Topic, key: &str) -> bool {
        self.answered[topic].insert(key.to_owned())
    }

    /// Records a wrong answer to `key` under `topic`, removing any earlier
    /// right answer
    ///
    /// # Returns
    ///
    /// `true` if a right answer was removed
    pub fn mark_wrong(&mut self, topic: Topic, key: &str) -> bool {
        self.answered[topic].remove(key)
    }

    /// Whether `key` is counted as answered under `topic`
    pub fn is_answered(&self, topic: Topic, key: &str) -> bool {
        self.answered[topic].contains(key)
    }

    /// Score of one topic
    pub fn count(&self, topic: Topic) -> usize {
        self.answered[topic].len()
    }

    /// Score across all topics
    pub fn total(&self) -> usize {
        self.answered.values().map(HashSet::len).sum()
    }

    /// Answered keys of a topic in sorted order
    pub fn answered(&self, topic: Topic) -> Vec<String> {
        self.answered[topic].iter().sorted().cloned().collect_vec()
    }

    /// Per-topic counts for transmission
    pub fn message(&self) -> ScoreMessage {
        ScoreMessage {
            score: EnumMap::from_fn(|topic| self.count(topic)),
        }
    }
}
