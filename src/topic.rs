//! Question categories and the per-room topic selection
//!
//! A topic decides which field of a [`QuizItem`] is asked about. Each room
//! tracks the selected topic and the topics still available; a topic whose
//! timer ran out is removed for the rest of the room's lifetime.

use std::{fmt::Display, str::FromStr};

use enum_map::Enum;
use serde::{Deserialize, Serialize};

use crate::corpus::QuizItem;

/// The categories of questions a room can ask
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Enum, Serialize, Deserialize)]
pub enum Topic {
    /// Ask about the title of a part
    ByPart,
    /// Ask about the gloss (explanation) of an item
    ByGloss,
    /// Ask about the couplet itself
    ByCouplet,
    /// Ask about the first word of an item
    ByFirstWord,
    /// Ask about the last word of an item
    ByLastWord,
}

impl Topic {
    /// Every topic in presentation order
    pub const ALL: [Topic; 5] = [
        Topic::ByPart,
        Topic::ByGloss,
        Topic::ByCouplet,
        Topic::ByFirstWord,
        Topic::ByLastWord,
    ];

    /// Returns the question key this topic derives from an item
    ///
    /// The key is the literal text that identifies a question for scoring.
    /// Items without words have no key for the word topics.
    pub fn key_of(self, item: &QuizItem) -> Option<String> {
        match self {
            Self::ByPart => Some(item.part_title.clone()),
            Self::ByGloss => Some(item.gloss.clone()),
            Self::ByCouplet => Some(item.couplet_key()),
            Self::ByFirstWord => item.words.first().cloned(),
            Self::ByLastWord => item.words.last().cloned(),
        }
    }

    /// The wire name of the topic
    pub fn name(self) -> &'static str {
        match self {
            Self::ByPart => "ByPart",
            Self::ByGloss => "ByGloss",
            Self::ByCouplet => "ByCouplet",
            Self::ByFirstWord => "ByFirstWord",
            Self::ByLastWord => "ByLastWord",
        }
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a topic name is not recognized
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown topic {0:?}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.name() == s)
            .ok_or_else(|| UnknownTopic(s.to_owned()))
    }
}

/// The selected topic of a room and the topics still open for play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicState {
    /// The topic currently being asked
    selected: Topic,
    /// Topics whose timer has not run out, in presentation order
    available_topics: Vec<Topic>,
}

impl Default for TopicState {
    fn default() -> Self {
        Self {
            selected: Topic::ByPart,
            available_topics: Topic::ALL.to_vec(),
        }
    }
}

impl TopicState {
    /// The topic currently being asked
    pub fn selected(&self) -> Topic {
        self.selected
    }

    /// Topics that are still available
    pub fn available(&self) -> &[Topic] {
        &self.available_topics
    }

    /// Whether a topic is still available
    pub fn is_available(&self, topic: Topic) -> bool {
        self.available_topics.contains(&topic)
    }

    /// Switches the selected topic
    ///
    /// Selecting an unavailable topic is allowed; it does not make the topic
    /// available again.
    pub fn select(&mut self, topic: Topic) {
        self.selected = topic;
    }

    /// Permanently removes a topic from the available set
    ///
    /// # Returns
    ///
    /// `true` if the topic was still available
    pub fn remove(&mut self, topic: Topic) -> bool {
        let before = self.available_topics.len();
        self.available_topics.retain(|t| *t != topic);
        before != self.available_topics.len()
    }
}
