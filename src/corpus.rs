//! The fixed question corpus
//!
//! Quiz items are loaded once at startup and never mutated. Every topic
//! derives an index of distinct question keys from the items; the indexes
//! are computed lazily the first time a room asks for them and cached for
//! the rest of the process.

use std::path::PathBuf;

use enum_map::EnumMap;
use itertools::Itertools;
use once_cell_serde::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topic::Topic;

/// A single immutable quiz item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizItem {
    /// Number of the part this item belongs to
    pub part_number: u32,
    /// Title of the part
    pub part_title: String,
    /// Description of the part
    pub part_description: String,
    /// Number of the item within the corpus
    pub item_number: u32,
    /// First line of the couplet
    pub line_one: String,
    /// Second line of the couplet
    pub line_two: String,
    /// Explanation of the couplet
    pub gloss: String,
    /// Words of the couplet in order
    pub words: Vec<String>,
}

impl QuizItem {
    /// The scoring key of the couplet: both lines concatenated
    pub fn couplet_key(&self) -> String {
        format!("{}{}", self.line_one, self.line_two)
    }
}

/// A question as shown to a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// The literal text used as the scoring key
    pub key: String,
    /// The main question text
    pub text: String,
    /// A second line of question text (couplets only)
    pub text2: Option<String>,
}

/// Errors that can occur while loading quiz items
#[derive(Error, Debug)]
pub enum Error {
    /// The corpus source could not be read
    #[error("failed to read corpus: {0}")]
    Io(#[from] std::io::Error),
    /// The corpus source is not a valid list of items
    #[error("malformed corpus: {0}")]
    Json(#[from] serde_json::Error),
}

/// A source of quiz items, consulted once at process start
pub trait CorpusLoader {
    /// Loads every quiz item
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the source cannot be read or parsed.
    fn load_items(&self) -> Result<Vec<QuizItem>, Error>;
}

/// Loads quiz items from a JSON file holding an array of items
#[derive(Debug, Clone)]
pub struct JsonCorpusFile {
    path: PathBuf,
}

impl JsonCorpusFile {
    /// Creates a loader for the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusLoader for JsonCorpusFile {
    fn load_items(&self) -> Result<Vec<QuizItem>, Error> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// The immutable list of quiz items with cached per-topic indexes
#[derive(Debug, Default)]
pub struct Corpus {
    items: Vec<QuizItem>,
    indexes: EnumMap<Topic, OnceCell<Vec<String>>>,
}

impl Corpus {
    /// Wraps a list of items
    pub fn new(items: Vec<QuizItem>) -> Self {
        Self {
            items,
            indexes: EnumMap::default(),
        }
    }

    /// Loads the corpus from a loader
    ///
    /// # Errors
    ///
    /// Propagates the loader's [`Error`].
    pub fn load(loader: &impl CorpusLoader) -> Result<Self, Error> {
        let items = loader.load_items()?;
        tracing::info!(count = items.len(), "loaded quiz corpus");
        Ok(Self::new(items))
    }

    /// All items in corpus order
    pub fn items(&self) -> &[QuizItem] {
        &self.items
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the corpus has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct question keys of a topic, in corpus order
    pub fn index(&self, topic: Topic) -> &[String] {
        self.indexes[topic].get_or_init(|| {
            self.items
                .iter()
                .filter_map(|item| topic.key_of(item))
                .unique()
                .collect_vec()
        })
    }

    /// Number of distinct questions a topic can ask
    pub fn question_count(&self, topic: Topic) -> usize {
        self.index(topic).len()
    }

    /// The question at `position` of a topic's index
    pub fn question(&self, topic: Topic, position: usize) -> Option<Question> {
        let key = self.index(topic).get(position)?.clone();
        match topic {
            Topic::ByCouplet => {
                let item = self
                    .items
                    .iter()
                    .find(|item| item.couplet_key() == key)?;
                Some(Question {
                    text: item.line_one.clone(),
                    text2: Some(item.line_two.clone()),
                    key,
                })
            }
            _ => Some(Question {
                text: key.clone(),
                text2: None,
                key,
            }),
        }
    }

    /// Every item answering the question `key` of a topic
    pub fn matching_items(&self, topic: Topic, key: &str) -> Vec<QuizItem> {
        self.items
            .iter()
            .filter(|item| topic.key_of(item).as_deref() == Some(key))
            .cloned()
            .collect_vec()
    }
}
