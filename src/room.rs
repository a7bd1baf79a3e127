//! The room aggregate
//!
//! A [`Room`] holds everything one game instance knows: its topics, its
//! clock, its score and one navigation cursor per topic. It is a plain
//! synchronous state machine; the task in [`crate::driver`] owns it
//! exclusively and feeds it commands and ticks one at a time. Every
//! transition broadcasts its own effects through the [`Registry`] and tells
//! the driver what to do with the timer.

use std::sync::Arc;

use enum_map::EnumMap;

use crate::{
    corpus::Corpus,
    cursor::NavigationCursor,
    protocol::{AdminQuestion, ClientMessage, GuestQuestion, RoomInfo},
    registry::Registry,
    report::RoomSummary,
    score::ScoreState,
    session::Tunnel,
    timer::{Tick, TimerSignal, TimerState},
    topic::{Topic, TopicState},
    watcher::{Id, Role},
};

/// Commands that change the state of a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCommand {
    /// Start the round
    Start,
    /// Freeze the clock
    Pause,
    /// Unfreeze the clock
    Resume,
    /// Show the next question of the selected topic
    Next,
    /// Show the previous question of the selected topic
    Previous,
    /// Count a question as answered right
    RightAnswer(String),
    /// Stop counting a question as answered right
    WrongAnswer(String),
    /// Switch topics and reset the clock
    TopicChange(Topic),
}

/// State of a single game instance
#[derive(Debug)]
pub struct Room {
    info: RoomInfo,
    corpus: Arc<Corpus>,
    round_seconds: u64,
    topics: TopicState,
    timer: TimerState,
    score: ScoreState,
    cursors: EnumMap<Topic, NavigationCursor>,
}

impl Room {
    /// Creates an idle room with a fresh clock of `round_seconds`
    pub fn new(info: RoomInfo, corpus: Arc<Corpus>, round_seconds: u64) -> Self {
        Self::with_rng(info, corpus, round_seconds, &mut fastrand::Rng::new())
    }

    /// Creates an idle room whose cursors are seeded from `rng`
    pub fn with_rng(
        info: RoomInfo,
        corpus: Arc<Corpus>,
        round_seconds: u64,
        rng: &mut fastrand::Rng,
    ) -> Self {
        let cursors = EnumMap::from_fn(|topic| {
            NavigationCursor::with_rng(corpus.question_count(topic), rng.fork())
        });
        Self {
            info,
            corpus,
            round_seconds,
            topics: TopicState::default(),
            timer: TimerState::new(round_seconds),
            score: ScoreState::default(),
            cursors,
        }
    }

    /// Identity of the room
    pub fn info(&self) -> &RoomInfo {
        &self.info
    }

    /// Name of the room
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Topic selection of the room
    pub fn topics(&self) -> &TopicState {
        &self.topics
    }

    /// The room's clock
    pub fn timer(&self) -> &TimerState {
        &self.timer
    }

    /// The room's score
    pub fn score(&self) -> &ScoreState {
        &self.score
    }

    /// Whether questions can be navigated and marked
    ///
    /// Play is open while the round is live, paused or not, and closes when
    /// the clock expires. A topic that already ran out stays closed even
    /// after it is selected again.
    fn is_playable(&self) -> bool {
        self.timer.is_live()
            && !self.timer.is_expired()
            && self.topics.is_available(self.topics.selected())
    }

    /// The question currently shown for the selected topic
    pub fn current_question(&self) -> Option<AdminQuestion> {
        let topic = self.topics.selected();
        let position = self.cursors[topic].current()?;
        let question = self.corpus.question(topic, position)?;
        Some(AdminQuestion {
            topic,
            quiz_items: self.corpus.matching_items(topic, &question.key),
            answered: self.score.is_answered(topic, &question.key),
            question: question.text,
            question2: question.text2,
        })
    }

    fn time_message(&self) -> ClientMessage {
        ClientMessage::TimeUpdate(self.timer)
    }

    fn topic_message(&self) -> ClientMessage {
        ClientMessage::TopicState(self.topics.clone())
    }

    fn score_message(&self) -> ClientMessage {
        ClientMessage::ScoreUpdate(self.score.message())
    }

    fn announce_question<T: Tunnel>(&self, registry: &Registry<T>) {
        let Some(question) = self.current_question() else {
            tracing::debug!(
                room = self.name(),
                topic = %self.topics.selected(),
                "topic has no questions"
            );
            return;
        };
        registry.announce(
            self.name(),
            Some(Role::Guest),
            &ClientMessage::GuestQuestion(GuestQuestion::from(&question)),
        );
        registry.announce(
            self.name(),
            Some(Role::Admin),
            &ClientMessage::AdminQuestion(question),
        );
    }

    fn announce_marking<T: Tunnel>(&self, registry: &Registry<T>) {
        if let Some(question) = self.current_question() {
            registry.announce(
                self.name(),
                Some(Role::Admin),
                &ClientMessage::AdminQuestion(question),
            );
        }
        registry.announce(self.name(), Some(Role::Admin), &self.score_message());
    }

    fn navigate<T: Tunnel>(
        &mut self,
        step: fn(&mut NavigationCursor),
        registry: &Registry<T>,
    ) -> TimerSignal {
        if !self.is_playable() {
            tracing::debug!(room = self.name(), "navigation outside a round ignored");
            return TimerSignal::Unchanged;
        }
        step(&mut self.cursors[self.topics.selected()]);
        self.announce_question(registry);
        TimerSignal::Unchanged
    }

    /// Applies a command and broadcasts its effects
    ///
    /// Commands whose precondition does not hold are ignored.
    pub fn receive_command<T: Tunnel>(
        &mut self,
        command: RoomCommand,
        registry: &Registry<T>,
    ) -> TimerSignal {
        match command {
            RoomCommand::Start => {
                if !self.timer.start() {
                    tracing::debug!(room = self.name(), "round already started");
                    return TimerSignal::Unchanged;
                }
                tracing::info!(
                    room = self.name(),
                    topic = %self.topics.selected(),
                    "round started"
                );
                self.announce_question(registry);
                registry.announce(self.name(), None, &self.time_message());
                TimerSignal::Attach
            }
            RoomCommand::Pause => {
                if !self.timer.pause() {
                    tracing::debug!(room = self.name(), "pause ignored, clock not running");
                    return TimerSignal::Unchanged;
                }
                registry.announce(self.name(), None, &self.time_message());
                TimerSignal::Detach
            }
            RoomCommand::Resume => {
                if !self.timer.resume() {
                    tracing::debug!(room = self.name(), "resume ignored, clock not paused");
                    return TimerSignal::Unchanged;
                }
                registry.announce(self.name(), None, &self.time_message());
                TimerSignal::Attach
            }
            RoomCommand::Next => self.navigate(NavigationCursor::go_next, registry),
            RoomCommand::Previous => self.navigate(NavigationCursor::go_previous, registry),
            RoomCommand::RightAnswer(key) | RoomCommand::WrongAnswer(key)
                if !self.is_playable() =>
            {
                tracing::debug!(room = self.name(), %key, "marking outside a round ignored");
                TimerSignal::Unchanged
            }
            RoomCommand::RightAnswer(key) => {
                self.score.mark_right(self.topics.selected(), &key);
                self.announce_marking(registry);
                TimerSignal::Unchanged
            }
            RoomCommand::WrongAnswer(key) => {
                self.score.mark_wrong(self.topics.selected(), &key);
                self.announce_marking(registry);
                TimerSignal::Unchanged
            }
            RoomCommand::TopicChange(topic) => {
                self.timer = TimerState::new(self.round_seconds);
                self.topics.select(topic);
                tracing::info!(room = self.name(), %topic, "topic changed");
                registry.announce(self.name(), None, &self.topic_message());
                registry.announce(self.name(), None, &self.time_message());
                TimerSignal::Detach
            }
        }
    }

    /// Advances the clock by one tick and broadcasts the result
    ///
    /// The clock of a topic that already ran out expires on its first tick.
    pub fn receive_tick<T: Tunnel>(&mut self, registry: &Registry<T>) -> TimerSignal {
        let tick = if self.topics.is_available(self.topics.selected()) {
            self.timer.tick()
        } else {
            self.timer.expire()
        };
        match tick {
            Tick::Ignored => TimerSignal::Detach,
            Tick::Running(time) => {
                tracing::debug!(room = self.name(), time, "tick");
                registry.announce(self.name(), None, &self.time_message());
                TimerSignal::Unchanged
            }
            Tick::Expired => {
                let topic = self.topics.selected();
                self.topics.remove(topic);
                tracing::info!(room = self.name(), %topic, "round expired");
                registry.announce(self.name(), None, &self.time_message());
                registry.announce(self.name(), None, &self.topic_message());
                TimerSignal::Detach
            }
        }
    }

    /// Brings a connection that just entered the room up to date
    pub fn welcome<T: Tunnel>(&self, connection: Id, role: Role, registry: &Registry<T>) {
        if self.timer.is_live() {
            if let Some(question) = self.current_question() {
                let message = match role {
                    Role::Admin => ClientMessage::AdminQuestion(question),
                    Role::Guest => ClientMessage::GuestQuestion(GuestQuestion::from(&question)),
                };
                registry.send(connection, &message);
            }
        }
        if role == Role::Admin {
            registry.send(connection, &self.score_message());
        }
        registry.announce(self.name(), None, &self.time_message());
        registry.announce(self.name(), None, &self.topic_message());
        registry.announce(
            self.name(),
            Some(Role::Admin),
            &ClientMessage::ActiveUsers(registry.active_users(self.name())),
        );
    }

    /// A read-only snapshot of the final state for reporting
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room: self.info.clone(),
            score: self.score.message().score,
            total: self.score.total(),
            answered: EnumMap::from_fn(|topic| self.score.answered(topic)),
            finished_at: web_time::SystemTime::now(),
        }
    }
}
