//! # Quiz Room Library
//!
//! This library provides the core logic of a live quiz game played over
//! websocket-like connections. Admins create and run rooms, guests watch,
//! questions drawn from a fixed corpus advance on a timer, and right or wrong
//! answers update a per-topic score.
//!
//! The transport is not part of the library: it hands every connection to
//! the [`Engine`] as a [`Tunnel`] and forwards inbound text frames to
//! [`Engine::on_message`]. Each room runs on its own tokio task, so the
//! engine must be driven from within a tokio runtime.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod constants;
pub mod corpus;
pub mod cursor;
pub mod driver;
pub mod engine;
pub mod passcode;
pub mod protocol;
pub mod registry;
pub mod report;
pub mod room;
pub mod score;
pub mod session;
pub mod timer;
pub mod topic;
pub mod watcher;

pub use config::Config;
pub use corpus::{Corpus, CorpusLoader, JsonCorpusFile, QuizItem};
pub use engine::{Engine, Rejection};
pub use protocol::{ClientMessage, ServerCommand};
pub use report::{LogReporter, Reporter, RoomSummary};
pub use session::{ChannelTunnel, CloseReason, Outbound, Tunnel};
pub use watcher::Id;
