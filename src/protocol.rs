//! Wire format of the room protocol
//!
//! Every frame is a command token immediately followed by its payload, with
//! no separator. Structured payloads are JSON; a few commands carry plain
//! text and some carry nothing at all. Inbound frames decode into the closed
//! [`ServerCommand`] enum and outbound messages encode from [`ClientMessage`].

use std::{fmt::Display, str::FromStr};

use garde::Validate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_with::skip_serializing_none;
use thiserror::Error;

use crate::{
    constants,
    corpus::QuizItem,
    passcode::Passcode,
    score::ScoreMessage,
    timer::TimerState,
    topic::{Topic, TopicState, UnknownTopic},
};

/// Validates that a name contains something other than whitespace
///
/// # Errors
///
/// Returns a `garde::Error` if the name is blank.
fn not_blank(value: &str) -> garde::Result {
    if value.trim().is_empty() {
        Err(garde::Error::new("cannot be blank"))
    } else {
        Ok(())
    }
}

/// Identity and metadata of a room
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct RoomInfo {
    /// Unique name of the room
    #[garde(
        length(min = constants::room::MIN_NAME_LENGTH, max = constants::room::MAX_NAME_LENGTH),
        custom(|name, _| not_blank(name))
    )]
    pub name: String,
    /// School the room plays for
    #[serde(default)]
    #[garde(length(max = constants::room::MAX_LABEL_LENGTH))]
    pub school: Option<String>,
    /// Age group the room plays in
    #[serde(default)]
    #[garde(length(max = constants::room::MAX_LABEL_LENGTH))]
    pub group: Option<String>,
}

impl RoomInfo {
    /// A room identified only by its name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            school: None,
            group: None,
        }
    }
}

/// Request to join an existing room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoom {
    /// Name of the room to join
    pub name: String,
    /// Passcode presented by the joiner
    pub passcode: String,
}

/// Passcodes handed to an admin after creating or joining a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRoomResponse {
    /// The room
    pub room: RoomInfo,
    /// Passcode admins join with
    pub admin_passcode: Passcode,
    /// Passcode guests join with
    pub guest_passcode: Passcode,
}

/// Names of every active room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveRooms {
    /// Room names in sorted order
    pub rooms: Vec<String>,
}

/// Number of users connected to a room
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActiveUsers {
    /// Connected admins
    pub admins: usize,
    /// Connected guests
    pub guests: usize,
}

/// The current question as admins see it, answers included
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminQuestion {
    /// Topic of the question
    pub topic: Topic,
    /// Question text
    pub question: String,
    /// Second line of question text (couplets only)
    pub question2: Option<String>,
    /// Every item answering the question
    pub quiz_items: Vec<QuizItem>,
    /// Whether the question has been marked right
    pub answered: bool,
}

/// The current question as guests see it, answers hidden
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestQuestion {
    /// Topic of the question
    pub topic: Topic,
    /// Question text
    pub question: String,
    /// Second line of question text (couplets only)
    pub question2: Option<String>,
}

impl From<&AdminQuestion> for GuestQuestion {
    fn from(question: &AdminQuestion) -> Self {
        Self {
            topic: question.topic,
            question: question.question.clone(),
            question2: question.question2.clone(),
        }
    }
}

/// Messages sent from the server to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// A room was created for the sender
    AdminCreatedRoom(AdminRoomResponse),
    /// The sender joined a room as admin
    AdminJoinedRoom(AdminRoomResponse),
    /// The sender joined a room as guest
    GuestJoinedRoom(RoomInfo),
    /// A room with the requested name already exists
    ErrorRoomExists(RoomInfo),
    /// The requested room does not exist
    ErrorRoomNotExists(RoomInfo),
    /// The presented passcode is wrong
    ErrorInvalidPasscode,
    /// The connection already belongs to a room and must be reopened
    ErrorCloseBrowser,
    /// The receiver has been signed out of its room
    SignOut,
    /// The list of active rooms
    ActiveRooms(ActiveRooms),
    /// The current question with answers
    AdminQuestion(AdminQuestion),
    /// The current question without answers
    GuestQuestion(GuestQuestion),
    /// The room's clock
    TimeUpdate(TimerState),
    /// The room's topics
    TopicState(TopicState),
    /// The room's score
    ScoreUpdate(ScoreMessage),
    /// The room's user counts
    ActiveUsers(ActiveUsers),
}

/// Serializes a payload
///
/// # Panics
///
/// Panics if serialization fails, which cannot happen for the plain data
/// structures used as payloads.
fn encode<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).expect("default serializer cannot fail")
}

impl ClientMessage {
    /// The command token of the message
    pub fn token(&self) -> &'static str {
        match self {
            Self::AdminCreatedRoom(_) => "ADMIN_CREATED_ROOM",
            Self::AdminJoinedRoom(_) => "ADMIN_JOINED_ROOM",
            Self::GuestJoinedRoom(_) => "GUEST_JOINED_ROOM",
            Self::ErrorRoomExists(_) => "ERROR_ROOM_EXISTS",
            Self::ErrorRoomNotExists(_) => "ERROR_ROOM_NOT_EXISTS",
            Self::ErrorInvalidPasscode => "ERROR_INVALID_PASSCODE",
            Self::ErrorCloseBrowser => "ERROR_CLOSE_BROWSER",
            Self::SignOut => "SIGN_OUT",
            Self::ActiveRooms(_) => "ACTIVE_ROOMS",
            Self::AdminQuestion(_) => "ADMIN_QUESTION",
            Self::GuestQuestion(_) => "GUEST_QUESTION",
            Self::TimeUpdate(_) => "TIME_UPDATE",
            Self::TopicState(_) => "TOPIC_STATE",
            Self::ScoreUpdate(_) => "SCORE_UPDATE",
            Self::ActiveUsers(_) => "ACTIVE_USERS",
        }
    }

    fn payload(&self) -> Option<String> {
        match self {
            Self::AdminCreatedRoom(response) | Self::AdminJoinedRoom(response) => {
                Some(encode(response))
            }
            Self::GuestJoinedRoom(room)
            | Self::ErrorRoomExists(room)
            | Self::ErrorRoomNotExists(room) => Some(encode(room)),
            Self::ActiveRooms(rooms) => Some(encode(rooms)),
            Self::AdminQuestion(question) => Some(encode(question)),
            Self::GuestQuestion(question) => Some(encode(question)),
            Self::TimeUpdate(timer) => Some(encode(timer)),
            Self::TopicState(topics) => Some(encode(topics)),
            Self::ScoreUpdate(score) => Some(encode(score)),
            Self::ActiveUsers(users) => Some(encode(users)),
            Self::ErrorInvalidPasscode | Self::ErrorCloseBrowser | Self::SignOut => None,
        }
    }

    /// Encodes the message as a single text frame
    pub fn to_message(&self) -> String {
        match self.payload() {
            Some(payload) => format!("{}{payload}", self.token()),
            None => self.token().to_owned(),
        }
    }
}

/// The kinds of commands clients can send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Create a room
    CreateRoom,
    /// Join a room as admin
    AdminJoinRoom,
    /// Join a room as guest
    GuestJoinRoom,
    /// Start the round
    StartGame,
    /// Pause the round
    PauseGame,
    /// Resume the round
    ResumeGame,
    /// Show the next question
    Next,
    /// Show the previous question
    Previous,
    /// Mark a question answered right
    RightAnswer,
    /// Mark a question answered wrong
    WrongAnswer,
    /// Switch topics
    TopicChange,
    /// Leave the room
    SignOut,
}

impl CommandKind {
    /// Every command kind
    pub const ALL: [CommandKind; 12] = [
        Self::CreateRoom,
        Self::AdminJoinRoom,
        Self::GuestJoinRoom,
        Self::StartGame,
        Self::PauseGame,
        Self::ResumeGame,
        Self::Next,
        Self::Previous,
        Self::RightAnswer,
        Self::WrongAnswer,
        Self::TopicChange,
        Self::SignOut,
    ];

    /// The command token on the wire
    pub fn token(self) -> &'static str {
        match self {
            Self::CreateRoom => "CREATE_ROOM",
            Self::AdminJoinRoom => "ADMIN_JOIN_ROOM",
            Self::GuestJoinRoom => "GUEST_JOIN_ROOM",
            Self::StartGame => "START_GAME",
            Self::PauseGame => "PAUSE_GAME",
            Self::ResumeGame => "RESUME_GAME",
            Self::Next => "NEXT",
            Self::Previous => "PREVIOUS",
            Self::RightAnswer => "RIGHT_ANSWER",
            Self::WrongAnswer => "WRONG_ANSWER",
            Self::TopicChange => "TOPIC_CHANGE",
            Self::SignOut => "SIGN_OUT",
        }
    }
}

impl Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Commands sent from clients to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    /// Create a room and become its first admin
    CreateRoom(RoomInfo),
    /// Join a room as admin
    AdminJoinRoom(JoinRoom),
    /// Join a room as guest
    GuestJoinRoom(JoinRoom),
    /// Start the round
    StartGame,
    /// Pause the round
    PauseGame,
    /// Resume the round
    ResumeGame,
    /// Show the next question
    Next,
    /// Show the previous question
    Previous,
    /// Mark the question with this key answered right
    RightAnswer(String),
    /// Mark the question with this key answered wrong
    WrongAnswer(String),
    /// Switch to a topic
    TopicChange(Topic),
    /// Leave the room
    SignOut,
}

/// Errors that can occur while decoding an inbound frame
#[derive(Error, Debug)]
pub enum Error {
    /// The frame does not start with a known command token
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    /// The command requires a payload but none was given
    #[error("{0} requires a payload")]
    MissingPayload(CommandKind),
    /// The payload is not valid JSON for the command
    #[error("malformed {kind} payload: {source}")]
    Payload {
        /// The command being decoded
        kind: CommandKind,
        /// The JSON error
        source: serde_json::Error,
    },
    /// The payload decoded but failed validation
    #[error("invalid {kind} payload: {source}")]
    Invalid {
        /// The command being decoded
        kind: CommandKind,
        /// The validation report
        source: garde::Report,
    },
    /// The topic name is not recognized
    #[error(transparent)]
    Topic(#[from] UnknownTopic),
}

fn json_payload<T: DeserializeOwned>(kind: CommandKind, payload: &str) -> Result<T, Error> {
    if payload.is_empty() {
        return Err(Error::MissingPayload(kind));
    }
    serde_json::from_str(payload).map_err(|source| Error::Payload { kind, source })
}

/// Reads a text payload given either as a JSON string or as raw text
fn text_payload(kind: CommandKind, payload: &str) -> Result<String, Error> {
    if payload.is_empty() {
        return Err(Error::MissingPayload(kind));
    }
    if payload.starts_with('"') {
        if let Ok(text) = serde_json::from_str::<String>(payload) {
            return Ok(text);
        }
    }
    Ok(payload.to_owned())
}

impl ServerCommand {
    /// The kind of the command
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::CreateRoom(_) => CommandKind::CreateRoom,
            Self::AdminJoinRoom(_) => CommandKind::AdminJoinRoom,
            Self::GuestJoinRoom(_) => CommandKind::GuestJoinRoom,
            Self::StartGame => CommandKind::StartGame,
            Self::PauseGame => CommandKind::PauseGame,
            Self::ResumeGame => CommandKind::ResumeGame,
            Self::Next => CommandKind::Next,
            Self::Previous => CommandKind::Previous,
            Self::RightAnswer(_) => CommandKind::RightAnswer,
            Self::WrongAnswer(_) => CommandKind::WrongAnswer,
            Self::TopicChange(_) => CommandKind::TopicChange,
            Self::SignOut => CommandKind::SignOut,
        }
    }

    /// Encodes the command as a text frame, the way clients send it
    pub fn to_message(&self) -> String {
        let token = self.kind().token();
        match self {
            Self::CreateRoom(room) => format!("{token}{}", encode(room)),
            Self::AdminJoinRoom(join) | Self::GuestJoinRoom(join) => {
                format!("{token}{}", encode(join))
            }
            Self::RightAnswer(key) | Self::WrongAnswer(key) => format!("{token}{}", encode(key)),
            Self::TopicChange(topic) => format!("{token}{}", encode(topic)),
            Self::StartGame
            | Self::PauseGame
            | Self::ResumeGame
            | Self::Next
            | Self::Previous
            | Self::SignOut => token.to_owned(),
        }
    }
}

impl FromStr for ServerCommand {
    type Err = Error;

    /// Decodes an inbound frame
    ///
    /// The longest command token that prefixes the frame wins; the rest of
    /// the frame is the payload. Payloads of commands that take none are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the token is unknown or the payload does not
    /// decode.
    fn from_str(frame: &str) -> Result<Self, Self::Err> {
        let kind = CommandKind::ALL
            .into_iter()
            .filter(|kind| frame.starts_with(kind.token()))
            .max_by_key(|kind| kind.token().len())
            .ok_or_else(|| Error::UnknownCommand(frame.chars().take(32).collect()))?;
        let payload = &frame[kind.token().len()..];

        Ok(match kind {
            CommandKind::CreateRoom => {
                let room: RoomInfo = json_payload(kind, payload)?;
                room.validate()
                    .map_err(|source| Error::Invalid { kind, source })?;
                Self::CreateRoom(room)
            }
            CommandKind::AdminJoinRoom => Self::AdminJoinRoom(json_payload(kind, payload)?),
            CommandKind::GuestJoinRoom => Self::GuestJoinRoom(json_payload(kind, payload)?),
            CommandKind::StartGame => Self::StartGame,
            CommandKind::PauseGame => Self::PauseGame,
            CommandKind::ResumeGame => Self::ResumeGame,
            CommandKind::Next => Self::Next,
            CommandKind::Previous => Self::Previous,
            CommandKind::RightAnswer => Self::RightAnswer(text_payload(kind, payload)?),
            CommandKind::WrongAnswer => Self::WrongAnswer(text_payload(kind, payload)?),
            CommandKind::TopicChange => Self::TopicChange(text_payload(kind, payload)?.parse()?),
            CommandKind::SignOut => Self::SignOut,
        })
    }
}
