//! The command processor
//!
//! The [`Engine`] is what a transport talks to. It is told about every
//! connection that opens or closes and every text frame that arrives, and
//! answers through the tunnels it was handed. Lobby commands (creating,
//! joining and leaving rooms) are handled here against the [`Registry`];
//! everything that changes a room is forwarded to that room's task.

use std::sync::Arc;

use garde::Validate;
use thiserror::Error;

use crate::{
    config::{self, Config},
    corpus::Corpus,
    driver::{RoomEvent, RoomHandle},
    passcode::Passcode,
    protocol::{AdminRoomResponse, ClientMessage, JoinRoom, RoomInfo, ServerCommand},
    registry::Registry,
    report::Reporter,
    room::{Room, RoomCommand},
    session::Tunnel,
    watcher::{Id, Role, UserInfo},
};

/// Reasons a lobby command is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A room with the requested name already exists
    #[error("room {:?} already exists", .0.name)]
    RoomExists(RoomInfo),
    /// The requested room does not exist
    #[error("room {:?} does not exist", .0.name)]
    RoomNotExists(RoomInfo),
    /// The passcode does not match the room
    #[error("invalid passcode")]
    InvalidPasscode,
    /// The connection is already a member of a room
    #[error("connection is already in a room")]
    AlreadyRegistered,
}

impl From<Rejection> for ClientMessage {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::RoomExists(room) => ClientMessage::ErrorRoomExists(room),
            Rejection::RoomNotExists(room) => ClientMessage::ErrorRoomNotExists(room),
            Rejection::InvalidPasscode => ClientMessage::ErrorInvalidPasscode,
            Rejection::AlreadyRegistered => ClientMessage::ErrorCloseBrowser,
        }
    }
}

/// The game engine shared by every connection
pub struct Engine<T> {
    registry: Arc<Registry<T>>,
    corpus: Arc<Corpus>,
    config: Config,
    reporters: Vec<Arc<dyn Reporter>>,
}

impl<T: Tunnel> Engine<T> {
    /// Creates an engine serving questions from `corpus`
    ///
    /// # Errors
    ///
    /// Returns [`config::Error::Invalid`] if the configuration is out of
    /// bounds.
    pub fn new(corpus: Corpus, config: Config) -> Result<Self, config::Error> {
        config.validate()?;
        Ok(Self {
            registry: Arc::default(),
            corpus: Arc::new(corpus),
            config,
            reporters: Vec::new(),
        })
    }

    /// Adds a reporter that receives the summary of every destroyed room
    #[must_use]
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Arc::new(reporter));
        self
    }

    /// The session registry
    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    /// The configuration rooms are created with
    pub fn config(&self) -> Config {
        self.config
    }

    /// Registers a new connection and sends it the active room list
    pub fn on_connect(&self, tunnel: T) -> Id {
        let id = self.registry.join(tunnel);
        tracing::debug!(connection = %id, "connection opened");
        self.registry.send(id, &self.registry.active_rooms());
        id
    }

    /// Forgets a closed connection and leaves its room
    pub fn on_disconnect(&self, id: Id) {
        self.registry.leave(id);
        tracing::debug!(connection = %id, "connection closed");
        self.depart(id);
    }

    /// Handles one inbound text frame
    ///
    /// Frames that do not decode are logged and dropped. Must be called from
    /// within a tokio runtime.
    pub fn on_message(&self, id: Id, frame: &str) {
        let command = match frame.parse::<ServerCommand>() {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "dropping malformed frame");
                return;
            }
        };
        let kind = command.kind();

        let outcome = match command {
            ServerCommand::CreateRoom(room) => self.create_room(id, room),
            ServerCommand::AdminJoinRoom(request) => self.join_room(id, request, Role::Admin),
            ServerCommand::GuestJoinRoom(request) => self.join_room(id, request, Role::Guest),
            ServerCommand::StartGame => self.forward(id, RoomCommand::Start),
            ServerCommand::PauseGame => self.forward(id, RoomCommand::Pause),
            ServerCommand::ResumeGame => self.forward(id, RoomCommand::Resume),
            ServerCommand::Next => self.forward(id, RoomCommand::Next),
            ServerCommand::Previous => self.forward(id, RoomCommand::Previous),
            ServerCommand::RightAnswer(key) => self.forward(id, RoomCommand::RightAnswer(key)),
            ServerCommand::WrongAnswer(key) => self.forward(id, RoomCommand::WrongAnswer(key)),
            ServerCommand::TopicChange(topic) => {
                self.forward(id, RoomCommand::TopicChange(topic))
            }
            ServerCommand::SignOut => self.sign_out(id),
        };

        if let Err(rejection) = outcome {
            tracing::warn!(connection = %id, command = %kind, %rejection, "command rejected");
            self.registry.send(id, &rejection.into());
        }
    }

    /// Drops every connection and room
    pub fn shutdown(&self) {
        self.registry.clear();
    }

    fn create_room(&self, id: Id, info: RoomInfo) -> Result<(), Rejection> {
        if self.registry.lookup_user(id).is_some() {
            return Err(Rejection::AlreadyRegistered);
        }

        let admin_passcode = Passcode::admin();
        let guest_passcode = Passcode::guest();
        let (handle, mailbox) =
            RoomHandle::new(info.clone(), admin_passcode.clone(), guest_passcode.clone());
        if !self.registry.insert_room(handle.clone()) {
            return Err(Rejection::RoomExists(info));
        }

        let user = UserInfo::admin(
            id,
            info.name.clone(),
            admin_passcode.clone(),
            guest_passcode.clone(),
        );
        if self.registry.register_user(user.clone()) != user {
            self.registry.remove_room(&info.name);
            return Err(Rejection::AlreadyRegistered);
        }

        let room = Room::new(
            info.clone(),
            Arc::clone(&self.corpus),
            self.config.round_seconds(),
        );
        mailbox.spawn(
            room,
            Arc::clone(&self.registry),
            self.config.tick_period(),
            self.reporters.clone(),
        );
        tracing::info!(connection = %id, room = %info.name, "room created");

        self.registry.send(
            id,
            &ClientMessage::AdminCreatedRoom(AdminRoomResponse {
                room: info,
                admin_passcode,
                guest_passcode,
            }),
        );
        handle.send(RoomEvent::Joined {
            connection: id,
            role: Role::Admin,
        });
        self.registry.announce_all(&self.registry.active_rooms());
        Ok(())
    }

    fn join_room(&self, id: Id, request: JoinRoom, role: Role) -> Result<(), Rejection> {
        if self.registry.lookup_user(id).is_some() {
            return Err(Rejection::AlreadyRegistered);
        }
        let Some(handle) = self.registry.room(&request.name) else {
            return Err(Rejection::RoomNotExists(RoomInfo::named(request.name)));
        };

        let user = match role {
            Role::Admin if handle.admin_passcode().matches(&request.passcode) => UserInfo::admin(
                id,
                request.name,
                handle.admin_passcode().clone(),
                handle.guest_passcode().clone(),
            ),
            Role::Guest if handle.guest_passcode().matches(&request.passcode) => {
                UserInfo::guest(id, request.name, handle.guest_passcode().clone())
            }
            Role::Admin | Role::Guest => return Err(Rejection::InvalidPasscode),
        };
        // Registering makes the joiner a broadcast target, so a frame from the
        // room task may reach them before the join reply sent below.
        if self.registry.register_user(user.clone()) != user {
            return Err(Rejection::AlreadyRegistered);
        }
        // the room may have been destroyed, and its name reused, since the lookup
        let still_open = self
            .registry
            .room(&user.room)
            .is_some_and(|current| current.same_room(&handle));
        if !still_open {
            self.registry.remove_user(id);
            return Err(Rejection::RoomNotExists(handle.info().clone()));
        }

        tracing::info!(connection = %id, room = %user.room, ?role, "user joined room");
        let response = match role {
            Role::Admin => ClientMessage::AdminJoinedRoom(AdminRoomResponse {
                room: handle.info().clone(),
                admin_passcode: handle.admin_passcode().clone(),
                guest_passcode: handle.guest_passcode().clone(),
            }),
            Role::Guest => ClientMessage::GuestJoinedRoom(handle.info().clone()),
        };
        self.registry.send(id, &response);
        handle.send(RoomEvent::Joined {
            connection: id,
            role,
        });
        Ok(())
    }

    fn forward(&self, id: Id, command: RoomCommand) -> Result<(), Rejection> {
        let Some(user) = self.registry.lookup_user(id) else {
            tracing::debug!(connection = %id, ?command, "command from connection outside any room ignored");
            return Ok(());
        };
        if !user.is_admin() {
            tracing::debug!(connection = %id, room = %user.room, ?command, "command from guest ignored");
            return Ok(());
        }
        match self.registry.room(&user.room) {
            Some(handle) => handle.send(command),
            None => tracing::debug!(connection = %id, room = %user.room, "command for finished room ignored"),
        }
        Ok(())
    }

    fn sign_out(&self, id: Id) -> Result<(), Rejection> {
        if self.depart(id).is_some() {
            self.registry.send(id, &ClientMessage::SignOut);
        } else {
            tracing::debug!(connection = %id, "sign out from connection outside any room ignored");
        }
        Ok(())
    }

    /// Removes a connection from its room, destroying the room if no admin
    /// is left
    fn depart(&self, id: Id) -> Option<UserInfo> {
        let user = self.registry.remove_user(id)?;
        tracing::info!(connection = %id, room = %user.room, role = ?user.role, "user left room");

        if self.registry.has_admin(&user.room) {
            self.registry.announce(
                &user.room,
                Some(Role::Admin),
                &ClientMessage::ActiveUsers(self.registry.active_users(&user.room)),
            );
        } else {
            self.destroy_room(&user);
        }
        Some(user)
    }

    /// Destroys the room `user` was a member of
    ///
    /// A newer room that took over the name is left alone.
    fn destroy_room(&self, user: &UserInfo) {
        let Some(handle) = self
            .registry
            .remove_room_if(&user.room, |handle| handle.admits(user))
        else {
            tracing::debug!(room = %user.room, "room already destroyed");
            return;
        };
        self.dissolve(&handle);
    }

    /// Signs out the remaining members of a removed room and stops its task
    fn dissolve(&self, handle: &RoomHandle) {
        let name = &handle.info().name;
        for member in self.registry.users_in(name) {
            if !handle.admits(&member) {
                continue;
            }
            self.registry.remove_user(member.connection);
            self.registry.send(member.connection, &ClientMessage::SignOut);
        }

        handle.close();
        tracing::info!(room = %name, "room destroyed");
        self.registry.announce_all(&self.registry.active_rooms());
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        corpus::tests::sample_corpus, protocol::ActiveUsers, report::tests::CollectingReporter,
        session::tests::MockTunnel,
    };

    fn engine() -> Engine<MockTunnel> {
        Engine::new(sample_corpus(), Config::default()).unwrap()
    }

    fn connect(engine: &Engine<MockTunnel>) -> (Id, MockTunnel) {
        let tunnel = MockTunnel::default();
        let id = engine.on_connect(tunnel.clone());
        tunnel.drain();
        (id, tunnel)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    /// Creates room `name` and returns the admin's connection with both
    /// passcodes
    fn create(engine: &Engine<MockTunnel>, name: &str) -> (Id, MockTunnel, String, String) {
        let (id, tunnel) = connect(engine);
        engine.on_message(id, &format!(r#"CREATE_ROOM{{"name":"{name}"}}"#));
        let user = engine.registry().lookup_user(id).unwrap();
        let admin = user.admin_passcode.unwrap().to_string();
        let guest = user.guest_passcode.to_string();
        (id, tunnel, admin, guest)
    }

    fn join(
        engine: &Engine<MockTunnel>,
        role: Role,
        room: &str,
        passcode: &str,
    ) -> (Id, MockTunnel) {
        let (id, tunnel) = connect(engine);
        let token = match role {
            Role::Admin => "ADMIN_JOIN_ROOM",
            Role::Guest => "GUEST_JOIN_ROOM",
        };
        engine.on_message(
            id,
            &format!(r#"{token}{{"name":"{room}","passcode":"{passcode}"}}"#),
        );
        (id, tunnel)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config::default().with_tick_millis(0);
        assert!(matches!(
            Engine::<MockTunnel>::new(sample_corpus(), config),
            Err(config::Error::Invalid(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_receives_active_rooms() {
        let engine = engine();
        create(&engine, "R2");
        create(&engine, "R1");

        let tunnel = MockTunnel::default();
        engine.on_connect(tunnel.clone());
        assert_eq!(tunnel.drain(), vec![r#"ACTIVE_ROOMS{"rooms":["R1","R2"]}"#]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_room_generates_passcodes() {
        let engine = engine();
        let (observer, observer_tunnel) = connect(&engine);
        let (_, admin, admin_code, guest_code) = create(&engine, "R1");

        assert_eq!(admin_code.len(), 8);
        assert_eq!(guest_code.len(), 4);
        let frames = admin.drain();
        assert_eq!(
            frames[0],
            format!(
                r#"ADMIN_CREATED_ROOM{{"room":{{"name":"R1"}},"adminPasscode":"{admin_code}","guestPasscode":"{guest_code}"}}"#
            )
        );
        assert_eq!(frames[1], r#"ACTIVE_ROOMS{"rooms":["R1"]}"#);
        assert_eq!(
            observer_tunnel.drain(),
            vec![r#"ACTIVE_ROOMS{"rooms":["R1"]}"#]
        );
        assert!(engine.registry().lookup_user(observer).is_none());

        settle().await;
        let frames = admin.drain();
        assert!(frames[0].starts_with("SCORE_UPDATE"));
        assert!(frames.contains(&r#"TIME_UPDATE{"isLive":false,"isPaused":false,"time":181}"#.to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_room_is_rejected() {
        let engine = engine();
        let (first, _, admin_code, _) = create(&engine, "R1");

        let (second, tunnel) = connect(&engine);
        engine.on_message(second, r#"CREATE_ROOM{"name":"R1"}"#);

        assert_eq!(tunnel.drain(), vec![r#"ERROR_ROOM_EXISTS{"name":"R1"}"#]);
        assert!(engine.registry().lookup_user(second).is_none());
        assert_eq!(
            engine.registry().lookup_user(first).unwrap().admin_passcode.unwrap().as_str(),
            admin_code
        );
        assert_eq!(engine.registry().room_names(), vec!["R1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_registration_closes_browser() {
        let engine = engine();
        let (id, tunnel, _, _) = create(&engine, "R1");
        tunnel.drain();

        engine.on_message(id, r#"CREATE_ROOM{"name":"R2"}"#);
        assert_eq!(tunnel.drain(), vec!["ERROR_CLOSE_BROWSER"]);
        assert_eq!(engine.registry().room_names(), vec!["R1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_join_checks_passcode() {
        let engine = engine();
        let (_, _, _, guest_code) = create(&engine, "R1");
        let wrong = if guest_code == "0000" { "1111" } else { "0000" };

        let (rejected, tunnel) = join(&engine, Role::Guest, "R1", wrong);
        assert_eq!(tunnel.drain(), vec!["ERROR_INVALID_PASSCODE"]);
        assert!(engine.registry().lookup_user(rejected).is_none());

        let (accepted, tunnel) = join(&engine, Role::Guest, "R1", &guest_code);
        assert_eq!(tunnel.drain(), vec![r#"GUEST_JOINED_ROOM{"name":"R1"}"#]);
        assert_eq!(
            engine.registry().lookup_user(accepted).unwrap().role,
            Role::Guest
        );

        settle().await;
        let frames = tunnel.drain();
        assert!(frames[0].starts_with("TIME_UPDATE"));
        assert!(frames[1].starts_with("TOPIC_STATE"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_join_requires_admin_passcode() {
        let engine = engine();
        let (_, admin, admin_code, guest_code) = create(&engine, "R1");

        let (rejected, tunnel) = join(&engine, Role::Admin, "R1", &guest_code);
        assert_eq!(tunnel.drain(), vec!["ERROR_INVALID_PASSCODE"]);
        assert!(engine.registry().lookup_user(rejected).is_none());

        let (_, tunnel) = join(&engine, Role::Admin, "R1", &admin_code);
        assert!(tunnel.drain()[0].starts_with(r#"ADMIN_JOINED_ROOM{"room":{"name":"R1"}"#));

        settle().await;
        assert_eq!(
            admin.drain().last().unwrap(),
            r#"ACTIVE_USERS{"admins":2,"guests":0}"#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_missing_room() {
        let engine = engine();
        let (id, tunnel) = join(&engine, Role::Guest, "Nowhere", "1234");
        assert_eq!(
            tunnel.drain(),
            vec![r#"ERROR_ROOM_NOT_EXISTS{"name":"Nowhere"}"#]
        );
        assert!(engine.registry().lookup_user(id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_guest_sees_live_question() {
        let engine = engine();
        let (admin_id, _, _, guest_code) = create(&engine, "R1");
        engine.on_message(admin_id, "START_GAME");
        settle().await;

        let (_, guest) = join(&engine, Role::Guest, "R1", &guest_code);
        settle().await;
        let frames = guest.drain();
        assert!(frames[1].starts_with("GUEST_QUESTION"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guests_cannot_control_room() {
        let engine = engine();
        let (_, admin, _, guest_code) = create(&engine, "R1");
        let (guest_id, guest) = join(&engine, Role::Guest, "R1", &guest_code);
        settle().await;
        admin.drain();
        guest.drain();

        engine.on_message(guest_id, "START_GAME");
        settle().await;
        assert!(admin.drain().is_empty());
        assert!(guest.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frames_are_dropped() {
        let engine = engine();
        let (id, tunnel) = connect(&engine);
        engine.on_message(id, "GIBBERISH");
        engine.on_message(id, "CREATE_ROOM{oops");
        engine.on_message(id, "NEXT");
        assert!(tunnel.drain().is_empty());
        assert!(engine.registry().room_names().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_admin_sign_out_destroys_room() {
        let reporter = CollectingReporter::default();
        let engine = engine().with_reporter(reporter.clone());
        let (admin_id, admin, _, guest_code) = create(&engine, "R1");
        let (first_id, first) = join(&engine, Role::Guest, "R1", &guest_code);
        let (second_id, second) = join(&engine, Role::Guest, "R1", &guest_code);
        let (_, observer) = connect(&engine);
        settle().await;
        for tunnel in [&admin, &first, &second, &observer] {
            tunnel.drain();
        }

        engine.on_message(admin_id, "SIGN_OUT");

        for tunnel in [&first, &second] {
            assert_eq!(
                tunnel.drain(),
                vec!["SIGN_OUT", r#"ACTIVE_ROOMS{"rooms":[]}"#]
            );
        }
        assert_eq!(observer.drain(), vec![r#"ACTIVE_ROOMS{"rooms":[]}"#]);
        assert_eq!(
            admin.drain(),
            vec![r#"ACTIVE_ROOMS{"rooms":[]}"#, "SIGN_OUT"]
        );
        assert!(engine.registry().room_names().is_empty());
        for id in [admin_id, first_id, second_id] {
            assert!(engine.registry().lookup_user(id).is_none());
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(reporter.0.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_room_survives_while_an_admin_remains() {
        let engine = engine();
        let (first_admin, first, admin_code, guest_code) = create(&engine, "R1");
        let (_, second) = join(&engine, Role::Admin, "R1", &admin_code);
        let (guest_id, guest) = join(&engine, Role::Guest, "R1", &guest_code);
        settle().await;
        for tunnel in [&first, &second, &guest] {
            tunnel.drain();
        }

        engine.on_disconnect(first_admin);
        assert_eq!(
            second.drain(),
            vec![r#"ACTIVE_USERS{"admins":1,"guests":1}"#]
        );
        assert!(guest.drain().is_empty());
        assert_eq!(engine.registry().room_names(), vec!["R1"]);
        assert!(engine.registry().lookup_user(guest_id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_leaving_keeps_room() {
        let engine = engine();
        let (_, admin, _, guest_code) = create(&engine, "R1");
        let (guest_id, _) = join(&engine, Role::Guest, "R1", &guest_code);
        settle().await;
        admin.drain();

        engine.on_disconnect(guest_id);
        assert_eq!(
            admin.drain(),
            vec![r#"ACTIVE_USERS{"admins":1,"guests":0}"#]
        );
        assert_eq!(engine.registry().room_names(), vec!["R1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_plays_through_engine() {
        let engine = engine();
        let (admin_id, admin, _, guest_code) = create(&engine, "R1");
        let (_, guest) = join(&engine, Role::Guest, "R1", &guest_code);
        settle().await;
        admin.drain();
        guest.drain();

        engine.on_message(admin_id, "START_GAME");
        settle().await;
        let question = admin.drain()[0].clone();
        assert!(question.starts_with("ADMIN_QUESTION"));
        assert!(guest.drain()[0].starts_with("GUEST_QUESTION"));

        engine.on_message(admin_id, "RIGHT_ANSWERPart 1");
        engine.on_message(admin_id, "RIGHT_ANSWER\"Part 2\"");
        settle().await;
        assert!(admin.drain().contains(
            &r#"SCORE_UPDATE{"score":{"ByPart":2,"ByGloss":0,"ByCouplet":0,"ByFirstWord":0,"ByLastWord":0}}"#.to_owned()
        ));
        assert!(guest.drain().is_empty());

        tokio::time::sleep(Duration::from_secs(181)).await;
        assert!(guest.drain().last().unwrap().starts_with(
            r#"TOPIC_STATE{"selected":"ByPart","availableTopics":["ByGloss""#
        ));

        engine.on_message(admin_id, "TOPIC_CHANGEByGloss");
        settle().await;
        assert_eq!(
            guest.drain(),
            vec![
                r#"TOPIC_STATE{"selected":"ByGloss","availableTopics":["ByGloss","ByCouplet","ByFirstWord","ByLastWord"]}"#,
                r#"TIME_UPDATE{"isLive":false,"isPaused":false,"time":181}"#,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_spares_room_that_reused_the_name() {
        let engine = engine();
        let (old_admin, _, _, old_guest_code) = create(&engine, "R1");
        let (old_guest, old_guest_tunnel) = join(&engine, Role::Guest, "R1", &old_guest_code);
        let old_admin_record = engine.registry().lookup_user(old_admin).unwrap();

        // the old room is unlisted and its name taken before its members are swept
        let old_room = engine.registry().remove_room("R1").unwrap();
        let (new_admin, new_admin_tunnel, _, _) = create(&engine, "R1");
        settle().await;
        old_guest_tunnel.drain();
        new_admin_tunnel.drain();

        engine.destroy_room(&old_admin_record);
        assert_eq!(engine.registry().room_names(), vec!["R1"]);

        engine.dissolve(&old_room);
        assert_eq!(
            old_guest_tunnel.drain(),
            vec!["SIGN_OUT", r#"ACTIVE_ROOMS{"rooms":["R1"]}"#]
        );
        assert!(engine.registry().lookup_user(old_guest).is_none());
        assert!(engine.registry().lookup_user(old_admin).is_none());
        assert!(engine.registry().lookup_user(new_admin).unwrap().is_admin());
        assert!(
            new_admin_tunnel
                .drain()
                .iter()
                .all(|frame| frame != "SIGN_OUT")
        );
        assert!(!engine.registry().room("R1").unwrap().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_member_leaving_keeps_newer_room() {
        let engine = engine();
        let (old_admin, _, _, _) = create(&engine, "R1");
        let old_room = engine.registry().remove_room("R1").unwrap();
        old_room.close();
        let (new_admin, _, _, _) = create(&engine, "R1");
        engine.registry().remove_user(new_admin);

        engine.on_disconnect(old_admin);
        assert_eq!(engine.registry().room_names(), vec!["R1"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_have_one_winner() {
        let engine = Arc::new(engine());
        let racers = (0..16)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    let (id, tunnel) = connect(&engine);
                    engine.on_message(id, r#"CREATE_ROOM{"name":"R1"}"#);
                    (id, tunnel)
                })
            })
            .collect::<Vec<_>>();
        let mut sessions = Vec::new();
        for racer in racers {
            sessions.push(racer.await.unwrap());
        }

        let created = sessions
            .iter()
            .filter(|(_, tunnel)| {
                tunnel
                    .frames()
                    .iter()
                    .any(|frame| frame.starts_with("ADMIN_CREATED_ROOM"))
            })
            .count();
        let refused: usize = sessions
            .iter()
            .map(|(_, tunnel)| tunnel.drain_token("ERROR_ROOM_EXISTS").len())
            .sum();
        assert_eq!(created, 1);
        assert_eq!(refused, 15);

        let registered = sessions
            .iter()
            .filter(|(id, _)| engine.registry().lookup_user(*id).is_some())
            .count();
        assert_eq!(registered, 1);
        assert_eq!(engine.registry().room_names(), vec!["R1"]);
        assert_eq!(
            engine.registry().active_users("R1"),
            ActiveUsers {
                admins: 1,
                guests: 0
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_and_leaves() {
        let engine = Arc::new(engine());
        let (_, _, _, guest_code) = create(&engine, "R1");

        let guests = (0..32)
            .map(|n| {
                let engine = Arc::clone(&engine);
                let guest_code = guest_code.clone();
                tokio::spawn(async move {
                    let (id, tunnel) = join(&engine, Role::Guest, "R1", &guest_code);
                    if n % 2 == 0 {
                        engine.on_disconnect(id);
                    }
                    (id, tunnel)
                })
            })
            .collect::<Vec<_>>();
        let mut sessions = Vec::new();
        for guest in guests {
            sessions.push(guest.await.unwrap());
        }

        for (id, tunnel) in &sessions {
            assert_eq!(
                tunnel.drain_token("GUEST_JOINED_ROOM"),
                vec![r#"GUEST_JOINED_ROOM{"name":"R1"}"#]
            );
            assert_eq!(
                engine.registry().lookup_user(*id).is_some(),
                engine.registry().tunnel(*id).is_some()
            );
        }
        assert!(engine.registry().has_admin("R1"));
        assert_eq!(
            engine.registry().active_users("R1"),
            ActiveUsers {
                admins: 1,
                guests: 16
            }
        );
        assert_eq!(engine.registry().sessions_for("R1", Some(Role::Guest)).len(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admin_sign_outs_destroy_room_once() {
        let engine = Arc::new(engine());
        let (first, first_tunnel, admin_code, guest_code) = create(&engine, "R1");
        let mut admins = vec![(first, first_tunnel)];
        for _ in 0..7 {
            admins.push(join(&engine, Role::Admin, "R1", &admin_code));
        }
        let (guest_id, guest) = join(&engine, Role::Guest, "R1", &guest_code);

        let leavers = admins
            .iter()
            .map(|(id, _)| {
                let engine = Arc::clone(&engine);
                let id = *id;
                tokio::spawn(async move { engine.on_message(id, "SIGN_OUT") })
            })
            .collect::<Vec<_>>();
        for leaver in leavers {
            leaver.await.unwrap();
        }

        assert!(engine.registry().room_names().is_empty());
        assert!(!engine.registry().has_admin("R1"));
        assert!(engine.registry().lookup_user(guest_id).is_none());
        assert_eq!(guest.drain_token("SIGN_OUT"), vec!["SIGN_OUT"]);
        for (id, tunnel) in &admins {
            assert!(engine.registry().lookup_user(*id).is_none());
            assert_eq!(tunnel.drain_token("SIGN_OUT"), vec!["SIGN_OUT"]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_clears_everything() {
        let engine = engine();
        create(&engine, "R1");
        engine.shutdown();
        assert!(engine.registry().room_names().is_empty());
        assert_eq!(engine.registry().connection_count(), 0);
    }
}
