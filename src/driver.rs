//! Per-room tasks and the timer driver
//!
//! Each room is owned by one tokio task. Commands, joins and timer ticks all
//! reach the room through that task, so they are applied strictly one at a
//! time and never race. The task holds at most one interval timer; starting
//! a new one drops the old, and stopping it takes effect before the next
//! event is handled.

use std::{future, sync::Arc};

use tokio::{
    sync::mpsc,
    time::{Instant, Interval},
};

use crate::{
    passcode::Passcode,
    protocol::RoomInfo,
    registry::Registry,
    report::Reporter,
    room::{Room, RoomCommand},
    session::Tunnel,
    timer::TimerSignal,
    watcher::{Id, Role, UserInfo},
};

/// Events delivered to a room task
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum RoomEvent {
    /// A command from an admin of the room
    #[from]
    Command(RoomCommand),
    /// A connection entered the room
    Joined {
        /// The new member
        connection: Id,
        /// Role of the new member
        role: Role,
    },
    /// The room is being destroyed
    Close,
}

/// Address of a running room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    info: RoomInfo,
    admin_passcode: Passcode,
    guest_passcode: Passcode,
    events: mpsc::UnboundedSender<RoomEvent>,
}

/// The receiving end of a room's events, not yet bound to a task
#[derive(Debug)]
pub struct RoomMailbox(mpsc::UnboundedReceiver<RoomEvent>);

impl RoomHandle {
    /// Creates the handle of a new room along with its mailbox
    ///
    /// Events sent before the mailbox is spawned are queued.
    pub fn new(
        info: RoomInfo,
        admin_passcode: Passcode,
        guest_passcode: Passcode,
    ) -> (Self, RoomMailbox) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                info,
                admin_passcode,
                guest_passcode,
                events,
            },
            RoomMailbox(receiver),
        )
    }

    /// Identity of the room
    pub fn info(&self) -> &RoomInfo {
        &self.info
    }

    /// The passcode admins join with
    pub fn admin_passcode(&self) -> &Passcode {
        &self.admin_passcode
    }

    /// The passcode guests join with
    pub fn guest_passcode(&self) -> &Passcode {
        &self.guest_passcode
    }

    /// Whether both handles address the same room task
    ///
    /// Rooms are looked up by name, and a name is free again as soon as its
    /// room is destroyed.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.events.same_channel(&other.events)
    }

    /// Whether a membership record was issued by this room
    pub fn admits(&self, user: &UserInfo) -> bool {
        user.room == self.info.name
            && user.guest_passcode == self.guest_passcode
            && user
                .admin_passcode
                .as_ref()
                .is_none_or(|passcode| *passcode == self.admin_passcode)
    }

    /// Queues an event for the room
    pub fn send(&self, event: impl Into<RoomEvent>) {
        if self.events.send(event.into()).is_err() {
            tracing::debug!(room = %self.info.name, "event for finished room dropped");
        }
    }

    /// Asks the room task to stop
    pub fn close(&self) {
        self.send(RoomEvent::Close);
    }

    /// Whether the room task has stopped
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

impl RoomMailbox {
    /// Spawns the task that owns `room`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T: Tunnel>(
        self,
        room: Room,
        registry: Arc<Registry<T>>,
        tick_period: web_time::Duration,
        reporters: Vec<Arc<dyn Reporter>>,
    ) {
        tokio::spawn(run(room, self.0, registry, tick_period, reporters));
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => future::pending().await,
    }
}

async fn run<T: Tunnel>(
    mut room: Room,
    mut events: mpsc::UnboundedReceiver<RoomEvent>,
    registry: Arc<Registry<T>>,
    tick_period: web_time::Duration,
    reporters: Vec<Arc<dyn Reporter>>,
) {
    let registry = registry.as_ref();
    let mut ticker: Option<Interval> = None;

    loop {
        let signal = tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(RoomEvent::Command(command)) => room.receive_command(command, registry),
                Some(RoomEvent::Joined { connection, role }) => {
                    room.welcome(connection, role, registry);
                    TimerSignal::Unchanged
                }
                Some(RoomEvent::Close) | None => break,
            },
            () = next_tick(&mut ticker) => room.receive_tick(registry),
        };

        match signal {
            TimerSignal::Attach => {
                ticker = Some(tokio::time::interval_at(
                    Instant::now() + tick_period,
                    tick_period,
                ));
            }
            TimerSignal::Detach => ticker = None,
            TimerSignal::Unchanged => {}
        }
    }

    events.close();
    tracing::info!(room = room.name(), "room closed");

    if reporters.is_empty() {
        return;
    }
    let summary = room.summary();
    tokio::task::spawn_blocking(move || {
        for reporter in reporters {
            reporter.report(&summary);
        }
    });
}
