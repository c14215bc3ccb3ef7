//! Two-slot game sessions.
//!
//! A [`Session`] binds two player slots to one [`Game`]. Every mutation
//! (seat, reclaim, detach, leave, move) happens through `&mut Session`, which
//! callers only obtain through the session's own [`Mutex`]. Broadcasts are
//! pushed onto the players' outbound queues inside that same critical
//! section, so both sides observe every event in one server-defined order.
//!
//! Slot lifecycle:
//!
//! ```text
//! Empty -> Connected -> Disconnected -> Connected (reclaim) ...
//!              \______________\______-> Released (explicit leave)
//! ```

use crate::client_manager::{ConnectionHandle, ConnectionId};
use crate::config::SessionPolicy;
use crate::error::{GameError, SessionError};
use crate::game::Game;
use log::{debug, info};
use shared::{BoardView, GameOverReason, Role, ServerMessage};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub type SessionRef = Arc<Mutex<Session>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    WaitingForPlayer,
    InProgress,
    Finished,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Created and joined by name.
    Named,
    /// Paired anonymously by the matchmaking queue.
    Matchmade,
}

#[derive(Debug)]
pub enum SlotState {
    Empty,
    Connected(ConnectionHandle),
    Disconnected,
    /// Given up with an explicit leave. Never reclaimable.
    Released,
}

#[derive(Debug)]
pub struct PlayerSlot {
    role: Role,
    player_name: Option<String>,
    state: SlotState,
}

impl PlayerSlot {
    fn new(role: Role) -> Self {
        Self {
            role,
            player_name: None,
            state: SlotState::Empty,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, SlotState::Empty)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SlotState::Connected(_))
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, SlotState::Released)
    }

    fn handle(&self) -> Option<&ConnectionHandle> {
        match &self.state {
            SlotState::Connected(handle) => Some(handle),
            _ => None,
        }
    }

    fn is_held_by(&self, connection: ConnectionId) -> bool {
        self.handle().map_or(false, |handle| handle.id() == connection)
    }
}

pub struct Session {
    id: String,
    password: Option<String>,
    kind: SessionKind,
    slots: [PlayerSlot; 2],
    game: Box<dyn Game>,
    status: SessionStatus,
    /// Set while no slot is connected.
    unattended_since: Option<Instant>,
    finished_at: Option<Instant>,
    /// Removed from the registry; lookups that still hold a reference must
    /// treat it as gone.
    retired: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("slots", &self.slots)
            .field("retired", &self.retired)
            .finish()
    }
}

impl Session {
    pub fn new(
        id: String,
        kind: SessionKind,
        password: Option<String>,
        game: Box<dyn Game>,
        now: Instant,
    ) -> Self {
        Self {
            id,
            password,
            kind,
            slots: [PlayerSlot::new(Role::First), PlayerSlot::new(Role::Second)],
            game,
            status: SessionStatus::WaitingForPlayer,
            unattended_since: Some(now),
            finished_at: None,
            retired: false,
        }
    }

    pub fn into_ref(self) -> SessionRef {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn slot(&self, role: Role) -> &PlayerSlot {
        &self.slots[role.index()]
    }

    pub fn snapshot(&self) -> BoardView {
        self.game.snapshot()
    }

    /// Role whose slot is currently held by `connection`.
    pub fn role_of(&self, connection: ConnectionId) -> Option<Role> {
        self.slots
            .iter()
            .find(|slot| slot.is_held_by(connection))
            .map(|slot| slot.role)
    }

    /// Fills an empty slot and announces it.
    ///
    /// The new occupant receives `Joined`. Once both slots are named the game
    /// starts and the opponent receives `OpponentJoined`.
    pub fn seat(&mut self, role: Role, player_name: String, handle: ConnectionHandle, now: Instant) {
        debug_assert!(self.slot(role).is_empty(), "seating into an occupied slot");
        debug_assert!(
            self.slot(role.other()).player_name() != Some(player_name.as_str()),
            "duplicate player name within a session"
        );

        info!(
            "Player '{}' seated as {} in session '{}'",
            player_name, role, self.id
        );
        let slot = &mut self.slots[role.index()];
        slot.player_name = Some(player_name.clone());
        slot.state = SlotState::Connected(handle);
        self.refresh_attendance(now);

        self.send_joined(role);
        if self.slot(role.other()).player_name().is_some() {
            self.status = SessionStatus::InProgress;
            info!("Session '{}' started", self.id);
            self.send_to(role.other(), ServerMessage::OpponentJoined { player_name });
        }
    }

    /// Per-session half of a join request: password gate, reconnection by
    /// name, or taking the free slot.
    pub fn join(
        &mut self,
        player_name: &str,
        password: Option<&str>,
        handle: ConnectionHandle,
        now: Instant,
    ) -> Result<Role, SessionError> {
        if self.retired || self.status == SessionStatus::Abandoned {
            return Err(SessionError::NotFound(self.id.clone()));
        }
        if let Some(expected) = self.password.as_deref() {
            if password != Some(expected) {
                return Err(SessionError::WrongPassword(self.id.clone()));
            }
        }

        let own_slot = self
            .slots
            .iter()
            .find(|slot| slot.player_name() == Some(player_name))
            .map(|slot| (slot.role, slot.is_connected(), slot.is_released()));

        match own_slot {
            Some((_, true, _)) => Err(SessionError::NameTaken(player_name.to_string())),
            Some((_, _, true)) => Err(SessionError::SessionFull(self.id.clone())),
            Some((role, false, false)) => {
                self.reclaim(role, handle, now);
                Ok(role)
            }
            None => {
                let free = self
                    .slots
                    .iter()
                    .find(|slot| slot.is_empty())
                    .map(|slot| slot.role);
                match free {
                    Some(role) => {
                        self.seat(role, player_name.to_string(), handle, now);
                        Ok(role)
                    }
                    None => Err(SessionError::SessionFull(self.id.clone())),
                }
            }
        }
    }

    /// Reattaches a disconnected slot and resyncs it from the current
    /// snapshot.
    fn reclaim(&mut self, role: Role, handle: ConnectionHandle, now: Instant) {
        info!(
            "Player '{}' reconnected to session '{}' as {}",
            self.slot(role).player_name().unwrap_or_default(),
            self.id,
            role
        );
        self.slots[role.index()].state = SlotState::Connected(handle);
        self.refresh_attendance(now);

        self.send_joined(role);
        self.send_to(role.other(), ServerMessage::OpponentReconnected);
    }

    /// Marks the slot held by `connection` as disconnected. The game is left
    /// untouched so the player can reclaim it. Returns false for a stale or
    /// unknown connection.
    pub fn detach(&mut self, connection: ConnectionId, now: Instant) -> bool {
        let Some(role) = self.role_of(connection) else {
            return false;
        };

        info!(
            "Player '{}' disconnected from session '{}'",
            self.slot(role).player_name().unwrap_or_default(),
            self.id
        );
        self.slots[role.index()].state = SlotState::Disconnected;
        self.refresh_attendance(now);
        self.send_to(role.other(), ServerMessage::OpponentDisconnected);
        true
    }

    /// Releases the slot held by `connection` for good.
    ///
    /// Leaving a game in progress forfeits it. Leaving before an opponent
    /// arrived abandons the session.
    pub fn leave(&mut self, connection: ConnectionId, now: Instant) -> bool {
        let Some(role) = self.role_of(connection) else {
            return false;
        };

        info!(
            "Player '{}' left session '{}'",
            self.slot(role).player_name().unwrap_or_default(),
            self.id
        );
        self.slots[role.index()].state = SlotState::Released;
        self.refresh_attendance(now);

        match self.status {
            SessionStatus::WaitingForPlayer => {
                self.status = SessionStatus::Abandoned;
                info!("Session '{}' abandoned by its creator", self.id);
            }
            SessionStatus::InProgress => {
                self.send_to(role.other(), ServerMessage::OpponentLeft);
                if self.game.resign(role).is_ok() {
                    self.finish(GameOverReason::Forfeit, now);
                }
            }
            SessionStatus::Finished => {
                self.send_to(role.other(), ServerMessage::OpponentLeft);
            }
            SessionStatus::Abandoned => {}
        }
        true
    }

    /// Applies a move and broadcasts the result to both players.
    pub fn apply_move(&mut self, role: Role, position: u32, now: Instant) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.game.apply_move(role, position)?;

        debug!("Session '{}': {} played {}", self.id, role, position);
        self.broadcast(ServerMessage::MoveApplied {
            role,
            position,
            board: self.game.snapshot(),
        });

        if self.game.outcome().is_over() {
            self.finish(GameOverReason::Completed, now);
        }
        Ok(())
    }

    /// Concedes the game for `role`.
    pub fn resign(&mut self, role: Role, now: Instant) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.game.resign(role)?;

        info!("Session '{}': {} resigned", self.id, role);
        self.finish(GameOverReason::Resigned, now);
        Ok(())
    }

    /// Abandons the session once nobody has been connected for the grace
    /// period. Returns true on the transition.
    pub fn tick(&mut self, now: Instant, grace_period: Duration) -> bool {
        let active = matches!(
            self.status,
            SessionStatus::WaitingForPlayer | SessionStatus::InProgress
        );
        if active && self.unattended_for(now, grace_period) {
            self.status = SessionStatus::Abandoned;
            info!(
                "Session '{}' abandoned after {:?} without players",
                self.id, grace_period
            );
            return true;
        }
        false
    }

    pub fn is_retirable(&self, now: Instant, policy: &SessionPolicy) -> bool {
        if self.retired {
            return false;
        }
        match self.status {
            SessionStatus::Abandoned => true,
            SessionStatus::Finished => {
                self.slots.iter().all(PlayerSlot::is_released)
                    || self
                        .finished_at
                        .map_or(false, |at| now.duration_since(at) >= policy.finished_retention)
                    || self.unattended_for(now, policy.grace_period)
            }
            SessionStatus::WaitingForPlayer | SessionStatus::InProgress => false,
        }
    }

    pub(crate) fn mark_retired(&mut self) {
        self.retired = true;
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::InProgress => Ok(()),
            SessionStatus::WaitingForPlayer => Err(SessionError::WaitingForOpponent),
            SessionStatus::Finished | SessionStatus::Abandoned => Err(GameError::GameOver.into()),
        }
    }

    fn finish(&mut self, reason: GameOverReason, now: Instant) {
        let outcome = self.game.outcome();
        self.status = SessionStatus::Finished;
        self.finished_at = Some(now);
        info!("Session '{}' finished: {:?} ({:?})", self.id, outcome, reason);
        self.broadcast(ServerMessage::GameOver { outcome, reason });
    }

    fn unattended_for(&self, now: Instant, period: Duration) -> bool {
        self.unattended_since
            .map_or(false, |since| now.duration_since(since) >= period)
    }

    fn refresh_attendance(&mut self, now: Instant) {
        if self.slots.iter().any(PlayerSlot::is_connected) {
            self.unattended_since = None;
        } else if self.unattended_since.is_none() {
            self.unattended_since = Some(now);
        }
    }

    fn send_joined(&self, role: Role) {
        self.send_to(
            role,
            ServerMessage::Joined {
                session: self.id.clone(),
                role,
                opponent: self.slot(role.other()).player_name().map(str::to_string),
                board: self.game.snapshot(),
            },
        );
    }

    fn send_to(&self, role: Role, message: ServerMessage) {
        if let Some(handle) = self.slot(role).handle() {
            handle.send(message);
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        for handle in self.slots.iter().filter_map(PlayerSlot::handle) {
            handle.send(message.clone());
        }
    }
}
