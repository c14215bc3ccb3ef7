//! Session registry and matchmaking queue.
//!
//! The registry owns every live session, keyed by name, plus the FIFO queue
//! of players waiting for an anonymous match. The name map and the queue are
//! guarded by independent locks, and neither is held while a game is being
//! played, so pairing new players never blocks players already in a game.
//!
//! No lock is awaited while another is held. Operations that need both the
//! map and a session take a clone of the session handle, release the map,
//! lock the session, and then re-check the map entry with `Arc::ptr_eq`
//! before changing it.

use crate::client_manager::{ConnectionHandle, ConnectionId};
use crate::config::SessionPolicy;
use crate::error::SessionError;
use crate::game::{tictactoe_factory, GameFactory};
use crate::session::{Session, SessionKind, SessionRef, SessionStatus};
use log::{debug, info, warn};
use shared::Role;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{oneshot, Mutex};

/// A connection's place in a session after a successful create, join or
/// match.
#[derive(Debug, Clone)]
pub struct Seat {
    pub session_id: String,
    pub session: SessionRef,
    pub role: Role,
}

/// Result of a matchmaking request.
#[derive(Debug)]
pub enum Matchmade {
    /// Paired immediately with the longest-waiting player.
    Paired(Seat),
    /// Queued. The receiver resolves once another player arrives.
    Pending(oneshot::Receiver<Seat>),
}

struct Waiter {
    player_name: String,
    handle: ConnectionHandle,
    notify: oneshot::Sender<Seat>,
    queued_at: Instant,
}

impl Waiter {
    fn is_live(&self) -> bool {
        !self.notify.is_closed() && !self.handle.is_closed()
    }
}

/// Players awaiting anonymous pairing, in arrival order.
#[derive(Default)]
struct MatchmakingQueue {
    waiters: VecDeque<Waiter>,
}

impl MatchmakingQueue {
    fn len(&self) -> usize {
        self.waiters.len()
    }

    fn contains(&self, player_name: &str) -> bool {
        self.waiters.iter().any(|w| w.player_name == player_name)
    }

    /// Names in the order they will be paired.
    fn waiting_names(&self) -> Vec<&str> {
        self.waiters.iter().map(|w| w.player_name.as_str()).collect()
    }

    fn push(&mut self, waiter: Waiter) {
        debug_assert!(!self.contains(&waiter.player_name));
        self.waiters.push_back(waiter);
    }

    /// Pops the earliest waiter whose connection is still around.
    fn pop_live(&mut self) -> Option<Waiter> {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.is_live() {
                return Some(waiter);
            }
            debug!(
                "Dropping stale matchmaking entry for '{}'",
                waiter.player_name
            );
        }
        None
    }

    fn remove_connection(&mut self, connection: ConnectionId) -> bool {
        let before = self.waiters.len();
        self.waiters.retain(|w| w.handle.id() != connection);
        self.waiters.len() != before
    }
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionRef>>,
    queue: Mutex<MatchmakingQueue>,
    next_match_id: AtomicU64,
    policy: SessionPolicy,
    game_factory: GameFactory,
}

impl SessionRegistry {
    pub fn new(policy: SessionPolicy) -> Self {
        Self::with_game_factory(policy, tictactoe_factory())
    }

    pub fn with_game_factory(policy: SessionPolicy, game_factory: GameFactory) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            queue: Mutex::new(MatchmakingQueue::default()),
            next_match_id: AtomicU64::new(1),
            policy,
            game_factory,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Creates a named session with the creator seated first.
    ///
    /// Fails with `NameConflict` unless the name is free or only held by an
    /// abandoned session, which is replaced.
    pub async fn create_session(
        &self,
        name: &str,
        player_name: &str,
        password: Option<String>,
        handle: ConnectionHandle,
    ) -> Result<Seat, SessionError> {
        validate_name(name, "session name")?;
        validate_name(player_name, "player name")?;
        let password = password.filter(|p| !p.is_empty());
        let now = Instant::now();

        let existing = self.sessions.lock().await.get(name).cloned();
        if let Some(existing) = &existing {
            if existing.lock().await.status() != SessionStatus::Abandoned {
                warn!("Rejected create of '{}': name in use", name);
                return Err(SessionError::NameConflict(name.to_string()));
            }
        }

        let session = {
            let mut sessions = self.sessions.lock().await;
            let unchanged = match (sessions.get(name), &existing) {
                (None, _) => true,
                (Some(current), Some(existing)) => Arc::ptr_eq(current, existing),
                (Some(_), None) => false,
            };
            if !unchanged {
                warn!("Rejected create of '{}': name taken concurrently", name);
                return Err(SessionError::NameConflict(name.to_string()));
            }

            let mut session = Session::new(
                name.to_string(),
                SessionKind::Named,
                password,
                (self.game_factory)(),
                now,
            );
            session.seat(Role::First, player_name.to_string(), handle, now);
            let session = session.into_ref();
            sessions.insert(name.to_string(), session.clone());
            session
        };

        if let Some(existing) = existing {
            existing.lock().await.mark_retired();
            info!("Replaced abandoned session '{}'", name);
        }
        info!("Session '{}' created by '{}'", name, player_name);

        Ok(Seat {
            session_id: name.to_string(),
            session,
            role: Role::First,
        })
    }

    /// Joins a named session, or reclaims a disconnected slot under the same
    /// player name.
    pub async fn join_session(
        &self,
        name: &str,
        player_name: &str,
        password: Option<&str>,
        handle: ConnectionHandle,
    ) -> Result<Seat, SessionError> {
        validate_name(player_name, "player name")?;

        let session = {
            let sessions = self.sessions.lock().await;
            sessions.get(name).cloned()
        }
        .ok_or_else(|| SessionError::NotFound(name.to_string()))?;

        let role = {
            let mut guard = session.lock().await;
            guard.join(player_name, password, handle, Instant::now())?
        };

        Ok(Seat {
            session_id: name.to_string(),
            session,
            role,
        })
    }

    /// Pairs the caller with the longest-waiting player, or queues them.
    ///
    /// The waiter takes the first slot. Matched sessions get a generated
    /// `match-<n>` name and live in the same map as named sessions, so either
    /// player can reconnect to them with a regular join.
    pub async fn enqueue_matchmaking(
        &self,
        player_name: &str,
        handle: ConnectionHandle,
    ) -> Result<Matchmade, SessionError> {
        validate_name(player_name, "player name")?;

        let waiter = {
            let mut queue = self.queue.lock().await;
            if queue.contains(player_name) {
                return Err(SessionError::AlreadyQueued(player_name.to_string()));
            }
            match queue.pop_live() {
                Some(waiter) => waiter,
                None => {
                    let (notify, rx) = oneshot::channel();
                    queue.push(Waiter {
                        player_name: player_name.to_string(),
                        handle,
                        notify,
                        queued_at: Instant::now(),
                    });
                    info!(
                        "Player '{}' waiting for a match ({} queued)",
                        player_name,
                        queue.len()
                    );
                    return Ok(Matchmade::Pending(rx));
                }
            }
        };

        let now = Instant::now();
        let waiter_id = waiter.handle.id();
        let (session_id, session) = {
            let mut sessions = self.sessions.lock().await;
            let session_id = loop {
                let n = self.next_match_id.fetch_add(1, Ordering::Relaxed);
                let candidate = format!("match-{}", n);
                if !sessions.contains_key(&candidate) {
                    break candidate;
                }
            };

            let mut session = Session::new(
                session_id.clone(),
                SessionKind::Matchmade,
                None,
                (self.game_factory)(),
                now,
            );
            session.seat(Role::First, waiter.player_name.clone(), waiter.handle, now);
            session.seat(Role::Second, player_name.to_string(), handle, now);
            let session = session.into_ref();
            sessions.insert(session_id.clone(), session.clone());
            (session_id, session)
        };

        info!(
            "Matched '{}' (waited {:?}) with '{}' in '{}'",
            waiter.player_name,
            waiter.queued_at.elapsed(),
            player_name,
            session_id
        );

        let first = Seat {
            session_id: session_id.clone(),
            session: session.clone(),
            role: Role::First,
        };
        if waiter.notify.send(first).is_err() {
            // The waiter went away between the liveness check and now
            warn!("Matched player '{}' vanished before pairing", waiter.player_name);
            session.lock().await.detach(waiter_id, Instant::now());
        }

        Ok(Matchmade::Paired(Seat {
            session_id,
            session,
            role: Role::Second,
        }))
    }

    /// Withdraws a queued connection. Returns false if it was not queued,
    /// for instance because it was paired in the meantime.
    pub async fn cancel_matchmaking(&self, connection: ConnectionId) -> bool {
        let removed = self.queue.lock().await.remove_connection(connection);
        if removed {
            debug!("Connection {} left the matchmaking queue", connection);
        }
        removed
    }

    /// Removes a finished or abandoned session once it is eligible.
    /// Idempotent: returns false if there was nothing to retire.
    pub async fn retire(&self, session_id: &str) -> bool {
        self.retire_at(session_id, Instant::now()).await
    }

    async fn retire_at(&self, session_id: &str, now: Instant) -> bool {
        let Some(session) = self.sessions.lock().await.get(session_id).cloned() else {
            return false;
        };

        let kind = {
            let mut guard = session.lock().await;
            if !guard.is_retirable(now, &self.policy) {
                return false;
            }
            guard.mark_retired();
            guard.kind()
        };

        let mut sessions = self.sessions.lock().await;
        match sessions.get(session_id) {
            Some(current) if Arc::ptr_eq(current, &session) => {
                sessions.remove(session_id);
                info!("{:?} session '{}' retired", kind, session_id);
                true
            }
            _ => false,
        }
    }

    /// Advances every session's timers and retires whatever became eligible.
    /// Returns the retired session ids.
    pub async fn reap(&self, now: Instant) -> Vec<String> {
        let snapshot: Vec<(String, SessionRef)> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .map(|(id, session)| (id.clone(), session.clone()))
                .collect()
        };

        let mut eligible = Vec::new();
        for (id, session) in snapshot {
            let mut guard = session.lock().await;
            guard.tick(now, self.policy.grace_period);
            if guard.is_retirable(now, &self.policy) {
                eligible.push(id);
            }
        }

        let mut retired = Vec::new();
        for id in eligible {
            if self.retire_at(&id, now).await {
                retired.push(id);
            }
        }
        retired
    }

    pub async fn get(&self, name: &str) -> Option<SessionRef> {
        self.sessions.lock().await.get(name).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn waiting_names(&self) -> Vec<String> {
        let queue = self.queue.lock().await;
        queue.waiting_names().into_iter().map(str::to_string).collect()
    }
}

fn validate_name(value: &str, what: &'static str) -> Result<(), SessionError> {
    if value.trim().is_empty() {
        return Err(SessionError::InvalidName(what));
    }
    Ok(())
}
