//! Per-connection session task: framing, liveness, and request dispatch.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The task is the only reader and the only writer
//! of its connection. It waits on three things at once:
//!
//!   1. The outbound channel, which request handlers and game
//!      coordinators push to through [`Player::send`]
//!   2. The next frame from the client
//!   3. The liveness deadline: a ping when the client has been quiet, or
//!      unreachability when an acknowledgment is overdue
//!
//! Every frame runs through the same checks, in order: decode, signature,
//! command lookup, origin, parameter names, player binding,
//! acknowledgment, state machine, typed request, handler.

use std::sync::Arc;

use farkle_game::{respond, update};
use farkle_protocol::{
    decode, encode, lookup, params, CommandId, Message, Param, ProtocolError, Request, SIGNATURE,
};
use farkle_session::{is_valid_name, Delivery, Outbound, Player, PlayerSender, SessionError};
use farkle_transport::{Connection, ConnectionId, TcpConnection, TransportError};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::server::ServerState;
use crate::{ErrorClass, FarkleError};

/// What the session loop does after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Drop guard that marks the session's player unreachable when the
/// handler exits.
///
/// The player leaves its game first, while it still counts as connected
/// for the broadcasts that follow, and is then marked disconnected. The
/// registry entry stays so the player can reconnect. A player that logged
/// out is unbound before the guard drops and needs no cleanup.
struct SessionGuard {
    player: Option<Arc<Player>>,
    state: Arc<ServerState>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(player) = self.player.take() {
            tracing::info!(nickname = %player.nickname(), "player unreachable");
            self.state.games.player_unreachable(&player);
            player.disconnect();
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), FarkleError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = Session {
        conn_id,
        state: Arc::clone(&state),
        tx,
        guard: SessionGuard {
            player: None,
            state,
        },
        last_read: Instant::now(),
    };

    let result = loop {
        let deadline = session.deadline();
        tokio::select! {
            biased;

            outbound = rx.recv() => match outbound {
                Some(Outbound::Message(msg)) => {
                    if let Err(e) = write(&conn, &msg).await {
                        tracing::debug!(%conn_id, error = %e, "send failed");
                        break Err(e);
                    }
                }
                Some(Outbound::Close) | None => break Ok(()),
            },

            frame = conn.recv() => match frame {
                Ok(Some(frame)) => {
                    if session.on_frame(&frame).await == Flow::Close {
                        break Ok(());
                    }
                }
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed by peer");
                    break Ok(());
                }
                Err(TransportError::FrameTooLarge(max)) => {
                    let err = FarkleError::Transport(TransportError::FrameTooLarge(max));
                    tracing::warn!(%conn_id, error = %err, "protocol violation");
                    let _ = write(&conn, &session.error_reply(None, &err)).await;
                    break Ok(());
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break Err(e.into());
                }
            },

            () = time::sleep_until(deadline) => {
                if session.on_deadline() == Flow::Close {
                    break Ok(());
                }
            }
        }
    };

    // Cleanup runs before the socket is shut so nothing more is queued
    // for this connection.
    drop(session);
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    result
}

/// Encodes and writes one outbound message.
async fn write(conn: &TcpConnection, msg: &Message) -> Result<(), FarkleError> {
    let bytes = match encode(msg) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, command_id = msg.command_id, "failed to encode outbound message");
            return Ok(());
        }
    };
    conn.send(&bytes).await?;
    tracing::debug!(
        conn_id = %conn.id(),
        command_id = msg.command_id,
        nickname = %msg.nickname,
        "sent message"
    );
    Ok(())
}

struct Session {
    conn_id: ConnectionId,
    state: Arc<ServerState>,
    tx: PlayerSender,
    guard: SessionGuard,
    last_read: Instant,
}

impl Session {
    fn player(&self) -> Option<&Arc<Player>> {
        self.guard.player.as_ref()
    }

    /// The oldest outstanding acknowledgment falls due `liveness_timeout`
    /// after it was requested; with none outstanding, the client is pinged
    /// `liveness_timeout` after its last frame.
    fn deadline(&self) -> Instant {
        let timeout = self.state.session.liveness_timeout;
        match self.player().and_then(|p| p.oldest_pending_ack()) {
            Some(sent_at) => sent_at + timeout,
            None => self.last_read + timeout,
        }
    }

    fn on_deadline(&mut self) -> Flow {
        let now = Instant::now();
        let Some(player) = self.player().cloned() else {
            self.last_read = now;
            return Flow::Continue;
        };

        if let Some(sent_at) = player.oldest_pending_ack() {
            if now >= sent_at + self.state.session.liveness_timeout {
                tracing::warn!(
                    conn_id = %self.conn_id,
                    nickname = %player.nickname(),
                    pending = player.pending_acks(),
                    "acknowledgment overdue"
                );
                return Flow::Close;
            }
            return Flow::Continue;
        }

        match update(&player, CommandId::ServerPingPlayer, vec![]) {
            Delivery::Sent => tracing::debug!(nickname = %player.nickname(), "pinged idle player"),
            delivery => tracing::debug!(nickname = %player.nickname(), ?delivery, "ping not sent"),
        }
        self.last_read = now;
        Flow::Continue
    }

    async fn on_frame(&mut self, frame: &[u8]) -> Flow {
        self.last_read = Instant::now();

        let msg = match decode(frame) {
            Ok(msg) => msg,
            Err(e) => return self.reject(None, e.into()),
        };
        tracing::debug!(
            conn_id = %self.conn_id,
            command_id = msg.command_id,
            nickname = %msg.nickname,
            "received message"
        );

        match self.dispatch(&msg).await {
            Ok(flow) => flow,
            Err(e) => self.reject(Some(&msg), e),
        }
    }

    async fn dispatch(&mut self, msg: &Message) -> Result<Flow, FarkleError> {
        if msg.signature != SIGNATURE {
            return Err(ProtocolError::BadSignature(msg.signature.clone()).into());
        }
        let spec = lookup(msg.command_id)?;
        if !spec.is_client_origin() {
            return Err(ProtocolError::UnexpectedOrigin(spec.name).into());
        }
        if !spec.validate(&msg.params) {
            return Err(ProtocolError::ParamMismatch(spec.name).into());
        }
        let command = spec.command;

        let Some(player) = self.player().cloned() else {
            return match command {
                CommandId::ClientLogin => self.login(msg),
                CommandId::ClientReconnect => self.reconnect(msg).await,
                _ => Err(FarkleError::NotLoggedIn(spec.name)),
            };
        };
        if msg.nickname != player.nickname() {
            return Err(FarkleError::NicknameMismatch {
                expected: player.nickname().to_string(),
                actual: msg.nickname.clone(),
            });
        }

        if command == CommandId::ResponseClientSuccess {
            if !player.acknowledge(&msg.timestamp) {
                tracing::debug!(
                    nickname = %player.nickname(),
                    timestamp = %msg.timestamp,
                    "acknowledgment matches nothing outstanding"
                );
            }
            return Ok(Flow::Continue);
        }
        if self.state.session.strict_acks && player.pending_acks() > 0 {
            tracing::warn!(
                nickname = %player.nickname(),
                pending = player.pending_acks(),
                command = spec.name,
                "command sent while acknowledgment outstanding"
            );
            return Ok(Flow::Close);
        }
        if !player.can_fire(command) {
            return Err(SessionError::IllegalTransition {
                state: player.state(),
                trigger: command,
            }
            .into());
        }

        let timestamp = msg.timestamp.as_str();
        let state = Arc::clone(&self.state);
        let games = &state.games;
        match Request::parse(command, msg)? {
            Request::Login | Request::Reconnect => {
                return Err(SessionError::IllegalTransition {
                    state: player.state(),
                    trigger: command,
                }
                .into());
            }
            Request::CreateGame { name, max_players } => {
                games.create_game(&player, timestamp, &name, max_players)?;
            }
            Request::JoinGame { name } => {
                games.join_game(&player, timestamp, &name)?;
            }
            Request::StartGame => {
                games.start_game(&player, timestamp)?;
            }
            Request::RollDice => games.roll_dice(&player, timestamp).await?,
            Request::SelectCubes { values } => {
                games.select_cubes(&player, timestamp, values).await?;
            }
            Request::EndTurn => games.end_turn(&player, timestamp).await?,
            Request::Logout => self.logout(&player, timestamp)?,
            Request::Acknowledge => {}
        }
        Ok(Flow::Continue)
    }

    fn login(&mut self, msg: &Message) -> Result<Flow, FarkleError> {
        let nickname = msg.nickname.as_str();
        if !is_valid_name(nickname) {
            return Err(SessionError::InvalidNickname(nickname.to_string()).into());
        }
        let player = self
            .state
            .players
            .add(Player::new(nickname, self.tx.clone()))?;
        player.fire(CommandId::ClientLogin)?;
        self.guard.player = Some(Arc::clone(&player));
        tracing::info!(conn_id = %self.conn_id, %nickname, "player logged in");

        let list = self.state.games.game_list()?;
        respond(&player, CommandId::ResponseServerGameList, &msg.timestamp, vec![list]);
        Ok(Flow::Continue)
    }

    async fn reconnect(&mut self, msg: &Message) -> Result<Flow, FarkleError> {
        let player = self.state.players.get(&msg.nickname)?;
        let previous = player.reattach(self.tx.clone())?;
        self.guard.player = Some(Arc::clone(&player));
        tracing::info!(
            conn_id = %self.conn_id,
            nickname = %player.nickname(),
            %previous,
            "player reconnected"
        );

        self.state.games.player_reconnected(&player).await?;
        Ok(Flow::Continue)
    }

    fn logout(&mut self, player: &Arc<Player>, timestamp: &str) -> Result<(), FarkleError> {
        player.fire(CommandId::ClientLogout)?;
        respond(player, CommandId::ResponseServerSuccess, timestamp, vec![]);
        player.close();
        player.disconnect();
        self.state.players.remove(player.nickname());
        self.guard.player = None;
        tracing::info!(conn_id = %self.conn_id, nickname = %player.nickname(), "player logged out");
        Ok(())
    }

    /// Builds the `ResponseServerError` for `err`, answering `request` if
    /// it could be decoded.
    fn error_reply(&self, request: Option<&Message>, err: &FarkleError) -> Message {
        let nickname = match (self.player(), request) {
            (Some(player), _) => player.nickname().to_string(),
            (None, Some(msg)) => msg.nickname.clone(),
            (None, None) => String::new(),
        };
        let reply = Message::new(
            CommandId::ResponseServerError,
            nickname,
            vec![Param::new(params::MESSAGE, err.client_message())],
        );
        match request {
            Some(msg) => reply.with_timestamp(msg.timestamp.clone()),
            None => reply,
        }
    }

    /// Reports `err` to the client and, unless it is a race, queues the
    /// connection to close once the report is flushed.
    fn reject(&mut self, request: Option<&Message>, err: FarkleError) -> Flow {
        let nickname = request.map(|m| m.nickname.as_str()).unwrap_or_default();
        match err.class() {
            ErrorClass::Race => {
                tracing::info!(conn_id = %self.conn_id, %nickname, error = %err, "request rejected");
            }
            class => {
                tracing::warn!(conn_id = %self.conn_id, %nickname, ?class, error = %err, "disconnecting client");
            }
        }

        let reply = self.error_reply(request, &err);
        match self.player() {
            Some(player) => {
                player.send(reply);
            }
            None => {
                let _ = self.tx.send(Outbound::Message(reply));
            }
        }
        if err.disconnects() {
            let _ = self.tx.send(Outbound::Close);
        }
        Flow::Continue
    }
}
