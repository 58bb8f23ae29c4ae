//! One async task per live match.
//!
//! The session owns the engine: every mutation happens on this task, so the
//! simulation is single-threaded and lock-free. Two timers drive it: the
//! 60 Hz tick and the 10 Hz snapshot broadcast, plus a 1 Hz housekeeping
//! sweep for grace windows, ping timeouts and anti-cheat audits.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::settings;
use crate::game::anticheat::{CheatMonitor, Severity};
use crate::game::engine::GameEngine;
use crate::game::types::Action;
use crate::game::validator::{self, RateLimiter};
use crate::protocol::ServerMsg;
use crate::rooms;

#[derive(Debug)]
pub enum SessionCmd {
    Action {
        player: Uuid,
        action: Action,
        action_id: Option<String>,
        client_tick: u64,
        timestamp: DateTime<Utc>,
    },
    /// (Re)attach a player's outbound channel.
    Connect {
        player: Uuid,
        tx: mpsc::UnboundedSender<ServerMsg>,
    },
    Disconnect {
        player: Uuid,
    },
    Ping {
        player: Uuid,
    },
    Forfeit {
        player: Uuid,
    },
    Pause,
    Resume,
    Stop,
}

#[derive(Debug)]
struct Queued {
    action: Action,
    client_tick: u64,
    arrival_ms: i64,
    seq: u64,
}

/// Spawn the session task; the returned sender is the room's engine handle.
pub fn spawn(
    room_id: Uuid,
    mut engine: GameEngine,
    conns: HashMap<Uuid, mpsc::UnboundedSender<ServerMsg>>,
) -> mpsc::Sender<SessionCmd> {
    let (tx, mut rx) = mpsc::channel::<SessionCmd>(256);

    tokio::spawn(async move {
        let cfg = settings();
        let mut tick_timer =
            tokio::time::interval(Duration::from_micros(1_000_000 / cfg.tick_rate));
        let mut snap_timer =
            tokio::time::interval(Duration::from_millis(1000 / cfg.snapshot_rate));
        let mut sweep_timer = tokio::time::interval(Duration::from_secs(1));

        let mut conns = conns;
        let mut queues: HashMap<Uuid, VecDeque<Queued>> = HashMap::new();
        let mut limiters: HashMap<Uuid, RateLimiter> = HashMap::new();
        let monitor = CheatMonitor::new();
        let mut last_ping: HashMap<Uuid, Instant> = HashMap::new();
        let mut dc_since: HashMap<Uuid, Instant> = HashMap::new();
        let mut paused = false;
        let mut seq: u64 = 0;

        let humans: Vec<Uuid> = engine
            .state()
            .players
            .values()
            .filter(|p| !p.is_ai())
            .map(|p| p.id)
            .collect();
        let now = Instant::now();
        for pid in &humans {
            last_ping.insert(*pid, now);
        }

        loop {
            tokio::select! {
                Some(cmd) = rx.recv() => {
                    match cmd {
                        SessionCmd::Action { player, action, action_id, client_tick, timestamp } => {
                            last_ping.insert(player, Instant::now());
                            let limiter = limiters.entry(player).or_default();
                            let verdict = validator::validate(
                                engine.state(), player, &action, limiter, Instant::now(), timestamp,
                            );
                            match verdict {
                                Ok(()) => {
                                    let apm = limiter.recent_minute(Instant::now());
                                    if let Some(report) = monitor.check_action_rate(player, apm) {
                                        log::warn!("room {room_id}: anti-cheat {:?}: {}", report.severity, report.detail);
                                        if report.severity == Severity::Confirmed {
                                            engine.forfeit(player);
                                        }
                                    }
                                    seq += 1;
                                    queues.entry(player).or_default().push_back(Queued {
                                        action,
                                        client_tick,
                                        arrival_ms: Utc::now().timestamp_millis(),
                                        seq,
                                    });
                                    publish(&conns, player, ServerMsg::ActionAccepted {
                                        action_id,
                                        tick: engine.state().tick,
                                    });
                                }
                                Err(reason) => {
                                    publish(&conns, player, ServerMsg::ActionRejected {
                                        action_id,
                                        reason: reason.to_string(),
                                    });
                                }
                            }
                        }
                        SessionCmd::Connect { player, tx } => {
                            conns.insert(player, tx);
                            dc_since.remove(&player);
                            last_ping.insert(player, Instant::now());
                            publish(&conns, player, ServerMsg::GameStart {
                                room_id,
                                tick: engine.state().tick,
                            });
                        }
                        SessionCmd::Disconnect { player } => {
                            conns.remove(&player);
                            // Pending input from the departed socket is dropped.
                            queues.remove(&player);
                            dc_since.insert(player, Instant::now());
                        }
                        SessionCmd::Ping { player } => {
                            last_ping.insert(player, Instant::now());
                        }
                        SessionCmd::Forfeit { player } => {
                            engine.forfeit(player);
                        }
                        SessionCmd::Pause => {
                            paused = true;
                            rooms::set_paused(room_id, true);
                        }
                        SessionCmd::Resume => {
                            paused = false;
                            rooms::set_paused(room_id, false);
                        }
                        SessionCmd::Stop => break,
                    }
                }

                _ = tick_timer.tick() => {
                    if paused {
                        continue;
                    }
                    drain_into_engine(&mut engine, &mut queues);
                    engine.tick();

                    if engine.state().game_over {
                        let reason = engine
                            .state()
                            .end_reason
                            .clone()
                            .unwrap_or_else(|| "game over".into());
                        broadcast(&conns, ServerMsg::GameOver {
                            room_id,
                            winner: engine.state().winner,
                            reason,
                        });
                        rooms::mark_ended(room_id);
                        break;
                    }
                }

                _ = snap_timer.tick() => {
                    if paused {
                        continue;
                    }
                    for (pid, tx) in &conns {
                        let snapshot = engine.snapshot_for(*pid);
                        let _ = tx.send(ServerMsg::Snapshot { snapshot });
                    }
                }

                _ = sweep_timer.tick() => {
                    let now = Instant::now();
                    let grace = Duration::from_secs(cfg.grace_secs);
                    let ping_timeout = Duration::from_secs(cfg.ping_timeout_secs);

                    // Silent players count as disconnected; their grace window opens.
                    for pid in &humans {
                        if conns.contains_key(pid) && !dc_since.contains_key(pid) {
                            if let Some(seen) = last_ping.get(pid) {
                                if now.duration_since(*seen) > ping_timeout {
                                    log::info!("room {room_id}: player {pid} timed out");
                                    conns.remove(pid);
                                    queues.remove(pid);
                                    dc_since.insert(*pid, now);
                                }
                            }
                        }
                    }
                    for (pid, since) in dc_since.clone() {
                        if now.duration_since(since) >= grace {
                            log::info!("room {room_id}: grace expired for {pid}, forfeiting");
                            engine.forfeit(pid);
                            dc_since.remove(&pid);
                        }
                    }

                    if !paused {
                        for report in monitor.audit_state(engine.state()) {
                            log::warn!(
                                "room {room_id}: anti-cheat {:?}: {}",
                                report.severity, report.detail,
                            );
                            if report.severity == Severity::Confirmed {
                                engine.forfeit(report.player);
                            }
                        }
                    }

                    // Fail-stop on broken ownership invariants.
                    let state = engine.state();
                    let orphaned = state
                        .units
                        .values()
                        .any(|u| !state.players.contains_key(&u.owner))
                        || state
                            .buildings
                            .values()
                            .any(|b| !state.players.contains_key(&b.owner));
                    if orphaned {
                        log::error!("room {room_id}: engine invariant violated, terminating");
                        broadcast(&conns, ServerMsg::Error {
                            message: "internal server error".into(),
                        });
                        rooms::mark_ended(room_id);
                        break;
                    }
                }

                else => break,
            }
        }

        log::info!("session for room {room_id} finished");
    });

    tx
}

/// Feed eligible queued actions to the engine: per-player FIFO, across
/// players ordered by `(arrival timestamp, player id)`.
fn drain_into_engine(engine: &mut GameEngine, queues: &mut HashMap<Uuid, VecDeque<Queued>>) {
    let current = engine.state().tick;
    let mut eligible: Vec<(Uuid, Queued)> = Vec::new();
    for (pid, queue) in queues.iter_mut() {
        while queue
            .front()
            .map(|q| q.client_tick <= current)
            .unwrap_or(false)
        {
            eligible.push((*pid, queue.pop_front().unwrap()));
        }
    }
    eligible.sort_by(|(pa, qa), (pb, qb)| {
        (qa.arrival_ms, *pa, qa.seq).cmp(&(qb.arrival_ms, *pb, qb.seq))
    });
    for (pid, q) in eligible {
        engine.submit_at(pid, q.action, q.arrival_ms);
    }
}

fn publish(conns: &HashMap<Uuid, mpsc::UnboundedSender<ServerMsg>>, player: Uuid, msg: ServerMsg) {
    if let Some(tx) = conns.get(&player) {
        let _ = tx.send(msg);
    }
}

fn broadcast(conns: &HashMap<Uuid, mpsc::UnboundedSender<ServerMsg>>, msg: ServerMsg) {
    for tx in conns.values() {
        let _ = tx.send(msg.clone());
    }
}
