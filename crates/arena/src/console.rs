//! Interactive line console.
//!
//! Each input line is one command. Players are referred to by name and are
//! assigned a fresh [`PlayerId`] the first time a name is used; lobbies are
//! referred to by id or by any unique id prefix.

use arena_event_system::{LobbyId, PlayerId, SessionId};
use arena_plugin_system::{GameAction, GameSession};
use arena_server::lobby::Lobby;
use arena_server::{CreateLobbyRequest, LobbyError, LobbyService};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

pub const HELP: &str = "\
commands:
  create <player> <name> [max_players] [private]
  join <player> <lobby>
  leave <player> <lobby>
  ready <player> <lobby>
  start <player> <lobby>
  kick <owner> <lobby> <player>
  move <player> <row> <col>
  list
  show <lobby>
  stats
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Create {
        player: String,
        name: String,
        max_players: Option<usize>,
        private: bool,
    },
    Join { player: String, lobby: String },
    Leave { player: String, lobby: String },
    Ready { player: String, lobby: String },
    Start { player: String, lobby: String },
    Kick {
        owner: String,
        lobby: String,
        target: String,
    },
    Move { player: String, row: usize, col: usize },
    List,
    Show { lobby: String },
    Stats,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parses one input line; blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = words.split_first() else {
            return Ok(None);
        };
        if verb.starts_with('#') {
            return Ok(None);
        }

        let command = match (verb, args) {
            ("create", [player, name, rest @ ..]) => {
                let mut max_players = None;
                let mut private = false;
                for option in rest {
                    match *option {
                        "private" => private = true,
                        number => {
                            max_players = Some(number.parse().map_err(|_| {
                                format!("expected a player count or 'private', got '{number}'")
                            })?)
                        }
                    }
                }
                ConsoleCommand::Create {
                    player: player.to_string(),
                    name: name.to_string(),
                    max_players,
                    private,
                }
            }
            ("join", [player, lobby]) => ConsoleCommand::Join {
                player: player.to_string(),
                lobby: lobby.to_string(),
            },
            ("leave", [player, lobby]) => ConsoleCommand::Leave {
                player: player.to_string(),
                lobby: lobby.to_string(),
            },
            ("ready", [player, lobby]) => ConsoleCommand::Ready {
                player: player.to_string(),
                lobby: lobby.to_string(),
            },
            ("start", [player, lobby]) => ConsoleCommand::Start {
                player: player.to_string(),
                lobby: lobby.to_string(),
            },
            ("kick", [owner, lobby, target]) => ConsoleCommand::Kick {
                owner: owner.to_string(),
                lobby: lobby.to_string(),
                target: target.to_string(),
            },
            ("move", [player, row, col]) => ConsoleCommand::Move {
                player: player.to_string(),
                row: parse_index(row)?,
                col: parse_index(col)?,
            },
            ("list", []) => ConsoleCommand::List,
            ("show", [lobby]) => ConsoleCommand::Show {
                lobby: lobby.to_string(),
            },
            ("stats", []) => ConsoleCommand::Stats,
            ("help", _) => ConsoleCommand::Help,
            ("quit" | "exit", []) => ConsoleCommand::Quit,
            _ => return Err(format!("cannot parse '{}', try 'help'", line.trim())),
        };
        Ok(Some(command))
    }
}

fn parse_index(word: &str) -> Result<usize, String> {
    word.parse()
        .map_err(|_| format!("expected a board index, got '{word}'"))
}

/// Drives a [`LobbyService`] from text commands.
pub struct Console {
    service: Arc<LobbyService>,
    players: HashMap<String, PlayerId>,
    sessions: HashMap<PlayerId, SessionId>,
}

impl Console {
    pub fn new(service: Arc<LobbyService>) -> Self {
        Self {
            service,
            players: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    /// Reads commands until `quit` or end of input.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> anyhow::Result<()> {
        println!("{HELP}");
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let command = match ConsoleCommand::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    println!("⚠️ {message}");
                    continue;
                }
            };
            if command == ConsoleCommand::Quit {
                break;
            }
            match self.execute(command).await {
                Ok(reply) => println!("{reply}"),
                Err(message) => println!("❌ {message}"),
            }
        }
        info!("👋 Console closed");
        Ok(())
    }

    /// Executes one command, returning the text to show.
    pub async fn execute(&mut self, command: ConsoleCommand) -> Result<String, String> {
        debug!("Console command: {:?}", command);
        match command {
            ConsoleCommand::Create {
                player,
                name,
                max_players,
                private,
            } => {
                let owner = self.player(&player);
                let mut request = CreateLobbyRequest::new(name);
                request.max_players = max_players;
                request.is_private = private;
                let lobby = self
                    .service
                    .create_lobby(owner, request)
                    .await
                    .map_err(describe_error)?;
                Ok(format!("created {}", self.describe(&lobby)))
            }
            ConsoleCommand::Join { player, lobby } => {
                let player = self.player(&player);
                let lobby_id = self.resolve_lobby(&lobby)?;
                let lobby = self
                    .service
                    .join_lobby(lobby_id, player)
                    .await
                    .map_err(describe_error)?;
                Ok(self.describe(&lobby))
            }
            ConsoleCommand::Leave { player, lobby } => {
                let player = self.player(&player);
                let lobby_id = self.resolve_lobby(&lobby)?;
                match self
                    .service
                    .leave_lobby(lobby_id, player)
                    .await
                    .map_err(describe_error)?
                {
                    Some(lobby) => Ok(self.describe(&lobby)),
                    None => Ok(format!("lobby {} deleted", short_id(lobby_id))),
                }
            }
            ConsoleCommand::Ready { player, lobby } => {
                let player = self.player(&player);
                let lobby_id = self.resolve_lobby(&lobby)?;
                let lobby = self
                    .service
                    .set_ready(lobby_id, player)
                    .await
                    .map_err(describe_error)?;
                Ok(self.describe(&lobby))
            }
            ConsoleCommand::Start { player, lobby } => {
                let player = self.player(&player);
                let lobby_id = self.resolve_lobby(&lobby)?;
                let session = self
                    .service
                    .start_game(lobby_id, player)
                    .await
                    .map_err(describe_error)?;
                for player_id in &session.player_ids {
                    self.sessions.insert(*player_id, session.id);
                }
                Ok(format!(
                    "started {} session {}\n{}",
                    session.game_type,
                    short_id(session.id),
                    self.describe_session(&session)
                ))
            }
            ConsoleCommand::Kick {
                owner,
                lobby,
                target,
            } => {
                let owner = self.player(&owner);
                let target = self.player(&target);
                let lobby_id = self.resolve_lobby(&lobby)?;
                let lobby = self
                    .service
                    .kick_player(lobby_id, owner, target)
                    .await
                    .map_err(describe_error)?;
                Ok(self.describe(&lobby))
            }
            ConsoleCommand::Move { player, row, col } => {
                let player_id = self.player(&player);
                let session_id = *self
                    .sessions
                    .get(&player_id)
                    .ok_or_else(|| format!("{player} is not playing a game"))?;
                let action = GameAction::new("place", json!({ "row": row, "col": col }));
                let outcome = self
                    .service
                    .apply_game_action(session_id, player_id, action)
                    .await
                    .map_err(describe_error)?;
                if outcome.finished {
                    for player_id in &outcome.session.player_ids {
                        self.sessions.remove(player_id);
                    }
                }
                Ok(self.describe_session(&outcome.session))
            }
            ConsoleCommand::List => {
                let lobbies = self.service.list_public_lobbies();
                if lobbies.is_empty() {
                    return Ok("no public lobbies".to_string());
                }
                Ok(lobbies
                    .iter()
                    .map(|lobby| self.describe(lobby))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            ConsoleCommand::Show { lobby } => {
                let lobby_id = self.resolve_lobby(&lobby)?;
                let lobby = self
                    .service
                    .get_lobby(lobby_id)
                    .await
                    .map_err(describe_error)?;
                let mut text = self.describe(&lobby);
                if let Some(session_id) = lobby.session_id {
                    if let Ok(session) = self.service.get_session(session_id) {
                        text.push('\n');
                        text.push_str(&self.describe_session(&session));
                    }
                }
                Ok(text)
            }
            ConsoleCommand::Stats => {
                let stats = self.service.bus().get_stats().await;
                let mut lines = vec![format!(
                    "events published {}, processed {}, without handlers {}, generated {}",
                    stats.events_published,
                    stats.events_processed,
                    stats.zero_handler_events,
                    stats.generated_events
                )];
                let mut handlers: Vec<_> = stats.handlers.iter().collect();
                handlers.sort_by(|a, b| a.0.cmp(b.0));
                for (name, handler) in handlers {
                    lines.push(format!(
                        "  {}: {} invocations, {} ok, {} errors, {} timeouts, {:.2}ms avg",
                        name,
                        handler.invocations,
                        handler.successes,
                        handler.errors,
                        handler.timeouts,
                        handler.average_latency_ms
                    ));
                }
                lines.push(format!(
                    "lobbies {}, active sessions {}",
                    self.service.store().len(),
                    self.service.engine().active_session_count()
                ));
                Ok(lines.join("\n"))
            }
            ConsoleCommand::Help => Ok(HELP.to_string()),
            ConsoleCommand::Quit => Ok("bye".to_string()),
        }
    }

    fn player(&mut self, name: &str) -> PlayerId {
        *self
            .players
            .entry(name.to_string())
            .or_insert_with(PlayerId::new)
    }

    fn name_of(&self, player_id: PlayerId) -> String {
        self.players
            .iter()
            .find(|(_, id)| **id == player_id)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| short_id(player_id))
    }

    fn resolve_lobby(&self, reference: &str) -> Result<LobbyId, String> {
        if let Ok(id) = LobbyId::parse(reference) {
            return Ok(id);
        }
        let matches: Vec<LobbyId> = self
            .service
            .store()
            .list_active()
            .into_iter()
            .map(|lobby| lobby.id)
            .filter(|id| id.to_string().starts_with(reference))
            .collect();
        match matches.as_slice() {
            [id] => Ok(*id),
            [] => Err(format!("no lobby matches '{reference}'")),
            _ => Err(format!("'{reference}' matches {} lobbies", matches.len())),
        }
    }

    fn describe(&self, lobby: &Lobby) -> String {
        let players: Vec<String> = lobby.players.iter().map(|p| self.name_of(*p)).collect();
        format!(
            "{} '{}' [{}] {}/{} {} owner={} players={}{}",
            short_id(lobby.id),
            lobby.name,
            lobby.status,
            lobby.player_count(),
            lobby.max_players,
            lobby.game_type,
            self.name_of(lobby.owner_id),
            players.join(","),
            if lobby.is_private { " private" } else { "" }
        )
    }

    fn describe_session(&self, session: &GameSession) -> String {
        let mut text = render_board(&session.state.data);
        let status = if session.status.is_terminal() {
            match session.winner_id {
                Some(winner) => format!("🏆 {} wins", self.name_of(winner)),
                None => format!("{}, no winner", session.status),
            }
        } else {
            match session.current_player() {
                Some(player) => format!(
                    "turn {}, {} to move",
                    session.state.turn_number,
                    self.name_of(player)
                ),
                None => session.status.to_string(),
            }
        };
        text.push_str(&status);
        text
    }
}

fn describe_error(error: LobbyError) -> String {
    format!("{}: {}", error.kind(), error.reason())
}

fn short_id(id: impl std::fmt::Display) -> String {
    id.to_string().chars().take(8).collect()
}

/// Renders a grid of marks stored as `cells: [[mark | null]]`.
fn render_board(data: &Value) -> String {
    let Some(rows) = data.get("cells").and_then(Value::as_array) else {
        return String::new();
    };
    let mut text = String::new();
    for row in rows {
        let cells: Vec<&str> = row
            .as_array()
            .map(|cells| cells.iter().map(|c| c.as_str().unwrap_or(".")).collect())
            .unwrap_or_default();
        text.push_str(&cells.join(" "));
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_server::lobby::InMemoryDurableStore;
    use arena_server::{ArenaServer, Config};

    async fn console() -> Console {
        let mut config = Config::default();
        config.event_bus.parallel_processing = false;
        let server = ArenaServer::with_durable_store(config, Arc::new(InMemoryDurableStore::new()))
            .await
            .unwrap();
        Console::new(server.service())
    }

    async fn run(console: &mut Console, line: &str) -> Result<String, String> {
        let command = ConsoleCommand::parse(line)?.ok_or("empty line")?;
        console.execute(command).await
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
        assert_eq!(ConsoleCommand::parse("# note").unwrap(), None);
        assert_eq!(
            ConsoleCommand::parse("create alice duel 4 private").unwrap(),
            Some(ConsoleCommand::Create {
                player: "alice".to_string(),
                name: "duel".to_string(),
                max_players: Some(4),
                private: true,
            })
        );
        assert_eq!(
            ConsoleCommand::parse("move bob 2 0").unwrap(),
            Some(ConsoleCommand::Move {
                player: "bob".to_string(),
                row: 2,
                col: 0,
            })
        );
        assert_eq!(ConsoleCommand::parse("exit").unwrap(), Some(ConsoleCommand::Quit));

        assert!(ConsoleCommand::parse("create alice duel many").is_err());
        assert!(ConsoleCommand::parse("move bob x 0").is_err());
        assert!(ConsoleCommand::parse("join alice").is_err());
        assert!(ConsoleCommand::parse("dance").is_err());
    }

    #[test]
    fn test_render_board() {
        let data = json!({ "cells": [["X", null, null], [null, "O", null], [null, null, null]] });
        assert_eq!(render_board(&data), "X . .\n. O .\n. . .\n");
        assert_eq!(render_board(&Value::Null), "");
    }

    #[tokio::test]
    async fn test_full_game_through_console() {
        let mut console = console().await;

        let created = run(&mut console, "create alice duel").await.unwrap();
        assert!(created.contains("[open]"));
        let lobby = console.service.list_public_lobbies()[0].id;
        let prefix = short_id(lobby);

        let joined = run(&mut console, &format!("join bob {prefix}")).await.unwrap();
        assert!(joined.contains("[full]"));
        assert!(joined.contains("players=alice,bob"));

        let denied = run(&mut console, &format!("start bob {prefix}")).await.unwrap_err();
        assert!(denied.starts_with("validation"));

        let started = run(&mut console, &format!("start alice {prefix}")).await.unwrap();
        assert!(started.contains("alice to move"));

        for line in ["move alice 0 0", "move bob 1 0", "move alice 0 1", "move bob 1 1"] {
            run(&mut console, line).await.unwrap();
        }
        let finished = run(&mut console, "move alice 0 2").await.unwrap();
        assert!(finished.starts_with("X X X\n"));
        assert!(finished.ends_with("🏆 alice wins"));

        let after = run(&mut console, "move bob 2 2").await.unwrap_err();
        assert!(after.contains("not playing"));
    }

    #[tokio::test]
    async fn test_unknown_lobby_reference() {
        let mut console = console().await;
        let error = run(&mut console, "join bob ffffffff").await.unwrap_err();
        assert!(error.contains("no lobby matches"));
    }
}
