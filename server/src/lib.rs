//! # Parade Game Server Library
//!
//! Authoritative server for the Parade card game. It accepts TCP
//! connections, performs the name handshake, keeps unassigned players in a
//! holding pool and runs any number of concurrent game lobbies, each of
//! which becomes its own session task once started.
//!
//! ## Architecture
//!
//! ### Single-writer registry
//! One dispatcher loop owns every piece of shared state: the holding pool,
//! the forming-lobby map and the routing table of running sessions. All
//! mutations arrive as messages on its inbound channel, so no locks guard
//! the registry by construction.
//!
//! ### One receive loop per connection
//! Each connection spawns a task that blocks on its socket and forwards
//! typed packets, in arrival order, to the dispatcher. The write half of
//! the socket travels with the `Connection` value, so whichever owner holds
//! it (pool, lobby or session) is the only possible sender.
//!
//! ### Session tasks
//! A started lobby becomes a [`session::GameSession`]: an async driver
//! around the synchronous [`engine::GameEngine`] state machine. The
//! session solicits one action at a time, which is what enforces turn
//! order; no game logic executes concurrently within one game.
//!
//! ## Module Organization
//!
//! - `config` — resolved startup settings injected at construction
//! - `connection` — handshake, receive loop and send path for one socket
//! - `engine` — dealing, parade placement, final round, discard and scoring
//! - `registry` — accept loop, holding pool, lobby operations and routing
//! - `session` — async turn driver for one running game

pub mod config;
pub mod connection;
pub mod engine;
pub mod registry;
pub mod session;
