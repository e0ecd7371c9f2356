//! # Parade Console Client
//!
//! Thin interactive client for the Parade server: one TCP connection, a
//! `tokio::select!` pump over console input and inbound packets, and a
//! narrow console-rendering layer. All rules live on the server; the client
//! only tracks its own hand.

pub mod console;
pub mod network;
