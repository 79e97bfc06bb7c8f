//! # ml-2048
//!
//! A 2048-style sliding-tile merge agent that learns to play by blending
//! a hand-crafted heuristic lookahead search with a trainable value
//! network (DQN with experience replay and a target network), built on
//! the Burn ML framework.
//!
//! ## Modules
//!
//! - [`game`] — Board-transition engine (tilt, slide, merge, spawn) and
//!   the mutable game session
//! - [`ai`] — Heuristic scoring, lookahead search, state encoding, and
//!   the trainable value agent
//! - [`training`] — The training-loop actor, its channel protocol, the
//!   replay memory, and episode metrics
//! - [`checkpoint`] — Key-addressed model persistence
//! - [`config`] — TOML configuration loading and validation
//! - [`error`] — Structured error types

#![recursion_limit = "256"]

pub mod ai;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod game;
pub mod training;
