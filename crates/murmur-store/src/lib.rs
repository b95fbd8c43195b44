//! # murmur-store
//!
//! Relational storage for murmur, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for users, friend
//! groups, friendships, notifications, chat groups and the message log.
//! Multi-row state changes go through [`Database::transaction`].

pub mod database;
pub mod friend_groups;
pub mod friendships;
pub mod groups;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
