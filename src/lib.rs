//! Moodlist - turn an uploaded image into a generated music playlist
//!
//! This library chains four external services: object storage (image
//! lookup), a multimodal inference provider (vibe extraction), and a
//! music-streaming provider (search, recommendations, playlist creation)
//! reached through its OAuth authorization-code flow.

pub mod auth;
pub mod error;
pub mod models;
pub mod music;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod storage;
pub mod vibe;
