//! Email-to-entity linking with human review.
//!
//! Inbound studio email is scanned for evidence (project codes, client
//! names, known contacts, dollar amounts), scored against the proposal and
//! project roster, and surfaced as confidence-ranked suggestions. Nothing
//! links automatically: a reviewer approves or denies each suggestion, an
//! approval creates the durable link, and every decision feeds back into
//! future scoring.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod extract;
pub mod feedback;
pub mod matcher;
mod migrations;
pub mod pipeline;
pub mod review;
pub mod suggestion;
pub mod writer;
