//! `replyscribe`: drafts email replies that sound like you.
//!
//! This crate provides the core library: collecting writing samples from a
//! mailbox, distilling them into a style profile with a generative model,
//! and filing style-matched draft replies to unread mail.

pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod store;

pub use error::{Result, ScribeError};
