//! Core data model: samples, style profiles, messages and addresses.

pub mod address;
pub mod message;
pub mod profile;
pub mod sample;
