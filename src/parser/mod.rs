//! Email parsing: turning raw RFC 5322 bytes and sample files into text.

pub mod mime;
