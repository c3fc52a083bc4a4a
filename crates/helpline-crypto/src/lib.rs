/// Helpline Crypto Library
///
/// Message bodies are encrypted at rest with AES-256-GCM under a single
/// process-wide key constructed once at startup and passed explicitly into
/// the chat engine. No key rotation — a documented limitation, not a goal.

pub mod codec;
pub mod keys;

pub use codec::{Codec, CodecError};
