//! Sandbox bridge library.
//!
//! Routes an agent's shell tool calls into a remote execution pool and
//! replays the results locally. The binary in `main.rs` is a thin CLI over
//! these modules.

pub mod bridge;
pub mod commands;
pub mod hook;
pub mod transport;

pub use bridge::{
    ExecutionBridge, PreToolUse, ToolCall, ToolUseHooks, TurnCancel, TurnCancelHandle, turn_cancel,
};
pub use transport::{HttpPool, MockRemotePool, MockReply, RemotePool, TransportError};
