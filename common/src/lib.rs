//! Types and framing shared between the lobby server and its clients.

pub mod gamestate_common;
pub mod messages_common;
pub mod network_common;
pub mod settings_common;
