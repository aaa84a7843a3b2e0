//! Wire protocol: request ids, outbound messages, replies and commands.
//!
//! One JSON object travels per WebSocket text frame.  Outbound objects carry a
//! `req` field stamped by the connection layer; replies echo it back.

pub mod codec;
pub mod command;
pub mod reply;
pub mod request_id;

pub use codec::{decode_frame, OutboundMessage, ProtocolError, COMMAND_FIELD, REQUEST_ID_FIELD};
pub use command::Command;
pub use reply::{RemoteError, Reply, ReplyStatus, RomList, ShaderCommit, ShaderContent, ShaderIds};
pub use request_id::{RequestId, RequestIdCounter};
