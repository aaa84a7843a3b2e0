//! Typed command vocabulary understood by the wall.
//!
//! The connection layer never looks at `cmd`; it stamps a `req` field on any
//! JSON object and moves on.  This enum exists so callers get compile-time
//! checked field names instead of hand-built maps.
//!
//! # Serde representation
//!
//! `tag = "cmd"` puts the variant name into the `cmd` field and flattens the
//! variant's fields next to it:
//!
//! ```json
//! {"cmd":"emulator input","key":"start","press":true}
//! {"cmd":"video play","url":"https://example.org/clip.mp4"}
//! {"cmd":"shader list"}
//! ```

use serde::{Deserialize, Serialize};

use crate::keymap::EmulatorKey;
use crate::protocol::codec::{OutboundMessage, ProtocolError};

/// Every command the wall's control server accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Stores a new shader; replies with its id and commit.
    #[serde(rename = "shader create")]
    ShaderCreate {
        title: String,
        description: String,
        source: String,
    },

    /// Fetches a shader's title, description, source and commit.
    #[serde(rename = "shader read")]
    ShaderRead { id: String },

    /// Updates an existing shader on top of `commit`.
    #[serde(rename = "shader write")]
    ShaderWrite {
        id: String,
        commit: String,
        title: String,
        description: String,
        source: String,
    },

    /// Lists stored shader ids.
    #[serde(rename = "shader list")]
    ShaderList,

    /// Deletes a stored shader.
    #[serde(rename = "shader remove")]
    ShaderRemove { id: String },

    /// Shows a stored shader on the wall.
    #[serde(rename = "shader activate")]
    ShaderActivate { id: String },

    /// Presses or releases one emulator button.
    #[serde(rename = "emulator input")]
    EmulatorInput { key: EmulatorKey, press: bool },

    /// Boots a ROM from the wall's ROM directory.
    #[serde(rename = "emulator start")]
    EmulatorStart { rom: String },

    /// Lists available ROM file names.
    #[serde(rename = "emulator list")]
    EmulatorList,

    /// Stops the emulator.
    #[serde(rename = "emulator turnoff")]
    EmulatorTurnOff,

    /// Blanks the wall, whatever it is showing.
    #[serde(rename = "turnoff")]
    TurnOff,

    /// Plays a video from a URL.
    #[serde(rename = "video play")]
    VideoPlay { url: String },

    /// Renders a block of text.
    #[serde(rename = "show poetry")]
    ShowPoetry { text: String },

    /// Starts the Tox chat display.
    #[serde(rename = "tox start")]
    ToxStart,

    /// Pushes a line of text to the Tox chat display.
    #[serde(rename = "tox message")]
    ToxMessage { text: String },
}

impl Command {
    /// The wire name placed in the `cmd` field.
    pub fn name(&self) -> &'static str {
        match self {
            Command::ShaderCreate { .. } => "shader create",
            Command::ShaderRead { .. } => "shader read",
            Command::ShaderWrite { .. } => "shader write",
            Command::ShaderList => "shader list",
            Command::ShaderRemove { .. } => "shader remove",
            Command::ShaderActivate { .. } => "shader activate",
            Command::EmulatorInput { .. } => "emulator input",
            Command::EmulatorStart { .. } => "emulator start",
            Command::EmulatorList => "emulator list",
            Command::EmulatorTurnOff => "emulator turnoff",
            Command::TurnOff => "turnoff",
            Command::VideoPlay { .. } => "video play",
            Command::ShowPoetry { .. } => "show poetry",
            Command::ToxStart => "tox start",
            Command::ToxMessage { .. } => "tox message",
        }
    }

    /// Converts the command into an outbound message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] only if serde fails, which cannot happen for
    /// the string and boolean fields used here.
    pub fn into_message(self) -> Result<OutboundMessage, ProtocolError> {
        OutboundMessage::from_serialize(&self)
    }
}

impl TryFrom<Command> for OutboundMessage {
    type Error = ProtocolError;

    fn try_from(command: Command) -> Result<Self, Self::Error> {
        command.into_message()
    }
}
