//! Typed direct commands and their frame encodings.

use std::fmt;
use std::path::PathBuf;

use fluffd_devices::WriteChannel;
use serde::{Deserialize, Serialize};

use crate::error::{CommandError, Result};
use crate::params::{to_byte, Params};

/// Highest name index the firmware accepts for `set_name`.
pub const MAX_NAME_INDEX: u8 = 128;

/// Every directly executable command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Antenna,
    Debug,
    Lcd,
    Action,
    SetName,
    CustomCommand,
    SetIdle,
    MoodMeter,
    NordicCustom,
    NordicPacketAck,
    DlcDelete,
    DlcLoad,
    DlcActivate,
    DlcDeactivate,
    FlashDlc,
}

impl CommandKind {
    pub const ALL: [CommandKind; 15] = [
        Self::Antenna,
        Self::Debug,
        Self::Lcd,
        Self::Action,
        Self::SetName,
        Self::CustomCommand,
        Self::SetIdle,
        Self::MoodMeter,
        Self::NordicCustom,
        Self::NordicPacketAck,
        Self::DlcDelete,
        Self::FlashDlc,
        Self::DlcLoad,
        Self::DlcActivate,
        Self::DlcDeactivate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Antenna => "antenna",
            Self::Debug => "debug",
            Self::Lcd => "lcd",
            Self::Action => "action",
            Self::SetName => "set_name",
            Self::CustomCommand => "custom_command",
            Self::SetIdle => "set_idle",
            Self::MoodMeter => "mood_meter",
            Self::NordicCustom => "nordic_custom",
            Self::NordicPacketAck => "nordic_packet_ack",
            Self::DlcDelete => "dlc_delete",
            Self::DlcLoad => "dlc_load",
            Self::DlcActivate => "dlc_activate",
            Self::DlcDeactivate => "dlc_deactivate",
            Self::FlashDlc => "flash_dlc",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One write on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: WriteChannel,
    pub bytes: Vec<u8>,
}

impl Frame {
    pub fn control(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: WriteChannel::Control,
            bytes: bytes.into(),
        }
    }

    pub fn secondary(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: WriteChannel::Secondary,
            bytes: bytes.into(),
        }
    }
}

/// Validated command ready to run against a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectCommand {
    Antenna { red: u8, green: u8, blue: u8 },
    Debug,
    Lcd { state: u8 },
    Action { input: u8, index: u8, subindex: u8, specific: u8 },
    SetName { name: u8 },
    Custom { bytes: Vec<u8> },
    SetIdle { enabled: bool },
    MoodMeter { action: u8, kind: u8, value: u8 },
    NordicCustom { bytes: Vec<u8> },
    NordicPacketAck { enabled: bool },
    DlcDelete { slot: u8 },
    DlcLoad { slot: u8 },
    DlcActivate,
    DlcDeactivate { slot: u8 },
    FlashDlc { filename: String, path: PathBuf },
}

/// What running a command does to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Sequential writes, in order.
    Write(Vec<Frame>),
    /// Start (`true`) or stop the idle loop.
    Idle(bool),
    /// File transfer to the device.
    Flash { filename: String, path: PathBuf },
}

fn slot(params: &Params) -> Result<u8> {
    let raw = params.require_int("slot")?;
    to_byte("slot", raw)
}

fn flag(params: &Params, name: &str) -> Result<bool> {
    match params.require_int(name)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CommandError::validation(format!(
            "'{}' must be 0 or 1, got {}",
            name, other
        ))),
    }
}

impl DirectCommand {
    /// Decode and validate `params` for `kind`.
    pub fn parse(kind: CommandKind, params: &Params) -> Result<Self> {
        let command = match kind {
            CommandKind::Antenna => Self::Antenna {
                red: params.byte("red")?,
                green: params.byte("green")?,
                blue: params.byte("blue")?,
            },
            CommandKind::Debug => Self::Debug,
            CommandKind::Lcd => Self::Lcd {
                state: params.byte("state")?,
            },
            CommandKind::Action => Self::Action {
                input: params.byte("input")?,
                index: params.byte("index")?,
                subindex: params.byte("subindex")?,
                specific: params.byte("specific")?,
            },
            CommandKind::SetName => {
                let name = params.int_or("name", 0)?;
                if !(0..=i64::from(MAX_NAME_INDEX)).contains(&name) {
                    return Err(CommandError::validation(format!(
                        "'name' must be between 0 and {}, got {}",
                        MAX_NAME_INDEX, name
                    )));
                }
                Self::SetName { name: name as u8 }
            }
            CommandKind::CustomCommand => Self::Custom {
                bytes: params.hex_bytes("cmd")?,
            },
            CommandKind::SetIdle => Self::SetIdle {
                enabled: flag(params, "idle")?,
            },
            CommandKind::MoodMeter => Self::MoodMeter {
                action: params.byte("action")?,
                kind: params.byte("type")?,
                value: params.byte("value")?,
            },
            CommandKind::NordicCustom => Self::NordicCustom {
                bytes: params.hex_bytes("cmd")?,
            },
            CommandKind::NordicPacketAck => Self::NordicPacketAck {
                enabled: flag(params, "state")?,
            },
            CommandKind::DlcDelete => Self::DlcDelete { slot: slot(params)? },
            CommandKind::DlcLoad => Self::DlcLoad { slot: slot(params)? },
            CommandKind::DlcActivate => Self::DlcActivate,
            CommandKind::DlcDeactivate => Self::DlcDeactivate { slot: slot(params)? },
            CommandKind::FlashDlc => Self::FlashDlc {
                filename: params.require_text("filename")?.to_string(),
                path: PathBuf::from(params.require_text("dlcfile_path")?),
            },
        };
        Ok(command)
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Antenna { .. } => CommandKind::Antenna,
            Self::Debug => CommandKind::Debug,
            Self::Lcd { .. } => CommandKind::Lcd,
            Self::Action { .. } => CommandKind::Action,
            Self::SetName { .. } => CommandKind::SetName,
            Self::Custom { .. } => CommandKind::CustomCommand,
            Self::SetIdle { .. } => CommandKind::SetIdle,
            Self::MoodMeter { .. } => CommandKind::MoodMeter,
            Self::NordicCustom { .. } => CommandKind::NordicCustom,
            Self::NordicPacketAck { .. } => CommandKind::NordicPacketAck,
            Self::DlcDelete { .. } => CommandKind::DlcDelete,
            Self::DlcLoad { .. } => CommandKind::DlcLoad,
            Self::DlcActivate => CommandKind::DlcActivate,
            Self::DlcDeactivate { .. } => CommandKind::DlcDeactivate,
            Self::FlashDlc { .. } => CommandKind::FlashDlc,
        }
    }

    pub fn into_effect(self) -> Effect {
        match self {
            Self::Antenna { red, green, blue } => {
                Effect::Write(vec![Frame::control([0x14, red, green, blue])])
            }
            Self::Debug => Effect::Write(vec![Frame::control([0xDB])]),
            Self::Lcd { state } => Effect::Write(vec![Frame::control([0xCD, state])]),
            Self::Action {
                input,
                index,
                subindex,
                specific,
            } => Effect::Write(vec![Frame::control([
                0x13, 0x00, input, index, subindex, specific,
            ])]),
            // Set the name, then play the announcement for it.
            Self::SetName { name } => Effect::Write(vec![
                Frame::control([0x21, name]),
                Frame::control([0x13, 0x00, 0x21, 0x00, 0x00, name]),
            ]),
            Self::Custom { bytes } => Effect::Write(vec![Frame::control(bytes)]),
            Self::SetIdle { enabled } => Effect::Idle(enabled),
            Self::MoodMeter {
                action,
                kind,
                value,
            } => Effect::Write(vec![Frame::control([0x23, action, kind, value])]),
            Self::NordicCustom { bytes } => Effect::Write(vec![Frame::secondary(bytes)]),
            Self::NordicPacketAck { enabled } => {
                Effect::Write(vec![Frame::secondary([0x09, u8::from(enabled), 0x00])])
            }
            Self::DlcDelete { slot } => Effect::Write(vec![Frame::control([0x74, slot])]),
            Self::DlcLoad { slot } => Effect::Write(vec![Frame::control([0x60, slot])]),
            Self::DlcActivate => Effect::Write(vec![Frame::control([0x61])]),
            Self::DlcDeactivate { slot } => Effect::Write(vec![Frame::control([0x62, slot])]),
            Self::FlashDlc { filename, path } => Effect::Flash { filename, path },
        }
    }
}
