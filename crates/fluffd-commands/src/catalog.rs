//! Built-in command catalog.

use crate::command::CommandKind;
use crate::params::Params;
use crate::registry::{Category, Command, CommandRegistry, CommandSpec, ParamSchema, Shortcut};

/// Category holding the preprogrammed move / talk buttons.
pub const OTHER_CATEGORY: &str = "other";

fn spec<const N: usize>(
    kind: CommandKind,
    label: &str,
    description: &str,
    params: [(&str, &str); N],
) -> Command {
    Command::Direct(CommandSpec {
        kind,
        label: label.to_string(),
        description: description.to_string(),
        params: ParamSchema::new(params),
    })
}

fn shortcut(name: &str, label: &str, target: CommandKind, params: Params) -> (String, Shortcut) {
    (
        name.to_string(),
        Shortcut {
            label: label.to_string(),
            target: target.name().to_string(),
            params,
        },
    )
}

fn antenna(red: u8, green: u8, blue: u8) -> Params {
    Params::new()
        .with("red", red)
        .with("blue", blue)
        .with("green", green)
}

fn action(input: u8, index: u8, subindex: u8, specific: u8) -> Params {
    Params::new()
        .with("input", input)
        .with("index", index)
        .with("subindex", subindex)
        .with("specific", specific)
}

fn spec_for(kind: CommandKind) -> Command {
    match kind {
        CommandKind::Antenna => spec(
            kind,
            "Antenna Color",
            "Set Antenna Color",
            [
                ("red", "Brightness of red antenna LED (0-255)"),
                ("green", "Brightness of green antenna LED (0-255)"),
                ("blue", "Brightness of blue antenna LED (0-255)"),
            ],
        ),
        CommandKind::Debug => spec(
            kind,
            "Debug Screen",
            "Cycle through LCD eye debug menus",
            [],
        ),
        CommandKind::Lcd => spec(
            kind,
            "LCD Light",
            "Set LCD Eyes Background Light",
            [("state", "0 for off, 1 for on")],
        ),
        CommandKind::Action => spec(
            kind,
            "Furby Action",
            "Furby move / talk action",
            [
                ("input", "Where to find the action (integer)"),
                ("index", "Index of actions (integer)"),
                ("subindex", "Subindex of action (integer)"),
                ("specific", "Specific action (integer)"),
            ],
        ),
        CommandKind::SetName => spec(
            kind,
            "Set Name",
            "Set new Name and announce it",
            [("name", "New name, value from 0-128 (integer)")],
        ),
        CommandKind::CustomCommand => spec(
            kind,
            "Custom Command",
            "Send arbitrary command to GeneralPlus",
            [("cmd", "Command in hexadecimal format (string)")],
        ),
        CommandKind::SetIdle => spec(
            kind,
            "Set Idle Mode",
            "Enable or disable keeping Furby quiet",
            [("idle", "1 = keep quiet (idle), 0 = don't idle (integer)")],
        ),
        CommandKind::MoodMeter => spec(
            kind,
            "Set Mood Meter",
            "Set Moodmeter value",
            [
                ("action", "1 = set value, 0 = increase value (integer)"),
                (
                    "type",
                    "0 = Excited, 1 = Displeased, 2 = Tired, 3 = Fullness, 4 = Wellness (integer)",
                ),
                ("value", "New value (action 1) or delta (action 0) (integer)"),
            ],
        ),
        CommandKind::NordicCustom => spec(
            kind,
            "Nordic Custom Command",
            "Send arbitrary command to Nordic",
            [("cmd", "Command in hexadecimal format (string)")],
        ),
        CommandKind::NordicPacketAck => spec(
            kind,
            "Nordic Packet ACK",
            "Enable / disable nordic packet ACK messages for file writing",
            [("state", "0 for off, 1 for on (integer)")],
        ),
        CommandKind::DlcDelete => spec(
            kind,
            "Delete DLC",
            "Delete DLC from slot with ID",
            [("slot", "Slot to be deleted (integer, 0-255)")],
        ),
        CommandKind::FlashDlc => spec(
            kind,
            "Flash DLC",
            "Flash DLC file to slot on Furby",
            [
                ("filename", "DLC filename (e.g., TU003410.DLC) (string)"),
                ("dlcfile_path", "Path to DLC file on server (string)"),
            ],
        ),
        CommandKind::DlcLoad => spec(
            kind,
            "Load DLC",
            "Load DLC for activation",
            [("slot", "DLC slot to be loaded (integer, 0-255)")],
        ),
        CommandKind::DlcActivate => spec(
            kind,
            "Activate DLC",
            "Activate loaded DLC - use after 'Load DLC'",
            [],
        ),
        CommandKind::DlcDeactivate => spec(
            kind,
            "Deactivate DLC",
            "Deactivate DLC slot without deleting it",
            [("slot", "DLC slot to be deactivated (integer, 0-255)")],
        ),
    }
}

fn other_category() -> Command {
    Command::Category(Category {
        name: OTHER_CATEGORY.to_string(),
        label: "Preprogrammed Actions".to_string(),
        description: "Furby move / talk buttons".to_string(),
        shortcuts: vec![
            shortcut("giggle", "Giggle", CommandKind::Action, action(55, 2, 14, 0)),
            shortcut("puke", "Puke", CommandKind::Action, action(56, 3, 15, 1)),
            shortcut(
                "say_example_name",
                "Say a Name (Example)",
                CommandKind::SetName,
                Params::new().with("name", 3),
            ),
            shortcut("antennaoff", "Turn Antenna LED Off", CommandKind::Antenna, antenna(0, 0, 0)),
            shortcut("antennared", "Antenna LED Red", CommandKind::Antenna, antenna(255, 0, 0)),
            shortcut("antennablue", "Antenna LED Blue", CommandKind::Antenna, antenna(0, 0, 255)),
            shortcut("antennagreen", "Antenna LED Green", CommandKind::Antenna, antenna(0, 255, 0)),
        ],
    })
}

impl CommandRegistry {
    /// Registry with every built-in command and the `other` category.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in CommandKind::ALL {
            registry.register(spec_for(kind));
        }
        registry.register(other_category());
        registry
    }
}
