//! Command registry.
//!
//! Names map either to a direct command or to a category of shortcuts. A
//! shortcut is `category/button` and expands to one direct command with fixed
//! parameters. Resolution goes at most one level deep.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::command::CommandKind;
use crate::error::{CommandError, Result};
use crate::params::Params;

/// Ordered `name -> description` parameter schema.
#[derive(Debug, Clone, Default)]
pub struct ParamSchema(Vec<(String, String)>);

impl ParamSchema {
    pub fn new<I, N, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(n, d)| (n.into(), d.into()))
                .collect(),
        )
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }
}

impl Serialize for ParamSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(n, d)| (n, d)))
    }
}

/// A directly executable command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub kind: CommandKind,
    pub label: String,
    pub description: String,
    pub params: ParamSchema,
}

/// A named alias for a direct command with fixed parameters.
#[derive(Debug, Clone, Serialize)]
pub struct Shortcut {
    #[serde(rename = "readable")]
    pub label: String,
    #[serde(rename = "cmd")]
    pub target: String,
    pub params: Params,
}

/// A group of shortcuts. Not executable by itself.
#[derive(Debug, Clone)]
pub struct Category {
    pub name: String,
    pub label: String,
    pub description: String,
    pub shortcuts: Vec<(String, Shortcut)>,
}

impl Category {
    pub fn shortcut(&self, name: &str) -> Option<&Shortcut> {
        self.shortcuts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }
}

/// Registry entry.
#[derive(Debug, Clone)]
pub enum Command {
    Direct(CommandSpec),
    Category(Category),
}

impl Command {
    pub fn name(&self) -> &str {
        match self {
            Self::Direct(spec) => spec.kind.name(),
            Self::Category(category) => &category.name,
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Direct(spec) => {
                let mut s = serializer.serialize_struct("Command", 3)?;
                s.serialize_field("readable", &spec.label)?;
                s.serialize_field("description", &spec.description)?;
                s.serialize_field("params", &spec.params)?;
                s.end()
            }
            Self::Category(category) => {
                let mut s = serializer.serialize_struct("Category", 3)?;
                s.serialize_field("readable", &category.label)?;
                s.serialize_field("description", &category.description)?;
                s.serialize_field("buttons", &ShortcutTable(&category.shortcuts))?;
                s.end()
            }
        }
    }
}

struct ShortcutTable<'a>(&'a [(String, Shortcut)]);

impl Serialize for ShortcutTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, shortcut) in self.0 {
            map.serialize_entry(name, shortcut)?;
        }
        map.end()
    }
}

/// A name resolved to something runnable.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    pub kind: CommandKind,
    pub params: Cow<'a, Params>,
    /// Set when the name was a `category/button` shortcut.
    pub via_shortcut: bool,
}

/// Catalog of commands and categories, in registration order.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    entries: Vec<Command>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn register(&mut self, command: Command) {
        let name = command.name().to_string();
        match self.index.get(&name) {
            Some(&i) => self.entries[i] = command,
            None => {
                self.index.insert(name, self.entries.len());
                self.entries.push(command);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.entries.iter()
    }

    /// Resolve `name` to a direct command and the parameters to run it with.
    ///
    /// Shortcut parameters replace the caller's entirely.
    pub fn resolve<'a>(&'a self, name: &str, params: &'a Params) -> Result<Resolved<'a>> {
        match self.get(name) {
            Some(Command::Direct(spec)) => {
                return Ok(Resolved {
                    kind: spec.kind,
                    params: Cow::Borrowed(params),
                    via_shortcut: false,
                })
            }
            Some(Command::Category(_)) => return Err(CommandError::NotExecutable(name.to_string())),
            None => {}
        }

        let (category_name, button) = name
            .split_once('/')
            .filter(|(_, button)| !button.contains('/'))
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

        let Some(Command::Category(category)) = self.get(category_name) else {
            return Err(CommandError::UnknownCommand(name.to_string()));
        };
        let shortcut = category
            .shortcut(button)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

        match self.get(&shortcut.target) {
            Some(Command::Direct(spec)) => Ok(Resolved {
                kind: spec.kind,
                params: Cow::Borrowed(&shortcut.params),
                via_shortcut: true,
            }),
            _ => Err(CommandError::BadShortcut(name.to_string())),
        }
    }
}

impl Serialize for CommandRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|c| (c.name(), c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register(Command::Direct(CommandSpec {
            kind: CommandKind::Antenna,
            label: "Antenna Color".into(),
            description: "Set Antenna Color".into(),
            params: ParamSchema::new([("red", "r"), ("green", "g"), ("blue", "b")]),
        }));
        registry.register(Command::Category(Category {
            name: "lights".into(),
            label: "Lights".into(),
            description: "Light presets".into(),
            shortcuts: vec![
                (
                    "red".into(),
                    Shortcut {
                        label: "Red".into(),
                        target: "antenna".into(),
                        params: Params::new().with("red", 255),
                    },
                ),
                (
                    "loop".into(),
                    Shortcut {
                        label: "Loop".into(),
                        target: "lights".into(),
                        params: Params::new(),
                    },
                ),
            ],
        }));
        registry
    }

    #[test]
    fn test_resolve_direct_keeps_caller_params() {
        let registry = small_registry();
        let params = Params::new().with("blue", 9);
        let resolved = registry.resolve("antenna", &params).unwrap();
        assert_eq!(resolved.kind, CommandKind::Antenna);
        assert_eq!(resolved.params.as_ref(), &params);
        assert!(!resolved.via_shortcut);
    }

    #[test]
    fn test_resolve_shortcut_ignores_caller_params() {
        let registry = small_registry();
        let params = Params::new().with("blue", 9);
        let resolved = registry.resolve("lights/red", &params).unwrap();
        assert_eq!(resolved.kind, CommandKind::Antenna);
        assert_eq!(resolved.params.as_ref(), &Params::new().with("red", 255));
        assert!(resolved.via_shortcut);
    }

    #[test]
    fn test_category_not_executable() {
        let registry = small_registry();
        let err = registry.resolve("lights", &Params::new()).unwrap_err();
        assert!(matches!(err, CommandError::NotExecutable(_)));
    }

    #[test]
    fn test_cyclic_shortcut_rejected() {
        let registry = small_registry();
        let err = registry.resolve("lights/loop", &Params::new()).unwrap_err();
        assert!(matches!(err, CommandError::BadShortcut(_)));
    }

    #[test]
    fn test_unknown_names() {
        let registry = small_registry();
        for name in ["nope", "lights/nope", "nope/red", "lights/red/extra", "antenna/red"] {
            let err = registry.resolve(name, &Params::new()).unwrap_err();
            assert!(matches!(err, CommandError::UnknownCommand(_)), "{}", name);
        }
    }

    #[test]
    fn test_serialized_shape() {
        let registry = small_registry();
        let json = serde_json::to_value(&registry).unwrap();
        assert_eq!(json["antenna"]["readable"], "Antenna Color");
        assert_eq!(json["antenna"]["params"]["red"], "r");
        assert_eq!(json["lights"]["buttons"]["red"]["cmd"], "antenna");
        assert_eq!(json["lights"]["buttons"]["red"]["params"]["red"], 255);
        assert!(json["lights"].get("params").is_none());
    }
}
