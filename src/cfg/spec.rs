// src/cfg/spec.rs

use serde::de::{Error as SerdeError, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::AliResult;
use crate::resolver::Mode;
use crate::tree::{CodeSnippet, Node, NodeId, Tree};

const fn default_backups() -> usize {
    5
}

fn default_entry_point() -> String {
    "ali".to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A shell startup file under management
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub path: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub preferred: bool,
}

/// A profile entry with its path expanded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileTarget {
    pub path: PathBuf,
    pub preferred: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub alias_only: bool,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default = "default_backups")]
    pub backups: usize,

    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<ProfileEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: false,
            alias_only: false,
            mode: Mode::default(),
            backups: default_backups(),
            entry_point: default_entry_point(),
            profiles: Vec::new(),
        }
    }
}

impl Settings {
    /// Profiles to synchronize, tilde-expanded against `home_dir`
    ///
    /// Without configured profiles `.bashrc` and `.zshrc` are managed and the
    /// one matching `shell` (the value of `$SHELL`) is preferred.
    pub fn profile_targets(&self, home_dir: &Path, shell: Option<&str>) -> Vec<ProfileTarget> {
        let home = home_dir.to_string_lossy().to_string();
        if self.profiles.is_empty() {
            let shell_name = shell
                .and_then(|s| Path::new(s).file_name())
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            return ["bash", "zsh"]
                .iter()
                .map(|name| ProfileTarget {
                    path: home_dir.join(format!(".{}rc", name)),
                    preferred: shell_name == *name,
                })
                .collect();
        }
        self.profiles
            .iter()
            .map(|entry| ProfileTarget {
                path: PathBuf::from(
                    shellexpand::tilde_with_context(&entry.path, || Some(home.as_str())).into_owned(),
                ),
                preferred: entry.preferred,
            })
            .collect()
    }

    /// Apply `ali config <key> <value>`
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let parse_bool = |v: &str| match v.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(format!("'{}' is not a boolean", v)),
        };
        match key {
            "verbose" => self.verbose = parse_bool(value)?,
            "alias_only" | "alias-only" => self.alias_only = parse_bool(value)?,
            "mode" => self.mode = value.parse()?,
            "backups" => {
                self.backups = value
                    .parse()
                    .map_err(|_| format!("'{}' is not a backup count", value))?
            }
            "entry_point" | "entry-point" => {
                if value.trim().is_empty() {
                    return Err("entry point cannot be empty".to_string());
                }
                self.entry_point = value.trim().to_string();
            }
            _ => return Err(format!("unknown setting '{}'", key)),
        }
        Ok(())
    }
}

/// Code as written in the manifest: a bare string is shell source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeSpec {
    Source(String),
    Full {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        source: String,
    },
}

impl From<CodeSpec> for CodeSnippet {
    fn from(spec: CodeSpec) -> Self {
        match spec {
            CodeSpec::Source(source) => CodeSnippet { lang: None, source },
            CodeSpec::Full { lang, source } => CodeSnippet { lang, source },
        }
    }
}

impl From<&CodeSnippet> for CodeSpec {
    fn from(code: &CodeSnippet) -> Self {
        match &code.lang {
            None => CodeSpec::Source(code.source.clone()),
            Some(lang) => CodeSpec::Full {
                lang: Some(lang.clone()),
                source: code.source.clone(),
            },
        }
    }
}

/// One command as stored in the manifest
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,

    #[serde(skip_serializing_if = "is_false")]
    pub alias_only: bool,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub substitutions: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, CommandSpec>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandFields {
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    code: Option<CodeSpec>,
    #[serde(default)]
    mode: Option<Mode>,
    #[serde(default)]
    alias_only: bool,
    #[serde(default)]
    substitutions: BTreeMap<String, String>,
    #[serde(default)]
    commands: BTreeMap<String, CommandSpec>,
}

impl<'de> Deserialize<'de> for CommandSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CommandVisitor;

        impl<'de> Visitor<'de> for CommandVisitor {
            type Value = CommandSpec;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a shell snippet string or a command map")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: SerdeError,
            {
                Ok(CommandSpec {
                    code: Some(CodeSpec::Source(value.to_string())),
                    ..CommandSpec::default()
                })
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: SerdeError,
            {
                Ok(CommandSpec::default())
            }

            fn visit_map<M>(self, map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let fields = CommandFields::deserialize(serde::de::value::MapAccessDeserializer::new(map))?;
                Ok(CommandSpec {
                    alias: fields.alias,
                    description: fields.description,
                    code: fields.code,
                    mode: fields.mode,
                    alias_only: fields.alias_only,
                    substitutions: fields.substitutions,
                    commands: fields.commands,
                })
            }
        }

        deserializer.deserialize_any(CommandVisitor)
    }
}

/// The manifest document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub commands: BTreeMap<String, CommandSpec>,
}

impl Manifest {
    pub fn into_tree(self) -> AliResult<Tree> {
        let mut tree = Tree::new(self.settings);
        for (name, spec) in self.commands {
            attach_spec(&mut tree, None, name, spec)?;
        }
        tree.mark_clean();
        Ok(tree)
    }

    pub fn from_tree(tree: &Tree) -> Self {
        let commands = tree
            .roots()
            .into_iter()
            .filter_map(|id| to_spec(tree, id))
            .collect();
        Self {
            settings: tree.settings.clone(),
            commands,
        }
    }
}

fn attach_spec(tree: &mut Tree, parent: Option<NodeId>, name: String, spec: CommandSpec) -> AliResult<()> {
    let mut node = Node::new(&name, spec.mode.unwrap_or(tree.settings.mode));
    if let Some(alias) = spec.alias.filter(|a| !a.trim().is_empty()) {
        node.alias = alias.trim().to_string();
    }
    node.description = spec.description;
    node.code = spec.code.map(CodeSnippet::from);
    node.alias_only = spec.alias_only;
    node.substitutions = spec.substitutions;

    let id = tree.attach(parent, node)?;
    for (child_name, child_spec) in spec.commands {
        attach_spec(tree, Some(id), child_name, child_spec)?;
    }
    Ok(())
}

fn to_spec(tree: &Tree, id: NodeId) -> Option<(String, CommandSpec)> {
    let node = tree.get(id)?;
    let commands = tree
        .sorted_children(Some(id))
        .into_iter()
        .filter_map(|child| to_spec(tree, child))
        .collect();
    let spec = CommandSpec {
        alias: (node.alias != node.name).then(|| node.alias.clone()),
        description: node.description.clone(),
        code: node.code.as_ref().map(CodeSpec::from),
        mode: (node.mode != tree.settings.mode).then_some(node.mode),
        alias_only: node.alias_only,
        substitutions: node.substitutions.clone(),
        commands,
    };
    Some((node.name.clone(), spec))
}
