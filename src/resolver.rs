//! Composes the shell command string for a node plus runtime arguments

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AliError, AliResult};
use crate::tree::{NodeId, Tree};

pub const SHELL_WRAPPER: &str = "sh -c";

/// How a node's fragment combines with its ancestors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Ancestor fragments followed by the node's own
    #[default]
    Concatenate,
    /// Like concatenate, but sequenced with `;` against the previous invocation
    Independent,
    /// Only the node's own fragment
    Exclusive,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Concatenate, Mode::Independent, Mode::Exclusive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Concatenate => "concatenate",
            Mode::Independent => "independent",
            Mode::Exclusive => "exclusive",
        }
    }

    /// Separator placed before an invocation in this mode when sequencing
    fn separator(&self) -> &'static str {
        match self {
            Mode::Independent => "; ",
            Mode::Concatenate | Mode::Exclusive => " && ",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown mode '{}' (expected concatenate, independent or exclusive)", s))
    }
}

/// Combine ancestor fragments (root first) with a node's own fragment
pub fn compose_fragment<S: AsRef<str>>(mode: Mode, ancestor_fragments: &[S], own_fragment: &str) -> String {
    let mut parts: Vec<&str> = match mode {
        Mode::Concatenate | Mode::Independent => ancestor_fragments.iter().map(AsRef::as_ref).collect(),
        Mode::Exclusive => Vec::new(),
    };
    parts.push(own_fragment);
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct Resolver<'a> {
    tree: &'a Tree,
    verbose: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a Tree, verbose: bool) -> Self {
        Self { tree, verbose }
    }

    fn lookup(&self, id: NodeId, arg: &str) -> Option<&'a str> {
        let tree = self.tree;
        tree.ancestors(id)
            .into_iter()
            .filter_map(|ancestor| tree.get(ancestor))
            .find_map(|node| node.substitutions.get(arg))
            .map(String::as_str)
    }

    /// Replacement for `arg` from the nearest scope that defines one
    pub fn substitute(&self, id: NodeId, arg: &str) -> String {
        self.lookup(id, arg).unwrap_or(arg).to_string()
    }

    /// The command for `id` and `args` without the shell wrapper
    pub fn compose<S: AsRef<str>>(&self, id: NodeId, args: &[S]) -> String {
        let chain = self.tree.ancestors(id);
        let Some(node) = chain.first().and_then(|leaf| self.tree.get(*leaf)) else {
            return String::new();
        };
        let ancestor_fragments: Vec<String> = chain
            .iter()
            .skip(1)
            .rev()
            .filter_map(|ancestor| self.tree.get(*ancestor).map(|n| n.fragment()))
            .collect();
        let base = compose_fragment(node.mode, &ancestor_fragments, &node.fragment());

        let mut parts = vec![base];
        parts.extend(args.iter().map(|arg| self.substitute(id, arg.as_ref())));
        parts.join(" ").trim().to_string()
    }

    pub fn resolve<S: AsRef<str>>(&self, id: NodeId, args: &[S]) -> String {
        let composed = self.compose(id, args);
        let resolved = format!("{} {}", SHELL_WRAPPER, composed).trim().to_string();
        self.log_resolution(id, &resolved);
        resolved
    }

    /// `sh -c` plus the composed command as one quoted word, ready for `eval`
    ///
    /// Arguments without a substitution are quoted on their own first, so
    /// `"a b"` reaches the command as a single argument. Replacements are
    /// shell text and stay unquoted.
    pub fn resolve_for_eval<S: AsRef<str>>(&self, id: NodeId, args: &[S]) -> AliResult<String> {
        let mut quoted = Vec::with_capacity(args.len());
        for arg in args {
            let arg = arg.as_ref();
            match self.lookup(id, arg) {
                Some(replacement) => quoted.push(replacement.to_string()),
                None => quoted.push(quote(id, self.tree, arg)?),
            }
        }
        let no_args: &[&str] = &[];
        let mut parts = vec![self.compose(id, no_args)];
        parts.extend(quoted);
        let command = parts.join(" ");
        let resolved = format!("{} {}", SHELL_WRAPPER, quote(id, self.tree, command.trim())?);
        self.log_resolution(id, &resolved);
        Ok(resolved)
    }

    /// Several invocations under a single shell wrapper
    ///
    /// Library API for callers chaining aliases; the CLI dispatches one
    /// invocation at a time through [`Resolver::resolve_for_eval`].
    pub fn resolve_sequence<S: AsRef<str>>(&self, invocations: &[(NodeId, Vec<S>)]) -> String {
        let mut sequence = String::new();
        for (id, args) in invocations {
            let composed = self.compose(*id, args.as_slice());
            if composed.is_empty() {
                continue;
            }
            if !sequence.is_empty() {
                let mode = self.tree.get(*id).map(|node| node.mode).unwrap_or_default();
                sequence.push_str(mode.separator());
            }
            sequence.push_str(&composed);
        }
        let resolved = format!("{} {}", SHELL_WRAPPER, sequence).trim().to_string();
        if let Some((id, _)) = invocations.last() {
            self.log_resolution(*id, &resolved);
        }
        resolved
    }

    fn log_resolution(&self, id: NodeId, resolved: &str) {
        if self.verbose {
            info!("resolved {} -> {}", self.tree.key_path(id), resolved);
        } else {
            debug!("resolved {} -> {}", self.tree.key_path(id), resolved);
        }
    }
}

fn quote(id: NodeId, tree: &Tree, text: &str) -> AliResult<String> {
    shlex::try_quote(text)
        .map(|quoted| quoted.into_owned())
        .map_err(|_| AliError::InvalidPath {
            path: tree.key_path(id),
            reason: "command contains a NUL byte and cannot be quoted".to_string(),
        })
}
