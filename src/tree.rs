//! The command tree
//!
//! Every node lives in a single arena owned by [`Tree`]; parent and child links
//! are [`NodeId`] keys into that arena, so detaching a subtree is just removing
//! its keys. Ids are never reused, a stale id simply stops resolving.

use log::{debug, warn};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

use crate::cfg::spec::Settings;
use crate::error::{AliError, AliResult};
use crate::keypath;
use crate::resolver::Mode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// A code snippet run in place of the node's name
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeSnippet {
    pub lang: Option<String>,
    pub source: String,
}

impl CodeSnippet {
    pub fn shell(source: &str) -> Self {
        Self {
            lang: None,
            source: source.to_string(),
        }
    }

    /// The snippet as a single shell command
    ///
    /// Shell sources are emitted verbatim; other languages are handed to their
    /// interpreter with the source quoted as one argument.
    pub fn to_command(&self) -> String {
        let lang = self.lang.as_deref().map(str::trim).unwrap_or_default();
        let (interpreter, flag) = match lang {
            "" | "sh" | "bash" | "zsh" | "shell" => return self.source.trim().to_string(),
            "python" | "python3" | "py" => ("python3", Some("-c")),
            "node" | "js" | "javascript" => ("node", Some("-e")),
            "ruby" | "rb" => ("ruby", Some("-e")),
            "perl" | "pl" => ("perl", Some("-e")),
            other => (other, None),
        };
        let quoted = shlex::try_quote(&self.source)
            .map(|q| q.into_owned())
            .unwrap_or_else(|_| format!("'{}'", self.source.replace('\'', r"'\''").replace('\0', "")));
        match flag {
            Some(flag) => format!("{interpreter} {flag} {quoted}"),
            None => format!("{interpreter} {quoted}"),
        }
    }
}

/// Caller supplied fields for [`Tree::add_command`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fields {
    /// Empty means "same as the name"
    pub alias: String,
    pub description: String,
    pub code: Option<CodeSnippet>,
    /// `None` falls back to the tree's default mode
    pub mode: Option<Mode>,
    pub alias_only: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub alias: String,
    pub description: String,
    pub code: Option<CodeSnippet>,
    pub mode: Mode,
    pub alias_only: bool,
    pub children: BTreeMap<String, NodeId>,
    pub substitutions: BTreeMap<String, String>,
    pub parent: Option<NodeId>,
}

impl Node {
    pub fn new(name: &str, mode: Mode) -> Self {
        Self {
            name: name.to_string(),
            alias: name.to_string(),
            description: String::new(),
            code: None,
            mode,
            alias_only: false,
            children: BTreeMap::new(),
            substitutions: BTreeMap::new(),
            parent: None,
        }
    }

    /// What this node contributes to a composed command
    pub fn fragment(&self) -> String {
        match &self.code {
            Some(code) if !code.source.trim().is_empty() => code.to_command(),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    pub settings: Settings,
    nodes: HashMap<NodeId, Node>,
    roots: BTreeMap<String, NodeId>,
    next_id: u64,
    dirty: bool,
}

fn alias_pattern() -> Option<Regex> {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_+-]*$").ok()
}

fn check_alias(path: &str, alias: &str) -> AliResult<()> {
    let valid = alias_pattern().map(|re| re.is_match(alias)).unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(AliError::InvalidPath {
            path: path.to_string(),
            reason: format!("alias '{}' must be letters, digits, '_', '+' or '-'", alias),
        })
    }
}

fn check_name(path: &str, name: &str) -> AliResult<()> {
    if name.chars().any(char::is_whitespace) {
        return Err(AliError::InvalidPath {
            path: path.to_string(),
            reason: format!("segment '{}' contains whitespace", name),
        });
    }
    Ok(())
}

impl Tree {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// True once any mutation happened since the last [`Tree::mark_clean`]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn scope(&self, parent: Option<NodeId>) -> Option<&BTreeMap<String, NodeId>> {
        match parent {
            None => Some(&self.roots),
            Some(id) => self.nodes.get(&id).map(|node| &node.children),
        }
    }

    fn scope_mut(&mut self, parent: Option<NodeId>) -> Option<&mut BTreeMap<String, NodeId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(id) => self.nodes.get_mut(&id).map(|node| &mut node.children),
        }
    }

    /// Child of `parent` (or top-level node) matching `segment` by name, then by alias
    pub fn child(&self, parent: Option<NodeId>, segment: &str) -> Option<NodeId> {
        let scope = self.scope(parent)?;
        if let Some(id) = scope.get(segment) {
            return Some(*id);
        }
        scope
            .values()
            .copied()
            .find(|id| self.nodes.get(id).is_some_and(|node| node.alias == segment))
    }

    /// Ids in `parent`'s scope ordered by alias, then name
    pub fn sorted_children(&self, parent: Option<NodeId>) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .scope(parent)
            .map(|scope| scope.values().copied().collect())
            .unwrap_or_default();
        ids.sort_by(|a, b| {
            let (a, b) = (&self.nodes[a], &self.nodes[b]);
            a.alias.cmp(&b.alias).then_with(|| a.name.cmp(&b.name))
        });
        ids
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.sorted_children(None)
    }

    /// `id` followed by each of its ancestors, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            match self.nodes.get(&cur) {
                Some(node) => {
                    chain.push(cur);
                    current = node.parent;
                }
                None => break,
            }
        }
        chain
    }

    pub fn key_path(&self, id: NodeId) -> String {
        let names: Vec<&str> = self
            .ancestors(id)
            .iter()
            .rev()
            .filter_map(|id| self.nodes.get(id).map(|node| node.name.as_str()))
            .collect();
        keypath::join(&names)
    }

    pub fn find(&self, path: &str) -> Option<NodeId> {
        let segments = keypath::split(path);
        if segments.is_empty() {
            return None;
        }
        let mut current: Option<NodeId> = None;
        for segment in &segments {
            current = Some(self.child(current, segment)?);
        }
        current
    }

    /// Longest prefix of `path` that resolves to a node, or "" when none does
    pub fn shortest_key_path(&self, path: &str) -> String {
        let count = keypath::split(path).len();
        for dropped in 0..count {
            let prefix = keypath::drop_last(path, dropped);
            if self.find(&prefix).is_some() {
                return prefix;
            }
        }
        String::new()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    /// Attach `node` under `parent` (or at top level), replacing nothing
    pub(crate) fn insert_node(&mut self, parent: Option<NodeId>, mut node: Node) -> AliResult<NodeId> {
        node.parent = parent;
        node.children.clear();
        let name = node.name.clone();
        let id = self.alloc(node);
        match self.scope_mut(parent) {
            Some(scope) => {
                scope.insert(name, id);
            }
            None => {
                self.nodes.remove(&id);
                return Err(AliError::NotFound {
                    path: name,
                    what: "Parent node".to_string(),
                });
            }
        }
        self.dirty = true;
        Ok(id)
    }

    /// Sibling names and aliases share one namespace within a scope
    fn ensure_alias_free(&self, parent: Option<NodeId>, owner: Option<NodeId>, alias: &str) -> AliResult<()> {
        let Some(scope) = self.scope(parent) else {
            return Ok(());
        };
        let taken_by = scope.values().copied().find(|id| {
            Some(*id) != owner
                && self
                    .nodes
                    .get(id)
                    .is_some_and(|node| node.alias == alias || node.name == alias)
        });
        match taken_by {
            Some(other) => Err(AliError::DuplicateAlias {
                alias: alias.to_string(),
                owner: self.key_path(other),
                scope: parent.map(|p| self.key_path(p)).unwrap_or_default(),
            }),
            None => Ok(()),
        }
    }

    /// Attach a fully described node under `parent`, validating it like [`Tree::add_command`]
    pub(crate) fn attach(&mut self, parent: Option<NodeId>, node: Node) -> AliResult<NodeId> {
        let path = match parent {
            Some(p) => format!("{}{}{}", self.key_path(p), keypath::DELIMITER, node.name),
            None => node.name.clone(),
        };
        if node.name.is_empty() || node.name.contains(keypath::DELIMITER) {
            return Err(AliError::InvalidPath {
                path,
                reason: format!("'{}' is not a single key path segment", node.name),
            });
        }
        check_name(&path, &node.name)?;
        check_alias(&path, &node.alias)?;
        self.ensure_alias_free(parent, None, &node.name)?;
        self.ensure_alias_free(parent, None, &node.alias)?;
        self.insert_node(parent, node)
    }

    /// Add (or overwrite) the command at `path`, synthesizing missing ancestors
    pub fn add_command(&mut self, path: &str, fields: Fields) -> AliResult<NodeId> {
        let segments = keypath::validate(path)?;
        for segment in &segments {
            check_name(path, segment)?;
        }
        let (last, intermediate) = segments
            .split_last()
            .ok_or_else(|| AliError::InvalidPath {
                path: path.to_string(),
                reason: "key path is empty".to_string(),
            })?;

        let alias = if fields.alias.trim().is_empty() {
            last.clone()
        } else {
            fields.alias.trim().to_string()
        };
        check_alias(path, &alias)?;

        let default_mode = self.settings.mode;
        let mut parent: Option<NodeId> = None;
        for segment in intermediate {
            let id = match self.child(parent, segment) {
                Some(id) => id,
                None => self.insert_node(parent, Node::new(segment, default_mode))?,
            };
            parent = Some(id);
        }

        // a freshly synthesized parent has no siblings to collide with
        let existing = self.child(parent, last);
        self.ensure_alias_free(parent, existing, &alias)?;

        let id = match existing {
            Some(id) => id,
            None => self.insert_node(parent, Node::new(last, default_mode))?,
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.alias = alias;
            node.description = fields.description;
            node.code = fields.code;
            node.mode = fields.mode.unwrap_or(default_mode);
            node.alias_only = fields.alias_only;
        }
        self.dirty = true;
        debug!("add_command: {} ({} nodes total)", self.key_path(id), self.nodes.len());
        Ok(id)
    }

    /// Remove `id` and its whole subtree, returning how many nodes went away
    fn detach(&mut self, id: NodeId) -> usize {
        let Some(node) = self.nodes.get(&id) else {
            return 0;
        };
        let name = node.name.clone();
        let parent = node.parent;
        if let Some(scope) = self.scope_mut(parent) {
            scope.remove(&name);
        }

        let mut removed = 0;
        let mut pending = vec![id];
        while let Some(cur) = pending.pop() {
            if let Some(node) = self.nodes.remove(&cur) {
                pending.extend(node.children.values().copied());
                removed += 1;
            }
        }
        self.dirty = true;
        removed
    }

    pub fn remove_command(&mut self, path: &str) -> AliResult<usize> {
        keypath::validate(path)?;
        let id = self.find(path).ok_or_else(|| AliError::NotFound {
            path: path.to_string(),
            what: "Command".to_string(),
        })?;
        let removed = self.detach(id);
        debug!("remove_command: {} ({} nodes removed)", path, removed);
        Ok(removed)
    }

    fn find_mut(&mut self, path: &str) -> AliResult<&mut Node> {
        keypath::validate(path)?;
        let id = self.find(path).ok_or_else(|| AliError::NotFound {
            path: path.to_string(),
            what: "Command".to_string(),
        })?;
        self.nodes.get_mut(&id).ok_or_else(|| AliError::NotFound {
            path: path.to_string(),
            what: "Command".to_string(),
        })
    }

    /// Map `token` to `replacement` in the node at `path`, returning the previous value
    pub fn add_substitution(&mut self, path: &str, token: &str, replacement: &str) -> AliResult<Option<String>> {
        if token.is_empty() {
            return Err(AliError::InvalidPath {
                path: path.to_string(),
                reason: "substitution token is empty".to_string(),
            });
        }
        let node = self.find_mut(path)?;
        let previous = node.substitutions.insert(token.to_string(), replacement.to_string());
        self.dirty = true;
        Ok(previous)
    }

    pub fn remove_substitution(&mut self, path: &str, token: &str) -> AliResult<String> {
        let node = self.find_mut(path)?;
        let removed = node.substitutions.remove(token).ok_or_else(|| AliError::NotFound {
            path: format!("{} [{}]", path, token),
            what: "Substitution".to_string(),
        })?;
        self.dirty = true;
        Ok(removed)
    }

    /// Fold `other` into this tree
    ///
    /// Missing nodes are created; existing nodes take the incoming non-empty
    /// fields and the union of both substitution tables, incoming values winning.
    pub fn merge(&mut self, other: &Tree) -> MergeReport {
        let mut report = MergeReport::default();
        for root in other.roots() {
            self.merge_node(None, other, root, &mut report);
        }
        report
    }

    fn merge_node(&mut self, parent: Option<NodeId>, other: &Tree, other_id: NodeId, report: &mut MergeReport) {
        let Some(incoming) = other.get(other_id) else {
            return;
        };
        let existing = self.child(parent, &incoming.name);
        let local = match existing {
            Some(id) => {
                let alias_ok = self.ensure_alias_free(parent, Some(id), &incoming.alias).is_ok();
                if let Some(node) = self.nodes.get_mut(&id) {
                    if incoming.alias != incoming.name && incoming.alias != node.alias {
                        if alias_ok {
                            node.alias = incoming.alias.clone();
                        } else {
                            warn!("merge: alias '{}' already taken, keeping '{}'", incoming.alias, node.alias);
                        }
                    }
                    if !incoming.description.is_empty() {
                        node.description = incoming.description.clone();
                    }
                    if incoming.code.is_some() {
                        node.code = incoming.code.clone();
                    }
                    node.mode = incoming.mode;
                    node.alias_only |= incoming.alias_only;
                    node.substitutions
                        .extend(incoming.substitutions.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                report.updated += 1;
                id
            }
            None => {
                let mut node = incoming.clone();
                if self.ensure_alias_free(parent, None, &node.alias).is_err() {
                    warn!("merge: alias '{}' already taken, using name '{}'", node.alias, node.name);
                    node.alias = node.name.clone();
                }
                match self.insert_node(parent, node) {
                    Ok(id) => {
                        report.added += 1;
                        id
                    }
                    Err(e) => {
                        warn!("merge: skipping '{}': {}", incoming.name, e);
                        return;
                    }
                }
            }
        };
        self.dirty = true;
        for child in other.sorted_children(Some(other_id)) {
            self.merge_node(Some(local), other, child, report);
        }
    }
}
