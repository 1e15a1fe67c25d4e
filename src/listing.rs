//! Human-facing views of the tree: `ali ls` and shell completion

use colored::*;

use crate::keypath;
use crate::tree::{NodeId, Tree};

fn paint(text: &str, color: bool, style: fn(&str) -> ColoredString) -> String {
    if color {
        style(text).to_string()
    } else {
        text.to_string()
    }
}

fn describe(tree: &Tree, id: NodeId, color: bool) -> String {
    let Some(node) = tree.get(id) else {
        return String::new();
    };
    let mut line = paint(&node.alias, color, |s| s.cyan().bold());
    if node.alias != node.name {
        line.push_str(&format!(" ({})", node.name));
    }
    if node.mode != tree.settings.mode {
        line.push_str(&format!(" [{}]", paint(node.mode.as_str(), color, |s| s.yellow())));
    }
    if let Some(code) = &node.code {
        line.push_str(&format!(" => {}", paint(&code.to_command(), color, |s| s.green())));
    }
    if !node.description.is_empty() {
        line.push_str(&format!("  {}", paint(&node.description, color, |s| s.dimmed())));
    }
    line
}

fn format_node(tree: &Tree, id: NodeId, prefix: &str, is_last: bool, color: bool, out: &mut Vec<String>) {
    let connector = if is_last { "└─ " } else { "├─ " };
    out.push(format!("{}{}{}", prefix, connector, describe(tree, id, color)));

    let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
    if let Some(node) = tree.get(id) {
        for (token, replacement) in &node.substitutions {
            out.push(format!(
                "{}· {} -> {}",
                child_prefix,
                paint(token, color, |s| s.magenta()),
                replacement
            ));
        }
    }
    let children = tree.sorted_children(Some(id));
    for (i, child) in children.iter().enumerate() {
        format_node(tree, *child, &child_prefix, i == children.len() - 1, color, out);
    }
}

/// ASCII tree of `start` (or every top-level command) sorted by alias
pub fn format_tree(tree: &Tree, start: Option<NodeId>, color: bool) -> String {
    if tree.is_empty() {
        return "No commands defined. Use `ali add <path>` to create one.".to_string();
    }
    let mut out = Vec::new();
    match start {
        Some(id) => {
            out.push(describe(tree, id, color));
            let children = tree.sorted_children(Some(id));
            for (i, child) in children.iter().enumerate() {
                format_node(tree, *child, "", i == children.len() - 1, color, &mut out);
            }
        }
        None => {
            let roots = tree.roots();
            for (i, root) in roots.iter().enumerate() {
                format_node(tree, *root, "", i == roots.len() - 1, color, &mut out);
            }
        }
    }
    out.push(String::new());
    out.push(format!("count: {}", tree.len()));
    out.join("\n")
}

/// Completion candidates for a partially typed key path
///
/// Everything up to the last `.` must resolve; the final segment is matched
/// as a prefix of child aliases.
pub fn complete(tree: &Tree, partial: &str) -> Vec<String> {
    let (parent_path, stem) = match partial.rfind(keypath::DELIMITER) {
        Some(pos) => (&partial[..pos], &partial[pos + 1..]),
        None => ("", partial),
    };
    let parent = if parent_path.is_empty() {
        None
    } else {
        match tree.find(parent_path) {
            Some(id) => Some(id),
            None => return Vec::new(),
        }
    };
    tree.sorted_children(parent)
        .into_iter()
        .filter_map(|id| tree.get(id))
        .filter(|node| node.alias.starts_with(stem))
        .map(|node| {
            if parent_path.is_empty() {
                node.alias.clone()
            } else {
                format!("{}{}{}", parent_path, keypath::DELIMITER, node.alias)
            }
        })
        .collect()
}
