//! Shell integration for ali
//!
//! Top-level commands are published to the user's shell by writing a managed
//! block into each profile:
//!
//! ```sh
//! # >>> ali managed block >>>
//! alias gs='gs'
//! k() { eval "$(ali eval k "$@")"; }
//! # <<< ali managed block <<<
//! ```
//!
//! Everything outside the markers belongs to the user and is never touched.

pub mod profile;

use crate::tree::Tree;

pub use profile::{sync_profiles, Profile, SyncOutcome};

pub const BEGIN_MARKER: &str = "# >>> ali managed block >>>";
pub const END_MARKER: &str = "# <<< ali managed block <<<";

/// One shell line for the top-level command `alias`
pub fn render_line(alias: &str, name: &str, alias_only: bool, entry_point: &str) -> String {
    if alias_only {
        format!("alias {}='{}'", alias, name.replace('\'', r"'\''"))
    } else {
        format!(r#"{alias}() {{ eval "$({entry_point} eval {alias} "$@")"; }}"#)
    }
}

/// Body lines of the managed block, sorted by alias
pub fn render_lines(tree: &Tree) -> Vec<String> {
    let settings = &tree.settings;
    tree.roots()
        .into_iter()
        .filter_map(|id| tree.get(id))
        .map(|node| {
            render_line(
                &node.alias,
                &node.name,
                node.alias_only || settings.alias_only,
                &settings.entry_point,
            )
        })
        .collect()
}

/// The complete managed block, markers included, ending in a newline
pub fn render_block(tree: &Tree) -> String {
    let mut block = String::new();
    block.push_str(BEGIN_MARKER);
    block.push('\n');
    for line in render_lines(tree) {
        block.push_str(&line);
        block.push('\n');
    }
    block.push_str(END_MARKER);
    block.push('\n');
    block
}
