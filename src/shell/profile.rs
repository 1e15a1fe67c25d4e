//! Managed-block surgery on a single shell profile

use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use super::{render_block, render_lines, BEGIN_MARKER, END_MARKER};
use crate::cfg::spec::ProfileTarget;
use crate::error::{AliError, AliResult, ErrorContext};
use crate::system::ProfileIo;
use crate::tree::Tree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub path: PathBuf,
    pub original: String,
    pub permissions: u32,
    pub preferred: bool,
    /// No managed block was found in `original`
    pub pristine: bool,
    pub updated: String,
    /// Body lines written by the last [`Profile::apply`]
    pub generated: Vec<String>,
}

/// What [`sync_profiles`] did with one profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Pristine and not preferred (or nothing to add): left alone
    Skipped,
    /// Regenerated content matched the file byte for byte
    Unchanged,
    Written,
}

/// Line span `[begin, end]` of the managed block, if any
fn block_span(path: &Path, content: &str) -> AliResult<Option<(usize, usize)>> {
    let mut begins = Vec::new();
    let mut ends = Vec::new();
    for (index, line) in content.lines().enumerate() {
        match line.trim_end() {
            BEGIN_MARKER => begins.push(index),
            END_MARKER => ends.push(index),
            _ => {}
        }
    }
    let malformed = |found: &str, missing: &str| AliError::MalformedBlock {
        file_path: path.to_path_buf(),
        found: found.to_string(),
        missing: missing.to_string(),
    };
    match (begins.as_slice(), ends.as_slice()) {
        ([], []) => Ok(None),
        ([begin], [end]) if begin < end => Ok(Some((*begin, *end))),
        ([_], [_]) => Err(malformed(END_MARKER, &format!("{} before it", BEGIN_MARKER))),
        ([_], []) => Err(malformed(BEGIN_MARKER, END_MARKER)),
        ([], [_]) => Err(malformed(END_MARKER, BEGIN_MARKER)),
        _ => Err(malformed(
            &format!("{} begin and {} end markers", begins.len(), ends.len()),
            "a single managed block",
        )),
    }
}

/// `content` with the managed block (markers included) cut out
fn strip_block(path: &Path, content: &str) -> AliResult<String> {
    let Some((begin, end)) = block_span(path, content)? else {
        return Ok(content.to_string());
    };
    Ok(content
        .split_inclusive('\n')
        .enumerate()
        .filter(|(index, _)| *index < begin || *index > end)
        .map(|(_, line)| line)
        .collect())
}

impl Profile {
    pub fn new(path: &Path, original: &str, permissions: u32, preferred: bool) -> AliResult<Self> {
        let pristine = Self::parse(path, original)?;
        Ok(Self {
            path: path.to_path_buf(),
            original: original.to_string(),
            permissions,
            preferred,
            pristine,
            updated: original.to_string(),
            generated: Vec::new(),
        })
    }

    pub fn load(target: &ProfileTarget, io: &dyn ProfileIo) -> AliResult<Self> {
        let (content, permissions) = io.read_profile(&target.path).map_err(|e| {
            ErrorContext::new("reading profile")
                .with_file(&target.path)
                .to_file_operation_error(e)
        })?;
        Self::new(&target.path, &content, permissions, target.preferred)
    }

    /// True when `content` carries no managed block
    pub fn parse(path: &Path, content: &str) -> AliResult<bool> {
        Ok(block_span(path, content)?.is_none())
    }

    /// Rebuild `updated` from `tree`
    ///
    /// The old block is always removed; only a preferred profile gets a fresh
    /// one, present even when the tree is empty.
    pub fn apply(&mut self, tree: Option<&Tree>) -> AliResult<()> {
        let tree = tree.ok_or_else(|| AliError::NilManifest {
            file_path: self.path.clone(),
        })?;
        let mut updated = strip_block(&self.path, &self.original)?;
        if self.preferred {
            self.generated = render_lines(tree);
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str(&render_block(tree));
        } else {
            self.generated.clear();
        }
        self.updated = updated;
        Ok(())
    }

    pub fn can_commit(&self) -> bool {
        !self.pristine || (self.preferred && !self.generated.is_empty())
    }

    pub fn is_changed(&self) -> bool {
        self.updated != self.original
    }

    /// Back up the original, then replace the file keeping its permission bits
    pub fn commit(&self, io: &dyn ProfileIo) -> AliResult<()> {
        if !self.can_commit() {
            return Err(AliError::CommitNotAllowed {
                file_path: self.path.clone(),
            });
        }
        if self.original.is_empty() {
            debug!("{:?} is new, nothing to back up", self.path);
        } else {
            io.write_backup(&self.path, &self.original).map_err(|e| {
                ErrorContext::new("backing up profile")
                    .with_file(&self.path)
                    .to_file_operation_error(e)
            })?;
        }
        io.write_profile(&self.path, &self.updated, self.permissions).map_err(|e| {
            ErrorContext::new("writing profile")
                .with_file(&self.path)
                .with_context("original content is in the backup directory")
                .to_file_operation_error(e)
        })
    }
}

/// Load, regenerate and commit a single profile
pub fn sync_profile(tree: &Tree, target: &ProfileTarget, io: &dyn ProfileIo) -> AliResult<SyncOutcome> {
    let mut profile = Profile::load(target, io)?;
    profile.apply(Some(tree))?;
    if !profile.can_commit() {
        return Ok(SyncOutcome::Skipped);
    }
    if !profile.is_changed() {
        return Ok(SyncOutcome::Unchanged);
    }
    profile.commit(io)?;
    Ok(SyncOutcome::Written)
}

/// Synchronize every target; one failure never stops the rest
pub fn sync_profiles(tree: &Tree, targets: &[ProfileTarget], io: &dyn ProfileIo) -> Vec<(PathBuf, AliResult<SyncOutcome>)> {
    targets
        .iter()
        .map(|target| {
            let outcome = sync_profile(tree, target, io);
            match &outcome {
                Ok(SyncOutcome::Written) if tree.settings.verbose => info!("synced {:?}", target.path),
                Ok(state) => debug!("sync {:?}: {:?}", target.path, state),
                Err(e) => warn!("sync {:?} failed: {}", target.path, e),
            }
            (target.path.clone(), outcome)
        })
        .collect()
}
