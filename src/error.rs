use std::fmt;
use std::path::PathBuf;

/// Errors surfaced by the command tree, the resolver and the profile synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliError {
    /// Empty or malformed key path (or an alias that cannot name a shell function)
    InvalidPath {
        path: String,
        reason: String,
    },

    /// Key path does not resolve to an existing node
    NotFound {
        path: String,
        what: String,
    },

    /// Alias already used by a different sibling in the same scope
    DuplicateAlias {
        alias: String,
        owner: String,
        scope: String,
    },

    /// Profile contains only one of the two managed-block markers
    MalformedBlock {
        file_path: PathBuf,
        found: String,
        missing: String,
    },

    /// apply() called without a tree
    NilManifest {
        file_path: PathBuf,
    },

    /// commit() called on a profile that does not need rewriting
    CommitNotAllowed {
        file_path: PathBuf,
    },

    /// I/O failure propagated from a collaborator
    FileOperation {
        file_path: PathBuf,
        operation: String,
        underlying_error: String,
        context: String,
    },

    /// No manifest file could be located
    ConfigNotFound {
        attempted_paths: Vec<PathBuf>,
        home_dir: PathBuf,
        custom_path: Option<PathBuf>,
    },

    /// Manifest parsing error
    ConfigParse {
        file_path: PathBuf,
        line: Option<usize>,
        column: Option<usize>,
        context: String,
        underlying_error: String,
    },
}

impl fmt::Display for AliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliError::InvalidPath { path, reason } => {
                writeln!(f, "Invalid key path '{}'", path)?;
                write!(f, "  Reason: {}", reason)
            }

            AliError::NotFound { path, what } => {
                writeln!(f, "{} not found", what)?;
                writeln!(f, "  Key path: {}", path)?;
                write!(f, "  Run `ali ls` to see the defined commands.")
            }

            AliError::DuplicateAlias { alias, owner, scope } => {
                writeln!(f, "Alias '{}' is already taken", alias)?;
                writeln!(f, "  Used by: {}", owner)?;
                write!(f, "  Scope: {}", if scope.is_empty() { "<top level>" } else { scope })
            }

            AliError::MalformedBlock { file_path, found, missing } => {
                writeln!(f, "Malformed managed block in {}", file_path.display())?;
                writeln!(f, "  Found marker: {}", found)?;
                writeln!(f, "  Missing marker: {}", missing)?;
                write!(f, "  Fix or remove the marker lines by hand, then run `ali sync` again.")
            }

            AliError::NilManifest { file_path } => {
                write!(f, "No manifest available to regenerate {}", file_path.display())
            }

            AliError::CommitNotAllowed { file_path } => {
                write!(f, "Nothing to commit for {}", file_path.display())
            }

            AliError::FileOperation { file_path, operation, underlying_error, context } => {
                writeln!(f, "File operation failed")?;
                writeln!(f, "  File: {}", file_path.display())?;
                writeln!(f, "  Operation: {}", operation)?;
                if !context.is_empty() {
                    writeln!(f, "  Context: {}", context)?;
                }
                writeln!(f, "  Error: {}", underlying_error)?;
                write!(f, "  Check file permissions and disk space.")
            }

            AliError::ConfigNotFound { attempted_paths, home_dir, custom_path } => {
                writeln!(f, "Manifest file not found")?;
                if let Some(custom) = custom_path {
                    write!(f, "  Custom manifest path: {}", custom.display())?;
                } else {
                    writeln!(f, "  Home directory: {}", home_dir.display())?;
                    writeln!(f, "  Attempted paths:")?;
                    for path in attempted_paths {
                        writeln!(f, "    - {}", path.display())?;
                    }
                    writeln!(f)?;
                    writeln!(f, "  To create a manifest, add a first command:")?;
                    write!(f, "    ali add <path>")?;
                }
                Ok(())
            }

            AliError::ConfigParse { file_path, line, column, context, underlying_error } => {
                writeln!(f, "Manifest parsing error in {}", file_path.display())?;
                if let (Some(line), Some(column)) = (line, column) {
                    writeln!(f, "  Location: line {}, column {}", line, column)?;
                } else if let Some(line) = line {
                    writeln!(f, "  Location: line {}", line)?;
                }
                if !context.is_empty() {
                    writeln!(f, "  Context: {}", context)?;
                }
                write!(f, "  Error: {}", underlying_error)
            }
        }
    }
}

impl std::error::Error for AliError {}

pub type AliResult<T> = std::result::Result<T, AliError>;

/// Context builder for errors that wrap a lower level failure
pub struct ErrorContext {
    operation: String,
    file_path: Option<PathBuf>,
    additional_context: Vec<String>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            file_path: None,
            additional_context: Vec::new(),
        }
    }

    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.additional_context.push(context.to_string());
        self
    }

    fn path(&self) -> PathBuf {
        self.file_path.clone().unwrap_or_else(|| PathBuf::from("unknown"))
    }

    pub fn to_file_operation_error(self, underlying_error: impl fmt::Display) -> AliError {
        AliError::FileOperation {
            file_path: self.path(),
            operation: self.operation,
            underlying_error: underlying_error.to_string(),
            context: self.additional_context.join("; "),
        }
    }

    pub fn to_config_parse_error(self, underlying_error: impl fmt::Display) -> AliError {
        let underlying_error = underlying_error.to_string();
        let (line, column) = extract_yaml_position(&underlying_error);
        AliError::ConfigParse {
            file_path: self.path(),
            line,
            column,
            context: self.additional_context.join("; "),
            underlying_error,
        }
    }

    pub fn to_config_not_found_error(self, attempted_paths: Vec<PathBuf>, home_dir: PathBuf) -> AliError {
        AliError::ConfigNotFound {
            attempted_paths,
            home_dir,
            custom_path: self.file_path,
        }
    }
}

/// Pull line and column out of a YAML error message
pub fn extract_yaml_position(error: &str) -> (Option<usize>, Option<usize>) {
    let capture = |pattern: &str| {
        regex::Regex::new(pattern)
            .ok()
            .and_then(|re| re.captures(error))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
    };
    (capture(r"line (\d+)"), capture(r"column (\d+)"))
}
