use eyre::Result;
use log::debug;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

#[macro_use]
pub mod macros;

pub mod cfg;
pub mod error;
pub mod keypath;
pub mod listing;
pub mod resolver;
pub mod shell;
pub mod system;
pub mod tree;

pub use cfg::loader::Loader;
pub use cfg::spec::{Manifest, ProfileTarget, Settings};
pub use error::{AliError, AliResult, ErrorContext};
pub use resolver::{Mode, Resolver};
pub use shell::{sync_profiles, Profile, SyncOutcome};
pub use system::{FsProfileIo, ProfileIo};
pub use tree::{CodeSnippet, Fields, MergeReport, NodeId, Tree};

/// Where a new manifest is created when none exists yet
pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config").join("ali").join("ali.yml")
}

pub fn get_config_path(home_dir: &Path) -> AliResult<PathBuf> {
    let config_dirs = [home_dir.join(".config").join("ali"), home_dir.to_path_buf()];
    let config_files = [["ali.yml", "ali.yaml"], [".ali.yml", ".ali.yaml"]];
    let mut attempted_paths = Vec::new();

    for (config_dir, names) in config_dirs.iter().zip(config_files.iter()) {
        for name in names {
            let path = config_dir.join(name);
            attempted_paths.push(path.clone());
            if path.exists() {
                return Ok(path);
            }
        }
    }

    let context = ErrorContext::new("locating manifest file").with_context("checking standard manifest locations");
    Err(context.to_config_not_found_error(attempted_paths, home_dir.to_path_buf()))
}

pub fn get_config_path_with_override(home_dir: &Path, override_path: &Option<PathBuf>) -> AliResult<PathBuf> {
    match override_path {
        Some(path) => {
            if path.exists() {
                Ok(path.clone())
            } else {
                let context = ErrorContext::new("locating custom manifest file")
                    .with_file(path.clone())
                    .with_context("custom manifest path specified via --config option");
                Err(context.to_config_not_found_error(vec![path.clone()], home_dir.to_path_buf()))
            }
        }
        None => get_config_path(home_dir),
    }
}

/// Manifest path for commands that may create the manifest
pub fn get_config_path_or_default(home_dir: &Path, override_path: &Option<PathBuf>) -> PathBuf {
    match override_path {
        Some(path) => path.clone(),
        None => get_config_path(home_dir).unwrap_or_else(|_| default_config_path(home_dir)),
    }
}

pub fn get_log_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".local").join("share").join("ali").join("logs").join("ali.log")
}

pub fn setup_logging(home_dir: &Path, verbose: bool) -> Result<()> {
    let default_filter = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().filter_or("RUST_LOG", default_filter);

    if std::env::var("ALI_LOG_STDERR").is_ok() {
        env_logger::Builder::from_env(env)
            .target(env_logger::Target::Stderr)
            .try_init()?;
    } else {
        // In normal mode, log to file
        let log_file_path = get_log_path(home_dir);
        if let Some(log_dir) = log_file_path.parent() {
            std::fs::create_dir_all(log_dir)?;
        }

        let log_file = OpenOptions::new().create(true).append(true).open(&log_file_path)?;

        env_logger::Builder::from_env(env)
            .target(env_logger::Target::Pipe(Box::new(log_file)))
            .try_init()?;
    }

    Ok(())
}

/// Resolve `alias args...` as typed at the shell into the string to `eval`
///
/// The longest run of leading words that names a node picks the node; the
/// remaining words are its runtime arguments. The result is quoted so that
/// `eval` hands the whole command to `sh -c` intact.
pub fn eval_alias<S: AsRef<str>>(tree: &Tree, alias: &str, args: &[S]) -> AliResult<String> {
    let mut words = vec![alias.to_string()];
    words.extend(keypath::encode(args));
    let typed = keypath::join(&words);

    let key_path = tree.shortest_key_path(&typed);
    let id = tree.find(&key_path).ok_or_else(|| AliError::NotFound {
        path: alias.to_string(),
        what: "Command".to_string(),
    })?;
    let consumed = keypath::split(&key_path).len();
    let rest = keypath::decode(&words[consumed..]);
    debug!("eval {:?} -> node {} with {} args", typed, key_path, rest.len());

    Resolver::new(tree, tree.settings.verbose).resolve_for_eval(id, &rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn kube_tree() -> Tree {
        let mut tree = Tree::default();
        tree.add_command("kubectl", Fields { alias: "k".into(), ..Fields::default() }).unwrap();
        tree.add_command("kubectl.get", Fields::default()).unwrap();
        tree.add_substitution("kubectl", "prod", "--context=prod").unwrap();
        tree
    }

    fn command_of(resolved: &str) -> String {
        let words = shlex::split(resolved).unwrap();
        assert_eq!(&words[..2], &["sh", "-c"]);
        assert_eq!(words.len(), 3, "command must be a single word: {resolved}");
        words[2].clone()
    }

    #[test]
    fn test_eval_alias_walks_into_children() {
        let tree = kube_tree();
        assert_eq!(command_of(&eval_alias(&tree, "k", &["get", "pods"]).unwrap()), "kubectl get pods");
        assert_eq!(
            command_of(&eval_alias(&tree, "k", &["logs", "prod"]).unwrap()),
            "kubectl logs --context=prod"
        );
    }

    #[test]
    fn test_eval_alias_keeps_dotted_args() {
        let tree = kube_tree();
        assert_eq!(
            command_of(&eval_alias(&tree, "k", &["apply", "-f", "app.v1.yml"]).unwrap()),
            "kubectl apply -f app.v1.yml"
        );
        let no_args: &[&str] = &[];
        assert_eq!(command_of(&eval_alias(&tree, "k", no_args).unwrap()), "kubectl");
    }

    #[test]
    fn test_eval_alias_output_survives_eval() -> Result<()> {
        let mut tree = Tree::default();
        tree.add_command("echo", Fields { alias: "e".into(), ..Fields::default() })?;
        let resolved = eval_alias(&tree, "e", &["hello", "big world"])?;

        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!("eval {}", shlex::try_quote(&resolved)?))
            .output()?;
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello big world\n");
        Ok(())
    }

    #[test]
    fn test_eval_alias_unknown() {
        let tree = kube_tree();
        assert!(matches!(eval_alias(&tree, "nope", &["x"]), Err(AliError::NotFound { .. })));
    }

    #[test]
    fn test_get_config_path_order() -> Result<()> {
        let home = TempDir::new()?;
        assert!(matches!(get_config_path(home.path()), Err(AliError::ConfigNotFound { .. })));

        let dotfile = home.path().join(".ali.yml");
        fs::write(&dotfile, "{}")?;
        assert_eq!(get_config_path(home.path())?, dotfile);

        let preferred = default_config_path(home.path());
        fs::create_dir_all(preferred.parent().unwrap())?;
        fs::write(&preferred, "{}")?;
        assert_eq!(get_config_path(home.path())?, preferred);
        Ok(())
    }

    #[test]
    fn test_config_override() -> Result<()> {
        let home = TempDir::new()?;
        let custom = home.path().join("custom.yml");
        let result = get_config_path_with_override(home.path(), &Some(custom.clone()));
        match result {
            Err(AliError::ConfigNotFound { custom_path, .. }) => assert_eq!(custom_path, Some(custom.clone())),
            other => panic!("expected ConfigNotFound, got {:?}", other),
        }
        assert_eq!(get_config_path_or_default(home.path(), &Some(custom.clone())), custom);
        assert_eq!(get_config_path_or_default(home.path(), &None), default_config_path(home.path()));
        Ok(())
    }
}
