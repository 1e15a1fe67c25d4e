use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use log::{debug, info};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::exit;

use ali_lib::{
    eval_alias, get_config_path_or_default, get_config_path_with_override, listing, setup_logging, sync_profiles,
    CodeSnippet, Fields, FsProfileIo, Loader, Mode, SyncOutcome, Tree,
};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/git_describe.rs"));
}

#[derive(Parser)]
#[command(name = "ali", about = "hierarchical command aliases, synced into your shell profiles")]
#[command(version = built_info::GIT_DESCRIBE)]
#[command(author = "Scott A. Idler <scott.a.idler@gmail.com>")]
#[command(arg_required_else_help = true)]
#[command(after_help = "Logs are written to: ~/.local/share/ali/logs/ali.log")]
struct AliOpts {
    #[clap(short, long, help = "path to the manifest")]
    config: Option<PathBuf>,

    #[clap(short, long, help = "log resolutions and debug output")]
    verbose: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[clap(name = "add", about = "add or update a command")]
    Add(AddOpts),

    #[clap(name = "rm", about = "remove a command and everything below it")]
    Remove(RemoveOpts),

    #[clap(name = "sub", about = "manage argument substitutions")]
    Sub(SubOpts),

    #[clap(name = "ls", about = "list commands as a tree")]
    List(ListOpts),

    #[clap(name = "eval", about = "print the shell command for an alias and its arguments")]
    Eval(EvalOpts),

    #[clap(name = "sync", about = "regenerate the managed block in every profile")]
    Sync,

    #[clap(name = "config", about = "show or change settings")]
    Config(ConfigOpts),

    #[clap(name = "import", about = "merge another manifest into this one")]
    Import(ImportOpts),

    #[clap(name = "__complete", hide = true)]
    Complete(CompleteOpts),
}

#[derive(Parser)]
struct AddOpts {
    #[clap(help = "dotted key path, e.g. kubectl.get")]
    path: String,

    #[clap(short, long, help = "short name used in the shell")]
    alias: Option<String>,

    #[clap(short, long)]
    description: Option<String>,

    #[clap(long, help = "code run in place of the command name")]
    code: Option<String>,

    #[clap(short, long, help = "language of --code (default: sh)")]
    lang: Option<String>,

    #[clap(short, long, help = "concatenate, independent or exclusive")]
    mode: Option<Mode>,

    #[clap(long, help = "emit a plain shell alias instead of a function")]
    alias_only: bool,
}

#[derive(Parser)]
struct RemoveOpts {
    path: String,
}

#[derive(Parser)]
struct SubOpts {
    #[clap(subcommand)]
    action: SubAction,
}

#[derive(Subcommand)]
enum SubAction {
    #[clap(name = "add", about = "replace TOKEN with REPLACEMENT for PATH and below")]
    Add {
        path: String,
        token: String,
        #[clap(allow_hyphen_values = true)]
        replacement: String,
    },

    #[clap(name = "rm", about = "remove a substitution")]
    Remove { path: String, token: String },
}

#[derive(Parser)]
struct ListOpts {
    path: Option<String>,
}

#[derive(Parser)]
struct EvalOpts {
    alias: String,

    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Parser)]
struct ConfigOpts {
    key: Option<String>,
    value: Option<String>,
}

#[derive(Parser)]
struct ImportOpts {
    file: PathBuf,
}

#[derive(Parser)]
struct CompleteOpts {
    #[clap(default_value = "")]
    partial: String,
}

fn load_existing(home_dir: &Path, config: &Option<PathBuf>) -> Result<(Tree, PathBuf)> {
    let path = get_config_path_with_override(home_dir, config)?;
    let tree = Loader::new().load(&path)?;
    Ok((tree, path))
}

fn load_for_update(home_dir: &Path, config: &Option<PathBuf>) -> Result<(Tree, PathBuf)> {
    let path = get_config_path_or_default(home_dir, config);
    let tree = Loader::new().load_or_default(&path)?;
    Ok((tree, path))
}

/// Persist the manifest, then push the new block into every profile
fn save_and_sync(tree: &Tree, path: &Path, home_dir: &Path) -> Result<i32> {
    if tree.is_dirty() {
        Loader::new().save(tree, path)?;
        info!("saved manifest {:?}", path);
    }
    sync(tree, home_dir)
}

fn sync(tree: &Tree, home_dir: &Path) -> Result<i32> {
    let shell = std::env::var("SHELL").ok();
    let targets = tree.settings.profile_targets(home_dir, shell.as_deref());
    let io = FsProfileIo::for_home(home_dir, tree.settings.backups);

    let mut failures = 0;
    for (path, outcome) in sync_profiles(tree, &targets, &io) {
        match outcome {
            Ok(SyncOutcome::Written) => println!("updated {}", path.display()),
            Ok(state) => debug!("{:?}: {:?}", path, state),
            Err(e) => {
                failures += 1;
                eprintln!("Error: {}", e);
            }
        }
    }
    Ok(if failures == 0 { 0 } else { 1 })
}

fn fields_from(opts: &AddOpts) -> Fields {
    Fields {
        alias: opts.alias.clone().unwrap_or_default(),
        description: opts.description.clone().unwrap_or_default(),
        code: opts.code.as_ref().map(|source| CodeSnippet {
            lang: opts.lang.clone(),
            source: source.clone(),
        }),
        mode: opts.mode,
        alias_only: opts.alias_only,
    }
}

fn run(opts: &AliOpts, home_dir: &Path) -> Result<i32> {
    let Some(command) = &opts.command else {
        return Ok(0);
    };

    match command {
        Command::Add(add_opts) => {
            let (mut tree, path) = load_for_update(home_dir, &opts.config)?;
            tree.add_command(&add_opts.path, fields_from(add_opts))?;
            save_and_sync(&tree, &path, home_dir)
        }

        Command::Remove(remove_opts) => {
            let (mut tree, path) = load_existing(home_dir, &opts.config)?;
            let removed = tree.remove_command(&remove_opts.path)?;
            println!("removed {} command(s)", removed);
            save_and_sync(&tree, &path, home_dir)
        }

        Command::Sub(sub_opts) => {
            let (mut tree, path) = load_existing(home_dir, &opts.config)?;
            match &sub_opts.action {
                SubAction::Add { path: key, token, replacement } => {
                    if let Some(previous) = tree.add_substitution(key, token, replacement)? {
                        println!("replaced {} (was {})", token, previous);
                    }
                }
                SubAction::Remove { path: key, token } => {
                    tree.remove_substitution(key, token)?;
                }
            }
            save_and_sync(&tree, &path, home_dir)
        }

        Command::List(list_opts) => {
            let (tree, _) = load_existing(home_dir, &opts.config)?;
            let start = match &list_opts.path {
                Some(key) => Some(
                    tree.find(key)
                        .ok_or_else(|| eyre!("no command at '{}'", key))?,
                ),
                None => None,
            };
            let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
            println!("{}", listing::format_tree(&tree, start, color));
            Ok(0)
        }

        Command::Eval(eval_opts) => {
            let (mut tree, _) = load_existing(home_dir, &opts.config)?;
            tree.settings.verbose |= opts.verbose;
            let resolved = eval_alias(&tree, &eval_opts.alias, &eval_opts.args)?;
            println!("{resolved}");
            Ok(0)
        }

        Command::Sync => {
            let (tree, _) = load_existing(home_dir, &opts.config)?;
            sync(&tree, home_dir)
        }

        Command::Config(config_opts) => {
            let (mut tree, path) = load_for_update(home_dir, &opts.config)?;
            match (&config_opts.key, &config_opts.value) {
                (Some(key), Some(value)) => {
                    tree.settings.set(key, value).map_err(|e| eyre!(e))?;
                    Loader::new().save(&tree, &path)?;
                    sync(&tree, home_dir)
                }
                (Some(key), None) => Err(eyre!("missing value for '{}'", key)),
                _ => {
                    print!("{}", serde_yaml::to_string(&tree.settings)?);
                    Ok(0)
                }
            }
        }

        Command::Import(import_opts) => {
            let (mut tree, path) = load_for_update(home_dir, &opts.config)?;
            let incoming = Loader::new()
                .load(&import_opts.file)
                .wrap_err_with(|| format!("importing {}", import_opts.file.display()))?;
            let report = tree.merge(&incoming);
            println!("imported {} new, {} updated", report.added, report.updated);
            save_and_sync(&tree, &path, home_dir)
        }

        Command::Complete(complete_opts) => {
            // Completion must stay silent on errors
            if let Ok((tree, _)) = load_existing(home_dir, &opts.config) {
                for candidate in listing::complete(&tree, &complete_opts.partial) {
                    println!("{candidate}");
                }
            }
            Ok(0)
        }
    }
}

fn main() {
    let opts = AliOpts::parse();

    let Some(home_dir) = dirs::home_dir() else {
        eprintln!("Error: could not determine home directory");
        exit(1);
    };

    if let Err(e) = setup_logging(&home_dir, opts.verbose) {
        eprintln!("Warning: Failed to set up logging: {}", e);
    }

    let result = match run(&opts, &home_dir) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    exit(result);
}
