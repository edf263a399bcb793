//! Command-line surface and dispatch.

use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use profile_store::{Mode, ProfileStore};
use section_matcher::{filter_document, RuntimeFlavor};
use tracing::{info, warn};

use crate::broker::TerminalInput;
use crate::client::{self, FollowUpRequest};
use crate::compose::{rewrite_program_name, Composer};
use crate::config::BrokerConfig;
use crate::logging;
use crate::native;

const RUNTIME_SHUTDOWN: Duration = Duration::from_secs(1);

/// Hands an agent's turn to the operator and returns their follow-up.
#[derive(Parser, Debug)]
#[command(name = "whats_next", version, about)]
pub struct Cli {
    /// Broker port (default 7654, or WHATS_NEXT_PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the broker that owns the operator's terminal
    Serve(ServeArgs),

    /// List profiles; the active one is marked with `*`
    List,

    /// Print a profile, or the built-in guidelines when no name is given
    Show { name: Option<String> },

    /// Print a profile filtered for this directory and make it active
    Use { name: String },

    /// Open a profile in the editor, or the custom guidelines when no name is given
    Edit { name: Option<String> },

    /// Append a guideline to the custom guidelines file
    Add {
        content: String,

        /// Heading placed above the content
        #[arg(long)]
        title: Option<String>,
    },

    /// Delete a profile
    #[command(alias = "remove")]
    Rm { name: String },

    /// Rename a profile
    #[command(alias = "rename")]
    Mv { old: String, new: String },

    /// Print the configuration directory
    Where,

    /// Open config.json in the editor
    Config {
        /// Editor command (default: configured editor, then `code`)
        #[arg(long)]
        editor: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Write logs/info.txt and logs/error.txt in the current directory
    #[arg(long)]
    pub log: bool,

    /// Stop the running broker
    #[arg(long)]
    pub kill: bool,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = BrokerConfig::from_env().with_port_override(cli.port);
    match cli.command {
        None => follow_up(config),
        Some(Commands::Serve(args)) => serve(config, &args),
        Some(command) => manage(command, &ProfileStore::open_default()?, &mut io::stdout()),
    }
}

fn follow_up(config: BrokerConfig) -> anyhow::Result<()> {
    let store = ProfileStore::open_default()?;
    let working_dir = env::current_dir().context("failed to read current directory")?;

    if store.read_config()?.mode == Mode::Native {
        let source = TerminalInput::new(config.idle_timeout);
        let composer = Composer::new(store);
        let mut stdout = io::stdout();
        return native::run(&source, &composer, config.idle_timeout, &working_dir, &mut stdout);
    }

    let _signals = match logging::client_log_path() {
        Some(path) => match logging::init_client_logging(&path) {
            Ok(()) => logging::log_client_signals(),
            Err(error) => {
                eprintln!("Warning: failed to create logger: {error:#}");
                None
            }
        },
        None => None,
    };

    let request = FollowUpRequest::new(config.addr(), working_dir);
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let reply = runtime.block_on(client::run(&request));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    print!("{}", reply?);
    io::stdout().flush()?;
    Ok(())
}

fn serve(config: BrokerConfig, args: &ServeArgs) -> anyhow::Result<()> {
    if args.log {
        logging::init_server_logging(Path::new(logging::SERVER_LOG_DIR))?;
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let result = runtime.block_on(async move {
        let addr = config.addr();
        if args.kill {
            return client::kill_server(addr).await;
        }
        if client::is_reachable(addr).await {
            println!("Server {addr} is already running");
            return Ok(());
        }

        let composer = Composer::new(ProfileStore::open_default()?);
        let source = TerminalInput::new(config.idle_timeout);
        info!(%addr, "starting broker");
        crate::server::run(config, composer, source).await
    });
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
    result
}

/// Profile and configuration commands; never touch the network.
pub fn manage(command: Commands, store: &ProfileStore, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        Commands::List => {
            let active = store.read_config()?.selected_profile().map(str::to_string);
            for name in store.list_profiles()? {
                if active.as_deref() == Some(name.as_str()) {
                    write!(out, "* ")?;
                }
                writeln!(out, "{name}")?;
            }
        }
        Commands::Show { name: None } => write!(out, "{}", store.catalog_text()?)?,
        Commands::Show { name: Some(name) } => print_content(out, &store.read_profile(&name)?)?,
        Commands::Use { name } => {
            let document = store.read_profile(&name)?;
            let working_dir = env::current_dir().context("failed to read current directory")?;
            let filtered = filter_document(&document, &working_dir, RuntimeFlavor::detect());
            print_content(out, &rewrite_program_name(&filtered, &client::program_name()))?;
            store.select_profile(&name)?;
        }
        Commands::Edit { name } => {
            let path = match name {
                Some(name) => store.ensure_profile(&name)?,
                None => store.custom_file()?,
            };
            open_in_editor(&store.read_config()?.editor_or_default(None), &path)?;
        }
        Commands::Add { content, title } => store.add_custom(&content, title.as_deref())?,
        Commands::Rm { name } => store.remove_profile(&name)?,
        Commands::Mv { old, new } => store.rename_profile(&old, &new)?,
        Commands::Where => writeln!(out, "{}", store.root().display())?,
        Commands::Config { editor } => {
            let editor = store.read_config()?.editor_or_default(editor.as_deref());
            open_in_editor(&editor, &store.config_path())?;
        }
        Commands::Serve(_) => bail!("serve is not a profile command"),
    }
    Ok(())
}

/// Writes `content` followed by a newline unless it already ends with one.
fn print_content(out: &mut dyn Write, content: &str) -> io::Result<()> {
    out.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn open_in_editor(editor: &str, path: &Path) -> anyhow::Result<()> {
    info!(editor, path = %path.display(), "opening editor");
    let status = Command::new(editor)
        .arg(path)
        .status()
        .with_context(|| format!("failed to run editor {editor}"))?;
    if !status.success() {
        warn!(editor, %status, "editor exited with failure");
        bail!("{editor} exited with {status}");
    }
    Ok(())
}
