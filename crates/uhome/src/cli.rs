//! Clap derive structures for the `uhome` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// uhome -- inspect and control U-tec Uhome devices
#[derive(Debug, Parser)]
#[command(
    name = "uhome",
    version,
    about = "Inspect and control U-tec Uhome devices from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "UHOME_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "UHOME_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "UHOME_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "UHOME_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List and inspect devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Lock a lock
    Lock(DeviceArg),

    /// Unlock a lock
    Unlock(DeviceArg),

    /// Turn a light or switch on
    On(OnArgs),

    /// Turn a light or switch off
    Off(DeviceArg),

    /// Send a raw capability command
    Send(SendArgs),

    /// Poll in the background and print device changes
    Watch(WatchArgs),

    /// Show the account owner
    User,

    /// Register the push notification URL
    PushUrl(PushUrlArgs),

    /// OAuth authorization
    Auth(AuthArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List all supported devices
    #[command(alias = "ls")]
    List,

    /// Show one device with its full state
    Get {
        /// Device id or name
        device: String,
    },
}

#[derive(Debug, Args)]
pub struct DeviceArg {
    /// Device id or name
    pub device: String,
}

#[derive(Debug, Args)]
pub struct OnArgs {
    /// Device id or name
    pub device: String,

    /// Brightness percent (0-100)
    #[arg(long, short = 'b')]
    pub brightness: Option<u8>,

    /// RGB color as `r,g,b`
    #[arg(long, value_parser = parse_rgb, conflicts_with = "color_temp")]
    pub rgb: Option<[u8; 3]>,

    /// Color temperature in Kelvin
    #[arg(long)]
    pub color_temp: Option<u32>,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Device id or name
    pub device: String,

    /// Vendor capability (e.g. st.lock)
    pub capability: String,

    /// Command name (e.g. lock)
    pub name: String,

    /// Command arguments as inline JSON
    #[arg(long)]
    pub args: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in seconds (overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

#[derive(Debug, Args)]
pub struct PushUrlArgs {
    /// Public URL the vendor should post push updates to
    pub url: String,

    /// Shared secret echoed back with each push (generated if omitted)
    #[arg(long)]
    pub secret: Option<String>,
}

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Print the authorization URL to open in a browser
    Url {
        /// Redirect URI (overrides profile)
        #[arg(long)]
        redirect_uri: Option<String>,

        /// Opaque state echoed back on redirect (generated if omitted)
        #[arg(long)]
        state: Option<String>,
    },

    /// Exchange an authorization code and store the token
    Exchange {
        /// Code from the redirect
        code: String,

        /// Redirect URI used for the authorization request
        #[arg(long)]
        redirect_uri: Option<String>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the effective configuration (secrets masked)
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

// ── Parsers ──────────────────────────────────────────────────────────

fn parse_rgb(raw: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(format!("expected r,g,b but got '{raw}'"));
    };
    let channel = |s: &str| {
        s.parse::<u8>()
            .map_err(|_| format!("'{s}' is not a color channel (0-255)"))
    };
    Ok([channel(r)?, channel(g)?, channel(b)?])
}
