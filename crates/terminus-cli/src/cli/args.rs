use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "terminus-plugin",
    version,
    about = "Velero plugins for Terminus: local object store, host path snapshots and backup archive conversion"
)]
pub struct Cli {
    /// Plugin config file (YAML); TERMINUS_* variables override it
    #[arg(long, global = true, env = "TERMINUS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert volumeId to VolumeId in a backup archive
    Rewrite(RewriteArgs),
    /// Operate on the local object store
    Store(StoreArgs),
    /// List the plugins exposed to Velero
    Plugins,
}

#[derive(Debug, Args, Clone)]
pub struct RewriteArgs {
    /// Input archive (.tar.gz), or "-" for stdin
    #[arg(long, short = 'i', default_value = "-")]
    pub input: String,

    /// Output archive, or "-" for stdout
    #[arg(long, short = 'o', default_value = "-")]
    pub output: String,

    /// Base directory for scratch space
    #[arg(long, env = "TERMINUS_RESTORE_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Keep original line endings instead of terminating every line
    #[arg(long)]
    pub preserve_newlines: bool,
}

#[derive(Debug, Args, Clone)]
pub struct StoreArgs {
    /// Directory buckets live under
    #[arg(long, env = "TERMINUS_BACKUP_ROOT")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: StoreCmd,
}

#[derive(Debug, Subcommand, Clone)]
pub enum StoreCmd {
    /// Upload a file as an object
    Put(PutArgs),
    /// Download an object
    Get(GetArgs),
    /// Exit 0 if the object exists, 2 if not
    Exists(ObjectArgs),
    /// List keys under a prefix
    Ls(ListArgs),
    /// List common prefixes under a prefix
    Prefixes(PrefixesArgs),
    /// Delete an object or a whole prefix directory
    Rm(ObjectArgs),
    /// Print a download URL for an object
    Url(UrlArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ObjectArgs {
    #[arg(long, short = 'b')]
    pub bucket: String,

    /// Object key
    #[arg(value_name = "KEY")]
    pub key: String,
}

#[derive(Debug, Args, Clone)]
pub struct PutArgs {
    #[command(flatten)]
    pub object: ObjectArgs,

    /// File to upload, or "-" for stdin
    #[arg(long, short = 'f', default_value = "-")]
    pub file: String,
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    #[command(flatten)]
    pub object: ObjectArgs,

    /// Output path, or "-" for stdout
    #[arg(long, short = 'o', default_value = "-")]
    pub out: String,

    /// Return backup archives exactly as stored
    #[arg(long)]
    pub no_rewrite: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    #[arg(long, short = 'b')]
    pub bucket: String,

    #[arg(long, short = 'p', default_value = "")]
    pub prefix: String,
}

#[derive(Debug, Args, Clone)]
pub struct PrefixesArgs {
    #[command(flatten)]
    pub list: ListArgs,

    #[arg(long, short = 'd', default_value = "/")]
    pub delimiter: String,
}

#[derive(Debug, Args, Clone)]
pub struct UrlArgs {
    #[command(flatten)]
    pub object: ObjectArgs,

    /// URL lifetime in seconds
    #[arg(long, default_value_t = 600, allow_negative_numbers = true)]
    pub ttl_secs: i64,
}
