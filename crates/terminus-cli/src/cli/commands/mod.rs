use super::args::*;

pub mod plugins;
pub mod rewrite;
pub mod store;

use anyhow::{Context, Result};
use std::io::{self, Read, Write};
use std::path::Path;
use terminus_plugin::PluginConfig;

pub async fn dispatch(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Rewrite(args) => rewrite::run(args, config),
        Command::Store(args) => store::run(args, config).await,
        Command::Plugins => plugins::run(&config),
    }
}

/// Config file if given, else defaults; `TERMINUS_*` variables win in both cases.
pub(crate) fn load_config(path: Option<&Path>) -> Result<PluginConfig> {
    match path {
        Some(path) => PluginConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config: {}", path.display())),
        None => PluginConfig::from_env().context("invalid TERMINUS_* environment"),
    }
}

/// Read a whole file, or stdin for "-".
pub(crate) fn read_input(path: &str) -> Result<Vec<u8>> {
    if path == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path))
}

/// Write `data` to a file, or stdout for "-".
pub(crate) fn write_output(path: &str, data: &[u8]) -> Result<()> {
    if path == "-" {
        let mut stdout = io::stdout().lock();
        stdout.write_all(data).context("failed to write stdout")?;
        return stdout.flush().context("failed to write stdout");
    }
    std::fs::write(path, data).with_context(|| format!("failed to write {}", path))
}
