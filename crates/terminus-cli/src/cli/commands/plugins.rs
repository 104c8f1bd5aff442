//! `terminus-plugin plugins` - List the registered plugins.

use crate::exit_codes;
use anyhow::Result;
use terminus_plugin::{PluginConfig, PluginRegistry};

pub fn run(config: &PluginConfig) -> Result<i32> {
    let registry = PluginRegistry::with_defaults();
    for (name, kind) in registry.plugins() {
        println!("{name}\t{kind}");
    }
    tracing::debug!(
        root = %config.root.display(),
        rewrite = config.rewrite_backup_archives,
        count = registry.len(),
        "listed plugins"
    );
    Ok(exit_codes::SUCCESS)
}
