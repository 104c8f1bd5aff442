//! `terminus-plugin rewrite` - Convert a backup archive offline.

use super::super::args::RewriteArgs;
use super::{read_input, write_output};
use crate::exit_codes;
use anyhow::{Context, Result};
use std::io::Cursor;
use terminus_plugin::archive::{ArchiveRewriter, NewlineMode, RewriteRules};
use terminus_plugin::PluginConfig;

pub fn run(args: RewriteArgs, config: PluginConfig) -> Result<i32> {
    let workspace = args.workspace.unwrap_or(config.workspace);
    let newline = if args.preserve_newlines {
        NewlineMode::Preserve
    } else {
        config.newline_mode
    };
    let rules = RewriteRules::persistent_volumes().with_newline(newline);
    let rewriter = ArchiveRewriter::new(&workspace, rules).context("failed to set up archive rewriter")?;

    let input = read_input(&args.input)?;
    let rewritten = match rewriter.rewrite(Cursor::new(input)) {
        Ok(r) => r,
        Err(e) if e.is_malformed() => {
            eprintln!("error: {} is not a valid backup archive: {}", args.input, e);
            return Ok(exit_codes::FAILURE);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to rewrite {}", args.input));
        }
    };

    write_output(&args.output, &rewritten.archive)?;
    eprintln!(
        "rewrote {} file(s), {} line(s) across {} entries",
        rewritten.files_rewritten, rewritten.lines_rewritten, rewritten.entries
    );
    Ok(exit_codes::SUCCESS)
}
