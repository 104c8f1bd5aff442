//! `terminus-plugin store` - Inspect and modify the local object store.

use super::super::args::{GetArgs, ListArgs, ObjectArgs, PrefixesArgs, PutArgs, StoreArgs, StoreCmd, UrlArgs};
use super::{read_input, write_output};
use crate::exit_codes;
use anyhow::{Context, Result};
use chrono::TimeDelta;
use terminus_plugin::store::{LocalObjectStore, ObjectStore, StoreError};
use terminus_plugin::{Bytes, PluginConfig};

pub async fn run(args: StoreArgs, mut config: PluginConfig) -> Result<i32> {
    if let Some(root) = args.root {
        config.root = root;
    }
    if let StoreCmd::Get(get) = &args.cmd {
        if get.no_rewrite {
            config.rewrite_backup_archives = false;
        }
    }

    let store = LocalObjectStore::from_config(&config)
        .with_context(|| format!("failed to open store at {}", config.root.display()))?;

    match args.cmd {
        StoreCmd::Put(a) => cmd_put(&store, a).await,
        StoreCmd::Get(a) => cmd_get(&store, a).await,
        StoreCmd::Exists(a) => cmd_exists(&store, a).await,
        StoreCmd::Ls(a) => cmd_ls(&store, a).await,
        StoreCmd::Prefixes(a) => cmd_prefixes(&store, a).await,
        StoreCmd::Rm(a) => cmd_rm(&store, a).await,
        StoreCmd::Url(a) => cmd_url(&store, a).await,
    }
}

async fn cmd_put(store: &LocalObjectStore, args: PutArgs) -> Result<i32> {
    let ObjectArgs { bucket, key } = args.object;
    let body = read_input(&args.file)?;
    let size = body.len();
    store
        .put_object(&bucket, &key, Bytes::from(body))
        .await
        .with_context(|| format!("failed to upload {}/{}", bucket, key))?;
    eprintln!("uploaded {}/{} ({} bytes)", bucket, key, size);
    Ok(exit_codes::SUCCESS)
}

async fn cmd_get(store: &LocalObjectStore, args: GetArgs) -> Result<i32> {
    let ObjectArgs { bucket, key } = args.object;
    let body = match store.get_object(&bucket, &key).await {
        Ok(b) => b,
        Err(e @ StoreError::NotFound { .. }) => return Ok(not_found(&e)),
        Err(e) => return Err(e).with_context(|| format!("failed to download {}/{}", bucket, key)),
    };
    write_output(&args.out, &body)?;
    Ok(exit_codes::SUCCESS)
}

async fn cmd_exists(store: &LocalObjectStore, args: ObjectArgs) -> Result<i32> {
    let exists = store
        .object_exists(&args.bucket, &args.key)
        .await
        .with_context(|| format!("failed to check {}/{}", args.bucket, args.key))?;
    println!("{exists}");
    Ok(if exists {
        exit_codes::SUCCESS
    } else {
        exit_codes::NOT_FOUND
    })
}

async fn cmd_ls(store: &LocalObjectStore, args: ListArgs) -> Result<i32> {
    let keys = store
        .list_objects(&args.bucket, &args.prefix)
        .await
        .with_context(|| format!("failed to list {}/{}", args.bucket, args.prefix))?;
    for key in keys {
        println!("{key}");
    }
    Ok(exit_codes::SUCCESS)
}

async fn cmd_prefixes(store: &LocalObjectStore, args: PrefixesArgs) -> Result<i32> {
    let ListArgs { bucket, prefix } = args.list;
    let prefixes = store
        .list_common_prefixes(&bucket, &prefix, &args.delimiter)
        .await
        .with_context(|| format!("failed to list prefixes of {}/{}", bucket, prefix))?;
    for p in prefixes {
        println!("{p}");
    }
    Ok(exit_codes::SUCCESS)
}

async fn cmd_rm(store: &LocalObjectStore, args: ObjectArgs) -> Result<i32> {
    store
        .delete_object(&args.bucket, &args.key)
        .await
        .with_context(|| format!("failed to delete {}/{}", args.bucket, args.key))?;
    eprintln!("deleted {}/{}", args.bucket, args.key);
    Ok(exit_codes::SUCCESS)
}

async fn cmd_url(store: &LocalObjectStore, args: UrlArgs) -> Result<i32> {
    let ObjectArgs { bucket, key } = args.object;
    let ttl = TimeDelta::try_seconds(args.ttl_secs).context("ttl out of range")?;
    match store.create_signed_url(&bucket, &key, ttl).await {
        Ok(url) => {
            println!("{url}");
            Ok(exit_codes::SUCCESS)
        }
        Err(e @ StoreError::Expired { .. }) => {
            eprintln!("error: {e}");
            Ok(e.exit_code())
        }
        Err(e) => Err(e).with_context(|| format!("failed to sign {}/{}", bucket, key)),
    }
}

fn not_found(err: &StoreError) -> i32 {
    eprintln!("error: {err}");
    err.exit_code()
}
