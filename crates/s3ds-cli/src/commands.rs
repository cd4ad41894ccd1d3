use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use s3ds_aws::AwsObjectClient;
use s3ds_store::{Batch, Batching, Datastore, ResultSet, S3Config, S3Datastore};
use s3ds_types::{Entry, Key, Query};
use tracing::debug;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = cli.settings()?;
    let store = open(config).await?;
    let outcome = match cli.command {
        Command::Put(args) => cmd_put(&store, args).await,
        Command::Get(args) => cmd_get(&store, args).await,
        Command::Has(args) => cmd_has(&store, args).await,
        Command::Size(args) => cmd_size(&store, args).await,
        Command::Rm(args) => cmd_rm(&store, args).await,
        Command::Ls(args) => cmd_ls(&store, args).await,
    };
    store.close().await?;
    outcome
}

async fn open(config: S3Config) -> anyhow::Result<S3Datastore> {
    debug!(?config, "opening datastore");
    let client = AwsObjectClient::connect(&config).await;
    Ok(S3Datastore::new(config, Arc::new(client))?)
}

async fn cmd_put(store: &S3Datastore, args: PutArgs) -> anyhow::Result<()> {
    let value = match (args.value, args.file) {
        (Some(value), _) => value.into_bytes(),
        (None, Some(path)) => tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        (None, None) => anyhow::bail!("either --value or --file is required"),
    };
    let key = Key::new(args.key);
    store.put(&key, &value).await?;
    println!("{} {} ({} bytes)", "✓".green().bold(), key.to_string().bold(), value.len());
    Ok(())
}

async fn cmd_get(store: &S3Datastore, args: GetArgs) -> anyhow::Result<()> {
    let value = store.get(&Key::new(args.key)).await?;
    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &value)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            println!("{} {} bytes -> {}", "✓".green().bold(), value.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&value)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn cmd_has(store: &S3Datastore, args: KeyArgs) -> anyhow::Result<()> {
    let key = Key::new(args.key);
    if store.has(&key).await? {
        println!("{} {}", "✓".green().bold(), key);
    } else {
        println!("{} {} {}", "✗".red().bold(), key, "not found".dimmed());
    }
    Ok(())
}

async fn cmd_size(store: &S3Datastore, args: KeyArgs) -> anyhow::Result<()> {
    let size = store.get_size(&Key::new(args.key)).await?;
    println!("{size}");
    Ok(())
}

async fn cmd_rm(store: &S3Datastore, args: RmArgs) -> anyhow::Result<()> {
    if let [single] = args.keys.as_slice() {
        store.delete(&Key::new(single.as_str())).await?;
    } else {
        let mut batch = store.batch().await?;
        for key in &args.keys {
            batch.delete(Key::new(key.as_str()))?;
        }
        batch.commit().await?;
    }
    println!("{} Deleted {} key(s).", "✓".green().bold(), args.keys.len());
    Ok(())
}

async fn cmd_ls(store: &S3Datastore, args: LsArgs) -> anyhow::Result<()> {
    let mut query = Query::new(args.prefix).with_limit(args.limit).with_offset(args.offset);
    if args.keys_only {
        query = query.keys_only();
    }
    let mut results = store.query(query).await?;
    let mut count = 0usize;
    while let Some(entry) = results.next().await {
        print_entry(&entry?);
        count += 1;
    }
    results.close()?;
    println!("{}", format!("{count} entries").dimmed());
    Ok(())
}

fn print_entry(entry: &Entry) {
    let size = match (entry.size, &entry.value) {
        (Some(size), _) => size.to_string(),
        (None, Some(value)) => value.len().to_string(),
        (None, None) => "-".into(),
    };
    println!("{:>10}  {}", size.dimmed(), entry.key.to_string().yellow());
}
