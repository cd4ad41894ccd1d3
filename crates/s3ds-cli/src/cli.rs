use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use s3ds_store::S3Config;

#[derive(Parser)]
#[command(
    name = "s3ds",
    about = "Ordered key-value datastore on S3-compatible object storage",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML file with connection settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Flags that take precedence over the configuration file.
#[derive(Args, Default)]
pub struct Overrides {
    #[arg(long, global = true)]
    pub bucket: Option<String>,
    #[arg(long, global = true)]
    pub region: Option<String>,
    /// Custom endpoint, e.g. a local MinIO
    #[arg(long, global = true)]
    pub endpoint: Option<String>,
    /// Root directory inside the bucket
    #[arg(long, global = true)]
    pub root: Option<String>,
    /// Worker pool size for batch commits
    #[arg(long, global = true)]
    pub workers: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, mut config: S3Config) -> S3Config {
        if let Some(bucket) = &self.bucket {
            config.bucket = bucket.clone();
        }
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if let Some(root) = &self.root {
            config.root_directory = root.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config
    }
}

impl Cli {
    /// Datastore settings: the config file (if any) with flag overrides applied.
    pub fn settings(&self) -> anyhow::Result<S3Config> {
        let base = match &self.config {
            Some(path) => S3Config::load(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => S3Config::default(),
        };
        let config = self.overrides.apply(base);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a value under a key
    Put(PutArgs),
    /// Print the value stored under a key
    Get(GetArgs),
    /// Check whether a key exists
    Has(KeyArgs),
    /// Print the size of a stored value in bytes
    Size(KeyArgs),
    /// Delete one or more keys
    Rm(RmArgs),
    /// List keys under a prefix
    Ls(LsArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub key: String,
    /// Value given inline
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub value: Option<String>,
    /// Read the value from a file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
    /// Write the value to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct RmArgs {
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "/")]
    pub prefix: String,
    #[arg(short = 'n', long, default_value = "0")]
    pub limit: usize,
    #[arg(long, default_value = "0")]
    pub offset: usize,
    /// Skip fetching values
    #[arg(long)]
    pub keys_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_put_inline() {
        let cli = Cli::try_parse_from(["s3ds", "put", "/a", "--value", "hello"]).unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.key, "/a");
            assert_eq!(args.value.as_deref(), Some("hello"));
            assert!(args.file.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn put_needs_a_value() {
        assert!(Cli::try_parse_from(["s3ds", "put", "/a"]).is_err());
        assert!(Cli::try_parse_from(["s3ds", "put", "/a", "--value", "x", "--file", "f"]).is_err());
    }

    #[test]
    fn parse_rm_many() {
        let cli = Cli::try_parse_from(["s3ds", "rm", "/a", "/b", "/c"]).unwrap();
        if let Command::Rm(args) = cli.command {
            assert_eq!(args.keys, vec!["/a", "/b", "/c"]);
        } else { panic!("wrong command"); }
        assert!(Cli::try_parse_from(["s3ds", "rm"]).is_err());
    }

    #[test]
    fn parse_ls_defaults() {
        let cli = Cli::try_parse_from(["s3ds", "ls"]).unwrap();
        if let Command::Ls(args) = cli.command {
            assert_eq!(args.prefix, "/");
            assert_eq!(args.limit, 0);
            assert_eq!(args.offset, 0);
            assert!(!args.keys_only);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_ls_paging() {
        let cli = Cli::try_parse_from(["s3ds", "ls", "/photos", "-n", "5", "--offset", "10", "--keys-only"]).unwrap();
        if let Command::Ls(args) = cli.command {
            assert_eq!(args.prefix, "/photos");
            assert_eq!(args.limit, 5);
            assert_eq!(args.offset, 10);
            assert!(args.keys_only);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["s3ds", "has", "/a", "--bucket", "b", "--workers", "4", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.overrides.bucket.as_deref(), Some("b"));
        assert_eq!(cli.overrides.workers, Some(4));
    }

    #[test]
    fn settings_from_flags_only() {
        let cli = Cli::try_parse_from(["s3ds", "--bucket", "b", "--root", "data", "size", "/a"]).unwrap();
        let config = cli.settings().unwrap();
        assert_eq!(config.bucket, "b");
        assert_eq!(config.root_directory, "data");
    }

    #[test]
    fn settings_without_bucket_fail() {
        let cli = Cli::try_parse_from(["s3ds", "get", "/a"]).unwrap();
        assert!(cli.settings().is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bucket = \"from-file\"\nregion = \"eu-west-1\"\nworkers = 8").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::try_parse_from(["s3ds", "--config", &path, "--bucket", "from-flag", "ls"]).unwrap();
        let config = cli.settings().unwrap();
        assert_eq!(config.bucket, "from-flag");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.workers, 8);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let cli = Cli::try_parse_from(["s3ds", "--config", "/nonexistent/s3ds.toml", "ls"]).unwrap();
        let err = cli.settings().unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
