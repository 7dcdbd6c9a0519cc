//! dropdl CLI - Mirror a Dropbox folder locally.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;

use dropdl::{
    download_from_config, list_remote_paths, missing_locally_from_config, resolve_client,
    Authenticator, Config,
};

/// CLI tool for downloading a Dropbox folder tree.
#[derive(Debug, Parser)]
#[command(name = "dropdl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Dropbox app key.
    #[arg(long, global = true, env = "DROPBOX_KEY", hide_env_values = true)]
    app_key: Option<String>,

    /// Dropbox app secret.
    #[arg(long, global = true, env = "DROPBOX_SECRET", hide_env_values = true)]
    app_secret: Option<String>,

    /// Access token from a previous `auth` run.
    #[arg(long, global = true, env = "DROPBOX_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Refresh token from a previous `auth` run.
    #[arg(long, global = true, env = "DROPBOX_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    /// Regular expression of remote paths to skip (repeatable, or comma separated).
    #[arg(
        long = "exclude",
        global = true,
        env = "DROPBOX_EXCLUSIONS",
        value_delimiter = ','
    )]
    exclusions: Vec<String>,

    #[arg(global = true, long, help = "enable debug logging")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Authorize the app and print the tokens to export.
    Auth {
        /// Dropbox app key.
        #[arg(value_name = "APP_KEY", env = "DROPBOX_KEY", hide_env_values = true)]
        key: String,

        /// Dropbox app secret.
        #[arg(value_name = "APP_SECRET", env = "DROPBOX_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Download a remote folder into a local directory.
    Dl {
        /// Remote folder, e.g. /Apps/notes.
        #[arg(env = "DROPBOX_REMOTE_ROOT")]
        remote_path: String,

        /// Local destination directory.
        #[arg(env = "DROPBOX_DEST_ROOT")]
        dest_path: PathBuf,
    },

    /// List files under a remote folder.
    Ls {
        /// Remote folder.
        path: String,

        /// Also list folders.
        #[arg(long)]
        include_dirs: bool,
    },

    /// Show remote paths that are missing from a local directory.
    Diff {
        /// Remote folder.
        #[arg(env = "DROPBOX_REMOTE_ROOT")]
        remote_path: String,

        /// Local directory to compare against.
        #[arg(env = "DROPBOX_DEST_ROOT")]
        local_path: PathBuf,
    },
}

impl Cli {
    fn config(&self, remote_root: Option<&str>, dest_root: Option<&PathBuf>) -> Config {
        Config {
            app_key: self.app_key.clone(),
            app_secret: self.app_secret.clone(),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            remote_root: remote_root.map(str::to_string),
            dest_root: dest_root.cloned(),
            exclusions: self.exclusions.clone(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match &cli.command {
        Commands::Auth { key, secret } => {
            let auth = Authenticator::new(key.as_str(), secret.as_str());
            let tokens = auth
                .interactive_authorize()
                .await
                .context("Authorization failed")?;

            println!();
            println!("Authorized. Export these to skip this step next time:");
            println!("export DROPBOX_ACCESS_TOKEN={}", tokens.access_token);
            if let Some(refresh) = &tokens.refresh_token {
                println!("export DROPBOX_REFRESH_TOKEN={}", refresh);
            }
        }

        Commands::Dl {
            remote_path,
            dest_path,
        } => {
            let config = cli.config(Some(remote_path.as_str()), Some(dest_path));
            config.exclusions().context("Invalid exclusion pattern")?;
            let client = resolve_client(&config)
                .await
                .context("Failed to create Dropbox client")?;

            let summary = download_from_config(&client, &config)
                .await
                .with_context(|| {
                    format!("Failed to download {} to {:?}", remote_path, dest_path)
                })?;

            println!(
                "Downloaded {} file(s) in {} folder(s) to {:?}",
                summary.files, summary.folders, dest_path
            );
        }

        Commands::Ls { path, include_dirs } => {
            let config = cli.config(Some(path.as_str()), None);
            let exclusions = config.exclusions().context("Invalid exclusion pattern")?;
            let client = resolve_client(&config)
                .await
                .context("Failed to create Dropbox client")?;

            let remote_root = config.remote_root()?;
            let paths = list_remote_paths(&client, remote_root, *include_dirs, &exclusions)
                .await
                .with_context(|| format!("Failed to list {}", path))?;

            for p in paths {
                println!("{}", p);
            }
        }

        Commands::Diff {
            remote_path,
            local_path,
        } => {
            let config = cli.config(Some(remote_path.as_str()), Some(local_path));
            config.exclusions().context("Invalid exclusion pattern")?;
            let client = resolve_client(&config)
                .await
                .context("Failed to create Dropbox client")?;

            let missing = missing_locally_from_config(&client, &config)
                .await
                .with_context(|| {
                    format!("Failed to compare {} with {:?}", remote_path, local_path)
                })?;

            if missing.is_empty() {
                println!("Nothing missing.");
            } else {
                for p in missing {
                    println!("{}", p);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ls_with_include_dirs() {
        let cli = Cli::try_parse_from(["dropdl", "ls", "/Apps/root", "--include-dirs"]).unwrap();
        match cli.command {
            Commands::Ls { path, include_dirs } => {
                assert_eq!(path, "/Apps/root");
                assert!(include_dirs);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_dl_and_exclusions() {
        let cli = Cli::try_parse_from([
            "dropdl",
            "--exclude",
            ".*/Personal/.*,secret\\.json",
            "dl",
            "/Apps/root",
            "content",
        ])
        .unwrap();

        assert_eq!(cli.exclusions, vec![".*/Personal/.*", "secret\\.json"]);
        match &cli.command {
            Commands::Dl {
                remote_path,
                dest_path,
            } => {
                let config = cli.config(Some(remote_path.as_str()), Some(dest_path));
                assert_eq!(config.remote_root().unwrap(), "/Apps/root");
                assert_eq!(config.dest_root().unwrap(), PathBuf::from("content"));
                assert_eq!(config.exclusions.len(), 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_auth_positionals() {
        let cli = Cli::try_parse_from(["dropdl", "auth", "key123", "secret456"]).unwrap();
        match cli.command {
            Commands::Auth { key, secret } => {
                assert_eq!(key, "key123");
                assert_eq!(secret, "secret456");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_token_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["dropdl", "ls", "/x", "--access-token", "sl.abc"]).unwrap();
        assert_eq!(cli.access_token.as_deref(), Some("sl.abc"));
    }
}
