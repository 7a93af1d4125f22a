// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chorus - multi-account chat session orchestration engine.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;

use std::path::PathBuf;

use chorus_config::{ChorusConfig, ConfigError};
use clap::{Parser, Subcommand};

/// Chorus - multi-account chat session orchestration engine.
#[derive(Parser, Debug)]
#[command(name = "chorus", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every enabled account session until interrupted.
    Serve,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate configuration and report every problem found.
    Check,
    /// Print the effective configuration as TOML.
    Show,
}

fn load(path: Option<&PathBuf>) -> Result<ChorusConfig, Vec<ConfigError>> {
    match path {
        Some(path) => chorus_config::load_and_validate_path(path),
        None => chorus_config::load_and_validate(),
    }
}

fn load_or_exit(path: Option<&PathBuf>) -> ChorusConfig {
    match load(path) {
        Ok(config) => config,
        Err(errors) => {
            chorus_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Effective configuration with secrets masked.
fn render_config(mut config: ChorusConfig) -> Result<String, toml::ser::Error> {
    if config.admin.api_token.is_some() {
        config.admin.api_token = Some("[redacted]".to_string());
    }
    toml::to_string_pretty(&config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = load_or_exit(cli.config.as_ref());
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config { action }) => {
            let config = load_or_exit(cli.config.as_ref());
            match action {
                ConfigAction::Check => println!("chorus: configuration is valid"),
                ConfigAction::Show => match render_config(config) {
                    Ok(rendered) => print!("{rendered}"),
                    Err(e) => {
                        eprintln!("error: cannot render configuration: {e}");
                        std::process::exit(1);
                    }
                },
            }
        }
        None => {
            println!("chorus: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_serve_with_config_path() {
        let cli = Cli::try_parse_from(["chorus", "serve", "--config", "/etc/chorus/alt.toml"])
            .unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve)));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/chorus/alt.toml")));
    }

    #[test]
    fn cli_parses_config_check() {
        let cli = Cli::try_parse_from(["chorus", "config", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Check
            })
        ));
    }

    #[test]
    fn shown_config_masks_the_admin_token() {
        let mut config = chorus_config::load_and_validate_str("").unwrap();
        config.admin.api_token = Some("s3cret".into());

        let rendered = render_config(config).unwrap();
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[redacted]"));
    }
}
