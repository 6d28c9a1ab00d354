use anyhow::{Result, anyhow};
use clap::{ArgAction, Args, builder::BoolishValueParser};
use colored::Colorize;
use setup_release::api::DEFAULT_API_URL;
use setup_release::resolve::VersionRequest;
use setup_release::workflow::WorkflowEnv;
use setup_release::{Setup, SetupConfig, SetupError};
use std::path::PathBuf;

/// Install a release binary and put it on PATH
///
/// Every flag falls back to the matching `INPUT_*` variable GitHub Actions
/// sets for action inputs.
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Repository publishing the releases (owner/name)
    #[arg(long, env = "INPUT_REPO")]
    pub repo: String,

    /// Executable name (defaults to the repository name)
    #[arg(long, env = "INPUT_TOOL")]
    pub tool: Option<String>,

    /// Version to install: `latest` or a release tag
    #[arg(long = "version", env = "INPUT_VERSION", default_value = "latest")]
    pub version: String,

    /// GitHub token for API requests (defaults to GITHUB_TOKEN)
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Restore and store the binary in the tool cache
    #[arg(
        long,
        env = "INPUT_CACHE",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub cache: bool,

    /// Cache directory (defaults to $RUNNER_TOOL_CACHE/setup-release)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Installation root (defaults to $RUNNER_TEMP/setup-release)
    #[arg(long)]
    pub install_dir: Option<PathBuf>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,
}

impl InstallArgs {
    /// Resolve defaults, including the ambient CI token.
    pub fn into_config(self) -> Result<SetupConfig> {
        let mut config = SetupConfig::new(&self.repo)?;

        if let Some(tool) = self.tool.filter(|t| !t.trim().is_empty()) {
            config.tool = tool.trim().to_string();
        }
        config.version = VersionRequest::parse(&self.version);
        config.token = self
            .token
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()));
        config.cache_enabled = self.cache;
        if let Some(dir) = self.cache_dir {
            config.cache_dir = dir;
        }
        if let Some(dir) = self.install_dir {
            config.install_root = dir;
        }
        config.api_url = self.api_url;

        Ok(config)
    }
}

pub async fn install(args: InstallArgs) -> Result<()> {
    let env = WorkflowEnv::from_env();
    let config = args.into_config()?;

    println!(
        "Setting up {} ({}) from {}...",
        config.tool.bold(),
        config.version.to_string().cyan(),
        config.repo.dimmed()
    );

    let setup = Setup::from_config(&config, env.clone())?;
    match setup.run().await {
        Ok(outcome) => {
            let source = if outcome.install.cache_hit {
                "from cache".green()
            } else {
                "downloaded".yellow()
            };
            println!(
                "{} Installed {} {} for {} ({})",
                "✓".green(),
                config.tool.bold(),
                outcome.resolved.tag.bold().green(),
                outcome.platform,
                source
            );
            println!(
                "  {}",
                outcome.install.binary_path.display().to_string().dimmed()
            );
            Ok(())
        }
        Err(e) => {
            let message = format!("{} failed: {}", e.stage(), e);
            env.error(&message);
            Err(anyhow!(with_hint(message, &e)))
        }
    }
}

/// The error line followed by its hint, printed together by `main`.
fn with_hint(message: String, error: &SetupError) -> String {
    match error.hint() {
        Some(hint) => format!("{}\n  {} {}", message, "hint:".yellow(), hint),
        None => message,
    }
}
