//! identmatch command-line tool.
//!
//! Resolves a commit author email to a GitHub or GitLab account, either by
//! user search or (GitHub only) through a specific commit, and generates /
//! validates configuration files.

mod signals;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use identmatch_core::config::AppConfig;
use identmatch_core::{
    matcher_from_config, Identity, LookupContext, MatchError, Matcher, Platform,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Resolve commit author emails to platform accounts.
#[derive(Parser, Debug)]
#[command(
    name = "identmatch",
    version,
    about = "Find the GitHub or GitLab account behind a commit author email"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to
    /// `<config dir>/identmatch/config.toml`, or built-in defaults when that
    /// file does not exist.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Look up the account that owns an email address.
    Email {
        /// Commit author email.
        email: String,

        /// Platform to query: github or gitlab.
        #[arg(short, long)]
        platform: Option<Platform>,

        /// Lookup deadline in seconds (0 disables it).
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Look up the account that authored a specific commit.
    Commit {
        /// Commit author email.
        email: String,

        /// Repository in `owner/name` format.
        #[arg(long)]
        repo: String,

        /// Commit SHA.
        #[arg(long)]
        sha: String,

        /// Platform to query: github or gitlab.
        #[arg(short, long)]
        platform: Option<Platform>,

        /// Lookup deadline in seconds (0 disables it).
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./identmatch.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let explicit = cli.config.is_some();
    let config_path = cli.config.or_else(default_config_path);
    let log_level = cli.log_level;

    match cli.command {
        Commands::Init { output } => {
            init_logging(log_level.as_deref().unwrap_or("warn"));
            cmd_init(&output)
        }
        Commands::Validate => {
            init_logging(log_level.as_deref().unwrap_or("warn"));
            let path =
                config_path.context("no configuration path given and no config directory")?;
            cmd_validate(&path)
        }
        Commands::Email {
            email,
            platform,
            timeout,
            json,
        } => {
            let config = load_config(config_path.as_deref(), explicit)?;
            init_logging(log_level.as_deref().unwrap_or(&config.log_level));
            let platform = platform.unwrap_or(config.lookup.default_platform);
            let matcher = build_matcher(&config, platform)?;
            let ctx = lookup_context(&config, timeout);
            cmd_email(matcher.as_ref(), &ctx, &email, json).await
        }
        Commands::Commit {
            email,
            repo,
            sha,
            platform,
            timeout,
        } => {
            let config = load_config(config_path.as_deref(), explicit)?;
            init_logging(log_level.as_deref().unwrap_or(&config.log_level));
            let platform = platform.unwrap_or(config.lookup.default_platform);
            let matcher = build_matcher(&config, platform)?;
            let ctx = lookup_context(&config, timeout);
            cmd_commit(matcher.as_ref(), &ctx, platform, &email, &repo, &sha).await
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("identmatch").join("config.toml"))
}

/// Load and resolve the configuration. A missing file at the default
/// location means built-in defaults; a missing explicit file is an error.
fn load_config(path: Option<&Path>, explicit: bool) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) if explicit || p.exists() => {
            AppConfig::load_from_file(p).context("failed to load configuration file")?
        }
        _ => AppConfig::default(),
    };
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    config.validate().context("configuration validation failed")?;
    Ok(config)
}

fn build_matcher(config: &AppConfig, platform: Platform) -> Result<Box<dyn Matcher>> {
    matcher_from_config(config, platform)
        .with_context(|| format!("failed to create {} matcher", platform))
}

/// Lookup context cancelled by Ctrl+C / SIGTERM and bounded by the
/// configured (or overridden) deadline.
fn lookup_context(config: &AppConfig, timeout_override: Option<u64>) -> LookupContext {
    let (ctx, handle) = LookupContext::with_cancel();
    signals::cancel_on_shutdown(handle);

    let timeout = match timeout_override {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.lookup.timeout(),
    };
    match timeout {
        Some(t) => ctx.with_timeout(t),
        None => ctx,
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_email(
    matcher: &dyn Matcher,
    ctx: &LookupContext,
    email: &str,
    json: bool,
) -> Result<()> {
    let result = matcher.match_by_email(ctx, email).await;
    if let Err(e) = matcher.on_idle() {
        tracing::warn!(error = %e, "matcher housekeeping failed");
    }
    let identity = result.map_err(|e| lookup_error(e, email))?;
    println!("{}", render_identity(&identity, json)?);
    Ok(())
}

async fn cmd_commit(
    matcher: &dyn Matcher,
    ctx: &LookupContext,
    platform: Platform,
    email: &str,
    repo: &str,
    sha: &str,
) -> Result<()> {
    if !matcher.supports_matching_by_commit() {
        anyhow::bail!("{} does not support matching by commit", platform);
    }
    let result = matcher.match_by_commit(ctx, email, repo, sha).await;
    if let Err(e) = matcher.on_idle() {
        tracing::warn!(error = %e, "matcher housekeeping failed");
    }
    let username = result.map_err(|e| lookup_error(e, email))?;
    println!("{}", username);
    Ok(())
}

fn lookup_error(err: MatchError, email: &str) -> anyhow::Error {
    match err {
        MatchError::Canceled => anyhow::anyhow!("lookup for {} was canceled or timed out", email),
        other => anyhow::Error::new(other).context(format!("lookup for {} failed", email)),
    }
}

fn render_identity(identity: &Identity, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(identity).context("failed to serialize identity");
    }
    Ok(match &identity.display_name {
        Some(name) => format!("{}\t{}", identity.username, name),
        None => identity.username.clone(),
    })
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    let rendered = AppConfig::default_toml().context("failed to render default config")?;
    let contents = format!(
        "# identmatch configuration\n\
         # Tokens are read from the environment variables named by `token_env`.\n\n{}",
        rendered
    );
    std::fs::write(output, contents).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Point api_url at your GitHub Enterprise / self-hosted GitLab if needed");
    println!("  2. Export the referenced token variables (GITHUB_TOKEN, GITLAB_TOKEN)");
    println!(
        "  3. Validate with: identmatch validate --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let token_state = |token: &Option<String>| {
        if token.is_some() {
            "set"
        } else {
            "NOT SET (anonymous)"
        }
    };

    println!();
    println!("Configuration summary:");
    println!("  Default platform : {}", config.lookup.default_platform);
    println!(
        "  Lookup timeout   : {}",
        match config.lookup.timeout() {
            Some(t) => format!("{}s", t.as_secs()),
            None => "none".into(),
        }
    );
    println!("  GitHub API       : {}", config.github.api_url);
    println!("  GitHub token     : {}", token_state(&config.github.token));
    println!("  GitHub noreply   : {}", config.github.noreply_domain);
    println!("  GitLab API       : {}", config.gitlab.api_url);
    println!("  GitLab token     : {}", token_state(&config.gitlab.token));

    Ok(())
}
