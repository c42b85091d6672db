use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use bqdeploy::{
    BigQueryClient, Deployer, Substitutions, load_config, load_service_account_key,
    scan_views_directory, substitute,
};
use clap::{Parser, Subcommand};

/// Fixed alias placeholder available to every template, pointing at
/// Google's public datasets project.
const PUBLIC_DATASET_ALIAS: &str = "bigquery-public-data";

const EXAMPLE_CONFIG: &str = r#"# bqdeploy configuration: one entry per deployment environment.
default_profile: test

profiles:
  test:
    project: test_project
    creds_folder: /home/user/gcp-credentials
    creds_file_name: test_project.json

  prod:
    project: bigqueryexampleproject
    creds_folder: /home/user/gcp-credentials
    creds_file_name: bigqueryexampleproject.json
    # Dataset location region code, defaults to EU
    location: EU
"#;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "bqdeploy")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to the deployment configuration file
    #[arg(short, long, global = true, default_value = "bqdeploy.yaml")]
    config: PathBuf,
    /// Named environment profile (defaults to the config's default_profile)
    #[arg(short, long, global = true)]
    profile: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy datasets and views from a directory of SQL templates
    Deploy {
        /// Root directory: one subdirectory per dataset, one .sql file per view
        views_dir: PathBuf,
        /// Log view failures and continue instead of aborting
        #[arg(long)]
        keep_going: bool,
        /// Extra template substitutions as KEY=VALUE (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
    /// Validate the directory layout and render every template without deploying
    Check {
        /// Root directory: one subdirectory per dataset, one .sql file per view
        views_dir: PathBuf,
        /// Extra template substitutions as KEY=VALUE (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
    /// Verify credentials by requesting an access token
    Auth,
    /// Write an example configuration file
    Init {
        /// Where to write the file (defaults to bqdeploy.yaml)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init_diagnostics();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Deploy {
            views_dir,
            keep_going,
            set,
        } => deploy_command(&cli, views_dir, *keep_going, set).await,
        Commands::Check { views_dir, set } => check_command(&cli, views_dir, set),
        Commands::Auth => auth_command(&cli).await,
        Commands::Init { path } => init_command(path.as_deref()),
    }
}

async fn deploy_command(
    cli: &Cli,
    views_dir: &Path,
    keep_going: bool,
    set: &[String],
) -> Result<()> {
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let profile = config.resolve(cli.profile.as_deref())?;

    let key = load_service_account_key(profile.creds_path()).with_context(|| {
        format!(
            "failed to load credentials from {}",
            profile.creds_path().display()
        )
    })?;
    let client = BigQueryClient::connect(&key)
        .await
        .context("failed to authenticate with BigQuery")?;

    let substitutions = build_substitutions(&profile.project, set)?;
    let deployer = Deployer::new(client, &profile.project, profile.location());

    let summary = deployer
        .deploy_directory(views_dir, &substitutions, keep_going)
        .await
        .context("deployment failed")?;

    println!(
        "Deployed {} dataset(s): {} view(s) created, {} updated, {} skipped",
        summary.datasets, summary.created, summary.updated, summary.skipped
    );
    Ok(())
}

fn check_command(cli: &Cli, views_dir: &Path, set: &[String]) -> Result<()> {
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let profile = config.resolve(cli.profile.as_deref())?;
    let substitutions = build_substitutions(&profile.project, set)?;

    let datasets = scan_views_directory(views_dir)?;
    let mut checked = 0;
    let mut failures = Vec::new();

    for dataset in &datasets {
        for view in &dataset.views {
            let text = std::fs::read_to_string(&view.path)
                .with_context(|| format!("failed to read {}", view.path.display()))?;
            match substitute(&text, &substitutions) {
                Ok(_) => {
                    checked += 1;
                    println!("ok: {}.{}", dataset.name, view.name);
                }
                Err(e) => failures.push(format!("{}: {}", view.path.display(), e)),
            }
        }
    }

    if !failures.is_empty() {
        for failure in &failures {
            eprintln!("error: {failure}");
        }
        return Err(anyhow!(
            "{} of {} template(s) failed to render",
            failures.len(),
            checked + failures.len()
        ));
    }

    println!(
        "Checked {} template(s) across {} dataset(s)",
        checked,
        datasets.len()
    );
    Ok(())
}

async fn auth_command(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let profile = config.resolve(cli.profile.as_deref())?;

    println!("Loading credentials from: {}", profile.creds_path().display());
    let key = load_service_account_key(profile.creds_path())?;
    println!("Service account: {}", key.client_email);

    println!("Testing BigQuery authentication...");
    let _client = BigQueryClient::connect(&key)
        .await
        .context("authentication failed")?;

    println!("Authentication test completed successfully");
    Ok(())
}

fn init_command(path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or_else(|| Path::new("bqdeploy.yaml"));
    if path.exists() {
        return Err(anyhow!(
            "configuration file already exists at {}",
            path.display()
        ));
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote example configuration to {}", path.display());
    println!("Edit the profiles to match your projects, then run: bqdeploy deploy <views-dir>");
    Ok(())
}

/// The fixed substitution map every run gets (current project id plus the
/// public-dataset alias), extended by any --set overrides.
fn build_substitutions(project: &str, set: &[String]) -> Result<Substitutions> {
    let mut substitutions = Substitutions::new();
    substitutions.insert("project".to_string(), project.to_string());
    substitutions.insert(
        "bq_public_data_set".to_string(),
        PUBLIC_DATASET_ALIAS.to_string(),
    );

    for pair in set {
        let (key, value) = parse_substitution(pair)?;
        substitutions.insert(key, value);
    }
    Ok(substitutions)
}

fn parse_substitution(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(anyhow!(
            "invalid substitution '{pair}', expected KEY=VALUE"
        )),
    }
}
