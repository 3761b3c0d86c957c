use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use formforge_lib::{app, config_path, load_config, AppConfig, AppState};

#[derive(Parser)]
#[command(
    name = "formforge",
    about = "Turn pixel-space field overlays into fillable PDF forms",
    version
)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true, env = "FORMFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// List the form fields of a PDF and report naming problems
    Verify {
        /// PDF to inspect
        pdf: PathBuf,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = config_path(cli.config);
    let config = load_config(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Verify { pdf, output } => verify(&pdf, output.as_deref()),
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let state = AppState::from_config(&config).context("failed to open uploads directory")?;
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;

    log::info!("FormForge listening on http://{}", config.bind_address);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn verify(pdf: &Path, output: Option<&Path>) -> Result<()> {
    let result = formforge_verify::verify_file(pdf)?;
    let report = formforge_verify::render_report(&pdf.display().to_string(), &result);

    for warning in &result.warnings {
        log::warn!("{}", warning);
    }

    match output {
        Some(path) => {
            std::fs::write(path, report)
                .with_context(|| format!("failed to write {}", path.display()))?;
            log::info!(
                "{} 个字段，报告已写入 {}",
                result.fields.len(),
                path.display()
            );
        }
        None => print!("{}", report),
    }
    Ok(())
}
