use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use audit_report::clients::{Recommender, create_recommender};
use audit_report::config::{Config, DEFAULT_LOG_LEVEL, Provider};
use audit_report::export::{ExportFormat, TableOptions};
use audit_report::report::ImageAttachment;
use audit_report::session::ReportSession;
use audit_report::{run_batch, tui};

#[derive(Parser)]
#[command(name = "audit-report")]
#[command(about = "Build safety audit reports with AI-generated recommendations")]
struct Cli {
    /// Use canned offline recommendations instead of Gemini
    #[arg(long, global = true)]
    offline: bool,
    /// Directory for exported reports (overrides config)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal form (default)
    Interactive,
    /// Generate a single recommendation and print it
    Generate {
        /// Observation text
        #[arg(long)]
        text: String,
        /// Optional image (png, jpg, jpeg, webp)
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Build a report from a CSV worksheet (columns: Observation, Image, Priority)
    Batch {
        /// Worksheet path
        #[arg(long)]
        input: PathBuf,
        /// Which exports to write
        #[arg(long, value_enum, default_value_t = FormatChoice::All)]
        format: FormatChoice,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatChoice {
    Csv,
    Pdf,
    All,
}

impl FormatChoice {
    fn formats(self) -> Vec<ExportFormat> {
        match self {
            FormatChoice::Csv => vec![ExportFormat::Csv],
            FormatChoice::Pdf => vec![ExportFormat::Pdf],
            FormatChoice::All => ExportFormat::ALL.to_vec(),
        }
    }
}

fn init_tracing(config: &Config, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_new(&config.runtime.log_level)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    // The alternate screen owns the terminal, so interactive logs go to a file
    if interactive {
        let path = config.log_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    if cli.offline {
        config.generator.provider = Provider::Canned;
    }
    if let Some(dir) = cli.output_dir {
        config.export.output_dir = dir;
    }

    let command = cli.command.unwrap_or(Commands::Interactive);
    init_tracing(&config, matches!(command, Commands::Interactive))?;

    let recommender = create_recommender(&config)?;
    let mut session = ReportSession::new(recommender.clone()).with_table_options(TableOptions {
        include_priority: config.export.include_priority,
    });

    match command {
        Commands::Interactive => {
            info!("Starting interactive report session");
            tui::run(&mut session, &config.export.output_dir).await?;
        }
        Commands::Generate { text, image } => {
            if text.trim().is_empty() {
                bail!("Please provide a description for the observation.");
            }
            let image = image
                .map(|path| ImageAttachment::from_path(&path))
                .transpose()?;
            let recommendation = recommender.generate(&text, image.as_ref()).await?;
            println!("{}", recommendation);
        }
        Commands::Batch { input, format } => {
            let stats = run_batch(
                &mut session,
                &input,
                &format.formats(),
                &config.export.output_dir,
            )
            .await?;
            println!(
                "✅ {} row(s) read, {} added, {} skipped",
                stats.rows, stats.added, stats.skipped
            );
            for path in &stats.exported {
                println!("   wrote {}", path.display());
            }
        }
    }

    Ok(())
}
