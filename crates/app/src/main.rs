use chrono::Utc;
use clap::{Parser, Subcommand};
use mediscan_core::config::{
    non_blank, DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, DEFAULT_OPENFDA_ENDPOINT,
    DEFAULT_OPENROUTER_ENDPOINT, DEFAULT_OPENROUTER_MODEL,
};
use mediscan_core::{
    expand, AnalysisCoordinator, AnalysisRequest, ExtractedInfo, GeminiVisionClient, ImageInput,
    MedicineRecord, OpenFdaClient, OpenRouterClient, Presenter, ProgressEvent, ServiceConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mediscan", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Gemini API base URL
    #[arg(long, env = "GEMINI_URL", default_value = DEFAULT_GEMINI_ENDPOINT)]
    gemini_url: String,

    /// Gemini vision model
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    gemini_model: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// openFDA drug API base URL
    #[arg(long, env = "OPENFDA_URL", default_value = DEFAULT_OPENFDA_ENDPOINT)]
    openfda_url: String,

    /// Optional openFDA API key for higher request quotas
    #[arg(long, env = "OPENFDA_API_KEY", hide_env_values = true)]
    openfda_api_key: Option<String>,

    /// OpenRouter chat completions URL
    #[arg(long, env = "OPENROUTER_URL", default_value = DEFAULT_OPENROUTER_ENDPOINT)]
    openrouter_url: String,

    /// OpenRouter fallback model
    #[arg(long, env = "OPENROUTER_MODEL", default_value = DEFAULT_OPENROUTER_MODEL)]
    openrouter_model: String,

    /// OpenRouter API key
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    openrouter_api_key: Option<String>,

    /// HTTP-Referer sent to OpenRouter
    #[arg(long, env = "MEDISCAN_REFERER")]
    referer: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Identify the medicine in a package photo.
    Analyze {
        /// Photo of the medicine package (JPG, PNG, WebP, ...).
        #[arg(long)]
        image: PathBuf,
        /// Print the final record as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the database search terms generated for a brand and/or generic name.
    Terms {
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        generic: Option<String>,
    },
}

impl Cli {
    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            gemini_endpoint: self.gemini_url.clone(),
            gemini_model: self.gemini_model.clone(),
            gemini_api_key: non_blank(self.gemini_api_key.clone()),
            openfda_endpoint: self.openfda_url.clone(),
            openfda_api_key: non_blank(self.openfda_api_key.clone()),
            openrouter_endpoint: self.openrouter_url.clone(),
            openrouter_model: self.openrouter_model.clone(),
            openrouter_api_key: non_blank(self.openrouter_api_key.clone()),
            referer: non_blank(self.referer.clone()),
            request_timeout: Duration::from_secs(self.timeout_secs.max(1)),
            ..ServiceConfig::default()
        }
    }
}

/// Prints pipeline progress and the final record to the terminal.
struct TerminalPresenter {
    json: bool,
}

impl Presenter for TerminalPresenter {
    fn reset(&self) {}

    fn progress(&self, event: &ProgressEvent) {
        let badge = if event.completed { "✓" } else { "⟳" };
        eprintln!("{badge} [{}] {}", event.step.id(), event.message);
    }

    fn result(&self, record: &MedicineRecord) {
        if self.json {
            match serde_json::to_string_pretty(record) {
                Ok(encoded) => println!("{encoded}"),
                Err(error) => eprintln!("unable to encode result: {error}"),
            }
            return;
        }

        println!("source: {}", record.source.label());
        for (label, value) in [
            ("Brand Name", &record.brand_name),
            ("Generic Name", &record.generic_name),
            ("Manufacturer", &record.manufacturer),
            ("Form", &record.form),
            ("Dosage", &record.dosage),
            ("Purpose", &record.purpose),
        ] {
            println!("{label}: {}", value.as_deref().unwrap_or("Not specified"));
        }
        if !record.active_ingredients.is_empty() {
            println!("Active Ingredients: {}", record.active_ingredients.join(", "));
        }
        if !record.warnings.is_empty() {
            println!("Warnings:");
            for warning in &record.warnings {
                println!("  - {warning}");
            }
        }
    }

    fn error(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "mediscan boot"
    );

    match &cli.command {
        Command::Analyze { image, json } => {
            let image = ImageInput::from_path(image)?;

            let config = cli.service_config();
            let coordinator = AnalysisCoordinator::new(
                GeminiVisionClient::new(&config)?,
                OpenFdaClient::new(&config)?,
                OpenRouterClient::new(&config)?,
            );

            let presenter = TerminalPresenter { json: *json };
            let request = AnalysisRequest::with_image(image);
            info!(run_id = %request.run_id, "analysis requested");

            // The presenter has already shown the error; exit non-zero without repeating it.
            if coordinator.analyze(&request, &presenter).await.is_err() {
                std::process::exit(1);
            }
        }
        Command::Terms { brand, generic } => {
            let info = ExtractedInfo {
                brand_name: non_blank(brand.clone()),
                generic_name: non_blank(generic.clone()),
                ..ExtractedInfo::default()
            };

            let terms = expand(&info);
            if terms.is_empty() {
                println!("no search terms (names too short or missing)");
            }
            for term in terms {
                println!("{term}");
            }
        }
    }

    Ok(())
}
