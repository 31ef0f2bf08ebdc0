//! `templater` -- turn a ComfyUI editor snapshot into a parameter template.
//!
//! Reads one `{workflow, output}` snapshot, extracts tunable parameters,
//! and prints `{params, retained, workflow}` as JSON on stdout. Logs go to
//! stderr.
//!
//! # Environment variables
//!
//! | Variable                   | Required | Default | Description                                  |
//! |----------------------------|----------|---------|----------------------------------------------|
//! | `SNAPSHOT_PATH`            | one of   | --      | Snapshot JSON file                           |
//! | `SNAPSHOT_URL`             | one of   | --      | Snapshot JSON URL                            |
//! | `COMFYUI_API_URL`          | no       | --      | ComfyUI server used to list checkpoints      |
//! | `MODEL_NAMES`              | no       | empty   | Comma-separated fallback checkpoint names    |
//! | `DEFAULT_PARAMS_PATH`      | no       | --      | JSON array of baseline parameters            |
//! | `FIXED_CHECKPOINT_NODE_ID` | no       | `4`     | Checkpoint node left bound to the model slot |

use templater_cli::config::CliConfig;
use templater_cli::run;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "templater_cli=info,templater_comfyui=info,templater_core=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = CliConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    if let Err(e) = run::run(&config).await {
        tracing::error!(error = %format!("{e:#}"), "Templating failed");
        std::process::exit(1);
    }
}
