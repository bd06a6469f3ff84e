use std::error::Error;
use std::path::Path;
use std::process::ExitCode;

use ai_llm_service::{LlmClient, config::default_config::config_from_env, telemetry};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use colored::Colorize;
use doc_analyzer::{
    AnalysisError, AnalysisRequest, AnalysisResponse, AnalyzerConfig, DocumentAnalyzer,
    FailureCategory,
};
use tokio::io::AsyncReadExt;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const OUR_TARGETS: &[&str] = &[telemetry::TARGET_PREFIX, "doc_analyzer", "docqa_backend"];

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // A missing .env is fine; a broken one is not.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    tracing_subscriber::registry()
        .with(telemetry::env_filter_with_level("info", OUR_TARGETS, Level::INFO))
        .with(telemetry::layer(OUR_TARGETS))
        .with(telemetry::foreign_layer(OUR_TARGETS))
        .try_init()?;

    let client = LlmClient::from_config(config_from_env()?)?;
    tracing::info!(provider = ?client.provider(), model = client.model(), "model backend ready");
    let analyzer = DocumentAnalyzer::new(AnalyzerConfig::from_env()?, client);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.as_slice() {
        [] => {
            let mut input = String::new();
            tokio::io::stdin().read_to_string(&mut input).await?;
            let candidate: serde_json::Value = serde_json::from_str(&input)?;
            analyzer.analyze_value(&candidate).await
        }
        [file, question @ ..] if !question.is_empty() => {
            let req = request_from_file(Path::new(file), &question.join(" ")).await?;
            analyzer.analyze(&req).await
        }
        _ => {
            eprintln!("{} docqa-backend <file> <question...>", "usage:".bold());
            eprintln!("       docqa-backend < request.json");
            return Ok(ExitCode::from(64));
        }
    };

    Ok(report(result))
}

/// Reads `path` and wraps it in a `data:` envelope.
async fn request_from_file(path: &Path, question: &str) -> Result<AnalysisRequest, Box<dyn Error>> {
    let mime = mime_for_path(path)
        .ok_or_else(|| format!("cannot tell the document type of {}", path.display()))?;
    let bytes = tokio::fs::read(path).await?;
    let envelope = format!("data:{mime};base64,{}", STANDARD.encode(bytes));
    Ok(AnalysisRequest::new(envelope, question))
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => return None,
    };
    Some(mime)
}

fn report(result: Result<AnalysisResponse, AnalysisError>) -> ExitCode {
    match result {
        Ok(resp) => match serde_json::to_string_pretty(&resp) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{} {e}", "error:".red().bold());
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            eprintln!("{} [{}] {err}", "error:".red().bold(), err.code().yellow());
            ExitCode::from(exit_status(err.category()))
        }
    }
}

fn exit_status(category: FailureCategory) -> u8 {
    match category {
        FailureCategory::BadInput => 1,
        FailureCategory::BackendUnavailable => 2,
        FailureCategory::UnusableOutput => 3,
    }
}
