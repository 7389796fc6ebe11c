//! Command-line client for a running docdigest server.
//!
//! Posts a local PDF or a piece of text to `POST /summarize` and prints the returned summary.
use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

#[derive(Parser)]
#[command(
    name = "summarize-post",
    about = "Send a PDF or text to a docdigest server and print the summary"
)]
struct Cli {
    /// Base URL of the docdigest server.
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a PDF file.
    Pdf {
        /// Path to the PDF document.
        path: PathBuf,
    },
    /// Summarize inline text, or the contents of a text file.
    Text {
        /// Text to summarize.
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,
        /// Read the text from this file instead.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Deserialize)]
struct SummarizeReply {
    summary: Option<String>,
    error: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let endpoint = format!("{}/summarize", cli.server.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .user_agent("docdigest/summarize-post")
        .build()
        .context("failed to construct HTTP client")?;

    let request = match cli.command {
        Command::Pdf { path } => client.post(&endpoint).multipart(pdf_form(&path)?),
        Command::Text { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("failed to read text file at {}", path.display()))?,
                (None, None) => bail!("either TEXT or --file is required"),
            };
            client.post(&endpoint).json(&json!({ "text": text }))
        }
    };

    let response = request
        .send()
        .await
        .with_context(|| format!("failed to reach {endpoint}"))?;
    let status = response.status();
    let reply: SummarizeReply = response
        .json()
        .await
        .with_context(|| format!("server returned {status} with a non-JSON body"))?;

    match (reply.summary, reply.error) {
        (Some(summary), _) if status.is_success() => {
            println!("{}", summary.trim_end());
            Ok(())
        }
        (_, Some(error)) => Err(anyhow!("server returned {status}: {error}")),
        _ => Err(anyhow!("server returned {status} without a summary")),
    }
}

fn pdf_form(path: &Path) -> Result<Form> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read PDF at {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("application/pdf")
        .context("invalid MIME type")?;
    Ok(Form::new().part("file", part))
}
