//! Backfill CLI - Command-line interface for the Backfill daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9630";

#[derive(Parser)]
#[command(name = "backfill")]
#[command(about = "Backfill batch job CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "BACKFILL_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered jobs with their state and resume position
    Jobs,

    /// Start a batch job run
    Start {
        /// Job key (e.g. wiki_content_fill)
        job_key: String,

        /// Only process items that still need work (overrides the job default)
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        missing_only: Option<bool>,
    },

    /// Request a running job to stop at the next item boundary
    Stop {
        /// Job key
        job_key: String,
    },

    /// Show live progress for a job
    Progress {
        /// Job key
        job_key: String,

        /// Poll every N seconds until the run finishes
        #[arg(short, long)]
        watch: Option<u64>,
    },

    /// Drop a job's checkpoint so the next run starts from the beginning
    Reset {
        /// Job key
        job_key: String,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Tabled)]
struct JobRow {
    job_key: String,
    state: String,
    description: String,
    checkpoint: String,
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn colorize_state(state: &str) -> String {
    match state {
        "RUNNING" => state.green().bold().to_string(),
        "COMPLETED" => state.cyan().to_string(),
        "STOPPED" => state.yellow().to_string(),
        "ERRORED" => state.red().bold().to_string(),
        _ => state.dimmed().to_string(),
    }
}

fn print_progress(result: &serde_json::Value) {
    let progress = &result["progress"];
    let state = progress["state"].as_str().unwrap_or("IDLE");

    println!("  {} {}", "State:".bold(), colorize_state(state));
    if let Some(total) = progress["total"].as_u64() {
        println!(
            "  {} {} / {}",
            "Processed:".bold(),
            progress["processed"],
            total
        );
    } else {
        println!("  {} {}", "Processed:".bold(), progress["processed"]);
    }
    println!(
        "  {} {}  {} {}  {} {}",
        "Updated:".bold(),
        progress["updated"].to_string().green(),
        "Skipped:".bold(),
        progress["skipped"].to_string().yellow(),
        "Failed:".bold(),
        progress["failed"].to_string().red(),
    );
    if let Some(current) = progress["current_item"].as_str() {
        println!("  {} {}", "Current:".bold(), current);
    }

    if let Some(recent) = result["recent"].as_array() {
        if !recent.is_empty() {
            println!();
            println!("  {}", "Recent items:".bold());
            for outcome in recent {
                let kind = outcome["kind"].as_str().unwrap_or("?");
                let mark = match kind {
                    "UPDATED" => "✓".green().to_string(),
                    "SKIPPED" => "○".yellow().to_string(),
                    _ => "✗".red().to_string(),
                };
                let label = outcome["label"].as_str().unwrap_or("");
                match outcome["detail"].as_str() {
                    Some(detail) => println!("    {} {} ({})", mark, label, detail.dimmed()),
                    None => println!("    {} {}", mark, label),
                }
            }
        }
    }
}


#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Jobs => {
            let result = call_rpc(&cli.rpc_url, "job.list.v1", json!({})).await?;

            let jobs = result["jobs"].as_array().cloned().unwrap_or_default();
            let rows: Vec<JobRow> = jobs
                .iter()
                .map(|job| JobRow {
                    job_key: job["job_key"].as_str().unwrap_or("").to_string(),
                    state: colorize_state(job["state"].as_str().unwrap_or("IDLE")),
                    description: job["description"].as_str().unwrap_or("").to_string(),
                    checkpoint: job["checkpoint"]["cursor"]
                        .as_str()
                        .map(|c| format!("after {}", c))
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();

            let table = Table::new(rows).to_string();
            println!("{}", table);
        }

        Commands::Start {
            job_key,
            missing_only,
        } => {
            let params = json!({
                "job_key": job_key,
                "missing_only": missing_only,
            });

            call_rpc(&cli.rpc_url, "job.start.v1", params).await?;

            println!("{}", format!("✓ Job {} started", job_key).green().bold());
            println!(
                "  {}",
                format!("backfill progress {} --watch 2", job_key).dimmed()
            );
        }

        Commands::Stop { job_key } => {
            let result =
                call_rpc(&cli.rpc_url, "job.stop.v1", json!({ "job_key": job_key })).await?;

            if result["stop_requested"].as_bool().unwrap_or(false) {
                println!(
                    "{}",
                    format!("✓ Stop requested for {}", job_key).green().bold()
                );
                println!("  The run stops at the next item boundary; progress is checkpointed.");
            } else {
                println!("{}", format!("Job {} is not running", job_key).yellow());
            }
        }

        Commands::Progress { job_key, watch } => loop {
            let result = call_rpc(
                &cli.rpc_url,
                "job.progress.v1",
                json!({ "job_key": job_key }),
            )
            .await?;

            println!("{}", format!("Progress: {}", job_key).cyan().bold());
            println!();
            print_progress(&result);

            let state = result["progress"]["state"].as_str().unwrap_or("IDLE");
            let interval = match watch {
                Some(secs) if state == "RUNNING" => secs,
                _ => break,
            };
            tokio::time::sleep(std::time::Duration::from_secs(interval)).await;
            println!();
        },

        Commands::Reset { job_key } => {
            call_rpc(
                &cli.rpc_url,
                "job.resetCheckpoint.v1",
                json!({ "job_key": job_key }),
            )
            .await?;

            println!(
                "{}",
                format!("✓ Checkpoint reset for {}", job_key).green().bold()
            );
            println!("  The next run starts from the beginning.");
        }
    }

    Ok(())
}
