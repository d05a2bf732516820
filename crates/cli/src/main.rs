//! CarWise CLI - Command-line interface for the CarWise Diagnosis Engine

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9630";

#[derive(Parser)]
#[command(name = "carwise")]
#[command(about = "CarWise Diagnosis Engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "CARWISE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a diagnosis request
    Diagnose {
        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Vehicle make (e.g., Toyota)
        #[arg(long)]
        make: String,

        /// Vehicle model (e.g., Corolla)
        #[arg(long)]
        model: String,

        /// Model year
        #[arg(long)]
        year: Option<i32>,

        /// Mileage in kilometers
        #[arg(long)]
        mileage: Option<i64>,

        /// Free-form symptom description
        #[arg(short, long)]
        description: String,
    },

    /// Poll a session's status
    Status {
        /// Session ID
        session_id: String,
    },

    /// Fetch the diagnosis result of a completed session
    Result {
        /// Session ID
        session_id: String,
    },

    /// Show engine statistics
    Stats,
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

#[derive(Deserialize, Tabled)]
struct SubmitResult {
    session_id: String,
    status: String,
}

#[derive(Deserialize, Tabled)]
struct StatusResult {
    session_id: String,
    status: String,
    attempts: i32,
    max_attempts: i32,
    #[tabled(display_with = "display_option")]
    last_error: Option<String>,
}

fn display_option(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
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
        .context("Failed to connect to engine")?
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

fn print_list(label: &str, items: &[serde_json::Value]) {
    println!("  {}", label.bold());
    for item in items {
        println!("    {} {}", "•".bold(), item.as_str().unwrap_or_default());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Diagnose {
            user,
            make,
            model,
            year,
            mileage,
            description,
        } => {
            let params = json!({
                "user_id": user,
                "vehicle_make": make,
                "vehicle_model": model,
                "vehicle_year": year,
                "mileage_km": mileage,
                "symptom_description": description,
            });

            let result = call_rpc(&cli.rpc_url, "diagnosis.submit.v1", params).await?;
            let submit_result: SubmitResult = serde_json::from_value(result)?;

            println!("{}", "✓ Diagnosis session submitted".green().bold());
            println!();

            let table = Table::new(vec![submit_result]).to_string();
            println!("{}", table);
        }

        Commands::Status { session_id } => {
            let params = json!({
                "session_id": session_id,
            });

            let result = call_rpc(&cli.rpc_url, "diagnosis.status.v1", params).await?;
            let status_result: StatusResult = serde_json::from_value(result)?;

            let table = Table::new(vec![status_result]).to_string();
            println!("{}", table);
        }

        Commands::Result { session_id } => {
            let params = json!({
                "session_id": session_id,
            });

            let result = call_rpc(&cli.rpc_url, "diagnosis.result.v1", params).await?;

            println!(
                "{}",
                format!("Diagnosis for session {}", session_id).cyan().bold()
            );
            println!();
            println!(
                "  {} {}",
                "Problem:".bold(),
                result["problem_title"].as_str().unwrap_or_default()
            );
            println!(
                "  {} {}",
                "Severity:".bold(),
                result["severity"].as_str().unwrap_or_default()
            );
            println!("  {} {}%", "Confidence:".bold(), result["confidence_score"]);
            if result["requires_immediate_attention"]
                .as_bool()
                .unwrap_or(false)
            {
                println!("  {}", "⚠ Requires immediate attention".red().bold());
            }
            println!();
            println!(
                "  {}",
                result["problem_description"].as_str().unwrap_or_default()
            );
            println!();

            if let Some(causes) = result["likely_causes"].as_array() {
                print_list("Likely causes:", causes);
            }
            if let Some(actions) = result["recommended_actions"].as_array() {
                print_list("Recommended actions:", actions);
            }

            if let Some(costs) = result["estimated_costs"].as_object() {
                if !costs.is_empty() {
                    println!("  {}", "Estimated costs:".bold());
                    for (item, amount) in costs {
                        println!("    {} {}: {}", "•".bold(), item, amount);
                    }
                }
            }

            println!();
            println!(
                "  {} {}",
                "Insights:".bold(),
                result["ai_insights"].as_str().unwrap_or_default()
            );
            println!(
                "  {} {} (model {})",
                "Provider:".bold(),
                result["ai_provider"].as_str().unwrap_or_default(),
                result["ai_model_version"].as_str().unwrap_or_default()
            );
        }

        Commands::Stats => {
            println!("{}", "Engine Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Pending:".bold(), stats["pending_sessions"]);
                    println!(
                        "  {} {}",
                        "Processing:".bold(),
                        stats["processing_sessions"]
                    );
                    println!("  {} {}", "Completed:".bold(), stats["completed_sessions"]);
                    println!("  {} {}", "Failed:".bold(), stats["failed_sessions"]);
                    println!();
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
