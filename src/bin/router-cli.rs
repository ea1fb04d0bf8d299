use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "router-cli")]
#[command(about = "Management CLI for the stream router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Bearer key (admin key for admin commands, host key for stream commands).
    #[arg(short, long, default_value = "")]
    key: String,

    /// Account the admin commands act as.
    #[arg(short, long)]
    caller: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show router status
    Status,
    /// Show the router's net flow
    NetFlow,
    /// Show the outbound flow to a recipient
    Flow { recipient: String },
    /// Show a recipient's registration and contributions
    Recipient { address: String },
    /// List per-contributor totals for a recipient
    Contributions { recipient: String },
    /// List recorded anomalies
    Anomalies,
    /// Register a recipient (admin)
    Register { address: String },
    /// Create the distribution index (admin)
    InitDistribution,
    /// Recompute distribution units (admin)
    RefreshDistribution,
    /// Write a state snapshot (admin)
    Snapshot,
    /// Open a stream to the router (host)
    Open {
        contributor: String,
        rate: String,
        recipient: String,
    },
    /// Change a stream's rate or recipient (host)
    Update {
        contributor: String,
        rate: String,
        #[arg(long)]
        recipient: Option<String>,
    },
    /// Close a stream (host)
    Close { contributor: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }
    if let Some(caller) = &cli.caller {
        headers.insert("x-caller-address", HeaderValue::from_str(caller)?);
    }
    let url = cli.url.trim_end_matches('/');

    let request = match cli.command {
        Commands::Status => client.get(format!("{url}/status")),
        Commands::NetFlow => client.get(format!("{url}/flows/net")),
        Commands::Flow { recipient } => client.get(format!("{url}/flows/{recipient}")),
        Commands::Recipient { address } => client.get(format!("{url}/recipients/{address}")),
        Commands::Contributions { recipient } => {
            client.get(format!("{url}/recipients/{recipient}/contributions"))
        }
        Commands::Anomalies => client.get(format!("{url}/anomalies")),
        Commands::Register { address } => client
            .post(format!("{url}/admin/recipients"))
            .json(&json!({ "address": address })),
        Commands::InitDistribution => client.post(format!("{url}/admin/distribution")),
        Commands::RefreshDistribution => client.post(format!("{url}/admin/distribution/refresh")),
        Commands::Snapshot => client.post(format!("{url}/admin/snapshot")),
        Commands::Open {
            contributor,
            rate,
            recipient,
        } => client.post(format!("{url}/streams")).json(&json!({
            "contributor": contributor,
            "rate": rate,
            "recipient": recipient,
        })),
        Commands::Update {
            contributor,
            rate,
            recipient,
        } => client
            .put(format!("{url}/streams/{contributor}"))
            .json(&json!({ "rate": rate, "recipient": recipient })),
        Commands::Close { contributor } => client.delete(format!("{url}/streams/{contributor}")),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: router returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
