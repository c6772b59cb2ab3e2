use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Diagnostics CLI for the BFF gateway", long_about = None)]
struct Cli {
    /// Gateway base URL.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Diagnostics mount prefix.
    #[arg(short, long, default_value = "/__gateway")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show recent forwarded calls, newest first
    Recent {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List the loaded route table
    Routes,
    /// Show version, uptime and stream usage
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!(
        "{}{}",
        cli.url.trim_end_matches('/'),
        cli.prefix.trim_end_matches('/')
    );

    let request = match cli.command {
        Commands::Recent { limit } => {
            let mut req = client.get(format!("{}/recent", base));
            if let Some(limit) = limit {
                req = req.query(&[("limit", limit)]);
            }
            req
        }
        Commands::Routes => client.get(format!("{}/routes", base)),
        Commands::Status => client.get(format!("{}/status", base)),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: diagnostics endpoint returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
