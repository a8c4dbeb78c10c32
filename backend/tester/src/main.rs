use anyhow::Context;
use clap::{Parser, ValueEnum};
use medigo::config::Config;
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Payment {
    Succeeded,
    Failed,
    Pending,
}

impl Payment {
    fn as_str(&self) -> &'static str {
        match self {
            Payment::Succeeded => "succeeded",
            Payment::Failed => "failed",
            Payment::Pending => "pending",
        }
    }
}

/// Submits a sample checkout to a running backend and prints the stored order.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, value_enum, default_value_t = Payment::Pending)]
    payment: Payment,

    #[arg(long, default_value_t = 42.0)]
    total: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let api = Config::load_api_client().context("Environment misconfigured!")?;

    let client = api.build_client()?;
    let endpoint = api.endpoint("/orders")?;

    let body = json!({
        "order": {
            "items": [
                { "sku": "PCM-500", "name": "Paracetamol 500mg", "quantity": 2 }
            ],
            "total": args.total,
        },
        "paymentOutcome": args.payment.as_str(),
    });

    info!("POST {endpoint}");
    let response = client.post(endpoint).json(&body).send().await?;
    let status = response.status();
    let text = response.text().await?;

    println!("Status: {status}");
    match serde_json::from_str::<Value>(&text) {
        Ok(order) => println!("{}", serde_json::to_string_pretty(&order)?),
        Err(_) => println!("{text}"),
    }

    Ok(())
}
