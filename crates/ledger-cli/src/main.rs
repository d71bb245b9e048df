use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the ledger gateway")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct Target {
    /// Gateway base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, env = "LEDGER_GATEWAY", default_value = "http://127.0.0.1:8080")]
    gateway: String,
    /// Port of the peer node to talk to
    #[arg(long)]
    port: u16,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine a block holding one transaction
    Mine {
        #[command(flatten)]
        target: Target,
        /// Sender
        #[arg(long)]
        from: String,
        /// Recipient
        #[arg(long)]
        to: String,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Print the node's chain
    Chain {
        #[command(flatten)]
        target: Target,
    },
    /// Ask whether the node's chain is valid
    Validate {
        #[command(flatten)]
        target: Target,
    },
    /// Stop the node
    Shutdown {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Serialize)]
struct Tx {
    from: String,
    to: String,
    amount: u64,
}

#[derive(Serialize)]
struct Entry {
    transaction: Tx,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let res = match cli.cmd {
        Command::Mine {
            target,
            from,
            to,
            amount,
        } => {
            let body = vec![Entry {
                transaction: Tx { from, to, amount },
            }];
            client
                .post(format!("{}/mine_block/{}", target.gateway, target.port))
                .json(&body)
                .send()
                .await?
        }
        Command::Chain { target } => {
            client
                .get(format!("{}/get_chain/{}", target.gateway, target.port))
                .send()
                .await?
        }
        Command::Validate { target } => {
            client
                .get(format!("{}/validate/{}", target.gateway, target.port))
                .send()
                .await?
        }
        Command::Shutdown { target } => {
            client
                .get(format!("{}/shutdown/{}", target.gateway, target.port))
                .send()
                .await?
        }
    };

    let status = res.status();
    let body = res.text().await?;
    debug!(%status, "gateway replied");
    println!("status: {}", status);
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
