use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use cr_interceptor::control::proto::interceptor_rpc_service_client::InterceptorRpcServiceClient;
use cr_interceptor::control::proto::{ReplyRequest, ReprocessRequestsRequest, StopRequestsRequest};
use cr_interceptor::control::server::STATS_PATH;

#[derive(Parser)]
#[command(name = "interceptor-ctl")]
#[command(about = "Operator CLI for the interceptor's control endpoint", long_about = None)]
struct Cli {
    #[arg(short, long, env = "INTERCEPTOR_CONTROL_URL", default_value = "http://localhost:50052")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hold all traffic for a restore
    Stop,
    /// Replay unsnapshoted requests and resume traffic
    Reprocess,
    /// Report a finished snapshot, as the daemon would
    Reply {
        /// Highest sequence captured by the snapshot
        #[arg(short, long)]
        watermark: u64,

        /// Service the snapshot was taken for
        #[arg(short, long, env = "SERVICE_NAME")]
        service: String,

        /// Report the snapshot as failed
        #[arg(long)]
        failed: bool,
    },
    /// Show ledger, queue and availability state
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = cli.url.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Stop => {
            let mut client = InterceptorRpcServiceClient::connect(base).await?;
            let ack = client.stop_requests(StopRequestsRequest {}).await?;
            print_json(&ack.into_inner())
        }
        Commands::Reprocess => {
            let mut client = InterceptorRpcServiceClient::connect(base).await?;
            let ack = client.reprocess_requests(ReprocessRequestsRequest {}).await?;
            print_json(&ack.into_inner())
        }
        Commands::Reply {
            watermark,
            service,
            failed,
        } => {
            let mut client = InterceptorRpcServiceClient::connect(base).await?;
            let ack = client
                .reply(ReplyRequest {
                    status: !failed,
                    latest_request: watermark,
                    service_name: service,
                })
                .await?;
            print_json(&ack.into_inner())
        }
        Commands::Stats => {
            let res = reqwest::Client::new()
                .get(format!("{base}{STATS_PATH}"))
                .send()
                .await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: control endpoint returned status {}", status);
                if let Ok(text) = res.text().await {
                    eprintln!("Response: {}", text);
                }
                std::process::exit(1);
            }
            let json: Value = res.json().await?;
            print_json(&json)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
