use clap::Parser;
use dotenv::dotenv;
use log::info;
use lumi_chat::cli::ClientArgs;
use lumi_chat::client::ProxyClient;
use lumi_chat::fallback::FallbackResponder;
use lumi_chat::ui::TerminalApp;
use std::error::Error;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    let args = ClientArgs::parse();
    let default_filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let client = ProxyClient::new(&args.server_url, Duration::from_secs(args.timeout_secs.max(1)))?;
    info!("Using chat proxy at {} (timeout {}s)", args.server_url, client.timeout().as_secs());
    let fallback = match args.seed {
        Some(seed) => FallbackResponder::with_seed(seed),
        None => FallbackResponder::new(),
    };

    let (interrupt_tx, interrupts) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt_tx.send(()).is_err() {
                break;
            }
        }
    });

    let mut app = TerminalApp::new(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        interrupts,
        client,
        fallback
    );
    app.run().await?;
    // The pending stdin read lives on a blocking thread that runtime shutdown would wait for.
    std::process::exit(0)
}
