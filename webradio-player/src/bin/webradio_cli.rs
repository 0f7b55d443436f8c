//! webradio-cli - command line client for a running web radio
//!
//! Executes one API operation and prints the result, or follows the event
//! stream with `--follow`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;
use webradio_player::client::RadioClient;

#[derive(Parser, Debug)]
#[command(name = "webradio-cli")]
#[command(about = "Command line client for the web radio API")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(long, default_value_t = 9026)]
    port: u16,

    /// Print events until interrupted
    #[arg(short, long)]
    follow: bool,

    /// API operation (lists all operations if omitted)
    api: Option<String>,

    /// Arguments as key=value
    params: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = RadioClient::new(&args.host, args.port)?;

    if args.follow {
        return follow(&client).await;
    }

    let Some(api) = args.api else {
        for name in client.api_list().await.context("Failed to query API list")? {
            println!("{}", name);
        }
        return Ok(());
    };

    let params = args
        .params
        .iter()
        .map(|param| match param.split_once('=') {
            Some((key, value)) => Ok((key.to_string(), value.to_string())),
            None => bail!("invalid argument '{}', expected key=value", param),
        })
        .collect::<Result<Vec<_>>>()?;

    let (status, body) = client
        .exec(&api, &params)
        .await
        .with_context(|| format!("Failed to execute {}", api))?;
    println!("{}", status);
    println!("{}", serde_json::to_string_pretty(&body)?);

    if status >= 400 {
        std::process::exit(1);
    }
    Ok(())
}

async fn follow(client: &RadioClient) -> Result<()> {
    let events = client.events().await.context("Failed to open event stream")?;
    tokio::pin!(events);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.next() => match event {
                Some(Ok(event)) => {
                    if event["type"] != "keep_alive" {
                        println!("{}", event["text"].as_str().unwrap_or_default());
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
        }
    }
    Ok(())
}
