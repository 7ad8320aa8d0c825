//! bleconf-cli - Command-line provisioning tool for bleconf devices.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use bleconf_client::{Client, ConnectionConfig, PushEvent};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bleconf-cli")]
#[command(about = "Provisioning tool for bleconf devices")]
#[command(version)]
struct Cli {
    /// Device address
    #[arg(short, long, default_value = "127.0.0.1:7630")]
    server: SocketAddr,

    /// Session token (32 characters)
    #[arg(short = 't', long, env = "BLECONF_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query device identity and settings
    Info,

    /// Stream access-point scan results
    Scan,

    /// Provision Wi-Fi credentials
    ConnectWifi {
        /// Network SSID
        #[arg(short, long)]
        ssid: String,

        /// Network password
        #[arg(short, long)]
        password: String,
    },

    /// Configure the reporting endpoint (finalizes provisioning)
    SetEndpoint {
        /// Endpoint URL
        url: String,

        /// Endpoint auth token
        #[arg(short, long, default_value = "")]
        auth: String,
    },

    /// Register the device with a third-party hub
    SetHub {
        #[arg(long, default_value = "")]
        encryption_key: String,

        #[arg(long, default_value = "")]
        psk: String,

        #[arg(long)]
        url: String,

        #[arg(long, default_value = "/api/v1")]
        api_path: String,

        #[arg(long, default_value = "")]
        hub_token: String,

        #[arg(long, default_value = "")]
        mcp_endpoint: String,

        #[arg(long)]
        device_id: String,
    },

    /// Start an OTA update and stream progress
    Ota {
        /// Firmware image URL
        url: String,

        /// Target version
        version: String,
    },

    /// Change a device setting
    Set {
        #[command(subcommand)]
        setting: commands::SetCommand,
    },

    /// Rotate the session token (device must be in configuring mode)
    RotateToken {
        /// The new 32-character token
        token: String,
    },

    /// Generate a random 32-character session token
    GenToken,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Handled locally, no device connection needed.
    if let Commands::GenToken = cli.command {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(bleconf_protocol::TOKEN_LEN)
            .map(char::from)
            .collect();
        println!("{}", token);
        return Ok(());
    }

    let mut config = ConnectionConfig::new(cli.server);
    if let Some(ref token) = cli.token {
        config = config.with_token(token);
    }
    let client = Client::new(config);

    client.connect().await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    // Subscribe before the read loop starts so no push is missed.
    let mut push_rx = client.connection().subscribe_push();
    let conn = client.connection();
    tokio::spawn(async move {
        let _ = conn.read_loop().await;
    });
    tokio::task::yield_now().await;

    match cli.command {
        Commands::GenToken => unreachable!(), // handled above

        Commands::Scan => {
            client.start_ap_push().await.map_err(|e| {
                eprintln!("{}: {}", "Error".red(), e);
                e
            })?;
            eprintln!("{}", "Press Ctrl+C to stop...".dimmed());

            loop {
                tokio::select! {
                    event = push_rx.recv() => {
                        match event {
                            Ok(PushEvent::AccessPoints(aps)) => {
                                for ap in aps {
                                    println!(
                                        "{:<32} {:>4} dBm  auth {}",
                                        ap.ssid.cyan(),
                                        ap.rssi,
                                        ap.authmode
                                    );
                                }
                                println!();
                            }
                            Ok(_) => {}
                            Err(_) => {
                                eprintln!("{}", "Connection closed".red());
                                break;
                            }
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            client.close().await?;
        }

        Commands::Ota { url, version } => {
            client.start_ota(&url, &version).await.map_err(|e| {
                eprintln!("{}: {}", "Error".red(), e);
                e
            })?;
            eprintln!("{} {} -> {}", "Updating".green(), url, version.cyan());

            loop {
                tokio::select! {
                    event = push_rx.recv() => {
                        match event {
                            Ok(PushEvent::OtaProgress(p)) => {
                                println!("{:>3}% ({} bytes)", p.percent, p.bytes_read);
                                if p.percent >= 100 {
                                    println!("{}", "Update complete".green());
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(_) => {
                                eprintln!("{}", "Connection closed".red());
                                break;
                            }
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            client.close().await?;
        }

        cmd => {
            let result = commands::execute(&client, cmd).await;
            match result {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }
            client.close().await?;
        }
    }

    Ok(())
}
