//! Command execution.

use crate::Commands;
use bleconf_client::Client;
use bleconf_protocol::{DeviceSetting, HubConfig};
use clap::Subcommand;
use colored::Colorize;

/// Device settings addressable from the command line.
#[derive(Subcommand)]
pub enum SetCommand {
    /// Enable or disable the microphone
    Mic { on: bool },
    /// Output volume (0-100)
    Volume { level: u8 },
    /// Enable or disable dialogue mode
    Dialogue { on: bool },
    /// Enable or disable sound effects
    Sound { on: bool },
    /// Idle timeout in minutes
    Idle { minutes: u8 },
    /// Sleep mode selector
    SleepMode { mode: u8 },
    /// Sleep interval in seconds
    SleepInterval { seconds: u32 },
    /// Rename an entity on the hub
    Name { id: String, name: String },
}

impl From<SetCommand> for DeviceSetting {
    fn from(cmd: SetCommand) -> Self {
        match cmd {
            SetCommand::Mic { on } => DeviceSetting::Mic(on),
            SetCommand::Volume { level } => DeviceSetting::Volume(level),
            SetCommand::Dialogue { on } => DeviceSetting::Dialogue(on),
            SetCommand::Sound { on } => DeviceSetting::Sound(on),
            SetCommand::Idle { minutes } => DeviceSetting::IdleTimeout(minutes),
            SetCommand::SleepMode { mode } => DeviceSetting::SleepMode(mode),
            SetCommand::SleepInterval { seconds } => DeviceSetting::SleepInterval(seconds),
            SetCommand::Name { id, name } => DeviceSetting::DeviceName { id, name },
        }
    }
}

/// Executes a one-shot command and returns the formatted output.
pub async fn execute(client: &Client, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Info => {
            let info = client.device_info().await?;
            Ok(format!(
                "{}\n{}",
                format!("Device {}", info.mac.cyan()).bold(),
                serde_json::to_string_pretty(&info)?
            ))
        }

        Commands::ConnectWifi { ssid, password } => {
            let result = client.connect_wifi(&ssid, &password).await?;
            Ok(format!(
                "{} to {}\n  MAC: {}\n  Board: {}\n  Firmware: {}",
                "Connected".green(),
                ssid.cyan(),
                result.mac,
                result.board,
                result.version.yellow()
            ))
        }

        Commands::SetEndpoint { url, auth } => {
            client.set_endpoint(&url, &auth).await?;
            Ok(format!(
                "{} endpoint {}\n{}",
                "Configured".green(),
                url.cyan(),
                "Device is leaving configuring mode and will restart".dimmed()
            ))
        }

        Commands::SetHub {
            encryption_key,
            psk,
            url,
            api_path,
            hub_token,
            mcp_endpoint,
            device_id,
        } => {
            let config = HubConfig {
                encryption_key,
                psk,
                url: url.clone(),
                api_path,
                token: hub_token,
                mcp_endpoint,
                device_id,
            };
            client.set_hub(&config).await?;
            Ok(format!("{} hub {}", "Registered with".green(), url.cyan()))
        }

        Commands::Set { setting } => {
            client.set_setting(&setting.into()).await?;
            Ok("Setting applied".green().to_string())
        }

        Commands::RotateToken { token } => {
            client.rotate_token(&token).await?;
            Ok(format!(
                "{}\n{}",
                "Token rotated".green(),
                "Use the new token for subsequent commands".dimmed()
            ))
        }

        // Streaming and local commands are handled in main.rs.
        Commands::Scan | Commands::Ota { .. } | Commands::GenToken => unreachable!(),
    }
}
