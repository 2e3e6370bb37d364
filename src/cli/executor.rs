use super::{app::*, client::IpcClient, output};
use crate::common::{DaemonStatus, ProfileEntry, SOCKET_PATH};
use crate::core::store::ScratchDocument;
use crate::{Context, Result};
use anyhow::bail;

/// Turn an `ERR <code> <message>` reply into an error.
fn check(resp: String) -> Result<String> {
    match resp.strip_prefix("ERR ") {
        Some(rest) => bail!("{}", rest),
        None => Ok(resp),
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    let socket = cli.socket.as_deref().unwrap_or(SOCKET_PATH);
    let client = IpcClient::with_path(socket);

    if !matches!(cli.command, Commands::Status) && !client.is_alive().await {
        bail!("Daemon is not running");
    }

    let line = cli.command.to_line();
    match cli.command {
        Commands::Status => {
            handle_status(&client).await?;
        }

        Commands::List => {
            let resp = check(client.send(&line).await?)?;
            let entries: Vec<ProfileEntry> =
                serde_json::from_str(&resp).context("Malformed LIST reply")?;
            output::print_list(&entries);
        }

        Commands::Load { .. } | Commands::Off | Commands::Toggle { .. } | Commands::Reapply => {
            let resp = check(client.send(&line).await?)?;
            output::print_success(&resp);
            if resp.contains("reboot_required=true") {
                output::print_reboot_hint();
            }
        }

        Commands::Active { .. } => {
            let resp = check(client.send(&line).await?)?;
            let active = resp.trim() == "ACTIVE=true";
            println!("{}", active);
            if !active {
                std::process::exit(1);
            }
        }

        Commands::Delete { .. } | Commands::Import { .. } | Commands::SetLog { .. } => {
            let resp = check(client.send(&line).await?)?;
            output::print_success(&resp);
        }

        Commands::Edit { .. } | Commands::Set { .. } => {
            let resp = check(client.send(&line).await?)?;
            let scratch: ScratchDocument =
                serde_json::from_str(&resp).context("Malformed scratch reply")?;
            output::print_scratch(&scratch);
        }

        Commands::Commit { .. } => {
            let resp = check(client.send(&line).await?)?;
            output::print_success(&resp);
        }

        Commands::Preview { .. } => {
            let resp = check(client.send(&line).await?)?;
            println!("{}", resp);
        }

        Commands::Wait => {
            let resp = check(client.send(&line).await?)?;
            println!("{}", resp.trim_start_matches("EVENT "));
        }

        Commands::Ping => {
            if client.ping().await? {
                output::print_success("Daemon is alive (PONG)");
            } else {
                output::print_error("Daemon not responding");
            }
        }
    }

    Ok(())
}

async fn handle_status(client: &IpcClient) -> Result<()> {
    if !client.is_alive().await {
        output::print_daemon_stopped();
        return Ok(());
    }

    let response = check(client.send("STATUS").await?)?;
    let status: DaemonStatus =
        serde_json::from_str(&response).context("Malformed STATUS reply")?;
    output::print_status(&status);
    Ok(())
}
