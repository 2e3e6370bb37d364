use super::commands::Command;
use super::server::IpcHandles;
use crate::core::plan::TransitionPlan;
use crate::daemon::worker::{Reply, ReplyError, Request, WorkerResult};
use anyhow::Result;
use std::fmt::Write as _;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

const MAX_LINE: usize = 512;

const HELP: &str = "CMDS:
        - HELP | ?
        - PING
        - QUIT
        - STATUS
        - LIST
        - LOAD <id>
        - OFF
        - TOGGLE <id>
        - ACTIVE <id|*>
        - DELETE <id>
        - PREVIEW <id>
        - IMPORT <path>
        - EDIT <id|new>
        - SET <field> <value>
        - COMMIT [title]
        - REAPPLY
        - SETLOG <DEBUG|INFO|WARN|ERROR>
        - WAIT_CHANGE
 ";

fn err_line(e: &ReplyError) -> String {
    format!("ERR {} {}\n", e.code, e.message)
}

fn json_line<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => format!("{}\n", json),
        Err(e) => format!("ERR JSON {:?}\n", e),
    }
}

fn preview_text(plan: &TransitionPlan) -> String {
    let mut s = plan.batch.to_script();
    for cmd in &plan.helper {
        let _ = writeln!(s, "# helper: {}", cmd);
    }
    for cmd in &plan.deferred {
        let _ = writeln!(s, "# after restart: {}", cmd);
    }
    let _ = writeln!(
        s,
        "OK PREVIEW commands={} strategy={} reboot_required={}",
        plan.batch.len(),
        plan.strategy,
        plan.reboot_required
    );
    s
}

/// Render a worker reply for `verb`.
fn format_reply(verb: &str, result: WorkerResult) -> String {
    match result {
        Ok(Reply::Outcome(o)) => match &o.profile_id {
            Some(id) => format!("OK {} {} {}\n", verb, id, o.summary()),
            None => format!("OK {} {}\n", verb, o.summary()),
        },
        Ok(Reply::Plan(plan)) => preview_text(&plan),
        Ok(Reply::Id(id)) => format!("OK {} {}\n", verb, id),
        Ok(Reply::Active(active)) => format!("ACTIVE={}\n", active),
        Ok(Reply::List(list)) => json_line(&list),
        Ok(Reply::Status(status)) => json_line(&status),
        Ok(Reply::Scratch(scratch)) => json_line(&scratch),
        Ok(Reply::Done) => format!("OK {}\n", verb),
        Err(e) => err_line(&e),
    }
}

/// Handle a single IPC client connection.
pub async fn handle_client(stream: UnixStream, h: IpcHandles) -> Result<()> {
    let (r, mut w) = stream.into_split();
    let mut reader = BufReader::new(r);
    let mut line = String::new();
    w.write_all(b"OK ALTSCREEN IPC\n").await?;

    while reader.read_line(&mut line).await? > 0 {
        let s = line.trim();
        if s.len() > MAX_LINE {
            w.write_all(b"ERR input too long\n").await?;
            line.clear();
            continue;
        }
        let resp = match s.parse::<Command>() {
            Ok(Command::Help) => HELP.to_string(),
            Ok(Command::Ping) => "PONG\n".into(),
            Ok(Command::Quit) => {
                w.write_all(b"BYE\n").await?;
                break;
            }
            Ok(Command::Status) => format_reply("STATUS", h.worker.call(Request::Status).await),
            Ok(Command::List) => format_reply("LIST", h.worker.call(Request::List).await),
            Ok(Command::Load(id)) => format_reply("LOAD", h.worker.call(Request::Load(id)).await),
            Ok(Command::Off) => format_reply("OFF", h.worker.call(Request::TurnOff).await),
            Ok(Command::Toggle(id)) => format_reply("TOGGLE", h.worker.call(Request::Toggle(id)).await),
            Ok(Command::Active(sel)) => format_reply("ACTIVE", h.worker.call(Request::IsActive(sel)).await),
            Ok(Command::Delete(id)) => {
                let r = h.worker.call(Request::Delete(id.clone())).await;
                format_reply(&format!("DELETE {}", id), r)
            }
            Ok(Command::Preview(id)) => format_reply("PREVIEW", h.worker.call(Request::Preview(id)).await),
            Ok(Command::Import(path)) => format_reply("IMPORT", h.worker.call(Request::Import(path)).await),
            Ok(Command::Edit(id)) => format_reply("EDIT", h.worker.call(Request::Edit(id)).await),
            Ok(Command::Set(key, value)) => {
                format_reply("SET", h.worker.call(Request::SetField { key, value }).await)
            }
            Ok(Command::Commit(title)) => format_reply("COMMIT", h.worker.call(Request::Commit(title)).await),
            Ok(Command::Reapply) => format_reply("REAPPLY", h.worker.call(Request::Reapply).await),
            Ok(Command::SetLog(lvl)) => {
                (h.set_log_level)(lvl);
                format!("OK SET_LOG {}\n", lvl.to_upper_str())
            }
            Ok(Command::WaitChange) => {
                let mut rx = h.events.subscribe();
                loop {
                    match rx.recv().await {
                        Ok(event) => break format!("EVENT {}\n", event),
                        Err(RecvError::Lagged(n)) => {
                            debug!(target: "altscreen::ipc", "WAIT_CHANGE lagged by {}", n);
                            continue;
                        }
                        Err(RecvError::Closed) => break "ERR CLOSED\n".to_string(),
                    }
                }
            }
            Err(e) => {
                warn!(target: "altscreen::ipc", "Bad command '{}': {}", s, e);
                format!("ERR {}\n", e)
            }
        };
        if !resp.is_empty() {
            w.write_all(resp.as_bytes()).await?;
        }
        line.clear();
    }
    Ok(())
}
