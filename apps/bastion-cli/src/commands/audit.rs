// audit.rs — Audit subcommands: tail.

use clap::{Subcommand, ValueEnum};
use serde_json::Value;

use bastion_audit::{tail, AuditStream};

use super::CliContext;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Show recent audit records of a run.
    Tail {
        #[arg(long, default_value = "default")]
        workspace: String,
        /// Run to inspect (defaults to the latest run in the workspace).
        #[arg(long)]
        run_id: Option<String>,
        /// Which log to read.
        #[arg(long, value_enum, default_value_t = StreamArg::ToolCalls)]
        stream: StreamArg,
        /// Number of records to show.
        #[arg(short, default_value = "10")]
        n: usize,
        /// Print raw JSON lines instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StreamArg {
    ToolCalls,
    AgentEvents,
}

impl From<StreamArg> for AuditStream {
    fn from(arg: StreamArg) -> Self {
        match arg {
            StreamArg::ToolCalls => AuditStream::ToolCalls,
            StreamArg::AgentEvents => AuditStream::AgentEvents,
        }
    }
}

pub fn execute(cmd: &AuditCommands, ctx: &CliContext) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Tail {
            workspace,
            run_id,
            stream,
            n,
            json,
        } => {
            let store = ctx.open_run(workspace, run_id.as_deref())?;
            let path = store
                .logs_dir()
                .join(AuditStream::from(*stream).file_name());
            if !path.exists() {
                println!("No audit log found at {}", path.display());
                return Ok(());
            }

            let recent = tail(&path, *n)?;
            if recent.is_empty() {
                println!("No audit events.");
                return Ok(());
            }

            if *json {
                for record in &recent {
                    println!("{}", serde_json::to_string(record)?);
                }
                return Ok(());
            }

            println!("{:<28} {:<26} {:<10} DETAIL", "TIMESTAMP", "EVENT", "PHASE");
            println!("{}", "-".repeat(88));
            for record in &recent {
                println!(
                    "{:<28} {:<26} {:<10} {}",
                    field(record, "timestamp"),
                    field(record, "event_type"),
                    field(record, "phase"),
                    detail(record),
                );
            }
        }
    }

    Ok(())
}

fn field<'a>(record: &'a Value, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or("-")
}

/// The most informative one-line summary of a record.
fn detail(record: &Value) -> String {
    if let Some(reason) = record
        .get("reason")
        .or_else(|| record.get("blocked_reason"))
        .and_then(Value::as_str)
    {
        return reason.to_string();
    }
    match record.get("selected_analyzers").and_then(Value::as_array) {
        Some(analyzers) => analyzers
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_prefers_block_reason() {
        let blocked = json!({"event_type": "phase_blocked_by_rule", "reason": "no vuln"});
        assert_eq!(detail(&blocked), "no vuln");

        let evaluated = json!({
            "event_type": "rules_evaluated",
            "selected_analyzers": ["a", "b"],
            "blocked_reason": null,
        });
        assert_eq!(detail(&evaluated), "a, b");
        assert_eq!(detail(&json!({})), "-");
        assert_eq!(field(&evaluated, "phase"), "-");
    }

    #[test]
    fn stream_arg_maps_to_log_file() {
        assert_eq!(
            AuditStream::from(StreamArg::AgentEvents).file_name(),
            bastion_audit::AGENT_EVENTS_FILE
        );
    }
}
