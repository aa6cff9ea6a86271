//! Operator CLI for the Rollcall sync core.
//!
//! # Responsibility
//! - Expose server-side protocol calls against a server database file.
//! - Drive a local client database: record, queue, replay and poll.
//! - Print results as JSON for scripting and quick local checks.

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use rollcall_core::{
    fold, init_logging, open_db, BackgroundReplayer, ChangePayload, CoreConfig, DbRole,
    DeltaSyncService, DrainOutcome, InProcessRemote, LogNotifier, PollOutcome, ReplayTrigger,
    SqliteEventLog, SyncClient, SyncError, SyncResult, TenantScope, WriteAck,
};
use serde_json::{json, Value};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "rollcall", version, about = "Attendance change-log sync tooling")]
struct Cli {
    /// JSON config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Operations on the server change log.
    #[command(subcommand)]
    Server(ServerCommand),
    /// Operations on a local client database.
    #[command(subcommand)]
    Client(ClientCommand),
}

#[derive(Debug, Subcommand)]
enum ServerCommand {
    /// Print the tenant's latest version.
    Latest(TenantArgs),
    /// Print events after a version, one page at a time.
    Changes {
        #[command(flatten)]
        tenant: TenantArgs,
        #[arg(long, default_value_t = 0)]
        since: i64,
        /// Overrides `page_limit` from the config.
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Validate and append one change.
    Append(WriteArgs),
    /// Fold the tenant's whole stream and print the projections.
    Fold(TenantArgs),
}

#[derive(Debug, Subcommand)]
enum ClientCommand {
    /// Send a change, queueing it if the write path fails.
    Record(WriteArgs),
    /// Queue a change without attempting to send it.
    Enqueue(WriteArgs),
    /// Replay the offline queue into the server log.
    Replay {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Catch up with the server log.
    Poll(TenantArgs),
    /// Print the client's cursor, projections and queue length.
    Show(TenantArgs),
}

#[derive(Debug, Args)]
struct TenantArgs {
    #[arg(long)]
    tenant: String,
}

#[derive(Debug, Args)]
struct ScopeArgs {
    #[arg(long)]
    tenant: String,
    #[arg(long)]
    actor: String,
}

#[derive(Debug, Args)]
struct WriteArgs {
    #[command(flatten)]
    scope: ScopeArgs,
    /// `ROSTER_REPLACED` or `ATTENDANCE_RECORDED`.
    #[arg(long = "type")]
    event_type: String,
    /// Payload JSON, e.g. '{"class":"3A","students":["Ana"]}'.
    #[arg(long)]
    payload: String,
}

impl ScopeArgs {
    fn to_scope(&self) -> TenantScope {
        TenantScope::new(self.tenant.as_str(), self.actor.as_str())
    }
}

impl WriteArgs {
    fn to_payload(&self) -> CliResult<ChangePayload> {
        let value: Value = serde_json::from_str(&self.payload)?;
        Ok(ChangePayload::from_value(&self.event_type, value)?)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rollcall: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = match &cli.config {
        Some(path) => CoreConfig::from_json_file(path)?,
        None => CoreConfig::default(),
    };
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, &log_dir.to_string_lossy())?;
        info!(
            "event=cli_start module=cli status=ok version={}",
            rollcall_core::core_version()
        );
    }

    match cli.command {
        Command::Server(command) => run_server(&config, command),
        Command::Client(command) => run_client(&config, command),
    }
}

fn run_server(config: &CoreConfig, command: ServerCommand) -> CliResult<()> {
    let conn = open_db(&config.server_db_path, DbRole::Server)?;
    let sync = DeltaSyncService::new(SqliteEventLog::new(&conn));

    let output = match command {
        ServerCommand::Latest(args) => json!({ "version": sync.latest_version(&args.tenant)? }),
        ServerCommand::Changes {
            tenant,
            since,
            limit,
        } => {
            let page = sync.changes_since_page(
                &tenant.tenant,
                since,
                limit.unwrap_or(config.page_limit),
            )?;
            let events = page
                .events
                .iter()
                .map(|event| event.to_wire_json())
                .collect::<Result<Vec<_>, _>>()?;
            json!({
                "events": events,
                "nextVersion": page.next_version,
                "hasMore": page.has_more,
            })
        }
        ServerCommand::Append(args) => {
            let value: Value = serde_json::from_str(&args.payload)?;
            let version = sync.append_change(
                &args.scope.tenant,
                &args.scope.actor,
                &args.event_type,
                value,
            )?;
            json!({ "version": version })
        }
        ServerCommand::Fold(args) => {
            let events = sync.changes_since(&args.tenant, 0)?;
            let projections = fold(&events, None)?;
            json!({
                "version": events.last().map_or(0, |event| event.id),
                "projections": projections,
            })
        }
    };

    print_json(&output)
}

fn run_client(config: &CoreConfig, command: ClientCommand) -> CliResult<()> {
    let client_conn = open_db(&config.client_db_path, DbRole::Client)?;

    let output = match command {
        ClientCommand::Record(args) => {
            let client = SyncClient::open(&client_conn, args.scope.tenant.as_str())?;
            let payload = args.to_payload()?;
            let ack = match open_remote(config, args.scope.to_scope()) {
                Ok(remote) => client.record(payload, &remote)?,
                Err(err) if err.is_retryable() => {
                    warn!(
                        "event=cli_record module=cli status=offline error_code={} error={}",
                        err.code(),
                        err
                    );
                    client.record_offline(payload)?
                }
                Err(err) => return Err(err.into()),
            };
            write_ack_json(ack)
        }
        ClientCommand::Enqueue(args) => {
            let client = SyncClient::open(&client_conn, args.scope.tenant.as_str())?;
            write_ack_json(client.record_offline(args.to_payload()?)?)
        }
        ClientCommand::Replay { scope } => {
            let remote = open_remote(config, scope.to_scope())?;
            let client = SyncClient::open(&client_conn, scope.tenant.as_str())?;
            let replayer = BackgroundReplayer::new(config.replay, LogNotifier);
            let report =
                replayer.on_trigger(ReplayTrigger::ConnectivityRestored, client.queue(), &remote)?;
            json!({
                "trigger": report.trigger.as_str(),
                "outcome": drain_outcome_json(&report.outcome),
            })
        }
        ClientCommand::Poll(args) => {
            let remote = open_remote(config, TenantScope::new(args.tenant.as_str(), "cli"))?;
            let mut client = SyncClient::open(&client_conn, args.tenant.as_str())?;
            let outcome = match client.poll(&remote)? {
                PollOutcome::UpToDate { version } => {
                    json!({ "status": "up_to_date", "version": version })
                }
                PollOutcome::Advanced { from, to, applied } => {
                    json!({ "status": "advanced", "from": from, "to": to, "applied": applied })
                }
            };
            json!({ "outcome": outcome, "cursor": client.cursor() })
        }
        ClientCommand::Show(args) => {
            let client = SyncClient::open(&client_conn, args.tenant.as_str())?;
            json!({
                "cursor": client.cursor(),
                "projections": client.projections(),
                "queued": client.queue().len()?,
            })
        }
    };

    print_json(&output)
}

fn open_remote(config: &CoreConfig, scope: TenantScope) -> SyncResult<InProcessRemote> {
    let conn = open_db(&config.server_db_path, DbRole::Server).map_err(SyncError::from)?;
    Ok(InProcessRemote::new(Arc::new(Mutex::new(conn)), scope))
}

fn write_ack_json(ack: WriteAck) -> Value {
    match ack {
        WriteAck::Committed { version } => json!({ "status": "committed", "version": version }),
        WriteAck::SavedPendingSync { intent_id } => {
            json!({ "status": "saved_pending_sync", "intentId": intent_id.to_string() })
        }
    }
}

fn drain_outcome_json(outcome: &DrainOutcome) -> Value {
    match outcome {
        DrainOutcome::Empty => json!({ "status": "empty" }),
        DrainOutcome::AlreadyDraining => json!({ "status": "already_draining" }),
        DrainOutcome::Drained { versions } => json!({ "status": "drained", "versions": versions }),
        DrainOutcome::Failed { failure, pending } => json!({
            "status": "failed",
            "failedIndex": failure.index,
            "errorCode": failure.error.code(),
            "error": failure.error.to_string(),
            "pending": pending,
        }),
    }
}

fn print_json(value: &Value) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
