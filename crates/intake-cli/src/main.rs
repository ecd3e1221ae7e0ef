mod display;

use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use intake_ai::{Coach, CoachConfig, HttpCompletionClient, TurnOutcome, parse_coach_response};
use intake_core::{
    CaseId, CaseOutputs, CaseStatus, IntakeAnswers, OutputKind, danger_signals,
};
use intake_server::{AppState, SessionStore};
use intake_store::{CaseStore, LocalSnapshotFile};
use intake_sync::{
    HttpRemoteStore, RemoteStore, RestoreMarker, SyncConfig, SyncCoordinator, SyncHandle,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "intake", version, about = "Guided intake for protective-order cases")]
struct Cli {
    /// Local snapshot file holding every case
    #[arg(long, global = true, env = "INTAKE_DATA", default_value = "intake.json")]
    data: PathBuf,

    /// Remote snapshot server, e.g. http://localhost:4000
    #[arg(long, global = true, env = "INTAKE_REMOTE_URL")]
    remote_url: Option<String>,

    /// Signed-in user. With --remote-url, changes are synced for this user.
    #[arg(long, global = true, env = "INTAKE_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Case(CaseCommand),
    /// Run the immediate-danger detector over text
    Check { text: String },
    /// Parse a raw coach reply from stdin and print the suggestion as JSON
    Parse,
    /// One-shot transfer of the whole snapshot to or from the remote
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Run the session API and snapshot server
    Serve {
        #[arg(long, default_value = "127.0.0.1:4000")]
        addr: SocketAddr,
        /// Expire sessions not updated for this many seconds
        #[arg(long)]
        session_ttl_secs: Option<u64>,
    },
}

/// Commands that read or change the local cases.
#[derive(Subcommand)]
enum CaseCommand {
    /// Start a new case from the first-screen answers
    New {
        #[arg(long)]
        relationship: Option<String>,
        /// e.g. "Safe now", "Not safe"
        #[arg(long)]
        safety: Option<String>,
        #[arg(long)]
        petitioner: Option<String>,
        #[arg(long)]
        respondent: Option<String>,
        /// Short description of what happened
        #[arg(long)]
        incident: Option<String>,
        /// Relief sought (repeatable)
        #[arg(long)]
        relief: Vec<String>,
    },
    /// List all cases
    List,
    /// Show a case card (the active case by default)
    Show {
        #[arg(long)]
        id: Option<String>,
    },
    /// Make a case the active one
    Activate { id: String },
    /// Answer the coach for the active case
    Answer {
        text: String,
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Set a case's stage (interview, summary, roadmap)
    Status {
        status: CaseStatus,
        #[arg(long)]
        id: Option<String>,
    },
    /// Store generated text for a case (caseSummary, roadmap, hearingScript, ...)
    Output {
        kind: OutputKind,
        text: String,
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Replace local state with the remote snapshot
    Pull,
    /// Overwrite the remote snapshot with local state
    Push,
}

#[derive(Args)]
struct LlmArgs {
    /// Completion endpoint
    #[arg(long, env = "INTAKE_LLM_URL")]
    llm_url: String,

    #[arg(long, env = "INTAKE_LLM_KEY", hide_env_values = true)]
    llm_key: Option<String>,

    #[arg(long, env = "INTAKE_LLM_MODEL")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("intake v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Check { text } => cmd_check(&text),
        Commands::Parse => cmd_parse(),
        Commands::Serve {
            addr,
            session_ttl_secs,
        } => cmd_serve(addr, session_ttl_secs).await,
        Commands::Sync { command } => {
            let store = open_store(&cli.data)?;
            let user = cli.user.as_deref().context("sync needs --user or INTAKE_USER")?;
            let remote_url = cli
                .remote_url
                .as_deref()
                .context("sync needs --remote-url or INTAKE_REMOTE_URL")?;
            let remote = HttpRemoteStore::new(remote_url)?;
            match command {
                SyncCommands::Pull => cmd_pull(&store, &remote, user).await,
                SyncCommands::Push => cmd_push(&store, &remote, user).await,
            }
        }
        Commands::Case(command) => {
            let store = open_store(&cli.data)?;
            let sync = start_sync(&store, &cli.data, cli.remote_url.as_deref(), cli.user.as_deref())
                .await?;
            let result = run_case_command(&store, command).await;
            if let Some(sync) = sync {
                sync.flush().await?;
                sync.shutdown().await?;
            }
            result
        }
    }
}

fn open_store(path: &Path) -> anyhow::Result<Arc<CaseStore>> {
    CaseStore::open(LocalSnapshotFile::new(path))
        .with_context(|| format!("opening {}", path.display()))
}

/// Sign in for the duration of one command when a remote and user are set.
///
/// The restore marker beside the data file makes later runs for the same
/// user skip the restore, so unpushed local edits survive.
async fn start_sync(
    store: &Arc<CaseStore>,
    data: &Path,
    remote_url: Option<&str>,
    user: Option<&str>,
) -> anyhow::Result<Option<SyncHandle>> {
    let (Some(remote_url), Some(user)) = (remote_url, user) else {
        return Ok(None);
    };
    let remote: Arc<dyn RemoteStore> = Arc::new(HttpRemoteStore::new(remote_url)?);
    let sync = SyncCoordinator::spawn_with_marker(
        store.clone(),
        remote,
        SyncConfig::default(),
        RestoreMarker::beside(data),
    )?;
    sync.sign_in(user).await?;
    Ok(Some(sync))
}

async fn run_case_command(store: &CaseStore, command: CaseCommand) -> anyhow::Result<()> {
    match command {
        CaseCommand::New {
            relationship,
            safety,
            petitioner,
            respondent,
            incident,
            relief,
        } => {
            let answers = IntakeAnswers {
                relationship_category: relationship,
                safety_status: safety,
                petitioner_name: petitioner,
                respondent_name: respondent,
                incident_summary: incident,
                relief_sought: relief,
            };
            let at_risk = answers.safety_status.is_some() && !answers.reports_safe();
            let id = store.create_case(answers);
            println!("{id}");
            if at_risk {
                eprint!("{}", display::safety_banner(&[]));
            }
        }
        CaseCommand::List => {
            let active = store.active_case_id();
            let cases = store.cases();
            if cases.is_empty() {
                println!("No cases yet. Start one with `intake new`.");
            }
            for case in &cases {
                println!("{}", display::case_row(case, active.as_ref() == Some(&case.id)));
            }
        }
        CaseCommand::Show { id } => {
            let id = resolve_case(store, id)?;
            let case = store.get(&id).with_context(|| format!("no case {id}"))?;
            let active = store.active_case_id().as_ref() == Some(&id);
            print!("{}", display::case_card(&case, active));
        }
        CaseCommand::Activate { id } => {
            store.set_active_case(&CaseId::from(id.as_str()))?;
            println!("Active case: {id}");
        }
        CaseCommand::Answer { text, id, llm } => {
            let id = resolve_case(store, id)?;
            cmd_answer(store, &id, &text, llm).await?;
        }
        CaseCommand::Status { status, id } => {
            let id = resolve_case(store, id)?;
            store.set_status(&id, status)?;
            println!("{id}: {status}");
        }
        CaseCommand::Output { kind, text, id } => {
            let id = resolve_case(store, id)?;
            store.update_outputs(&id, CaseOutputs::from([(kind, text)]))?;
            println!("{id}: saved {}", kind.label());
        }
    }
    Ok(())
}

fn resolve_case(store: &CaseStore, id: Option<String>) -> anyhow::Result<CaseId> {
    match id {
        Some(id) => Ok(CaseId::from(id)),
        None => store
            .active_case_id()
            .context("no active case; pass --id or run `intake activate <id>`"),
    }
}

async fn cmd_answer(store: &CaseStore, id: &CaseId, text: &str, llm: LlmArgs) -> anyhow::Result<()> {
    let case = store.get(id).with_context(|| format!("no case {id}"))?;

    let mut client = HttpCompletionClient::new(llm.llm_url);
    if let Some(key) = llm.llm_key {
        client = client.with_api_key(key);
    }
    let coach = Coach::new(client).with_config(CoachConfig {
        model: llm.model,
        ..Default::default()
    });

    match coach.turn(&case, text).await? {
        TurnOutcome::SafetyInterrupt {
            signals,
            suggestion,
        } => {
            println!("{}", display::safety_banner(&signals));
            if let Some(suggestion) = suggestion {
                store.apply_suggestion(id, &suggestion)?;
                print!("{}", display::suggestion(&suggestion));
            }
        }
        TurnOutcome::Suggestion(suggestion) => {
            store.apply_suggestion(id, &suggestion)?;
            print!("{}", display::suggestion(&suggestion));
        }
        TurnOutcome::RawReply(reply) => {
            println!("{reply}");
            eprintln!("(no structured facts in this reply; nothing was saved)");
        }
    }
    Ok(())
}

fn cmd_check(text: &str) -> anyhow::Result<()> {
    let signals = danger_signals(text);
    if signals.is_empty() {
        println!("No immediate-danger language found.");
    } else {
        print!("{}", display::safety_banner(&signals));
    }
    Ok(())
}

fn cmd_parse() -> anyhow::Result<()> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("reading stdin")?;
    let Some(suggestion) = parse_coach_response(&raw) else {
        bail!("no coach suggestion found in input");
    };
    println!("{}", serde_json::to_string_pretty(&suggestion)?);
    Ok(())
}

async fn cmd_pull(store: &CaseStore, remote: &HttpRemoteStore, user: &str) -> anyhow::Result<()> {
    match remote.fetch(user).await? {
        Some(snapshot) => {
            let count = snapshot.cases.len();
            store.restore(snapshot);
            println!("Pulled {count} case(s) for {user}.");
        }
        None => println!("No remote snapshot for {user}; local cases unchanged."),
    }
    Ok(())
}

async fn cmd_push(store: &CaseStore, remote: &HttpRemoteStore, user: &str) -> anyhow::Result<()> {
    let snapshot = store.snapshot();
    remote.put(user, &snapshot).await?;
    println!("Pushed {} case(s) for {user}.", snapshot.cases.len());
    Ok(())
}

async fn cmd_serve(addr: SocketAddr, session_ttl_secs: Option<u64>) -> anyhow::Result<()> {
    let mut sessions = SessionStore::new();
    if let Some(secs) = session_ttl_secs {
        sessions = sessions.with_ttl(Duration::from_secs(secs));
    }
    intake_server::serve(addr, AppState::new(sessions))
        .await
        .with_context(|| format!("serving on {addr}"))
}
