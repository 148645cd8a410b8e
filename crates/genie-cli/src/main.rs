// genie command-line entry point.
//
// Startup sequence:
// 1. Parse arguments, initialize tracing (stderr, stdout carries results)
// 2. Load config, apply the API key override
// 3. Open the document store and restore the session
// 4. Run the subcommand

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::info;

use genie_app::{assist, persist, Session};
use genie_core::config::{self, Config};
use genie_core::estimation::factors::{FactorRatings, ENVIRONMENTAL_FACTORS, TECHNICAL_FACTORS};
use genie_core::estimation::engine::BREAKDOWN_HEADERS;
use genie_core::estimation::{ActorRecord, Complexity, UseCaseRecord};
use genie_core::store::Store;
use genie_core::workspace::{research_document, WorkspaceDocument};
use genie_llm::{ChatMessage, ChatRole, LlmClient, LlmEvent};

#[derive(Parser)]
#[command(name = "genie", version, about = "Project brief governance with Use-Case-Point cost estimation")]
struct Cli {
    /// Gemini API key; overrides config/credentials.toml.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Document store path; overrides config/genie.toml.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate a project described in a TOML file and store it.
    Estimate {
        project: PathBuf,
        /// Document id to store the estimate under.
        #[arg(long, default_value = "doc-research")]
        id: String,
    },
    /// Show TCF and ECF computed from a project's factor ratings.
    Factors { project: PathBuf },
    /// Turn a brief into workspace documents (`-` reads stdin).
    Ingest { input: PathBuf },
    /// Executive readiness review of a stored document.
    Review { doc_id: String },
    /// Revise one use case with an instruction.
    Refine {
        doc_id: String,
        row: usize,
        instruction: String,
    },
    /// Chat about the stored documents.
    Chat,
    /// Write CSV sheets and a JSON snapshot for a document.
    Export {
        doc_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List stored versions of a document.
    History { doc_id: String },
    /// List stored documents.
    List,
    /// Freeze the estimate.
    Lock { name: String },
    /// Release the estimation lock.
    Unlock,
}

// ---------------------------------------------------------------------------
// Project file
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProjectFile {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    actors: Vec<ProjectActor>,
    #[serde(default)]
    use_cases: Vec<ProjectUseCase>,
    factors: Option<FactorRatings>,
}

#[derive(Debug, Deserialize)]
struct ProjectActor {
    name: String,
    classification: String,
}

#[derive(Debug, Deserialize)]
struct ProjectUseCase {
    name: String,
    classification: Option<String>,
    transactions: u32,
}

impl ProjectFile {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    fn actors(&self) -> anyhow::Result<Vec<ActorRecord>> {
        self.actors
            .iter()
            .map(|a| {
                let class = parse_class(&a.classification)
                    .with_context(|| format!("actor {}", a.name))?;
                Ok(ActorRecord::new(a.name.clone(), class))
            })
            .collect()
    }

    fn use_cases(&self) -> anyhow::Result<Vec<UseCaseRecord>> {
        self.use_cases
            .iter()
            .map(|uc| match &uc.classification {
                Some(label) => {
                    let class =
                        parse_class(label).with_context(|| format!("use case {}", uc.name))?;
                    Ok(UseCaseRecord::new(uc.name.clone(), class, uc.transactions))
                }
                None => Ok(UseCaseRecord::from_transactions(
                    uc.name.clone(),
                    uc.transactions,
                )),
            })
            .collect()
    }
}

fn parse_class(label: &str) -> anyhow::Result<Complexity> {
    match Complexity::parse(label) {
        Some(c) => Ok(c),
        None => bail!("unknown classification {label:?} (expected Simple, Average or Complex)"),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let mut config = config::load_config().context("failed to load configuration")?;
    if let Some(key) = cli.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        config.credentials.gemini_api_key = Some(key.clone());
    }
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }

    let store = open_store(&config.db_path)?;
    let mut session = Session::new(config.estimation.clone());
    persist::restore_session(&store, &mut session).context("failed to restore session")?;

    match cli.command {
        Command::Estimate { project, id } => {
            cmd_estimate(&store, &mut session, &project, &id)?;
        }
        Command::Factors { project } => cmd_factors(&project)?,
        Command::Ingest { input } => {
            let text = read_input(&input)?;
            let client = llm_client(&config)?;
            let report =
                genie_app::ingest(&client, &config, &mut session, Some(&store), &text).await?;
            print_json(&report)?;
        }
        Command::Review { doc_id } => {
            let client = llm_client(&config)?;
            let review = assist::review_document(&client, &config, &session, &doc_id).await?;
            print_json(&review)?;
        }
        Command::Refine {
            doc_id,
            row,
            instruction,
        } => {
            let client = llm_client(&config)?;
            let refined =
                assist::refine_use_case(&client, &config, &mut session, &doc_id, row, &instruction)
                    .await?;
            persist::save_document(&store, &session, &doc_id, "refine")?;
            print_json(&refined)?;
            print_breakdown(&session, &doc_id);
        }
        Command::Chat => cmd_chat(&config, &session).await?,
        Command::Export { doc_id, out } => {
            let dir = out.unwrap_or_else(|| config.export_dir.join(&doc_id));
            let paths = genie_app::export_document(&session, &doc_id, &dir)?;
            for path in [
                &paths.use_case_points,
                &paths.man_month,
                &paths.cost_estimation,
                &paths.snapshot,
            ] {
                println!("{}", path.display());
            }
        }
        Command::History { doc_id } => {
            for v in store.history(&doc_id)? {
                println!("{:>4}  {}  v{}  {}", v.seq, v.created_at, v.version, v.note);
            }
        }
        Command::List => {
            for d in store.list_documents()? {
                println!("{:<20} {:<14} {}  (updated {})", d.id, d.doc_type, d.title, d.updated_at);
            }
        }
        Command::Lock { name } => {
            let lock = session.lock(&name)?.clone();
            persist::save_lock(&store, &session)?;
            println!("locked by {} at {}", lock.locked_by, lock.locked_at);
        }
        Command::Unlock => {
            match session.unlock() {
                Some(lock) => println!("released lock held by {}", lock.locked_by),
                None => println!("estimate was not locked"),
            }
            persist::save_lock(&store, &session)?;
        }
    }

    Ok(())
}

fn open_store(path: &Path) -> anyhow::Result<Store> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = Store::open(&path.to_string_lossy()).context("failed to open document store")?;
    info!(path = %path.display(), "document store opened");
    Ok(store)
}

fn llm_client(config: &Config) -> anyhow::Result<LlmClient> {
    let client = LlmClient::from_config(config);
    match &client {
        LlmClient::Active(c) => info!(model = c.model(), "LLM client initialized"),
        LlmClient::Disabled => {
            bail!("no Gemini API key configured; set GEMINI_API_KEY or config/credentials.toml")
        }
    }
    Ok(client)
}

fn read_input(input: &Path) -> anyhow::Result<String> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut text)
            .context("failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_estimate(
    store: &Store,
    session: &mut Session,
    project_path: &Path,
    doc_id: &str,
) -> anyhow::Result<()> {
    let project = ProjectFile::load(project_path)?;
    if let Some(ratings) = &project.factors {
        let calibration = ratings.calibration()?;
        session.set_calibration(calibration.tcf, calibration.ecf)?;
        persist::save_calibration(store, session)?;
    }

    let mut doc: WorkspaceDocument =
        research_document(&project.summary, &project.actors()?, &project.use_cases()?);
    doc.id = doc_id.to_string();
    session.insert_document(doc)?;
    persist::save_document(store, session, doc_id, "estimate")?;

    print_breakdown(session, doc_id);
    Ok(())
}

fn cmd_factors(project_path: &Path) -> anyhow::Result<()> {
    let project = ProjectFile::load(project_path)?;
    let Some(ratings) = project.factors else {
        bail!("{} has no [factors] table", project_path.display());
    };
    let calibration = ratings.calibration()?;

    for (factor, rating) in TECHNICAL_FACTORS.iter().zip(&ratings.technical) {
        println!("{:<4} {:<48} w={:<4} r={rating}", factor.code, factor.name, factor.weight);
    }
    println!("TCF = {:.4}\n", calibration.tcf);
    for (factor, rating) in ENVIRONMENTAL_FACTORS.iter().zip(&ratings.environmental) {
        println!("{:<4} {:<48} w={:<4} r={rating}", factor.code, factor.name, factor.weight);
    }
    println!("ECF = {:.4}", calibration.ecf);
    Ok(())
}

fn print_breakdown(session: &Session, doc_id: &str) {
    let Some(result) = session.recalculation(doc_id) else {
        return;
    };
    let m = &result.estimate.metrics;
    println!(
        "UAW {}  UUCW {}  UUCP {}  TCF {}  ECF {}",
        m.uaw, m.uucw, m.uucp, result.estimate.calibration.tcf, result.estimate.calibration.ecf
    );
    println!(
        "UCP {:.4}  PHM {:.3}  work days {:.3}  man-months {:.4}\n",
        m.ucp, m.phm, m.work_days, m.man_months
    );

    println!("{}", BREAKDOWN_HEADERS.join(" | "));
    for row in result.estimate.table_rows() {
        println!("{}", row.join(" | "));
    }
    for warning in &result.inventory.warnings {
        eprintln!("warning: {warning}");
    }
}

async fn cmd_chat(config: &Config, session: &Session) -> anyhow::Result<()> {
    let client = llm_client(config)?;
    let system = genie_llm::prompt::chat_system_prompt(&assist::project_context(session));
    let mut history: Vec<ChatMessage> = Vec::new();
    let interactive = std::io::stdin().is_terminal();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "/quit" {
            break;
        }

        let (tx, mut rx) = mpsc::channel(256);
        let stream = client.stream_chat(&system, &history, message, tx);
        let printer = async {
            let mut reply = None;
            while let Some(event) = rx.recv().await {
                match event {
                    LlmEvent::Token { text } => {
                        print!("{text}");
                        let _ = std::io::stdout().flush();
                    }
                    LlmEvent::Complete { full_text } => reply = Some(full_text),
                    LlmEvent::Error { message } => eprintln!("\nerror: {message}"),
                }
            }
            reply
        };
        let (streamed, reply) = tokio::join!(stream, printer);
        streamed?;
        println!();

        if let Some(reply) = reply {
            history.push(ChatMessage {
                role: ChatRole::User,
                text: message.to_string(),
            });
            history.push(ChatMessage {
                role: ChatRole::Model,
                text: reply,
            });
        }
    }
    Ok(())
}

/// Log to stderr so stdout carries only command output.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("genie=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
