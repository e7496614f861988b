use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use zdb_feedback_core::{
    analyze, authenticate_backend, poll_question, FeedbackCategory, FeedbackStats,
    FeedbackSubmission, PollStats, PollSubmission, Priority, Registration, StaticInsightSource,
    POLL_QUESTIONS,
};
use zdb_feedback_store_sqlite::SqliteStore;

const CLI_CONTRACT_VERSION: &str = "zdb-cli.v1";

#[derive(Debug, Parser)]
#[command(name = "zdb")]
#[command(about = "Zukunft Digitale Bildung feedback platform CLI")]
struct Cli {
    #[arg(long, default_value = "./zdb_feedback.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    Feedback {
        #[command(subcommand)]
        command: Box<FeedbackCommand>,
    },
    Poll {
        #[command(subcommand)]
        command: PollCommand,
    },
    /// Feedback distributions and urgent-issue count (backend session).
    Stats,
    /// Analysis summary over the feedback corpus (backend session).
    Insights,
    Teacher {
        #[command(subcommand)]
        command: TeacherCommand,
    },
    Backend {
        #[command(subcommand)]
        command: BackendCommand,
    },
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate,
}

#[derive(Debug, Subcommand)]
enum FeedbackCommand {
    Submit(FeedbackSubmitArgs),
    List,
}

#[derive(Debug, Args)]
struct FeedbackSubmitArgs {
    /// Defaults to the logged-in teacher's full name.
    #[arg(long)]
    name: Option<String>,
    /// Defaults to the logged-in teacher's email.
    #[arg(long)]
    email: Option<String>,
    #[arg(long, default_value = "")]
    school: String,
    #[arg(long, default_value = "")]
    district: String,
    #[arg(long)]
    category: String,
    #[arg(long)]
    priority: String,
    #[arg(long)]
    subject: String,
    #[arg(long)]
    message: String,
    #[arg(long, default_value_t = false)]
    anonymous: bool,
}

#[derive(Debug, Subcommand)]
enum PollCommand {
    Submit(PollSubmitArgs),
    Results,
}

#[derive(Debug, Args)]
struct PollSubmitArgs {
    /// Repeated `question_id=option` pairs.
    #[arg(long = "response")]
    responses: Vec<String>,
    #[arg(long, default_value_t = false)]
    anonymous: bool,
}

#[derive(Debug, Subcommand)]
enum TeacherCommand {
    Register(TeacherRegisterArgs),
    Login(TeacherLoginArgs),
    Logout,
}

#[derive(Debug, Args)]
struct TeacherRegisterArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm_password: String,
}

#[derive(Debug, Args)]
struct TeacherLoginArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[derive(Debug, Subcommand)]
enum BackendCommand {
    Login(BackendLoginArgs),
    Logout,
}

#[derive(Debug, Args)]
struct BackendLoginArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
}

#[derive(Debug, Subcommand)]
enum SessionCommand {
    Status,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut store = SqliteStore::open(&cli.db)
        .with_context(|| format!("failed to open database {}", cli.db.display()))?;

    match cli.command {
        Command::Db { command } => run_db(&command, &mut store),
        Command::Feedback { command } => run_feedback(*command, &mut store),
        Command::Poll { command } => run_poll(command, &mut store),
        Command::Stats => run_stats(&mut store),
        Command::Insights => run_insights(&mut store),
        Command::Teacher { command } => run_teacher(command, &mut store),
        Command::Backend { command } => run_backend(&command, &mut store),
        Command::Session { command } => run_session(&command, &mut store),
    }
}

fn require_teacher_session(store: &mut SqliteStore) -> Result<()> {
    store.migrate()?;
    if store.teacher_session()?.authenticated {
        Ok(())
    } else {
        Err(anyhow!("a teacher session is required; run `zdb teacher login` first"))
    }
}

fn require_backend_session(store: &mut SqliteStore) -> Result<()> {
    store.migrate()?;
    if store.backend_session()?.authenticated {
        Ok(())
    } else {
        Err(anyhow!("a backend session is required; run `zdb backend login` first"))
    }
}

fn run_db(command: &DbCommand, store: &mut SqliteStore) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => {
            let version = store.schema_version()?;
            emit_json(serde_json::json!({ "schema_version": version }))
        }
        DbCommand::Migrate => {
            let before = store.schema_version()?;
            store.migrate()?;
            let after = store.schema_version()?;
            emit_json(serde_json::json!({
                "before_version": before,
                "after_version": after
            }))
        }
    }
}

fn run_feedback(command: FeedbackCommand, store: &mut SqliteStore) -> Result<()> {
    match command {
        FeedbackCommand::Submit(args) => run_feedback_submit(args, store),
        FeedbackCommand::List => {
            require_backend_session(store)?;
            // The store keeps insertion order; the dashboard shows newest first.
            let mut records = store.list_feedback()?;
            records.reverse();
            emit_json(serde_json::json!({
                "total": records.len(),
                "records": records
            }))
        }
    }
}

fn run_feedback_submit(args: FeedbackSubmitArgs, store: &mut SqliteStore) -> Result<()> {
    require_teacher_session(store)?;
    let session = store.teacher_session()?;

    let (name, email) = match (args.name, args.email) {
        (Some(name), Some(email)) => (name, email),
        (name, email) => {
            let identity = session
                .identity
                .ok_or_else(|| anyhow!("teacher session is missing its identity snapshot"))?;
            (
                name.unwrap_or_else(|| {
                    format!("{} {}", identity.first_name, identity.last_name)
                }),
                email.unwrap_or(identity.email),
            )
        }
    };

    let category = FeedbackCategory::parse(&args.category)
        .ok_or_else(|| anyhow!("unknown category: {}", args.category))?;
    let priority = Priority::parse(&args.priority)
        .ok_or_else(|| anyhow!("unknown priority: {} (expected dringend|hoch|mittel|niedrig)", args.priority))?;

    let record = store.append_feedback(FeedbackSubmission {
        name,
        email,
        school: args.school,
        district: args.district,
        category,
        priority,
        subject: args.subject,
        message: args.message,
        anonymous: args.anonymous,
    })?;

    emit_json(serde_json::json!({ "record": record }))
}

fn run_poll(command: PollCommand, store: &mut SqliteStore) -> Result<()> {
    match command {
        PollCommand::Submit(args) => run_poll_submit(&args, store),
        PollCommand::Results => run_poll_results(store),
    }
}

fn run_poll_submit(args: &PollSubmitArgs, store: &mut SqliteStore) -> Result<()> {
    require_teacher_session(store)?;

    let mut responses = BTreeMap::new();
    for pair in &args.responses {
        let (question_id, option) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid --response `{pair}`; expected question_id=option"))?;
        let question = poll_question(question_id)
            .ok_or_else(|| anyhow!("unknown poll question: {question_id}"))?;
        if !question.options.contains(&option) {
            return Err(anyhow!("unknown option `{option}` for poll question {question_id}"));
        }
        responses.insert(question_id.to_string(), option.to_string());
    }

    let record = store.append_poll_response(PollSubmission {
        responses,
        anonymous: args.anonymous,
    })?;
    emit_json(serde_json::json!({ "record": record }))
}

fn run_poll_results(store: &mut SqliteStore) -> Result<()> {
    require_backend_session(store)?;
    let records = store.list_poll_responses()?;
    let stats = PollStats::from_records(&records);

    let questions: Vec<Value> = POLL_QUESTIONS
        .iter()
        .map(|question| {
            let options: Vec<Value> = question
                .options
                .iter()
                .map(|option| {
                    serde_json::json!({
                        "option": option,
                        "count": stats.count(question.id, option),
                        "percentage": stats.percentage(question.id, option)
                    })
                })
                .collect();
            serde_json::json!({
                "id": question.id,
                "question": question.question,
                "total_responses": stats.total_responses(question.id),
                "options": options
            })
        })
        .collect();

    emit_json(serde_json::json!({
        "total_submissions": stats.total_submissions,
        "questions": questions
    }))
}

fn run_stats(store: &mut SqliteStore) -> Result<()> {
    require_backend_session(store)?;
    let records = store.list_feedback()?;
    let stats = FeedbackStats::from_records(&records);
    emit_json(serde_json::to_value(&stats).context("failed to serialize feedback stats")?)
}

fn run_insights(store: &mut SqliteStore) -> Result<()> {
    require_backend_session(store)?;
    let records = store.list_feedback()?;
    let stats = FeedbackStats::from_records(&records);
    match analyze(&StaticInsightSource, &stats) {
        Some(summary) => emit_json(serde_json::json!({
            "analysis": summary
        })),
        None => emit_json(serde_json::json!({
            "analysis": Value::Null,
            "message": "no feedback records to analyze"
        })),
    }
}

fn run_teacher(command: TeacherCommand, store: &mut SqliteStore) -> Result<()> {
    store.migrate()?;
    match command {
        TeacherCommand::Register(args) => {
            let identity = store.register_teacher(&Registration {
                email: args.email,
                first_name: args.first_name,
                last_name: args.last_name,
                password: args.password,
                confirm_password: args.confirm_password,
            })?;
            emit_json(serde_json::json!({ "registered": identity }))
        }
        TeacherCommand::Login(args) => {
            match store.authenticate_teacher(&args.email, &args.password)? {
                Some(identity) => {
                    store.set_teacher_session(Some(&identity))?;
                    emit_json(serde_json::json!({
                        "authenticated": true,
                        "identity": identity
                    }))
                }
                // One generic message; never reveals whether the email exists.
                None => emit_json(serde_json::json!({
                    "authenticated": false,
                    "message": "invalid credentials"
                })),
            }
        }
        TeacherCommand::Logout => {
            store.set_teacher_session(None)?;
            emit_json(serde_json::json!({ "logged_out": true }))
        }
    }
}

fn run_backend(command: &BackendCommand, store: &mut SqliteStore) -> Result<()> {
    store.migrate()?;
    match command {
        BackendCommand::Login(args) => {
            if authenticate_backend(&args.username, &args.password) {
                store.set_backend_session(Some(&args.username))?;
                emit_json(serde_json::json!({
                    "authenticated": true,
                    "username": args.username
                }))
            } else {
                emit_json(serde_json::json!({
                    "authenticated": false,
                    "message": "invalid credentials"
                }))
            }
        }
        BackendCommand::Logout => {
            store.set_backend_session(None)?;
            emit_json(serde_json::json!({ "logged_out": true }))
        }
    }
}

fn run_session(command: &SessionCommand, store: &mut SqliteStore) -> Result<()> {
    store.migrate()?;
    match command {
        SessionCommand::Status => {
            let teacher = store.teacher_session()?;
            let backend = store.backend_session()?;
            emit_json(serde_json::json!({
                "teacher": teacher,
                "backend": backend
            }))
        }
    }
}
