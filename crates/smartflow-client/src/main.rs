//! `smartflow`: command-line client for the update-request portal.
//!
//! # Usage
//!
//! ```
//! smartflow login --aadhaar 123456789012 --password password123
//! smartflow submit --type phone_change --value 9876543210 --doc proof.pdf
//! smartflow list
//! smartflow login --officer officer1@uidai.gov.in --password password123
//! smartflow queue
//! smartflow --config ~/.config/smartflow/config.toml approve REQ20250105101500A1B2C3
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use smartflow_client::{ApiClient, ClientConfig, Document, SessionContext, UploadPolicy};
use smartflow_core::{
  lifecycle::OfficerAction,
  request::{RequestStats, UpdateRequest, UpdateSubmission, UpdateType},
  session::Credentials,
};
use smartflow_store_sqlite::SqliteSessionStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "smartflow", about = "Client for the SmartFlow update-request portal")]
struct Args {
  /// Path to a TOML config file (url, store_path, timeout_secs).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the server (default: http://127.0.0.1:5000).
  #[arg(long, env = "SMARTFLOW_URL")]
  url: Option<String>,

  /// Session database (default: ~/.local/share/smartflow/session.db).
  #[arg(long, env = "SMARTFLOW_STORE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Log in as a citizen (--aadhaar) or an officer (--officer).
  Login {
    #[arg(long, conflicts_with = "officer", required_unless_present = "officer")]
    aadhaar:  Option<String>,
    /// Officer email or officer id.
    #[arg(long)]
    officer:  Option<String>,
    #[arg(long, env = "SMARTFLOW_PASSWORD", hide_env_values = true)]
    password: String,
  },
  /// End the session and clear stored data.
  Logout,
  /// Show the current principal.
  Whoami,
  /// Submit an update request.
  Submit {
    #[arg(long = "type")]
    update_type:    UpdateType,
    /// New value; for address changes use the --street group instead.
    #[arg(long, required_unless_present = "street")]
    value:          Option<String>,
    #[arg(long, requires_all = ["city", "state", "pincode"])]
    street:         Option<String>,
    #[arg(long)]
    city:           Option<String>,
    #[arg(long)]
    state:          Option<String>,
    #[arg(long)]
    pincode:        Option<String>,
    /// Supporting document; repeat for several.
    #[arg(long = "doc")]
    documents:      Vec<PathBuf>,
    /// Do not submit unless every document uploads.
    #[arg(long)]
    all_or_nothing: bool,
  },
  /// Show one request.
  Show { request_id: String },
  /// List your requests (served from cache with --offline).
  List {
    #[arg(long)]
    offline: bool,
  },
  /// Show the officer review queue.
  Queue,
  /// Approve a request under review.
  Approve { request_id: String },
  /// Reject a request under review.
  Reject {
    request_id: String,
    #[arg(long)]
    reason:     String,
  },
  /// Ask the citizen for more information.
  RequestInfo {
    request_id: String,
    #[arg(long)]
    comment:    String,
  },
  /// Show notifications.
  Notifications,
}

// ─── Config file ──────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:          Option<String>,
  #[serde(default)]
  store_path:   Option<PathBuf>,
  #[serde(default)]
  timeout_secs: Option<u64>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let mut builder = config::Config::builder();
  if let Some(path) = &args.config {
    builder = builder.add_source(config::File::from(path.as_path()));
  }
  let file_cfg: ConfigFile = builder
    .add_source(config::Environment::with_prefix("SMARTFLOW"))
    .build()
    .context("reading config")?
    .try_deserialize()
    .context("parsing config")?;

  // CLI flags override the config file, which overrides defaults.
  let base_url = args
    .url
    .or(file_cfg.url)
    .unwrap_or_else(|| "http://127.0.0.1:5000".to_owned());
  let store_path = args
    .store
    .or(file_cfg.store_path)
    .unwrap_or_else(|| PathBuf::from("~/.local/share/smartflow/session.db"));
  let store_path = expand_tilde(&store_path);
  if let Some(parent) = store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("creating {}", parent.display()))?;
  }

  let store = SqliteSessionStore::open(&store_path)
    .await
    .with_context(|| format!("opening session store at {}", store_path.display()))?;
  let session = SessionContext::init(store).await.context("loading session")?;

  let mut config = ClientConfig::new(base_url);
  if let Some(secs) = file_cfg.timeout_secs {
    config.timeout = std::time::Duration::from_secs(secs);
  }
  let client = ApiClient::new(config, session).context("building HTTP client")?;

  run(&client, args.command).await
}

async fn run(client: &ApiClient<SqliteSessionStore>, command: Command) -> Result<()> {
  match command {
    Command::Login { aadhaar, officer, password } => {
      let creds = match (aadhaar, officer) {
        (Some(a), _) => Credentials::citizen(a, password),
        (None, Some(o)) => Credentials::officer(o, password),
        (None, None) => bail!("pass --aadhaar or --officer"),
      };
      let session = client.login(&creds).await?;
      println!("Logged in as {} ({})", session.profile.name, session.kind);
    }
    Command::Logout => {
      client.logout().await?;
      println!("Logged out");
    }
    Command::Whoami => match client.session().current() {
      Some(s) => println!("{} ({}, {})", s.profile.name, s.kind, s.profile.identifier),
      None => println!("Not logged in"),
    },
    Command::Submit {
      update_type,
      value,
      street,
      city,
      state,
      pincode,
      documents,
      all_or_nothing,
    } => {
      let submission = match (street, city, state, pincode, value) {
        (Some(street), Some(city), Some(state), Some(pincode), _) => {
          if update_type != UpdateType::AddressChange {
            bail!("--street is only valid with --type address_change");
          }
          UpdateSubmission::address(&street, &city, &state, &pincode)
        }
        (_, _, _, _, Some(value)) => UpdateSubmission::new(update_type, value),
        _ => bail!("pass --value, or the full --street/--city/--state/--pincode group"),
      };

      let needed = update_type.required_documents();
      if documents.is_empty() && !needed.is_empty() {
        eprintln!("Note: {} usually needs: {}", update_type.label(), needed.join(", "));
      }

      let mut docs = Vec::with_capacity(documents.len());
      for path in &documents {
        docs.push(Document::from_path(path).await?);
      }
      let policy =
        if all_or_nothing { UploadPolicy::AllOrNothing } else { UploadPolicy::BestEffort };

      let receipt = client.submit_update(submission, docs, policy).await?;
      println!("Submitted {}", receipt.request_id);
      println!("  {}", receipt.summary());
      for name in &receipt.failed {
        println!("  failed: {name}");
      }
      print_stage(&receipt.status, receipt.risk_score);
    }
    Command::Show { request_id } => {
      let request = client.fetch_request(&request_id).await?;
      print_request(&request);
    }
    Command::List { offline } => {
      let requests = if offline {
        client.session().cached_requests().await?
      } else {
        client.list_my_requests().await?
      };
      let stats = RequestStats::from_requests(&requests);
      println!(
        "{} total, {} approved, {} in review, {} rejected",
        stats.total, stats.approved, stats.in_review, stats.rejected
      );
      for r in &requests {
        let stage = r.stage().map(|s| s.label()).unwrap_or("Unknown");
        println!("{}  {:<16} {:<14} {}", r.request_id, r.update_type.label(), stage, r.submitted_label());
      }
    }
    Command::Queue => {
      let queue = client.pending_requests().await?;
      println!("{} awaiting review", queue.len());
      for r in &queue {
        let risk = r
          .risk_score
          .map(|s| format!("{:>3}% {}", s.percent(), s.bucket()))
          .unwrap_or_else(|| "unscored".to_owned());
        println!(
          "{}  {:<16} {:<12} {:<20} {}",
          r.request_id,
          r.update_type.label(),
          risk,
          r.user_name.as_deref().unwrap_or("-"),
          r.submitted_label()
        );
      }
    }
    Command::Approve { request_id } => {
      decide(client, &request_id, OfficerAction::Approve).await?;
    }
    Command::Reject { request_id, reason } => {
      decide(client, &request_id, OfficerAction::Reject { reason }).await?;
    }
    Command::RequestInfo { request_id, comment } => {
      decide(client, &request_id, OfficerAction::RequestInfo { comment }).await?;
    }
    Command::Notifications => {
      let board = client.refresh_notifications().await?;
      println!("{} unread", board.unread_count());
      for n in board.items() {
        let mark = if n.read { ' ' } else { '*' };
        println!("{mark} [{:?}] {}: {}", n.category, n.title, n.message);
      }
    }
  }
  Ok(())
}

async fn decide(
  client: &ApiClient<SqliteSessionStore>,
  request_id: &str,
  action: OfficerAction,
) -> Result<()> {
  let message = client.decide(request_id, &action).await?;
  println!("{message}");
  Ok(())
}

fn print_stage(status: &str, risk: Option<smartflow_core::risk::RiskScore>) {
  match smartflow_core::lifecycle::Stage::resolve(status, risk) {
    Ok(stage) => println!("  stage: {}", stage.label()),
    Err(e) => println!("  stage: unavailable ({e})"),
  }
  if let Some(score) = risk {
    println!("  risk:  {}% ({})", score.percent(), score.bucket());
  }
}

fn print_request(r: &UpdateRequest) {
  println!("{}  {}", r.request_id, r.update_type.label());
  println!("  submitted: {}", r.submitted_label());
  print_stage(&r.status, r.risk_score);
  for change in &r.details {
    println!(
      "  {}: {} -> {}",
      change.field,
      change.old_value.as_deref().unwrap_or("-"),
      change.new_value.as_deref().unwrap_or("-")
    );
  }
  if !r.documents.is_empty() {
    println!("  documents: {}", r.documents.join(", "));
  }
  if let Some(comment) = r.officer_comment() {
    println!("  officer comment: {comment}");
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
