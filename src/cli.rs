//! Command-line interface for truthgate.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::access::Denial;
use crate::admin::{Admin, AdminError, AdminGrant, ControlTarget, MonetizationUpdate};
use crate::category::{AnalysisRequest, ContentCategory, MediaKind, Plan};
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::engine::{AnalysisEngine, OpenAiEngine, ScriptedEngine};
use crate::report;
use crate::server::{self, AppState};
use crate::settings::{self, Settings};
use crate::state::CategoryRequirement;
use crate::store::ConfigStore;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Default settings file names to search for.
const DEFAULT_SETTINGS_NAMES: &[&str] = &["truthgate.yaml", ".truthgate.yaml"];

/// Content intelligence dispatcher.
///
/// Truthgate classifies submitted content (news claims, tool links, images,
/// video, audio), checks feature flags and subscription tiers, sends the
/// content to an analysis engine and returns a validated report. When the
/// engine fails, a deliberately pessimistic fallback report is returned.
#[derive(Parser)]
#[command(name = "truthgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to settings YAML file (default: auto-discover)
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Path to the state document (overrides settings)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze one piece of content
    #[command(visible_alias = "check")]
    Analyze(AnalyzeArgs),
    /// Run the HTTP service
    Serve(ServeArgs),
    /// Privileged operations on the local state document
    Admin(AdminArgs),
    /// Create a settings file from a template
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Content to analyze: a claim, a URL, or a media link
    #[arg(required = true)]
    pub content: Vec<String>,

    /// Force a category: news, tool, media, or audio (default: detect)
    #[arg(short = 't', long = "type")]
    pub category: Option<ContentCategory>,

    /// Media kind for media content: image or video
    #[arg(long)]
    pub media_kind: Option<MediaKind>,

    /// Caller email used for the tier check
    #[arg(short, long)]
    pub email: Option<String>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Do not contact the engine; always produce the fallback report
    #[arg(long)]
    pub offline: bool,
}

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Listen address (overrides settings)
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Arguments for the admin command.
#[derive(Args)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub op: AdminOp,
}

#[derive(Subcommand)]
pub enum AdminOp {
    /// Toggle a category (news, tool, media, audio) or switch all with
    /// master_override_all_on / master_override_all_off
    Control { target: String },
    /// Show feature flags, monetization settings and requirements
    Status,
    /// Update the paywall switch and tier prices
    Monetization(MonetizationArgs),
    /// Set the minimum access level and advertised plan for a category
    Requirement {
        category: ContentCategory,
        level: u32,
        plan: String,
    },
    /// Switch the audit trail on or off (default: flip)
    AuditSync {
        #[arg(long, conflicts_with = "off")]
        on: bool,
        #[arg(long)]
        off: bool,
    },
    /// Show the audit history
    History {
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
    /// Grant a plan (basic, starter, pure, elite) to a user
    Upgrade { email: String, plan: String },
    /// Remove a user from the access registry
    RemoveUser { email: String },
    /// List the access registry
    Users {
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
    /// Show one user's access record
    UserStatus { email: String },
}

#[derive(Args)]
pub struct MonetizationArgs {
    /// Enable or disable the paywall
    #[arg(long)]
    pub paywall: Option<bool>,
    #[arg(long)]
    pub basic_price: Option<String>,
    #[arg(long)]
    pub starter_price: Option<String>,
    #[arg(long)]
    pub pure_price: Option<String>,
    #[arg(long)]
    pub elite_price: Option<String>,
}

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "truthgate.yaml")]
    pub output: PathBuf,

    /// Template to use
    #[arg(short, long, default_value = "default")]
    pub template: String,

    /// List available templates
    #[arg(short, long)]
    pub list: bool,
}

/// Discover a settings file in the current directory.
fn discover_settings() -> Option<PathBuf> {
    DEFAULT_SETTINGS_NAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Load and validate settings, applying command-line overrides.
pub fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match cli.settings.clone().or_else(discover_settings) {
        Some(path) => Settings::parse_file(&path)
            .map_err(|e| anyhow::anyhow!("failed to parse settings {}: {}", path.display(), e))?,
        None => Settings::default(),
    };
    if let Some(state) = &cli.state {
        settings.state_path = Some(state.clone());
    }
    settings::validate(&settings)?;
    Ok(settings)
}

fn open_store(settings: &Settings) -> anyhow::Result<Arc<ConfigStore>> {
    let path = settings.resolved_state_path();
    Ok(Arc::new(ConfigStore::load(&path)?))
}

fn build_engine(settings: &Settings, offline: bool) -> anyhow::Result<Arc<dyn AnalysisEngine>> {
    if offline {
        return Ok(Arc::new(ScriptedEngine::new()));
    }
    if settings.engine.api_key().is_none() {
        warn!(
            env = %settings.engine.api_key_env,
            "no API key set, engine calls are sent unauthenticated"
        );
    }
    Ok(Arc::new(OpenAiEngine::from_settings(&settings.engine)?))
}

fn check_format(format: &str) -> bool {
    if format != "pretty" && format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", format);
        return false;
    }
    true
}

/// Run the analyze command.
pub async fn run_analyze(cli: &Cli, args: &AnalyzeArgs) -> anyhow::Result<i32> {
    if !check_format(&args.format) {
        return Ok(EXIT_ERROR);
    }

    let settings = load_settings(cli)?;
    let store = open_store(&settings)?;
    let engine = build_engine(&settings, args.offline)?;
    let dispatcher = Dispatcher::from_settings(&settings, store, engine);

    let mut request = AnalysisRequest::new(args.content.join(" "));
    if let Some(category) = args.category {
        request = request.with_hint(category);
    }
    if let Some(kind) = args.media_kind {
        request = request.with_media_kind(kind);
    }
    if let Some(email) = &args.email {
        request = request.with_caller(email.clone());
    }

    match dispatcher.analyze(&request).await {
        Ok(result) => {
            if args.format == "json" {
                report::write_json(&result)?;
            } else {
                report::write_pretty(&result);
            }
            Ok(EXIT_SUCCESS)
        }
        Err(DispatchError::Denied(denial)) => {
            if args.format == "json" {
                report::write_json_value(&denial)?;
            } else {
                let price = match &denial {
                    Denial::InsufficientTier { required_plan, .. } => dispatcher
                        .store()
                        .read(|doc| doc.monetization_settings.price_of(*required_plan).to_string())
                        .ok(),
                    Denial::CategoryOffline { .. } => None,
                };
                report::write_denial(&denial, price.as_deref());
            }
            Ok(EXIT_FAILED)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(EXIT_ERROR)
        }
    }
}

/// Run the serve command.
pub async fn run_serve(cli: &Cli, args: &ServeArgs) -> anyhow::Result<i32> {
    let settings = load_settings(cli)?;
    let store = open_store(&settings)?;
    if let Some(path) = store.path() {
        info!(state = %path.display(), "state document loaded");
    }
    let engine = build_engine(&settings, false)?;
    let dispatcher = Dispatcher::from_settings(&settings, store, engine);

    let secret = settings.admin.secret();
    if secret.is_none() {
        warn!(
            env = %settings.admin.secret_env,
            "no admin secret set, admin routes are locked"
        );
    }

    let bind = args.bind.clone().unwrap_or(settings.server.bind.clone());
    server::serve(AppState::new(dispatcher, secret), &bind).await?;
    Ok(EXIT_SUCCESS)
}

/// Run an admin operation against the local state document.
pub fn run_admin(cli: &Cli, args: &AdminArgs) -> anyhow::Result<i32> {
    let settings = load_settings(cli)?;
    let store = open_store(&settings)?;
    let admin = Admin::new(&store, AdminGrant::local());

    match &args.op {
        AdminOp::Control { target } => {
            let Some(target) = ControlTarget::parse(target) else {
                eprintln!("Error: unknown control target {:?}", target);
                eprintln!("Use news, tool, media, audio, master_override_all_on or master_override_all_off");
                return Ok(EXIT_ERROR);
            };
            report::write_json_value(&admin.control(target)?)?;
        }
        AdminOp::Status => {
            let doc = store.snapshot()?;
            report::write_json_value(&serde_json::json!({
                "systemStatus": doc.system_status,
                "monetizationSettings": doc.monetization_settings,
                "categoryRequirements": doc.category_requirements,
                "auditSyncEnabled": doc.audit_sync_enabled,
                "auditEntries": doc.audit_history.len(),
                "registeredUsers": doc.user_registry.len(),
            }))?;
        }
        AdminOp::Monetization(m) => {
            let settings = admin.update_monetization(MonetizationUpdate {
                paywall_enabled: m.paywall,
                basic_price: m.basic_price.clone(),
                starter_price: m.starter_price.clone(),
                pure_price: m.pure_price.clone(),
                elite_price: m.elite_price.clone(),
            })?;
            report::write_json_value(&settings)?;
        }
        AdminOp::Requirement {
            category,
            level,
            plan,
        } => {
            let requirement = CategoryRequirement::new(*level, Plan::parse_lenient(plan));
            report::write_json_value(&admin.set_requirement(*category, requirement)?)?;
        }
        AdminOp::AuditSync { on, off } => {
            let wanted = match (on, off) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let now = admin.set_audit_sync(wanted)?;
            println!("audit trail {}", if now { "enabled" } else { "disabled" });
        }
        AdminOp::History { format } => {
            if !check_format(format) {
                return Ok(EXIT_ERROR);
            }
            let entries = admin.history()?;
            if format == "json" {
                report::write_json_value(&entries)?;
            } else {
                report::write_history(&entries);
            }
        }
        AdminOp::Upgrade { email, plan } => {
            report::write_json_value(&admin.upgrade_user(email, plan)?)?;
        }
        AdminOp::RemoveUser { email } => match admin.remove_user(email) {
            Ok(_) => println!("removed {}", email),
            Err(AdminError::UserNotFound(key)) => {
                eprintln!("Error: user not found: {}", key);
                return Ok(EXIT_FAILED);
            }
            Err(e) => return Err(e.into()),
        },
        AdminOp::Users { format } => {
            if !check_format(format) {
                return Ok(EXIT_ERROR);
            }
            let users = admin.list_users()?;
            if format == "json" {
                report::write_json_value(&users)?;
            } else {
                report::write_users(&users);
            }
        }
        AdminOp::UserStatus { email } => {
            let record = store.read(|doc| doc.access_record(Some(email)))?;
            report::write_json_value(&record)?;
        }
    }

    Ok(EXIT_SUCCESS)
}

/// Run the init command: write a bundled settings template, then show where
/// the resulting configuration will keep its state and which engine it uses.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.list {
        println!("Available templates:");
        println!();
        for t in settings::TEMPLATES {
            let marker = if t.name == settings::DEFAULT_TEMPLATE { "*" } else { " " };
            println!("  {} {:<10} {}", marker, t.name, t.description);
        }
        return Ok(EXIT_SUCCESS);
    }

    let Some(template) = settings::template(&args.template) else {
        eprintln!("Error: unknown template {:?}", args.template);
        eprintln!("Run 'truthgate init --list' to see available templates");
        return Ok(EXIT_ERROR);
    };

    if args.output.exists() {
        eprintln!("Error: refusing to overwrite {}", args.output.display());
        return Ok(EXIT_ERROR);
    }
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.output, template.content)?;

    let written = Settings::parse_file(&args.output)?;
    settings::validate(&written)?;

    println!("Created {} from template '{}'", args.output.display(), template.name);
    println!();
    println!("  state:  {}", written.resolved_state_path().display());
    println!("  engine: {} at {}", written.engine.model, written.engine.base_url);
    println!();
    println!(
        "Export ${} for the engine and ${} to unlock admin routes, then run:",
        written.engine.api_key_env, written.admin.secret_env
    );
    println!("  truthgate --settings {} serve", args.output.display());

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "truthgate",
            "analyze",
            "--type",
            "media",
            "--media-kind",
            "video",
            "https://example.org/a",
            "--offline",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.category, Some(ContentCategory::Media));
                assert_eq!(args.media_kind, Some(MediaKind::Video));
                assert!(args.offline);
                assert_eq!(args.content, vec!["https://example.org/a"]);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_cli_parses_admin_ops() {
        let cli = Cli::try_parse_from(["truthgate", "--state", "/tmp/s.json", "admin", "requirement", "audio", "3", "starter"])
            .unwrap();
        assert_eq!(cli.state, Some(PathBuf::from("/tmp/s.json")));
        assert!(matches!(
            cli.command,
            Commands::Admin(AdminArgs {
                op: AdminOp::Requirement {
                    category: ContentCategory::Audio,
                    level: 3,
                    ..
                }
            })
        ));

        assert!(Cli::try_parse_from(["truthgate", "admin", "audit-sync", "--on", "--off"]).is_err());
    }

    #[test]
    fn test_init_writes_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("conf").join("truthgate.yaml");
        let args = InitArgs {
            output: output.clone(),
            template: "local".to_string(),
            list: false,
        };
        assert_eq!(run_init(&args).unwrap(), EXIT_SUCCESS);
        let written = Settings::parse_file(&output).unwrap();
        assert_eq!(
            written.resolved_state_path(),
            dir.path().join("conf").join(settings::DEFAULT_STATE_FILE)
        );
        // Refuses to overwrite.
        assert_eq!(run_init(&args).unwrap(), EXIT_ERROR);

        let unknown = InitArgs {
            output: dir.path().join("other.yaml"),
            template: "cloud".to_string(),
            list: false,
        };
        assert_eq!(run_init(&unknown).unwrap(), EXIT_ERROR);
        assert!(!unknown.output.exists());
    }
}
