//! CLI command implementations.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::models::{
    ActionType, AutoApprovalRule, DecisionKind, EscalationRule, EscalationTarget, QuorumConfig,
    RequestPriority, ReviewerRef, ReviewerRequirement, RiskAssessment, RiskLevel, VigilConfig,
};
use crate::domain::ports::{PendingFilters, SystemClock};
use crate::infrastructure::channels::LogChannel;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::database::{
    AuditLogImpl, DatabaseConnection, NotificationHistoryImpl, PolicyStoreImpl,
    RequestRepositoryImpl,
};
use crate::services::{
    AdmissionRequest, EscalationMonitor, EscalationMonitorConfig, NotificationDispatcher,
    OversightService, RequestLifecycle, RetryPolicy, ReviewerSpec,
};

use super::output;

/// Everything a command needs, wired from configuration.
pub struct Engine {
    pub service: Arc<OversightService>,
    pub monitor: Arc<EscalationMonitor>,
    pub policies: Arc<PolicyStoreImpl>,
    pub db: DatabaseConnection,
}

pub fn load_config(path: Option<&str>) -> Result<VigilConfig> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Build the full service stack against the configured database.
pub async fn connect(config: &VigilConfig) -> Result<Engine> {
    // SQLite creates the file but not its parent directory.
    if let Some(path) = config.database.url.strip_prefix("sqlite:") {
        if path != ":memory:" {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
            }
        }
    }

    let db = DatabaseConnection::new(&config.database.url)
        .await
        .context("failed to open database")?;
    db.migrate().await.context("failed to run migrations")?;
    let pool = db.pool().clone();

    let repo = Arc::new(RequestRepositoryImpl::new(pool.clone()));
    let policies = Arc::new(PolicyStoreImpl::new(pool.clone()));
    let audit = Arc::new(AuditLogImpl::new(pool.clone()));
    let history = Arc::new(NotificationHistoryImpl::new(pool));
    let clock = Arc::new(SystemClock);

    let mut dispatcher = NotificationDispatcher::new(
        history,
        clock.clone(),
        RetryPolicy::from_config(&config.notifications),
    );
    dispatcher.register_channel(Arc::new(LogChannel::default()));
    let dispatcher = Arc::new(dispatcher);

    let lifecycle = RequestLifecycle::new(repo.clone(), audit, clock.clone());
    let service = Arc::new(OversightService::new(
        repo.clone(),
        policies.clone(),
        lifecycle,
        dispatcher,
        clock.clone(),
    ));
    let monitor = Arc::new(EscalationMonitor::new(
        service.clone(),
        repo,
        policies.clone(),
        clock,
        EscalationMonitorConfig {
            tick_interval_ms: config.monitor.tick_interval_ms,
        },
    ));

    Ok(Engine {
        service,
        monitor,
        policies,
        db,
    })
}

#[derive(Args)]
pub struct AdmitArgs {
    /// Organization the action belongs to.
    #[arg(long)]
    pub org: String,
    /// Agent proposing the action.
    #[arg(long)]
    pub agent: String,
    /// Action type: transaction, data_access, external_api, code_execution, communication.
    #[arg(long)]
    pub action_type: String,
    /// Human-readable description.
    #[arg(long)]
    pub description: String,
    /// Risk score (0.0 - 1.0).
    #[arg(long)]
    pub risk_score: f64,
    /// Risk level: low, medium, high, critical.
    #[arg(long)]
    pub risk_level: String,
    /// Declared amount for policy tiering and auto-approval.
    #[arg(long)]
    pub amount: Option<Decimal>,
    /// Declared resource (symbol, dataset, endpoint).
    #[arg(long)]
    pub resource: Option<String>,
    /// Priority: low, medium, high, critical.
    #[arg(long, default_value = "medium")]
    pub priority: String,
    /// Business justification.
    #[arg(long)]
    pub justification: Option<String>,
    /// Opaque action payload as JSON.
    #[arg(long)]
    pub data: Option<String>,
    /// Required reviewer, `user:<id>` or `role:<name>`, repeatable.
    #[arg(long = "reviewer")]
    pub reviewers: Vec<String>,
}

#[derive(Args)]
pub struct DecideArgs {
    /// Request ID.
    pub request_id: Uuid,
    /// Deciding reviewer ID.
    #[arg(long)]
    pub reviewer: String,
    /// Roles the reviewer holds, repeatable.
    #[arg(long = "role")]
    pub roles: Vec<String>,
    /// Decision: approve, reject, abstain, request_info, escalate.
    #[arg(long)]
    pub decision: String,
    /// Reason (required for reject).
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Args)]
pub struct CancelArgs {
    /// Request ID.
    pub request_id: Uuid,
    /// Cancelling actor ID.
    #[arg(long)]
    pub actor: String,
    /// Reason for cancellation.
    #[arg(long)]
    pub reason: String,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Request ID.
    pub request_id: Uuid,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub org: Option<String>,
    #[arg(long)]
    pub agent: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long)]
    pub limit: Option<i64>,
}

#[derive(Args)]
pub struct PolicySyncArgs {
    /// YAML file with quorum policies, auto-approval rules, and
    /// escalation rules.
    pub file: String,
}

fn parse_reviewer_spec(raw: &str) -> Result<ReviewerSpec> {
    let (kind, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("reviewer must be user:<id> or role:<name>, got {raw:?}"))?;
    let requirement = ReviewerRequirement::from_parts(kind, value)
        .ok_or_else(|| anyhow!("unknown reviewer kind {kind:?}"))?;
    Ok(ReviewerSpec {
        requirement,
        weight: 1,
    })
}

pub async fn init(config_path: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = connect(&config).await?;
    engine.db.close().await;
    if json {
        println!("{}", serde_json::json!({ "initialized": true, "database": config.database.url }));
    } else {
        println!("Initialized database at {}", config.database.url);
    }
    Ok(())
}

pub async fn admit(args: AdmitArgs, config_path: Option<&str>, json: bool) -> Result<()> {
    let action_type = ActionType::from_str(&args.action_type)
        .ok_or_else(|| anyhow!("unknown action type {:?}", args.action_type))?;
    let risk_level = RiskLevel::from_str(&args.risk_level)
        .ok_or_else(|| anyhow!("unknown risk level {:?}", args.risk_level))?;
    let priority = RequestPriority::from_str(&args.priority)
        .ok_or_else(|| anyhow!("unknown priority {:?}", args.priority))?;

    let mut admission = AdmissionRequest::new(
        &args.org,
        &args.agent,
        action_type,
        &args.description,
        RiskAssessment::new(args.risk_score, risk_level),
    )
    .with_priority(priority);
    if let Some(amount) = args.amount {
        admission = admission.with_amount(amount);
    }
    if let Some(ref resource) = args.resource {
        admission = admission.with_resource(resource);
    }
    if let Some(ref justification) = args.justification {
        admission = admission.with_justification(justification);
    }
    if let Some(ref data) = args.data {
        admission = admission.with_action_data(serde_json::from_str(data)?);
    }
    for raw in &args.reviewers {
        admission = admission.with_reviewer(parse_reviewer_spec(raw)?);
    }

    let config = load_config(config_path)?;
    let engine = connect(&config).await?;
    let request = engine.service.admit(admission).await?;
    output::print_request(&request, json);
    engine.db.close().await;
    Ok(())
}

pub async fn decide(args: DecideArgs, config_path: Option<&str>, json: bool) -> Result<()> {
    let decision = DecisionKind::from_str(&args.decision)
        .ok_or_else(|| anyhow!("unknown decision {:?}", args.decision))?;
    let mut reviewer = ReviewerRef::new(&args.reviewer);
    for role in &args.roles {
        reviewer = reviewer.with_role(role);
    }

    let config = load_config(config_path)?;
    let engine = connect(&config).await?;
    let request = engine
        .service
        .decide(args.request_id, &reviewer, decision, args.reason)
        .await?;
    output::print_request(&request, json);
    engine.db.close().await;
    Ok(())
}

pub async fn cancel(args: CancelArgs, config_path: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = connect(&config).await?;
    let request = engine
        .service
        .cancel(args.request_id, &args.actor, args.reason)
        .await?;
    output::print_request(&request, json);
    engine.db.close().await;
    Ok(())
}

pub async fn show(args: ShowArgs, config_path: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = connect(&config).await?;
    let request = engine
        .service
        .get(args.request_id)
        .await?
        .ok_or_else(|| anyhow!("request {} not found", args.request_id))?;
    let decisions = engine.service.decisions(args.request_id).await?;
    output::print_request_with_decisions(&request, &decisions, json);
    engine.db.close().await;
    Ok(())
}

pub async fn list(args: ListArgs, config_path: Option<&str>, json: bool) -> Result<()> {
    let filters = PendingFilters {
        organization_id: args.org,
        agent_id: args.agent,
        status: args
            .status
            .as_deref()
            .map(|s| {
                crate::domain::models::RequestStatus::from_str(s)
                    .ok_or_else(|| anyhow!("unknown status {s:?}"))
            })
            .transpose()?,
        priority: args
            .priority
            .as_deref()
            .map(|p| {
                RequestPriority::from_str(p).ok_or_else(|| anyhow!("unknown priority {p:?}"))
            })
            .transpose()?,
        limit: args.limit,
    };

    let config = load_config(config_path)?;
    let engine = connect(&config).await?;
    let requests = engine.service.list_pending(filters).await?;
    output::print_request_list(&requests, json);
    engine.db.close().await;
    Ok(())
}

pub async fn history(args: ShowArgs, config_path: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = connect(&config).await?;
    let transitions = engine.service.history(args.request_id).await?;
    output::print_history(&transitions, json);
    engine.db.close().await;
    Ok(())
}

pub async fn monitor(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = connect(&config).await?;
    let handle = engine.monitor.start();
    tracing::info!(
        tick_interval_ms = config.monitor.tick_interval_ms,
        "escalation monitor running; press ctrl-c to stop"
    );
    tokio::signal::ctrl_c().await?;
    engine.monitor.stop();
    handle.abort();
    engine.db.close().await;
    Ok(())
}

/// Policy file shape for `policy sync`.
#[derive(Deserialize)]
struct PolicyFile {
    #[serde(default)]
    quorum_policies: Vec<QuorumPolicyDef>,
    #[serde(default)]
    auto_approval_rules: Vec<AutoApprovalDef>,
    #[serde(default)]
    escalation_rules: Vec<EscalationDef>,
}

#[derive(Deserialize)]
struct QuorumPolicyDef {
    organization_id: String,
    name: String,
    #[serde(default = "default_one")]
    required_approvals: u32,
    required_weight: Option<u32>,
    #[serde(default = "default_true")]
    any_rejection_rejects: bool,
    #[serde(default)]
    require_unanimous: bool,
    action_type: Option<ActionType>,
    min_amount: Option<Decimal>,
    approval_timeout_secs: Option<u64>,
    #[serde(default)]
    track_in_review: bool,
}

#[derive(Deserialize)]
struct AutoApprovalDef {
    organization_id: String,
    action_type: ActionType,
    max_amount: Option<Decimal>,
    #[serde(default)]
    allowed_resources: Vec<String>,
    #[serde(default = "default_true")]
    enabled: bool,
}

#[derive(Deserialize)]
struct EscalationDef {
    organization_id: String,
    name: String,
    trigger_after_secs: u64,
    target: EscalationTarget,
    channel: String,
    action_type: Option<ActionType>,
    #[serde(default = "default_true")]
    enabled: bool,
}

fn default_one() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

pub async fn policy_sync(args: PolicySyncArgs, config_path: Option<&str>, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file))?;
    let file: PolicyFile = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.file))?;

    let config = load_config(config_path)?;
    let engine = connect(&config).await?;
    let policies = &engine.policies;

    use crate::domain::ports::PolicyStore;
    let mut synced = 0usize;
    for def in &file.quorum_policies {
        let mut quorum = QuorumConfig::new(&def.organization_id, &def.name)
            .with_required_approvals(def.required_approvals)
            .with_any_rejection_rejects(def.any_rejection_rejects)
            .with_track_in_review(def.track_in_review);
        if let Some(weight) = def.required_weight {
            quorum = quorum.with_required_weight(weight);
        }
        if def.require_unanimous {
            quorum = quorum.with_unanimity();
        }
        if let Some(action_type) = def.action_type {
            quorum = quorum.with_action_type(action_type);
        }
        if let Some(min_amount) = def.min_amount {
            quorum = quorum.with_min_amount(min_amount);
        }
        if let Some(secs) = def.approval_timeout_secs {
            quorum = quorum.with_timeout_secs(secs);
        }
        policies.upsert_quorum(&quorum).await?;
        synced += 1;
    }
    for def in &file.auto_approval_rules {
        let mut rule = AutoApprovalRule::new(&def.organization_id, def.action_type);
        if let Some(max_amount) = def.max_amount {
            rule = rule.with_max_amount(max_amount);
        }
        rule.allowed_resources = def.allowed_resources.clone();
        rule.enabled = def.enabled;
        policies.insert_auto_approval(&rule).await?;
        synced += 1;
    }
    for def in &file.escalation_rules {
        let mut rule = EscalationRule::new(
            &def.organization_id,
            &def.name,
            def.trigger_after_secs,
            def.target.clone(),
            &def.channel,
        );
        rule.action_type = def.action_type;
        rule.enabled = def.enabled;
        policies.upsert_escalation_rule(&rule).await?;
        synced += 1;
    }

    if json {
        println!("{}", serde_json::json!({ "synced": synced }));
    } else {
        println!("Synced {synced} policy objects from {}", args.file);
    }
    engine.db.close().await;
    Ok(())
}
