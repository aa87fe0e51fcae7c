//! Table and JSON rendering for CLI output.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use crate::domain::models::{ApprovalDecision, OversightRequest, StateTransition};

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub fn print_request(request: &OversightRequest, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(request).unwrap_or_default());
        return;
    }
    println!("Request {}", request.id);
    println!("  organization: {}", request.organization_id);
    println!("  agent:        {}", request.agent_id);
    println!("  action:       {}", request.action_type.as_str());
    println!("  description:  {}", request.description);
    println!("  status:       {}", request.status.as_str());
    println!("  priority:     {}", request.priority.as_str());
    println!(
        "  risk:         {} ({})",
        request.risk.score,
        request.risk.level.as_str()
    );
    println!("  policy:       {}", request.policy.name);
    if let Some(amount) = request.amount {
        println!("  amount:       {amount}");
    }
    if let Some(ref timeout_at) = request.timeout_at {
        println!("  timeout at:   {timeout_at}");
    }
    if let Some(ref resolved_at) = request.resolved_at {
        println!("  resolved at:  {resolved_at}");
    }
}

pub fn print_request_with_decisions(
    request: &OversightRequest,
    decisions: &[ApprovalDecision],
    json: bool,
) {
    if json {
        let body = serde_json::json!({ "request": request, "decisions": decisions });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
        return;
    }
    print_request(request, false);
    if decisions.is_empty() {
        println!("  decisions:    none");
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Reviewer", "Decision", "Weight", "Reason", "At"]);
    for decision in decisions {
        table.add_row(vec![
            Cell::new(&decision.reviewer_id),
            Cell::new(decision.decision.as_str()),
            Cell::new(decision.weight),
            Cell::new(decision.reason.as_deref().unwrap_or("-")),
            Cell::new(decision.decided_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("{table}");
}

pub fn print_request_list(requests: &[OversightRequest], json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(requests).unwrap_or_default());
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "ID", "Org", "Agent", "Action", "Status", "Priority", "Risk", "Created",
        ]);
    for request in requests {
        table.add_row(vec![
            Cell::new(short_id(&request.id)),
            Cell::new(&request.organization_id),
            Cell::new(&request.agent_id),
            Cell::new(request.action_type.as_str()),
            Cell::new(request.status.as_str()),
            Cell::new(request.priority.as_str()),
            Cell::new(request.risk.level.as_str()),
            Cell::new(request.created_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("{table}");
}

pub fn print_history(transitions: &[StateTransition], json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(transitions).unwrap_or_default()
        );
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["From", "To", "Actor", "Reason", "At"]);
    for transition in transitions {
        let actor = match &transition.actor.id {
            Some(id) => format!("{} ({})", transition.actor.kind.as_str(), id),
            None => transition.actor.kind.as_str().to_string(),
        };
        table.add_row(vec![
            Cell::new(
                transition
                    .from_status
                    .map_or("-", |s| s.as_str()),
            ),
            Cell::new(transition.to_status.as_str()),
            Cell::new(actor),
            Cell::new(transition.reason.as_deref().unwrap_or("-")),
            Cell::new(transition.created_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("{table}");
}
