// plan.rs — `bastion plan`: preview analyzer selection without running.

use bastion_policy::{compile_rules, ensure_safe_target_url, plan_phases, PhasePlan};

use super::CliContext;

pub fn execute(ctx: &CliContext, url: &str, repo: &str, json: bool) -> anyhow::Result<()> {
    let plans = build(ctx, url, repo)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    println!("{:<10} {:<6} ANALYZERS", "PHASE", "RULES");
    println!("{}", "-".repeat(72));
    for plan in &plans {
        println!(
            "{:<10} {:<6} {}",
            plan.phase.as_str(),
            plan.applied_rules.len(),
            describe(plan)
        );
    }
    Ok(())
}

fn build(ctx: &CliContext, url: &str, repo: &str) -> anyhow::Result<Vec<PhasePlan>> {
    let url = ensure_safe_target_url(url)?;
    let rules = compile_rules(&ctx.config.rules);
    Ok(plan_phases(url.as_str(), repo, &rules))
}

fn describe(plan: &PhasePlan) -> String {
    match &plan.blocked_reason {
        Some(reason) => format!("BLOCKED: {}", reason),
        None if plan.selected_analyzers.is_empty() => "-".to_string(),
        None => plan.selected_analyzers.join(", "),
    }
}
