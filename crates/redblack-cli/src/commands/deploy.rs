use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use redblack_core::RunContext;
use redblack_rollout::DeployReport;
use tracing::info;

pub async fn run(config_path: &Path, ctx: &RunContext, json: bool) -> anyhow::Result<()> {
    let deployer = super::deployer(config_path)?;
    let report = deployer
        .run_deployment(ctx)
        .await
        .with_context(|| format!("deployment of {} failed", ctx.image_id))?;

    info!(run = %ctx.run_id, image = %ctx.image_id, "deployment finished");
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&ctx.image_id, &report));
    }
    Ok(())
}

pub fn format_report(image_id: &str, report: &DeployReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "✓ Deployed {image_id} to {}", report.plan.identity);
    for (cluster, group) in &report.plan.new_groups {
        let retired = report
            .plan
            .old_groups
            .get(cluster)
            .map(|groups| groups.join(", "))
            .unwrap_or_default();
        let _ = writeln!(out, "  {cluster}: {group} (replaced {retired})");
    }
    if !report.load_balancers.is_empty() {
        let lbs: Vec<_> = report.load_balancers.iter().map(String::as_str).collect();
        let _ = writeln!(out, "  load balancers: {}", lbs.join(", "));
    }
    out
}
