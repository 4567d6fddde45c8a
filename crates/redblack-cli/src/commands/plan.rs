use std::fmt::Write;
use std::path::Path;

use redblack_core::RunContext;
use redblack_rollout::DeploymentPlan;

pub async fn run(config_path: &Path, ctx: &RunContext, json: bool) -> anyhow::Result<()> {
    let deployer = super::deployer(config_path)?;
    let plan = deployer.plan(ctx).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", format_plan(&ctx.image_id, &plan));
    }
    Ok(())
}

pub fn format_plan(image_id: &str, plan: &DeploymentPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{image_id} belongs to {}", plan.identity);
    for (cluster, groups) in &plan.old_groups {
        let _ = writeln!(out, "  {cluster}: would replace {}", groups.join(", "));
    }
    out
}
