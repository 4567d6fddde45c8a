use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use redblack_core::{Config, RunContext};
use redblack_fleet::Asgard;
use redblack_rollout::{Backends, DeploySettings, Deployer};

pub mod deploy;
pub mod plan;

pub fn context(image: &str, requester: Option<String>, profile: Option<String>) -> RunContext {
    let mut ctx = RunContext::new(image);
    ctx.requester = requester;
    ctx.profile = profile;
    ctx
}

/// Build a deployer backed by the Asgard endpoints in `config_path`.
pub fn deployer(config_path: &Path) -> anyhow::Result<Deployer> {
    let config = Config::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let asgard = Asgard::from_config(&config)?;
    Ok(Deployer::new(
        Backends::shared(Arc::new(asgard)),
        DeploySettings::from(&config.timeouts),
    ))
}
