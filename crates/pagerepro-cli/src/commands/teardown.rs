use anyhow::{Context, Result};

use pagerepro_container::DockerRuntime;
use pagerepro_engine::{teardown_by_name, EnvironmentConfig, TeardownStatus};

/// Execute the `teardown` command: remove the configured container if it exists.
pub async fn execute() -> Result<()> {
    let config = EnvironmentConfig::from_env()?;
    let runtime = DockerRuntime::connect_local().context("Failed to connect to Docker")?;

    match teardown_by_name(runtime, &config.name).await {
        TeardownStatus::Removed { id } => {
            println!("Removed container '{}' ({id}).", config.name);
        }
        TeardownStatus::NothingToRemove | TeardownStatus::NotRun => {
            println!("No container named '{}'.", config.name);
        }
        TeardownStatus::Failed { message } => {
            anyhow::bail!("Failed to remove container '{}': {message}", config.name);
        }
    }
    Ok(())
}
