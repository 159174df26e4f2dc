//! `spindle init` and `spindle config`: configuration management commands.

use std::path::Path;

use spindle_config::AppConfig;
use spindle_core::Provider;

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    write_default(&config_path, force)?;
    println!("Wrote {}", config_path.display());
    println!("Set api_key there, or export SPINDLE_API_KEY / OPENAI_API_KEY.");
    Ok(())
}

fn write_default(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(())
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (only local endpoints will work)");
            }
            if config.memory.backend == "in_memory" {
                warnings.push("In-memory backend: conversations are lost when the process exits");
            }
            for w in &warnings {
                println!("   warning: {w}");
            }

            println!();
            println!("   Endpoint:  {}", config.base_url);
            println!("   Model:     {}", config.default_model);
            println!("   Memory:    {}", config.memory.backend);
            println!("   Rounds:    {}", config.pipeline.max_tool_rounds);
            println!("   Timeout:   {}s", config.pipeline.call_timeout_secs);

            match spindle_providers::build_from_config(&config) {
                Ok(provider) => println!("   Reachable: {}", endpoint_status(provider.as_ref()).await),
                Err(e) => println!("   Reachable: skipped ({e})"),
            }
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

async fn endpoint_status(provider: &dyn Provider) -> String {
    match provider.health_check().await {
        Ok(true) => "yes".into(),
        Ok(false) => "no (endpoint rejected the request)".into(),
        Err(e) => format!("no ({e})"),
    }
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
    Ok(())
}
