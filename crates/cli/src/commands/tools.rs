//! `taskpilot tools`: List the tools the agent can call.

use taskpilot_config::AppConfig;

use super::runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = runtime::registry(&config, runtime::directory(&config));

    println!("  Available tools ({}):", registry.len());
    println!();
    for definition in registry.definitions() {
        println!("  {}", definition.name);
        println!("      {}", definition.description);
        if let Some(required) = definition.parameters["required"].as_array() {
            let names: Vec<&str> = required.iter().filter_map(|v| v.as_str()).collect();
            println!("      required: {}", names.join(", "));
        }
    }
    Ok(())
}
