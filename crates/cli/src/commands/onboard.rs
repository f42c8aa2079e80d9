//! `taskpilot onboard`: First-time setup.

use taskpilot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("TaskPilot: First-Time Setup");
    println!("============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("  Created config.toml at: {}", config_path.display());
    println!("\n  Next steps:");
    println!("   1. Add your API key to {} or set OPENROUTER_API_KEY", config_path.display());
    println!("   2. List your colleagues under [[users]] so the agent can reach them");
    println!("   3. Run: taskpilot run --caller you@example.com -m \"Book a sync with Bob tomorrow at 10\"\n");

    Ok(())
}
