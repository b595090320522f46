//! CLI Status Command
//!
//! Reports local configuration problems and whether the gateway answers.

use anyhow::Result;

use patentflow_client::StreamingClient;
use patentflow_config::AppConfig;

use crate::terminal_output::{note_error, note_success, note_warn, render_table, Column};

pub async fn run(config: &AppConfig, server: &str) -> Result<()> {
    println!("\nPatentFlow status\n");

    let rows = vec![
        vec!["model".to_string(), config.model.clone()],
        vec!["base_url".to_string(), config.base_url.clone()],
        vec![
            "api_key".to_string(),
            if config.api_key.is_some() { "set" } else { "missing" }.to_string(),
        ],
        vec!["timeout".to_string(), format!("{}s", config.timeout_secs)],
        vec!["char_delay".to_string(), format!("{}ms", config.char_delay_ms)],
    ];
    print!("{}", render_table(&[Column::left("Setting"), Column::left("Value")], &rows));
    println!();

    let report = config.validate();
    for err in &report.errors {
        note_error(&format!("{}: {}", err.path, err.message));
    }
    for warning in &report.warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }

    match StreamingClient::new(server).health().await {
        Ok(health) => {
            note_success(&format!("Gateway at {server} is up"));
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Err(err) => note_error(&format!("Gateway at {server} is not reachable: {err}")),
    }
    Ok(())
}
