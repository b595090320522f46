//! Client commands that stream a drafting result to stdout.

use std::io;

use anyhow::{bail, Result};

use patentflow_client::{StreamRequest, StreamState, StreamingClient};
use patentflow_core::OptimizationType;

use crate::terminal_output::{note_error, note_info, note_success, stream_write};

/// Print each delta as it arrives; fails unless the stream completed.
async fn print_stream(client: &StreamingClient, request: StreamRequest) -> Result<()> {
    let mut stdout = io::stdout();
    let mut write_error = None;
    let session = client
        .start(request)
        .follow(|delta| {
            if let Err(err) = stream_write(&mut stdout, delta) {
                write_error.get_or_insert(err);
            }
        })
        .await;
    println!();

    if let Some(err) = write_error {
        return Err(err.into());
    }
    match session.state {
        StreamState::Completed => {
            note_success(&format!("{} chars received", session.buffer.chars().count()));
            Ok(())
        }
        _ => {
            let reason = session
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "stream did not complete".to_string());
            note_error(&reason);
            bail!(reason)
        }
    }
}

pub async fn optimize(client: &StreamingClient, text: &str, optimization_type: OptimizationType) -> Result<()> {
    note_info(&format!("Optimizing ({})", optimization_type.label()));
    print_stream(client, StreamRequest::optimization(text, optimization_type)).await
}

pub async fn effects(client: &StreamingClient, background: &str, solution: &str) -> Result<()> {
    print_stream(client, StreamRequest::technical_effects(background, solution)).await
}

pub async fn background(client: &StreamingClient, name: &str, field: &str, problems: &str) -> Result<()> {
    print_stream(client, StreamRequest::background(name, field, problems)).await
}

pub async fn keywords(
    client: &StreamingClient,
    keyword: &str,
    field: Option<&str>,
    count: Option<u32>,
    list: bool,
) -> Result<()> {
    if !list {
        return print_stream(client, StreamRequest::keywords(keyword, field, count)).await;
    }
    let terms = client.recommend_keywords(keyword, field, count).await?;
    for (i, term) in terms.iter().enumerate() {
        println!("{:>3}. {term}", i + 1);
    }
    note_success(&format!("{} keywords", terms.len()));
    Ok(())
}
