use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::*;
use docqa_core::{
    Attachment, ChatRole, ChatSession, HttpTransport, SessionEvent, SubmitError, TurnOutcome,
};
use tokio::sync::mpsc;

/// What to print after the assistant turn changed from `printed` to `current`.
#[derive(Debug, PartialEq, Eq)]
enum Delta<'a> {
    Append(&'a str),
    /// The turn was overwritten (e.g. by an error message); print it again in full.
    Restart(&'a str),
}

fn delta<'a>(printed: &str, current: &'a str) -> Delta<'a> {
    match current.strip_prefix(printed) {
        Some(suffix) => Delta::Append(suffix),
        None => Delta::Restart(current),
    }
}

fn print_update(session: &ChatSession, printed: &mut String) -> Result<()> {
    let current = session.with_conversation(|conv| {
        conv.last()
            .filter(|turn| turn.role == ChatRole::Assistant)
            .map(|turn| turn.content.clone())
    });
    let Some(current) = current else {
        return Ok(());
    };

    let mut stdout = std::io::stdout().lock();
    match delta(printed, &current) {
        Delta::Append("") => return Ok(()),
        Delta::Append(suffix) => write!(stdout, "{}", suffix)?,
        Delta::Restart(text) => write!(stdout, "\n{}", text)?,
    }
    stdout.flush()?;
    *printed = current;
    Ok(())
}

/// Ask one question and stream the answer to stdout.
pub async fn ask(transport: &HttpTransport, question: &str, attach: Option<&Path>) -> Result<()> {
    let attachment = match attach {
        Some(path) => Some(
            Attachment::from_path(path)
                .await
                .with_context(|| format!("Could not read {}", path.display()))?,
        ),
        None => None,
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = ChatSession::new().with_notifier(tx);

    let pending = match session.begin_turn(question, attachment) {
        Ok(pending) => pending,
        Err(SubmitError::MissingAttachment) => {
            bail!("No PDF attached. Pass one with {}", "--attach <FILE>".bold())
        }
        Err(e) => bail!(e),
    };

    println!("{} {}", "You:".bold().cyan(), pending.query());
    println!("{} {}", "AI:".bold().yellow(), format!("({})", pending.attachment().file_name).dimmed());

    let send = pending.send(transport);
    tokio::pin!(send);

    let mut printed = String::new();
    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            Some(event) = rx.recv() => {
                if matches!(event, SessionEvent::TurnUpdated) {
                    print_update(&session, &mut printed)?;
                }
            }
        }
    };

    // Final text may land after the last update event
    print_update(&session, &mut printed)?;
    println!();

    match outcome {
        TurnOutcome::Answered(_) => Ok(()),
        TurnOutcome::Failed(failure) => {
            eprintln!("Check that the service is running at {}", transport.base_url().bold());
            bail!("No answer: {:?}", failure)
        }
    }
}

/// Upload a document on its own and print the service's reply.
pub async fn upload(transport: &HttpTransport, file: &Path) -> Result<()> {
    let attachment = Attachment::from_path(file)
        .await
        .with_context(|| format!("Could not read {}", file.display()))?;

    println!(
        "Uploading {} ({} KB) to {}",
        attachment.file_name.bold(),
        attachment.len().div_ceil(1024),
        transport.base_url().cyan()
    );

    let reply = transport.upload(&attachment).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
