//! `parley chat`: interactive session over the terminal.
//!
//! In voice mode the assistant greets first and each reply holds the session
//! in `Speaking` for its simulated playback time, so typing during a reply
//! exercises the interrupt policy.

use std::sync::Arc;

use parley_agent::{ConversationSession, InputDisposition, SessionHandle, SessionOptions};
use parley_channels::{ConsoleSpeaker, LineInput};
use parley_core::channel::InputChannel;
use parley_core::session::SessionMode;
use tracing::info;

use super::runtime;

pub async fn run(voice: bool) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = runtime::load().await?;
    let config = &runtime.config;
    let persona = runtime.engine.persona().clone();

    let (mode, input) = if voice {
        (SessionMode::Voice, LineInput::stdin().as_speech())
    } else {
        (SessionMode::Text, LineInput::stdin())
    };
    let mut playback = config.playback.clone();
    playback.simulate |= voice;
    let speaker = Arc::new(ConsoleSpeaker::new(persona.name.clone(), playback));

    let options = SessionOptions::from_config(&config.session, mode);
    let session = ConversationSession::spawn(
        runtime.engine.clone(),
        speaker,
        options,
        runtime.events.clone(),
    );

    println!();
    println!("  {} ({})", persona.name, persona.role);
    println!("  Provider: {} ({})", config.generation.provider, config.generation.model);
    println!("  Knowledge: {} chunks", runtime.engine.retriever().index().len());
    if !persona.conversation_starters.is_empty() {
        println!("  Try: {}", persona.conversation_starters.join(" | "));
    }
    println!("  Type 'exit' or press Ctrl+D to quit.");
    println!();

    session.start().await?;
    session.ready().await?;

    let mut rx = input.start().await?;
    loop {
        tokio::select! {
            line = rx.recv() => {
                let Some(line) = line else { break };
                match session.submit(line).await {
                    Ok(InputDisposition::Processing) => {}
                    Ok(InputDisposition::Queued { pending }) => {
                        eprintln!("  (queued, {pending} waiting)");
                    }
                    Err(e) => eprintln!("  [{e}]"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drain(&session).await?;
    let history = session.stop().await?;
    info!(turns = history.len(), "Session closed");

    println!();
    println!("  Goodbye!");
    Ok(())
}

/// Let in-flight and queued turns finish before stopping.
async fn drain(session: &SessionHandle) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let snapshot = session.snapshot().await?;
        if !snapshot.state.is_busy() && snapshot.pending == 0 {
            return Ok(());
        }
        session.wait_for(|s| !s.is_busy()).await?;
    }
}
