//! CLI channel: stdin/stdout REPL for local runs.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingMessage};
use crate::error::ChannelError;

/// User id assigned to everything typed on the terminal.
pub const LOCAL_USER_ID: i64 = 1;

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel {
    user_id: i64,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            user_id: LOCAL_USER_ID,
        }
    }

    /// Speak as a specific VK user, so the profile lookup hits a real account.
    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Render an outbound message as terminal text.
fn render(message: &OutgoingMessage) -> String {
    let mut out = message.text.clone();
    if let Some(attachment) = &message.attachment {
        for item in attachment.split(',') {
            out.push_str(&format!("\n📎 {item}"));
        }
    }
    if let Some(keyboard) = &message.keyboard {
        let labels: Vec<String> = keyboard.labels().map(|l| format!("[{l}]")).collect();
        out.push_str(&format!("\n{}", labels.join(" ")));
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let user_id = self.user_id;

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = IncomingMessage::new("cli", user_id, &line);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), ChannelError> {
        println!("\n{}\n", render(&message));
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
