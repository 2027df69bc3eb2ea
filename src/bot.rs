//! The control loop: feeds inbound messages to the dialog one at a time.

use std::sync::Arc;

use futures::StreamExt;

use crate::channels::Channel;
use crate::dialog::Dialog;
use crate::error::Error;

pub struct Bot {
    channel: Arc<dyn Channel>,
    dialog: Dialog,
}

impl Bot {
    pub fn new(channel: Arc<dyn Channel>, dialog: Dialog) -> Self {
        Self { channel, dialog }
    }

    /// Run until the channel's stream ends or Ctrl+C.
    ///
    /// Messages are handled strictly in arrival order; a failure handling one
    /// message is logged and the loop moves on.
    pub async fn run(mut self) -> Result<(), Error> {
        self.channel.health_check().await?;
        let mut message_stream = self.channel.start().await?;

        tracing::info!(channel = self.channel.name(), "Bot ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("Message stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            if let Err(e) = self.dialog.handle(&message).await {
                tracing::error!(user_id = message.user_id, "Error handling message: {}", e);
            }
        }

        self.channel.shutdown().await?;
        Ok(())
    }
}
