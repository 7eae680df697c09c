/// Replay driver: feeds recorded or piped deliveries through a synchronizer
use crate::config::Config;
use crate::projector::PresentationSink;
use crate::replay::{load_deliveries, parse_delivery_line};
use crate::source::{Delivery, EventSource, StaticCredentials, Subscription};
use crate::sync::{spawn_sync, ConversationSync};
use crate::view_types::ConversationSummary;
use anyhow::Context;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// Sink that prints the conversation list to the terminal
pub struct TerminalSink {
    show_avatars: bool,
    renders: usize,
}

impl TerminalSink {
    pub fn new(show_avatars: bool) -> Self {
        Self {
            show_avatars,
            renders: 0,
        }
    }

    fn render_row(&self, summary: &ConversationSummary) -> String {
        let mut row = format!(
            "  {} {} {}  {}",
            summary
                .last_message_timestamp
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed(),
            summary.peer_display_name.bright_white().bold(),
            format!("({})", summary.peer_id).cyan(),
            summary.last_message_text
        );
        if self.show_avatars {
            let avatar = match summary.peer_avatar.decode() {
                Ok(bytes) if !bytes.is_empty() => format!("[avatar {} bytes]", bytes.len()).green(),
                Ok(_) => "[no avatar]".dimmed(),
                Err(_) => "[bad avatar]".red(),
            };
            row.push_str(&format!("  {}", avatar));
        }
        row
    }
}

impl PresentationSink for TerminalSink {
    fn on_conversations_updated(&mut self, conversations: &[ConversationSummary]) {
        self.renders += 1;
        println!();
        println!(
            "{} {}",
            format!("⚡ Conversations #{}", self.renders).bright_cyan().bold(),
            format!("({} peers)", conversations.len()).dimmed()
        );
        if conversations.is_empty() {
            println!("  {}", "no conversations yet".dimmed());
        }
        for summary in conversations {
            println!("{}", self.render_row(summary));
        }
    }

    fn on_scroll_to_top(&mut self) {}

    fn on_first_load_complete(&mut self) {
        println!("{} {}", "✓".green(), "initial load complete".green());
    }
}

/// Drive a synchronizer from a replay file, or from JSON lines on stdin
pub async fn run(config: Config) -> anyhow::Result<()> {
    let user_id = config
        .current_user_id
        .clone()
        .context("current user id is required")?;
    let credentials = StaticCredentials::new(user_id);

    let EventSource {
        as_sender,
        as_receiver,
        receiver,
    } = EventSource::open(config.queue_capacity)?;
    let sync = ConversationSync::new(&credentials, TerminalSink::new(config.show_avatars));
    let handle = spawn_sync(sync, receiver);

    let route = |delivery: Delivery| {
        let sender = match delivery.subscription {
            Subscription::AsSender => as_sender.clone(),
            Subscription::AsReceiver => as_receiver.clone(),
        };
        async move { sender.deliver(delivery.batch).await }
    };

    match &config.replay_path {
        Some(path) => {
            let deliveries = load_deliveries(path)
                .with_context(|| format!("failed to load replay file {}", path.display()))?;
            info!("Replaying {} deliveries from {}", deliveries.len(), path.display());
            for delivery in deliveries {
                route(delivery).await?;
            }
        }
        None => {
            info!("Reading deliveries from stdin");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut line_no = 0;
            while let Some(line) = lines.next_line().await? {
                line_no += 1;
                if let Some(delivery) = parse_delivery_line(&line, line_no)? {
                    route(delivery).await?;
                }
            }
        }
    }

    drop(as_sender);
    drop(as_receiver);
    let sync = handle.join().await?;

    let stats = sync.stats();
    println!();
    println!(
        "{} {} batches applied, {} discarded, {} events applied, {} stale, {} ignored, {} malformed",
        "Σ".bright_white().bold(),
        stats.batches_applied.to_string().cyan(),
        stats.batches_discarded.to_string().yellow(),
        stats.events_applied,
        stats.events_stale,
        stats.records_ignored,
        stats.records_malformed.to_string().red()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_types::Avatar;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_render_row_mentions_peer() {
        colored::control::set_override(false);
        let sink = TerminalSink::new(true);
        let row = sink.render_row(&ConversationSummary {
            peer_id: "U2".to_string(),
            peer_display_name: "Bob".to_string(),
            peer_avatar: Avatar::new("aGk="),
            last_message_text: "hi".to_string(),
            last_message_timestamp: Utc.timestamp_opt(10, 0).unwrap(),
        });

        assert!(row.contains("Bob"));
        assert!(row.contains("(U2)"));
        assert!(row.contains("hi"));
        assert!(row.contains("[avatar 2 bytes]"));
    }
}
