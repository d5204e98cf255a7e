use async_trait::async_trait;
use common::models::Alert;
#[cfg(test)]
use mockall::automock;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode, ReplyParameters};
use teloxide::utils::markdown::{bold, escape, link};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Request(#[from] teloxide::RequestError),
}

/// Outgoing Telegram calls, one per message flavour.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send_photo(
        &self,
        chat_id: i64,
        png: Vec<u8>,
        caption: String,
        reply_to: Option<i32>,
    ) -> Result<(), DeliveryError>;

    async fn send_markdown(&self, chat_id: i64, text: String, reply_to: Option<i32>) -> Result<(), DeliveryError>;

    async fn send_plain(&self, chat_id: i64, text: String, reply_to: Option<i32>) -> Result<(), DeliveryError>;
}

pub struct TeloxideSender {
    bot: Bot,
}

impl TeloxideSender {
    pub fn new(token: impl Into<String>) -> Self {
        Self { bot: Bot::new(token) }
    }
}

fn reply(message_id: i32) -> ReplyParameters {
    ReplyParameters::new(MessageId(message_id))
}

#[async_trait]
impl AlertSender for TeloxideSender {
    async fn send_photo(
        &self,
        chat_id: i64,
        png: Vec<u8>,
        caption: String,
        reply_to: Option<i32>,
    ) -> Result<(), DeliveryError> {
        let mut request = self
            .bot
            .send_photo(ChatId(chat_id), InputFile::memory(png).file_name("chart.png"))
            .caption(caption)
            .parse_mode(ParseMode::MarkdownV2);
        if let Some(id) = reply_to {
            request = request.reply_parameters(reply(id));
        }
        request.await?;
        Ok(())
    }

    async fn send_markdown(&self, chat_id: i64, text: String, reply_to: Option<i32>) -> Result<(), DeliveryError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::MarkdownV2);
        if let Some(id) = reply_to {
            request = request.reply_parameters(reply(id));
        }
        request.await?;
        Ok(())
    }

    async fn send_plain(&self, chat_id: i64, text: String, reply_to: Option<i32>) -> Result<(), DeliveryError> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(id) = reply_to {
            request = request.reply_parameters(reply(id));
        }
        request.await?;
        Ok(())
    }
}

/// MarkdownV2 body: bold title, one `label: value` line per field, link last.
pub fn render_markdown(alert: &Alert) -> String {
    let mut lines = vec![bold(&escape(&alert.title)), String::new()];
    lines.extend(
        alert
            .fields
            .iter()
            .map(|f| format!("{}: {}", bold(&escape(&f.label)), escape(&f.value))),
    );
    if let Some(l) = &alert.link {
        lines.push(String::new());
        lines.push(link(&l.url, &escape(&l.text)));
    }
    lines.join("\n")
}

pub struct TelegramService<S> {
    sender: S,
}

impl<S: AlertSender> TelegramService<S> {
    pub fn new(sender: S) -> Self {
        Self { sender }
    }

    /// Photo first when a chart exists, then formatted text, then plain text
    /// carrying the last error. Only the plain-text failure is returned.
    pub async fn deliver(&self, alert: &Alert) -> Result<(), DeliveryError> {
        let text = render_markdown(alert);

        let rich = match &alert.chart {
            Some(png) => {
                match self
                    .sender
                    .send_photo(alert.chat_id, png.clone(), text.clone(), alert.reply_to)
                    .await
                {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        warn!("Failed to send chart, retrying as text: {}", e);
                        self.sender.send_markdown(alert.chat_id, text, alert.reply_to).await
                    }
                }
            }
            None => self.sender.send_markdown(alert.chat_id, text, alert.reply_to).await,
        };

        let Err(e) = rich else {
            debug!("Delivered alert to {}", alert.chat_id);
            return Ok(());
        };

        error!("Failed to send formatted alert: {}", e);
        let fallback = format!("{}\n\nError sending message: {}", alert.plain_text(), e);
        self.sender
            .send_plain(alert.chat_id, fallback, alert.reply_to)
            .await
    }

    /// Drains the queue until every sender is dropped.
    pub async fn start(self, mut rx: mpsc::UnboundedReceiver<Alert>) {
        info!("Starting Telegram Notification Service");

        while let Some(alert) = rx.recv().await {
            if let Err(e) = self.deliver(&alert).await {
                error!("Failed to send Telegram message: {}", e);
            }
        }

        info!("Telegram notification channel closed. Stopping service.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::{always, eq};
    use mockall::Sequence;
    use teloxide::ApiError;

    fn api_error(reason: &str) -> DeliveryError {
        DeliveryError::Request(teloxide::RequestError::Api(ApiError::Unknown(reason.to_string())))
    }

    fn alert() -> Alert {
        Alert::new(-100, "EMA200 Signal - BTCUSDT 15m - 🟢 LONG")
            .with_field("Close Price", "100.15")
            .with_field("Distance", "0.15%")
            .with_link("🔗 Open in Binance Chart", "https://www.binance.com/en/futures/BTCUSDT")
    }

    #[test]
    fn test_markdown_escapes_reserved_characters() {
        let text = render_markdown(&alert());

        assert!(text.starts_with("*EMA200 Signal \\- BTCUSDT 15m \\- 🟢 LONG*"));
        assert!(text.contains("*Close Price*: 100\\.15"));
        assert!(text.contains("*Distance*: 0\\.15%"));
        assert!(text.ends_with("[🔗 Open in Binance Chart](https://www.binance.com/en/futures/BTCUSDT)"));
    }

    #[tokio::test]
    async fn test_chart_goes_out_as_photo() {
        let mut sender = MockAlertSender::new();
        sender
            .expect_send_photo()
            .with(eq(-100), eq(vec![1_u8, 2, 3]), always(), eq(Some(7)))
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        sender.expect_send_markdown().never();
        sender.expect_send_plain().never();

        let service = TelegramService::new(sender);
        let alert = alert().with_chart(Some(vec![1, 2, 3])).reply_to(Some(7));

        assert!(service.deliver(&alert).await.is_ok());
    }

    #[tokio::test]
    async fn test_without_chart_sends_markdown() {
        let mut sender = MockAlertSender::new();
        sender.expect_send_photo().never();
        sender
            .expect_send_markdown()
            .withf(|chat_id, text, reply_to| *chat_id == -100 && text.starts_with('*') && reply_to.is_none())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = TelegramService::new(sender);
        assert!(service.deliver(&alert()).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_photo_falls_back_to_text() {
        let mut seq = Sequence::new();
        let mut sender = MockAlertSender::new();
        sender
            .expect_send_photo()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Err(api_error("PHOTO_INVALID_DIMENSIONS")));
        sender
            .expect_send_markdown()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        sender.expect_send_plain().never();

        let service = TelegramService::new(sender);
        let alert = alert().with_chart(Some(vec![0; 16]));

        assert!(service.deliver(&alert).await.is_ok());
    }

    #[tokio::test]
    async fn test_plain_text_carries_the_error() {
        let mut sender = MockAlertSender::new();
        sender
            .expect_send_markdown()
            .times(1)
            .returning(|_, _, _| Err(api_error("can't parse entities")));
        sender
            .expect_send_plain()
            .withf(|_, text, _| {
                text.starts_with("EMA200 Signal - BTCUSDT 15m - 🟢 LONG\nClose Price: 100.15")
                    && text.contains("Error sending message: ")
                    && text.contains("can't parse entities")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = TelegramService::new(sender);
        assert!(service.deliver(&alert()).await.is_ok());
    }

    #[tokio::test]
    async fn test_worker_survives_failures_and_stops_when_queue_closes() {
        let mut sender = MockAlertSender::new();
        sender
            .expect_send_markdown()
            .times(2)
            .returning(|_, _, _| Err(api_error("chat not found")));
        sender
            .expect_send_plain()
            .times(2)
            .returning(|_, _, _| Err(api_error("chat not found")));

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(alert()).unwrap();
        tx.send(alert()).unwrap();
        drop(tx);

        TelegramService::new(sender).start(rx).await;
    }
}
