#[derive(Debug, Clone, PartialEq)]
pub struct AlertField {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertLink {
    pub text: String,
    pub url: String,
}

/// Payload handed to the notification queue.
#[derive(Clone, PartialEq)]
pub struct Alert {
    pub title: String,
    pub fields: Vec<AlertField>,
    pub link: Option<AlertLink>,
    /// PNG encoded chart, when one could be rendered.
    pub chart: Option<Vec<u8>>,
    pub chat_id: i64,
    pub reply_to: Option<i32>,
}

impl Alert {
    pub fn new(chat_id: i64, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
            link: None,
            chart: None,
            chat_id,
            reply_to: None,
        }
    }

    pub fn with_field(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(AlertField {
            label: label.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_link(mut self, text: impl Into<String>, url: impl Into<String>) -> Self {
        self.link = Some(AlertLink {
            text: text.into(),
            url: url.into(),
        });
        self
    }

    pub fn with_chart(mut self, chart: Option<Vec<u8>>) -> Self {
        self.chart = chart;
        self
    }

    pub fn reply_to(mut self, message_id: Option<i32>) -> Self {
        self.reply_to = message_id;
        self
    }

    /// Unformatted rendering used when rich delivery is not possible.
    pub fn plain_text(&self) -> String {
        let mut lines = vec![self.title.clone()];
        lines.extend(self.fields.iter().map(|f| format!("{}: {}", f.label, f.value)));
        if let Some(link) = &self.link {
            lines.push(format!("{}: {}", link.text, link.url));
        }
        lines.join("\n")
    }
}

impl std::fmt::Debug for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alert")
            .field("title", &self.title)
            .field("fields", &self.fields)
            .field("link", &self.link)
            .field("chart", &self.chart.as_ref().map(|c| format!("<{} bytes>", c.len())))
            .field("chat_id", &self.chat_id)
            .field("reply_to", &self.reply_to)
            .finish()
    }
}
