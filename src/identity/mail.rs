use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

const DEFAULT_SUBJECT: &str = "No Subject";
pub const ACTIVATION_SUBJECT: &str = "Activer votre compte Kompagnon";
const ACTIVATE_PATH: &str = "authentication/activate?token=";
const OUTBOX_CAPACITY: usize = 32;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Recipient email address is required")]
    MissingRecipient,

    #[error("Email content is required")]
    MissingContent,

    #[error("Error sending email: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A mail as requested by callers. HTML wins when both bodies are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mail {
    pub to: String,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
}

impl Mail {
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            ..Self::default()
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Checks the mail is sendable and resolves it for delivery.
    pub fn prepare(self, from: &str) -> Result<OutgoingMail, MailError> {
        if self.to.trim().is_empty() {
            return Err(MailError::MissingRecipient);
        }
        let non_empty = |body: Option<String>| body.filter(|b| !b.is_empty());
        let body = match (non_empty(self.html), non_empty(self.text)) {
            (Some(html), _) => MailBody::Html(html),
            (None, Some(text)) => MailBody::Text(text),
            (None, None) => return Err(MailError::MissingContent),
        };

        Ok(OutgoingMail {
            from: from.to_string(),
            to: self.to,
            subject: self
                .subject
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            body,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBody {
    Text(String),
    Html(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    #[serde(flatten)]
    pub body: MailBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MailReceipt {
    /// Delivery is switched off; the mail is echoed back.
    Disabled(OutgoingMail),
    Sent { message_id: Option<String> },
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<MailReceipt, MailError>;
}

/// Logs mails instead of sending them.
///
/// The most recent mails are kept for inspection; older ones are dropped.
#[derive(Debug, Default)]
pub struct DisabledMailer {
    from: String,
    outbox: Mutex<VecDeque<OutgoingMail>>,
}

impl DisabledMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            outbox: Mutex::new(VecDeque::with_capacity(OUTBOX_CAPACITY)),
        }
    }

    /// Kept mails, oldest first.
    pub async fn outbox(&self) -> Vec<OutgoingMail> {
        self.outbox.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl MailSender for DisabledMailer {
    async fn send(&self, mail: Mail) -> Result<MailReceipt, MailError> {
        let outgoing = mail.prepare(&self.from)?;
        info!(to = %outgoing.to, subject = %outgoing.subject, "Email disabled. Mail not sent");
        let mut outbox = self.outbox.lock().await;
        if outbox.len() == OUTBOX_CAPACITY {
            outbox.pop_front();
        }
        outbox.push_back(outgoing.clone());
        Ok(MailReceipt::Disabled(outgoing))
    }
}

/// Posts mails as JSON to an HTTP mail relay.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            from: from.into(),
        }
    }
}

#[async_trait]
impl MailSender for HttpMailer {
    async fn send(&self, mail: Mail) -> Result<MailReceipt, MailError> {
        let outgoing = mail.prepare(&self.from)?;

        let mut request = self.client.post(&self.endpoint).json(&outgoing);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await.and_then(|r| r.error_for_status()) {
            Ok(response) => response,
            Err(err) => {
                warn!(to = %outgoing.to, error = %err, "mail relay rejected message");
                return Err(err.into());
            }
        };

        let message_id = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("id").and_then(|id| id.as_str()).map(str::to_string));
        info!(to = %outgoing.to, ?message_id, "email sent");
        Ok(MailReceipt::Sent { message_id })
    }
}

pub fn activation_link(base_url: &str, token: &str) -> String {
    format!("{}{}{}", base_url, ACTIVATE_PATH, token)
}

/// The account activation mail sent after registration.
pub fn activation_mail(base_url: &str, firstname: &str, lastname: &str, email: &str, token: &str) -> Mail {
    let link = activation_link(base_url, token);
    let html = format!(
        "<p>Bonjour {firstname} {lastname},</p>\
         <p>Merci pour votre inscription sur Kompagnon. \
         Cliquez sur le lien ci-dessous pour activer votre compte :</p>\
         <p><a href=\"{link}\">Activer mon compte</a></p>\
         <p>Si le lien ne fonctionne pas, copiez cette adresse dans votre navigateur : {link}</p>"
    );
    Mail::new(email).subject(ACTIVATION_SUBJECT).html(html)
}
