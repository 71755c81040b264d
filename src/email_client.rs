use crate::{domain::SubscriberEmail, registration::Notifier};

use std::time::Duration;

use {
    anyhow::Context,
    async_trait::async_trait,
    reqwest::{Client, Url},
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
};

const REGISTRATION_SUBJECT: &str = "Welcome!";
const REGISTRATION_HTML: &str = "Thanks for registering!<br />\
    You will hear from us as soon as we launch.";
const REGISTRATION_TEXT: &str = "Thanks for registering!\n\
    You will hear from us as soon as we launch.";

#[derive(Debug)]
pub struct EmailClient {
    sender: SubscriberEmail,
    http_client: Client,
    base_url: Url,
    authorization_token: Secret<String>,
}

impl EmailClient {
    pub fn new(
        base_url: &str,
        sender: SubscriberEmail,
        authorization_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build the email HTTP client")?;
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid email API base url: {}", base_url))?;
        Ok(Self {
            http_client,
            base_url,
            sender,
            authorization_token,
        })
    }

    pub async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), anyhow::Error> {
        let url = self
            .base_url
            .join("email")
            .context("Failed to join base URL with `/email` endpoint")?;

        let request_body = SendEmailRequest {
            from: self.sender.as_ref(),
            to: recipient.as_ref(),
            subject,
            html_body: html_content,
            text_body: text_content,
        };

        self.http_client
            .post(url)
            .header(
                "X-Postmark-Server-Token",
                self.authorization_token.expose_secret(),
            )
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailClient {
    #[tracing::instrument(name = "Sending registration email", skip(self, recipient))]
    async fn notify(&self, recipient: &SubscriberEmail) -> Result<(), anyhow::Error> {
        self.send_email(
            recipient,
            REGISTRATION_SUBJECT,
            REGISTRATION_HTML,
            REGISTRATION_TEXT,
        )
        .await
        .with_context(|| format!("Failed to send registration email to {}", recipient))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}
