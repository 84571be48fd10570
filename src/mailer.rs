use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

/// Opaque mail-dispatch collaborator. The auth flow only needs "send this
/// code to this address"; delivery details stay behind the trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_reset_code(&self, to: &str, code: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("smtp relay setup")?
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .port(cfg.port)
            .build();
        Ok(Self {
            transport,
            from: cfg.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_reset_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.parse().context("invalid from address")?)
            .to(to.parse().context("invalid to address")?)
            .subject("Your password reset code")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Your password reset code is {code}. It expires in 10 minutes.\n\
                 If you did not request a reset, you can ignore this email."
            ))
            .context("build reset email")?;

        self.transport
            .send(email)
            .await
            .context("smtp send reset email")?;
        info!(to = %to, "reset code dispatched");
        Ok(())
    }
}

/// Test double that records every dispatched code instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_reset_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .expect("recording mailer lock")
            .push((to.to_string(), code.to_string()));
        Ok(())
    }
}
