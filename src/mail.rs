//! Outgoing account mail.
//!
//! Handlers talk to a [`Mailer`] trait object. The shipped [`LogMailer`]
//! writes each message as a structured log record; a real transport plugs in
//! through [`crate::state::AppState::with_mailer`].

use async_trait::async_trait;

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailKind {
    VerificationCode { code: String },
    PasswordChanged,
    ProfileUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub kind: MailKind,
}

impl MailMessage {
    fn new(cfg: &MailConfig, to: &str, subject: &str, body: String, kind: MailKind) -> Self {
        Self {
            from: format!("{} <{}>", cfg.from_name, cfg.from_address),
            to: to.to_string(),
            subject: subject.to_string(),
            body,
            kind,
        }
    }

    pub fn verification_code(cfg: &MailConfig, to: &str, name: &str, code: &str) -> Self {
        let body = format!("Hola {}, tu código de verificación es {}.", name, code);
        Self::new(cfg, to, "Código de verificación", body, MailKind::VerificationCode { code: code.to_string() })
    }

    pub fn password_changed(cfg: &MailConfig, to: &str, name: &str) -> Self {
        let body = format!("Hola {}, tu contraseña fue actualizada.", name);
        Self::new(cfg, to, "Contraseña actualizada", body, MailKind::PasswordChanged)
    }

    pub fn profile_updated(cfg: &MailConfig, to: &str, name: &str) -> Self {
        let body = format!("Hola {}, los datos de tu cuenta fueron actualizados.", name);
        Self::new(cfg, to, "Cuenta actualizada", body, MailKind::ProfileUpdated)
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()>;
}

/// Writes mail to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()> {
        tracing::info!(to = %message.to, subject = %message.subject, "Mail queued (log transport)");
        // Codes are credentials; keep them out of the default log level.
        if let MailKind::VerificationCode { code } = &message.kind {
            tracing::debug!(to = %message.to, code = %code, "Verification code (log transport)");
        }
        Ok(())
    }
}
