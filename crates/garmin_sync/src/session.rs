//! Session acquisition: stored tokens first, then an interactive login.

use async_trait::async_trait;
use garmin_connect_client::{Authenticator, GarminError, LoginOutcome};
use secrecy::SecretString;
use std::path::PathBuf;
use thiserror::Error;

/// Login values known before prompting; whichever is missing is asked for.
#[derive(Clone, Debug, Default)]
pub struct PresetCredentials {
    pub email: Option<String>,
    pub password: Option<SecretString>,
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt interrupted")]
    Interrupted,
    #[error("prompt failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<dialoguer::Error> for PromptError {
    #[allow(unreachable_patterns)]
    fn from(err: dialoguer::Error) -> Self {
        match err {
            dialoguer::Error::IO(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                PromptError::Interrupted
            }
            dialoguer::Error::IO(e) => PromptError::Io(e),
            other => PromptError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

/// Source of interactive answers during login.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn read_email(&self) -> Result<String, PromptError>;
    async fn read_password(&self) -> Result<SecretString, PromptError>;
    async fn read_mfa_code(&self) -> Result<String, PromptError>;
}

/// Prompts on the controlling terminal; the password is not echoed.
///
/// Reads run on the blocking pool so a Ctrl-C handler can still fire.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    async fn input(prompt: &'static str) -> Result<String, PromptError> {
        tokio::task::spawn_blocking(move || -> Result<String, PromptError> {
            Ok(dialoguer::Input::<String>::new()
                .with_prompt(prompt)
                .interact_text()?)
        })
        .await
        .map_err(|_| PromptError::Interrupted)?
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn read_email(&self) -> Result<String, PromptError> {
        Self::input("Login email").await
    }

    async fn read_password(&self) -> Result<SecretString, PromptError> {
        tokio::task::spawn_blocking(|| -> Result<SecretString, PromptError> {
            let password = dialoguer::Password::new()
                .with_prompt("Enter password")
                .interact()?;
            Ok(SecretString::new(password.into()))
        })
        .await
        .map_err(|_| PromptError::Interrupted)?
    }

    async fn read_mfa_code(&self) -> Result<String, PromptError> {
        Self::input("Enter MFA code").await
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection error during login: {0}")]
    Connection(#[source] GarminError),
    #[error("login interrupted")]
    Interrupted,
    #[error("rate limited during MFA, try again later")]
    MfaRateLimited,
    #[error("MFA failed: {0}")]
    MfaFailed(#[source] GarminError),
    #[error("could not read login input: {0}")]
    Prompt(String),
}

impl From<PromptError> for SessionError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Interrupted => SessionError::Interrupted,
            PromptError::Io(e) => SessionError::Prompt(e.to_string()),
        }
    }
}

pub struct SessionManager<A, P> {
    authenticator: A,
    prompter: P,
    token_dir: PathBuf,
    preset: PresetCredentials,
}

impl<A, P> SessionManager<A, P>
where
    A: Authenticator,
    P: Prompter,
{
    pub fn new(authenticator: A, prompter: P, token_dir: impl Into<PathBuf>) -> Self {
        Self {
            authenticator,
            prompter,
            token_dir: token_dir.into(),
            preset: PresetCredentials::default(),
        }
    }

    /// Values for the first login attempt; later attempts prompt for both.
    pub fn with_preset(mut self, preset: PresetCredentials) -> Self {
        self.preset = preset;
        self
    }

    /// Produce an authenticated client, or the reason none could be had.
    pub async fn acquire(&self) -> Result<A::Client, SessionError> {
        match self.authenticator.restore(&self.token_dir).await {
            Ok(client) => {
                println!("Authenticated with stored tokens.");
                return Ok(client);
            }
            Err(e) => tracing::debug!("stored tokens unusable: {}", e),
        }

        let mut preset = self.preset.clone();
        loop {
            let PresetCredentials { email, password } = std::mem::take(&mut preset);
            let email = match email {
                Some(email) => email,
                None => self.prompter.read_email().await?,
            };
            let password = match password {
                Some(password) => password,
                None => self.prompter.read_password().await?,
            };

            let client = match self.authenticator.login(&email, &password).await
            {
                Ok(LoginOutcome::Authenticated(client)) => client,
                Ok(LoginOutcome::NeedsMfa(challenge)) => {
                    let code = self.prompter.read_mfa_code().await?;
                    match self.authenticator.resume_login(challenge, &code).await {
                        Ok(client) => client,
                        Err(GarminError::RateLimited(_)) => {
                            println!("Rate limited during MFA. Try again later.");
                            return Err(SessionError::MfaRateLimited);
                        }
                        Err(GarminError::Auth(e)) => {
                            tracing::debug!("mfa rejected: {}", e);
                            println!("Invalid MFA code. Try again.");
                            continue;
                        }
                        Err(GarminError::Sso(e)) => {
                            tracing::debug!("mfa page unexpected: {}", e);
                            println!("MFA failed. Try again.");
                            continue;
                        }
                        Err(e) => return Err(SessionError::MfaFailed(e)),
                    }
                }
                Err(GarminError::Auth(e)) => {
                    tracing::debug!("login rejected: {}", e);
                    println!("Invalid credentials. Try again.");
                    continue;
                }
                Err(e) => {
                    println!("Connection error during login.");
                    return Err(SessionError::Connection(e));
                }
            };

            if let Err(e) = self.authenticator.persist(&client, &self.token_dir).await {
                tracing::warn!("could not save tokens to {}: {}", self.token_dir.display(), e);
            }
            println!("Authenticated successfully.");
            return Ok(client);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{LoginStep, MockAuthenticator, ScriptedPrompter, preset};

    fn manager(
        auth: MockAuthenticator,
        prompter: ScriptedPrompter,
    ) -> SessionManager<MockAuthenticator, ScriptedPrompter> {
        SessionManager::new(auth, prompter, "/tokens")
    }

    #[tokio::test]
    async fn stored_tokens_skip_prompting() {
        let auth = MockAuthenticator::restoring();
        let prompter = ScriptedPrompter::default();
        let session = manager(auth, prompter);

        session.acquire().await.expect("client");
        assert_eq!(session.prompter.email_reads(), 0);
        assert!(session.authenticator.logins().is_empty());
        assert_eq!(session.authenticator.persisted(), 0);
    }

    #[tokio::test]
    async fn env_credentials_login_and_persist() {
        let auth = MockAuthenticator::default().with_logins(vec![Ok(LoginStep::Authenticated)]);
        let session = manager(auth, ScriptedPrompter::default())
            .with_preset(preset(Some("env@example.com"), Some("secret")));

        session.acquire().await.expect("client");
        assert_eq!(session.authenticator.logins(), vec!["env@example.com"]);
        assert_eq!(session.authenticator.persisted(), 1);
        assert_eq!(session.prompter.email_reads(), 0);
    }

    #[tokio::test]
    async fn invalid_credentials_reprompt() {
        let auth = MockAuthenticator::default().with_logins(vec![
            Err(GarminError::Auth("401".into())),
            Ok(LoginStep::Authenticated),
        ]);
        let prompter = ScriptedPrompter::default().with_emails(vec!["typed@example.com"]);
        let session =
            manager(auth, prompter).with_preset(preset(Some("env@example.com"), Some("secret")));

        session.acquire().await.expect("client");
        assert_eq!(
            session.authenticator.logins(),
            vec!["env@example.com", "typed@example.com"]
        );
        assert_eq!(session.prompter.email_reads(), 1);
    }

    #[tokio::test]
    async fn invalid_mfa_code_restarts_from_email() {
        let auth = MockAuthenticator::default()
            .with_logins(vec![Ok(LoginStep::NeedsMfa), Ok(LoginStep::NeedsMfa)])
            .with_resumes(vec![Err(GarminError::Auth("bad code".into())), Ok(())]);
        let prompter = ScriptedPrompter::default()
            .with_emails(vec!["a@example.com", "a@example.com"])
            .with_codes(vec!["111111", "222222"]);
        let session = manager(auth, prompter);

        session.acquire().await.expect("client");
        assert_eq!(session.authenticator.codes(), vec!["111111", "222222"]);
        assert_eq!(session.prompter.email_reads(), 2);
        assert_eq!(session.authenticator.persisted(), 1);
    }

    #[tokio::test]
    async fn mfa_rate_limit_is_fatal() {
        let auth = MockAuthenticator::default()
            .with_logins(vec![Ok(LoginStep::NeedsMfa)])
            .with_resumes(vec![Err(GarminError::RateLimited("429".into()))]);
        let prompter = ScriptedPrompter::default()
            .with_emails(vec!["a@example.com"])
            .with_codes(vec!["123456"]);
        let session = manager(auth, prompter);

        let err = session.acquire().await.unwrap_err();
        assert!(matches!(err, SessionError::MfaRateLimited));
        assert_eq!(session.authenticator.persisted(), 0);
    }

    #[tokio::test]
    async fn other_mfa_errors_are_fatal() {
        let auth = MockAuthenticator::default()
            .with_logins(vec![Ok(LoginStep::NeedsMfa)])
            .with_resumes(vec![Err(GarminError::Api {
                status: 500,
                body: "oops".into(),
            })]);
        let prompter = ScriptedPrompter::default()
            .with_emails(vec!["a@example.com"])
            .with_codes(vec!["123456"]);
        let session = manager(auth, prompter);

        let err = session.acquire().await.unwrap_err();
        assert!(matches!(err, SessionError::MfaFailed(_)));
    }

    #[tokio::test]
    async fn connection_failure_aborts_without_loop() {
        let auth = MockAuthenticator::default()
            .with_logins(vec![Err(GarminError::Connection("refused".into()))]);
        let prompter = ScriptedPrompter::default()
            .with_emails(vec!["a@example.com", "b@example.com"]);
        let session = manager(auth, prompter);

        let err = session.acquire().await.unwrap_err();
        assert!(matches!(err, SessionError::Connection(_)));
        assert_eq!(session.prompter.email_reads(), 1);
    }

    #[tokio::test]
    async fn interrupted_prompt_aborts() {
        let session = manager(MockAuthenticator::default(), ScriptedPrompter::default());
        let err = session.acquire().await.unwrap_err();
        assert!(matches!(err, SessionError::Interrupted));
    }

    #[tokio::test]
    async fn persist_failure_still_returns_client() {
        let auth = MockAuthenticator::default()
            .with_logins(vec![Ok(LoginStep::Authenticated)])
            .failing_persist();
        let prompter = ScriptedPrompter::default().with_emails(vec!["a@example.com"]);
        let session = manager(auth, prompter);

        assert!(session.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn preset_email_prompts_only_for_password() {
        let auth = MockAuthenticator::default().with_logins(vec![Ok(LoginStep::Authenticated)]);
        let session = manager(auth, ScriptedPrompter::default())
            .with_preset(preset(Some("env@example.com"), None));

        session.acquire().await.expect("client");
        assert_eq!(session.authenticator.logins(), vec!["env@example.com"]);
        assert_eq!(session.prompter.email_reads(), 0);
        assert_eq!(session.prompter.password_reads(), 1);
    }

    #[tokio::test]
    async fn preset_password_prompts_only_for_email() {
        let auth = MockAuthenticator::default().with_logins(vec![Ok(LoginStep::Authenticated)]);
        let prompter = ScriptedPrompter::default().with_emails(vec!["typed@example.com"]);
        let session = manager(auth, prompter).with_preset(preset(None, Some("from-env")));

        session.acquire().await.expect("client");
        assert_eq!(session.authenticator.logins(), vec!["typed@example.com"]);
        assert_eq!(session.prompter.password_reads(), 0);
    }

    #[tokio::test]
    async fn unexpected_mfa_page_restarts_login() {
        let auth = MockAuthenticator::default()
            .with_logins(vec![Ok(LoginStep::NeedsMfa), Ok(LoginStep::NeedsMfa)])
            .with_resumes(vec![Err(GarminError::Sso("title not found".into())), Ok(())]);
        let prompter = ScriptedPrompter::default()
            .with_emails(vec!["a@example.com", "a@example.com"])
            .with_codes(vec!["111111", "222222"]);
        let session = manager(auth, prompter);

        session.acquire().await.expect("client");
        assert_eq!(session.authenticator.codes(), vec!["111111", "222222"]);
        assert_eq!(session.prompter.email_reads(), 2);
        assert_eq!(session.authenticator.persisted(), 1);
    }
}
