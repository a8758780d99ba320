//! Single sign-on against the Garmin SSO service.
//!
//! The flow drives the embedded sign-in widget: load the sign-in form for a
//! CSRF token, post the credentials, optionally post a one-time code, then
//! trade the resulting service ticket for an OAuth2 bearer token.

use crate::config::ClientConfig;
use crate::http_client::{ReqwestGarminClient, error_from_response};
use crate::token::{OAuthToken, TokenResponse, TokenStore};
use crate::{Authenticator, GarminError, LoginOutcome};
use async_trait::async_trait;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use std::sync::LazyLock;

static CSRF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="_csrf"\s+value="(.+?)""#).expect("valid csrf regex"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>(.+?)</title>").expect("valid title regex"));
static TICKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"embed\?ticket=([^"]+)""#).expect("valid ticket regex"));

const USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Sign-in state kept between the credential step and the one-time code.
#[derive(Debug)]
pub struct MfaChallenge {
    http: reqwest::Client,
    csrf: String,
}

/// [`Authenticator`] backed by the Garmin SSO and Connect API.
#[derive(Clone, Debug)]
pub struct GarminConnect {
    config: ClientConfig,
}

impl GarminConnect {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    fn sso_url(&self, path: &str) -> String {
        format!("{}/sso{}", self.config.sso_base_url, path)
    }

    fn signin_params(&self) -> Vec<(&'static str, String)> {
        let embed = self.sso_url("/embed");
        vec![
            ("id", "gauth-widget".into()),
            ("embedWidget", "true".into()),
            ("gauthHost", embed.clone()),
            ("service", embed.clone()),
            ("source", embed.clone()),
            ("redirectAfterAccountLoginUrl", embed.clone()),
            ("redirectAfterAccountCreationUrl", embed),
        ]
    }

    /// A fresh client with its own cookie jar for one sign-in attempt.
    fn session_client() -> Result<reqwest::Client, GarminError> {
        Ok(reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()?)
    }

    async fn fetch_page(request: reqwest::RequestBuilder) -> Result<String, GarminError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(resp.text().await?)
    }

    /// Turn a "Success" page into an authenticated client.
    async fn finish(
        &self,
        http: &reqwest::Client,
        page: &str,
    ) -> Result<ReqwestGarminClient, GarminError> {
        let title = capture(&TITLE_RE, page, "title")?;
        if title != "Success" {
            return Err(GarminError::Auth(format!("sign-in rejected: {title}")));
        }
        let ticket = capture(&TICKET_RE, page, "service ticket")?;
        let token = self.exchange_ticket(http, &ticket).await?;
        self.connect(token).await
    }

    async fn exchange_ticket(
        &self,
        http: &reqwest::Client,
        ticket: &str,
    ) -> Result<OAuthToken, GarminError> {
        let service = self.sso_url("/embed");
        let payload = self
            .request_token(http, &[("ticket", ticket), ("service", service.as_str())])
            .await?;
        Ok(payload.into_token(chrono::Utc::now().timestamp()))
    }

    /// Trade the refresh token of an expired bundle for a new access token.
    async fn refresh(&self, token: &OAuthToken, now: i64) -> Result<OAuthToken, GarminError> {
        let refresh_token = match &token.refresh_token {
            Some(t) if token.can_refresh(now) => t,
            _ => return Err(GarminError::Auth("stored token expired".into())),
        };
        let payload = self
            .request_token(
                &Self::session_client()?,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.expose_secret()),
                ],
            )
            .await?;
        let mut fresh = payload.into_token(now);
        // The provider may keep the old refresh token valid instead of rotating it.
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = token.refresh_token.clone();
            fresh.refresh_token_expires_at = token.refresh_token_expires_at;
        }
        Ok(fresh)
    }

    async fn request_token(
        &self,
        http: &reqwest::Client,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, GarminError> {
        let url = format!(
            "{}/oauth-service/oauth/exchange/user/2.0",
            self.config.api_base_url
        );
        let resp = http.post(url).form(form).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(resp.json().await?)
    }

    /// Resolve the display name the wellness endpoints are keyed by.
    async fn connect(&self, token: OAuthToken) -> Result<ReqwestGarminClient, GarminError> {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct SocialProfile {
            display_name: String,
        }

        let url = format!(
            "{}/userprofile-service/socialProfile",
            self.config.api_base_url
        );
        let resp = Self::session_client()?
            .get(url)
            .bearer_auth(token.access_token.expose_secret())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        let profile: SocialProfile = resp.json().await?;
        tracing::debug!(display_name = %profile.display_name, "connected to Garmin Connect");
        Ok(ReqwestGarminClient::new(
            &self.config.api_base_url,
            profile.display_name,
            token,
        ))
    }
}

fn capture(re: &Regex, page: &str, what: &str) -> Result<String, GarminError> {
    re.captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| GarminError::Sso(format!("{what} not found in sign-in page")))
}

#[async_trait]
impl Authenticator for GarminConnect {
    type Client = ReqwestGarminClient;
    type Challenge = MfaChallenge;

    /// Load the stored bundle, refreshing and re-saving it when the access
    /// token has expired.
    async fn restore(&self, token_dir: &Path) -> Result<ReqwestGarminClient, GarminError> {
        let store = TokenStore::new(token_dir);
        let mut token = store.load().await?;
        let now = chrono::Utc::now().timestamp();
        if token.is_expired(now) {
            token = self.refresh(&token, now).await?;
            store.save(&token).await?;
            tracing::info!("refreshed expired access token");
        }
        self.connect(token).await
    }

    async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome<ReqwestGarminClient, MfaChallenge>, GarminError> {
        let http = Self::session_client()?;
        let params = self.signin_params();
        let embed = [
            ("id", "gauth-widget"),
            ("embedWidget", "true"),
            ("gauthHost", self.config.sso_base_url.as_str()),
        ];
        Self::fetch_page(http.get(self.sso_url("/embed")).query(&embed)).await?;

        let signin_url = self.sso_url("/signin");
        let form_page = Self::fetch_page(http.get(&signin_url).query(&params)).await?;
        let csrf = capture(&CSRF_RE, &form_page, "csrf token")?;

        let form = [
            ("username", email),
            ("password", password.expose_secret()),
            ("embed", "true"),
            ("_csrf", csrf.as_str()),
        ];
        let page = Self::fetch_page(http.post(&signin_url).query(&params).form(&form)).await?;

        let title = capture(&TITLE_RE, &page, "title")?;
        if title.contains("MFA") {
            let csrf = capture(&CSRF_RE, &page, "csrf token")?;
            return Ok(LoginOutcome::NeedsMfa(MfaChallenge { http, csrf }));
        }
        self.finish(&http, &page)
            .await
            .map(LoginOutcome::Authenticated)
    }

    async fn resume_login(
        &self,
        challenge: MfaChallenge,
        code: &str,
    ) -> Result<ReqwestGarminClient, GarminError> {
        let MfaChallenge { http, csrf } = challenge;
        let form = [
            ("mfa-code", code.trim()),
            ("embed", "true"),
            ("_csrf", csrf.as_str()),
            ("fromPage", "setupEnterMfaCode"),
        ];
        let page = Self::fetch_page(
            http.post(self.sso_url("/verifyMFA/loginEnterMfaCode"))
                .query(&self.signin_params())
                .form(&form),
        )
        .await?;
        self.finish(&http, &page).await
    }

    async fn persist(
        &self,
        client: &ReqwestGarminClient,
        token_dir: &Path,
    ) -> Result<(), GarminError> {
        TokenStore::new(token_dir).save(client.token()).await
    }
}
