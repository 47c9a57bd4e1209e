//! OAuth2 authentication for the Gmail API and Vertex AI

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TriageError};

/// Gmail API scopes needed by a triage run
///
/// These scopes provide:
/// - gmail.modify: read messages, apply labels, mark as read
/// - gmail.compose: create reply drafts
/// - gmail.labels: create the category labels
pub const REQUIRED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.labels",
];

type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<HttpsConnector>;

/// Authenticator type shared by every credential flow used here
pub type GoogleAuthenticator = yup_oauth2::authenticator::Authenticator<HttpsConnector>;

/// Initialize Gmail API hub with the installed-app OAuth2 flow
///
/// Opens a browser on first use, then refreshes from the token cache.
///
/// # Arguments
/// * `credentials_path` - Path to the OAuth2 client credentials JSON file
/// * `token_cache_path` - Path where access tokens will be cached
pub async fn initialize_gmail_hub(
    credentials_path: &Path,
    token_cache_path: &Path,
) -> Result<GmailHub> {
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| TriageError::AuthError(format!("Failed to read credentials: {}", e)))?;

    // HTTPRedirect opens a browser for user authorization
    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| TriageError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    hub_with_authenticator(auth).await
}

/// Initialize Gmail API hub from an authorized-user token file
///
/// Intended for unattended runs: the file carries a refresh token obtained
/// earlier, so no browser interaction happens.
pub async fn gmail_hub_from_token_file(token_path: &Path) -> Result<GmailHub> {
    if !token_path.exists() {
        return Err(TriageError::AuthError(format!(
            "Token file not found at {:?}",
            token_path
        )));
    }

    let token = load_authorized_user(token_path).await?;
    let auth = yup_oauth2::AuthorizedUserAuthenticator::builder(token.into_secret())
        .build()
        .await
        .map_err(|e| TriageError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    hub_with_authenticator(auth).await
}

/// Authenticator for Application Default Credentials
///
/// Uses the service account key named by `GOOGLE_APPLICATION_CREDENTIALS` when
/// set, otherwise the instance metadata server.
pub async fn application_default_authenticator() -> Result<GoogleAuthenticator> {
    let opts = yup_oauth2::ApplicationDefaultCredentialsFlowOpts::default();

    let auth = match yup_oauth2::ApplicationDefaultCredentialsAuthenticator::builder(opts).await {
        yup_oauth2::authenticator::ApplicationDefaultCredentialsTypes::InstanceMetadata(builder) => {
            builder.build().await
        }
        yup_oauth2::authenticator::ApplicationDefaultCredentialsTypes::ServiceAccount(builder) => {
            builder.build().await
        }
    };

    auth.map_err(|e| {
        TriageError::AuthError(format!("Failed to build application default credentials: {}", e))
    })
}

async fn hub_with_authenticator(auth: GoogleAuthenticator) -> Result<GmailHub> {
    // Pre-authenticate so the token is cached with every scope the run needs
    let _token = auth
        .token(REQUIRED_SCOPES)
        .await
        .map_err(|e| TriageError::AuthError(format!("Failed to obtain token: {}", e)))?;

    // HTTP/1 works better with google-gmail1
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| TriageError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, auth))
}

/// Authorized-user credentials as written by Google's client libraries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUserToken {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl AuthorizedUserToken {
    fn into_secret(self) -> yup_oauth2::authorized_user::AuthorizedUserSecret {
        yup_oauth2::authorized_user::AuthorizedUserSecret {
            client_id: self.client_id,
            client_secret: self.client_secret,
            refresh_token: self.refresh_token,
            key_type: "authorized_user".to_string(),
        }
    }
}

/// Load an authorized-user token file
///
/// The `type` field is optional here; files saved by Python's google-auth omit it.
pub async fn load_authorized_user(path: &Path) -> Result<AuthorizedUserToken> {
    let content = tokio::fs::read_to_string(path).await?;
    let token: AuthorizedUserToken = serde_json::from_str(&content)
        .map_err(|e| TriageError::AuthError(format!("Invalid token file {:?}: {}", path, e)))?;

    if token.refresh_token.trim().is_empty() {
        return Err(TriageError::AuthError(
            "Token file has no refresh_token".to_string(),
        ));
    }
    Ok(token)
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs instead of Unix permissions
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
