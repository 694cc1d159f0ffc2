#[derive(Debug, thiserror::Error)]
pub enum PmsError {
    /// The token endpoint answered 429. The issuer allows 5 tokens per 24
    /// hours; retrying cannot help, the operator has to supply a manual
    /// token override or wait for the quota window to reset.
    #[error("token issuance quota exhausted; set a manual access token or wait for the window to reset")]
    RateLimited,

    #[error("platform responded {status}")]
    Upstream { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected platform payload: {0}")]
    Payload(String),
}
