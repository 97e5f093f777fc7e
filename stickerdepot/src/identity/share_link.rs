//! Sticker pack share links.
//!
//! Format: `https://signal.art/addstickers/#pack_id={hex}&pack_key={hex}`.
//! The parameters live in the URL fragment so they never reach a server.

use super::types::{IdentityError, PackIdentity};
use thiserror::Error;
use url::Url;

/// Host serving share links.
pub const SHARE_LINK_HOST: &str = "signal.art";

/// Path of the add-stickers page.
pub const SHARE_LINK_PATH: &str = "/addstickers/";

/// Errors from parsing a share link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareLinkError {
    /// Not a URL at all
    #[error("malformed URL: {0}")]
    Malformed(String),

    /// URL is not a sticker share link
    #[error("not a sticker pack link: {0}")]
    NotShareLink(String),

    /// A required fragment parameter is absent or empty
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// Parameters present but do not form a valid identity
    #[error(transparent)]
    InvalidIdentity(#[from] IdentityError),
}

/// A parsed share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    identity: PackIdentity,
}

impl ShareLink {
    /// Wraps an identity so it can be rendered as a link.
    pub fn new(identity: PackIdentity) -> Self {
        Self { identity }
    }

    /// Parses a share link.
    ///
    /// Duplicate parameters are tolerated; the last occurrence wins.
    pub fn parse(input: &str) -> Result<Self, ShareLinkError> {
        let url = Url::parse(input.trim()).map_err(|e| ShareLinkError::Malformed(e.to_string()))?;

        if url.scheme() != "https" {
            return Err(ShareLinkError::NotShareLink(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        if url.host_str() != Some(SHARE_LINK_HOST) {
            return Err(ShareLinkError::NotShareLink(format!(
                "unexpected host '{}'",
                url.host_str().unwrap_or_default()
            )));
        }
        let path = url.path().trim_end_matches('/');
        if path != SHARE_LINK_PATH.trim_end_matches('/') {
            return Err(ShareLinkError::NotShareLink(format!(
                "unexpected path '{}'",
                url.path()
            )));
        }

        let fragment = url
            .fragment()
            .ok_or(ShareLinkError::MissingParameter("pack_id"))?;

        let mut pack_id = None;
        let mut pack_key = None;
        for (name, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            match name.as_ref() {
                "pack_id" => pack_id = Some(value.into_owned()),
                "pack_key" => pack_key = Some(value.into_owned()),
                _ => {}
            }
        }

        let pack_id = pack_id
            .filter(|v| !v.is_empty())
            .ok_or(ShareLinkError::MissingParameter("pack_id"))?;
        let pack_key = pack_key
            .filter(|v| !v.is_empty())
            .ok_or(ShareLinkError::MissingParameter("pack_key"))?;

        let identity = PackIdentity::from_hex(&pack_id, &pack_key)?;
        Ok(Self { identity })
    }

    /// The pack this link points to.
    pub fn identity(&self) -> &PackIdentity {
        &self.identity
    }

    /// Consumes the link, returning its identity.
    pub fn into_identity(self) -> PackIdentity {
        self.identity
    }

    /// Renders the canonical link.
    pub fn to_url(&self) -> String {
        format!(
            "https://{}{}#pack_id={}&pack_key={}",
            SHARE_LINK_HOST,
            SHARE_LINK_PATH,
            self.identity.pack_id_hex(),
            self.identity.pack_key_hex()
        )
    }
}
