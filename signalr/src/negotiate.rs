//! Negotiate request and WebSocket URL construction.
//!
//! `POST {hub}/negotiate?negotiateVersion=1` returns the connection token the
//! WebSocket upgrade must carry, or redirects the client to another hub
//! (Azure SignalR Service) with a fresh access token.

use boxoffice_core::hub::HubError;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

/// Redirects followed before negotiation gives up.
pub const MAX_REDIRECTS: usize = 100;

const WEBSOCKETS: &str = "WebSockets";

/// Where to open the WebSocket after negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Hub URL after following redirects
    pub url: String,
    /// Token sent as the `id` query parameter
    pub connection_token: Option<String>,
    /// Credential for the upgrade request
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NegotiateResponse {
    #[serde(default)]
    connection_id: Option<String>,
    #[serde(default)]
    connection_token: Option<String>,
    #[serde(default)]
    negotiate_version: u32,
    #[serde(default)]
    available_transports: Vec<AvailableTransport>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvailableTransport {
    transport: String,
}

/// `{url}/negotiate?negotiateVersion=1`, keeping any query already on `url`.
#[must_use]
pub fn negotiate_url(url: &str) -> String {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };

    let mut negotiate = format!("{}/negotiate?negotiateVersion=1", base.trim_end_matches('/'));
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        negotiate.push('&');
        negotiate.push_str(query);
    }
    negotiate
}

/// Convert an http(s) hub URL into the ws(s) URL of the upgrade request.
///
/// # Errors
///
/// Returns [`HubError::Transport`] if `url` is not a valid http, https, ws or
/// wss URL.
pub fn websocket_url(
    url: &str,
    connection_token: Option<&str>,
    access_token: Option<&str>,
) -> Result<String, HubError> {
    let mut parsed =
        Url::parse(url).map_err(|e| HubError::Transport(format!("invalid hub url '{url}': {e}")))?;

    let scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(HubError::Transport(format!(
                "unsupported hub url scheme '{other}'"
            )));
        }
    };
    parsed
        .set_scheme(scheme)
        .map_err(|()| HubError::Transport(format!("cannot use scheme '{scheme}' for '{url}'")))?;

    if connection_token.is_some() || access_token.is_some() {
        let mut query = parsed.query_pairs_mut();
        if let Some(id) = connection_token {
            query.append_pair("id", id);
        }
        if let Some(token) = access_token {
            query.append_pair("access_token", token);
        }
    }

    Ok(parsed.into())
}

/// Run the negotiate exchange, following redirects.
///
/// # Errors
///
/// Returns [`HubError::Negotiation`] if the request fails, the server reports
/// an error, WebSockets are not offered or redirects do not terminate.
pub async fn negotiate(
    client: &Client,
    url: &str,
    access_token: Option<String>,
) -> Result<Negotiated, HubError> {
    let mut url = url.to_string();
    let mut access_token = access_token;

    for _ in 0..MAX_REDIRECTS {
        let response = send_negotiate(client, &url, access_token.as_deref()).await?;

        if let Some(error) = response.error {
            return Err(HubError::Negotiation(error));
        }

        if let Some(redirect) = response.url {
            tracing::debug!(from = %url, to = %redirect, "Negotiate redirect");
            url = redirect;
            if response.access_token.is_some() {
                access_token = response.access_token;
            }
            continue;
        }

        if !response.available_transports.is_empty()
            && !response
                .available_transports
                .iter()
                .any(|t| t.transport == WEBSOCKETS)
        {
            return Err(HubError::Negotiation(
                "server does not offer the WebSockets transport".to_string(),
            ));
        }

        // Version 0 servers only send connectionId.
        let connection_token = if response.negotiate_version >= 1 {
            response.connection_token.or(response.connection_id)
        } else {
            response.connection_id
        };

        return Ok(Negotiated {
            url,
            connection_token,
            access_token,
        });
    }

    Err(HubError::Negotiation(format!(
        "exceeded {MAX_REDIRECTS} negotiate redirects"
    )))
}

async fn send_negotiate(
    client: &Client,
    url: &str,
    access_token: Option<&str>,
) -> Result<NegotiateResponse, HubError> {
    let mut request = client.post(negotiate_url(url));
    if let Some(token) = access_token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| HubError::Negotiation(format!("request failed: {e}")))?;

    let status = response.status();
    match status {
        StatusCode::OK => response
            .json::<NegotiateResponse>()
            .await
            .map_err(|e| HubError::Negotiation(format!("invalid negotiate response: {e}"))),
        StatusCode::UNAUTHORIZED => Err(HubError::Negotiation("unauthorized".to_string())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(HubError::Negotiation(format!("status {}: {body}", status.as_u16())))
        }
    }
}
