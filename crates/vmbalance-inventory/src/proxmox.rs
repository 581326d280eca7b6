//! Proxmox VE REST client.
//!
//! Authenticates with a username/password ticket and talks to
//! `https://{host}:{port}/api2/json`:
//!
//! ```text
//! POST /access/ticket                       → ticket + CSRF token
//! GET  /nodes                               → NodeRecord[]
//! GET  /nodes/{node}/qemu                   → WorkloadRecord[]
//! POST /nodes/{node}/qemu/{vmid}/migrate    → task UPID
//! ```
//!
//! Every request is bounded by the configured timeout. An expired ticket
//! (HTTP 401) triggers a single re-login.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use vmbalance_core::ProxmoxConfig;
use vmbalance_state::{NodeRecord, WorkloadRecord};

use crate::Inventory;
use crate::error::{InventoryError, InventoryResult};

/// Every Proxmox response wraps its payload in `{"data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
struct Ticket {
    ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    csrf_token: String,
}

pub struct ProxmoxClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    ticket: RwLock<Option<Ticket>>,
}

impl ProxmoxClient {
    /// Build a client from configuration. No request is made until the
    /// first call.
    pub fn new(config: &ProxmoxConfig) -> InventoryResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InventoryError::Transport(format!("build http client: {e}")))?;
        let base_url = format!("https://{}:{}/api2/json", config.host, config.port);
        Ok(Self::with_http_client(http, base_url, &config.user, &config.password))
    }

    /// Build a client against an explicit API root, e.g. a local test server.
    pub fn with_http_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        user: &str,
        password: &str,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
            ticket: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self) -> InventoryResult<Ticket> {
        let form = [("username", self.user.as_str()), ("password", self.password.as_str())];
        let resp = self
            .http
            .post(self.url("/access/ticket"))
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(InventoryError::Auth(format!("login rejected for {}", self.user)));
        }
        let ticket: Ticket = decode(resp).await?;
        info!(user = %self.user, "authenticated against proxmox api");
        Ok(ticket)
    }

    /// Current ticket, logging in if there is none.
    async fn ticket(&self) -> InventoryResult<Ticket> {
        if let Some(ticket) = self.ticket.read().await.as_ref() {
            return Ok(ticket.clone());
        }
        let ticket = self.login().await?;
        *self.ticket.write().await = Some(ticket.clone());
        Ok(ticket)
    }

    /// Send an authenticated request, re-authenticating once on 401.
    async fn send<T, F>(&self, build: F) -> InventoryResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Ticket) -> RequestBuilder,
    {
        let ticket = self.ticket().await?;
        let resp = build(&ticket).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return decode(resp).await;
        }

        debug!("proxmox ticket rejected, logging in again");
        *self.ticket.write().await = None;
        let ticket = self.ticket().await?;
        let resp = build(&ticket).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(InventoryError::Auth("ticket rejected after re-login".to_string()));
        }
        decode(resp).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> InventoryResult<T> {
        let url = self.url(path);
        self.send(|ticket| {
            self.http
                .get(&url)
                .header(reqwest::header::COOKIE, auth_cookie(ticket))
        })
        .await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> InventoryResult<T> {
        let url = self.url(path);
        self.send(|ticket| {
            self.http
                .post(&url)
                .header(reqwest::header::COOKIE, auth_cookie(ticket))
                .header("CSRFPreventionToken", &ticket.csrf_token)
                .form(form)
        })
        .await
    }
}

fn auth_cookie(ticket: &Ticket) -> String {
    format!("PVEAuthCookie={}", ticket.ticket)
}

/// Map non-2xx to [`InventoryError::Status`] and unwrap the `data` envelope.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> InventoryResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(InventoryError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await?;
    let envelope: Envelope<T> =
        serde_json::from_slice(&bytes).map_err(|e| InventoryError::Decode(e.to_string()))?;
    Ok(envelope.data)
}

#[async_trait]
impl Inventory for ProxmoxClient {
    async fn list_nodes(&self) -> InventoryResult<Vec<NodeRecord>> {
        let nodes: Vec<NodeRecord> = self.get("/nodes").await?;
        let (online, offline): (Vec<_>, Vec<_>) = nodes.into_iter().partition(NodeRecord::is_online);
        for node in &offline {
            warn!(node = %node.node, status = ?node.status, "skipping node that is not online");
        }
        Ok(online)
    }

    async fn list_workloads(&self, node: &str) -> InventoryResult<Vec<WorkloadRecord>> {
        self.get(&format!("/nodes/{node}/qemu")).await
    }

    async fn migrate_workload(
        &self,
        node: &str,
        vmid: u32,
        target: &str,
        online: bool,
    ) -> InventoryResult<()> {
        let form = [
            ("target", target.to_string()),
            ("online", if online { "1" } else { "0" }.to_string()),
        ];
        let upid: Option<String> = self
            .post_form(&format!("/nodes/{node}/qemu/{vmid}/migrate"), &form)
            .await?;
        info!(vmid, from = node, to = target, task = ?upid, "migration task started");
        Ok(())
    }
}
