use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use facet::Facet;

use crate::config::Config;
use crate::error::OnappError;

// ── Wire types ────────────────────────────────────────────
//
// The dashboard wraps every payload in a named envelope object, e.g.
// `[{"virtual_machine": {...}}, ...]`. The envelope structs below exist
// only to unwrap that layer.

/// A virtual machine as returned by `virtual_machines.json`.
#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct VirtualMachine {
    pub id: i64,
    pub label: String,
    pub hostname: String,
    pub booted: bool,
    pub locked: bool,
    pub hypervisor_id: i64,
    pub cpus: i64,
    pub cpu_shares: i64,
    pub memory: i64,
    pub template_label: String,
    pub user_id: i64,
    pub admin_note: String,
    pub initial_root_password: String,
    pub remote_access_password: String,
    pub ip_addresses: Vec<IpAddressEnvelope>,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct IpAddressEnvelope {
    pub ip_address: IpAddress,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct IpAddress {
    pub address: String,
    pub netmask: String,
    pub gateway: String,
    pub broadcast: String,
    pub network_address: String,
}

impl VirtualMachine {
    /// First address of the VM, preferring a publicly routable one when the
    /// machine holds several.
    pub fn first_ip(&self) -> Option<&str> {
        let addrs: Vec<&str> = self
            .ip_addresses
            .iter()
            .map(|e| e.ip_address.address.as_str())
            .collect();
        addrs
            .iter()
            .find(|a| {
                a.parse::<Ipv4Addr>()
                    .map(|ip| !ip.is_private() && !ip.is_loopback() && !ip.is_link_local())
                    .unwrap_or(false)
            })
            .or_else(|| addrs.first())
            .copied()
    }

    /// Human-readable boot state. Locked wins over booted.
    pub fn boot_state(&self) -> &'static str {
        if self.locked {
            "Locked"
        } else if self.booted {
            "Booted"
        } else {
            "Offline"
        }
    }
}

/// An asynchronous job record on the dashboard.
#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Transaction {
    pub id: i64,
    pub action: String,
    pub status: String,
    pub created_at: String,
    pub started_at: String,
    pub updated_at: String,
    pub user_id: i64,
    pub parent_type: String,
}

impl Transaction {
    /// Creation time parsed from the RFC 3339 timestamp the dashboard emits.
    /// Returns `None` on any parse failure; callers skip such entries.
    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Profile {
    pub id: i64,
    pub login: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// A VM backup as returned by `virtual_machines/:id/backups.json`.
#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Backup {
    pub id: i64,
    pub identifier: String,
    pub built: bool,
    pub built_at: String,
    pub created_at: String,
    pub backup_size: i64,
    pub backup_type: String,
    pub operating_system: String,
    pub operating_system_distro: String,
    pub locked: bool,
    pub note: String,
    pub disk_id: i64,
}

/// A VM disk as returned by `virtual_machines/:id/disks.json`.
#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Disk {
    pub id: i64,
    pub identifier: String,
    pub label: String,
    pub built: bool,
    pub created_at: String,
    pub disk_size: i64,
    pub file_system: String,
    pub is_swap: bool,
    pub primary: bool,
    pub locked: bool,
    pub data_store_id: i64,
    pub virtual_machine_id: i64,
}

// Envelope structs for the wrapped payloads.

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct VmEnvelope {
    virtual_machine: VirtualMachine,
}

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct TransactionEnvelope {
    transaction: Transaction,
}

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct ProfileEnvelope {
    user: Profile,
}

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct BackupEnvelope {
    backup: Backup,
}

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct DiskEnvelope {
    disk: Disk,
}

// ── Dashboard trait ───────────────────────────────────────

/// The read surface of the dashboard consumed by the resolver, the
/// transaction waiter, and the busy gate. Kept narrow so those components
/// can be exercised against a fake.
#[allow(async_fn_in_trait)]
pub trait Dashboard {
    async fn virtual_machines(&self) -> Result<Vec<VirtualMachine>, OnappError>;
    async fn virtual_machine(&self, id: i64) -> Result<VirtualMachine, OnappError>;
    async fn transactions(&self, vm_id: i64) -> Result<Vec<Transaction>, OnappError>;
    async fn running_transaction(&self, vm_id: i64) -> Result<Option<Transaction>, OnappError>;
}

// ── HTTP client ───────────────────────────────────────────

pub struct Client {
    base: String,
    api_user: String,
    api_key: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(server: &str, api_user: &str, api_key: &str) -> Result<Self, OnappError> {
        if server.is_empty() || api_user.is_empty() || api_key.is_empty() {
            return Err(OnappError::Validation {
                message: "server, api_user and api_key must all be set".into(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OnappError::Http {
                url: server.to_string(),
                source: e,
            })?;
        Ok(Self {
            base: base_url(server),
            api_user: api_user.to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, OnappError> {
        Self::new(&config.server, &config.api_user, &config.api_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(&self, path: &str) -> Result<String, OnappError> {
        let url = self.url(path);
        tracing::debug!(url, "GET");
        let resp = self
            .http
            .get(&url)
            .basic_auth(&self.api_user, Some(&self.api_key))
            .send()
            .await
            .map_err(|e| OnappError::Http {
                url: url.clone(),
                source: e,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(OnappError::BadResponse {
                url,
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|e| OnappError::Http { url, source: e })
    }

    /// POST with an empty body. A 422 means the dashboard rejected the
    /// action for the machine's current state; `action` names it for the
    /// error message ("booted", "shut down", "rebooted").
    async fn post_action(&self, path: &str, action: &str) -> Result<(), OnappError> {
        let url = self.url(path);
        tracing::debug!(url, "POST");
        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.api_user, Some(&self.api_key))
            .send()
            .await
            .map_err(|e| OnappError::Http {
                url: url.clone(),
                source: e,
            })?;
        action_status(&url, resp.status().as_u16(), action)
    }

    pub async fn profile(&self) -> Result<Profile, OnappError> {
        let body = self.get("profile.json").await?;
        let envelope: ProfileEnvelope = decode("profile", &body)?;
        Ok(envelope.user)
    }

    /// All recent transactions across the account.
    pub async fn all_transactions(&self) -> Result<Vec<Transaction>, OnappError> {
        let body = self.get("transactions.json").await?;
        let envelopes: Vec<TransactionEnvelope> = decode("transaction list", &body)?;
        Ok(envelopes.into_iter().map(|e| e.transaction).collect())
    }

    pub async fn startup(&self, id: i64) -> Result<(), OnappError> {
        self.post_action(&format!("virtual_machines/{id}/startup.json"), "booted")
            .await
    }

    pub async fn shutdown(&self, id: i64) -> Result<(), OnappError> {
        self.post_action(&format!("virtual_machines/{id}/shutdown.json"), "shut down")
            .await
    }

    pub async fn reboot(&self, id: i64) -> Result<(), OnappError> {
        self.post_action(&format!("virtual_machines/{id}/reboot.json"), "rebooted")
            .await
    }

    pub async fn backups(&self, vm_id: i64) -> Result<Vec<Backup>, OnappError> {
        let body = self
            .get(&format!("virtual_machines/{vm_id}/backups.json"))
            .await?;
        let envelopes: Vec<BackupEnvelope> = decode("backup list", &body)?;
        Ok(envelopes.into_iter().map(|e| e.backup).collect())
    }

    pub async fn disks(&self, vm_id: i64) -> Result<Vec<Disk>, OnappError> {
        let body = self
            .get(&format!("virtual_machines/{vm_id}/disks.json"))
            .await?;
        let envelopes: Vec<DiskEnvelope> = decode("disk list", &body)?;
        Ok(envelopes.into_iter().map(|e| e.disk).collect())
    }
}

impl Dashboard for Client {
    async fn virtual_machines(&self) -> Result<Vec<VirtualMachine>, OnappError> {
        let body = self.get("virtual_machines.json").await?;
        let envelopes: Vec<VmEnvelope> = decode("virtual machine list", &body)?;
        Ok(envelopes.into_iter().map(|e| e.virtual_machine).collect())
    }

    async fn virtual_machine(&self, id: i64) -> Result<VirtualMachine, OnappError> {
        let body = self.get(&format!("virtual_machines/{id}.json")).await?;
        let envelope: VmEnvelope = decode("virtual machine", &body)?;
        Ok(envelope.virtual_machine)
    }

    async fn transactions(&self, vm_id: i64) -> Result<Vec<Transaction>, OnappError> {
        let body = self
            .get(&format!("virtual_machines/{vm_id}/transactions.json"))
            .await?;
        let envelopes: Vec<TransactionEnvelope> = decode("transaction list", &body)?;
        Ok(envelopes.into_iter().map(|e| e.transaction).collect())
    }

    /// Newest transaction with status "running", if any. The dashboard has
    /// no such endpoint, so this filters the per-VM transaction list.
    async fn running_transaction(&self, vm_id: i64) -> Result<Option<Transaction>, OnappError> {
        let txns = self.transactions(vm_id).await?;
        Ok(latest_running(txns))
    }
}

/// Map the status of an action POST to a result. A 422 means the dashboard
/// rejected the action for the machine's current state.
fn action_status(url: &str, status: u16, action: &str) -> Result<(), OnappError> {
    if status == 422 {
        return Err(OnappError::ActionRejected {
            action: action.to_string(),
        });
    }
    if !(200..300).contains(&status) {
        return Err(OnappError::BadResponse {
            url: url.to_string(),
            status,
        });
    }
    Ok(())
}

/// First "running" entry of a newest-first transaction list.
fn latest_running(txns: Vec<Transaction>) -> Option<Transaction> {
    txns.into_iter().find(|t| t.status == "running")
}

fn decode<'a, T: Facet<'a>>(what: &str, body: &'a str) -> Result<T, OnappError> {
    facet_json::from_str_borrowed(body).map_err(|e| OnappError::Decode {
        what: what.to_string(),
        message: e.to_string(),
    })
}

/// Prefix the configured server with a scheme unless one is already present,
/// and guarantee a trailing slash.
fn base_url(server: &str) -> String {
    let with_scheme = if server.contains("://") {
        server.to_string()
    } else {
        format!("http://{server}")
    };
    if with_scheme.ends_with('/') {
        with_scheme
    } else {
        format!("{with_scheme}/")
    }
}
