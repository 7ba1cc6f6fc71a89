//! osquery-backed probe

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

use crate::error::ProbeError;
use crate::query::{Query, queries};
use crate::traits::Probe;
use crate::types::{RawDocument, field_text, field_u64, merge_missing};

const DEFAULT_BINARY: &str = "osqueryi";

/// Probe that shells out to `osqueryi --json`
#[derive(Debug, Clone)]
pub struct OsqueryProbe {
    /// Path or name of the osqueryi binary
    binary: String,
    /// Per-query timeout
    timeout: Duration,
}

impl OsqueryProbe {
    /// Create a probe using `osqueryi` from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Use a specific osqueryi binary
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set query timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a query and return one raw document per result row
    ///
    /// # Errors
    /// Returns an error if osqueryi cannot be spawned, times out, exits with a
    /// failure, or prints something other than a JSON array of objects.
    #[instrument(skip(self, query), fields(table = %query.table()))]
    pub async fn query(&self, query: &Query) -> Result<Vec<RawDocument>, ProbeError> {
        let sql = query.build();
        let start = Instant::now();

        debug!(sql = %sql, "executing osquery");

        let child = Command::new(&self.binary)
            .arg("--json")
            .arg(&sql)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::OsqueryNotFound(format!("{} not found on this host", self.binary))
                } else {
                    ProbeError::ExecutionError(e.to_string())
                }
            })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ProbeError::ExecutionError(e.to_string()))?,
            Err(_) => {
                error!(timeout = ?self.timeout, "osquery timed out");
                return Err(ProbeError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if stderr.contains("no such table") {
                return Err(ProbeError::TableNotAvailable(table_name(query)));
            }
            return Err(ProbeError::QueryFailed(stderr));
        }

        let rows = parse_rows(&output.stdout)?;

        debug!(rows = rows.len(), elapsed = ?start.elapsed(), "query completed");

        Ok(rows)
    }

    /// First row of an optional table; missing tables yield nothing
    async fn optional_row(&self, query: &Query) -> Result<Option<RawDocument>, ProbeError> {
        match self.query(query).await {
            Ok(rows) => Ok(rows.into_iter().next()),
            Err(ProbeError::TableNotAvailable(table)) => {
                debug!(table = %table, "optional table not available");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for OsqueryProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for OsqueryProbe {
    #[instrument(skip(self))]
    async fn hardware(&self) -> Result<Vec<RawDocument>, ProbeError> {
        let mut doc = self
            .query(&queries::system_info())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProbeError::NoData("system_info".to_string()))?;
        doc.remove("hostname");

        if let Some(cpu) = self.optional_row(&queries::cpu_speed()).await? {
            merge_missing(&mut doc, cpu);
        }
        if let Some(memory) = self.optional_row(&queries::memory_info()).await? {
            merge_missing(&mut doc, memory);
        }
        fill_memory_usage(&mut doc);

        Ok(vec![doc])
    }

    #[instrument(skip(self))]
    async fn system(&self) -> Result<Vec<RawDocument>, ProbeError> {
        let mut doc = self
            .query(&queries::os_version())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProbeError::NoData("os_version".to_string()))?;

        if let Some(info) = self.optional_row(&queries::system_info()).await? {
            if let Some(hostname) = info.get("hostname") {
                doc.insert("hostname".to_string(), hostname.clone());
            }
        }
        if let Some(kernel) = self.optional_row(&queries::kernel_info()).await? {
            merge_missing(&mut doc, kernel);
        }
        if let Some(platform) = field_text(&doc, "os_platform") {
            doc.entry("os_kernel_name")
                .or_insert_with(|| Value::String(kernel_name(&platform).to_string()));
        }

        Ok(vec![doc])
    }

    #[instrument(skip(self))]
    async fn networks(&self) -> Result<Vec<RawDocument>, ProbeError> {
        let interfaces = self.query(&queries::interface_details()).await?;
        let addresses = self.query(&queries::interface_addresses()).await?;
        Ok(group_addresses(interfaces, &addresses))
    }

    #[instrument(skip(self))]
    async fn packages(&self) -> Result<Vec<RawDocument>, ProbeError> {
        let rows = match self.query(&queries::deb_packages()).await {
            Ok(rows) => rows,
            Err(ProbeError::TableNotAvailable(_)) => self.query(&queries::rpm_packages()).await?,
            Err(e) => return Err(e),
        };

        info!(count = rows.len(), "collected packages");

        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn ports(&self, all: bool) -> Result<Vec<RawDocument>, ProbeError> {
        let query = if all {
            queries::open_sockets()
        } else {
            queries::listening_ports()
        };

        let mut rows = self.query(&query).await?;
        for row in &mut rows {
            label_protocol(row);
        }

        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn processes(&self) -> Result<Vec<RawDocument>, ProbeError> {
        let mut rows = self.query(&queries::processes()).await?;
        for row in &mut rows {
            split_arguments(row);
        }
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn hotfixes(&self) -> Result<Vec<RawDocument>, ProbeError> {
        match self.query(&queries::patches()).await {
            Ok(rows) => Ok(rows),
            Err(ProbeError::TableNotAvailable(_)) => {
                debug!("hotfixes are not reported on this platform");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn probe_type(&self) -> &'static str {
        "osquery"
    }
}

/// Parse osqueryi `--json` output
fn parse_rows(stdout: &[u8]) -> Result<Vec<RawDocument>, ProbeError> {
    let json: Vec<Value> =
        serde_json::from_slice(stdout).map_err(|e| ProbeError::ParseError(e.to_string()))?;

    json.into_iter()
        .map(|value| match value {
            Value::Object(map) => Ok(map),
            other => Err(ProbeError::ParseError(format!(
                "expected an object per row, got {other}"
            ))),
        })
        .collect()
}

/// Bare table name of a query, without its alias
fn table_name(query: &Query) -> String {
    query
        .table()
        .split_whitespace()
        .next()
        .unwrap_or("unknown")
        .to_string()
}

fn kernel_name(platform: &str) -> &'static str {
    match platform {
        "darwin" => "Darwin",
        "windows" => "Windows NT",
        "freebsd" => "FreeBSD",
        _ => "Linux",
    }
}

/// Derive `ram_usage` (percent) from total and free memory
fn fill_memory_usage(doc: &mut RawDocument) {
    let total = field_u64(doc, "memory_total").or_else(|| field_u64(doc, "ram_total"));
    let free = field_u64(doc, "ram_free");
    doc.remove("memory_total");

    if let (Some(total), Some(free)) = (total, free)
        && total > 0
    {
        let used = total.saturating_sub(free);
        doc.insert("ram_usage".to_string(), Value::from(used * 100 / total));
    }
}

/// Attach each interface's addresses as `ipv4`/`ipv6` arrays
fn group_addresses(interfaces: Vec<RawDocument>, addresses: &[RawDocument]) -> Vec<RawDocument> {
    let mut by_iface: BTreeMap<String, (Vec<Value>, Vec<Value>)> = BTreeMap::new();

    for addr in addresses {
        let (Some(iface), Some(address)) = (field_text(addr, "interface"), field_text(addr, "address"))
        else {
            continue;
        };

        let mut entry = RawDocument::new();
        entry.insert("address".to_string(), Value::String(address.clone()));
        for key in ["netmask", "broadcast"] {
            if let Some(v) = addr.get(key) {
                entry.insert(key.to_string(), v.clone());
            }
        }

        let slot = by_iface.entry(iface).or_default();
        if address.contains(':') {
            slot.1.push(Value::Object(entry));
        } else {
            slot.0.push(Value::Object(entry));
        }
    }

    interfaces
        .into_iter()
        .map(|mut iface| {
            let name = field_text(&iface, "iface").unwrap_or_default();
            let (ipv4, ipv6) = by_iface.remove(&name).unwrap_or_default();
            let up = field_u64(&iface, "flags").is_some_and(|flags| flags & 0x1 != 0);
            iface.remove("flags");
            iface.insert(
                "state".to_string(),
                Value::String(if up { "up" } else { "down" }.to_string()),
            );
            iface.insert("ipv4".to_string(), Value::Array(ipv4));
            iface.insert("ipv6".to_string(), Value::Array(ipv6));
            iface
        })
        .collect()
}

/// Replace numeric protocol/family with `tcp`, `udp6`, ...
fn label_protocol(row: &mut RawDocument) {
    let protocol = match field_u64(row, "protocol") {
        Some(6) => "tcp",
        Some(17) => "udp",
        _ => return,
    };
    let v6 = field_u64(row, "family") == Some(10);
    row.remove("family");
    let label = if v6 {
        format!("{protocol}6")
    } else {
        protocol.to_string()
    };
    row.insert("protocol".to_string(), Value::String(label));
}

/// Derive `argvs` (arguments after the executable) from `cmd`
fn split_arguments(row: &mut RawDocument) {
    let Some(cmd) = field_text(row, "cmd") else {
        return;
    };
    let args: Vec<Value> = cmd
        .split_whitespace()
        .skip(1)
        .map(|a| Value::String(a.to_string()))
        .collect();
    row.insert("argvs".to_string(), Value::Array(args));
}
