//! SQL query builder for osquery

use std::fmt;

/// SQL query builder
///
/// Column expressions are emitted verbatim, so aliases (`arch AS architecture`)
/// and literals (`'deb' AS format`) are allowed. Values passed to the `where_*`
/// methods are quoted and escaped.
#[derive(Debug, Clone)]
pub struct Query {
    select: Vec<String>,
    from: String,
    joins: Vec<String>,
    where_clauses: Vec<String>,
    limit: Option<usize>,
}

impl Query {
    /// Create a new query for a table
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            select: vec!["*".to_string()],
            from: table.into(),
            joins: Vec::new(),
            where_clauses: Vec::new(),
            limit: None,
        }
    }

    /// Select specific columns
    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.select = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Add a `LEFT JOIN <table> ON <condition>`
    #[must_use]
    pub fn left_join(mut self, table: &str, on: &str) -> Self {
        self.joins.push(format!("LEFT JOIN {table} ON {on}"));
        self
    }

    /// Add WHERE clause
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: &str) -> Self {
        let escaped = value.replace('\'', "''");
        self.where_clauses.push(format!("{column} = '{escaped}'"));
        self
    }

    /// Add a raw WHERE condition
    #[must_use]
    pub fn where_raw(mut self, condition: &str) -> Self {
        self.where_clauses.push(condition.to_string());
        self
    }

    /// Limit results
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Table (and alias) the query reads from
    #[must_use]
    pub fn table(&self) -> &str {
        &self.from
    }

    /// Build the SQL string
    #[must_use]
    pub fn build(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.select.join(", "), self.from);

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clauses.join(" AND "));
        }

        if let Some(limit) = self.limit {
            use std::fmt::Write;
            let _ = write!(sql, " LIMIT {limit}");
        }

        sql
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}

/// Per-domain queries; columns are aliased to the raw field names the
/// normalizer expects
pub mod queries {
    use super::Query;

    #[must_use]
    pub fn system_info() -> Query {
        Query::new("system_info").select(&[
            "hostname",
            "hardware_serial AS board_serial",
            "cpu_brand AS cpu_name",
            "cpu_logical_cores AS cpu_cores",
            "physical_memory AS ram_total",
        ])
    }

    #[must_use]
    pub fn cpu_speed() -> Query {
        Query::new("cpu_info")
            .select(&["max_clock_speed AS cpu_mhz"])
            .limit(1)
    }

    /// Linux only
    #[must_use]
    pub fn memory_info() -> Query {
        Query::new("memory_info").select(&["memory_total", "memory_free AS ram_free"])
    }

    #[must_use]
    pub fn os_version() -> Query {
        Query::new("os_version").select(&[
            "name AS os_name",
            "version AS os_version",
            "major AS os_major",
            "minor AS os_minor",
            "patch AS os_patch",
            "build AS os_build",
            "codename AS os_codename",
            "platform AS os_platform",
            "arch AS architecture",
        ])
    }

    #[must_use]
    pub fn kernel_info() -> Query {
        Query::new("kernel_info").select(&["version AS os_kernel_release"])
    }

    #[must_use]
    pub fn interface_details() -> Query {
        Query::new("interface_details").select(&[
            "interface AS iface",
            "mac",
            "type AS iface_type",
            "mtu",
            "flags",
            "ipackets AS rx_packets",
            "opackets AS tx_packets",
            "ibytes AS rx_bytes",
            "obytes AS tx_bytes",
            "ierrors AS rx_errors",
            "oerrors AS tx_errors",
            "idrops AS rx_dropped",
            "odrops AS tx_dropped",
        ])
    }

    #[must_use]
    pub fn interface_addresses() -> Query {
        Query::new("interface_addresses").select(&[
            "interface",
            "address",
            "mask AS netmask",
            "broadcast",
        ])
    }

    #[must_use]
    pub fn deb_packages() -> Query {
        Query::new("deb_packages").select(&[
            "name",
            "version",
            "arch AS architecture",
            "'deb' AS format",
            "maintainer AS vendor",
            "section AS groups",
            "size",
            "source",
            "priority",
        ])
    }

    #[must_use]
    pub fn rpm_packages() -> Query {
        Query::new("rpm_packages").select(&[
            "name",
            "version",
            "arch AS architecture",
            "'rpm' AS format",
            "vendor",
            "package_group AS groups",
            "size",
            "source",
            "install_time",
        ])
    }

    /// Listening sockets only
    #[must_use]
    pub fn listening_ports() -> Query {
        Query::new("listening_ports AS s")
            .select(&[
                "s.pid AS pid",
                "s.port AS local_port",
                "s.address AS local_ip",
                "s.protocol AS protocol",
                "s.family AS family",
                "s.socket AS inode",
                "p.name AS process",
            ])
            .left_join("processes AS p", "p.pid = s.pid")
            .where_raw("s.port != 0")
    }

    /// Every open socket
    #[must_use]
    pub fn open_sockets() -> Query {
        Query::new("process_open_sockets AS s")
            .select(&[
                "s.pid AS pid",
                "s.local_port AS local_port",
                "s.local_address AS local_ip",
                "s.remote_address AS remote_ip",
                "s.remote_port AS remote_port",
                "s.protocol AS protocol",
                "s.family AS family",
                "s.state AS state",
                "s.socket AS inode",
                "p.name AS process",
            ])
            .left_join("processes AS p", "p.pid = s.pid")
    }

    #[must_use]
    pub fn processes() -> Query {
        Query::new("processes AS p")
            .select(&[
                "p.pid AS pid",
                "p.name AS name",
                "p.parent AS ppid",
                "p.cmdline AS cmd",
                "p.state AS state",
                "p.nice AS nice",
                "p.threads AS nlwp",
                "p.start_time AS start_time",
                "p.resident_size AS size",
                "p.total_size AS vm_size",
                "p.pgroup AS pgrp",
                "eu.username AS euser",
                "ru.username AS ruser",
            ])
            .left_join("users AS eu", "eu.uid = p.euid")
            .left_join("users AS ru", "ru.uid = p.uid")
    }

    /// Windows only
    #[must_use]
    pub fn patches() -> Query {
        Query::new("patches").select(&["hotfix_id AS hotfix"])
    }
}
