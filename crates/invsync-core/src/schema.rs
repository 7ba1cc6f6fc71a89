//! Per-domain primary keys

use invsync_api::Domain;

/// Raw fields identifying a row of `domain` across scans
#[must_use]
pub fn primary_key(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::Hardware => &["board_serial"],
        Domain::System => &["os_name"],
        Domain::Networks => &["iface"],
        Domain::Packages => &["name", "version", "architecture", "format", "location"],
        Domain::Ports => &["pid", "local_port"],
        Domain::Processes => &["pid"],
        Domain::Hotfixes => &["hotfix"],
    }
}
