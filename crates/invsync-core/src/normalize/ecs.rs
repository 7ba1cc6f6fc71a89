//! Per-domain field tables (ECS-style target paths)

use invsync_api::Domain;

use super::{ArrayRule, Fallback, FieldRule, Rule};

const HARDWARE: &[Rule] = &[
    Rule::Field(FieldRule::text("host.serial_number", "board_serial")),
    Rule::Field(FieldRule::text("host.cpu.name", "cpu_name")),
    Rule::Field(FieldRule::number("host.cpu.cores", "cpu_cores")),
    Rule::Field(FieldRule::number("host.cpu.speed", "cpu_mhz")),
    Rule::Field(FieldRule::number("host.memory.total", "ram_total")),
    Rule::Field(FieldRule::number("host.memory.free", "ram_free")),
    Rule::Field(FieldRule::number("host.memory.used.percentage", "ram_usage")),
];

const SYSTEM: &[Rule] = &[
    Rule::Field(FieldRule::text("host.architecture", "architecture")),
    Rule::Field(FieldRule::text("host.hostname", "hostname")),
    Rule::Field(FieldRule::text("host.os.name", "os_name")),
    Rule::Field(FieldRule::text("host.os.version", "os_version")),
    Rule::Field(FieldRule::text("host.os.major", "os_major")),
    Rule::Field(FieldRule::text("host.os.minor", "os_minor")),
    Rule::Field(FieldRule::text("host.os.patch", "os_patch")),
    Rule::Field(FieldRule::text("host.os.build", "os_build")),
    Rule::Field(FieldRule::text("host.os.codename", "os_codename")),
    Rule::Field(FieldRule::text("host.os.platform", "os_platform")),
    Rule::Field(FieldRule::text("host.os.kernel.name", "os_kernel_name")),
    Rule::Field(FieldRule::text("host.os.kernel.release", "os_kernel_release")),
];

const ADDRESS: &[FieldRule] = &[
    FieldRule::text("address", "address"),
    FieldRule::text("netmask", "netmask"),
    FieldRule::text("broadcast", "broadcast"),
    FieldRule::number("metric", "metric"),
    FieldRule::text("dhcp", "dhcp"),
];

const NETWORKS: &[Rule] = &[
    Rule::Field(FieldRule::text("observer.ingress.interface.name", "iface")),
    Rule::Field(FieldRule::text("observer.ingress.interface.alias", "adapter")),
    Rule::Field(FieldRule::text("observer.ingress.interface.type", "iface_type")),
    Rule::Field(
        FieldRule::text("observer.ingress.interface.state", "state")
            .or(Fallback::Text("unknown")),
    ),
    Rule::Field(FieldRule::number("observer.ingress.interface.mtu", "mtu")),
    Rule::Field(FieldRule::text("host.mac", "mac")),
    Rule::Field(FieldRule::number("host.network.ingress.bytes", "rx_bytes")),
    Rule::Field(FieldRule::number("host.network.ingress.packets", "rx_packets")),
    Rule::Field(FieldRule::number("host.network.ingress.errors", "rx_errors")),
    Rule::Field(FieldRule::number("host.network.ingress.drops", "rx_dropped")),
    Rule::Field(FieldRule::number("host.network.egress.bytes", "tx_bytes")),
    Rule::Field(FieldRule::number("host.network.egress.packets", "tx_packets")),
    Rule::Field(FieldRule::number("host.network.egress.errors", "tx_errors")),
    Rule::Field(FieldRule::number("host.network.egress.drops", "tx_dropped")),
    Rule::Field(FieldRule::text("network.gateway", "gateway")),
    Rule::Array(ArrayRule {
        target: "network.ipv4",
        source: "ipv4",
        fields: ADDRESS,
    }),
    Rule::Array(ArrayRule {
        target: "network.ipv6",
        source: "ipv6",
        fields: ADDRESS,
    }),
];

const PACKAGES: &[Rule] = &[
    Rule::Field(FieldRule::text("package.name", "name")),
    Rule::Field(FieldRule::text("package.version", "version")),
    Rule::Field(FieldRule::text("package.architecture", "architecture")),
    Rule::Field(FieldRule::text("package.type", "format")),
    Rule::Field(FieldRule::text("package.path", "location")),
    Rule::Field(FieldRule::text("package.vendor", "vendor")),
    Rule::Field(FieldRule::text("package.description", "description")),
    Rule::Field(FieldRule::number("package.size", "size")),
    Rule::Field(FieldRule::text("package.installed", "install_time")),
    Rule::Field(FieldRule::text("package.category", "groups")),
    Rule::Field(FieldRule::text("package.source", "source")),
    Rule::Field(FieldRule::text("package.priority", "priority")),
];

const PORTS: &[Rule] = &[
    Rule::Field(FieldRule::number("process.pid", "pid")),
    Rule::Field(FieldRule::text("process.name", "process")),
    Rule::Field(FieldRule::text("source.ip", "local_ip")),
    Rule::Field(FieldRule::number("source.port", "local_port")),
    Rule::Field(FieldRule::text("destination.ip", "remote_ip")),
    Rule::Field(FieldRule::number("destination.port", "remote_port")),
    Rule::Field(FieldRule::text("network.transport", "protocol")),
    Rule::Field(FieldRule::text("interface.state", "state")),
    Rule::Field(FieldRule::number("file.inode", "inode")),
    Rule::Field(FieldRule::number("host.network.egress.queue", "tx_queue")),
    Rule::Field(FieldRule::number("host.network.ingress.queue", "rx_queue")),
];

const PROCESSES: &[Rule] = &[
    Rule::Field(FieldRule::number("process.pid", "pid")),
    Rule::Field(FieldRule::text("process.name", "name")),
    Rule::Field(FieldRule::number("process.parent.pid", "ppid")),
    Rule::Field(FieldRule::text("process.command_line", "cmd")),
    Rule::Field(FieldRule::list("process.args", "argvs")),
    Rule::Field(FieldRule::text("process.user.name", "euser")),
    Rule::Field(FieldRule::text("process.real_user.name", "ruser")),
    Rule::Field(FieldRule::text("process.group.name", "egroup")),
    Rule::Field(FieldRule::text("process.real_group.name", "rgroup")),
    Rule::Field(FieldRule::text("process.state", "state")),
    Rule::Field(FieldRule::number("process.start", "start_time")),
    Rule::Field(FieldRule::number("process.priority", "priority")),
    Rule::Field(FieldRule::number("process.nice", "nice")),
    Rule::Field(FieldRule::number("process.size", "size")),
    Rule::Field(FieldRule::number("process.vm_size", "vm_size")),
    Rule::Field(FieldRule::number("process.group_id", "pgrp")),
    Rule::Field(FieldRule::number("process.session", "session")),
    Rule::Field(FieldRule::text("process.tty", "tty")),
    Rule::Field(FieldRule::number("process.thread.count", "nlwp")),
];

const HOTFIXES: &[Rule] = &[Rule::Field(FieldRule::text("package.hotfix.name", "hotfix"))];

/// Field table of `domain`
#[must_use]
pub fn rules(domain: Domain) -> &'static [Rule] {
    match domain {
        Domain::Hardware => HARDWARE,
        Domain::System => SYSTEM,
        Domain::Networks => NETWORKS,
        Domain::Packages => PACKAGES,
        Domain::Ports => PORTS,
        Domain::Processes => PROCESSES,
        Domain::Hotfixes => HOTFIXES,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_targets_are_unique_per_domain() {
        for domain in Domain::ALL {
            let mut seen = HashSet::new();
            for rule in rules(domain) {
                let target = match rule {
                    Rule::Field(f) => f.target,
                    Rule::Array(a) => a.target,
                };
                assert!(seen.insert(target), "{domain}: duplicate target {target}");
            }
        }
    }

    #[test]
    fn test_primary_key_fields_are_mapped() {
        for domain in Domain::ALL {
            let sources: HashSet<&str> = rules(domain)
                .iter()
                .map(|rule| match rule {
                    Rule::Field(f) => f.source,
                    Rule::Array(a) => a.source,
                })
                .collect();
            for key in crate::schema::primary_key(domain) {
                assert!(sources.contains(key), "{domain}: key {key} not mapped");
            }
        }
    }
}
