//! Parsers for `/proc`, `/sys` and `/etc` text files.
//!
//! These are pure functions over string input so that every format quirk can
//! be pinned down in a unit test without touching the host.

use crate::model::CoreCounters;
use std::collections::HashMap;
use thiserror::Error;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Fields of `/proc/[pid]/stat` the agent needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcStat {
    pub utime: u64,
    pub stime: u64,
}

/// Parses `/proc/[pid]/stat` content.
///
/// The comm field may contain spaces and parentheses, so it is delimited by
/// the first `(` and the last `)`.
pub fn parse_proc_stat(content: &str) -> Result<ProcStat, ParseError> {
    let content = content.trim();

    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    content[..open_paren]
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::new("invalid pid"))?;

    // fields[0] is the state, fields[17] is num_threads
    let fields: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();
    if fields.len() < 18 {
        return Err(ParseError::new(format!(
            "not enough fields in stat: expected 18+, got {}",
            fields.len()
        )));
    }

    let parse_u64 = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(ProcStat {
        utime: parse_u64(11, "utime")?,
        stime: parse_u64(12, "stime")?,
    })
}

/// Fields of `/proc/[pid]/status` the agent needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcStatus {
    pub name: String,
    /// Full state text, e.g. `S (sleeping)`.
    pub state: String,
    pub uid: u32,
    pub gid: u32,
    pub vm_peak: u64,
    pub vm_size: u64,
    pub vm_swap: u64,
    pub threads: u32,
    /// `Cpus_allowed` reduced to a 64-bit mask.
    pub cpus_allowed: u64,
}

/// Parses `/proc/[pid]/status` content.
///
/// `Name`, `State`, `Uid`, `Gid`, `Threads` and `Cpus_allowed` are required.
/// The `Vm*` lines are absent for kernel threads and zombies and default to 0.
pub fn parse_proc_status(content: &str) -> Result<ProcStatus, ParseError> {
    let mut fields: HashMap<&str, &str> = HashMap::new();

    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim(), value.trim());
        }
    }

    let required = |key: &str| -> Result<&str, ParseError> {
        fields
            .get(key)
            .copied()
            .ok_or_else(|| ParseError::new(format!("missing {} in status", key)))
    };

    // Uid and Gid have format: real effective saved fs
    let first_id = |key: &str| -> Result<u32, ParseError> {
        required(key)?
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ParseError::new(format!("invalid {} in status", key)))
    };

    // Memory fields are in kB format: "12345 kB"
    let parse_kb = |key: &str| -> u64 {
        fields
            .get(key)
            .and_then(|s| s.split_whitespace().next())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    Ok(ProcStatus {
        name: required("Name")?.to_string(),
        state: required("State")?.to_string(),
        uid: first_id("Uid")?,
        gid: first_id("Gid")?,
        vm_peak: parse_kb("VmPeak"),
        vm_size: parse_kb("VmSize"),
        vm_swap: parse_kb("VmSwap"),
        threads: required("Threads")?
            .parse()
            .map_err(|_| ParseError::new("invalid Threads in status"))?,
        cpus_allowed: parse_cpus_allowed(required("Cpus_allowed")?)?,
    })
}

/// Parses a `Cpus_allowed` hex mask such as `f` or `ffffffff,ffffffff`.
///
/// Comma separators are dropped and only the low 64 bits are kept, which
/// covers every board this agent targets.
pub fn parse_cpus_allowed(value: &str) -> Result<u64, ParseError> {
    let digits: String = value.chars().filter(|c| *c != ',').collect();
    let digits = digits.trim();
    if digits.is_empty() {
        return Err(ParseError::new("empty Cpus_allowed"));
    }
    let low = &digits[digits.len().saturating_sub(16)..];
    u64::from_str_radix(low, 16).map_err(|_| ParseError::new("invalid Cpus_allowed"))
}

/// Parsed data from `/proc/meminfo`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_available: u64,
}

/// Parses `/proc/meminfo` content.
///
/// Kernels older than 3.14 have no `MemAvailable`; free memory is used instead.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let parse_kb = |line: &str| -> Option<u64> {
        line.split_whitespace().nth(1).and_then(|s| s.parse().ok())
    };

    let mut total = None;
    let mut free = None;
    let mut available = None;

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            total = parse_kb(line);
        } else if line.starts_with("MemFree:") {
            free = parse_kb(line);
        } else if line.starts_with("MemAvailable:") {
            available = parse_kb(line);
        }
    }

    let mem_total = total.ok_or_else(|| ParseError::new("missing MemTotal in meminfo"))?;
    let mem_free = free.ok_or_else(|| ParseError::new("missing MemFree in meminfo"))?;

    Ok(MemInfo {
        mem_total,
        mem_free,
        mem_available: available.unwrap_or(mem_free),
    })
}

/// CPU lines from `/proc/stat`: the aggregate line and the per-core lines in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuLines {
    pub aggregate: CoreCounters,
    pub cores: Vec<CoreCounters>,
}

fn parse_core_counters(parts: &[&str]) -> Result<CoreCounters, ParseError> {
    if parts.len() < 8 {
        return Err(ParseError::new(format!(
            "{}: expected 7 counters, got {}",
            parts.first().copied().unwrap_or("cpu"),
            parts.len().saturating_sub(1)
        )));
    }
    let get = |idx: usize| -> Result<u64, ParseError> {
        parts[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("{}: invalid counter {}", parts[0], parts[idx])))
    };
    Ok(CoreCounters {
        user: get(1)?,
        user_nice: get(2)?,
        kernel: get(3)?,
        idle: get(4)?,
        iowait: get(5)?,
        irq: get(6)?,
        soft_irq: get(7)?,
    })
}

/// Parses the `cpu` and first `core_count` `cpuN` lines of `/proc/stat`.
///
/// A missing aggregate line or fewer core lines than `core_count` is an error.
/// Extra core lines (hot-plugged CPUs) are ignored.
pub fn parse_cpu_lines(content: &str, core_count: usize) -> Result<CpuLines, ParseError> {
    let mut aggregate = None;
    let mut cores = Vec::with_capacity(core_count);

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(key) = parts.first() else {
            continue;
        };
        if *key == "cpu" {
            aggregate = Some(parse_core_counters(&parts)?);
        } else if key.starts_with("cpu") {
            if cores.len() < core_count {
                cores.push(parse_core_counters(&parts)?);
            }
        } else if aggregate.is_some() {
            // cpu lines come first; nothing after them is needed
            break;
        }
    }

    let aggregate = aggregate.ok_or_else(|| ParseError::new("missing aggregate cpu line"))?;
    if cores.len() < core_count {
        return Err(ParseError::new(format!(
            "expected {} core lines, found {}",
            core_count,
            cores.len()
        )));
    }

    Ok(CpuLines { aggregate, cores })
}

/// Parses a thermal zone reading (millidegrees Celsius).
pub fn parse_thermal(content: &str) -> Result<i64, ParseError> {
    content
        .trim()
        .parse()
        .map_err(|_| ParseError::new(format!("invalid thermal reading {:?}", content.trim())))
}

/// Parses `/etc/passwd` content and returns a map of UID -> username.
///
/// Format: username:password:uid:gid:gecos:home:shell
pub fn parse_passwd(content: &str) -> HashMap<u32, String> {
    parse_id_table(content)
}

/// Parses `/etc/group` content and returns a map of GID -> group name.
///
/// Format: name:password:gid:members
pub fn parse_group(content: &str) -> HashMap<u32, String> {
    parse_id_table(content)
}

// passwd and group share the name:x:id layout in their first three columns
fn parse_id_table(content: &str) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() >= 3 {
            if let Ok(id) = parts[2].parse::<u32>() {
                map.entry(id).or_insert_with(|| parts[0].to_string());
            }
        }
    }
    map
}

/// Resolver for UID -> username mapping.
#[derive(Debug, Clone, Default)]
pub struct UserResolver {
    uid_to_name: HashMap<u32, String>,
}

impl UserResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads user mappings from /etc/passwd content.
    pub fn load_from_content(&mut self, content: &str) {
        self.uid_to_name = parse_passwd(content);
    }

    /// Resolves UID to username, returns UID as string if not found.
    pub fn resolve(&self, uid: u32) -> String {
        self.uid_to_name
            .get(&uid)
            .cloned()
            .unwrap_or_else(|| uid.to_string())
    }
}

/// Resolver for GID -> group name mapping.
#[derive(Debug, Clone, Default)]
pub struct GroupResolver {
    gid_to_name: HashMap<u32, String>,
}

impl GroupResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads group mappings from /etc/group content.
    pub fn load_from_content(&mut self, content: &str) {
        self.gid_to_name = parse_group(content);
    }

    /// Resolves GID to group name, returns GID as string if not found.
    pub fn resolve(&self, gid: u32) -> String {
        self.gid_to_name
            .get(&gid)
            .cloned()
            .unwrap_or_else(|| gid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_passwd() {
        let content = "\
root:x:0:0:root:/root:/bin/bash
daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin
# comment line
nobody:x:65534:65534:nobody:/nonexistent:/usr/sbin/nologin
pi:x:1000:1000:,,,:/home/pi:/bin/bash
";
        let map = parse_passwd(content);
        assert_eq!(map.get(&0), Some(&"root".to_string()));
        assert_eq!(map.get(&1), Some(&"daemon".to_string()));
        assert_eq!(map.get(&1000), Some(&"pi".to_string()));
        assert_eq!(map.get(&65534), Some(&"nobody".to_string()));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_user_resolver() {
        let mut resolver = UserResolver::new();
        assert_eq!(resolver.resolve(0), "0");
        resolver.load_from_content("root:x:0:0::/root:/bin/bash\npi:x:1000:1000::/home/pi:/bin/bash");

        assert_eq!(resolver.resolve(0), "root");
        assert_eq!(resolver.resolve(1000), "pi");
        assert_eq!(resolver.resolve(9999), "9999");
    }

    #[test]
    fn test_group_resolver() {
        let mut resolver = GroupResolver::new();
        resolver.load_from_content("root:x:0:\ngpio:x:997:pi\npi:x:1000:\n");

        assert_eq!(resolver.resolve(997), "gpio");
        assert_eq!(resolver.resolve(1000), "pi");
        assert_eq!(resolver.resolve(4242), "4242");
    }

    #[test]
    fn test_parse_proc_stat_basic() {
        let content = "1234 (bash) S 1233 1234 1234 34816 1235 4194304 5000 50000 10 20 100 50 200 100 20 0 1 0 100000 25000000 2000 18446744073709551615 0 0 0 0 0 0 65536 3670020 1266777851 0 0 0 17 2 0 0 5 0 0 0 0 0 0 0 0 0 0";
        let stat = parse_proc_stat(content).unwrap();

        assert_eq!(stat, ProcStat { utime: 100, stime: 50 });
    }

    #[test]
    fn test_parse_proc_stat_with_spaces_in_comm() {
        let content = "5000 (Web Content) S 4999 5000 4999 0 -1 4194304 100000 0 500 0 5000 1000 0 0 20 0 20 0 500000 2000000000 50000";
        let stat = parse_proc_stat(content).unwrap();

        assert_eq!(stat.utime, 5000);
        assert_eq!(stat.stime, 1000);
    }

    #[test]
    fn test_parse_proc_stat_with_parentheses_in_comm() {
        let content = "5001 (test(1)) S 1 5001 5001 0 -1 4194304 1000 0 0 0 10 5 0 0 20 0 1 0 500100";
        let stat = parse_proc_stat(content).unwrap();

        assert_eq!(stat.utime, 10);
        assert_eq!(stat.stime, 5);
    }

    #[test]
    fn test_parse_proc_stat_truncated() {
        let err = parse_proc_stat("77 (short) S 1 77 77").unwrap_err();
        assert!(err.message.contains("not enough fields"));
        assert!(parse_proc_stat("garbage").is_err());
        assert!(parse_proc_stat("x (a) S 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17").is_err());
    }

    #[test]
    fn test_parse_proc_status() {
        let content = "\
Name:\tpython3
Umask:\t0022
State:\tR (running)
Tgid:\t2001
Pid:\t2001
PPid:\t1
Uid:\t1000\t1000\t1000\t1000
Gid:\t1000\t1000\t1000\t1000
VmPeak:\t  120000 kB
VmSize:\t  110000 kB
VmRSS:\t   40000 kB
VmSwap:\t     512 kB
Threads:\t4
Cpus_allowed:\tf
Cpus_allowed_list:\t0-3
";
        let status = parse_proc_status(content).unwrap();
        assert_eq!(status.name, "python3");
        assert_eq!(status.state, "R (running)");
        assert_eq!(status.uid, 1000);
        assert_eq!(status.gid, 1000);
        assert_eq!(status.vm_peak, 120000);
        assert_eq!(status.vm_size, 110000);
        assert_eq!(status.vm_swap, 512);
        assert_eq!(status.threads, 4);
        assert_eq!(status.cpus_allowed, 0xf);
    }

    #[test]
    fn test_parse_proc_status_kernel_thread_has_no_vm() {
        let content = "Name:\tkworker/0:1\nState:\tI (idle)\nUid:\t0\t0\t0\t0\nGid:\t0\t0\t0\t0\nThreads:\t1\nCpus_allowed:\t1\n";
        let status = parse_proc_status(content).unwrap();
        assert_eq!(status.vm_peak, 0);
        assert_eq!(status.vm_size, 0);
        assert_eq!(status.vm_swap, 0);
        assert_eq!(status.cpus_allowed, 1);
    }

    #[test]
    fn test_parse_proc_status_missing_required() {
        let err = parse_proc_status("Name:\tx\nState:\tS (sleeping)\n").unwrap_err();
        assert!(err.message.contains("Uid"));
    }

    #[test]
    fn test_parse_cpus_allowed() {
        assert_eq!(parse_cpus_allowed("f").unwrap(), 0xf);
        assert_eq!(parse_cpus_allowed("00000000,0000000f").unwrap(), 0xf);
        assert_eq!(
            parse_cpus_allowed("ffffffff,ffffffff,ffffffff").unwrap(),
            u64::MAX
        );
        assert!(parse_cpus_allowed("").is_err());
        assert!(parse_cpus_allowed("xyz").is_err());
    }

    #[test]
    fn test_parse_meminfo() {
        let content = "\
MemTotal:        3884376 kB
MemFree:         2921560 kB
MemAvailable:    3318612 kB
Buffers:           37608 kB
Cached:           463376 kB
";
        let info = parse_meminfo(content).unwrap();
        assert_eq!(info.mem_total, 3884376);
        assert_eq!(info.mem_free, 2921560);
        assert_eq!(info.mem_available, 3318612);
    }

    #[test]
    fn test_parse_meminfo_without_available() {
        let info = parse_meminfo("MemTotal: 1000 kB\nMemFree: 250 kB\n").unwrap();
        assert_eq!(info.mem_available, 250);
        assert!(parse_meminfo("Buffers: 1 kB\n").is_err());
    }

    #[test]
    fn test_parse_cpu_lines() {
        let content = "\
cpu  400 10 200 8000 5 1 2 0 0 0
cpu0 100 5 50 2000 1 0 1 0 0 0
cpu1 100 5 50 2000 4 1 1 0 0 0
intr 12345 0 0
ctxt 99999
";
        let lines = parse_cpu_lines(content, 2).unwrap();
        assert_eq!(lines.aggregate.user, 400);
        assert_eq!(lines.aggregate.user_nice, 10);
        assert_eq!(lines.aggregate.soft_irq, 2);
        assert_eq!(lines.cores.len(), 2);
        assert_eq!(lines.cores[1].iowait, 4);
        assert_eq!(lines.cores[1].irq, 1);
    }

    #[test]
    fn test_parse_cpu_lines_fewer_cores_than_expected() {
        let content = "cpu 1 2 3 4 5 6 7\ncpu0 1 2 3 4 5 6 7\n";
        assert!(parse_cpu_lines(content, 2).is_err());
        assert_eq!(parse_cpu_lines(content, 1).unwrap().cores.len(), 1);
    }

    #[test]
    fn test_parse_cpu_lines_missing_aggregate() {
        assert!(parse_cpu_lines("cpu0 1 2 3 4 5 6 7\n", 1).is_err());
        assert!(parse_cpu_lines("", 0).is_err());
    }

    #[test]
    fn test_parse_cpu_lines_short_line() {
        assert!(parse_cpu_lines("cpu 1 2 3\n", 0).is_err());
    }

    #[test]
    fn test_parse_thermal() {
        assert_eq!(parse_thermal("48312\n").unwrap(), 48312);
        assert_eq!(parse_thermal("-5000").unwrap(), -5000);
        assert!(parse_thermal("hot").is_err());
    }
}
