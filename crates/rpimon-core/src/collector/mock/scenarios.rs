//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios model a quad-core Raspberry Pi: a handful of root daemons
//! that must never be reported, plus a few user processes.

use super::filesystem::MockFs;
use crate::model::CoreCounters;

/// Builds a `/proc/[pid]/stat` line with the given CPU ticks.
pub fn stat_line(pid: u32, comm: &str, state: char, utime: u64, stime: u64, threads: u32) -> String {
    format!(
        "{pid} ({comm}) {state} 1 {pid} {pid} 0 -1 4194304 100 0 0 0 {utime} {stime} 0 0 20 0 {threads} 0 100000 25000000 2000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0"
    )
}

/// Builds `/proc/[pid]/status` text for a user-space process on a 4-core board.
pub fn status_text(name: &str, state: char, uid: u32, gid: u32, threads: u32) -> String {
    let state_text = match state {
        'R' => "R (running)",
        'S' => "S (sleeping)",
        'D' => "D (disk sleep)",
        'Z' => "Z (zombie)",
        'I' => "I (idle)",
        _ => "T (stopped)",
    };
    format!(
        "\
Name:\t{name}
Umask:\t0022
State:\t{state_text}
Uid:\t{uid}\t{uid}\t{uid}\t{uid}
Gid:\t{gid}\t{gid}\t{gid}\t{gid}
VmPeak:\t   30000 kB
VmSize:\t   25000 kB
VmRSS:\t    8000 kB
VmSwap:\t      64 kB
Threads:\t{threads}
Cpus_allowed:\tf
Cpus_allowed_list:\t0-3
"
    )
}

/// Renders a `/proc/stat` body for the given aggregate and per-core counters.
pub fn cpu_stat_text(aggregate: CoreCounters, cores: &[CoreCounters]) -> String {
    let line = |name: String, c: &CoreCounters| {
        format!(
            "{} {} {} {} {} {} {} {} 0 0 0\n",
            name, c.user, c.user_nice, c.kernel, c.idle, c.iowait, c.irq, c.soft_irq
        )
    };
    let mut text = line("cpu ".to_string(), &aggregate);
    for (i, core) in cores.iter().enumerate() {
        text.push_str(&line(format!("cpu{}", i), core));
    }
    text.push_str("intr 1000000 50 0 0\nctxt 500000\nbtime 1700000000\n");
    text
}

impl MockFs {
    /// Replaces `/proc/stat` with counters where every core carries an equal
    /// share of `aggregate`.
    pub fn set_cpu_counters(&self, aggregate: CoreCounters, core_count: usize) {
        let n = core_count.max(1) as u64;
        let core = CoreCounters {
            user: aggregate.user / n,
            user_nice: aggregate.user_nice / n,
            kernel: aggregate.kernel / n,
            idle: aggregate.idle / n,
            iowait: aggregate.iowait / n,
            irq: aggregate.irq / n,
            soft_irq: aggregate.soft_irq / n,
        };
        let cores = vec![core; core_count];
        self.add_file("/proc/stat", cpu_stat_text(aggregate, &cores));
    }

    /// Replaces the stat file of an existing user process with new tick values.
    pub fn set_process_ticks(&self, pid: u32, comm: &str, utime: u64, stime: u64) {
        self.add_file(
            format!("/proc/{}/stat", pid),
            stat_line(pid, comm, 'R', utime, stime, 1),
        );
    }

    /// An idle quad-core board.
    ///
    /// Includes: systemd (PID 1) and kthreadd (PID 2) as root, lighttpd as
    /// www-data, a login shell and a python script as `pi`.
    pub fn pi_idle() -> Self {
        let fs = Self::new();

        fs.add_file(
            "/etc/passwd",
            "\
root:x:0:0:root:/root:/bin/bash
daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin
www-data:x:33:33:www-data:/var/www:/usr/sbin/nologin
pi:x:1000:1000:,,,:/home/pi:/bin/bash
",
        );
        fs.add_file(
            "/etc/group",
            "\
root:x:0:
www-data:x:33:
gpio:x:997:pi
pi:x:1000:
",
        );

        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:        3884376 kB
MemFree:         2921560 kB
MemAvailable:    3318612 kB
Buffers:           37608 kB
Cached:           463376 kB
SwapTotal:        102396 kB
SwapFree:         102396 kB
",
        );
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );
        fs.add_file("/sys/class/thermal/thermal_zone0/temp", "48312\n");

        fs.add_process(
            1,
            &stat_line(1, "systemd", 'S', 1000, 500, 1),
            &status_text("systemd", 'S', 0, 0, 1),
        );
        fs.add_process(
            2,
            "2 (kthreadd) S 0 0 0 0 -1 2129984 0 0 0 0 0 3 0 0 20 0 1 0 1 0 0 18446744073709551615 0 0 0 0 0 0 0 2147483647 0 0 0 0 17 1 0 0 0 0 0",
            "Name:\tkthreadd\nState:\tS (sleeping)\nUid:\t0\t0\t0\t0\nGid:\t0\t0\t0\t0\nThreads:\t1\nCpus_allowed:\tf\n",
        );
        fs.add_process(
            450,
            &stat_line(450, "lighttpd", 'S', 40, 20, 1),
            &status_text("lighttpd", 'S', 33, 33, 1),
        );
        fs.add_process(
            1000,
            &stat_line(1000, "bash", 'S', 100, 50, 1),
            &status_text("bash", 'S', 1000, 1000, 1),
        );
        fs.add_process(
            1001,
            &stat_line(1001, "python3", 'S', 300, 80, 4),
            &status_text("python3", 'S', 1000, 1000, 4),
        );

        fs
    }

    /// [`pi_idle`](Self::pi_idle) plus a CPU hog (`cpu_bomber`, PID 2000)
    /// owned by `pi`.
    pub fn pi_with_hog() -> Self {
        let fs = Self::pi_idle();
        fs.add_process(
            2000,
            &stat_line(2000, "cpu_bomber", 'R', 5000, 10, 1),
            &status_text("cpu_bomber", 'R', 1000, 1000, 1),
        );
        fs
    }
}
