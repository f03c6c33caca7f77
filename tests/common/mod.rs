//! Synthetic hourly CSV datadir builder for black-box tests: a
//! disposable `tempfile::TempDir` of `xcapture_*` CSV shards, since the
//! query runtime here is an embedded DuckDB connection rather than a
//! server to spin up a container against.

use std::io::Write;
use std::path::{Path, PathBuf};

/// One synthetic `samples` row. Only the columns tests actually vary are
/// named fields; everything else gets a fixed filler value.
pub struct SampleRow {
    pub timestamp: &'static str,
    pub tid: i64,
    pub pid: i64,
    pub state: &'static str,
    pub username: &'static str,
    pub syscall: &'static str,
    pub sysc_seq_num: i64,
}

pub fn write_samples_csv(dir: &Path, date: &str, hour: u32, rows: &[SampleRow]) -> PathBuf {
    let path = dir.join(format!("xcapture_samples_{date}.{hour:02}.csv"));
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(
        f,
        "timestamp,tid,pid,tgid,state,username,exe,comm,syscall,filename,extra_info,sysc_seq_num,iorq_seq_num,kstack_hash,ustack_hash"
    )
    .unwrap();
    for r in rows {
        writeln!(
            f,
            "{},{},{},{},{},{},/usr/bin/postgres,postgres,{},,,{},0,0,0",
            r.timestamp, r.tid, r.pid, r.pid, r.state, r.username, r.syscall, r.sysc_seq_num,
        )
        .unwrap();
    }
    path
}

pub struct SyscendRow {
    pub tid: i64,
    pub sysc_seq_num: i64,
    pub duration_ns: i64,
}

/// Write a `syscend` shard. `with_type` controls whether the optional
/// `type` column is emitted at all, for schema-resilience tests (§8.2
/// scenario 3).
pub fn write_syscend_csv(dir: &Path, date: &str, hour: u32, rows: &[SyscendRow], with_type: bool) -> PathBuf {
    let path = dir.join(format!("xcapture_syscend_{date}.{hour:02}.csv"));
    let mut f = std::fs::File::create(&path).unwrap();
    if with_type {
        writeln!(f, "tid,sysc_seq_num,duration_ns,type").unwrap();
        for r in rows {
            writeln!(f, "{},{},{},read", r.tid, r.sysc_seq_num, r.duration_ns).unwrap();
        }
    } else {
        writeln!(f, "tid,sysc_seq_num,duration_ns").unwrap();
        for r in rows {
            writeln!(f, "{},{},{}", r.tid, r.sysc_seq_num, r.duration_ns).unwrap();
        }
    }
    path
}
