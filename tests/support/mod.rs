//! Stand-in rmdb binaries for integration tests
//!
//! The fake server records its pid under `<storage_dir>/boots` and sleeps.
//! The fake client appends every statement except `exit;` to
//! `clients/<pid>.log` and answers `select ... as <alias>` with a one-cell
//! table whose value is read from `answers/<alias>`.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use rmdb_harness::config::{HarnessConfig, OutputMode};

pub const SERVER: &str = "#!/bin/sh
mkdir -p \"$1\"
echo $$ >> \"$1/boots\"
exec sleep 30
";

pub const SERVER_IGNORING_TERM: &str = "#!/bin/sh
mkdir -p \"$1\"
echo $$ >> \"$1/boots\"
trap '' TERM
exec sleep 30
";

pub const SERVER_DYING: &str = "#!/bin/sh
exit 3
";

pub const CLIENT: &str = "#!/bin/sh
log=\"clients/$$.log\"
while IFS= read -r line; do
  case \"$line\" in
    'exit;') exit 0 ;;
  esac
  echo \"$line\" >> \"$log\"
  case \"$line\" in
    select*' as '*)
      alias=${line#* as }
      alias=${alias%% *}
      value=$(cat \"answers/$alias\" 2>/dev/null || echo NULL)
      printf '+----------+\\n| %s |\\n+----------+\\n| %s |\\n+----------+\\nTotal record(s): 1\\n' \"$alias\" \"$value\"
      ;;
  esac
done
";

pub const CLIENT_DYING: &str = "#!/bin/sh
exit 1
";

/// Lets the harness fill its pipe, then dies on the first delete
pub const CLIENT_CRASHING_ON_DELETE: &str = "#!/bin/sh
sleep 0.5
while IFS= read -r line; do
  case \"$line\" in
    delete*) exit 2 ;;
    'exit;') exit 0 ;;
  esac
done
";

/// Takes a while to come up, then leaves cleanly on `exit;`
pub const CLIENT_SLOW_START: &str = "#!/bin/sh
sleep 0.3
while IFS= read -r line; do
  [ \"$line\" = 'exit;' ] && exit 0
done
";

pub const CLIENT_IGNORING_EXIT: &str = "#!/bin/sh
exec sleep 30
";

/// Write an executable script into `dir`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Lay out a work dir with the default fake binaries and answers
pub fn prepare_work_dir(dir: &Path, server: &str, client: &str) {
    write_script(dir, "server.sh", server);
    write_script(dir, "client.sh", client);
    fs::create_dir_all(dir.join("clients")).unwrap();
    fs::create_dir_all(dir.join("answers")).unwrap();
}

/// What the fake client prints for each aggregate
pub fn set_answers(dir: &Path, count: &str, min: &str, max: &str) {
    fs::write(dir.join("answers/cnt_id"), count).unwrap();
    fs::write(dir.join("answers/min_id"), min).unwrap();
    fs::write(dir.join("answers/max_id"), max).unwrap();
}

/// Fast-settling config pointed at the fake binaries in `dir`
pub fn harness_config(dir: &Path, rows: u64, clients: usize) -> HarnessConfig {
    HarnessConfig {
        rows,
        clients,
        server_bin: dir.join("server.sh"),
        client_bin: dir.join("client.sh"),
        work_dir: Some(dir.to_path_buf()),
        first_boot_settle_ms: 50,
        recovery_settle_ms: 50,
        ddl_settle_ms: 10,
        close_timeout_ms: 2000,
        shutdown_timeout_ms: 2000,
        server_output: OutputMode::Discard,
        client_output: OutputMode::Discard,
        ..HarnessConfig::default()
    }
}

/// Statements one client received, in order
pub fn client_log(dir: &Path, pid: u32) -> Vec<String> {
    fs::read_to_string(dir.join("clients").join(format!("{}.log", pid)))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Pids recorded by each boot of the fake server
pub fn server_boots(storage_dir: &Path) -> Vec<u32> {
    fs::read_to_string(storage_dir.join("boots"))
        .unwrap_or_default()
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect()
}

/// True while a process with `pid` exists
pub fn process_exists(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}
