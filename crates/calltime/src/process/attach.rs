use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Information about a target process
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pid: u32,
    name: String,
    exe_path: PathBuf,
}

impl ProcessInfo {
    /// Create ProcessInfo for a given PID
    pub fn new(pid: u32) -> Result<Self> {
        let proc_path = format!("/proc/{}", pid);

        if !Path::new(&proc_path).exists() {
            return Err(Error::ProcessNotFound(format!("PID {}", pid)));
        }

        let name = fs::read_to_string(format!("{}/comm", proc_path))
            .map_err(|_| Error::ProcessNotFound(format!("Cannot read comm for PID {}", pid)))?
            .trim()
            .to_string();

        let exe_path = fs::read_link(format!("{}/exe", proc_path)).map_err(|e| {
            Error::PermissionDenied(format!("Cannot read exe for PID {}: {}", pid, e))
        })?;

        Ok(ProcessInfo {
            pid,
            name,
            exe_path,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exe_path(&self) -> &Path {
        &self.exe_path
    }

    /// `/proc/<pid>/exe`, readable even after the binary was replaced on disk
    pub fn proc_exe_path(&self) -> PathBuf {
        PathBuf::from(format!("/proc/{}/exe", self.pid))
    }
}

/// Find a process by name (pgrep-style substring match)
pub fn find_process_by_name(pattern: &str) -> Result<u32> {
    let mut matches: Vec<(u32, String)> = Vec::new();

    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        let name = entry.file_name();

        if let Ok(pid) = name.to_string_lossy().parse::<u32>()
            && let Ok(comm) = fs::read_to_string(format!("/proc/{}/comm", pid))
        {
            let comm = comm.trim();
            if comm.contains(pattern) {
                matches.push((pid, comm.to_string()));
            }
        }
    }

    match matches.as_slice() {
        [] => Err(Error::ProcessNotFound(format!(
            "No process matching '{}'",
            pattern
        ))),
        [(pid, _)] => Ok(*pid),
        _ => {
            let match_list = matches
                .iter()
                .map(|(pid, name)| format!("  PID {}: {}", pid, name))
                .collect::<Vec<_>>()
                .join("\n");
            Err(Error::MultipleProcesses {
                pattern: pattern.to_string(),
                matches: match_list,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process() {
        let info = ProcessInfo::new(std::process::id()).unwrap();
        assert_eq!(info.pid(), std::process::id());
        assert!(!info.name().is_empty());
        assert!(info.proc_exe_path().ends_with("exe"));
    }

    #[test]
    fn test_missing_pid() {
        assert!(matches!(
            ProcessInfo::new(u32::MAX),
            Err(Error::ProcessNotFound(_))
        ));
    }

    #[test]
    fn test_no_matching_name() {
        assert!(matches!(
            find_process_by_name("calltime-no-such-process-name"),
            Err(Error::ProcessNotFound(_))
        ));
    }
}
