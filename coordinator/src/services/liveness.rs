//! Local process liveness probing

use shared::ProcessHandle;

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::LivenessProbe;

/// Probes pids on this host
#[derive(Debug, Default, Clone, Copy)]
pub struct RealLivenessProbe;

impl RealLivenessProbe {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl LivenessProbe for RealLivenessProbe {
    fn process_exists(&self, pid: u32) -> CoordinatorResult<bool> {
        use nix::errno::Errno;
        use nix::unistd::{getpgid, Pid};

        let raw = i32::try_from(pid).map_err(|_| CoordinatorError::ProbeError {
            message: format!("pid {pid} out of range"),
        })?;
        match getpgid(Some(Pid::from_raw(raw))) {
            Ok(_) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(CoordinatorError::ProbeError {
                message: format!("getpgid({pid}): {e}"),
            }),
        }
    }
}

#[cfg(not(unix))]
impl LivenessProbe for RealLivenessProbe {
    fn process_exists(&self, pid: u32) -> CoordinatorResult<bool> {
        Err(CoordinatorError::ProbeError {
            message: format!("no liveness probe on this platform for pid {pid}"),
        })
    }
}

/// Handle under which this process claims duties
pub fn local_handle() -> CoordinatorResult<ProcessHandle> {
    let host = hostname::get()?
        .into_string()
        .map_err(|raw| CoordinatorError::ProbeError {
            message: format!("host name is not valid UTF-8: {raw:?}"),
        })?;
    Ok(ProcessHandle::new(host, std::process::id()))
}
