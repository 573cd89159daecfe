use super::{MeterError, MeterResult, ResourceMeter};

/// CPU time consumed by the calling thread, in nanoseconds.
///
/// Backed by `clock_gettime(CLOCK_THREAD_CPUTIME_ID)`. On targets without a
/// per-thread CPU clock every read fails with [`MeterError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadCpuMeter;

impl ThreadCpuMeter {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos", target_os = "freebsd"))]
impl ResourceMeter for ThreadCpuMeter {
    fn measure(&self) -> MeterResult<u64> {
        // Safety: timespec is plain data and ts outlives the call
        let (rc, ts) = unsafe {
            let mut ts: libc::timespec = std::mem::zeroed();
            let rc = libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts);
            (rc, ts)
        };
        if rc != 0 {
            return Err(MeterError::Unavailable(format!(
                "clock_gettime failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        let secs = u64::try_from(ts.tv_sec)
            .map_err(|_| MeterError::Unavailable("negative thread clock".into()))?;
        let nanos = u64::try_from(ts.tv_nsec)
            .map_err(|_| MeterError::Unavailable("negative thread clock".into()))?;
        Ok(secs.saturating_mul(1_000_000_000).saturating_add(nanos))
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos", target_os = "freebsd")))]
impl ResourceMeter for ThreadCpuMeter {
    fn measure(&self) -> MeterResult<u64> {
        Err(MeterError::Unavailable(
            "no per-thread CPU clock on this platform".into(),
        ))
    }
}
