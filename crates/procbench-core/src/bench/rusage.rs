//! CPU-time accounting via `getrusage(2)`.
//!
//! `RUSAGE_CHILDREN` only covers children that have been waited for, so a
//! snapshot must be taken after the benchmarked child is reaped. The counter is
//! process wide: every reaped child (including compiler invocations) adds to it,
//! which is why runs take a delta around exactly one child.
//!
//! On non-Unix platforms snapshots are `None`.

use std::time::Duration;

/// User and system CPU time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: Duration,
    pub system: Duration,
}

impl CpuTimes {
    /// Total CPU time (user + system).
    #[must_use]
    pub fn total(&self) -> Duration {
        self.user + self.system
    }

    /// CPU time accumulated between `earlier` and `self`.
    #[must_use]
    pub fn since(&self, earlier: &CpuTimes) -> CpuTimes {
        CpuTimes {
            user: self.user.saturating_sub(earlier.user),
            system: self.system.saturating_sub(earlier.system),
        }
    }
}

/// CPU time consumed between two optional snapshots; zero if either is missing.
#[must_use]
pub fn delta(before: Option<CpuTimes>, after: Option<CpuTimes>) -> CpuTimes {
    match (before, after) {
        (Some(before), Some(after)) => after.since(&before),
        _ => CpuTimes::default(),
    }
}

#[cfg(unix)]
mod platform {
    use super::CpuTimes;
    use std::time::Duration;

    #[allow(clippy::cast_sign_loss)]
    fn timeval_to_duration(tv: libc::timeval) -> Duration {
        Duration::from_secs(tv.tv_sec as u64) + Duration::from_micros(tv.tv_usec as u64)
    }

    /// Snapshot CPU time of reaped child processes (`RUSAGE_CHILDREN`).
    pub fn snapshot_children() -> Option<CpuTimes> {
        let mut ru: libc::rusage = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::getrusage(libc::RUSAGE_CHILDREN, &mut ru) };
        if ret == 0 {
            Some(CpuTimes {
                user: timeval_to_duration(ru.ru_utime),
                system: timeval_to_duration(ru.ru_stime),
            })
        } else {
            None
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use super::CpuTimes;

    pub fn snapshot_children() -> Option<CpuTimes> {
        None
    }
}

/// Snapshot CPU time of reaped child processes.
#[must_use]
pub fn snapshot_children() -> Option<CpuTimes> {
    platform::snapshot_children()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_snapshot_children_returns_some() {
        assert!(snapshot_children().is_some());
    }

    #[test]
    fn test_since_computation() {
        let before = CpuTimes {
            user: Duration::from_millis(100),
            system: Duration::from_millis(50),
        };
        let after = CpuTimes {
            user: Duration::from_millis(300),
            system: Duration::from_millis(150),
        };
        let d = after.since(&before);
        assert_eq!(d.user, Duration::from_millis(200));
        assert_eq!(d.system, Duration::from_millis(100));
        assert_eq!(d.total(), Duration::from_millis(300));
    }

    #[test]
    fn test_since_saturates() {
        let before = CpuTimes {
            user: Duration::from_millis(500),
            system: Duration::from_millis(200),
        };
        let after = CpuTimes {
            user: Duration::from_millis(100),
            system: Duration::from_millis(50),
        };
        assert_eq!(after.since(&before), CpuTimes::default());
    }

    #[test]
    fn test_delta_missing_snapshot_is_zero() {
        let snap = CpuTimes {
            user: Duration::from_secs(1),
            system: Duration::ZERO,
        };
        assert_eq!(delta(None, Some(snap)), CpuTimes::default());
        assert_eq!(delta(Some(snap), None), CpuTimes::default());
    }
}
