use std::{cmp::Ordering, marker::PhantomData, mem::MaybeUninit, time::Duration};

/// Marker for clock source that never returns a negative [`Time`]
pub trait NonNegativeClockSource: ClockSource {}

/// Monotonic clock
///
/// Input timestamps handed to the bridge are expected to be taken from this clock.
#[derive(Debug)]
pub struct Monotonic;

impl ClockSource for Monotonic {
    fn id() -> libc::clockid_t {
        libc::CLOCK_MONOTONIC
    }
}

impl NonNegativeClockSource for Monotonic {}

/// Id for a clock according to unix clockid_t
pub trait ClockSource {
    /// Gets the id of the clock source
    fn id() -> libc::clockid_t;
}

/// Defines a clock with a specific kind
#[derive(Debug)]
pub struct Clock<Kind> {
    clk_id: libc::clockid_t,
    _kind: PhantomData<Kind>,
}

impl<Kind: ClockSource> Clock<Kind> {
    /// Initialize a new clock
    pub fn new() -> std::io::Result<Self> {
        let clk_id = Kind::id();
        clock_get_time(clk_id)?;
        Ok(Clock {
            clk_id,
            _kind: PhantomData,
        })
    }

    /// Returns the current time
    ///
    /// The clock was successfully read in [`Clock::new`], a later failure is reported as
    /// the zero time point.
    pub fn now(&self) -> Time<Kind> {
        clock_get_time(self.clk_id)
            .map(Time::from)
            .unwrap_or_else(|err| {
                tracing::warn!(?err, "failed to read clock");
                Time::zero()
            })
    }
}

/// A point in time for a clock with a specific kind
pub struct Time<Kind> {
    tp: libc::timespec,
    _kind: PhantomData<Kind>,
}

impl<Kind> Time<Kind> {
    fn zero() -> Self {
        Time {
            tp: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            _kind: PhantomData,
        }
    }

    /// Timestamp in milliseconds, as carried by `time` arguments of input events
    ///
    /// The value wraps around every ~49 days, clients only compare nearby values.
    pub fn as_millis(&self) -> u32 {
        let millis = (self.tp.tv_sec as u64)
            .wrapping_mul(1000)
            .wrapping_add(self.tp.tv_nsec as u64 / 1_000_000);
        millis as u32
    }

    /// Split into `(tv_sec_hi, tv_sec_lo, tv_nsec)` for high resolution timestamps
    pub fn as_split_timespec(&self) -> (u32, u32, u32) {
        let secs = self.tp.tv_sec as u64;
        ((secs >> 32) as u32, secs as u32, self.tp.tv_nsec as u32)
    }
}

impl<Kind> Clone for Time<Kind> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Kind> Copy for Time<Kind> {}

impl<Kind> std::fmt::Debug for Time<Kind> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Time")
            .field("tv_sec", &self.tp.tv_sec)
            .field("tv_nsec", &self.tp.tv_nsec)
            .finish()
    }
}

impl<Kind> PartialEq for Time<Kind> {
    fn eq(&self, other: &Self) -> bool {
        self.tp.tv_sec == other.tp.tv_sec && self.tp.tv_nsec == other.tp.tv_nsec
    }
}

impl<Kind> Eq for Time<Kind> {}

impl<Kind> PartialOrd for Time<Kind> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<Kind> Ord for Time<Kind> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let tv_sec = self.tp.tv_sec.cmp(&other.tp.tv_sec);

        if tv_sec == Ordering::Equal {
            self.tp.tv_nsec.cmp(&other.tp.tv_nsec)
        } else {
            tv_sec
        }
    }
}

impl<Kind: NonNegativeClockSource> From<Duration> for Time<Kind> {
    fn from(tp: Duration) -> Self {
        let tp = libc::timespec {
            tv_sec: tp.as_secs() as libc::time_t,
            #[cfg(all(target_arch = "x86_64", target_pointer_width = "32"))]
            tv_nsec: tp.subsec_nanos() as i64,
            #[cfg(not(all(target_arch = "x86_64", target_pointer_width = "32")))]
            tv_nsec: tp.subsec_nanos() as std::os::raw::c_long,
        };
        Time {
            tp,
            _kind: PhantomData,
        }
    }
}

impl<Kind> From<libc::timespec> for Time<Kind> {
    fn from(tp: libc::timespec) -> Self {
        Time {
            tp,
            _kind: PhantomData,
        }
    }
}

fn clock_get_time(clk_id: libc::clockid_t) -> Result<libc::timespec, std::io::Error> {
    let mut tp = MaybeUninit::zeroed();
    unsafe {
        let res = libc::clock_gettime(clk_id, tp.as_mut_ptr());

        if res < 0 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(tp.assume_init())
    }
}
