use crate::{DIAGNOSTIC_LEN, TIMER_LEN, TIMER_WINDOW};
use core::{fmt, ops::Range};

/// A contiguous range of register offsets, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWindow {
    start: u8,
    end: u8,
}

impl RegisterWindow {
    /// Creates the window `start..end`.
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// The offsets in ascending order.
    pub fn offsets(&self) -> Range<u8> {
        self.start..self.end
    }

    /// First offset.
    pub const fn start(&self) -> u8 {
        self.start
    }

    /// Number of registers in the window.
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    /// Whether the window holds no register.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bytes read back from the timer window.
pub type TimerBytes = [u8; TIMER_LEN];

/// The diagnostic window as read before any write.
///
/// Each byte is an independent register value. Kept for confirmation and for manual recovery
/// after a failed reset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot(pub [u8; DIAGNOSTIC_LEN]);

impl Snapshot {
    /// The raw register values.
    pub fn bytes(&self) -> &[u8; DIAGNOSTIC_LEN] {
        &self.0
    }

    /// The part of the snapshot covering the timer window.
    pub fn timer(&self) -> &[u8] {
        let start = TIMER_WINDOW.start() as usize;
        &self.0[start..start + TIMER_WINDOW.len()]
    }
}

/// Space separated decimal values, e.g. `12 0 0 3 0 0 0 0 0 255`.
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b}")?;
        }
        Ok(())
    }
}

/// Whether every byte is zero.
pub fn is_zeroed(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}
