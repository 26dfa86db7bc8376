use std::fmt;

/// A serial type, whose comparison takes into account the wrapping-around behavior of the
/// underlying counter.
#[derive(Debug, Copy, Clone, Hash)]
pub struct Serial(pub(crate) u32);

impl PartialEq for Serial {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Serial {}

impl PartialOrd for Serial {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let distance = self.0.abs_diff(other.0);
        if distance < u32::MAX / 2 {
            self.0.partial_cmp(&other.0)
        } else {
            // wrap-around occurred, invert comparison
            other.0.partial_cmp(&self.0)
        }
    }
}

impl From<u32> for Serial {
    fn from(n: u32) -> Self {
        Serial(n)
    }
}

impl From<Serial> for u32 {
    fn from(serial: Serial) -> u32 {
        serial.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serial {
    /// Checks if a serial was generated after or is equal to another given serial
    pub fn is_no_older_than(&self, other: &Serial) -> bool {
        other <= self
    }
}

/// A counter for generating serials, for use in the client protocol
///
/// The counter will wrap around on overflow, ensuring it can run for as long
/// as needed. Zero is never handed out, it is reserved as the "no serial" value.
#[derive(Debug)]
pub struct SerialCounter {
    serial: u32,
}

impl Default for SerialCounter {
    fn default() -> Self {
        SerialCounter::starting_at(1)
    }
}

impl SerialCounter {
    /// Create a counter whose first serial will be `initial_value`
    ///
    /// An initial value of zero is moved to one.
    pub fn starting_at(initial_value: u32) -> SerialCounter {
        SerialCounter { serial: initial_value }
    }

    /// Retrieve the next serial from the counter
    pub fn next_serial(&mut self) -> Serial {
        if self.serial == 0 {
            self.serial = 1;
        }
        let serial = Serial(self.serial);
        self.serial = self.serial.wrapping_add(1);
        serial
    }
}

/// Logical category of an event carrying a serial
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SerialCategory {
    /// `wl_pointer.enter`
    PointerEnter,
    /// `wl_pointer.leave`
    PointerLeave,
    /// `wl_pointer.button` with the pressed state
    PointerButtonDown,
    /// `wl_pointer.button` with the released state
    PointerButtonUp,
    /// `wl_touch.down`
    TouchDown,
    /// `wl_touch.up`
    TouchUp,
    /// Anything else that needs a serial
    Other,
}

impl SerialCategory {
    const COUNT: usize = 7;

    fn index(self) -> usize {
        match self {
            SerialCategory::PointerEnter => 0,
            SerialCategory::PointerLeave => 1,
            SerialCategory::PointerButtonDown => 2,
            SerialCategory::PointerButtonUp => 3,
            SerialCategory::TouchDown => 4,
            SerialCategory::TouchUp => 5,
            SerialCategory::Other => 6,
        }
    }
}

/// Issues serials for outgoing events and remembers the last one of every category.
///
/// All categories draw from a single [`SerialCounter`], so a serial identifies exactly
/// one event, while the per-category record lets request handlers check what a client
/// refers to (e.g. "is this the serial of the last button press?").
///
/// The tracker is owned by the display and only ever touched from the dispatch thread,
/// so it is mutated through `&mut self` without any synchronization.
#[derive(Debug, Default)]
pub struct SerialTracker {
    counter: SerialCounter,
    last: [Option<Serial>; SerialCategory::COUNT],
}

impl SerialTracker {
    /// Create a tracker whose first serial will be `initial_value`
    pub fn starting_at(initial_value: u32) -> SerialTracker {
        SerialTracker {
            counter: SerialCounter::starting_at(initial_value),
            last: [None; SerialCategory::COUNT],
        }
    }

    /// Issue the next serial for an event of the given category
    pub fn next_serial(&mut self, category: SerialCategory) -> Serial {
        let serial = self.counter.next_serial();
        self.last[category.index()] = Some(serial);
        serial
    }

    /// The most recent serial issued for `category`, if any
    pub fn last_serial(&self, category: SerialCategory) -> Option<Serial> {
        self.last[category.index()]
    }

    /// The serial of the last pointer button press
    pub fn pointer_down_serial(&self) -> Option<Serial> {
        self.last_serial(SerialCategory::PointerButtonDown)
    }

    /// Forget the last button press, e.g. once the matching release went out
    pub fn reset_pointer_down_serial(&mut self) {
        self.last[SerialCategory::PointerButtonDown.index()] = None;
    }
}
