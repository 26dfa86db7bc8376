//! Various utilities functions and types

mod clock;
mod geometry;
pub mod serial;

pub use self::clock::{Clock, ClockSource, Monotonic, NonNegativeClockSource, Time};
pub use self::geometry::{Coordinate, Logical, Point};
pub use self::serial::{Serial, SerialCategory, SerialCounter, SerialTracker};
