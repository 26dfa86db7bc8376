//! Input protocol extensions not covered by the core protocol
//!
//! - [`input_timestamps`] adds nanosecond timestamps ahead of timed pointer and touch
//!   events,
//! - [`stylus`] reports the tool, force and tilt of stylus touch contacts.
//!
//! Both are generated from the XML files in `protocols/`.

pub mod input_timestamps;
pub mod stylus;
