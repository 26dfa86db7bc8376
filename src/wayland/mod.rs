//! Protocol-related utilities
//!
//! This module contains the client side of the bridge: the globals clients bind, the
//! surfaces they own, and the input delegates translating host events into protocol
//! events. Requests are dispatched and events buffered by `wayland-server`.
//!
//! - [`display`] owns all of this state and is the entry point of the host,
//! - [`seat`] holds the pointer and touch delegates and the touch routing,
//! - [`protocols`] contains the input timestamps and stylus extensions,
//! - [`socket`] provides the listening socket clients connect to.

pub mod compositor;
pub mod display;
pub mod protocols;
pub mod seat;
pub mod socket;
pub mod surface;

#[cfg(test)]
pub(crate) mod testing;
