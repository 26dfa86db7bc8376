//! Host-facing side of the bridge
//!
//! The host compositor owns the input devices and the window hierarchy. It resolves
//! every input event to a target surface and hands it to the bridge in the form of an
//! [`InputEvent`](input::InputEvent).

pub mod input;
