//! Input events as delivered by the host compositor.
//!
//! The host has already resolved which surface an event is addressed to and translated
//! its location into surface-local coordinates. Everything in here is plain data, the
//! routing decisions are taken in [`wayland::seat`](crate::wayland::seat).

use bitflags::bitflags;

use crate::{
    utils::{Logical, Monotonic, Point, Time},
    wayland::surface::SurfaceId,
};

bitflags! {
    /// Set of mouse buttons taking part in an event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MouseButtons: u32 {
        /// Left (primary) button
        const LEFT = 1 << 0;
        /// Right (secondary) button
        const RIGHT = 1 << 1;
        /// Middle button
        const MIDDLE = 1 << 2;
        /// Forward side button
        const FORWARD = 1 << 3;
        /// Back side button
        const BACK = 1 << 4;
    }
}

/// Linux evdev button codes, in the order buttons are reported
pub(crate) const BUTTON_CODES: [(MouseButtons, u32); 5] = [
    (MouseButtons::LEFT, 0x110),
    (MouseButtons::RIGHT, 0x111),
    (MouseButtons::MIDDLE, 0x112),
    (MouseButtons::FORWARD, 0x115),
    (MouseButtons::BACK, 0x116),
];

/// State of a button on a pointer device, like mouse or tablet tool. Either pressed or released
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ButtonState {
    /// Button is released
    Released,
    /// Button is pressed
    Pressed,
}

/// Slot of a touch event.
///
/// Touch events are grouped by slots, usually to identify different
/// fingers on a multi-touch enabled input device. Events should only
/// be interpreted in the context of other events on the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TouchSlot {
    id: Option<u32>,
}

impl TouchSlot {
    /// The slot used by devices that do not assign identifiers
    pub const UNASSIGNED: TouchSlot = TouchSlot { id: None };

    /// Slot with an identifier assigned by the input source
    pub fn new(id: u32) -> Self {
        TouchSlot { id: Some(id) }
    }

    /// The identifier assigned by the input source, if any
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// Touch id sent to clients
    ///
    /// The unassigned slot is `-1`. Identifiers beyond `i32::MAX` have no
    /// representation and yield `None`.
    pub fn wire_id(&self) -> Option<i32> {
        match self.id {
            None => Some(-1),
            Some(id) => i32::try_from(id).ok(),
        }
    }
}

impl From<Option<u32>> for TouchSlot {
    fn from(id: Option<u32>) -> Self {
        Self { id }
    }
}


/// Kind of tool generating a touch contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerType {
    /// A finger on a touch screen
    Finger,
    /// The tip of a pen or stylus
    Pen,
    /// The eraser end of a stylus
    Eraser,
}

/// An input event addressed by the host to the bridge
#[derive(Debug, Clone, Copy)]
pub enum InputEvent {
    /// The pointer entered a surface
    PointerEnter {
        /// Target surface
        surface: SurfaceId,
        /// Surface-local location
        location: Point<f64, Logical>,
        /// Buttons held while entering
        buttons: MouseButtons,
    },
    /// The pointer left a surface
    PointerLeave {
        /// The surface that was left
        surface: SurfaceId,
    },
    /// The pointer moved over the focused surface
    PointerMotion {
        /// Event timestamp
        time: Time<Monotonic>,
        /// Surface-local location
        location: Point<f64, Logical>,
    },
    /// One or more buttons changed state
    PointerButton {
        /// Event timestamp
        time: Time<Monotonic>,
        /// Buttons that changed state
        buttons: MouseButtons,
        /// The new state of `buttons`
        state: ButtonState,
    },
    /// Scroll on the focused surface
    PointerAxis {
        /// Event timestamp
        time: Time<Monotonic>,
        /// Offset in host scroll units (16 units per wheel click)
        offset: Point<f64, Logical>,
        /// The offset comes from a device with discrete steps
        discrete: bool,
    },
    /// A finger scroll sequence ended
    PointerAxisStop {
        /// Event timestamp
        time: Time<Monotonic>,
    },
    /// End of a group of pointer events
    PointerFrame,
    /// A new touch contact
    TouchDown {
        /// Event timestamp
        time: Time<Monotonic>,
        /// Contact slot
        slot: TouchSlot,
        /// Surface under the contact
        surface: SurfaceId,
        /// Surface-local location
        location: Point<f64, Logical>,
        /// Tool generating the contact
        pointer_type: PointerType,
    },
    /// A touch contact moved
    TouchMotion {
        /// Event timestamp
        time: Time<Monotonic>,
        /// Contact slot
        slot: TouchSlot,
        /// Surface-local location
        location: Point<f64, Logical>,
        /// Tool generating the contact
        pointer_type: PointerType,
    },
    /// A touch contact was lifted
    TouchUp {
        /// Event timestamp
        time: Time<Monotonic>,
        /// Contact slot
        slot: TouchSlot,
    },
    /// A touch contact was taken over by the host
    TouchCancel {
        /// Event timestamp
        time: Time<Monotonic>,
        /// Contact slot
        slot: TouchSlot,
    },
    /// Pressure of a stylus contact changed
    TouchForce {
        /// Event timestamp
        time: Time<Monotonic>,
        /// Contact slot
        slot: TouchSlot,
        /// Normalized force between 0 and 1
        force: f64,
    },
    /// Tilt of a stylus contact changed
    TouchTilt {
        /// Event timestamp
        time: Time<Monotonic>,
        /// Contact slot
        slot: TouchSlot,
        /// Tilt in degrees along x and y
        tilt: Point<f64, Logical>,
    },
}

/// Whether the host should keep processing an event the bridge has seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// The event was not consumed
    Continue,
    /// The event was delivered to a client, the host should stop handling it
    Stop,
}
