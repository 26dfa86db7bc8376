use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, info_span, trace};
use wayland_server::{
    backend::{ClientId, ObjectId},
    protocol::wl_touch::WlTouch,
    Resource,
};

use super::{DelegateKind, DispatchContext, InputDelegate, PointerDelegate};
use crate::{
    backend::input::{MouseButtons, PointerType, Propagation, TouchSlot},
    utils::{Logical, Monotonic, Point, SerialCategory, Time},
    wayland::{
        protocols::{
            input_timestamps::zwp_input_timestamps_v1::ZwpInputTimestampsV1,
            stylus::{self, zcr_touch_stylus_v2::ZcrTouchStylusV2},
        },
        surface::SurfaceId,
    },
};

/// Sends `wl_touch` events, and stylus events if bound, to one client object
///
/// Every event is followed by a `frame` and a flush of the client.
#[derive(Debug)]
pub struct TouchDelegate {
    touch: WlTouch,
    client: ClientId,
    timestamps: Option<ZwpInputTimestampsV1>,
    stylus: Option<ZcrTouchStylusV2>,
}

impl TouchDelegate {
    /// Create a delegate for `touch`, owned by `client`
    pub fn new(client: ClientId, touch: WlTouch) -> TouchDelegate {
        TouchDelegate {
            touch,
            client,
            timestamps: None,
            stylus: None,
        }
    }

    /// Negotiated protocol version
    pub fn version(&self) -> u32 {
        self.touch.version()
    }

    /// The stylus extension of this touch, if any
    pub fn stylus(&self) -> Option<&ZcrTouchStylusV2> {
        self.stylus.as_ref()
    }

    /// Set the stylus extension
    pub fn set_stylus(&mut self, stylus: Option<ZcrTouchStylusV2>) {
        self.stylus = stylus;
    }

    /// The input timestamps subscription of this touch
    pub fn input_timestamps(&self) -> Option<&ZwpInputTimestampsV1> {
        self.timestamps.as_ref()
    }

    /// Set the input timestamps subscription
    pub fn set_input_timestamps(&mut self, timestamps: Option<ZwpInputTimestampsV1>) {
        self.timestamps = timestamps;
    }

    fn down(
        &self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        id: i32,
        surface: SurfaceId,
        location: Point<f64, Logical>,
        pointer_type: PointerType,
    ) {
        let Some(resource) = cx.surfaces.surface_for(&self.client, surface) else {
            return;
        };
        if let (Some(stylus), Some(tool)) = (&self.stylus, stylus::tool_type(pointer_type)) {
            stylus.tool(id as u32, tool);
        }
        self.send_timestamp(time);
        let serial = cx.serials.next_serial(SerialCategory::TouchDown);
        self.touch
            .down(serial.into(), time.as_millis(), resource, id, location.x, location.y);
        self.frame(cx);
    }

    fn motion(
        &self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        id: i32,
        location: Point<f64, Logical>,
    ) {
        self.send_timestamp(time);
        self.touch.motion(time.as_millis(), id, location.x, location.y);
        self.frame(cx);
    }

    fn up(&self, cx: &mut DispatchContext<'_>, time: Time<Monotonic>, id: i32) {
        self.send_timestamp(time);
        let serial = cx.serials.next_serial(SerialCategory::TouchUp);
        self.touch.up(serial.into(), time.as_millis(), id);
        self.frame(cx);
    }

    fn cancel(&self, cx: &mut DispatchContext<'_>) {
        self.touch.cancel();
        self.frame(cx);
    }

    fn force(&self, cx: &mut DispatchContext<'_>, time: Time<Monotonic>, id: i32, force: f64) {
        if let Some(stylus) = &self.stylus {
            stylus.force(time.as_millis(), id as u32, force);
            self.frame(cx);
        }
    }

    fn tilt(
        &self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        id: i32,
        tilt: Point<f64, Logical>,
    ) {
        if let Some(stylus) = &self.stylus {
            stylus.tilt(time.as_millis(), id as u32, tilt.x, tilt.y);
            self.frame(cx);
        }
    }

    fn frame(&self, cx: &mut DispatchContext<'_>) {
        self.touch.frame();
        cx.flush(&self.client);
    }

    fn send_timestamp(&self, time: Time<Monotonic>) {
        if let Some(timestamps) = &self.timestamps {
            let (tv_sec_hi, tv_sec_lo, tv_nsec) = time.as_split_timespec();
            timestamps.timestamp(tv_sec_hi, tv_sec_lo, tv_nsec);
        }
    }
}

impl InputDelegate for TouchDelegate {
    fn kind(&self) -> DelegateKind {
        DelegateKind::Touch
    }

    fn client(&self) -> &ClientId {
        &self.client
    }

    fn object(&self) -> ObjectId {
        self.touch.id()
    }

    fn on_surface_destroying(&mut self, _surface: SurfaceId) {
        // contacts are tracked by the router
    }
}

/// How the events of a contact reach its client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchRoute {
    /// As `wl_touch` events
    Native,
    /// As synthesized pointer events with the primary button held
    Pointer,
}

/// An active touch contact
#[derive(Debug, Clone)]
pub struct TouchContact {
    /// Surface the contact is bound to for its whole lifetime
    pub surface: SurfaceId,
    /// Owner of `surface`
    pub client: ClientId,
    /// Touch point id sent to the client
    pub id: i32,
    /// Tool generating the contact
    pub pointer_type: PointerType,
    /// Delivery path chosen on touch down
    pub route: TouchRoute,
    /// Last known surface-local location
    pub location: Point<f64, Logical>,
    /// Pointers that received the synthesized button press
    pub pressed: SmallVec<[ObjectId; 2]>,
}

/// Tracks the active touch contacts and delivers their events
///
/// A surface has at most one bound contact at a time. A second contact going down on the
/// same surface is rejected, and so is a contact reusing the slot of an active one.
#[derive(Debug)]
pub struct TouchRouter {
    contacts: IndexMap<TouchSlot, TouchContact>,
    surface_contacts: HashMap<SurfaceId, TouchSlot>,
    synthesize_pointer: bool,
    span: tracing::Span,
}

impl TouchRouter {
    /// Create a router without contacts
    pub fn new(synthesize_pointer: bool) -> TouchRouter {
        TouchRouter {
            contacts: IndexMap::new(),
            surface_contacts: HashMap::new(),
            synthesize_pointer,
            span: info_span!("wayland_touch", synthesize_pointer),
        }
    }

    /// The contact bound to `slot`
    pub fn contact(&self, slot: TouchSlot) -> Option<&TouchContact> {
        self.contacts.get(&slot)
    }

    /// The slot of the contact bound to `surface`
    pub fn contact_on(&self, surface: SurfaceId) -> Option<TouchSlot> {
        self.surface_contacts.get(&surface).copied()
    }

    /// Number of active contacts
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Are there no active contacts
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// A contact went down on `surface`
    #[allow(clippy::too_many_arguments)]
    pub fn down(
        &mut self,
        cx: &mut DispatchContext<'_>,
        touches: &[TouchDelegate],
        pointers: &mut [PointerDelegate],
        time: Time<Monotonic>,
        slot: TouchSlot,
        surface: SurfaceId,
        location: Point<f64, Logical>,
        pointer_type: PointerType,
    ) -> Propagation {
        let span = self.span.clone();
        let _guard = span.enter();

        let Some(id) = slot.wire_id() else {
            debug!(?slot, "slot id does not fit a touch id, rejecting touch down");
            return Propagation::Continue;
        };
        if let Some(contact) = self.contacts.get(&slot) {
            debug!(?slot, bound = %contact.surface, "slot is already bound, rejecting touch down");
            return Propagation::Continue;
        }
        if let Some(bound) = self.surface_contacts.get(&surface) {
            debug!(%surface, ?bound, "surface already has a contact, rejecting touch down");
            return Propagation::Continue;
        }
        let Some(client) = cx.surfaces.owner(surface).cloned() else {
            trace!(%surface, "surface is gone, dropping touch down");
            return Propagation::Continue;
        };

        let route = if touches.iter().any(|touch| touch.client() == &client) {
            TouchRoute::Native
        } else if self.synthesize_pointer
            && pointers.iter().any(|pointer| pointer.client() == &client)
        {
            TouchRoute::Pointer
        } else {
            trace!(?client, "client cannot receive touch, dropping touch down");
            return Propagation::Continue;
        };

        trace!(?slot, %surface, ?route, ?pointer_type, "touch down");
        let mut pressed = SmallVec::new();
        match route {
            TouchRoute::Native => {
                for touch in touches.iter().filter(|touch| touch.client() == &client) {
                    touch.down(cx, time, id, surface, location, pointer_type);
                }
            }
            TouchRoute::Pointer => {
                let owned = pointers
                    .iter_mut()
                    .filter(|pointer| pointer.client() == &client);
                for pointer in owned {
                    pointer.on_enter(cx, surface, location, MouseButtons::empty());
                    pointer.on_motion(cx, time, location);
                    pointer.on_button(cx, time, MouseButtons::LEFT, true);
                    pointer.on_frame(cx);
                    pressed.push(pointer.object());
                }
            }
        }

        self.contacts.insert(
            slot,
            TouchContact {
                surface,
                client,
                id,
                pointer_type,
                route,
                location,
                pressed,
            },
        );
        self.surface_contacts.insert(surface, slot);
        Propagation::Stop
    }

    /// A contact moved
    #[allow(clippy::too_many_arguments)]
    pub fn motion(
        &mut self,
        cx: &mut DispatchContext<'_>,
        touches: &[TouchDelegate],
        pointers: &mut [PointerDelegate],
        time: Time<Monotonic>,
        slot: TouchSlot,
        location: Point<f64, Logical>,
        pointer_type: PointerType,
    ) -> Propagation {
        let span = self.span.clone();
        let _guard = span.enter();

        let Some(contact) = self.contacts.get_mut(&slot) else {
            trace!(?slot, "no bound contact, dropping touch motion");
            return Propagation::Continue;
        };
        if contact.pointer_type != pointer_type {
            trace!(
                ?slot,
                ?pointer_type,
                bound = ?contact.pointer_type,
                "pointer type mismatch, dropping touch motion"
            );
            return Propagation::Continue;
        }
        contact.location = location;

        match contact.route {
            TouchRoute::Native => {
                for touch in touches.iter().filter(|touch| touch.client() == &contact.client) {
                    touch.motion(cx, time, contact.id, location);
                }
            }
            TouchRoute::Pointer => {
                let focused = pointers.iter_mut().filter(|pointer| {
                    contact.pressed.contains(&pointer.object())
                        && pointer.state().focus() == Some(contact.surface)
                });
                for pointer in focused {
                    pointer.on_motion(cx, time, location);
                    pointer.on_frame(cx);
                }
            }
        }
        Propagation::Continue
    }

    /// A contact was lifted
    pub fn up(
        &mut self,
        cx: &mut DispatchContext<'_>,
        touches: &[TouchDelegate],
        pointers: &mut [PointerDelegate],
        time: Time<Monotonic>,
        slot: TouchSlot,
    ) -> Propagation {
        let span = self.span.clone();
        let _guard = span.enter();

        let Some(contact) = self.forget(slot) else {
            trace!(?slot, "no bound contact, dropping touch up");
            return Propagation::Continue;
        };

        match contact.route {
            TouchRoute::Native => {
                for touch in touches.iter().filter(|touch| touch.client() == &contact.client) {
                    touch.up(cx, time, contact.id);
                }
            }
            TouchRoute::Pointer => release_pointers(cx, pointers, &contact, time),
        }
        Propagation::Stop
    }

    /// A contact was cancelled by the host
    ///
    /// `wl_touch.cancel` applies to every contact of the client, so the other native
    /// contacts of that client are forgotten as well.
    pub fn cancel(
        &mut self,
        cx: &mut DispatchContext<'_>,
        touches: &[TouchDelegate],
        pointers: &mut [PointerDelegate],
        time: Time<Monotonic>,
        slot: TouchSlot,
    ) -> Propagation {
        let span = self.span.clone();
        let _guard = span.enter();

        let Some(contact) = self.forget(slot) else {
            trace!(?slot, "no bound contact, dropping touch cancel");
            return Propagation::Continue;
        };

        match contact.route {
            TouchRoute::Native => {
                for touch in touches.iter().filter(|touch| touch.client() == &contact.client) {
                    touch.cancel(cx);
                }
                let cancelled: Vec<TouchSlot> = self
                    .contacts
                    .iter()
                    .filter(|(_, other)| {
                        other.client == contact.client && other.route == TouchRoute::Native
                    })
                    .map(|(slot, _)| *slot)
                    .collect();
                for slot in cancelled {
                    self.forget(slot);
                }
            }
            TouchRoute::Pointer => release_pointers(cx, pointers, &contact, time),
        }
        Propagation::Stop
    }

    /// The force of a stylus contact changed
    pub fn force(
        &mut self,
        cx: &mut DispatchContext<'_>,
        touches: &[TouchDelegate],
        time: Time<Monotonic>,
        slot: TouchSlot,
        force: f64,
    ) -> Propagation {
        let span = self.span.clone();
        let _guard = span.enter();

        if let Some(contact) = self.stylus_contact(slot) {
            for touch in touches.iter().filter(|touch| touch.client() == &contact.client) {
                touch.force(cx, time, contact.id, force);
            }
        }
        Propagation::Continue
    }

    /// The tilt of a stylus contact changed
    pub fn tilt(
        &mut self,
        cx: &mut DispatchContext<'_>,
        touches: &[TouchDelegate],
        time: Time<Monotonic>,
        slot: TouchSlot,
        tilt: Point<f64, Logical>,
    ) -> Propagation {
        let span = self.span.clone();
        let _guard = span.enter();

        if let Some(contact) = self.stylus_contact(slot) {
            for touch in touches.iter().filter(|touch| touch.client() == &contact.client) {
                touch.tilt(cx, time, contact.id, tilt);
            }
        }
        Propagation::Continue
    }

    fn stylus_contact(&self, slot: TouchSlot) -> Option<&TouchContact> {
        match self.contacts.get(&slot) {
            Some(contact)
                if contact.route == TouchRoute::Native
                    && contact.pointer_type != PointerType::Finger =>
            {
                Some(contact)
            }
            _ => {
                trace!(?slot, "no bound stylus contact, dropping stylus event");
                None
            }
        }
    }

    /// Cancel every active contact, returns how many were cancelled
    pub fn cancel_all(
        &mut self,
        cx: &mut DispatchContext<'_>,
        touches: &[TouchDelegate],
        pointers: &mut [PointerDelegate],
        time: Time<Monotonic>,
    ) -> usize {
        let span = self.span.clone();
        let _guard = span.enter();

        let contacts: Vec<TouchContact> =
            self.contacts.drain(..).map(|(_, contact)| contact).collect();
        self.surface_contacts.clear();

        let mut cancelled = SmallVec::<[&ClientId; 4]>::new();
        for contact in &contacts {
            match contact.route {
                TouchRoute::Native if !cancelled.contains(&&contact.client) => {
                    cancelled.push(&contact.client);
                    for touch in touches.iter().filter(|touch| touch.client() == &contact.client) {
                        touch.cancel(cx);
                    }
                }
                TouchRoute::Native => {}
                TouchRoute::Pointer => release_pointers(cx, pointers, contact, time),
            }
        }
        debug!(count = contacts.len(), "cancelled all touch contacts");
        contacts.len()
    }

    /// `surface` is about to be destroyed, forget its contact without notifying anyone
    pub fn on_surface_destroying(&mut self, surface: SurfaceId) {
        if let Some(slot) = self.surface_contacts.remove(&surface) {
            let _guard = self.span.enter();
            debug!(%surface, ?slot, "surface destroyed, forgetting its contact");
            self.contacts.shift_remove(&slot);
        }
    }

    fn forget(&mut self, slot: TouchSlot) -> Option<TouchContact> {
        let contact = self.contacts.shift_remove(&slot)?;
        self.surface_contacts.remove(&contact.surface);
        Some(contact)
    }
}

/// Release the synthesized button on every pointer that got the press
///
/// A pointer whose focus moved away is brought back to the contact surface first.
fn release_pointers(
    cx: &mut DispatchContext<'_>,
    pointers: &mut [PointerDelegate],
    contact: &TouchContact,
    time: Time<Monotonic>,
) {
    let pressed = pointers
        .iter_mut()
        .filter(|pointer| contact.pressed.contains(&pointer.object()));
    for pointer in pressed {
        if pointer.state().focus() != Some(contact.surface) {
            trace!(surface = %contact.surface, "pointer focus moved, entering before release");
            pointer.on_enter(cx, contact.surface, contact.location, MouseButtons::LEFT);
        }
        pointer.on_button(cx, time, MouseButtons::LEFT, false);
        pointer.on_frame(cx);
    }
}
