//! Input delegates and routing
//!
//! Every `wl_pointer` and `wl_touch` object a client binds is represented by a delegate.
//! A delegate only ever sends events to its own client. The [`Seat`] keeps all delegates
//! and fans the host events out to them:
//!
//! - pointer enter goes to every pointer whose client owns the entered surface,
//! - motion, button and scroll events go to the pointers that currently have a focus,
//! - a pointer frame goes to every pointer, which closes its pending group and flushes,
//! - touch events go through the [`TouchRouter`], which decides per contact whether
//!   the client gets native touch events or a synthesized pointer sequence.
//!
//! Delegates do not own any of the shared state they need. It is lent to them for the
//! duration of a single event through a [`DispatchContext`].

use tracing::{debug, trace};
use wayland_server::{
    backend::{ClientId, GlobalId, ObjectId},
    protocol::{
        wl_keyboard::{self, WlKeyboard},
        wl_pointer::{self, WlPointer},
        wl_seat::{self, WlSeat},
        wl_touch::{self, WlTouch},
    },
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::{
    backend::input::{MouseButtons, PointerType, Propagation, TouchSlot},
    utils::{Logical, Monotonic, Point, SerialTracker, Time},
};

use super::{
    display::DisplayState,
    surface::{SurfaceId, SurfaceMap},
};

mod pointer;
mod touch;

pub use self::{
    pointer::{PointerDelegate, PointerState, AXIS_STEP_DISTANCE},
    touch::{TouchContact, TouchDelegate, TouchRoute, TouchRouter},
};

const SEAT_VERSION: u32 = 8;
const SEAT_NAME: &str = "seat0";

/// Shared state lent to the delegates while an event is dispatched
#[derive(Debug)]
pub struct DispatchContext<'a> {
    /// Serial source of the display
    pub serials: &'a mut SerialTracker,
    /// Live surfaces
    pub surfaces: &'a SurfaceMap,
    /// Handle of the display the events are sent through
    pub handle: &'a DisplayHandle,
}

impl DispatchContext<'_> {
    /// Write out everything buffered for `client`
    ///
    /// A client whose buffer cannot take any more is disconnected by the display.
    pub fn flush(&self, client: &ClientId) {
        if let Err(err) = self.handle.backend_handle().flush(Some(client.clone())) {
            trace!(?client, ?err, "client not flushed");
        }
    }
}

/// Kind of input object a delegate serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelegateKind {
    /// A `wl_pointer`
    Pointer,
    /// A `wl_touch`
    Touch,
}

/// Common interface of the per-object input delegates
pub trait InputDelegate {
    /// Kind of object this delegate serves
    fn kind(&self) -> DelegateKind;

    /// Client owning the object
    fn client(&self) -> &ClientId;

    /// The protocol object events are sent to
    fn object(&self) -> ObjectId;

    /// Can this delegate receive events targeted at `surface`
    ///
    /// Only surfaces of the delegate's own client are accepted.
    fn can_accept(&self, surfaces: &SurfaceMap, surface: SurfaceId) -> bool {
        surfaces.owner(surface) == Some(self.client())
    }

    /// `surface` is about to be destroyed, forget every reference to it
    fn on_surface_destroying(&mut self, surface: SurfaceId);
}

/// All input delegates of a display
#[derive(Debug)]
pub struct Seat {
    pointers: Vec<PointerDelegate>,
    touches: Vec<TouchDelegate>,
    router: TouchRouter,
}

impl Seat {
    /// Create an empty seat
    ///
    /// With `synthesize_pointer` set, touch contacts on clients without a `wl_touch`
    /// are delivered as pointer events.
    pub fn new(synthesize_pointer: bool) -> Seat {
        Seat {
            pointers: Vec::new(),
            touches: Vec::new(),
            router: TouchRouter::new(synthesize_pointer),
        }
    }

    /// Add a pointer delegate
    pub fn add_pointer(&mut self, pointer: PointerDelegate) {
        self.pointers.push(pointer);
    }

    /// Add a touch delegate
    pub fn add_touch(&mut self, touch: TouchDelegate) {
        self.touches.push(touch);
    }

    /// Drop the delegate of a destroyed `wl_pointer`
    pub fn remove_pointer(&mut self, object: &ObjectId) -> bool {
        let before = self.pointers.len();
        self.pointers.retain(|pointer| &pointer.object() != object);
        before != self.pointers.len()
    }

    /// Drop the delegate of a destroyed `wl_touch`
    pub fn remove_touch(&mut self, object: &ObjectId) -> bool {
        let before = self.touches.len();
        self.touches.retain(|touch| &touch.object() != object);
        before != self.touches.len()
    }

    /// The pointer delegate of `object`
    pub fn pointer(&self, object: &ObjectId) -> Option<&PointerDelegate> {
        self.pointers.iter().find(|pointer| &pointer.object() == object)
    }

    /// Mutable access to the pointer delegate of `object`
    pub fn pointer_mut(&mut self, object: &ObjectId) -> Option<&mut PointerDelegate> {
        self.pointers
            .iter_mut()
            .find(|pointer| &pointer.object() == object)
    }

    /// Mutable access to the touch delegate of `object`
    pub fn touch_mut(&mut self, object: &ObjectId) -> Option<&mut TouchDelegate> {
        self.touches.iter_mut().find(|touch| &touch.object() == object)
    }

    /// Iterate over the pointer delegates
    pub fn pointers(&self) -> impl Iterator<Item = &PointerDelegate> {
        self.pointers.iter()
    }

    /// Iterate over the touch delegates
    pub fn touches(&self) -> impl Iterator<Item = &TouchDelegate> {
        self.touches.iter()
    }

    /// Iterate over all delegates
    pub fn delegates(&self) -> impl Iterator<Item = &dyn InputDelegate> {
        self.pointers
            .iter()
            .map(|pointer| pointer as &dyn InputDelegate)
            .chain(self.touches.iter().map(|touch| touch as &dyn InputDelegate))
    }

    fn delegates_mut(&mut self) -> impl Iterator<Item = &mut dyn InputDelegate> {
        self.pointers
            .iter_mut()
            .map(|pointer| pointer as &mut dyn InputDelegate)
            .chain(
                self.touches
                    .iter_mut()
                    .map(|touch| touch as &mut dyn InputDelegate),
            )
    }

    /// The touch router
    pub fn touch_router(&self) -> &TouchRouter {
        &self.router
    }

    /// The pointer entered `surface`
    pub fn pointer_enter(
        &mut self,
        cx: &mut DispatchContext<'_>,
        surface: SurfaceId,
        location: Point<f64, Logical>,
        buttons: MouseButtons,
    ) {
        for pointer in &mut self.pointers {
            if pointer.can_accept(cx.surfaces, surface) {
                pointer.on_enter(cx, surface, location, buttons);
            }
        }
    }

    /// The pointer left `surface`
    pub fn pointer_leave(&mut self, cx: &mut DispatchContext<'_>, surface: SurfaceId) {
        for pointer in &mut self.pointers {
            if pointer.state().focus() == Some(surface) {
                pointer.on_leave(cx, surface);
            }
        }
    }

    /// The pointer moved on the focused surface
    pub fn pointer_motion(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        location: Point<f64, Logical>,
    ) {
        for pointer in self.focused_pointers() {
            pointer.on_motion(cx, time, location);
        }
    }

    /// Buttons were pressed or released
    pub fn pointer_button(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        buttons: MouseButtons,
        pressed: bool,
    ) {
        for pointer in self.focused_pointers() {
            pointer.on_button(cx, time, buttons, pressed);
        }
    }

    /// Scroll on the focused surface
    pub fn pointer_scroll(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        offset: Point<f64, Logical>,
        discrete: bool,
    ) {
        for pointer in self.focused_pointers() {
            pointer.on_scroll(cx, time, offset, discrete);
        }
    }

    /// A scroll sequence ended
    pub fn pointer_scroll_stop(&mut self, cx: &mut DispatchContext<'_>, time: Time<Monotonic>) {
        for pointer in self.focused_pointers() {
            pointer.on_scroll_stop(cx, time);
        }
    }

    /// Close the current group of pointer events
    ///
    /// Every pointer flushes its client, the `frame` itself is only sent by pointers
    /// that have sent events since their last frame.
    pub fn pointer_frame(&mut self, cx: &mut DispatchContext<'_>) {
        for pointer in &mut self.pointers {
            pointer.on_frame(cx);
        }
    }

    fn focused_pointers(&mut self) -> impl Iterator<Item = &mut PointerDelegate> {
        self.pointers
            .iter_mut()
            .filter(|pointer| pointer.state().focus().is_some())
    }

    /// A touch contact went down on `surface`
    pub fn touch_down(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        slot: TouchSlot,
        surface: SurfaceId,
        location: Point<f64, Logical>,
        pointer_type: PointerType,
    ) -> Propagation {
        self.router.down(
            cx,
            &self.touches,
            &mut self.pointers,
            time,
            slot,
            surface,
            location,
            pointer_type,
        )
    }

    /// A touch contact moved
    pub fn touch_motion(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        slot: TouchSlot,
        location: Point<f64, Logical>,
        pointer_type: PointerType,
    ) -> Propagation {
        self.router.motion(
            cx,
            &self.touches,
            &mut self.pointers,
            time,
            slot,
            location,
            pointer_type,
        )
    }

    /// A touch contact was lifted
    pub fn touch_up(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        slot: TouchSlot,
    ) -> Propagation {
        self.router.up(cx, &self.touches, &mut self.pointers, time, slot)
    }

    /// A touch contact was cancelled by the host
    pub fn touch_cancel(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        slot: TouchSlot,
    ) -> Propagation {
        self.router.cancel(cx, &self.touches, &mut self.pointers, time, slot)
    }

    /// Pressure of a touch contact changed
    pub fn touch_force(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        slot: TouchSlot,
        force: f64,
    ) -> Propagation {
        self.router.force(cx, &self.touches, time, slot, force)
    }

    /// Tilt of a touch contact changed
    pub fn touch_tilt(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        slot: TouchSlot,
        tilt: Point<f64, Logical>,
    ) -> Propagation {
        self.router.tilt(cx, &self.touches, time, slot, tilt)
    }

    /// Cancel every active touch contact
    pub fn cancel_all_touches(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
    ) -> usize {
        self.router
            .cancel_all(cx, &self.touches, &mut self.pointers, time)
    }

    /// `surface` is about to be destroyed
    pub fn surface_destroying(&mut self, surface: SurfaceId) {
        for delegate in self.delegates_mut() {
            delegate.on_surface_destroying(surface);
        }
        self.router.on_surface_destroying(surface);
    }
}

pub(crate) fn create_global(handle: &DisplayHandle) -> GlobalId {
    handle.create_global::<DisplayState, WlSeat, ()>(SEAT_VERSION, ())
}

impl GlobalDispatch<WlSeat, ()> for DisplayState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        client: &Client,
        resource: New<WlSeat>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let seat = data_init.init(resource, ());
        seat.capabilities(wl_seat::Capability::Pointer | wl_seat::Capability::Touch);
        if seat.version() >= wl_seat::EVT_NAME_SINCE {
            seat.name(SEAT_NAME.into());
        }
        debug!(client = ?client.id(), version = seat.version(), "seat bound");
    }
}

impl Dispatch<WlSeat, ()> for DisplayState {
    fn request(
        state: &mut Self,
        client: &Client,
        _seat: &WlSeat,
        request: wl_seat::Request,
        _data: &(),
        _dh: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_seat::Request::GetPointer { id } => {
                let pointer = data_init.init(id, ());
                state.seat.add_pointer(PointerDelegate::new(client.id(), pointer));
            }
            wl_seat::Request::GetTouch { id } => {
                let touch = data_init.init(id, ());
                state.seat.add_touch(TouchDelegate::new(client.id(), touch));
            }
            wl_seat::Request::GetKeyboard { id } => {
                // no keyboard input is delivered
                data_init.init(id, ());
            }
            wl_seat::Request::Release => {}
            _ => unreachable!(),
        }
    }
}

impl Dispatch<WlPointer, ()> for DisplayState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _pointer: &WlPointer,
        request: wl_pointer::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            // the cursor is drawn by the host
            wl_pointer::Request::SetCursor { .. } => {}
            wl_pointer::Request::Release => {}
            _ => unreachable!(),
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, pointer: &WlPointer, _data: &()) {
        if state.seat.remove_pointer(&pointer.id()) {
            trace!(object = %pointer.id(), "pointer destroyed");
        }
    }
}

impl Dispatch<WlTouch, ()> for DisplayState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _touch: &WlTouch,
        request: wl_touch::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_touch::Request::Release => {}
            _ => unreachable!(),
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, touch: &WlTouch, _data: &()) {
        if state.seat.remove_touch(&touch.id()) {
            trace!(object = %touch.id(), "touch destroyed");
        }
    }
}

impl Dispatch<WlKeyboard, ()> for DisplayState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _keyboard: &WlKeyboard,
        request: wl_keyboard::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_keyboard::Request::Release => {}
            _ => unreachable!(),
        }
    }
}
