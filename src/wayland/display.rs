//! The bridge-side display
//!
//! [`Display`] wraps the protocol display and owns the [`DisplayState`] every request
//! is dispatched to: the live surfaces, the serial tracker and the [`Seat`]. Clients
//! build their object graph through the globals created here, while the host feeds
//! [`InputEvent`]s and surface lifecycle notifications. Nothing here blocks, events are
//! buffered per client and written out on the next flush.

use std::{
    fmt, io,
    os::unix::{io::OwnedFd, net::UnixStream},
    sync::Arc,
};

use tracing::{debug, instrument, trace, warn};
use wayland_server::{
    backend::{ClientData, ClientId, DisconnectReason, InitError},
    Client, DisplayHandle,
};

use crate::{
    backend::input::{ButtonState, InputEvent, Propagation},
    utils::{Monotonic, SerialTracker, Time},
};

use super::{
    compositor,
    protocols::{input_timestamps, stylus},
    seat::{self, DispatchContext, Seat},
    surface::{SurfaceData, SurfaceId, SurfaceMap},
};

/// Errors of the host-side display management
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// The surface does not exist or was already destroyed
    #[error("unknown surface {0}")]
    UnknownSurface(SurfaceId),
    /// The protocol display could not be created
    #[error("failed to create the display")]
    Init(#[from] InitError),
    /// The client connection could not be registered
    #[error("failed to insert client")]
    InsertClient(#[source] io::Error),
}

/// Per-client data of the display
#[derive(Debug, Default)]
pub struct ClientState;

impl ClientData for ClientState {
    fn initialized(&self, client_id: ClientId) {
        debug!(client = ?client_id, "client connected");
    }

    fn disconnected(&self, client_id: ClientId, reason: DisconnectReason) {
        debug!(client = ?client_id, ?reason, "client disconnected");
    }
}

/// State all client requests are dispatched to
#[derive(Debug)]
pub struct DisplayState {
    pub(crate) surfaces: SurfaceMap,
    pub(crate) serials: SerialTracker,
    pub(crate) seat: Seat,
    handle: DisplayHandle,
}

impl DisplayState {
    pub(crate) fn split(&mut self) -> (&mut Seat, DispatchContext<'_>) {
        (
            &mut self.seat,
            DispatchContext {
                serials: &mut self.serials,
                surfaces: &self.surfaces,
                handle: &self.handle,
            },
        )
    }

    /// Drop every reference to `surface` and forget it
    ///
    /// Pointer focus and touch contacts on it are dropped without notifying the client.
    pub(crate) fn surface_destroying(
        &mut self,
        surface: SurfaceId,
    ) -> Result<SurfaceData, DisplayError> {
        if self.surfaces.get(surface).is_none() {
            return Err(DisplayError::UnknownSurface(surface));
        }
        self.seat.surface_destroying(surface);
        let data = self
            .surfaces
            .remove(surface)
            .ok_or(DisplayError::UnknownSurface(surface))?;
        trace!(%surface, "surface destroyed");
        Ok(data)
    }
}

/// Clients, surfaces and input delegates of the bridge
pub struct Display {
    display: wayland_server::Display<DisplayState>,
    pub(crate) state: DisplayState,
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Display {
    /// Create a display advertising the compositor, seat and input extension globals
    ///
    /// See [`Seat::new`] for `synthesize_pointer`.
    pub fn new(synthesize_pointer: bool) -> Result<Display, DisplayError> {
        let display = wayland_server::Display::<DisplayState>::new()?;
        let handle = display.handle();

        compositor::create_global(&handle);
        seat::create_global(&handle);
        input_timestamps::create_global(&handle);
        stylus::create_global(&handle);

        Ok(Display {
            display,
            state: DisplayState {
                surfaces: SurfaceMap::default(),
                serials: SerialTracker::default(),
                seat: Seat::new(synthesize_pointer),
                handle,
            },
        })
    }

    /// Handle to the protocol display
    pub fn handle(&self) -> DisplayHandle {
        self.display.handle()
    }

    /// Live surfaces
    pub fn surfaces(&self) -> &SurfaceMap {
        &self.state.surfaces
    }

    /// The serial tracker
    pub fn serials(&self) -> &SerialTracker {
        &self.state.serials
    }

    /// The input delegates
    pub fn seat(&self) -> &Seat {
        &self.state.seat
    }

    /// Register a new client connection
    pub fn insert_client(&mut self, stream: UnixStream) -> Result<Client, DisplayError> {
        self.display
            .handle()
            .insert_client(stream, Arc::new(ClientState))
            .map_err(DisplayError::InsertClient)
    }

    /// Number of connected clients
    ///
    /// Clients disconnected for a protocol error or an overflowing buffer are not counted.
    pub fn client_count(&self) -> usize {
        let mut count = 0;
        self.display
            .handle()
            .backend_handle()
            .with_all_clients(|_| count += 1);
        count
    }

    /// Duplicate of the fd that becomes readable when clients sent requests
    pub fn poll_fd(&mut self) -> io::Result<OwnedFd> {
        self.display.backend().poll_fd().try_clone_to_owned()
    }

    /// Read and dispatch the pending requests of all clients
    pub fn dispatch_clients(&mut self) -> io::Result<usize> {
        self.display.dispatch_clients(&mut self.state)
    }

    /// Write out everything buffered for every client
    pub fn flush_clients(&mut self) {
        if let Err(err) = self.display.flush_clients() {
            warn!(?err, "failed to flush clients");
        }
    }

    /// `surface` is being destroyed by the host
    ///
    /// Pointer focus and touch contacts on it are dropped without notifying the client.
    /// The client's `wl_surface` stays valid, but no more input is sent for it.
    pub fn surface_destroying(&mut self, surface: SurfaceId) -> Result<(), DisplayError> {
        self.state.surface_destroying(surface).map(|_| ())
    }

    /// Signal every committed frame callback of `surface`, returns how many were sent
    ///
    /// The callbacks are buffered with the other events of the client.
    pub fn send_frame_callbacks(
        &mut self,
        surface: SurfaceId,
        time: Time<Monotonic>,
    ) -> Result<usize, DisplayError> {
        let data = self
            .state
            .surfaces
            .get_mut(surface)
            .ok_or(DisplayError::UnknownSurface(surface))?;
        let callbacks = std::mem::take(&mut data.frame_callbacks);
        for callback in &callbacks {
            callback.done(time.as_millis());
        }
        Ok(callbacks.len())
    }

    /// Route a host input event to the clients
    #[instrument(level = "trace", skip(self), ret)]
    pub fn process_input_event(&mut self, event: InputEvent) -> Propagation {
        let (seat, mut cx) = self.state.split();
        match event {
            InputEvent::PointerEnter {
                surface,
                location,
                buttons,
            } => seat.pointer_enter(&mut cx, surface, location, buttons),
            InputEvent::PointerLeave { surface } => seat.pointer_leave(&mut cx, surface),
            InputEvent::PointerMotion { time, location } => {
                seat.pointer_motion(&mut cx, time, location)
            }
            InputEvent::PointerButton {
                time,
                buttons,
                state,
            } => seat.pointer_button(&mut cx, time, buttons, state == ButtonState::Pressed),
            InputEvent::PointerAxis {
                time,
                offset,
                discrete,
            } => seat.pointer_scroll(&mut cx, time, offset, discrete),
            InputEvent::PointerAxisStop { time } => seat.pointer_scroll_stop(&mut cx, time),
            InputEvent::PointerFrame => seat.pointer_frame(&mut cx),
            InputEvent::TouchDown {
                time,
                slot,
                surface,
                location,
                pointer_type,
            } => return seat.touch_down(&mut cx, time, slot, surface, location, pointer_type),
            InputEvent::TouchMotion {
                time,
                slot,
                location,
                pointer_type,
            } => return seat.touch_motion(&mut cx, time, slot, location, pointer_type),
            InputEvent::TouchUp { time, slot } => return seat.touch_up(&mut cx, time, slot),
            InputEvent::TouchCancel { time, slot } => {
                return seat.touch_cancel(&mut cx, time, slot)
            }
            InputEvent::TouchForce { time, slot, force } => {
                return seat.touch_force(&mut cx, time, slot, force)
            }
            InputEvent::TouchTilt { time, slot, tilt } => {
                return seat.touch_tilt(&mut cx, time, slot, tilt)
            }
        }
        Propagation::Continue
    }

    /// Cancel all active touch contacts, returns how many were cancelled
    pub fn cancel_all_touches(&mut self, time: Time<Monotonic>) -> usize {
        let (seat, mut cx) = self.state.split();
        seat.cancel_all_touches(&mut cx, time)
    }
}
