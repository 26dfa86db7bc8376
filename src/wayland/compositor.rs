//! `wl_compositor` global
//!
//! Clients create their surfaces here. The bridge does not handle buffers: attach,
//! damage and the like are the host's business and are ignored. What it does track is
//! the frame callbacks, so the host can tell a client when to draw its next frame
//! through [`Display::send_frame_callbacks`](super::display::Display::send_frame_callbacks).

use tracing::trace;
use wayland_server::{
    backend::{ClientId, GlobalId},
    protocol::{
        wl_callback::{self, WlCallback},
        wl_compositor::{self, WlCompositor},
        wl_region::{self, WlRegion},
        wl_surface::{self, WlSurface},
    },
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New,
};

use super::{display::DisplayState, surface::SurfaceId};

const COMPOSITOR_VERSION: u32 = 5;

pub(crate) fn create_global(handle: &DisplayHandle) -> GlobalId {
    handle.create_global::<DisplayState, WlCompositor, ()>(COMPOSITOR_VERSION, ())
}

impl GlobalDispatch<WlCompositor, ()> for DisplayState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<WlCompositor, ()> for DisplayState {
    fn request(
        state: &mut Self,
        client: &Client,
        _compositor: &WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dh: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                let surface = state
                    .surfaces
                    .insert_with(client.id(), |surface| data_init.init(id, surface));
                trace!(client = ?client.id(), %surface, "surface created");
            }
            wl_compositor::Request::CreateRegion { id } => {
                data_init.init(id, ());
            }
            _ => unreachable!(),
        }
    }
}

impl Dispatch<WlSurface, SurfaceId> for DisplayState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _surface: &WlSurface,
        request: wl_surface::Request,
        data: &SurfaceId,
        _dh: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_surface::Request::Frame { callback } => {
                let callback = data_init.init(callback, ());
                if let Some(surface) = state.surfaces.get_mut(*data) {
                    surface.pending_callbacks.push(callback);
                }
            }
            wl_surface::Request::Commit => {
                if let Some(surface) = state.surfaces.get_mut(*data) {
                    let pending = std::mem::take(&mut surface.pending_callbacks);
                    surface.frame_callbacks.extend(pending);
                }
            }
            // content is managed by the host
            _ => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, _surface: &WlSurface, data: &SurfaceId) {
        if let Err(err) = state.surface_destroying(*data) {
            trace!(%err, "surface was already destroyed by the host");
        }
    }
}

impl Dispatch<WlCallback, ()> for DisplayState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _callback: &WlCallback,
        _request: wl_callback::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl Dispatch<WlRegion, ()> for DisplayState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _region: &WlRegion,
        _request: wl_region::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}
