//! `zcr_stylus_v2` global
//!
//! Each `wl_touch` may be extended by one `zcr_touch_stylus_v2`. Asking for a second
//! one is a protocol error.

pub use generated::{zcr_stylus_v2, zcr_touch_stylus_v2};

#[allow(non_upper_case_globals, non_snake_case, non_camel_case_types)]
mod generated {
    use wayland_server::{self, protocol::*};

    pub mod __interfaces {
        use wayland_backend;
        use wayland_server::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("protocols/stylus-unstable-v2.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_server_code!("protocols/stylus-unstable-v2.xml");
}

use tracing::{debug, trace};
use wayland_server::{
    backend::{ClientId, GlobalId, ObjectId},
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use self::{zcr_stylus_v2::ZcrStylusV2, zcr_touch_stylus_v2::ZcrTouchStylusV2};
use crate::{backend::input::PointerType, wayland::display::DisplayState};

const STYLUS_VERSION: u32 = 1;

/// Stylus tool reported for a contact, `None` for plain touch
pub(crate) fn tool_type(pointer_type: PointerType) -> Option<zcr_touch_stylus_v2::ToolType> {
    match pointer_type {
        PointerType::Finger => None,
        PointerType::Pen => Some(zcr_touch_stylus_v2::ToolType::Pen),
        PointerType::Eraser => Some(zcr_touch_stylus_v2::ToolType::Eraser),
    }
}

pub(crate) fn create_global(handle: &DisplayHandle) -> GlobalId {
    handle.create_global::<DisplayState, ZcrStylusV2, ()>(STYLUS_VERSION, ())
}

impl GlobalDispatch<ZcrStylusV2, ()> for DisplayState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<ZcrStylusV2>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<ZcrStylusV2, ()> for DisplayState {
    fn request(
        state: &mut Self,
        _client: &Client,
        manager: &ZcrStylusV2,
        request: zcr_stylus_v2::Request,
        _data: &(),
        _dh: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            zcr_stylus_v2::Request::GetTouchStylus { id, touch } => {
                let stylus = data_init.init(id, touch.id());
                let Some(delegate) = state.seat.touch_mut(&touch.id()) else {
                    trace!(touch = %touch.id(), "touch is gone, stylus stays inert");
                    return;
                };
                if delegate.stylus().is_some() {
                    debug!(touch = %touch.id(), "touch already has a stylus");
                    manager.post_error(
                        zcr_stylus_v2::Error::TouchStylusExists,
                        "touch has already been associated with a stylus object",
                    );
                    return;
                }
                delegate.set_stylus(Some(stylus));
            }
        }
    }
}

impl Dispatch<ZcrTouchStylusV2, ObjectId> for DisplayState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _stylus: &ZcrTouchStylusV2,
        request: zcr_touch_stylus_v2::Request,
        _data: &ObjectId,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            zcr_touch_stylus_v2::Request::Destroy => {}
        }
    }

    fn destroyed(state: &mut Self, _client: ClientId, stylus: &ZcrTouchStylusV2, touch: &ObjectId) {
        if let Some(delegate) = state.seat.touch_mut(touch) {
            if delegate.stylus() == Some(stylus) {
                delegate.set_stylus(None);
            }
        }
    }
}
