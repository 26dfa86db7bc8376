//! `zwp_input_timestamps_manager_v1` global
//!
//! A client subscribes per input object. The resulting `zwp_input_timestamps_v1` is
//! handed to the matching delegate, which then precedes every timed event with a
//! `timestamp` carrying the full resolution of the host clock. Keyboard subscriptions
//! are accepted but stay silent, the bridge does not deliver keyboard input.

pub use generated::{zwp_input_timestamps_manager_v1, zwp_input_timestamps_v1};

#[allow(non_upper_case_globals, non_snake_case, non_camel_case_types)]
mod generated {
    use wayland_server::{self, protocol::*};

    pub mod __interfaces {
        use wayland_backend;
        use wayland_server::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("protocols/input-timestamps-unstable-v1.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_server_code!("protocols/input-timestamps-unstable-v1.xml");
}

use tracing::trace;
use wayland_server::{
    backend::{ClientId, GlobalId, ObjectId},
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use self::{
    zwp_input_timestamps_manager_v1::ZwpInputTimestampsManagerV1,
    zwp_input_timestamps_v1::ZwpInputTimestampsV1,
};
use crate::wayland::display::DisplayState;

const MANAGER_VERSION: u32 = 1;

/// Input object a timestamps subscription belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampsTarget {
    /// A `wl_keyboard`, never receives timestamps
    Keyboard,
    /// A `wl_pointer`
    Pointer(ObjectId),
    /// A `wl_touch`
    Touch(ObjectId),
}

pub(crate) fn create_global(handle: &DisplayHandle) -> GlobalId {
    handle.create_global::<DisplayState, ZwpInputTimestampsManagerV1, ()>(MANAGER_VERSION, ())
}

impl GlobalDispatch<ZwpInputTimestampsManagerV1, ()> for DisplayState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<ZwpInputTimestampsManagerV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<ZwpInputTimestampsManagerV1, ()> for DisplayState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _manager: &ZwpInputTimestampsManagerV1,
        request: zwp_input_timestamps_manager_v1::Request,
        _data: &(),
        _dh: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            zwp_input_timestamps_manager_v1::Request::GetKeyboardTimestamps { id, .. } => {
                data_init.init(id, TimestampsTarget::Keyboard);
            }
            zwp_input_timestamps_manager_v1::Request::GetPointerTimestamps { id, pointer } => {
                let timestamps = data_init.init(id, TimestampsTarget::Pointer(pointer.id()));
                if let Some(delegate) = state.seat.pointer_mut(&pointer.id()) {
                    delegate.set_input_timestamps(Some(timestamps));
                }
            }
            zwp_input_timestamps_manager_v1::Request::GetTouchTimestamps { id, touch } => {
                let timestamps = data_init.init(id, TimestampsTarget::Touch(touch.id()));
                if let Some(delegate) = state.seat.touch_mut(&touch.id()) {
                    delegate.set_input_timestamps(Some(timestamps));
                }
            }
            zwp_input_timestamps_manager_v1::Request::Destroy => {}
        }
    }
}

impl Dispatch<ZwpInputTimestampsV1, TimestampsTarget> for DisplayState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _timestamps: &ZwpInputTimestampsV1,
        request: zwp_input_timestamps_v1::Request,
        _data: &TimestampsTarget,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            zwp_input_timestamps_v1::Request::Destroy => {}
        }
    }

    fn destroyed(
        state: &mut Self,
        _client: ClientId,
        timestamps: &ZwpInputTimestampsV1,
        data: &TimestampsTarget,
    ) {
        let subscribed = |current: Option<&ZwpInputTimestampsV1>| current == Some(timestamps);
        match data {
            TimestampsTarget::Keyboard => {}
            TimestampsTarget::Pointer(object) => {
                if let Some(delegate) = state.seat.pointer_mut(object) {
                    if subscribed(delegate.input_timestamps()) {
                        delegate.set_input_timestamps(None);
                    }
                }
            }
            TimestampsTarget::Touch(object) => {
                if let Some(delegate) = state.seat.touch_mut(object) {
                    if subscribed(delegate.input_timestamps()) {
                        delegate.set_input_timestamps(None);
                    }
                }
            }
        }
        trace!(object = %timestamps.id(), "input timestamps destroyed");
    }
}
