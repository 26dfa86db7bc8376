use tracing::{info_span, trace};
use wayland_server::{
    backend::{ClientId, ObjectId},
    protocol::wl_pointer::{self, WlPointer},
    Resource,
};

use super::{DelegateKind, DispatchContext, InputDelegate};
use crate::{
    backend::input::{MouseButtons, BUTTON_CODES},
    utils::{Logical, Monotonic, Point, SerialCategory, Time},
    wayland::{
        protocols::input_timestamps::zwp_input_timestamps_v1::ZwpInputTimestampsV1,
        surface::SurfaceId,
    },
};

/// Host scroll distance of one wheel click
const HOST_SCROLL_UNIT: f64 = 16.0;
/// Protocol scroll distance of one wheel click
///
/// Many toolkits only scroll by multiples of 5 units.
const WAYLAND_SCROLL_UNIT: f64 = 5.0;
/// Multiplying by this converts host scroll units to protocol units
pub const AXIS_STEP_DISTANCE: f64 = WAYLAND_SCROLL_UNIT / HOST_SCROLL_UNIT;

const AXES: [(usize, wl_pointer::Axis); 2] = [
    (0, wl_pointer::Axis::HorizontalScroll),
    (1, wl_pointer::Axis::VerticalScroll),
];

/// Per-connection pointer state
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PointerState {
    focus: Option<SurfaceId>,
    /// Fractional wheel steps not yet reported, horizontal then vertical
    discrete_remainder: [f64; 2],
    last_discrete: bool,
    frame_pending: bool,
}

impl PointerState {
    /// The surface this pointer is currently on
    pub fn focus(&self) -> Option<SurfaceId> {
        self.focus
    }

    /// Fractional wheel steps carried to the next discrete scroll
    pub fn discrete_remainder(&self) -> (f64, f64) {
        (self.discrete_remainder[0], self.discrete_remainder[1])
    }

    /// Was the last scroll event discrete
    pub fn last_discrete(&self) -> bool {
        self.last_discrete
    }

    /// Were events sent since the last frame
    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }
}

/// Translates host pointer events into events of one `wl_pointer`
///
/// The delegate only ever talks to its own client: events addressed to surfaces of other
/// clients are dropped, as are events that need a focus while there is none.
#[derive(Debug)]
pub struct PointerDelegate {
    pointer: WlPointer,
    client: ClientId,
    timestamps: Option<ZwpInputTimestampsV1>,
    state: PointerState,
    span: tracing::Span,
}

impl PointerDelegate {
    /// Create a delegate for `pointer`, owned by `client`
    pub fn new(client: ClientId, pointer: WlPointer) -> PointerDelegate {
        let span = info_span!(
            "wayland_pointer",
            ?client,
            object = %pointer.id(),
            version = pointer.version()
        );
        PointerDelegate {
            pointer,
            client,
            timestamps: None,
            state: PointerState::default(),
            span,
        }
    }

    /// Negotiated protocol version
    pub fn version(&self) -> u32 {
        self.pointer.version()
    }

    /// Current state of the pointer
    pub fn state(&self) -> &PointerState {
        &self.state
    }

    /// The input timestamps subscription of this pointer
    pub fn input_timestamps(&self) -> Option<&ZwpInputTimestampsV1> {
        self.timestamps.as_ref()
    }

    /// Set the input timestamps subscription
    ///
    /// When set, every timed event is preceded by a high resolution timestamp.
    pub fn set_input_timestamps(&mut self, timestamps: Option<ZwpInputTimestampsV1>) {
        self.timestamps = timestamps;
    }

    /// The pointer entered `surface` at the surface-local `location`
    pub fn on_enter(
        &mut self,
        cx: &mut DispatchContext<'_>,
        surface: SurfaceId,
        location: Point<f64, Logical>,
        buttons: MouseButtons,
    ) {
        let span = self.span.clone();
        let _guard = span.enter();

        let Some(resource) = cx.surfaces.surface_for(&self.client, surface).cloned() else {
            trace!(%surface, "surface not owned by this client, dropping enter");
            return;
        };
        if self.state.focus == Some(surface) {
            trace!(%surface, "already focused, dropping enter");
            return;
        }
        if let Some(previous) = self.state.focus {
            self.on_leave(cx, previous);
        }

        trace!(%surface, ?location, ?buttons, "pointer enter");
        let serial = cx.serials.next_serial(SerialCategory::PointerEnter);
        self.pointer
            .enter(serial.into(), &resource, location.x, location.y);
        self.state.frame_pending = true;
        self.state.focus = Some(surface);
    }

    /// The pointer left `surface`
    pub fn on_leave(&mut self, cx: &mut DispatchContext<'_>, surface: SurfaceId) {
        let span = self.span.clone();
        let _guard = span.enter();

        if self.state.focus != Some(surface) {
            trace!(%surface, "surface is not focused, dropping leave");
            return;
        }
        self.state.focus = None;
        self.reset_scroll();

        let Some(resource) = cx.surfaces.surface_for(&self.client, surface) else {
            return;
        };
        let serial = cx.serials.next_serial(SerialCategory::PointerLeave);
        self.pointer.leave(serial.into(), resource);
        self.state.frame_pending = true;
    }

    /// The pointer moved to the surface-local `location` on the focused surface
    pub fn on_motion(
        &mut self,
        _cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        location: Point<f64, Logical>,
    ) {
        let span = self.span.clone();
        let _guard = span.enter();

        if self.state.focus.is_none() {
            trace!("no focus, dropping motion");
            return;
        }
        self.send_timestamp(time);
        self.pointer.motion(time.as_millis(), location.x, location.y);
        self.state.frame_pending = true;
    }

    /// The `buttons` were pressed or released
    ///
    /// One `button` event is sent per button, each with its own serial.
    pub fn on_button(
        &mut self,
        cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        buttons: MouseButtons,
        pressed: bool,
    ) {
        let span = self.span.clone();
        let _guard = span.enter();

        if self.state.focus.is_none() {
            trace!(?buttons, "no focus, dropping button");
            return;
        }
        let (category, state) = if pressed {
            (SerialCategory::PointerButtonDown, wl_pointer::ButtonState::Pressed)
        } else {
            (SerialCategory::PointerButtonUp, wl_pointer::ButtonState::Released)
        };
        for (_, button) in BUTTON_CODES.iter().filter(|(flag, _)| buttons.contains(*flag)) {
            self.send_timestamp(time);
            let serial = cx.serials.next_serial(category);
            self.pointer
                .button(serial.into(), time.as_millis(), *button, state);
            self.state.frame_pending = true;
        }
    }

    /// Scroll by `offset`, in host units, on the focused surface
    ///
    /// Discrete events for both axes are always sent before the continuous ones.
    pub fn on_scroll(
        &mut self,
        _cx: &mut DispatchContext<'_>,
        time: Time<Monotonic>,
        offset: Point<f64, Logical>,
        discrete: bool,
    ) {
        let span = self.span.clone();
        let _guard = span.enter();

        if self.state.focus.is_none() {
            trace!(?offset, "no focus, dropping scroll");
            return;
        }
        let version = self.version();

        if version >= wl_pointer::EVT_AXIS_SOURCE_SINCE {
            self.pointer.axis_source(if discrete {
                wl_pointer::AxisSource::Wheel
            } else {
                wl_pointer::AxisSource::Finger
            });
        }

        let value = offset * AXIS_STEP_DISTANCE;
        let values = [value.x, value.y];

        if !discrete {
            self.state.discrete_remainder = [0.0; 2];
        } else if version >= wl_pointer::EVT_AXIS_DISCRETE_SINCE {
            for (index, axis) in AXES {
                let steps = values[index] / WAYLAND_SCROLL_UNIT;
                if version >= wl_pointer::EVT_AXIS_VALUE120_SINCE {
                    self.pointer
                        .axis_value120(axis, (steps * 120.0).round() as i32);
                } else {
                    let steps = self.state.discrete_remainder[index] + steps;
                    let whole = steps.trunc();
                    self.state.discrete_remainder[index] = steps - whole;
                    self.pointer.axis_discrete(axis, whole as i32);
                }
            }
        }
        self.state.last_discrete = discrete;

        for (index, axis) in AXES {
            self.send_timestamp(time);
            self.pointer.axis(time.as_millis(), axis, values[index]);
        }
        self.state.frame_pending = true;
    }

    /// A scroll sequence ended
    pub fn on_scroll_stop(&mut self, _cx: &mut DispatchContext<'_>, time: Time<Monotonic>) {
        let span = self.span.clone();
        let _guard = span.enter();

        if self.state.focus.is_none() {
            trace!("no focus, dropping scroll stop");
            return;
        }
        self.reset_scroll();
        if self.version() < wl_pointer::EVT_AXIS_STOP_SINCE {
            return;
        }
        for (_, axis) in AXES {
            self.send_timestamp(time);
            self.pointer.axis_stop(time.as_millis(), axis);
        }
        self.state.frame_pending = true;
    }

    /// Close the group of events sent since the last frame and flush the client
    ///
    /// The `frame` event is only sent when something was sent since the previous one,
    /// the flush always happens.
    pub fn on_frame(&mut self, cx: &mut DispatchContext<'_>) {
        let span = self.span.clone();
        let _guard = span.enter();

        if self.state.frame_pending && self.version() >= wl_pointer::EVT_FRAME_SINCE {
            self.pointer.frame();
        }
        self.state.frame_pending = false;
        cx.flush(&self.client);
    }

    fn reset_scroll(&mut self) {
        self.state.discrete_remainder = [0.0; 2];
        self.state.last_discrete = false;
    }

    fn send_timestamp(&self, time: Time<Monotonic>) {
        if let Some(timestamps) = &self.timestamps {
            let (tv_sec_hi, tv_sec_lo, tv_nsec) = time.as_split_timespec();
            timestamps.timestamp(tv_sec_hi, tv_sec_lo, tv_nsec);
        }
    }
}

impl InputDelegate for PointerDelegate {
    fn kind(&self) -> DelegateKind {
        DelegateKind::Pointer
    }

    fn client(&self) -> &ClientId {
        &self.client
    }

    fn object(&self) -> ObjectId {
        self.pointer.id()
    }

    fn on_surface_destroying(&mut self, surface: SurfaceId) {
        if self.state.focus == Some(surface) {
            let _guard = self.span.enter();
            trace!(%surface, "focused surface destroyed");
            self.state.focus = None;
            self.state.discrete_remainder = [0.0; 2];
            self.state.last_discrete = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        backend::input::{ButtonState, InputEvent},
        utils::{Serial, SerialTracker},
        wayland::{
            display::Display,
            testing::{Arg, TestClient},
        },
    };

    fn at(millis: u64) -> Time<Monotonic> {
        Time::from(Duration::from_millis(millis))
    }

    /// A display with one client owning one surface and a pointer bound at `version`
    fn setup(version: u32) -> (Display, TestClient, SurfaceId, u32) {
        let mut display = Display::new(true).unwrap();
        display.state.serials = SerialTracker::starting_at(100);
        let mut client = TestClient::connect(&mut display);
        let (object, surface) = client.create_surface(&mut display);
        client.pointer(&mut display, version);
        (display, client, surface, object.protocol_id())
    }

    fn with_pointer(
        display: &mut Display,
        f: impl FnOnce(&mut PointerDelegate, &mut DispatchContext<'_>),
    ) {
        let (seat, mut cx) = display.state.split();
        f(&mut seat.pointers[0], &mut cx);
    }

    fn enter(display: &mut Display, surface: SurfaceId) {
        display.process_input_event(InputEvent::PointerEnter {
            surface,
            location: (0.0, 0.0).into(),
            buttons: MouseButtons::empty(),
        });
    }

    fn state(display: &Display) -> PointerState {
        display.seat().pointers().next().unwrap().state().clone()
    }

    #[test]
    fn enter_motion_button_leave_sequence() {
        let (mut display, mut client, surface, object) = setup(7);

        display.process_input_event(InputEvent::PointerEnter {
            surface,
            location: (1.0, 2.0).into(),
            buttons: MouseButtons::empty(),
        });
        display.process_input_event(InputEvent::PointerMotion {
            time: at(10),
            location: (10.0, 10.0).into(),
        });
        for (millis, state) in [(11, ButtonState::Pressed), (12, ButtonState::Released)] {
            display.process_input_event(InputEvent::PointerButton {
                time: at(millis),
                buttons: MouseButtons::LEFT,
                state,
            });
        }
        display.process_input_event(InputEvent::PointerLeave { surface });
        display.process_input_event(InputEvent::PointerFrame);
        client.roundtrip(&mut display);

        let events: Vec<(String, Vec<Arg>)> = client
            .take_events()
            .into_iter()
            .map(|event| (event.label(), event.args))
            .collect();
        let expected = vec![
            (
                "wl_pointer.enter",
                vec![Arg::Uint(100), Arg::Object(object), Arg::Fixed(1.0), Arg::Fixed(2.0)],
            ),
            (
                "wl_pointer.motion",
                vec![Arg::Uint(10), Arg::Fixed(10.0), Arg::Fixed(10.0)],
            ),
            (
                "wl_pointer.button",
                vec![Arg::Uint(101), Arg::Uint(11), Arg::Uint(0x110), Arg::Uint(1)],
            ),
            (
                "wl_pointer.button",
                vec![Arg::Uint(102), Arg::Uint(12), Arg::Uint(0x110), Arg::Uint(0)],
            ),
            ("wl_pointer.leave", vec![Arg::Uint(103), Arg::Object(object)]),
            ("wl_pointer.frame", vec![]),
        ];
        let expected: Vec<(String, Vec<Arg>)> = expected
            .into_iter()
            .map(|(label, args)| (label.to_owned(), args))
            .collect();
        assert_eq!(events, expected);
        assert_eq!(state(&display).focus(), None);
        assert_eq!(
            display.serials().last_serial(SerialCategory::PointerLeave),
            Some(Serial::from(103))
        );
    }

    #[test]
    fn surfaces_of_other_clients_are_rejected() {
        let (mut display, mut client, own, _) = setup(5);
        let mut other = TestClient::connect(&mut display);
        let (_, foreign) = other.create_surface(&mut display);

        with_pointer(&mut display, |pointer, cx| {
            assert!(pointer.can_accept(cx.surfaces, own));
            assert!(!pointer.can_accept(cx.surfaces, foreign));

            pointer.on_enter(cx, foreign, (0.0, 0.0).into(), MouseButtons::empty());
            pointer.on_motion(cx, at(1), (1.0, 1.0).into());
            pointer.on_button(cx, at(2), MouseButtons::RIGHT, true);
            pointer.on_frame(cx);
        });
        client.roundtrip(&mut display);
        other.roundtrip(&mut display);

        assert!(client.take_events().is_empty());
        assert!(other.take_events().is_empty());
        assert_eq!(state(&display).focus(), None);
    }

    #[test]
    fn button_mask_sends_one_event_per_button() {
        let (mut display, mut client, surface, _) = setup(5);
        enter(&mut display, surface);
        display.process_input_event(InputEvent::PointerButton {
            time: at(5),
            buttons: MouseButtons::BACK | MouseButtons::MIDDLE | MouseButtons::RIGHT,
            state: ButtonState::Pressed,
        });
        client.roundtrip(&mut display);

        let buttons: Vec<Arg> = client
            .take_events()
            .into_iter()
            .filter(|event| event.name == "button")
            .map(|event| event.args[2].clone())
            .collect();
        assert_eq!(buttons, vec![Arg::Uint(0x111), Arg::Uint(0x112), Arg::Uint(0x116)]);
    }

    #[test]
    fn discrete_scroll_precedes_continuous_values() {
        let (mut display, mut client, surface, _) = setup(7);
        enter(&mut display, surface);
        client.roundtrip(&mut display);
        client.take_events();

        display.process_input_event(InputEvent::PointerAxis {
            time: at(40),
            offset: (0.0, -32.0).into(),
            discrete: true,
        });
        display.process_input_event(InputEvent::PointerFrame);
        client.roundtrip(&mut display);

        let events: Vec<(&str, Vec<Arg>)> = client
            .take_events()
            .into_iter()
            .map(|event| (event.name, event.args))
            .collect();
        assert_eq!(
            events,
            vec![
                ("axis_source", vec![Arg::Uint(0)]),
                ("axis_discrete", vec![Arg::Uint(0), Arg::Int(0)]),
                ("axis_discrete", vec![Arg::Uint(1), Arg::Int(-2)]),
                ("axis", vec![Arg::Uint(40), Arg::Uint(0), Arg::Fixed(0.0)]),
                ("axis", vec![Arg::Uint(40), Arg::Uint(1), Arg::Fixed(-10.0)]),
                ("frame", vec![]),
            ]
        );
    }

    #[test]
    fn scroll_ratio_is_five_sixteenths_on_both_axes() {
        let (mut display, mut client, surface, _) = setup(5);
        enter(&mut display, surface);
        for offset in [(16.0, 0.0), (-16.0, 0.0), (0.0, 16.0), (0.0, -16.0)] {
            display.process_input_event(InputEvent::PointerAxis {
                time: at(1),
                offset: offset.into(),
                discrete: false,
            });
        }
        client.roundtrip(&mut display);

        let values: Vec<(Arg, Arg)> = client
            .take_events()
            .into_iter()
            .filter(|event| event.name == "axis" && event.args[2] != Arg::Fixed(0.0))
            .map(|event| (event.args[1].clone(), event.args[2].clone()))
            .collect();
        assert_eq!(
            values,
            vec![
                (Arg::Uint(0), Arg::Fixed(5.0)),
                (Arg::Uint(0), Arg::Fixed(-5.0)),
                (Arg::Uint(1), Arg::Fixed(5.0)),
                (Arg::Uint(1), Arg::Fixed(-5.0)),
            ]
        );
    }

    #[test]
    fn fractional_wheel_steps_carry_over() {
        let (mut display, mut client, surface, _) = setup(5);
        enter(&mut display, surface);

        let half_click = InputEvent::PointerAxis {
            time: at(1),
            offset: (0.0, 8.0).into(),
            discrete: true,
        };
        display.process_input_event(half_click);
        assert_eq!(state(&display).discrete_remainder(), (0.0, 0.5));
        display.process_input_event(half_click);
        assert_eq!(state(&display).discrete_remainder(), (0.0, 0.0));
        assert!(state(&display).last_discrete());
        client.roundtrip(&mut display);

        let steps: Vec<Arg> = client
            .take_events()
            .into_iter()
            .filter(|event| event.name == "axis_discrete" && event.args[0] == Arg::Uint(1))
            .map(|event| event.args[1].clone())
            .collect();
        assert_eq!(steps, vec![Arg::Int(0), Arg::Int(1)]);
    }

    #[test]
    fn value120_replaces_discrete_on_recent_clients() {
        let (mut display, mut client, surface, _) = setup(8);
        enter(&mut display, surface);
        display.process_input_event(InputEvent::PointerAxis {
            time: at(1),
            offset: (0.0, 8.0).into(),
            discrete: true,
        });
        client.roundtrip(&mut display);

        let events = client.take_events();
        assert!(!events.iter().any(|event| event.name == "axis_discrete"));
        assert!(events
            .iter()
            .any(|event| event.name == "axis_value120"
                && event.args == vec![Arg::Uint(1), Arg::Int(60)]));
    }

    #[test]
    fn old_clients_get_no_versioned_events() {
        let (mut display, mut client, surface, _) = setup(4);
        enter(&mut display, surface);
        display.process_input_event(InputEvent::PointerAxis {
            time: at(1),
            offset: (0.0, 16.0).into(),
            discrete: true,
        });
        display.process_input_event(InputEvent::PointerAxisStop { time: at(2) });
        display.process_input_event(InputEvent::PointerFrame);

        // only the frame flushed the connection
        client.read();
        assert_eq!(
            client.take_labels(),
            vec!["wl_pointer.enter", "wl_pointer.axis", "wl_pointer.axis"]
        );
    }

    #[test]
    fn scroll_stop_sends_both_axes() {
        let (mut display, mut client, surface, _) = setup(5);
        enter(&mut display, surface);
        client.roundtrip(&mut display);
        client.take_events();

        display.process_input_event(InputEvent::PointerAxisStop { time: at(9) });
        client.roundtrip(&mut display);

        let args: Vec<Vec<Arg>> = client.take_events().into_iter().map(|e| e.args).collect();
        assert_eq!(
            args,
            vec![vec![Arg::Uint(9), Arg::Uint(0)], vec![Arg::Uint(9), Arg::Uint(1)]]
        );
    }

    #[test]
    fn timestamps_precede_timed_events() {
        let mut display = Display::new(true).unwrap();
        let mut client = TestClient::connect(&mut display);
        let (_, surface) = client.create_surface(&mut display);
        let client_pointer = client.pointer(&mut display, 5);
        let timestamps = client.pointer_timestamps(&mut display, &client_pointer);
        let pointer = display.seat().pointers().next().unwrap().object();
        assert!(display.seat().pointer(&pointer).unwrap().input_timestamps().is_some());

        enter(&mut display, surface);
        display.process_input_event(InputEvent::PointerMotion {
            time: at(2500),
            location: (3.0, 4.0).into(),
        });
        client.roundtrip(&mut display);

        let events = client.take_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].label(), "zwp_input_timestamps_v1.timestamp");
        assert_eq!(events[1].object, timestamps.protocol_id());
        assert_eq!(
            events[1].args,
            vec![Arg::Uint(0), Arg::Uint(2), Arg::Uint(500_000_000)]
        );
        assert_eq!(events[2].label(), "wl_pointer.motion");
        assert_eq!(events[2].args[0], Arg::Uint(2500));

        client.request(&timestamps, 0, vec![]);
        client.roundtrip(&mut display);
        assert!(display.seat().pointer(&pointer).unwrap().input_timestamps().is_none());
    }

    #[test]
    fn entering_another_surface_leaves_the_first() {
        let (mut display, mut client, first, first_object) = setup(5);
        let (second_object, second) = client.create_surface(&mut display);

        with_pointer(&mut display, |pointer, cx| {
            pointer.on_enter(cx, first, (0.0, 0.0).into(), MouseButtons::empty());
            pointer.on_enter(cx, first, (1.0, 0.0).into(), MouseButtons::empty());
            pointer.on_enter(cx, second, (0.0, 0.0).into(), MouseButtons::empty());
        });
        client.roundtrip(&mut display);

        let events: Vec<(&str, Arg)> = client
            .take_events()
            .into_iter()
            .map(|event| (event.name, event.args[1].clone()))
            .collect();
        assert_eq!(
            events,
            vec![
                ("enter", Arg::Object(first_object)),
                ("leave", Arg::Object(first_object)),
                ("enter", Arg::Object(second_object.protocol_id())),
            ]
        );
        assert_eq!(state(&display).focus(), Some(second));
    }

    #[test]
    fn destroyed_focus_is_cleared_without_leave() {
        let (mut display, mut client, surface, _) = setup(5);
        enter(&mut display, surface);
        client.roundtrip(&mut display);
        client.take_events();

        display.surface_destroying(surface).unwrap();
        assert_eq!(state(&display).focus(), None);

        with_pointer(&mut display, |pointer, cx| {
            pointer.on_leave(cx, surface);
            pointer.on_motion(cx, at(3), (1.0, 1.0).into());
            pointer.on_frame(cx);
        });
        client.roundtrip(&mut display);
        assert!(client.take_events().is_empty());
    }
}
