//! In-process protocol client for the tests
//!
//! [`TestClient`] talks to a [`Display`] over a socket pair using the client side of
//! `wayland-backend`, and records every event it receives.

use std::{
    ffi::CString,
    os::{
        fd::{OwnedFd, RawFd},
        unix::net::UnixStream,
    },
    sync::{Arc, Mutex},
};

use wayland_backend::{
    client::{Backend, ObjectData, ObjectId},
    protocol::{Argument, Interface, Message},
};
use wayland_server::{
    backend::ClientId,
    protocol::{wl_compositor::WlCompositor, wl_seat::WlSeat},
    Resource,
};

use super::{
    display::Display,
    protocols::{
        input_timestamps::zwp_input_timestamps_manager_v1::ZwpInputTimestampsManagerV1,
        stylus::zcr_stylus_v2::ZcrStylusV2,
    },
    surface::SurfaceId,
};

type Args = Vec<Argument<ObjectId, RawFd>>;

/// A decoded event argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i32),
    Uint(u32),
    Fixed(f64),
    Str(String),
    /// Protocol id of the object, 0 for null
    Object(u32),
    Other,
}

impl From<Argument<ObjectId, OwnedFd>> for Arg {
    fn from(arg: Argument<ObjectId, OwnedFd>) -> Arg {
        match arg {
            Argument::Int(value) => Arg::Int(value),
            Argument::Uint(value) => Arg::Uint(value),
            Argument::Fixed(value) => Arg::Fixed(value as f64 / 256.0),
            Argument::Str(value) => Arg::Str(
                value
                    .map(|value| value.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            Argument::Object(id) => Arg::Object(id.protocol_id()),
            _ => Arg::Other,
        }
    }
}

/// An event received by the client
#[derive(Debug, Clone)]
pub struct Received {
    pub object: u32,
    pub interface: &'static str,
    pub name: &'static str,
    pub args: Vec<Arg>,
}

impl Received {
    /// `interface.event`
    pub fn label(&self) -> String {
        format!("{}.{}", self.interface, self.name)
    }
}

/// Shared list of received events
pub type EventLog = Arc<Mutex<Vec<Received>>>;

/// Object data recording every event into `log`
pub fn recorder(log: &EventLog) -> Arc<dyn ObjectData> {
    Arc::new(Recorder(log.clone()))
}

struct Recorder(EventLog);

impl ObjectData for Recorder {
    fn event(
        self: Arc<Self>,
        _backend: &Backend,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Option<Arc<dyn ObjectData>> {
        let interface = msg.sender_id.interface();
        let name = interface
            .events
            .get(msg.opcode as usize)
            .map_or("unknown", |desc| desc.name);
        self.0.lock().unwrap().push(Received {
            object: msg.sender_id.protocol_id(),
            interface: interface.name,
            name,
            args: msg.args.into_iter().map(Arg::from).collect(),
        });
        None
    }

    fn destroyed(&self, _object_id: ObjectId) {}
}

/// A protocol client connected to a [`Display`]
pub struct TestClient {
    backend: Backend,
    events: EventLog,
    registry: ObjectId,
    globals: Vec<(u32, String)>,
    compositor: ObjectId,
    client: wayland_server::Client,
}

impl TestClient {
    /// Connect, list the globals and bind `wl_compositor`
    pub fn connect(display: &mut Display) -> TestClient {
        let (server, client) = UnixStream::pair().unwrap();
        let inserted = display.insert_client(server).unwrap();
        let backend = Backend::connect(client).unwrap();
        let events = EventLog::default();

        let get_registry = Message {
            sender_id: backend.display_id(),
            opcode: 1,
            args: vec![Argument::NewId(ObjectId::null())].into(),
        };
        let registry = backend
            .send_request(get_registry, Some(recorder(&events)), None)
            .unwrap();

        let mut client = TestClient {
            backend,
            events,
            registry,
            globals: Vec::new(),
            compositor: ObjectId::null(),
            client: inserted,
        };
        client.roundtrip(display);
        client.globals = client
            .take_events()
            .into_iter()
            .filter(|event| event.name == "global")
            .filter_map(|event| match &event.args[..] {
                [Arg::Uint(name), Arg::Str(interface), _] => Some((*name, interface.clone())),
                _ => None,
            })
            .collect();
        client.compositor = client.bind(WlCompositor::interface(), 5);
        client.roundtrip(display);
        client.take_events();
        client
    }

    /// The id of this client on the display
    pub fn id(&self) -> ClientId {
        self.client.id()
    }

    /// Interface names of the advertised globals
    pub fn global_interfaces(&self) -> Vec<&str> {
        self.globals
            .iter()
            .map(|(_, interface)| interface.as_str())
            .collect()
    }

    /// Send everything, let the display dispatch and flush, then read the replies
    pub fn roundtrip(&mut self, display: &mut Display) {
        let _ = self.backend.flush();
        display.dispatch_clients().unwrap();
        display.flush_clients();
        self.read();
    }

    /// Read whatever the display already wrote to the socket
    pub fn read(&mut self) {
        while let Some(guard) = self.backend.prepare_read() {
            match guard.read() {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }

    /// Send a request not creating any object
    pub fn request(&mut self, object: &ObjectId, opcode: u16, args: Args) {
        let message = Message {
            sender_id: object.clone(),
            opcode,
            args: args.into(),
        };
        let _ = self.backend.send_request(message, None, None);
    }

    /// Send a request creating an object, `args` must hold a null `NewId`
    pub fn create(&mut self, object: &ObjectId, opcode: u16, args: Args) -> ObjectId {
        let message = Message {
            sender_id: object.clone(),
            opcode,
            args: args.into(),
        };
        let data = recorder(&self.events);
        self.backend
            .send_request(message, Some(data), None)
            .unwrap()
    }

    /// Bind the global implementing `interface`
    pub fn bind(&mut self, interface: &'static Interface, version: u32) -> ObjectId {
        let name = self
            .globals
            .iter()
            .find(|(_, advertised)| advertised == interface.name)
            .map(|(name, _)| *name)
            .unwrap();
        let message = Message {
            sender_id: self.registry.clone(),
            opcode: 0,
            args: vec![
                Argument::Uint(name),
                Argument::Str(Some(Box::new(CString::new(interface.name).unwrap()))),
                Argument::Uint(version),
                Argument::NewId(ObjectId::null()),
            ]
            .into(),
        };
        let data = recorder(&self.events);
        self.backend
            .send_request(message, Some(data), Some((interface, version)))
            .unwrap()
    }

    /// Create a surface, returns its client object and display id
    pub fn create_surface(&mut self, display: &mut Display) -> (ObjectId, SurfaceId) {
        let compositor = self.compositor.clone();
        let object = self.create(&compositor, 0, vec![Argument::NewId(ObjectId::null())]);
        self.roundtrip(display);
        let client = self.id();
        let surface = display
            .surfaces()
            .iter()
            .find(|(_, data)| {
                data.client == client && data.surface.id().protocol_id() == object.protocol_id()
            })
            .map(|(surface, _)| surface)
            .unwrap();
        (object, surface)
    }

    /// `wl_surface.frame`
    pub fn frame(&mut self, surface: &ObjectId) -> ObjectId {
        self.create(surface, 3, vec![Argument::NewId(ObjectId::null())])
    }

    /// `wl_surface.commit`
    pub fn commit(&mut self, surface: &ObjectId) {
        self.request(surface, 6, vec![]);
    }

    /// `wl_surface.destroy`
    pub fn destroy_surface(&mut self, surface: &ObjectId) {
        self.request(surface, 0, vec![]);
    }

    fn seat_object(&mut self, display: &mut Display, version: u32, opcode: u16) -> ObjectId {
        let seat = self.bind(WlSeat::interface(), version);
        let object = self.create(&seat, opcode, vec![Argument::NewId(ObjectId::null())]);
        self.roundtrip(display);
        self.take_events();
        object
    }

    /// Bind a seat at `version` and get its `wl_pointer`
    pub fn pointer(&mut self, display: &mut Display, version: u32) -> ObjectId {
        self.seat_object(display, version, 0)
    }

    /// Bind a seat at `version` and get its `wl_touch`
    pub fn touch(&mut self, display: &mut Display, version: u32) -> ObjectId {
        self.seat_object(display, version, 2)
    }

    fn timestamps(&mut self, display: &mut Display, opcode: u16, input: &ObjectId) -> ObjectId {
        let manager = self.bind(ZwpInputTimestampsManagerV1::interface(), 1);
        let args = vec![
            Argument::NewId(ObjectId::null()),
            Argument::Object(input.clone()),
        ];
        let timestamps = self.create(&manager, opcode, args);
        self.roundtrip(display);
        timestamps
    }

    /// Subscribe to the timestamps of `pointer`
    pub fn pointer_timestamps(&mut self, display: &mut Display, pointer: &ObjectId) -> ObjectId {
        self.timestamps(display, 2, pointer)
    }

    /// Subscribe to the timestamps of `touch`
    pub fn touch_timestamps(&mut self, display: &mut Display, touch: &ObjectId) -> ObjectId {
        self.timestamps(display, 3, touch)
    }

    /// Extend `touch` with a stylus object
    pub fn touch_stylus(&mut self, display: &mut Display, touch: &ObjectId) -> ObjectId {
        let manager = self.bind(ZcrStylusV2::interface(), 1);
        let args = vec![
            Argument::NewId(ObjectId::null()),
            Argument::Object(touch.clone()),
        ];
        let stylus = self.create(&manager, 0, args);
        self.roundtrip(display);
        stylus
    }

    /// Drain the recorded events
    pub fn take_events(&mut self) -> Vec<Received> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    /// Drain the recorded events as `interface.event` labels
    pub fn take_labels(&mut self) -> Vec<String> {
        self.take_events()
            .iter()
            .map(Received::label)
            .collect()
    }
}

