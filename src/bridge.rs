//! The compositor bridge
//!
//! [`CompositorBridge`] ties the pieces together: a host helper giving access to the
//! host clock, the [`Display`] with all client-side state, the listening socket and the
//! event loop watchers waking the loop for new connections and client requests. They are
//! created in that order and torn down in reverse.
//!
//! Opening the socket may fail, most commonly because `XDG_RUNTIME_DIR` is not usable.
//! The bridge then runs without wire access: no client can connect, but the host can
//! still manage the display.
//!
//! ```no_run
//! use wlbridge::bridge::{BridgeConfig, CompositorBridge};
//!
//! let mut event_loop = calloop::EventLoop::<()>::try_new().unwrap();
//! let handle = event_loop.handle();
//! let mut bridge = CompositorBridge::create_if_necessary(BridgeConfig::from_env(), &handle)
//!     .unwrap();
//! loop {
//!     event_loop.dispatch(None, &mut ()).unwrap();
//!     bridge.dispatch_clients();
//! }
//! ```

use std::{ffi::OsStr, time::Duration};

use calloop::LoopHandle;
use rustix::fs::Access;
use tracing::{debug, info_span, warn};
use wayland_server::BindError;

use crate::{
    utils::{Clock, Monotonic, Time},
    wayland::{
        display::{Display, DisplayError},
        socket::{ListeningTransport, SocketWatcher},
    },
};

/// Configuration of the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Name of the socket in `XDG_RUNTIME_DIR`, the first free `wayland-N` if `None`
    pub socket_name: Option<String>,
    /// Deliver touch as pointer events to clients without a `wl_touch`
    pub synthesize_pointer: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            socket_name: None,
            synthesize_pointer: true,
        }
    }
}

impl BridgeConfig {
    /// Read the configuration from the environment
    ///
    /// - `WLBRIDGE_SOCKET_NAME` sets the socket name,
    /// - `WLBRIDGE_NO_TOUCH_SYNTHESIS` set to `1`, `true`, `yes` or `y` disables
    ///   pointer synthesis.
    pub fn from_env() -> BridgeConfig {
        let socket_name = std::env::var("WLBRIDGE_SOCKET_NAME")
            .ok()
            .filter(|name| !name.is_empty());
        let no_synthesis = std::env::var("WLBRIDGE_NO_TOUCH_SYNTHESIS")
            .map(|x| {
                let x = x.to_lowercase();
                x == "1" || x == "true" || x == "yes" || x == "y"
            })
            .unwrap_or(false);
        BridgeConfig {
            socket_name,
            synthesize_pointer: !no_synthesis,
        }
    }
}

/// Errors of the bridge
///
/// Only [`BridgeError::Display`] prevents the bridge from being created, the others
/// make it run without wire access.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The display could not be created
    #[error("failed to create the display")]
    Display(#[from] DisplayError),
    /// `XDG_RUNTIME_DIR` is unset or not accessible
    #[error("XDG_RUNTIME_DIR is not set or not accessible")]
    MissingRuntimeDir,
    /// The listening socket could not be created
    #[error("failed to bind the listening socket")]
    Bind(#[from] BindError),
    /// The sockets could not be added to the event loop
    #[error("failed to watch the sockets")]
    EventLoop(#[from] calloop::Error),
}

#[derive(Debug)]
struct HostHelper {
    clock: Option<Clock<Monotonic>>,
    span: tracing::Span,
}

impl HostHelper {
    fn new() -> HostHelper {
        let span = info_span!("compositor_bridge");
        let clock = Clock::new()
            .map_err(|err| span.in_scope(|| warn!(?err, "monotonic clock unavailable")))
            .ok();
        HostHelper { clock, span }
    }

    fn now(&self) -> Time<Monotonic> {
        match &self.clock {
            Some(clock) => clock.now(),
            None => Time::from(Duration::ZERO),
        }
    }
}

#[derive(Debug)]
struct Wire {
    // dropped before the transport so the loop never polls a closed fd
    listener: SocketWatcher,
    clients: SocketWatcher,
    transport: ListeningTransport,
}

/// Owner of the listening socket and of all client-side state
#[derive(Debug)]
pub struct CompositorBridge {
    // fields drop in declaration order, after `Drop::drop` removed the wire side
    wire: Option<Wire>,
    display: Display,
    helper: HostHelper,
    wire_error: Option<BridgeError>,
}

impl CompositorBridge {
    /// Create the bridge, with wire access if the socket can be opened
    pub fn create_if_necessary<D: 'static>(
        config: BridgeConfig,
        handle: &LoopHandle<'static, D>,
    ) -> Result<CompositorBridge, BridgeError> {
        let helper = HostHelper::new();
        let span = helper.span.clone();
        let _guard = span.enter();

        let mut display = Display::new(config.synthesize_pointer)?;
        let (wire, wire_error) = match open_wire(&config, &mut display, handle) {
            Ok(wire) => (Some(wire), None),
            Err(err) => {
                warn!(%err, "running without a Wayland socket");
                (None, Some(err))
            }
        };

        Ok(CompositorBridge {
            wire,
            display,
            helper,
            wire_error,
        })
    }

    /// Accept new clients, dispatch their requests and flush pending events
    ///
    /// Must be called on every iteration of the event loop. Clients that hung up are
    /// cleaned up during the dispatch. Returns the number of clients accepted.
    pub fn dispatch_clients(&mut self) -> usize {
        let span = self.helper.span.clone();
        let _guard = span.enter();

        let mut accepted = 0;
        if let Some(wire) = &self.wire {
            wire.clients.take_ready();
            if wire.listener.take_ready() {
                loop {
                    match wire.transport.accept() {
                        Ok(Some(stream)) => match self.display.insert_client(stream) {
                            Ok(_) => accepted += 1,
                            Err(err) => warn!(%err, "failed to insert client"),
                        },
                        Ok(None) => break,
                        Err(err) => {
                            warn!(?err, "failed to accept client");
                            break;
                        }
                    }
                }
            }
        }

        if let Err(err) = self.display.dispatch_clients() {
            warn!(?err, "failed to dispatch clients");
        }
        self.display.flush_clients();
        accepted
    }

    /// Name of the listening socket, if wire access is enabled
    pub fn socket_name(&self) -> Option<&OsStr> {
        self.wire
            .as_ref()
            .and_then(|wire| wire.transport.socket_name())
    }

    /// Can clients connect to the bridge
    pub fn is_wire_enabled(&self) -> bool {
        self.wire.is_some()
    }

    /// Why wire access is disabled
    pub fn wire_error(&self) -> Option<&BridgeError> {
        self.wire_error.as_ref()
    }

    /// The display
    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Mutable access to the display
    pub fn display_mut(&mut self) -> &mut Display {
        &mut self.display
    }

    /// Current time of the host clock
    pub fn now(&self) -> Time<Monotonic> {
        self.helper.now()
    }

    /// Cancel all active touch contacts at the current time
    pub fn cancel_all_touches(&mut self) -> usize {
        let now = self.helper.now();
        self.display.cancel_all_touches(now)
    }
}

impl Drop for CompositorBridge {
    fn drop(&mut self) {
        let _guard = self.helper.span.enter();
        self.wire.take();
        debug!(clients = self.display.client_count(), "bridge shut down");
    }
}

fn runtime_dir_usable() -> Result<(), BridgeError> {
    let dir = std::env::var_os("XDG_RUNTIME_DIR").ok_or(BridgeError::MissingRuntimeDir)?;
    rustix::fs::access(
        dir.as_os_str(),
        Access::READ_OK | Access::WRITE_OK | Access::EXEC_OK,
    )
    .map_err(|_| BridgeError::MissingRuntimeDir)
}

fn open_wire<D: 'static>(
    config: &BridgeConfig,
    display: &mut Display,
    handle: &LoopHandle<'static, D>,
) -> Result<Wire, BridgeError> {
    runtime_dir_usable()?;
    let transport = match &config.socket_name {
        Some(name) => ListeningTransport::with_name(name)?,
        None => ListeningTransport::new_auto()?,
    };
    let listener = transport.watch(handle)?;
    let clients = SocketWatcher::new(display.poll_fd().map_err(calloop::Error::from)?, handle)?;
    Ok(Wire {
        listener,
        clients,
        transport,
    })
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;

    use calloop::EventLoop;
    use wayland_backend::{
        client::{Backend, ObjectId},
        protocol::{Argument, Message},
    };

    use super::*;
    use crate::wayland::testing::{self, Arg, EventLog, TestClient};

    fn advertised(log: &EventLog) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter(|event| event.name == "global")
            .filter_map(|event| match event.args.get(1) {
                Some(Arg::Str(interface)) => Some(interface.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn config_from_env() {
        std::env::set_var("WLBRIDGE_SOCKET_NAME", "wlbridge-config");
        std::env::set_var("WLBRIDGE_NO_TOUCH_SYNTHESIS", "Yes");
        let config = BridgeConfig::from_env();
        assert_eq!(config.socket_name.as_deref(), Some("wlbridge-config"));
        assert!(!config.synthesize_pointer);

        std::env::set_var("WLBRIDGE_SOCKET_NAME", "");
        std::env::set_var("WLBRIDGE_NO_TOUCH_SYNTHESIS", "0");
        assert_eq!(BridgeConfig::from_env(), BridgeConfig::default());

        std::env::remove_var("WLBRIDGE_SOCKET_NAME");
        std::env::remove_var("WLBRIDGE_NO_TOUCH_SYNTHESIS");
        assert_eq!(BridgeConfig::from_env(), BridgeConfig::default());
    }

    // both modes run in one test, they depend on XDG_RUNTIME_DIR
    #[test]
    fn wire_access_depends_on_the_runtime_dir() {
        let mut event_loop = EventLoop::<()>::try_new().unwrap();
        let handle = event_loop.handle();

        std::env::remove_var("XDG_RUNTIME_DIR");
        let mut bridge = CompositorBridge::create_if_necessary(BridgeConfig::default(), &handle)
            .unwrap();
        assert!(!bridge.is_wire_enabled());
        assert!(bridge.socket_name().is_none());
        assert!(matches!(
            bridge.wire_error(),
            Some(BridgeError::MissingRuntimeDir)
        ));
        // the host side keeps working
        let mut client = TestClient::connect(bridge.display_mut());
        client.create_surface(bridge.display_mut());
        assert_eq!(bridge.display().surfaces().len(), 1);
        assert_eq!(bridge.dispatch_clients(), 0);
        drop(client);
        drop(bridge);

        let runtime_dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_RUNTIME_DIR", runtime_dir.path());
        let config = BridgeConfig {
            socket_name: Some("wlbridge-test".into()),
            synthesize_pointer: true,
        };
        let mut bridge = CompositorBridge::create_if_necessary(config, &handle).unwrap();
        assert!(bridge.is_wire_enabled());
        assert!(bridge.wire_error().is_none());
        assert_eq!(bridge.socket_name(), Some(OsStr::new("wlbridge-test")));
        let socket_path = runtime_dir.path().join("wlbridge-test");

        let stream = UnixStream::connect(&socket_path).unwrap();
        let backend = Backend::connect(stream).unwrap();
        let log = EventLog::default();
        let get_registry = Message {
            sender_id: backend.display_id(),
            opcode: 1,
            args: vec![Argument::NewId(ObjectId::null())].into(),
        };
        backend
            .send_request(get_registry, Some(testing::recorder(&log)), None)
            .unwrap();
        backend.flush().unwrap();

        event_loop
            .dispatch(Some(Duration::from_millis(100)), &mut ())
            .unwrap();
        assert_eq!(bridge.dispatch_clients(), 1);
        assert_eq!(bridge.display().client_count(), 1);

        // the registry request may arrive after the connection was accepted
        for _ in 0..10 {
            if let Some(guard) = backend.prepare_read() {
                let _ = guard.read();
            }
            if !advertised(&log).is_empty() {
                break;
            }
            event_loop
                .dispatch(Some(Duration::from_millis(10)), &mut ())
                .unwrap();
            bridge.dispatch_clients();
        }
        assert!(advertised(&log).iter().any(|interface| interface == "wl_seat"));

        drop(backend);
        event_loop
            .dispatch(Some(Duration::from_millis(100)), &mut ())
            .unwrap();
        bridge.dispatch_clients();
        assert_eq!(bridge.display().client_count(), 0);

        drop(bridge);
        assert!(!socket_path.exists());
    }
}
