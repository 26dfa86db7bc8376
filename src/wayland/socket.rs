//! Wayland listening socket.
//!
//! [`ListeningTransport`] is the socket clients connect to, placed in `XDG_RUNTIME_DIR`.
//! Accepting is done on the dispatch thread by whoever owns the transport. To know when
//! to do so, a [`SocketWatcher`] can be inserted into a calloop event loop: it watches a
//! duplicate of the listening fd and only records that a connection is pending.

use std::{
    cell::Cell,
    ffi::OsStr,
    fmt, io,
    os::unix::{
        io::{AsFd, OwnedFd},
        net::UnixStream,
    },
    rc::Rc,
};

use calloop::{generic::Generic, Interest, LoopHandle, Mode, PostAction, RegistrationToken};
use tracing::{debug, info};
use wayland_server::{BindError, ListeningSocket};

/// A Wayland listening socket.
#[derive(Debug)]
pub struct ListeningTransport {
    socket: ListeningSocket,
}

impl ListeningTransport {
    /// Creates a new listening socket, choosing the next available `wayland-N` name.
    pub fn new_auto() -> Result<ListeningTransport, BindError> {
        // wayland-0 is skipped, clients without WAYLAND_DISPLAY would pick it and reach the
        // wrong compositor.
        let socket = ListeningSocket::bind_auto("wayland", 1..33)?;
        info!(name = ?socket.socket_name(), "Created new socket");
        Ok(ListeningTransport { socket })
    }

    /// Creates a new listening socket with the specified name.
    pub fn with_name(name: &str) -> Result<ListeningTransport, BindError> {
        let socket = ListeningSocket::bind(name)?;
        info!(name = ?socket.socket_name(), "Created new socket");
        Ok(ListeningTransport { socket })
    }

    /// Returns the name of the listening socket.
    pub fn socket_name(&self) -> Option<&OsStr> {
        self.socket.socket_name()
    }

    /// Accept a pending connection, if any.
    pub fn accept(&self) -> io::Result<Option<UnixStream>> {
        let client = self.socket.accept()?;
        if let Some(client) = &client {
            debug!(socket = ?self.socket.socket_name(), ?client, "New client connected");
        }
        Ok(client)
    }

    /// Watch the socket for pending connections on the given event loop.
    ///
    /// The watcher is removed from the loop when dropped.
    pub fn watch<D: 'static>(
        &self,
        handle: &LoopHandle<'static, D>,
    ) -> calloop::Result<SocketWatcher> {
        SocketWatcher::new(self.socket.as_fd().try_clone_to_owned()?, handle)
    }
}

/// Readiness watcher of a socket inside an event loop
///
/// Used for the [`ListeningTransport`] and for the client connections of the display.
pub struct SocketWatcher {
    ready: Rc<Cell<bool>>,
    token: RegistrationToken,
    remove: Option<Box<dyn FnOnce(RegistrationToken)>>,
}

impl SocketWatcher {
    /// Watch `fd` for readability on the given event loop
    pub fn new<D: 'static>(
        fd: OwnedFd,
        handle: &LoopHandle<'static, D>,
    ) -> calloop::Result<SocketWatcher> {
        let ready = Rc::new(Cell::new(false));

        let flag = ready.clone();
        let token = handle
            .insert_source(Generic::new(fd, Interest::READ, Mode::Level), move |_, _, _| {
                flag.set(true);
                Ok(PostAction::Continue)
            })
            .map_err(|err| err.error)?;

        let handle = handle.clone();
        Ok(SocketWatcher {
            ready,
            token,
            remove: Some(Box::new(move |token| handle.remove(token))),
        })
    }

    /// Did the socket become readable since the last call
    pub fn take_ready(&self) -> bool {
        self.ready.replace(false)
    }
}

impl fmt::Debug for SocketWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketWatcher")
            .field("ready", &self.ready.get())
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl Drop for SocketWatcher {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove(self.token);
        }
    }
}
