#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # wlbridge: input routing for Wayland clients of a host compositor
//!
//! This crate lets a compositor that manages its own windows and input devices expose
//! input to applications speaking the Wayland protocol. The host resolves every input
//! event to a target surface, the bridge turns it into protocol events for the client
//! owning that surface.
//!
//! ## Structure of the crate
//!
//! - [`backend`] describes the input events the host hands to the bridge.
//! - [`wayland`] contains the client side: the globals, surfaces, the pointer and touch
//!   delegates and the protocol extensions they use.
//! - [`bridge`] owns the listening socket and the display, and ties them to a
//!   [`calloop`] event loop.
//!
//! ## General principles
//!
//! ### Dispatching
//!
//! All protocol-visible state is owned by the [`Display`](wayland::display::Display) and
//! only ever accessed from the dispatch thread through `&mut` borrows. Delegates do not
//! hold on to shared state, it is lent to them for the duration of a single event.
//! Events are buffered per client by `wayland-server` and written out when the client is
//! flushed, which happens at the end of every input frame and on each
//! [`dispatch_clients`](bridge::CompositorBridge::dispatch_clients). A client whose
//! buffer overflows because it stopped reading is disconnected.
//!
//! ### Logging
//!
//! wlbridge makes extensive use of [`tracing`] for its internal logging. Dropped events
//! are reported at `trace` level, rejected state transitions and client lifecycle at
//! `debug`.
//!
//! For release builds it is recommended to limit the log level during compile time, by
//! adding a dependency to [`tracing`] with the corresponding features:
//!
//! ```toml
//! [dependencies]
//! tracing = { version = "0.1", features = ["max_level_trace", "release_max_level_debug"] }
//! ```

pub mod backend;
pub mod bridge;
pub mod utils;
pub mod wayland;

pub mod reexports;
