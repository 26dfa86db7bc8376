//! Bookkeeping of client surfaces
//!
//! Surfaces are created by clients through `wl_compositor` but owned by the host, which
//! decides what they show and reports when they are going away. The bridge only needs
//! to know which client owns a surface, the `wl_surface` resource to address events to,
//! and the frame callbacks the client asked for. Entries live until the host or the
//! client destroys the surface.

use std::fmt;

use indexmap::IndexMap;
use wayland_server::{
    backend::ClientId,
    protocol::{wl_callback::WlCallback, wl_surface::WlSurface},
    Resource,
};

/// Display-wide identifier of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub(crate) u32);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// What the bridge knows about a surface
#[derive(Debug)]
pub struct SurfaceData {
    /// Owning client
    pub client: ClientId,
    /// The `wl_surface` resource of the client
    pub surface: WlSurface,
    pub(crate) pending_callbacks: Vec<WlCallback>,
    pub(crate) frame_callbacks: Vec<WlCallback>,
}

impl SurfaceData {
    /// Frame callbacks committed and waiting for the host to present a frame
    pub fn frame_callbacks(&self) -> &[WlCallback] {
        &self.frame_callbacks
    }
}

/// Map of the live surfaces
#[derive(Debug, Default)]
pub struct SurfaceMap {
    next_id: u32,
    surfaces: IndexMap<SurfaceId, SurfaceData>,
}

impl SurfaceMap {
    /// Register a surface of `client`, the resource is created with the new id
    pub(crate) fn insert_with(
        &mut self,
        client: ClientId,
        surface: impl FnOnce(SurfaceId) -> WlSurface,
    ) -> SurfaceId {
        self.next_id += 1;
        let id = SurfaceId(self.next_id);
        let data = SurfaceData {
            client,
            surface: surface(id),
            pending_callbacks: Vec::new(),
            frame_callbacks: Vec::new(),
        };
        self.surfaces.insert(id, data);
        id
    }

    pub(crate) fn remove(&mut self, surface: SurfaceId) -> Option<SurfaceData> {
        self.surfaces.shift_remove(&surface)
    }

    /// Data of a live surface
    pub fn get(&self, surface: SurfaceId) -> Option<&SurfaceData> {
        self.surfaces.get(&surface)
    }

    pub(crate) fn get_mut(&mut self, surface: SurfaceId) -> Option<&mut SurfaceData> {
        self.surfaces.get_mut(&surface)
    }

    /// Client owning a live surface
    pub fn owner(&self, surface: SurfaceId) -> Option<&ClientId> {
        self.get(surface).map(|data| &data.client)
    }

    /// The resource under which `client` knows `surface`
    ///
    /// Returns `None` if the surface is dead or belongs to another client.
    pub fn surface_for(&self, client: &ClientId, surface: SurfaceId) -> Option<&WlSurface> {
        self.get(surface)
            .filter(|data| &data.client == client)
            .map(|data| &data.surface)
    }

    /// The id of a live surface resource
    pub fn id_of(&self, surface: &WlSurface) -> Option<SurfaceId> {
        surface
            .data::<SurfaceId>()
            .copied()
            .filter(|id| self.surfaces.contains_key(id))
    }

    /// Iterate over the live surfaces in creation order
    pub fn iter(&self) -> impl Iterator<Item = (SurfaceId, &SurfaceData)> {
        self.surfaces.iter().map(|(id, data)| (*id, data))
    }

    /// Number of live surfaces
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Are there no live surfaces
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}
