//! Shared, reference-counted faces keyed by font file identity.
//!
//! The registry is an explicit context object: every font instance is built
//! from one, and all instances built from the same registry share faces. The
//! rasterizer engine starts with the first acquired face and stops when the
//! last face is released. Handles are `Rc`-based and must stay on one thread.

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use ahash::RandomState;

use super::traits::{RasterEngine, RasterFace};
use super::truetype::TrueTypeEngine;
use super::FaceError;

/// Creates a rasterizer engine on demand.
pub type EngineFactory = Box<dyn Fn() -> Result<Box<dyn RasterEngine>, FaceError>>;

/// Where font bytes come from.
pub trait FontSource {
    fn read(&self, identity: &Path) -> io::Result<Vec<u8>>;
}

/// Reads fonts from the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSource;

impl FontSource for FileSource {
    fn read(&self, identity: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(identity)
    }
}

/// Serves fonts registered in memory, e.g. embedded with `include_bytes!`.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    fonts: HashMap<PathBuf, Vec<u8>, RandomState>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identity: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.fonts.insert(identity.into(), bytes);
    }

    pub fn with_font(mut self, identity: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        self.insert(identity, bytes);
        self
    }
}

impl FontSource for MemorySource {
    fn read(&self, identity: &Path) -> io::Result<Vec<u8>> {
        self.fonts.get(identity).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no font registered as {}", identity.display()),
            )
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("Failed to read font {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to open face {}: {source}", path.display())]
    Face {
        path: PathBuf,
        #[source]
        source: FaceError,
    },
    #[error("Failed to start rasterizer engine: {0}")]
    EngineInit(#[source] FaceError),
    #[error("Invalid font size: {0}")]
    InvalidSize(u32),
}

struct RegistryState {
    engine: Option<Box<dyn RasterEngine>>,
    factory: EngineFactory,
    source: Box<dyn FontSource>,
    faces: HashMap<PathBuf, Weak<FaceInner>, RandomState>,
    engine_starts: usize,
}

impl RegistryState {
    fn engine(&mut self) -> Result<&mut dyn RasterEngine, FontError> {
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => {
                let engine = (self.factory)().map_err(FontError::EngineInit)?;
                log::info!("Rasterizer engine '{}' started", engine.name());
                self.engine_starts += 1;
                engine
            }
        };
        Ok(&mut **self.engine.insert(engine))
    }

    fn live_face(&self, identity: &Path) -> Option<Rc<FaceInner>> {
        self.faces.get(identity).and_then(Weak::upgrade)
    }
}

/// Process context owning the rasterizer engine and the face table.
#[derive(Clone)]
pub struct FaceRegistry {
    state: Rc<RefCell<RegistryState>>,
}

impl FaceRegistry {
    pub fn new(factory: EngineFactory, source: Box<dyn FontSource>) -> Self {
        Self {
            state: Rc::new(RefCell::new(RegistryState {
                engine: None,
                factory,
                source,
                faces: HashMap::default(),
                engine_starts: 0,
            })),
        }
    }

    /// Registry backed by the TrueType rasterizer and the filesystem.
    pub fn truetype() -> Self {
        Self::new(
            Box::new(|| Ok(Box::new(TrueTypeEngine::new()) as Box<dyn RasterEngine>)),
            Box::new(FileSource),
        )
    }

    /// Start the engine ahead of the first `acquire`.
    pub fn init(&self) -> Result<(), FontError> {
        self.state.borrow_mut().engine().map(|_| ())
    }

    /// Stop the engine if no face is alive. Returns whether it was stopped.
    pub fn shutdown(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.faces.values().any(|w| w.strong_count() > 0) {
            log::warn!("Rasterizer shutdown refused: faces still open");
            return false;
        }
        state.faces.clear();
        if state.engine.take().is_some() {
            log::info!("Rasterizer engine shut down");
        }
        true
    }

    /// Return the shared face for `identity`, opening it on first use.
    pub fn acquire(&self, identity: impl AsRef<Path>) -> Result<Face, FontError> {
        let identity = identity.as_ref();
        let mut state = self.state.borrow_mut();

        if let Some(inner) = state.live_face(identity) {
            log::debug!(
                "Reusing face {} (refcount {})",
                identity.display(),
                Rc::strong_count(&inner)
            );
            return Ok(Face(inner));
        }

        let bytes = state.source.read(identity).map_err(|source| FontError::Io {
            path: identity.to_path_buf(),
            source,
        })?;
        let raster = state
            .engine()?
            .open_face(&bytes)
            .map_err(|source| FontError::Face {
                path: identity.to_path_buf(),
                source,
            });
        let raster = match raster {
            Ok(raster) => raster,
            Err(e) => {
                if state.faces.is_empty() {
                    state.engine = None;
                }
                return Err(e);
            }
        };

        let inner = Rc::new(FaceInner {
            identity: identity.to_path_buf(),
            bytes,
            raster: RefCell::new(Some(raster)),
            registry: Rc::downgrade(&self.state),
        });
        state
            .faces
            .insert(identity.to_path_buf(), Rc::downgrade(&inner));
        log::info!("Opened face {}", identity.display());
        Ok(Face(inner))
    }

    /// Number of live handles to the face for `identity` (0 if not open).
    pub fn refcount(&self, identity: impl AsRef<Path>) -> usize {
        self.state
            .borrow()
            .faces
            .get(identity.as_ref())
            .map_or(0, Weak::strong_count)
    }

    pub fn face_count(&self) -> usize {
        self.state
            .borrow()
            .faces
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_engine_running(&self) -> bool {
        self.state.borrow().engine.is_some()
    }

    /// How many times the engine has been started over the registry's life.
    pub fn engine_starts(&self) -> usize {
        self.state.borrow().engine_starts
    }
}

impl fmt::Debug for FaceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaceRegistry")
            .field("faces", &self.face_count())
            .field("engine_running", &self.is_engine_running())
            .finish()
    }
}

struct FaceInner {
    identity: PathBuf,
    bytes: Vec<u8>,
    raster: RefCell<Option<Box<dyn RasterFace>>>,
    registry: Weak<RefCell<RegistryState>>,
}

impl Drop for FaceInner {
    fn drop(&mut self) {
        // Native context goes first, then the bytes it was parsed from.
        drop(self.raster.get_mut().take());
        log::info!("Released face {}", self.identity.display());

        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let Ok(mut state) = registry.try_borrow_mut() else {
            log::warn!(
                "Face registry busy while releasing {}",
                self.identity.display()
            );
            return;
        };
        if state
            .faces
            .get(&self.identity)
            .is_some_and(|w| w.strong_count() == 0)
        {
            state.faces.remove(&self.identity);
        }
        if state.faces.is_empty() && state.engine.take().is_some() {
            log::info!("Rasterizer engine shut down");
        }
    }
}

/// Shared handle to an open face. Cloning adds a reference.
#[derive(Clone)]
pub struct Face(Rc<FaceInner>);

impl Face {
    pub fn identity(&self) -> &Path {
        &self.0.identity
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0.bytes
    }

    pub fn refcount(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Mutable access to the rasterizer context.
    ///
    /// Returns `None` once the face has been torn down.
    pub fn raster(&self) -> Option<RefMut<'_, dyn RasterFace + 'static>> {
        RefMut::filter_map(self.0.raster.borrow_mut(), |r| r.as_deref_mut()).ok()
    }

    pub fn ptr_eq(&self, other: &Face) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Face")
            .field("identity", &self.0.identity)
            .field("bytes", &self.0.bytes.len())
            .field("refcount", &self.refcount())
            .finish()
    }
}
