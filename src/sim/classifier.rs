//! Water/land classification from the primary's surface texture
//!
//! The texture is decoded once on a worker thread. Until it arrives, one
//! classification may wait; a newer request replaces it so a stale anchor
//! never resolves. If decoding fails, every point classifies as land.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::consts::{CLASSIFY_SAMPLE_OFFSET, WATER_MARGIN};
use crate::error::TextureError;
use crate::{equirect_uv, tangent_basis};

/// Terrain under a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceClass {
    Water,
    Land,
}

/// Result of classifying an impact point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Class of the texel directly under the point
    pub class: SurfaceClass,
    /// Fraction of the neighborhood samples that are water, in [0, 1]
    pub strength: f32,
    /// The point that was classified (local frame)
    pub anchor: Vec3,
}

impl Classification {
    /// Fallback used when no texture is available
    pub fn land(anchor: Vec3) -> Self {
        Self {
            class: SurfaceClass::Land,
            strength: 0.0,
            anchor,
        }
    }

    pub fn is_water(&self) -> bool {
        self.class == SurfaceClass::Water
    }

    /// Any sample in the neighborhood is water (coastal land included)
    pub fn touches_water(&self) -> bool {
        self.strength > 0.0
    }
}

/// Decoded equirectangular RGBA image
#[derive(Debug, Clone)]
pub struct SurfaceTexture {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl SurfaceTexture {
    /// Build from raw RGBA texels, row-major
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<[u8; 4]>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 || pixels.len() != (width * height) as usize {
            return Err(TextureError::Empty);
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build from a decoded image
    pub fn from_image(img: image::DynamicImage) -> Result<Self, TextureError> {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels = rgba.pixels().map(|p| p.0).collect();
        Self::from_pixels(width, height, pixels)
    }

    /// Decode PNG/JPEG bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, TextureError> {
        Self::from_image(image::load_from_memory(bytes)?)
    }

    /// Read and decode an image file
    pub fn open(path: &Path) -> Result<Self, TextureError> {
        let bytes = std::fs::read(path).map_err(TextureError::Read)?;
        Self::decode(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nearest texel at texture coordinates `uv` in [0, 1]²
    pub fn texel_at_uv(&self, uv: Vec2) -> [u8; 4] {
        let x = (uv.x.clamp(0.0, 1.0) * (self.width - 1) as f32).floor() as u32;
        let y = (uv.y.clamp(0.0, 1.0) * (self.height - 1) as f32).floor() as u32;
        self.pixels[(y * self.width + x) as usize]
    }

    /// Texel under a direction from the sphere's center
    pub fn sample(&self, dir: Vec3) -> [u8; 4] {
        self.texel_at_uv(equirect_uv(dir))
    }
}

/// Blue exceeds both red and green by the water margin
pub fn is_water_texel(texel: [u8; 4]) -> bool {
    let [r, g, b, _] = texel.map(u16::from);
    let margin = u16::from(WATER_MARGIN);
    b > r + margin && b > g + margin
}

/// Classify `local_point` against a loaded texture.
///
/// Samples the point itself and four neighbors offset along the local
/// tangent plane; strength is the fraction of water samples.
pub fn classify_with(texture: &SurfaceTexture, local_point: Vec3) -> Classification {
    let normal = local_point.normalize_or_zero();
    let (t1, t2) = tangent_basis(normal);
    let offset = CLASSIFY_SAMPLE_OFFSET;
    let samples = [
        local_point,
        local_point + t1 * offset,
        local_point - t1 * offset,
        local_point + t2 * offset,
        local_point - t2 * offset,
    ];

    let center_water = is_water_texel(texture.sample(samples[0]));
    let water = samples
        .iter()
        .filter(|p| is_water_texel(texture.sample(**p)))
        .count();

    Classification {
        class: if center_water {
            SurfaceClass::Water
        } else {
            SurfaceClass::Land
        },
        strength: water as f32 / samples.len() as f32,
        anchor: local_point,
    }
}

enum LoadState {
    /// Decode running on the worker thread
    Loading(Receiver<Result<SurfaceTexture, TextureError>>),
    Ready(Arc<SurfaceTexture>),
    /// No texture configured, or decode failed
    Unavailable,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    ticket: u64,
    anchor: Vec3,
}

/// Classifies impact points, decoding the texture at most once
pub struct SurfaceClassifier {
    state: LoadState,
    pending: Option<Pending>,
}

impl SurfaceClassifier {
    /// Classifier over an already-decoded texture
    pub fn from_texture(texture: SurfaceTexture) -> Self {
        Self {
            state: LoadState::Ready(Arc::new(texture)),
            pending: None,
        }
    }

    /// Classifier with no texture: everything is land
    pub fn unavailable() -> Self {
        Self {
            state: LoadState::Unavailable,
            pending: None,
        }
    }

    /// Start decoding `path` on a worker thread
    pub fn load_async(path: PathBuf) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let spawned = std::thread::Builder::new()
            .name("texture-decode".to_string())
            .spawn(move || {
                let result = SurfaceTexture::open(&path);
                let _ = tx.send(result);
            });

        match spawned {
            Ok(_) => Self::from_receiver(rx),
            Err(e) => {
                log::warn!("Could not start texture decode worker: {e}");
                Self::unavailable()
            }
        }
    }

    pub(crate) fn from_receiver(rx: Receiver<Result<SurfaceTexture, TextureError>>) -> Self {
        Self {
            state: LoadState::Loading(rx),
            pending: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading(_))
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The decoded texture, once available
    pub fn texture(&self) -> Option<Arc<SurfaceTexture>> {
        match &self.state {
            LoadState::Ready(texture) => Some(Arc::clone(texture)),
            _ => None,
        }
    }

    /// Classify now if possible; otherwise queue it under `ticket`.
    ///
    /// A queued request replaces any older one.
    pub fn request(&mut self, ticket: u64, local_point: Vec3) -> Option<Classification> {
        self.update_load_state();
        match &self.state {
            LoadState::Ready(texture) => Some(classify_with(texture, local_point)),
            LoadState::Unavailable => Some(Classification::land(local_point)),
            LoadState::Loading(_) => {
                if let Some(stale) = self.pending.replace(Pending {
                    ticket,
                    anchor: local_point,
                }) {
                    log::debug!("Classification {} superseded by {}", stale.ticket, ticket);
                }
                None
            }
        }
    }

    /// Drop the queued classification, if any
    pub fn cancel(&mut self) {
        if let Some(stale) = self.pending.take() {
            log::debug!("Classification {} cancelled", stale.ticket);
        }
    }

    /// Resolve the queued classification once the texture has arrived (or failed).
    ///
    /// Never blocks.
    pub fn poll(&mut self) -> Option<(u64, Classification)> {
        self.update_load_state();
        if self.is_loading() {
            return None;
        }
        let pending = self.pending.take()?;
        let classification = match &self.state {
            LoadState::Ready(texture) => classify_with(texture, pending.anchor),
            _ => Classification::land(pending.anchor),
        };
        Some((pending.ticket, classification))
    }

    fn update_load_state(&mut self) {
        let LoadState::Loading(rx) = &self.state else {
            return;
        };
        let next = match rx.try_recv() {
            Ok(Ok(texture)) => {
                log::info!("Surface texture ready ({}x{})", texture.width(), texture.height());
                LoadState::Ready(Arc::new(texture))
            }
            Ok(Err(e)) => {
                log::warn!("Surface texture unavailable, classifying as land: {e}");
                LoadState::Unavailable
            }
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                log::warn!("Surface texture unavailable: {}", TextureError::WorkerGone);
                LoadState::Unavailable
            }
        };
        self.state = next;
    }
}
