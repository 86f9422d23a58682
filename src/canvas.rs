//! Capture surfaces.
//!
//! Frames are painted from the media source into a reusable 2D context sized
//! to the plan, then read back as RGBA pixels. [`create_2d_context`] asks for
//! a context optimised for frequent read-back first and falls back to a plain
//! one; only when both fail is the conversion aborted.

use image::{DynamicImage, RgbaImage, imageops::FilterType};

use crate::error::ClipError;

/// Options passed when requesting a drawing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextOptions {
    /// Hint that pixels will be read back after every draw.
    pub will_read_frequently: bool,
}

/// A 2D drawing target that can be painted from a video frame and read back.
pub trait DrawContext {
    /// Paint `frame` scaled to cover the whole context.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError::CaptureError`] if the frame cannot be drawn.
    fn draw_frame(&mut self, frame: &DynamicImage) -> Result<(), ClipError>;

    /// The current contents of the context.
    fn pixels(&self) -> &RgbaImage;
}

/// Produces drawing contexts of a fixed size.
pub trait SurfaceProvider {
    /// The context type handed out.
    type Context: DrawContext;

    /// Create a context of `width` × `height` pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if this context mode is unavailable.
    fn create_context(
        &mut self,
        width: u32,
        height: u32,
        options: ContextOptions,
    ) -> Result<Self::Context, ClipError>;
}

/// Create a context, preferring the frequent read-back mode.
///
/// # Errors
///
/// Returns [`ClipError::ContextCreationFailure`] when neither mode works.
pub fn create_2d_context<P: SurfaceProvider>(
    provider: &mut P,
    width: u32,
    height: u32,
) -> Result<P::Context, ClipError> {
    let hinted = ContextOptions {
        will_read_frequently: true,
    };
    match provider.create_context(width, height, hinted) {
        Ok(context) => return Ok(context),
        Err(error) => log::debug!("Read-back optimised context unavailable: {error}"),
    }

    provider
        .create_context(width, height, ContextOptions::default())
        .map_err(|error| ClipError::ContextCreationFailure(error.to_string()))
}

/// In-memory surface backed by [`image`] buffers.
#[derive(Debug, Clone, Copy)]
pub struct SoftwareSurface {
    filter: FilterType,
}

impl Default for SoftwareSurface {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl SoftwareSurface {
    /// Create a surface using bilinear scaling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different scaling filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

impl SurfaceProvider for SoftwareSurface {
    type Context = SoftwareContext;

    fn create_context(
        &mut self,
        width: u32,
        height: u32,
        _options: ContextOptions,
    ) -> Result<SoftwareContext, ClipError> {
        if width == 0 || height == 0 {
            return Err(ClipError::ContextCreationFailure(format!(
                "invalid surface size {width}x{height}"
            )));
        }
        Ok(SoftwareContext {
            buffer: RgbaImage::new(width, height),
            filter: self.filter,
        })
    }
}

/// Drawing context of a [`SoftwareSurface`].
#[derive(Debug, Clone)]
pub struct SoftwareContext {
    buffer: RgbaImage,
    filter: FilterType,
}

impl DrawContext for SoftwareContext {
    fn draw_frame(&mut self, frame: &DynamicImage) -> Result<(), ClipError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(ClipError::CaptureError("empty source frame".to_string()));
        }

        let (width, height) = self.buffer.dimensions();
        if frame.width() == width && frame.height() == height {
            match frame {
                DynamicImage::ImageRgba8(rgba) => self.buffer.copy_from_slice(rgba.as_raw()),
                other => self.buffer = other.to_rgba8(),
            }
        } else {
            self.buffer = image::imageops::resize(frame, width, height, self.filter);
        }
        Ok(())
    }

    fn pixels(&self) -> &RgbaImage {
        &self.buffer
    }
}
