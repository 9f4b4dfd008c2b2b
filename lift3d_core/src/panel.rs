//! Image panel descriptors for saved image grids.
//!
//! A panel is raw float pixel data plus instructions for turning it into an
//! 8-bit image: its layout, the value range that maps to black..white, and an
//! optional colormap for single-channel data.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Memory layout of RGB panel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataFormat {
    /// Height, width, channels.
    #[default]
    Hwc,
    /// Channels, height, width.
    Chw,
}

/// Colormap for grayscale panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// Blue → cyan → yellow → red.
    Jet,
}

/// How a panel is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PanelKind {
    /// Three-channel color data.
    Rgb {
        /// Memory layout.
        data_format: DataFormat,
        /// Values mapped to `[0, 255]`.
        data_range: (f32, f32),
    },
    /// Single-channel data.
    Grayscale {
        /// Optional colormap; `None` renders gray.
        cmap: Option<Colormap>,
        /// Values mapped to `[0, 255]`.
        data_range: (f32, f32),
    },
}

impl PanelKind {
    /// The value range of this panel.
    pub fn data_range(&self) -> (f32, f32) {
        match *self {
            PanelKind::Rgb { data_range, .. } | PanelKind::Grayscale { data_range, .. } => {
                data_range
            }
        }
    }
}

/// One panel of an image grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePanel {
    /// Render instructions.
    pub kind: PanelKind,
    /// Height in pixels.
    pub height: usize,
    /// Width in pixels.
    pub width: usize,
    /// Raw values in the layout given by `kind`.
    pub data: Vec<f32>,
}

impl ImagePanel {
    /// An RGB panel in HWC layout with range `(0, 1)`.
    pub fn rgb(height: usize, width: usize, data: Vec<f32>) -> Self {
        Self {
            kind: PanelKind::Rgb {
                data_format: DataFormat::Hwc,
                data_range: (0.0, 1.0),
            },
            height,
            width,
            data,
        }
    }

    /// A grayscale panel with range `(0, 1)` and no colormap.
    pub fn grayscale(height: usize, width: usize, data: Vec<f32>) -> Self {
        Self {
            kind: PanelKind::Grayscale {
                cmap: None,
                data_range: (0.0, 1.0),
            },
            height,
            width,
            data,
        }
    }

    /// Replace the value range.
    pub fn with_data_range(mut self, min: f32, max: f32) -> Self {
        self.kind = match self.kind {
            PanelKind::Rgb { data_format, .. } => PanelKind::Rgb {
                data_format,
                data_range: (min, max),
            },
            PanelKind::Grayscale { cmap, .. } => PanelKind::Grayscale {
                cmap,
                data_range: (min, max),
            },
        };
        self
    }

    /// Set the colormap (grayscale panels only; ignored for RGB).
    pub fn with_cmap(mut self, cmap: Option<Colormap>) -> Self {
        if let PanelKind::Grayscale { data_range, .. } = self.kind {
            self.kind = PanelKind::Grayscale { cmap, data_range };
        }
        self
    }

    /// Set the data layout (RGB panels only; ignored for grayscale).
    pub fn with_data_format(mut self, data_format: DataFormat) -> Self {
        if let PanelKind::Rgb { data_range, .. } = self.kind {
            self.kind = PanelKind::Rgb {
                data_format,
                data_range,
            };
        }
        self
    }

    /// Number of channels stored in `data`.
    pub fn channels(&self) -> usize {
        match self.kind {
            PanelKind::Rgb { .. } => 3,
            PanelKind::Grayscale { .. } => 1,
        }
    }

    /// Check data length and range.
    pub fn validate(&self) -> Result<()> {
        let expected = self.height * self.width * self.channels();
        if self.data.len() != expected {
            return Err(CoreError::PanelSizeMismatch {
                expected,
                got: self.data.len(),
            });
        }
        let (min, max) = self.kind.data_range();
        if !(min < max) {
            return Err(CoreError::InvalidRange { min, max });
        }
        Ok(())
    }

    /// Map a raw value into `[0, 1]` using the panel range (clipping outside values).
    #[inline]
    pub fn normalize_value(&self, value: f32) -> f32 {
        let (min, max) = self.kind.data_range();
        if value.is_nan() {
            return 0.0;
        }
        ((value.clamp(min, max) - min) / (max - min)).clamp(0.0, 1.0)
    }

    /// Raw RGB value at `(y, x)` for channel `c`, honoring the data layout.
    ///
    /// For grayscale panels `c` is ignored.
    #[inline]
    pub fn value_at(&self, y: usize, x: usize, c: usize) -> f32 {
        match self.kind {
            PanelKind::Rgb {
                data_format: DataFormat::Hwc,
                ..
            } => self.data[(y * self.width + x) * 3 + c],
            PanelKind::Rgb {
                data_format: DataFormat::Chw,
                ..
            } => self.data[c * self.height * self.width + y * self.width + x],
            PanelKind::Grayscale { .. } => self.data[y * self.width + x],
        }
    }
}
