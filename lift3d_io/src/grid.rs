//! Panel rasterization and horizontal grid composition.

use image::{Rgb, RgbImage};
use lift3d_core::{Colormap, ImagePanel, PanelKind};

use crate::error::{Lift3dIoError, Result};

/// Rasterize one panel to an 8-bit RGB image.
pub fn panel_to_image(panel: &ImagePanel) -> Result<RgbImage> {
    panel.validate()?;

    let mut img = RgbImage::new(panel.width as u32, panel.height as u32);
    for y in 0..panel.height {
        for x in 0..panel.width {
            let pixel = match panel.kind {
                PanelKind::Rgb { .. } => {
                    let mut rgb = [0u8; 3];
                    for (c, out) in rgb.iter_mut().enumerate() {
                        *out = to_u8(panel.normalize_value(panel.value_at(y, x, c)));
                    }
                    rgb
                }
                PanelKind::Grayscale { cmap, .. } => {
                    let v = panel.normalize_value(panel.value_at(y, x, 0));
                    match cmap {
                        None => {
                            let g = to_u8(v);
                            [g, g, g]
                        }
                        Some(Colormap::Jet) => jet(v),
                    }
                }
            };
            img.put_pixel(x as u32, y as u32, Rgb(pixel));
        }
    }
    Ok(img)
}

/// Rasterize panels and place them side by side, left to right.
///
/// All panels must share the same height.
pub fn compose_grid(panels: &[ImagePanel]) -> Result<RgbImage> {
    let first = panels.first().ok_or(Lift3dIoError::EmptyGrid)?;
    let height = first.height;

    for panel in panels {
        if panel.height != height {
            return Err(Lift3dIoError::HeightMismatch {
                expected: height,
                got: panel.height,
            });
        }
    }

    let total_width: usize = panels.iter().map(|p| p.width).sum();
    let mut grid = RgbImage::new(total_width as u32, height as u32);

    let mut x_offset = 0u32;
    for panel in panels {
        let img = panel_to_image(panel)?;
        for (x, y, pixel) in img.enumerate_pixels() {
            grid.put_pixel(x_offset + x, y, *pixel);
        }
        x_offset += img.width();
    }

    Ok(grid)
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Jet colormap for a value in `[0, 1]`.
pub fn jet(v: f32) -> [u8; 3] {
    let v = v.clamp(0.0, 1.0);
    let r = (1.5 - (4.0 * v - 3.0).abs()).clamp(0.0, 1.0);
    let g = (1.5 - (4.0 * v - 2.0).abs()).clamp(0.0, 1.0);
    let b = (1.5 - (4.0 * v - 1.0).abs()).clamp(0.0, 1.0);
    [to_u8(r), to_u8(g), to_u8(b)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lift3d_core::DataFormat;

    #[test]
    fn test_rgb_panel_pixels() {
        let panel = ImagePanel::rgb(1, 2, vec![1.0, 0.0, 0.0, 0.0, 0.5, 2.0]);
        let img = panel_to_image(&panel).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
        // 0.5 → 128, 2.0 clipped to 1.0 → 255
        assert_eq!(img.get_pixel(1, 0).0, [0, 128, 255]);
    }

    #[test]
    fn test_chw_matches_hwc() {
        let hwc = ImagePanel::rgb(1, 2, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let chw = ImagePanel::rgb(1, 2, vec![0.1, 0.4, 0.2, 0.5, 0.3, 0.6])
            .with_data_format(DataFormat::Chw);
        assert_eq!(panel_to_image(&hwc).unwrap(), panel_to_image(&chw).unwrap());
    }

    #[test]
    fn test_grayscale_replicates_channels() {
        let panel = ImagePanel::grayscale(1, 1, vec![1.0]);
        let img = panel_to_image(&panel).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(jet(0.0), [0, 0, 128]);
        assert_eq!(jet(1.0), [128, 0, 0]);
        assert_eq!(jet(0.5), [128, 255, 128]);
    }

    #[test]
    fn test_compose_widths() {
        let a = ImagePanel::rgb(2, 3, vec![0.0; 18]);
        let b = ImagePanel::grayscale(2, 4, vec![1.0; 8]);
        let grid = compose_grid(&[a, b]).unwrap();
        assert_eq!(grid.dimensions(), (7, 2));
        assert_eq!(grid.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(grid.get_pixel(3, 1).0, [255, 255, 255]);
    }

    #[test]
    fn test_compose_height_mismatch() {
        let a = ImagePanel::rgb(2, 2, vec![0.0; 12]);
        let b = ImagePanel::grayscale(3, 2, vec![0.0; 6]);
        assert!(matches!(
            compose_grid(&[a, b]),
            Err(Lift3dIoError::HeightMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_compose_empty() {
        assert!(matches!(compose_grid(&[]), Err(Lift3dIoError::EmptyGrid)));
    }
}
