//! Tile planning for frames larger than one GPU draw can address.
//!
//! A frame is split into a row-major grid of tiles no larger than the
//! device's maximum texture extent. Tiles in the final row and column are
//! sized to the remainder, never padded, so the union of all destination
//! rects covers the frame exactly with no overlap. Each tile renders with a
//! viewport equal to its pixel size; any mismatch there shows up as seams
//! between tiles.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TilingError {
    #[error("invalid dimensions: image {0}x{1}, max tile {2}x{3}")]
    InvalidDimensions(i64, i64, i64, i64),
}

/// An axis-aligned pixel rectangle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, other: &PixelRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// A pixel extent (width, height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One independently renderable sub-region of a frame.
///
/// `source_rect` is read from the input image, the draw runs at
/// `viewport` size (always 1:1 with the tile's pixel size) and the result
/// lands in `dest_rect` of the output image. For a pure per-pixel color
/// pass source and destination coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub source_rect: PixelRect,
    pub dest_rect: PixelRect,
    pub viewport: Extent,
}

/// Plan the tile grid for an `image_size` frame given the largest tile a
/// single draw may address.
///
/// Tiles come back in row-major order, top-left to bottom-right; callers
/// rely on that ordering when composing output deterministically. Zero or
/// negative dimensions on either argument are rejected, as are dimensions
/// beyond `u32::MAX` (pixel rects are 32-bit; a silent cast would wrap).
pub fn plan(image_size: (i64, i64), max_tile_size: (i64, i64)) -> Result<Vec<Tile>, TilingError> {
    let (width, height) = image_size;
    let (max_w, max_h) = max_tile_size;
    let in_range = |v: i64| v > 0 && v <= u32::MAX as i64;
    if !(in_range(width) && in_range(height) && in_range(max_w) && in_range(max_h)) {
        return Err(TilingError::InvalidDimensions(width, height, max_w, max_h));
    }

    let (width, height) = (width as u32, height as u32);
    let (max_w, max_h) = (max_w as u32, max_h as u32);

    let cols = width.div_ceil(max_w);
    let rows = height.div_ceil(max_h);
    let mut tiles = Vec::with_capacity((cols * rows) as usize);

    for row in 0..rows {
        let y = row * max_h;
        let tile_h = (height - y).min(max_h);
        for col in 0..cols {
            let x = col * max_w;
            let tile_w = (width - x).min(max_w);
            let rect = PixelRect::new(x, y, tile_w, tile_h);
            tiles.push(Tile {
                source_rect: rect,
                dest_rect: rect,
                viewport: Extent::new(tile_w, tile_h),
            });
        }
    }

    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_1000_square_into_four_remainder_tiles() {
        let tiles = plan((1000, 1000), (512, 512)).unwrap();
        let sizes: Vec<_> = tiles
            .iter()
            .map(|t| (t.dest_rect.width, t.dest_rect.height))
            .collect();
        assert_eq!(sizes, vec![(512, 512), (488, 512), (512, 488), (488, 488)]);
    }

    #[test]
    fn single_tile_when_image_fits() {
        let tiles = plan((300, 200), (512, 512)).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].dest_rect, PixelRect::new(0, 0, 300, 200));
        assert_eq!(tiles[0].viewport, Extent::new(300, 200));
    }

    #[test]
    fn tiles_are_row_major() {
        let tiles = plan((1024, 1024), (512, 512)).unwrap();
        let origins: Vec<_> = tiles.iter().map(|t| (t.dest_rect.x, t.dest_rect.y)).collect();
        assert_eq!(origins, vec![(0, 0), (512, 0), (0, 512), (512, 512)]);
    }

    #[test]
    fn viewport_matches_tile_pixels() {
        for tile in plan((1000, 700), (512, 256)).unwrap() {
            assert_eq!(tile.viewport.width, tile.dest_rect.width);
            assert_eq!(tile.viewport.height, tile.dest_rect.height);
        }
    }

    #[test]
    fn coverage_has_no_gaps_or_overlaps() {
        let (w, h) = (1000u32, 700u32);
        let tiles = plan((w as i64, h as i64), (512, 256)).unwrap();

        let total_area: u64 = tiles
            .iter()
            .map(|t| t.dest_rect.width as u64 * t.dest_rect.height as u64)
            .sum();
        assert_eq!(total_area, w as u64 * h as u64);

        let frame = PixelRect::new(0, 0, w, h);
        for (i, a) in tiles.iter().enumerate() {
            assert!(frame.contains(&a.dest_rect));
            assert!(a.dest_rect.width <= 512 && a.dest_rect.height <= 256);
            for b in &tiles[i + 1..] {
                assert!(!a.dest_rect.intersects(&b.dest_rect));
            }
        }
    }

    #[test]
    fn rejects_invalid_dimensions() {
        assert!(matches!(
            plan((0, 100), (512, 512)),
            Err(TilingError::InvalidDimensions(..))
        ));
        assert!(matches!(
            plan((100, -1), (512, 512)),
            Err(TilingError::InvalidDimensions(..))
        ));
        assert!(matches!(
            plan((100, 100), (0, 512)),
            Err(TilingError::InvalidDimensions(..))
        ));
        assert!(matches!(
            plan((100, 100), (512, -7)),
            Err(TilingError::InvalidDimensions(..))
        ));
    }

    #[test]
    fn rejects_dimensions_beyond_u32() {
        // Above u32::MAX the old cast wrapped: 2^32 + 100 became width 100
        // and planning "succeeded" with a bogus grid.
        let too_wide = u32::MAX as i64 + 101;
        assert!(matches!(
            plan((too_wide, 100), (512, 512)),
            Err(TilingError::InvalidDimensions(..))
        ));
        assert!(matches!(
            plan((100, too_wide), (512, 512)),
            Err(TilingError::InvalidDimensions(..))
        ));
        assert!(matches!(
            plan((100, 100), (too_wide, 512)),
            Err(TilingError::InvalidDimensions(..))
        ));
        // The boundary itself is still a valid dimension.
        assert!(plan((u32::MAX as i64, 1), (u32::MAX as i64, 1)).is_ok());
    }
}
