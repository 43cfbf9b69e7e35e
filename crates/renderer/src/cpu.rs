//! CPU reference implementation of the color passes.
//!
//! Mirrors the WGSL fragment math operation for operation so tests (and
//! headless environments without an adapter) can run the exact transform
//! the GPU performs. The tiled entry points reuse the same planning as the
//! GPU path, which is what makes tiling-transparency testable end to end.

use std::f32::consts::TAU;

use tiling::Tile;

use crate::{FrameBuffer, PassParams, RenderError};

const SIXTH_TURN: f32 = TAU / 6.0;

/// RGB in `[0, 1]` to (hue radians `[0, 2π)`, saturation, value).
pub fn rgb_to_hsv(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb;
    let cmax = r.max(g).max(b);
    let cmin = r.min(g).min(b);
    let delta = cmax - cmin;

    let mut h = 0.0f32;
    if delta > 0.0 {
        h = if cmax == r {
            SIXTH_TURN * (((g - b) / delta) % 6.0)
        } else if cmax == g {
            SIXTH_TURN * (((b - r) / delta) + 2.0)
        } else {
            SIXTH_TURN * (((r - g) / delta) + 4.0)
        };
    }
    if h < 0.0 {
        h += TAU;
    }

    let s = if cmax > 0.0 { delta / cmax } else { 0.0 };
    [h, s, cmax]
}

pub fn hsv_to_rgb(hsv: [f32; 3]) -> [f32; 3] {
    let [h, s, v] = hsv;
    let c = v * s;
    let hp = h / SIXTH_TURN;
    let x = c * (1.0 - ((hp % 2.0) - 1.0).abs());
    let m = v - c;

    let rgb = if hp < 1.0 {
        [c, x, 0.0]
    } else if hp < 2.0 {
        [x, c, 0.0]
    } else if hp < 3.0 {
        [0.0, c, x]
    } else if hp < 4.0 {
        [0.0, x, c]
    } else if hp < 5.0 {
        [x, 0.0, c]
    } else {
        [c, 0.0, x]
    };

    [rgb[0] + m, rgb[1] + m, rgb[2] + m]
}

fn apply_to_pixel(pixel: [u8; 4], pass: &PassParams) -> [u8; 4] {
    let to_f = |v: u8| v as f32 / 255.0;
    let to_u = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;

    let rgb = [to_f(pixel[0]), to_f(pixel[1]), to_f(pixel[2])];
    let out = match pass {
        PassParams::HueSaturation(cc) => {
            let mut hsv = rgb_to_hsv(rgb);
            hsv[0] = (hsv[0] + cc.hue_radians) % TAU;
            hsv[1] = (hsv[1] * cc.saturation).clamp(0.0, 1.0);
            hsv_to_rgb(hsv)
        }
        PassParams::Brightness(b) => [rgb[0] * b, rgb[1] * b, rgb[2] * b],
    };

    [to_u(out[0]), to_u(out[1]), to_u(out[2]), pixel[3]]
}

/// Apply `pass` to tightly packed RGBA8 pixels in place.
fn apply_to_pixels(pixels: &mut [u8], pass: &PassParams) {
    for px in pixels.chunks_exact_mut(4) {
        let out = apply_to_pixel([px[0], px[1], px[2], px[3]], pass);
        px.copy_from_slice(&out);
    }
}

/// Render one tile on the CPU. Same contract as the GPU
/// [`GpuContext::render_tile`](crate::GpuContext::render_tile): reads only
/// the tile's source rect, fails with [`RenderError::TileBounds`] when it
/// falls outside the frame, returns the tile's pixels for the caller to
/// compose.
pub fn render_tile(
    tile: &Tile,
    source: &FrameBuffer,
    pass: &PassParams,
) -> Result<Vec<u8>, RenderError> {
    let mut pixels = source.sub_rect(&tile.source_rect)?;
    apply_to_pixels(&mut pixels, pass);
    Ok(pixels)
}

/// Render a whole frame untiled. The ground truth that tiled renders are
/// compared against.
pub fn render_frame(source: &FrameBuffer, pass: &PassParams) -> FrameBuffer {
    let mut output = source.clone();
    apply_to_pixels(&mut output.pixels, pass);
    output
}

/// Render a whole frame through the tile planner, sequentially.
pub fn render_frame_tiled(
    source: &FrameBuffer,
    pass: &PassParams,
    max_tile: (i64, i64),
) -> Result<FrameBuffer, RenderError> {
    let tiles = tiling::plan((source.width as i64, source.height as i64), max_tile)?;
    let mut output = FrameBuffer::new(source.width, source.height);
    for tile in &tiles {
        let pixels = render_tile(tile, source, pass)?;
        output.write_rect(&tile.dest_rect, &pixels)?;
    }
    Ok(output)
}
