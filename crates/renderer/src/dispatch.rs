//! Concurrent tile dispatch.
//!
//! Tiles are independent: each reads its own source rect and writes its own
//! destination rect, so a frame fans out across a fixed pool of worker
//! threads with no shared mutable state. Cancellation is cooperative: no
//! new tiles are handed out once the token trips, in-flight tiles run to
//! completion, and the caller discards the partial frame. Nothing is
//! retried here; retry policy belongs to the frame-level caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use tracing::debug;

use crate::{cpu, FrameBuffer, PassParams, RenderError};

/// Shared flag for cancelling a frame render mid-flight.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Render a frame with the CPU pass fanned out over `workers` threads.
///
/// Tiles are planned in row-major order and composed by index, so output
/// is deterministic regardless of completion order. On cancellation the
/// partial output is dropped and [`RenderError::Cancelled`] returned; on a
/// tile failure the error of the earliest tile is returned.
pub fn render_frame_parallel(
    source: &FrameBuffer,
    pass: &PassParams,
    max_tile: (i64, i64),
    workers: usize,
    cancel: &CancelToken,
) -> Result<FrameBuffer, RenderError> {
    let tiles = tiling::plan((source.width as i64, source.height as i64), max_tile)?;
    let workers = workers.max(1).min(tiles.len().max(1));

    let (tile_tx, tile_rx) = unbounded();
    let (result_tx, result_rx) = unbounded();

    let mut dispatched = 0usize;
    for (idx, tile) in tiles.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        tile_tx.send((idx, *tile)).expect("tile receiver alive");
        dispatched += 1;
    }
    drop(tile_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let tile_rx = tile_rx.clone();
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();
            scope.spawn(move || {
                for (idx, tile) in tile_rx.iter() {
                    if cancel.is_cancelled() {
                        // Undispatched work is dropped; this tile was never
                        // started so there is nothing to finish.
                        continue;
                    }
                    let result = cpu::render_tile(&tile, source, pass);
                    if result_tx.send((idx, tile, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let mut output = FrameBuffer::new(source.width, source.height);
        let mut completed = 0usize;
        let mut first_error: Option<(usize, RenderError)> = None;

        for (idx, tile, result) in result_rx.iter() {
            match result {
                Ok(pixels) => {
                    output.write_rect(&tile.dest_rect, &pixels)?;
                    completed += 1;
                }
                Err(err) => {
                    debug!(tile_index = idx, error = %err, "tile render failed");
                    if first_error.as_ref().map_or(true, |(i, _)| idx < *i) {
                        first_error = Some((idx, err));
                    }
                }
            }
        }

        if let Some((_, err)) = first_error {
            return Err(err);
        }
        if cancel.is_cancelled() || completed < tiles.len() {
            return Err(RenderError::Cancelled);
        }
        debug_assert_eq!(completed, dispatched);
        Ok(output)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use animation::ColorCorrection;

    fn ramp_frame(width: u32, height: u32) -> FrameBuffer {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[(x * 3 % 256) as u8, (y * 5 % 256) as u8, 60, 255]);
            }
        }
        FrameBuffer::from_pixels(width, height, pixels)
    }

    #[test]
    fn parallel_render_matches_sequential() {
        let frame = ramp_frame(120, 90);
        let pass = PassParams::HueSaturation(ColorCorrection {
            hue_radians: 2.5,
            saturation: 0.4,
        });
        let sequential = cpu::render_frame(&frame, &pass);
        for workers in [1, 2, 8] {
            let parallel =
                render_frame_parallel(&frame, &pass, (32, 32), workers, &CancelToken::new())
                    .unwrap();
            assert_eq!(parallel.pixels, sequential.pixels, "workers {workers}");
        }
    }

    #[test]
    fn cancelled_before_start_returns_cancelled() {
        let frame = ramp_frame(64, 64);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result =
            render_frame_parallel(&frame, &PassParams::Brightness(1.1), (16, 16), 4, &cancel);
        assert!(matches!(result, Err(RenderError::Cancelled)));
    }

    #[test]
    fn invalid_plan_surfaces_tiling_error() {
        let frame = ramp_frame(8, 8);
        let result = render_frame_parallel(
            &frame,
            &PassParams::Brightness(1.0),
            (0, 16),
            2,
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(RenderError::Tiling(_))));
    }
}
