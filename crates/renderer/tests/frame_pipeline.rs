//! End-to-end: resolve keyframed parameters at a frame, then render tiled.

use animation::{
    Angle, Brightness, HueSaturation, Keyframe, MemoryStore, ParameterStore, ParameterTrack,
};
use renderer::{cpu, CancelToken, FrameBuffer, PassParams};

fn checker_frame(width: u32, height: u32) -> FrameBuffer {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let on = (x / 8 + y / 8) % 2 == 0;
            pixels.extend_from_slice(if on {
                &[200, 40, 40, 255]
            } else {
                &[40, 40, 200, 255]
            });
        }
    }
    FrameBuffer::from_pixels(width, height, pixels)
}

fn animated_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    let track = ParameterTrack::with_keyframes(
        HueSaturation::default(),
        [
            Keyframe {
                time: 0,
                value: HueSaturation::new(Angle::from_degrees(350.0), 0.2),
            },
            Keyframe {
                time: 100,
                value: HueSaturation::new(Angle::from_degrees(10.0), 0.8),
            },
        ],
    );
    store.set_hue_saturation_track(track).unwrap();
    store
}

#[test]
fn animated_tiled_frame_matches_untiled() {
    let mut store = animated_store();
    store.set_time(50);

    let resolved = store
        .hue_saturation_track()
        .unwrap()
        .value_at(store.current_time())
        .unwrap()
        .resolve();
    // Midway between 350° and 10° crosses the wrap, landing on 0° (or a
    // float ulp shy of 2π, which is the same direction).
    let hue = resolved.hue_radians;
    assert!(hue.abs() < 1e-4 || (std::f32::consts::TAU - hue).abs() < 1e-4);
    assert!((resolved.saturation - 0.5).abs() < 1e-6);

    let frame = checker_frame(100, 100);
    let pass = PassParams::HueSaturation(resolved);

    let untiled = cpu::render_frame(&frame, &pass);
    let tiled = cpu::render_frame_tiled(&frame, &pass, (48, 48)).unwrap();
    let parallel =
        renderer::render_frame_parallel(&frame, &pass, (48, 48), 4, &CancelToken::new()).unwrap();

    assert_eq!(tiled.pixels, untiled.pixels);
    assert_eq!(parallel.pixels, untiled.pixels);
}

#[test]
fn brightness_track_drives_the_parallel_pipeline() {
    let mut store = MemoryStore::new();
    let mut track = ParameterTrack::new(Brightness::default());
    track.set_keyframe(Keyframe {
        time: 0,
        value: Brightness::new(1.0),
    });
    track.set_keyframe(Keyframe {
        time: 10,
        value: Brightness::new(2.0),
    });
    store.set_brightness_track(track).unwrap();
    store.set_time(5);

    let brightness = store
        .brightness_track()
        .unwrap()
        .value_at(store.current_time())
        .unwrap()
        .resolve();
    assert!((brightness - 1.5).abs() < 1e-6);

    let frame = checker_frame(64, 64);
    let pass = PassParams::Brightness(brightness);
    let untiled = cpu::render_frame(&frame, &pass);
    let tiled = cpu::render_frame_tiled(&frame, &pass, (20, 20)).unwrap();
    assert_eq!(tiled.pixels, untiled.pixels);
}

#[test]
fn boundary_times_hold_keyframe_values() {
    let store = animated_store();
    let track = store.hue_saturation_track().unwrap();

    let before = track.value_at(-50).unwrap();
    assert_eq!(before.hue, Angle::from_degrees(350.0));
    let after = track.value_at(500).unwrap();
    assert_eq!(after.hue, Angle::from_degrees(10.0));
}
