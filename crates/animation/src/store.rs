use crate::{AnimationError, Brightness, Frame, HueSaturation, ParameterId, ParameterTrack};

/// The host-owned keyframe storage behind the plugin boundary.
///
/// The host keeps the authoritative parameter tracks (and persists them in
/// its own project format); the core only reads a snapshot per render call
/// and writes back edits. Nothing here assumes an ownership or lifetime
/// model beyond "valid for the duration of one call".
pub trait ParameterStore {
    fn hue_saturation_track(&self) -> Result<ParameterTrack<HueSaturation>, AnimationError>;
    fn brightness_track(&self) -> Result<ParameterTrack<Brightness>, AnimationError>;

    fn set_hue_saturation_track(
        &mut self,
        track: ParameterTrack<HueSaturation>,
    ) -> Result<(), AnimationError>;
    fn set_brightness_track(&mut self, track: ParameterTrack<Brightness>) -> Result<(), AnimationError>;

    /// The host timeline's playhead at render invocation.
    fn current_time(&self) -> Frame;
}

/// In-memory store used by tests and the headless CLI in place of a real
/// host.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    hue_saturation: ParameterTrack<HueSaturation>,
    brightness: ParameterTrack<Brightness>,
    time: Frame,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            hue_saturation: ParameterTrack::new(HueSaturation::default()),
            brightness: ParameterTrack::new(Brightness::default()),
            time: 0,
        }
    }

    pub fn set_time(&mut self, time: Frame) {
        self.time = time;
    }

    pub fn has_track(&self, id: ParameterId) -> bool {
        match id {
            ParameterId::HueSaturation => !self.hue_saturation.is_empty(),
            ParameterId::Brightness => !self.brightness.is_empty(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore for MemoryStore {
    fn hue_saturation_track(&self) -> Result<ParameterTrack<HueSaturation>, AnimationError> {
        Ok(self.hue_saturation.clone())
    }

    fn brightness_track(&self) -> Result<ParameterTrack<Brightness>, AnimationError> {
        Ok(self.brightness.clone())
    }

    fn set_hue_saturation_track(
        &mut self,
        track: ParameterTrack<HueSaturation>,
    ) -> Result<(), AnimationError> {
        self.hue_saturation = track;
        Ok(())
    }

    fn set_brightness_track(&mut self, track: ParameterTrack<Brightness>) -> Result<(), AnimationError> {
        self.brightness = track;
        Ok(())
    }

    fn current_time(&self) -> Frame {
        self.time
    }
}
