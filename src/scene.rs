// src/scene.rs - Renderer-facing interface
use crate::config::RenderSettings;
use crate::occlusion::OccluderTransform;
use crate::pose::RenderTransform;

/// What the pipeline needs from a 3D scene.
pub trait SceneSink {
    fn set_object_transform(&mut self, transform: &RenderTransform);
    /// Creates or moves the depth-only mask; `None` hides it.
    fn set_occluder(&mut self, occluder: Option<&OccluderTransform>);
    fn apply_render_settings(&mut self, settings: &RenderSettings);
}

/// Keeps the last values it was given. Used by the replay tool and in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingScene {
    pub object: Option<RenderTransform>,
    pub occluder: Option<OccluderTransform>,
    pub occluder_created: bool,
    pub object_updates: usize,
    pub render_settings: Option<RenderSettings>,
}

impl SceneSink for RecordingScene {
    fn set_object_transform(&mut self, transform: &RenderTransform) {
        self.object = Some(*transform);
        self.object_updates += 1;
    }

    fn set_occluder(&mut self, occluder: Option<&OccluderTransform>) {
        match occluder {
            Some(o) => {
                self.occluder_created = true;
                self.occluder = Some(*o);
            }
            None => self.occluder = None,
        }
    }

    fn apply_render_settings(&mut self, settings: &RenderSettings) {
        self.render_settings = Some(*settings);
    }
}
