//! Animation clips and the per-model animation mixer

use crate::scene::{NodeId, SceneGraph};
use crate::transform::NodeTransform;
use nalgebra::{UnitQuaternion, Vector3};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackProperty {
    Translation,
    Rotation,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackValues {
    Vec3(Vec<Vector3<f32>>),
    Quat(Vec<UnitQuaternion<f32>>),
}

impl TrackValues {
    pub fn len(&self) -> usize {
        match self {
            TrackValues::Vec3(v) => v.len(),
            TrackValues::Quat(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keyframes driving one property of one asset node
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Index into the asset's node list
    pub target: usize,
    pub property: TrackProperty,
    pub interpolation: Interpolation,
    pub times: Vec<f32>,
    pub values: TrackValues,
}

impl Track {
    /// Keyframe pair around `t` and the blend factor between them
    fn locate(&self, t: f32) -> Option<(usize, usize, f32)> {
        let n = self.times.len().min(self.values.len());
        if n == 0 {
            return None;
        }
        if t <= self.times[0] || n == 1 {
            return Some((0, 0, 0.0));
        }
        if t >= self.times[n - 1] {
            return Some((n - 1, n - 1, 0.0));
        }
        // first keyframe strictly after t
        let next = self.times[..n].partition_point(|&k| k <= t);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        let alpha = match self.interpolation {
            Interpolation::Step => 0.0,
            Interpolation::Linear if span > 0.0 => (t - self.times[prev]) / span,
            Interpolation::Linear => 0.0,
        };
        Some((prev, next, alpha))
    }

    /// Apply the sampled value at `t` to a transform
    pub fn apply(&self, t: f32, transform: &mut NodeTransform) {
        let Some((a, b, alpha)) = self.locate(t) else {
            return;
        };
        match (&self.values, self.property) {
            (TrackValues::Vec3(v), TrackProperty::Translation) => {
                transform.translation = v[a].lerp(&v[b], alpha);
            }
            (TrackValues::Vec3(v), TrackProperty::Scale) => {
                transform.scale = v[a].lerp(&v[b], alpha);
            }
            (TrackValues::Quat(q), TrackProperty::Rotation) => {
                transform.rotation = q[a].try_slerp(&q[b], alpha, 1.0e-6).unwrap_or(q[a]);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    /// Clip whose duration is the last keyframe time across its tracks
    pub fn from_tracks(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks
            .iter()
            .filter_map(|t| t.times.last().copied())
            .fold(0.0f32, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    /// Repeat forever
    Repeat,
}

/// A clip bound to a mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionHandle(usize);

#[derive(Debug)]
struct Action {
    clip: Arc<AnimationClip>,
    bindings: Vec<Option<NodeId>>,
    rest_pose: Vec<(NodeId, NodeTransform)>,
    time: f32,
    running: bool,
    loop_mode: LoopMode,
    clamp_when_finished: bool,
}

/// Drives the actions of one model; advanced once per frame
#[derive(Debug)]
pub struct AnimationMixer {
    root: NodeId,
    actions: Vec<Action>,
}

impl AnimationMixer {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            actions: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Bind a clip. `node_map` translates the clip's asset node indices to
    /// scene nodes; the current transforms of the targets become the pose
    /// restored by [`AnimationMixer::stop`].
    pub fn clip_action(
        &mut self,
        clip: Arc<AnimationClip>,
        node_map: &[NodeId],
        scene: &SceneGraph,
    ) -> ActionHandle {
        let bindings: Vec<Option<NodeId>> = clip
            .tracks
            .iter()
            .map(|t| node_map.get(t.target).copied())
            .collect();

        let mut rest_pose: Vec<(NodeId, NodeTransform)> = Vec::new();
        for id in bindings.iter().flatten() {
            if rest_pose.iter().any(|(n, _)| n == id) {
                continue;
            }
            if let Ok(node) = scene.node(*id) {
                rest_pose.push((*id, node.transform));
            }
        }

        self.actions.push(Action {
            clip,
            bindings,
            rest_pose,
            time: 0.0,
            running: false,
            loop_mode: LoopMode::Repeat,
            clamp_when_finished: false,
        });
        ActionHandle(self.actions.len() - 1)
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn set_loop(&mut self, handle: ActionHandle, mode: LoopMode) {
        if let Some(a) = self.actions.get_mut(handle.0) {
            a.loop_mode = mode;
        }
    }

    pub fn set_clamp_when_finished(&mut self, handle: ActionHandle, clamp: bool) {
        if let Some(a) = self.actions.get_mut(handle.0) {
            a.clamp_when_finished = clamp;
        }
    }

    pub fn play(&mut self, handle: ActionHandle) {
        if let Some(a) = self.actions.get_mut(handle.0) {
            a.running = true;
        }
    }

    /// Stop, rewind and put the targets back in their bind pose
    pub fn stop(&mut self, handle: ActionHandle, scene: &mut SceneGraph) {
        let Some(a) = self.actions.get_mut(handle.0) else {
            return;
        };
        a.running = false;
        a.time = 0.0;
        for (id, pose) in &a.rest_pose {
            if let Ok(node) = scene.node_mut(*id) {
                node.transform = *pose;
            }
        }
    }

    pub fn is_running(&self, handle: ActionHandle) -> bool {
        self.actions.get(handle.0).map(|a| a.running).unwrap_or(false)
    }

    pub fn time(&self, handle: ActionHandle) -> Option<f32> {
        self.actions.get(handle.0).map(|a| a.time)
    }

    pub fn clip(&self, handle: ActionHandle) -> Option<&AnimationClip> {
        self.actions.get(handle.0).map(|a| a.clip.as_ref())
    }

    /// Advance running actions by `delta` seconds and write their poses
    pub fn update(&mut self, delta: f32, scene: &mut SceneGraph) {
        for action in self.actions.iter_mut().filter(|a| a.running) {
            let duration = action.clip.duration;
            action.time += delta.max(0.0);

            match action.loop_mode {
                LoopMode::Repeat if duration > 0.0 => {
                    action.time = action.time.rem_euclid(duration);
                }
                LoopMode::Repeat => action.time = 0.0,
                LoopMode::Once if action.time >= duration => {
                    action.time = duration;
                    if !action.clamp_when_finished {
                        action.running = false;
                        action.time = 0.0;
                        for (id, pose) in &action.rest_pose {
                            if let Ok(node) = scene.node_mut(*id) {
                                node.transform = *pose;
                            }
                        }
                        continue;
                    }
                }
                LoopMode::Once => {}
            }

            for (track, binding) in action.clip.tracks.iter().zip(&action.bindings) {
                let Some(id) = binding else {
                    continue;
                };
                if let Ok(node) = scene.node_mut(*id) {
                    track.apply(action.time, &mut node.transform);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeKind;
    use approx::assert_relative_eq;

    fn slide_clip() -> AnimationClip {
        AnimationClip::from_tracks(
            "slide",
            vec![Track {
                target: 0,
                property: TrackProperty::Translation,
                interpolation: Interpolation::Linear,
                times: vec![0.0, 2.0],
                values: TrackValues::Vec3(vec![Vector3::zeros(), Vector3::new(4.0, 0.0, 0.0)]),
            }],
        )
    }

    fn setup() -> (SceneGraph, NodeId, AnimationMixer, ActionHandle) {
        let mut scene = SceneGraph::new();
        let node = scene.create_node("n", NodeKind::Group);
        let mut mixer = AnimationMixer::new(node);
        let h = mixer.clip_action(Arc::new(slide_clip()), &[node], &scene);
        (scene, node, mixer, h)
    }

    #[test]
    fn test_duration_from_tracks() {
        assert_relative_eq!(slide_clip().duration, 2.0);
    }

    #[test]
    fn test_linear_sampling() {
        let (mut scene, node, mut mixer, h) = setup();
        mixer.play(h);
        mixer.update(0.5, &mut scene);
        assert_relative_eq!(scene.node(node).unwrap().transform.translation.x, 1.0);
    }

    #[test]
    fn test_idle_action_does_not_move() {
        let (mut scene, node, mut mixer, _h) = setup();
        mixer.update(1.0, &mut scene);
        assert_relative_eq!(scene.node(node).unwrap().transform.translation.x, 0.0);
    }

    #[test]
    fn test_repeat_wraps_time() {
        let (mut scene, _node, mut mixer, h) = setup();
        mixer.play(h);
        mixer.update(2.5, &mut scene);
        assert_relative_eq!(mixer.time(h).unwrap(), 0.5);
        assert!(mixer.is_running(h));
    }

    #[test]
    fn test_once_with_clamp_holds_last_frame() {
        let (mut scene, node, mut mixer, h) = setup();
        mixer.set_loop(h, LoopMode::Once);
        mixer.set_clamp_when_finished(h, true);
        mixer.play(h);
        mixer.update(5.0, &mut scene);
        assert_relative_eq!(scene.node(node).unwrap().transform.translation.x, 4.0);
    }

    #[test]
    fn test_stop_restores_rest_pose() {
        let (mut scene, node, mut mixer, h) = setup();
        mixer.play(h);
        mixer.update(1.0, &mut scene);
        mixer.stop(h, &mut scene);
        assert!(!mixer.is_running(h));
        assert_relative_eq!(mixer.time(h).unwrap(), 0.0);
        assert_relative_eq!(scene.node(node).unwrap().transform.translation.x, 0.0);
    }

    #[test]
    fn test_step_interpolation_holds_previous_key() {
        let mut track = slide_clip().tracks.remove(0);
        track.interpolation = Interpolation::Step;
        let mut t = NodeTransform::identity();
        track.apply(1.9, &mut t);
        assert_relative_eq!(t.translation.x, 0.0);
    }
}
