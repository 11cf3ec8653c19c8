// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Listener and emitter handles for positional cues.
//!
//! Both are cheap to clone and shared between the game code that moves them and the
//! cues that read them every tick.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use parking_lot::RwLock;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pose {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    velocity: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Pose {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            velocity: Vec3::ZERO,
        }
    }
}

macro_rules! pose_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default)]
        pub struct $name {
            pose: Arc<RwLock<Pose>>,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn position(&self) -> Vec3 {
                self.pose.read().position
            }

            pub fn set_position(&self, position: Vec3) {
                self.pose.write().position = position;
            }

            pub fn forward(&self) -> Vec3 {
                self.pose.read().forward
            }

            pub fn set_forward(&self, forward: Vec3) {
                self.pose.write().forward = forward;
            }

            pub fn up(&self) -> Vec3 {
                self.pose.read().up
            }

            pub fn set_up(&self, up: Vec3) {
                self.pose.write().up = up;
            }

            pub fn velocity(&self) -> Vec3 {
                self.pose.read().velocity
            }

            pub fn set_velocity(&self, velocity: Vec3) {
                self.pose.write().velocity = velocity;
            }

            fn pose(&self) -> Pose {
                *self.pose.read()
            }
        }
    };
}

pose_handle!(
    /// The point of view positional cues are heard from.
    AudioListener
);
pose_handle!(
    /// Where a positional cue is emitted from.
    AudioEmitter
);

/// Placement of an emitter relative to a listener.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Emitter position in listener space. The listener faces -Z with +Y up.
    pub position: Vec3,
    /// Distance between emitter and listener in world units.
    pub distance: f32,
}

/// Places `emitter` in the space of `listener`.
pub fn placement(listener: &AudioListener, emitter: &AudioEmitter) -> Placement {
    let listener = listener.pose();
    let emitter = emitter.pose();

    // A degenerate orientation falls back to the default one.
    let (forward, up) = match (listener.forward.try_normalize(), listener.up.try_normalize()) {
        (Some(forward), Some(up)) if forward.cross(up).length_squared() > f32::EPSILON => {
            (forward, up)
        }
        _ => (Vec3::NEG_Z, Vec3::Y),
    };

    let view = Mat4::look_to_rh(listener.position, forward, up);
    Placement {
        position: view.transform_point3(emitter.position),
        distance: listener.position.distance(emitter.position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Vec3, expected: Vec3) {
        assert!(
            actual.abs_diff_eq(expected, 1e-5),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_default_listener_is_identity() {
        let listener = AudioListener::new();
        let emitter = AudioEmitter::new();
        emitter.set_position(Vec3::new(1.0, 2.0, -3.0));

        let placement = placement(&listener, &emitter);
        assert_close(placement.position, Vec3::new(1.0, 2.0, -3.0));
        assert!((placement.distance - 14.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_listener_translation_and_rotation() {
        let listener = AudioListener::new();
        listener.set_position(Vec3::new(10.0, 0.0, 0.0));
        // Facing +X puts the world +X axis straight ahead.
        listener.set_forward(Vec3::X);

        let emitter = AudioEmitter::new();
        emitter.set_position(Vec3::new(15.0, 0.0, 0.0));

        let placement = placement(&listener, &emitter);
        assert_close(placement.position, Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(placement.distance, 5.0);
    }

    #[test]
    fn test_handles_share_state() {
        let emitter = AudioEmitter::new();
        let clone = emitter.clone();
        clone.set_position(Vec3::ONE);
        clone.set_velocity(Vec3::X);
        assert_eq!(emitter.position(), Vec3::ONE);
        assert_eq!(emitter.velocity(), Vec3::X);
    }

    #[test]
    fn test_degenerate_orientation() {
        let listener = AudioListener::new();
        listener.set_forward(Vec3::Y);
        listener.set_up(Vec3::Y);
        let emitter = AudioEmitter::new();
        emitter.set_position(Vec3::new(0.0, 0.0, -2.0));

        let placement = placement(&listener, &emitter);
        assert_close(placement.position, Vec3::new(0.0, 0.0, -2.0));
    }
}
