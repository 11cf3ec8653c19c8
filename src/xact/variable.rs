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
use serde::Serialize;

/// Cue volume as a linear multiplier. Categories drive it for crossfades.
pub const VOLUME: &str = "Volume";

/// Number of active cues in the category sharing the cue's name.
pub const NUM_CUE_INSTANCES: &str = "NumCueInstances";

/// Distance between a positional cue's emitter and listener.
pub const DISTANCE: &str = "Distance";

/// A named scalar that is always kept within its bounds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Variable {
    name: String,
    public: bool,
    read_only: bool,
    global: bool,
    reserved: bool,
    value: f32,
    min: f32,
    max: f32,
}

impl Variable {
    /// A public, writable, cue-local variable.
    pub fn new(name: &str, value: f32, min: f32, max: f32) -> Variable {
        let mut variable = Variable {
            name: name.to_string(),
            public: true,
            read_only: false,
            global: false,
            reserved: false,
            value: min,
            min: min.min(max),
            max: max.max(min),
        };
        variable.set_value(value);
        variable
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn with_reserved(mut self, reserved: bool) -> Self {
        self.reserved = reserved;
        self
    }

    /// The variables every cue carries regardless of authored data.
    pub fn reserved_cue_variables() -> Vec<Variable> {
        vec![
            Variable::new(VOLUME, 1.0, 0.0, f32::MAX).with_reserved(true),
            Variable::new(NUM_CUE_INSTANCES, 0.0, 0.0, f32::MAX)
                .with_reserved(true)
                .with_read_only(true),
            Variable::new(DISTANCE, 0.0, 0.0, f32::MAX)
                .with_reserved(true)
                .with_read_only(true),
        ]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Sets the value, clamping it to the variable's bounds. NaN clamps to the minimum.
    pub fn set_value(&mut self, value: f32) {
        self.value = value.max(self.min).min(self.max);
    }
}

/// Finds a variable by name.
pub(crate) fn find<'a>(variables: &'a [Variable], name: &str) -> Option<&'a Variable> {
    variables.iter().find(|variable| variable.name == name)
}

/// Finds a variable by name for writing.
pub(crate) fn find_mut<'a>(variables: &'a mut [Variable], name: &str) -> Option<&'a mut Variable> {
    variables.iter_mut().find(|variable| variable.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_clamps() {
        let mut variable = Variable::new("Speed", 0.0, -5.0, 5.0);
        for (input, expected) in [
            (3.0, 3.0),
            (5.0, 5.0),
            (5.1, 5.0),
            (-100.0, -5.0),
            (f32::INFINITY, 5.0),
            (f32::NEG_INFINITY, -5.0),
            (f32::NAN, -5.0),
        ] {
            variable.set_value(input);
            assert_eq!(variable.value(), expected, "input {input}");
        }
    }

    #[test]
    fn test_initial_value_clamped() {
        let variable = Variable::new("Rpm", 9000.0, 0.0, 8000.0);
        assert_eq!(variable.value(), 8000.0);
    }

    #[test]
    fn test_inverted_bounds_are_ordered() {
        let mut variable = Variable::new("Odd", 0.0, 10.0, -10.0);
        assert_eq!(variable.min(), -10.0);
        assert_eq!(variable.max(), 10.0);
        variable.set_value(20.0);
        assert_eq!(variable.value(), 10.0);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Variable::new("Surface", 1.0, 0.0, 10.0)
            .with_global(true)
            .with_read_only(true);
        let mut clone = original.clone();
        clone.set_value(4.0);

        assert_eq!(original.value(), 1.0);
        assert_eq!(clone.value(), 4.0);
        assert!(clone.is_global());
        assert!(clone.is_read_only());
        assert!(clone.is_public());
    }

    #[test]
    fn test_reserved_cue_variables() {
        let reserved = Variable::reserved_cue_variables();
        let volume = find(&reserved, VOLUME).unwrap();
        assert_eq!(volume.value(), 1.0);
        assert!(!volume.is_read_only());
        assert!(find(&reserved, NUM_CUE_INSTANCES).unwrap().is_read_only());
        assert!(find(&reserved, DISTANCE).unwrap().is_reserved());
    }
}
