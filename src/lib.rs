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

//! A cue-based interactive audio runtime.
//!
//! Cues are grouped into categories that bound their polyphony. Each cue resolves to
//! one of several authored sounds, whose voices are shaped every tick by runtime
//! parameter curves and routed through DSP presets, on top of a pluggable
//! [`backend::Backend`].

pub mod backend;
pub mod config;
pub mod device;
pub mod instance;
pub mod positional;
#[cfg(test)]
mod testutil;
pub mod xact;

pub use self::xact::{AudioError, AudioRuntime};
