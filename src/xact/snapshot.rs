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

use super::cue::CueStatus;
use super::variable::Variable;

/// Point-in-time view of the runtime, for reporting.
#[derive(Clone, Debug, Serialize)]
pub struct RuntimeSnapshot {
    pub master_volume: f32,
    pub active_instances: usize,
    pub active_streams: usize,
    pub globals: Vec<Variable>,
    pub categories: Vec<CategorySnapshot>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategorySnapshot {
    pub name: String,
    pub volume: f32,
    pub paused: bool,
    pub fading: bool,
    pub cues: Vec<CueSnapshot>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CueSnapshot {
    pub name: String,
    pub status: CueStatus,
    pub paused: bool,
    pub volume: f32,
    pub sound: Option<String>,
    pub voices: usize,
}
