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

//! Runtime parameter curves.

use serde::{Deserialize, Serialize};

/// Every curve output is limited to this magnitude.
pub const RPC_LIMIT: f32 = 10000.0;

/// The playback parameter a curve drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcParameter {
    /// Output in decibels, applied multiplicatively.
    Volume,
    /// Output in thousandths of an octave, applied additively.
    Pitch,
    ReverbSend,
    FilterFrequency,
    FilterQFactor,
}

/// Shape of the segment that starts at a point.
///
/// Only linear segments are evaluated; the other shapes are accepted and treated as
/// linear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveType {
    #[default]
    Linear,
    Fast,
    Slow,
    SinCos,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct RpcPoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub curve: CurveType,
}

impl RpcPoint {
    pub fn linear(x: f32, y: f32) -> RpcPoint {
        RpcPoint {
            x,
            y,
            curve: CurveType::Linear,
        }
    }
}

/// Maps the value of one variable onto one playback parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Rpc {
    name: String,
    variable: String,
    parameter: RpcParameter,
    /// Ordered by ascending x. Not sorted here.
    points: Vec<RpcPoint>,
}

impl Rpc {
    pub fn new(name: &str, variable: &str, parameter: RpcParameter, points: Vec<RpcPoint>) -> Rpc {
        Rpc {
            name: name.to_string(),
            variable: variable.to_string(),
            parameter,
            points,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variable whose value feeds the curve.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn parameter(&self) -> RpcParameter {
        self.parameter
    }

    pub fn points(&self) -> &[RpcPoint] {
        &self.points
    }

    /// Evaluates the curve at `input`.
    ///
    /// Between points the curve is linear. Outside the authored range the end point's
    /// y value is scaled by the ratio of `input` to the end point's x value. The
    /// result is always within [-`RPC_LIMIT`, `RPC_LIMIT`].
    pub fn evaluate(&self, input: f32) -> f32 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 0.0;
        };
        if input.is_nan() {
            return 0.0;
        }

        let result = if input == 0.0 && first.x == 0.0 {
            first.y
        } else if input <= first.x {
            first.y / (input / first.x)
        } else if input >= last.x {
            last.y / (last.x / input)
        } else {
            self.points
                .windows(2)
                .find(|pair| input >= pair[0].x && input <= pair[1].x)
                .map(|pair| {
                    let (from, to) = (pair[0], pair[1]);
                    let width = to.x - from.x;
                    if width == 0.0 {
                        to.y
                    } else {
                        from.y + (to.y - from.y) / width * (input - from.x)
                    }
                })
                .unwrap_or(last.y)
        };

        if result.is_nan() {
            0.0
        } else {
            result.clamp(-RPC_LIMIT, RPC_LIMIT)
        }
    }
}
