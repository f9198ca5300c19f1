//! Multiple pass depth schedule.
//!
//! Pass `i` of `n` (1-indexed) leaves `thickness * (n - i) / n` of material,
//! so the first pass removes the least and the last pass reaches zero.

use crate::error::{CamToolResult, ParameterError};
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

/// One pass of a multi-pass cut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pass {
    /// 1-indexed pass number
    pub index: u32,
    /// Z height of this pass above the work origin (mm)
    pub depth: f64,
}

/// Depth schedule for a multi-pass cut through `thickness` of material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassPlan {
    total_passes: u32,
    thickness: f64,
}

impl PassPlan {
    /// Creates a validated pass plan.
    pub fn new(total_passes: u32, thickness: f64) -> CamToolResult<Self> {
        if total_passes == 0 {
            return Err(ParameterError::OutOfRange {
                name: "total_passes".to_string(),
                value: total_passes.to_string(),
                expected: ">= 1".to_string(),
            }
            .into());
        }
        if !thickness.is_finite() {
            return Err(ParameterError::NotFinite("thickness".to_string()).into());
        }
        if thickness <= 0.0 {
            return Err(ParameterError::OutOfRange {
                name: "thickness".to_string(),
                value: thickness.to_string(),
                expected: "> 0".to_string(),
            }
            .into());
        }
        Ok(Self {
            total_passes,
            thickness,
        })
    }

    pub fn total_passes(&self) -> u32 {
        self.total_passes
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    /// Depth for 1-indexed `pass`, or `None` outside `1..=total_passes`.
    pub fn depth(&self, pass: u32) -> Option<f64> {
        if !(1..=self.total_passes).contains(&pass) {
            return None;
        }
        Some(self.thickness * (self.total_passes - pass) as f64 / self.total_passes as f64)
    }

    /// Iterates over every pass in cutting order.
    pub fn iter(&self) -> PassDepths {
        PassDepths {
            plan: *self,
            next: 1,
        }
    }

    /// Depths only, in cutting order.
    pub fn depths(&self) -> impl Iterator<Item = f64> {
        self.iter().map(|pass| pass.depth)
    }
}

impl IntoIterator for PassPlan {
    type Item = Pass;
    type IntoIter = PassDepths;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the passes of a [`PassPlan`].
#[derive(Debug, Clone)]
pub struct PassDepths {
    plan: PassPlan,
    next: u32,
}

impl Iterator for PassDepths {
    type Item = Pass;

    fn next(&mut self) -> Option<Pass> {
        let pass = Pass {
            index: self.next,
            depth: self.plan.depth(self.next)?,
        };
        self.next += 1;
        Some(pass)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.plan.total_passes + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PassDepths {}

impl FusedIterator for PassDepths {}

/// Build the pass schedule. See [`PassPlan::new`].
pub fn pass_depths(total_passes: u32, material_thickness: f64) -> CamToolResult<PassPlan> {
    PassPlan::new(total_passes, material_thickness)
}
