//! Container collision
//!
//! Soft constraint keeping each blob inside the boundary. A blob whose margin
//! crosses an edge is clamped back in and its velocity on that axis reflected
//! at reduced magnitude, so the cluster settles instead of ringing. Axes are
//! handled independently; corners need no special case.

use crate::boundary::Bounds;
use crate::math::Vec2;

/// Share of the radius that must stay inside the container
pub const MARGIN_FACTOR: f32 = 0.8;

/// Velocity retained after a bounce
pub const BOUNCE_DAMPING: f32 = 0.5;

/// Which edges were hit during one containment pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contact {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Contact {
    #[inline]
    pub fn any(&self) -> bool {
        self.horizontal || self.vertical
    }
}

/// Resolve one axis. Returns true when the position was corrected.
#[inline]
fn contain_axis(pos: &mut f32, vel: &mut f32, lo: f32, hi: f32, margin: f32) -> bool {
    let min = lo + margin;
    let max = hi - margin;

    if min > max {
        // Container narrower than the blob: pin it to the middle
        *pos = (lo + hi) / 2.0;
        *vel = 0.0;
        return true;
    }

    if *pos < min {
        *pos = min;
        *vel = vel.abs() * BOUNCE_DAMPING;
        true
    } else if *pos > max {
        *pos = max;
        *vel = -vel.abs() * BOUNCE_DAMPING;
        true
    } else {
        false
    }
}

/// Keep a blob at absolute position `pos` with `radius` inside `bounds`.
/// Non-finite positions (a NaN from a degenerate frame) are reset to the center.
pub fn contain(pos: &mut Vec2, vel: &mut Vec2, radius: f32, bounds: &Bounds) -> Contact {
    if !pos.x.is_finite() || !pos.y.is_finite() {
        *pos = bounds.center();
        *vel = Vec2::zero();
    }

    let margin = radius.max(0.0) * MARGIN_FACTOR;
    Contact {
        horizontal: contain_axis(&mut pos.x, &mut vel.x, bounds.x, bounds.right(), margin),
        vertical: contain_axis(&mut pos.y, &mut vel.y, bounds.y, bounds.bottom(), margin),
    }
}
