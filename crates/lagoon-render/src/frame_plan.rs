//! Per-frame pass ordering
//!
//! Each pass declares the frame resources it writes and reads. A plan is
//! valid only if every read is preceded, earlier in the same frame, by a
//! pass writing that resource, so sampling a target before its producer has
//! run is caught before anything is encoded.

use std::collections::HashSet;
use std::fmt;

/// A resource produced and consumed within one frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameResource {
    ReflectionColor,
    RefractionColor,
    MainColor,
    DebugPreview,
    GBufferAlbedo,
    GBufferPosition,
    GBufferNormal,
}

/// The passes the demos know how to encode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    Reflection,
    Refraction,
    Final,
    DebugOverlay,
    GBufferFill,
    Lighting,
}

impl PassKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reflection => "Reflection Pass",
            Self::Refraction => "Refraction Pass",
            Self::Final => "Final Pass",
            Self::DebugOverlay => "Debug Overlay Pass",
            Self::GBufferFill => "G-Buffer Pass",
            Self::Lighting => "Lighting Pass",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedPass {
    pub kind: PassKind,
    pub reads: Vec<FrameResource>,
    pub writes: Vec<FrameResource>,
}

impl PlannedPass {
    pub fn new(kind: PassKind) -> Self {
        Self {
            kind,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn reads(mut self, resource: FrameResource) -> Self {
        self.reads.push(resource);
        self
    }

    pub fn writes(mut self, resource: FrameResource) -> Self {
        self.writes.push(resource);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanError {
    pub pass: PassKind,
    pub resource: FrameResource,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reads {:?} before any pass wrote it",
            self.pass.label(),
            self.resource
        )
    }
}

impl std::error::Error for PlanError {}

/// An ordered list of passes for one frame
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    passes: Vec<PlannedPass>,
}

impl FramePlan {
    pub fn new(passes: Vec<PlannedPass>) -> Self {
        Self { passes }
    }

    /// Reflection, refraction, final and (optionally) the debug preview
    pub fn water(debug_overlay: bool) -> Self {
        use FrameResource::*;

        let mut passes = vec![
            PlannedPass::new(PassKind::Reflection).writes(ReflectionColor),
            PlannedPass::new(PassKind::Refraction).writes(RefractionColor),
            PlannedPass::new(PassKind::Final)
                .reads(ReflectionColor)
                .reads(RefractionColor)
                .writes(MainColor),
        ];
        if debug_overlay {
            passes.push(
                PlannedPass::new(PassKind::DebugOverlay)
                    .reads(ReflectionColor)
                    .reads(RefractionColor)
                    .writes(DebugPreview),
            );
        }
        Self { passes }
    }

    /// G-buffer fill followed by the fullscreen lighting accumulation
    pub fn deferred() -> Self {
        use FrameResource::*;

        Self {
            passes: vec![
                PlannedPass::new(PassKind::GBufferFill)
                    .writes(GBufferAlbedo)
                    .writes(GBufferPosition)
                    .writes(GBufferNormal),
                PlannedPass::new(PassKind::Lighting)
                    .reads(GBufferAlbedo)
                    .reads(GBufferPosition)
                    .reads(GBufferNormal)
                    .writes(MainColor),
            ],
        }
    }

    pub fn passes(&self) -> &[PlannedPass] {
        &self.passes
    }

    pub fn kinds(&self) -> Vec<PassKind> {
        self.passes.iter().map(|p| p.kind).collect()
    }

    pub fn contains(&self, kind: PassKind) -> bool {
        self.passes.iter().any(|p| p.kind == kind)
    }

    /// Reject any read of a resource not yet written this frame
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut written = HashSet::new();
        for pass in &self.passes {
            if let Some(&resource) = pass.reads.iter().find(|r| !written.contains(*r)) {
                return Err(PlanError {
                    pass: pass.kind,
                    resource,
                });
            }
            written.extend(pass.writes.iter().copied());
        }
        Ok(())
    }
}

/// What a frame actually did, in execution order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub executed: Vec<PassKind>,
    /// Draws skipped because their resources were still loading
    pub skipped_draws: Vec<&'static str>,
}

impl FrameReport {
    pub fn position(&self, kind: PassKind) -> Option<usize> {
        self.executed.iter().position(|&k| k == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_plan_orders_producers_first() {
        let plan = FramePlan::water(false);
        assert_eq!(
            plan.kinds(),
            vec![PassKind::Reflection, PassKind::Refraction, PassKind::Final]
        );
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn debug_overlay_runs_last() {
        let plan = FramePlan::water(true);
        assert_eq!(plan.kinds().last(), Some(&PassKind::DebugOverlay));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn final_before_reflection_is_rejected() {
        use FrameResource::*;
        let plan = FramePlan::new(vec![
            PlannedPass::new(PassKind::Refraction).writes(RefractionColor),
            PlannedPass::new(PassKind::Final)
                .reads(ReflectionColor)
                .reads(RefractionColor)
                .writes(MainColor),
            PlannedPass::new(PassKind::Reflection).writes(ReflectionColor),
        ]);
        let err = plan.validate().unwrap_err();
        assert_eq!(err.pass, PassKind::Final);
        assert_eq!(err.resource, ReflectionColor);
    }

    #[test]
    fn overlay_without_producers_is_rejected() {
        use FrameResource::*;
        let plan = FramePlan::new(vec![PlannedPass::new(PassKind::DebugOverlay)
            .reads(RefractionColor)
            .writes(DebugPreview)]);
        assert!(plan.validate().is_err());
    }

    #[test]
    fn deferred_plan_is_valid() {
        let plan = FramePlan::deferred();
        assert!(plan.validate().is_ok());
        assert_eq!(plan.kinds(), vec![PassKind::GBufferFill, PassKind::Lighting]);
    }
}
