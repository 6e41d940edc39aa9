use std::ops::{Deref, DerefMut};

use crate::renderer::backend::RenderBackend;

/// Comparison used by the depth and stencil tests. Stencil comparisons read
/// as `reference <op> stored`, depth comparisons as `incoming <op> stored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    pub fn passes<T: PartialOrd>(self, incoming: T, stored: T) -> bool {
        match self {
            Self::Never => false,
            Self::Less => incoming < stored,
            Self::Equal => incoming == stored,
            Self::LessEqual => incoming <= stored,
            Self::Greater => incoming > stored,
            Self::NotEqual => incoming != stored,
            Self::GreaterEqual => incoming >= stored,
            Self::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
}

impl StencilOperation {
    pub fn apply(self, stored: u8, reference: u8) -> u8 {
        match self {
            Self::Keep => stored,
            Self::Zero => 0,
            Self::Replace => reference,
            Self::IncrementClamp => stored.saturating_add(1),
            Self::DecrementClamp => stored.saturating_sub(1),
            Self::Invert => !stored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub enabled: bool,
    pub compare: CompareFunction,
    pub reference: u8,
    pub read_mask: u8,
    pub write_mask: u8,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

impl StencilState {
    pub const DISABLED: Self = Self {
        enabled: false,
        compare: CompareFunction::Always,
        reference: 0,
        read_mask: 0xff,
        write_mask: 0xff,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Keep,
    };

    /// Test against `reference` without writing.
    pub fn test(compare: CompareFunction, reference: u8) -> Self {
        Self {
            enabled: true,
            compare,
            reference,
            write_mask: 0,
            ..Self::DISABLED
        }
    }

    /// Test against `reference` and apply `pass_op` where both tests pass.
    pub fn write(compare: CompareFunction, reference: u8, pass_op: StencilOperation) -> Self {
        Self {
            enabled: true,
            compare,
            reference,
            pass_op,
            ..Self::DISABLED
        }
    }

    pub fn passes(&self, stored: u8) -> bool {
        !self.enabled
            || self
                .compare
                .passes(self.reference & self.read_mask, stored & self.read_mask)
    }

    /// Value to store after a fragment ran the stencil and depth tests.
    pub fn resolve(&self, stored: u8, stencil_passed: bool, depth_passed: bool) -> u8 {
        if !self.enabled {
            return stored;
        }
        let op = if !stencil_passed {
            self.fail_op
        } else if !depth_passed {
            self.depth_fail_op
        } else {
            self.pass_op
        };
        let written = op.apply(stored, self.reference);
        (stored & !self.write_mask) | (written & self.write_mask)
    }
}

impl Default for StencilState {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// Fixed-function state the portal passes toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderState {
    pub color_write: bool,
    pub depth_write: bool,
    pub depth_test: bool,
    pub depth_compare: CompareFunction,
    pub stencil: StencilState,
}

impl RenderState {
    pub const NORMAL: Self = Self {
        color_write: true,
        depth_write: true,
        depth_test: true,
        depth_compare: CompareFunction::Less,
        stencil: StencilState::DISABLED,
    };

    /// Same state with the stencil reference zeroed, for keying pipelines
    /// where the reference is set dynamically.
    pub fn without_reference(mut self) -> Self {
        self.stencil.reference = 0;
        self
    }

    pub fn depth_passes(&self, incoming: f32, stored: f32) -> bool {
        !self.depth_test || self.depth_compare.passes(incoming, stored)
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Restores the backend's render state on drop, whatever path leaves the scope.
pub struct StateScope<'a, B: RenderBackend + ?Sized> {
    backend: &'a mut B,
    saved: RenderState,
}

impl<'a, B: RenderBackend + ?Sized> StateScope<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        let saved = backend.state();
        Self { backend, saved }
    }

    pub fn saved(&self) -> RenderState {
        self.saved
    }
}

impl<B: RenderBackend + ?Sized> Deref for StateScope<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.backend
    }
}

impl<B: RenderBackend + ?Sized> DerefMut for StateScope<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.backend
    }
}

impl<B: RenderBackend + ?Sized> Drop for StateScope<'_, B> {
    fn drop(&mut self) {
        let saved = self.saved;
        self.backend.apply_state(&saved);
    }
}

#[cfg(test)]
mod tests {
    use super::{CompareFunction, RenderState, StencilOperation, StencilState};

    #[test]
    fn stencil_compare_reads_reference_first() {
        let less_equal = StencilState::test(CompareFunction::LessEqual, 1);
        assert!(!less_equal.passes(0));
        assert!(less_equal.passes(1));
        assert!(less_equal.passes(2));
        assert!(StencilState::DISABLED.passes(7));
    }

    #[test]
    fn resolve_picks_op_by_outcome_and_respects_write_mask() {
        let state = StencilState {
            fail_op: StencilOperation::Zero,
            depth_fail_op: StencilOperation::Replace,
            ..StencilState::write(CompareFunction::Equal, 3, StencilOperation::IncrementClamp)
        };
        assert_eq!(state.resolve(3, true, true), 4);
        assert_eq!(state.resolve(3, true, false), 3);
        assert_eq!(state.resolve(5, false, true), 0);

        let read_only = StencilState::test(CompareFunction::Always, 9);
        assert_eq!(read_only.resolve(2, true, true), 2);
        assert_eq!(StencilOperation::DecrementClamp.apply(0, 0), 0);
        assert_eq!(StencilOperation::IncrementClamp.apply(255, 0), 255);
    }

    #[test]
    fn pipeline_key_ignores_reference() {
        let a = RenderState {
            stencil: StencilState::test(CompareFunction::Equal, 1),
            ..RenderState::NORMAL
        };
        let b = RenderState {
            stencil: StencilState::test(CompareFunction::Equal, 2),
            ..RenderState::NORMAL
        };
        assert_ne!(a, b);
        assert_eq!(a.without_reference(), b.without_reference());
        assert!(RenderState::NORMAL.depth_passes(0.2, 0.5));
        assert!(!RenderState::NORMAL.depth_passes(0.5, 0.5));
    }
}
