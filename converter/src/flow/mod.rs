//! Conversion orchestration. Every `convert` call makes one pass through
//! `Idle -> Validating -> Processing -> Succeeded | Failed -> Idle`.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error};

use crate::error::ConvertError;
use crate::media::FileSelection;
use crate::status::{StatusKind, StatusLine};

mod archive;
mod audio;
mod image;

pub use self::archive::ArchiveFlow;
pub use self::audio::AudioFlow;
pub use self::image::ImageFlow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Validating,
    Processing,
    Succeeded,
    Failed,
}

impl FlowState {
    pub fn can_advance_to(self, next: FlowState) -> bool {
        use FlowState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Processing)
                | (Validating, Failed)
                | (Processing, Succeeded)
                | (Processing, Failed)
                | (Succeeded, Idle)
                | (Failed, Idle)
        )
    }
}

/// One click's trip through the state machine.
#[derive(Debug)]
pub(crate) struct Pass {
    flow: &'static str,
    state: FlowState,
}

impl Pass {
    pub(crate) fn begin(flow: &'static str) -> Self {
        let mut pass = Pass {
            flow,
            state: FlowState::Idle,
        };
        pass.advance(FlowState::Validating);
        pass
    }

    pub(crate) fn advance(&mut self, next: FlowState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("[{}] {:?} -> {:?}", self.flow, self.state, next);
        self.state = next;
    }

    /// Terminal state followed by the return to idle.
    pub(crate) fn finish(mut self, outcome: FlowState) {
        self.advance(outcome);
        self.advance(FlowState::Idle);
    }

    /// Reports a validation failure; nothing external has been touched.
    pub(crate) fn reject(self, status: &StatusLine, err: impl Into<ConvertError>) -> ConvertError {
        let err = err.into();
        status.set(StatusKind::Error, err.to_string());
        self.finish(FlowState::Failed);
        err
    }
}

/// The control that starts a flow. While disabled no new conversion of
/// that flow starts; it does not queue anything.
#[derive(Debug, Default)]
pub struct Trigger {
    disabled: AtomicBool,
}

impl Trigger {
    pub fn new() -> Self {
        Trigger {
            disabled: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled.load(Ordering::SeqCst)
    }

    pub fn enable(&self) {
        self.disabled.store(false, Ordering::SeqCst);
    }

    /// Disables the trigger until the returned guard is dropped. `None` when
    /// it is already disabled.
    pub fn try_disable(&self) -> Option<TriggerGuard<'_>> {
        self.disabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| TriggerGuard { trigger: self })
    }
}

pub struct TriggerGuard<'a> {
    trigger: &'a Trigger,
}

impl Drop for TriggerGuard<'_> {
    fn drop(&mut self) {
        self.trigger.enable();
    }
}

pub(crate) async fn read_bytes(file: &FileSelection) -> Result<Vec<u8>, String> {
    tokio::fs::read(&file.path).await.map_err(|e| {
        let msg = format!("Failed to read {:?}: {}", file.path, e);
        error!("{}", msg);
        msg
    })
}
