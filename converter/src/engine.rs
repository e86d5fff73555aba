use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::{error, info};

use crate::error::EngineError;

/// Receives a completion ratio in `[0, 1]`, or a negative value when unknown.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// An external media engine with a name-addressed staging area.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn load(&self) -> Result<(), EngineError>;

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;

    async fn run(&self, args: &[String], progress: ProgressFn) -> Result<(), EngineError>;

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    /// Removing an entry that is not there succeeds.
    async fn unlink(&self, name: &str) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Unloaded,
    Ready,
    Failed(String),
}

/// Engine handle plus its load state, owned by whoever drives conversions.
#[derive(Clone)]
pub struct EngineContext {
    engine: Arc<dyn MediaEngine>,
    state: Arc<Mutex<EngineState>>,
    load_lock: Arc<tokio::sync::Mutex<()>>,
}

impl EngineContext {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        EngineContext {
            engine,
            state: Arc::new(Mutex::new(EngineState::Unloaded)),
            load_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.engine
    }

    pub fn state(&self) -> EngineState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn engine_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Loads the engine once. A failed load is remembered and not retried.
    pub async fn load(&self) -> Result<(), String> {
        let _loading = self.load_lock.lock().await;
        match self.state() {
            EngineState::Ready => return Ok(()),
            EngineState::Failed(reason) => return Err(reason),
            EngineState::Unloaded => {}
        }

        let outcome = self.engine.load().await;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(()) => {
                info!("Media engine loaded.");
                *state = EngineState::Ready;
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                error!("Media engine failed to load: {}", reason);
                *state = EngineState::Failed(reason.clone());
                Err(reason)
            }
        }
    }
}
