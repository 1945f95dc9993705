use crate::error::{AppError, AppResult};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;
use swmutsel_core::code::GeneticCode;
use swmutsel_core::globals::MutationGlobals;
use swmutsel_core::runner::ThreadPoolRunner;
use swmutsel_core::tree::Tree;
use swmutsel_core::{FitnessStore, MutationParams};

/// Everything the coordinator has sent so far.
#[derive(Default)]
pub struct WorkerSession {
    pub runner: Option<ThreadPoolRunner>,
    pub code: Option<Arc<GeneticCode>>,
    pub tree: Option<Tree>,
    pub store: FitnessStore,
    pub globals: Option<Arc<MutationGlobals>>,
}

impl WorkerSession {
    pub fn runner(&mut self) -> AppResult<&mut ThreadPoolRunner> {
        self.runner.as_mut().ok_or(AppError::NotReady("site list"))
    }

    pub fn tree(&self) -> AppResult<&Tree> {
        self.tree.as_ref().ok_or(AppError::NotReady("tree"))
    }

    /// Globals for `params`, reusing the last ones when nothing changed.
    pub fn globals_for(&mut self, params: MutationParams) -> AppResult<Arc<MutationGlobals>> {
        if let Some(g) = &self.globals {
            if *g.params() == params {
                return Ok(g.clone());
            }
        }
        let code = self.code.clone().ok_or(AppError::NotReady("site list"))?;
        let globals = Arc::new(MutationGlobals::new(code, params)?);
        self.globals = Some(globals.clone());
        Ok(globals)
    }
}

pub struct AppState {
    pub session: Mutex<WorkerSession>,
    /// Threads for the site pool; 0 means one per core.
    pub threads: usize,
}

impl AppState {
    pub fn new(threads: usize) -> Self {
        Self {
            session: Mutex::new(WorkerSession::default()),
            threads,
        }
    }

    /// Locks the session. A session left poisoned by a failed call is reset,
    /// so the coordinator has to send sites and tree again.
    pub fn lock(&self) -> MutexGuard<'_, WorkerSession> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("⚠️  Worker session was poisoned by a failed call, resetting it");
                let mut guard = poisoned.into_inner();
                *guard = WorkerSession::default();
                self.session.clear_poison();
                guard
            }
        }
    }
}
