//! Saga runner: an ordered list of (activity, compensation) pairs with a
//! separate compensation pass on first hard failure, instead of
//! exception-driven control flow.

use std::sync::Arc;

use futures::future::BoxFuture;
use tenantd_errors::TenantResult;
use tracing::{error, info, warn};

/// Boxed async step over a shared saga context.
pub type StepFn<C> =
    Arc<dyn Fn(Arc<C>) -> BoxFuture<'static, TenantResult<()>> + Send + Sync>;

pub struct SagaStep<C> {
    name: &'static str,
    run: StepFn<C>,
    compensate: Option<StepFn<C>>,
    best_effort: bool,
}

impl<C> SagaStep<C> {
    pub fn new(name: &'static str, run: StepFn<C>) -> Self {
        Self {
            name,
            run,
            compensate: None,
            best_effort: false,
        }
    }

    /// Compensation executed (in reverse order) when a later step fails.
    pub fn with_compensation(mut self, compensate: StepFn<C>) -> Self {
        self.compensate = Some(compensate);
        self
    }

    /// Best-effort steps log their failure and let the saga continue.
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }
}

pub struct Saga<C> {
    name: &'static str,
    steps: Vec<SagaStep<C>>,
}

impl<C: Send + Sync + 'static> Saga<C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: SagaStep<C>) -> Self {
        self.steps.push(step);
        self
    }

    /// Runs steps in declared order. On the first hard failure, runs the
    /// compensations of every completed step in reverse order, then returns
    /// the original error. Compensation failures are logged, never masked
    /// over the causing error.
    pub async fn execute(&self, ctx: &Arc<C>) -> TenantResult<()> {
        let mut completed: Vec<&SagaStep<C>> = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            match (step.run)(Arc::clone(ctx)).await {
                Ok(()) => {
                    info!(saga = self.name, step = step.name, "saga step completed");
                    completed.push(step);
                }
                Err(e) if step.best_effort => {
                    warn!(
                        saga = self.name,
                        step = step.name,
                        "best-effort step failed, continuing: {e}"
                    );
                    completed.push(step);
                }
                Err(e) => {
                    error!(
                        saga = self.name,
                        step = step.name,
                        "saga step failed, compensating: {e}"
                    );
                    for done in completed.iter().rev() {
                        let Some(compensate) = &done.compensate else {
                            continue;
                        };
                        match compensate(Arc::clone(ctx)).await {
                            Ok(()) => {
                                info!(saga = self.name, step = done.name, "compensation applied")
                            }
                            Err(ce) => error!(
                                saga = self.name,
                                step = done.name,
                                "compensation failed: {ce}"
                            ),
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

/// Convenience for building a [`StepFn`] from a boxed-future closure.
pub fn step_fn<C, F>(f: F) -> StepFn<C>
where
    F: Fn(Arc<C>) -> BoxFuture<'static, TenantResult<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tenantd_errors::TenantError;

    #[derive(Default)]
    struct Trace {
        events: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl Trace {
        fn record(&self, event: &str) {
            self.events.lock().unwrap().push(event.to_string());
        }
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    fn run_step(name: &'static str) -> StepFn<Trace> {
        step_fn(move |ctx: Arc<Trace>| {
            Box::pin(async move {
                if ctx.fail_on == Some(name) {
                    ctx.record(&format!("fail:{name}"));
                    return Err(TenantError::Internal(format!("{name} failed")));
                }
                ctx.record(name);
                Ok(())
            })
        })
    }

    fn comp_step(name: &'static str) -> StepFn<Trace> {
        step_fn(move |ctx: Arc<Trace>| {
            Box::pin(async move {
                ctx.record(&format!("comp:{name}"));
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn executes_steps_in_declared_order() {
        let ctx = Arc::new(Trace::default());
        let saga = Saga::new("test")
            .step(SagaStep::new("a", run_step("a")))
            .step(SagaStep::new("b", run_step("b")))
            .step(SagaStep::new("c", run_step("c")));
        saga.execute(&ctx).await.unwrap();
        assert_eq!(ctx.events(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failure_compensates_completed_steps_in_reverse() {
        let ctx = Arc::new(Trace {
            fail_on: Some("c"),
            ..Default::default()
        });
        let saga = Saga::new("test")
            .step(SagaStep::new("a", run_step("a")).with_compensation(comp_step("a")))
            .step(SagaStep::new("b", run_step("b")).with_compensation(comp_step("b")))
            .step(SagaStep::new("c", run_step("c")));
        let err = saga.execute(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("c failed"));
        assert_eq!(ctx.events(), vec!["a", "b", "fail:c", "comp:b", "comp:a"]);
    }

    #[tokio::test]
    async fn best_effort_failure_does_not_abort_or_compensate() {
        let ctx = Arc::new(Trace {
            fail_on: Some("notify"),
            ..Default::default()
        });
        let saga = Saga::new("test")
            .step(SagaStep::new("a", run_step("a")).with_compensation(comp_step("a")))
            .step(SagaStep::new("notify", run_step("notify")).best_effort())
            .step(SagaStep::new("b", run_step("b")));
        saga.execute(&ctx).await.unwrap();
        assert_eq!(ctx.events(), vec!["a", "fail:notify", "b"]);
    }

    #[tokio::test]
    async fn failed_step_own_compensation_not_run() {
        let ctx = Arc::new(Trace {
            fail_on: Some("b"),
            ..Default::default()
        });
        let saga = Saga::new("test")
            .step(SagaStep::new("a", run_step("a")).with_compensation(comp_step("a")))
            .step(SagaStep::new("b", run_step("b")).with_compensation(comp_step("b")));
        saga.execute(&ctx).await.unwrap_err();
        assert_eq!(ctx.events(), vec!["a", "fail:b", "comp:a"]);
    }
}
