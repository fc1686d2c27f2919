//! Execution engine - guarded resource execution and the sequential run driver

use crate::context::{ApplyContext, NoProgress, Probe, ProgressCallback};
use crate::error::RunError;
use crate::notify::{Dispatcher, Firing};
use crate::planner::{Declared, RunPlan};
use crate::resource::{Resource, ResourceExt};
use crate::types::{
    Criticality, ExecutionRecord, Outcome, RunOptions, RunSummary, Timing, Trigger,
};

/// Execute one action of a resource behind its guard
///
/// Evaluates the guard first; a satisfied guard returns `Unchanged` without
/// invoking the action. Otherwise the action runs exactly once and an error
/// becomes `Outcome::Failed`. Criticality is not applied here.
pub fn execute_resource(resource: &dyn Resource, action: &str, ctx: &mut ApplyContext) -> Outcome {
    if resource.is_satisfied(ctx.probe) {
        log::debug!("{} already satisfied, skipping {}", resource.id(), action);
        return Outcome::Unchanged;
    }

    log::debug!("Running {} on {}", action, resource.id());
    match resource.apply(action, ctx) {
        Ok(outcome) => outcome,
        Err(e) => Outcome::Failed {
            reason: format!("{e:#}"),
        },
    }
}

/// Walk a plan once, dispatching notifications as resources report outcomes
///
/// # Arguments
/// * `plan` - The validated or unvalidated plan (validated here)
/// * `opts` - Run options
/// * `probe` - Guard inputs
/// * `progress` - Progress callback
///
/// # Returns
/// Summary of every executed step, or the first fatal error
pub fn converge<P: ProgressCallback>(
    plan: &RunPlan,
    opts: &RunOptions,
    probe: &dyn Probe,
    progress: &mut P,
) -> Result<RunSummary, RunError> {
    plan.validate()?;

    let mut run = Run {
        plan,
        opts,
        probe,
        progress,
        dispatcher: Dispatcher::new(),
        summary: RunSummary::default(),
    };

    run.progress.on_run_start(plan.walk().count());

    for declared in plan.walk() {
        let action = declared.resource.default_action();
        run.step(declared, action, Trigger::Walk, 0)?;
    }

    run.flush_delayed()?;

    run.progress.on_run_complete(&run.summary);
    Ok(run.summary)
}

/// Simple run without progress callbacks
pub fn converge_simple(plan: &RunPlan, probe: &dyn Probe) -> Result<RunSummary, RunError> {
    converge(plan, &RunOptions::default(), probe, &mut NoProgress)
}

/// State of one run
struct Run<'a, P: ProgressCallback> {
    plan: &'a RunPlan,
    opts: &'a RunOptions,
    probe: &'a dyn Probe,
    progress: &'a mut P,
    dispatcher: Dispatcher,
    summary: RunSummary,
}

impl<P: ProgressCallback> Run<'_, P> {
    /// Execute one resource action, apply criticality, then drain its immediate notifications
    fn step(
        &mut self,
        declared: &Declared,
        action: &str,
        trigger: Trigger,
        depth: usize,
    ) -> Result<(), RunError> {
        let resource = declared.resource.as_ref();
        let id = resource.id();

        self.progress.on_resource_start(&id, &resource.description());
        let mut ctx = ApplyContext::new(self.opts.verbose, self.probe);
        let outcome = execute_resource(resource, action, &mut ctx);
        self.progress.on_resource_complete(&id, action, &outcome);

        let dispatched = match (&outcome, declared.criticality) {
            (Outcome::Failed { reason }, Criticality::Required) => {
                log::error!("{} failed: {}", id, reason);
                return Err(RunError::ResourceFailed {
                    id,
                    action: action.to_string(),
                    reason: reason.clone(),
                });
            }
            (Outcome::Failed { reason }, Criticality::BestEffort) => {
                log::warn!("{} failed, continuing: {}", id, reason);
                Outcome::Unchanged
            }
            (other, _) => other.clone(),
        };

        self.summary.add_record(ExecutionRecord {
            resource_id: id.clone(),
            action: action.to_string(),
            outcome,
            trigger,
        });

        let firings = self
            .dispatcher
            .notify(self.plan.notifications(), &id, &dispatched);
        for firing in firings {
            self.fire(&firing, depth + 1)?;
        }

        Ok(())
    }

    /// Run the target of an immediate firing inline
    fn fire(&mut self, firing: &Firing, depth: usize) -> Result<(), RunError> {
        if depth > self.opts.max_notify_depth {
            return Err(RunError::RecursionLimit {
                id: firing.target.clone(),
                depth: self.opts.max_notify_depth,
            });
        }

        self.progress.on_notification(
            &firing.source,
            &firing.target,
            &firing.action,
            Timing::Immediate,
        );

        let plan = self.plan;
        let target = plan
            .get(&firing.target)
            .ok_or_else(|| crate::error::PlanError::UnknownResource {
                role: "target",
                id: firing.target.clone(),
            })?;

        self.step(
            target,
            &firing.action,
            Trigger::Immediate {
                source: firing.source.clone(),
            },
            depth,
        )
    }

    /// Run every queued delayed target once, in declaration order
    fn flush_delayed(&mut self) -> Result<(), RunError> {
        while let Some(firing) = self.dispatcher.next_delayed() {
            self.progress.on_notification(
                &firing.source,
                &firing.target,
                &firing.action,
                Timing::Delayed,
            );

            let plan = self.plan;
            let target = plan
                .get(&firing.target)
                .ok_or_else(|| crate::error::PlanError::UnknownResource {
                    role: "target",
                    id: firing.target.clone(),
                })?;

            self.step(target, &firing.action, Trigger::Delayed, 0)?;
        }

        Ok(())
    }
}
