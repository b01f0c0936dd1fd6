//! Turning an accepted study plan into a persisted exercise plan.
//!
//! All tasks are generated first, in order. The first task that cannot be
//! generated aborts the run and nothing is written.

use chrono::NaiveDate;
use std::time::Duration;

use crate::db::{self, DbPool};
use crate::domain::{StudyPlan, Task};
use crate::error::{Error, Result};
use crate::exercises::TaskGenerator;
use crate::llm::retry_n_times;

pub struct Materializer<'a> {
    pub generator: TaskGenerator<'a>,
    pub retries: u32,
    /// Deadline for each generation attempt
    pub timeout: Duration,
}

impl Materializer<'_> {
    /// Generate every task of `plan`, positions in plan order.
    pub async fn generate_tasks(&self, plan: &StudyPlan) -> Result<Vec<Task>> {
        let total = plan.tasks.len();
        let mut tasks = Vec::with_capacity(total);

        for (i, spec) in plan.tasks.iter().enumerate() {
            let generated = retry_n_times(self.retries, || async move {
                Ok(self.generator.generate(spec, self.timeout).await)
            })
            .await?;

            let Some(mut task) = generated else {
                tracing::error!(
                    "Failed to generate task content for '{}' after {} attempt(s)",
                    spec.title,
                    self.retries.max(1)
                );
                return Err(Error::Generation(format!("Could not generate task: {}", spec.title)));
            };

            task.position = i as i64;
            tasks.push(task);
            tracing::info!("Generated task {}/{}: {}", i + 1, total, spec.title);
        }
        Ok(tasks)
    }

    /// Generate and persist `plan`. Returns the new exercise plan id.
    pub async fn materialize(&self, plan: &StudyPlan, pool: &DbPool, today: NaiveDate) -> Result<i64> {
        plan.validate()?;
        let tasks = self.generate_tasks(plan).await?;

        let mut conn = db::try_lock(pool)?;
        let plan_id = db::save_exercise_plan(&mut conn, &plan.title, &plan.goal, today, &tasks)?;
        tracing::info!(
            "Saved exercise plan '{}' (id {}) with {} task(s)",
            plan.title,
            plan_id,
            tasks.len()
        );
        Ok(plan_id)
    }
}
