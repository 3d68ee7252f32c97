use thiserror::Error;

use crate::domain::CronJobId;
use crate::external::object_store::ObjectStoreError;

#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid cron expression: {0}")]
    InvalidCronExpression(String),

    #[error("job not found: {0}")]
    JobNotFound(CronJobId),

    #[error("job {0} is already running")]
    AlreadyRunning(CronJobId),

    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}
