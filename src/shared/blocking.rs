//! Usage: Run blocking DB work on the tokio blocking pool with a stable label.

use crate::shared::error::{AppError, AppResult};

pub async fn run<T, E>(
    label: &'static str,
    f: impl FnOnce() -> Result<T, E> + Send + 'static,
) -> AppResult<T>
where
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(Into::into),
        Err(join_err) => {
            // Avoid forwarding JoinError display text to users, because panic payloads may
            // contain user content (e.g., slicing errors include a snippet of the string).
            if join_err.is_panic() {
                tracing::error!(label, "blocking task panicked");
                return Err(AppError::new("TASK_JOIN", format!("{label}: task panicked")));
            }

            tracing::warn!(label, "blocking task cancelled");
            Err(AppError::new(
                "TASK_JOIN",
                format!("{label}: task cancelled"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::run;
    use crate::shared::error::AppResult;

    #[tokio::test]
    async fn run_returns_closure_result() {
        let value = run("test_ok", || -> AppResult<i64> { Ok(7) })
            .await
            .expect("value");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn run_maps_panics_to_task_join() {
        let err = run("test_panic", || -> AppResult<()> { panic!("boom") })
            .await
            .expect_err("panic should surface as error");
        assert_eq!(err.code(), "TASK_JOIN");
        assert!(!err.to_string().contains("boom"));
    }
}
