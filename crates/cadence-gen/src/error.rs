use cadence_core::StoreError;

/// Failure of a generation stage.
///
/// Store failures carry the operation and key that failed; they are never
/// retried. Records written before the failure stay written.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("{op} failed for {key}: {source}")]
    Store {
        op: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("{days} days of history reach past the earliest representable date")]
    WindowOutOfRange { days: u32 },

    #[error("generation cancelled")]
    Cancelled,
}

pub type SimResult<T> = Result<T, SimError>;

/// Annotate a store result with the failing operation and key.
pub(crate) trait StoreContext<T> {
    fn store_op(self, op: &'static str, key: impl FnOnce() -> String) -> SimResult<T>;
}

impl<T> StoreContext<T> for Result<T, StoreError> {
    fn store_op(self, op: &'static str, key: impl FnOnce() -> String) -> SimResult<T> {
        self.map_err(|source| SimError::Store {
            op,
            key: key(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_is_annotated() {
        let res: Result<(), StoreError> = Err(StoreError::PullRequestNotFound {
            repo: "acme/api".into(),
            number: 12,
        });
        let err = res.store_op("update_pull_request", || "acme/api#12".into()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("update_pull_request failed for acme/api#12"));
        assert!(matches!(err, SimError::Store { op: "update_pull_request", .. }));
    }
}
