//! Done/fail/always completion handlers
//!
//! UI code often wants three hooks per call: one for the payload, one for
//! the failure, and one that runs regardless (to re-enable a button, stop a
//! spinner). [`Completion`] consumes itself when settled, so each hook can
//! fire at most once, and exactly one of `done`/`fail` fires before
//! `always`.

use crate::backend::OpResult;
use admin_common::OperationFailure;
use std::future::Future;

type DoneHook<T> = Box<dyn FnOnce(T) + Send>;
type FailHook = Box<dyn FnOnce(&OperationFailure) + Send>;
type AlwaysHook = Box<dyn FnOnce() + Send>;

/// Set of optional handlers for one operation
pub struct Completion<T> {
    done: Option<DoneHook<T>>,
    fail: Option<FailHook>,
    always: Option<AlwaysHook>,
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self {
            done: None,
            fail: None,
            always: None,
        }
    }

    pub fn on_done(mut self, hook: impl FnOnce(T) + Send + 'static) -> Self {
        self.done = Some(Box::new(hook));
        self
    }

    /// The failure carries the HTTP status and error body, when there were any
    pub fn on_fail(mut self, hook: impl FnOnce(&OperationFailure) + Send + 'static) -> Self {
        self.fail = Some(Box::new(hook));
        self
    }

    pub fn on_always(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.always = Some(Box::new(hook));
        self
    }

    /// Dispatch a finished result to the handlers
    ///
    /// Returns whether the operation succeeded.
    pub fn settle(self, result: OpResult<T>) -> bool {
        let succeeded = match result {
            Ok(payload) => {
                if let Some(done) = self.done {
                    done(payload);
                }
                true
            }
            Err(failure) => {
                if let Some(fail) = self.fail {
                    fail(&failure);
                }
                false
            }
        };
        if let Some(always) = self.always {
            always();
        }
        succeeded
    }

    /// Await `operation` and dispatch its result
    pub async fn run<F>(self, operation: F) -> bool
    where
        F: Future<Output = OpResult<T>>,
    {
        self.settle(operation.await)
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, Completion<u32>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (log.clone(), log.clone(), log.clone());
        let completion = Completion::new()
            .on_done(move |_| a.lock().unwrap().push("done"))
            .on_fail(move |_| b.lock().unwrap().push("fail"))
            .on_always(move || c.lock().unwrap().push("always"));
        (log, completion)
    }

    #[test]
    fn test_success_fires_done_then_always() {
        let (log, completion) = recorder();
        assert!(completion.settle(Ok(7)));
        assert_eq!(*log.lock().unwrap(), vec!["done", "always"]);
    }

    #[test]
    fn test_failure_fires_fail_then_always() {
        let (log, completion) = recorder();
        assert!(!completion.settle(Err(OperationFailure::Network("down".into()))));
        assert_eq!(*log.lock().unwrap(), vec!["fail", "always"]);
    }

    #[test]
    fn test_fail_hook_sees_status_and_payload() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        Completion::<()>::new()
            .on_fail(move |f| {
                *sink.lock().unwrap() =
                    Some((f.status(), f.payload().and_then(|p| p.message.clone())));
            })
            .settle(Err(OperationFailure::rejected(200, "busy")));
        assert_eq!(
            *seen.lock().unwrap(),
            Some((Some(200), Some("busy".to_string())))
        );
    }

    #[test]
    fn test_missing_hooks_are_fine() {
        assert!(Completion::new().settle(Ok("payload")));
        assert!(!Completion::<()>::new().settle(Err(OperationFailure::Decode("x".into()))));
    }
}
