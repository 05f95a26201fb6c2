//! 处理器失败上报（FailureHandler）
//!
//! 处理器返回的错误或 panic 在绑定边界被截获后交给这里，不会返回给发布者，
//! 也不会影响同一事件的其它绑定。
//!
use crate::error::HandlerError;
use crate::event::EventType;
use tracing::error;

/// 一次失败调用的上下文
#[derive(Debug)]
pub struct HandlerFailure<'a> {
    pub bus: &'a str,
    pub subscriber: &'static str,
    pub method: &'static str,
    pub event_type: EventType,
    pub error: &'a HandlerError,
}

/// 失败上报策略
pub trait FailureHandler: Send + Sync {
    fn handle_failure(&self, failure: HandlerFailure<'_>);
}

/// 默认策略：以 `tracing::error!` 记录
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFailures;

impl FailureHandler for LogFailures {
    fn handle_failure(&self, failure: HandlerFailure<'_>) {
        error!(
            bus = failure.bus,
            subscriber = failure.subscriber,
            method = failure.method,
            event_type = %failure.event_type,
            error = %failure.error,
            "event handler failed"
        );
    }
}

impl<F> FailureHandler for F
where
    F: Fn(HandlerFailure<'_>) + Send + Sync,
{
    fn handle_failure(&self, failure: HandlerFailure<'_>) {
        self(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closures_are_failure_handlers() {
        let seen = Mutex::new(Vec::new());
        let handler = |failure: HandlerFailure<'_>| {
            seen.lock()
                .unwrap()
                .push(format!("{}::{} {}", failure.subscriber, failure.method, failure.error));
        };

        let err = HandlerError::Panicked {
            message: "boom".to_string(),
        };
        handler.handle_failure(HandlerFailure {
            bus: "test",
            subscriber: "Mailer",
            method: "on_alert",
            event_type: EventType::of::<u8>(),
            error: &err,
        });

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["Mailer::on_alert handler panicked: boom"]
        );
    }

    #[test]
    fn log_failures_does_not_panic_without_subscriber() {
        let err = HandlerError::Failed(anyhow::anyhow!("disk full"));
        LogFailures.handle_failure(HandlerFailure {
            bus: "test",
            subscriber: "Archiver",
            method: "on_alert",
            event_type: EventType::of::<u8>(),
            error: &err,
        });
    }
}
