//! 事件总线统一错误定义
//!
//! 分为两类：
//! - `BusError`：注册/注销阶段的调用方错误，同步返回给调用者，且不修改注册表；
//! - `HandlerError`：分发阶段处理器自身的失败，只交给 `FailureHandler`，永不返回给发布者。
//!
use thiserror::Error;

/// 注册期错误（调用方/配置错误）
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("no eligible handlers: subscriber={subscriber}")]
    NoEligibleHandlers { subscriber: &'static str },

    #[error(
        "handler must take exactly one event parameter: subscriber={subscriber}, method={method}, arity={arity}"
    )]
    MultiParameterHandler {
        subscriber: &'static str,
        method: &'static str,
        arity: usize,
    },

    #[error("handler declared more than once: subscriber={subscriber}, method={method}")]
    DuplicateHandler {
        subscriber: &'static str,
        method: &'static str,
    },

    #[error("subscriber not registered: subscriber={subscriber}")]
    NotRegistered { subscriber: &'static str },

    #[error("subscriber already registered: subscriber={subscriber}")]
    AlreadyRegistered { subscriber: &'static str },
}

/// 统一 Result 类型别名
pub type BusResult<T> = Result<T, BusError>;

/// 分发期错误：处理器返回错误或发生 panic
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler failed: {0:#}")]
    Failed(#[from] anyhow::Error),

    #[error("handler panicked: {message}")]
    Panicked { message: String },

    #[error("event could not be viewed as {expected}")]
    ViewMismatch { expected: &'static str },
}

impl HandlerError {
    /// 从 `catch_unwind` 捕获的载荷中提取 panic 信息
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::Panicked { message }
    }
}
