//! 分发策略（Dispatcher）
//!
//! - `ImmediateDispatcher`：在发布者线程上直接调用，`post` 返回前所有绑定均已执行完毕；
//! - `ExecutorDispatcher`：把调用提交到外部提供的执行器后立即返回，
//!   不同绑定之间的投递顺序不作保证。执行器的生命周期由调用方管理。
//!
use crate::binding::{HandlerBinding, Outcome};
use crate::failure::{FailureHandler, HandlerFailure};
use crate::resolver::View;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, error};

/// 一次待执行的投递：某个绑定 + 一个事件
pub struct Delivery {
    pub(crate) binding: Arc<HandlerBinding>,
    pub(crate) view: Arc<dyn View>,
    pub(crate) event: Arc<dyn Any + Send + Sync>,
    pub(crate) failures: Arc<dyn FailureHandler>,
    pub(crate) bus: Arc<str>,
}

impl Delivery {
    /// 执行投递；处理器的错误与 panic 交给失败处理器，不向外传播
    pub fn deliver(self) {
        let root: &dyn Any = &*self.event;
        match self.binding.invoke(self.view.as_ref(), root) {
            Outcome::Delivered => {}
            Outcome::Retired => {
                debug!(
                    bus = %self.bus,
                    subscriber = self.binding.subscriber(),
                    method = self.binding.method(),
                    "skipped delivery to unregistered handler"
                );
            }
            Outcome::Failed(err) => {
                let failure = HandlerFailure {
                    bus: &self.bus,
                    subscriber: self.binding.subscriber(),
                    method: self.binding.method(),
                    event_type: self.binding.event_type(),
                    error: &err,
                };
                let reported = catch_unwind(AssertUnwindSafe(|| {
                    self.failures.handle_failure(failure)
                }));
                if reported.is_err() {
                    error!(
                        bus = %self.bus,
                        subscriber = self.binding.subscriber(),
                        method = self.binding.method(),
                        error = %err,
                        "failure handler panicked"
                    );
                }
            }
        }
    }
}

/// 分发策略
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, delivery: Delivery);
}

/// 同步分发：在调用线程上立即执行
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateDispatcher;

impl Dispatcher for ImmediateDispatcher {
    fn dispatch(&self, delivery: Delivery) {
        delivery.deliver();
    }
}

/// 提交给执行器的工作单元
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// 外部提供的执行设施（线程池、运行时等）
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

impl<X: Executor + ?Sized> Executor for Arc<X> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

/// 把闭包适配为执行器
#[derive(Clone, Copy, Debug)]
pub struct FnExecutor<F>(pub F);

impl<F> Executor for FnExecutor<F>
where
    F: Fn(Job) + Send + Sync,
{
    fn execute(&self, job: Job) {
        (self.0)(job)
    }
}

/// 处理器是同步函数，放到 tokio 的阻塞线程池执行
#[cfg(feature = "tokio")]
impl Executor for tokio::runtime::Handle {
    fn execute(&self, job: Job) {
        drop(self.spawn_blocking(job));
    }
}

/// 异步分发：提交到执行器后立即返回
#[derive(Clone, Debug)]
pub struct ExecutorDispatcher<X> {
    executor: X,
}

impl<X: Executor> ExecutorDispatcher<X> {
    pub fn new(executor: X) -> Self {
        Self { executor }
    }
}

impl<X: Executor> Dispatcher for ExecutorDispatcher<X> {
    fn dispatch(&self, delivery: Delivery) {
        self.executor.execute(Box::new(move || delivery.deliver()));
    }
}
