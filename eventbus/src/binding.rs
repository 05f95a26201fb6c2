//! 处理器绑定（HandlerBinding）
//!
//! 一个绑定对应“某个已注册对象上的某个处理器”，持有：
//! - 路由键（参数类型）与并发策略；
//! - 串行化闸门：非并发处理器任一时刻至多一个调用在执行，闸门归绑定自身所有，
//!   不同绑定之间互不争用。闸门可重入：处理器在同一线程上再次投递到自己时直接放行；
//! - 存活标记：注销时清除，尚未进入处理函数的调用会被跳过。
//!
//! 处理器返回的错误与 panic 都在这里被截获，交由上层上报，不会传播给发布者。
//!
use crate::error::HandlerError;
use crate::event::EventType;
use crate::resolver::View;
use crate::subscriber::{ErasedHandler, Subscriber};
use parking_lot::ReentrantMutex;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 注册对象的身份：`Arc` 分配地址 + 具体类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerKey {
    addr: usize,
    type_id: TypeId,
}

impl OwnerKey {
    pub fn of<S: Subscriber>(owner: &Arc<S>) -> Self {
        Self {
            addr: Arc::as_ptr(owner) as *const () as usize,
            type_id: TypeId::of::<S>(),
        }
    }
}

type BoundCall = Box<dyn Fn(&dyn View, &dyn Any) -> Result<(), HandlerError> + Send + Sync>;

fn bind_call<F>(f: F) -> BoundCall
where
    F: Fn(&dyn View, &dyn Any) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// 一次调用的结果
#[derive(Debug)]
pub enum Outcome {
    Delivered,
    Failed(HandlerError),
    /// 绑定已随注销失效，未调用处理函数
    Retired,
}

pub struct HandlerBinding {
    owner: OwnerKey,
    subscriber: &'static str,
    method: &'static str,
    event_type: EventType,
    concurrent: bool,
    live: AtomicBool,
    gate: Option<ReentrantMutex<()>>,
    call: BoundCall,
}

impl HandlerBinding {
    pub(crate) fn new<S: Subscriber>(
        owner: &Arc<S>,
        method: &'static str,
        event_type: EventType,
        concurrent: bool,
        invoke: ErasedHandler<S>,
    ) -> Self {
        let target = Arc::clone(owner);
        Self {
            owner: OwnerKey::of(owner),
            subscriber: type_name::<S>(),
            method,
            event_type,
            concurrent,
            live: AtomicBool::new(true),
            gate: (!concurrent).then(|| ReentrantMutex::new(())),
            call: bind_call(move |view, root| invoke(&*target, view, root)),
        }
    }

    pub fn owner(&self) -> OwnerKey {
        self.owner
    }

    pub fn subscriber(&self) -> &'static str {
        self.subscriber
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn allows_concurrent_invocation(&self) -> bool {
        self.concurrent
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// 由注册表在写锁内调用
    pub(crate) fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// 调用处理函数
    ///
    /// 非并发绑定先取得自身闸门；取得闸门后再检查存活标记。
    /// 已持有闸门的线程再次调用时不会阻塞。
    pub(crate) fn invoke(&self, view: &dyn View, root: &dyn Any) -> Outcome {
        let _permit = self.gate.as_ref().map(|gate| gate.lock());

        if !self.is_live() {
            return Outcome::Retired;
        }

        match catch_unwind(AssertUnwindSafe(|| (self.call)(view, root))) {
            Ok(Ok(())) => Outcome::Delivered,
            Ok(Err(err)) => Outcome::Failed(err),
            Err(payload) => Outcome::Failed(HandlerError::from_panic(payload)),
        }
    }
}

impl fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("subscriber", &self.subscriber)
            .field("method", &self.method)
            .field("event_type", &self.event_type)
            .field("concurrent", &self.concurrent)
            .field("live", &self.is_live())
            .finish()
    }
}
