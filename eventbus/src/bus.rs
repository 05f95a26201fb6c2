//! 事件总线门面（EventBus）
//!
//! 组合解析器、注册表与分发策略，对外只暴露 `register`、`unregister`、`post`：
//! - `register` / `unregister` 同步返回调用方错误，失败时注册表不变；
//! - `post` 从不失败：处理器的错误由绑定截获后交给 `FailureHandler`。
//!
//! 每个实例拥有独立的注册表与分发策略，没有进程级单例。
//!
use crate::config::EventBusConfig;
use crate::dispatcher::{Delivery, Dispatcher, Executor, ExecutorDispatcher, ImmediateDispatcher};
use crate::error::BusResult;
use crate::event::{DeadEvent, Event, EventType};
use crate::failure::{FailureHandler, LogFailures};
use crate::registry::HandlerRegistry;
use crate::resolver::{ResolvedType, TypeResolver, closure_of};
use crate::subscriber::Subscriber;
use bon::Builder;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, trace};

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::event_bus_builder::{IsUnset, SetDispatcher, State as BuilderState};

/// 进程内发布/订阅总线
///
/// ```rust
/// use eventbus::{Event, EventBus, HandlerTable, Subscriber};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Alert;
/// impl Event for Alert {}
///
/// #[derive(Default)]
/// struct Pager {
///     pages: AtomicUsize,
/// }
///
/// impl Pager {
///     fn on_alert(&self, _alert: &Alert) {
///         self.pages.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// impl Subscriber for Pager {
///     fn handlers(table: &mut HandlerTable<Self>) {
///         table.on::<Alert, _, _>("on_alert", Self::on_alert);
///     }
/// }
///
/// let bus = EventBus::new("alerts");
/// let pager = Arc::new(Pager::default());
/// bus.register(&pager).unwrap();
///
/// assert_eq!(bus.post(Alert), 1);
/// assert_eq!(pager.pages.load(Ordering::SeqCst), 1);
/// ```
#[derive(Builder)]
pub struct EventBus {
    /// 日志中使用的总线标识
    #[builder(into, default = Arc::from("default"))]
    identifier: Arc<str>,
    #[builder(default = Arc::new(ImmediateDispatcher) as Arc<dyn Dispatcher>)]
    dispatcher: Arc<dyn Dispatcher>,
    #[builder(default = Arc::new(LogFailures) as Arc<dyn FailureHandler>)]
    failure_handler: Arc<dyn FailureHandler>,
    #[builder(default)]
    config: EventBusConfig,
    #[builder(skip)]
    registry: HandlerRegistry,
    #[builder(skip)]
    resolver: TypeResolver,
}

// 自定义 Builder 方法：以执行器构造异步分发策略。
// 与 `dispatcher(...)` 互斥，受 typestate 限制只能设置其一。
impl<S: BuilderState> EventBusBuilder<S> {
    pub fn executor<X>(self, executor: X) -> EventBusBuilder<SetDispatcher<S>>
    where
        X: Executor + 'static,
        <S as BuilderState>::Dispatcher: IsUnset,
    {
        self.dispatcher(Arc::new(ExecutorDispatcher::new(executor)))
    }
}

impl EventBus {
    /// 同步总线：`post` 返回前所有匹配的处理器均已执行
    pub fn new(identifier: impl Into<Arc<str>>) -> Self {
        Self::builder().identifier(identifier).build()
    }

    /// 异步总线：`post` 只负责把调用提交给执行器
    pub fn with_executor<X>(identifier: impl Into<Arc<str>>, executor: X) -> Self
    where
        X: Executor + 'static,
    {
        Self::builder()
            .identifier(identifier)
            .executor(executor)
            .build()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// 注册对象上声明的全部处理器，返回新增绑定数
    pub fn register<S: Subscriber>(&self, subscriber: &Arc<S>) -> BusResult<usize> {
        let _span = debug_span!("eventbus", bus = %self.identifier).entered();
        self.registry.register(subscriber)
    }

    /// 注销对象的全部处理器
    ///
    /// 返回后不会再有该对象的处理器开始执行；已在执行中的调用会正常结束。
    pub fn unregister<S: Subscriber>(&self, subscriber: &Arc<S>) -> BusResult<usize> {
        let _span = debug_span!("eventbus", bus = %self.identifier).entered();
        self.registry.unregister(subscriber)
    }

    pub fn is_registered<S: Subscriber>(&self, subscriber: &Arc<S>) -> bool {
        self.registry.is_registered(subscriber)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscriber_count()
    }

    /// 精确注册在类型 `T` 上的绑定数（`T` 可以是 `dyn Trait`）
    pub fn bindings_for<T: ?Sized + 'static>(&self) -> usize {
        self.registry.lookup(EventType::of::<T>()).len()
    }

    /// 投递事件，返回分发到的绑定数
    ///
    /// 同一绑定即使经由多个类型匹配，也只收到一次。
    pub fn post<E: Event>(&self, event: E) -> usize {
        self.post_shared(Arc::new(event))
    }

    /// 投递已共享的事件；处理器收到的正是这个实例
    pub fn post_shared<E: Event>(&self, event: Arc<E>) -> usize {
        let event_type = EventType::of::<E>();
        let types = self.types_to_match::<E>();
        let targets = self.registry.targets(&types);

        if targets.is_empty() {
            self.post_dead::<E>(event_type, event);
            return 0;
        }

        let count = targets.len();
        trace!(bus = %self.identifier, %event_type, bindings = count, "dispatching event");

        let event: Arc<dyn Any + Send + Sync> = event;
        for (binding, view) in targets {
            self.dispatcher.dispatch(Delivery {
                binding,
                view,
                event: event.clone(),
                failures: self.failure_handler.clone(),
                bus: self.identifier.clone(),
            });
        }
        count
    }

    fn types_to_match<E: Event>(&self) -> Arc<[ResolvedType]> {
        if self.config.cache_type_closures {
            self.resolver.types_to_match::<E>()
        } else {
            closure_of::<E>().into()
        }
    }

    fn post_dead<E: Event>(&self, event_type: EventType, event: Arc<E>) {
        if !self.config.dead_events || TypeId::of::<E>() == TypeId::of::<DeadEvent>() {
            return;
        }
        debug!(bus = %self.identifier, %event_type, "event has no handlers");
        self.post(DeadEvent::new(self.identifier.clone(), event_type, event));
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("identifier", &self.identifier)
            .field("config", &self.config)
            .field("subscribers", &self.registry.subscriber_count())
            .field("bindings", &self.registry.binding_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{FnExecutor, Job};
    use crate::error::BusError;
    use crate::resolver::Supertypes;
    use crate::subscriber::HandlerTable;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Tagged {}

    struct Base;

    impl Tagged for Base {}

    impl Event for Base {
        fn supertypes(types: &mut Supertypes<Self>) {
            types.interface::<dyn Tagged>(|e| e);
        }
    }

    struct Derived {
        base: Base,
    }

    impl Event for Derived {
        fn supertypes(types: &mut Supertypes<Self>) {
            types.parent(|e| &e.base);
        }
    }

    struct Unrelated;

    impl Event for Unrelated {}

    #[derive(Default)]
    struct Sink {
        own: AtomicUsize,
        base: AtomicUsize,
        tagged: AtomicUsize,
    }

    impl Sink {
        fn on_derived(&self, _event: &Derived) {
            self.own.fetch_add(1, Ordering::SeqCst);
        }

        fn on_base(&self, _event: &Base) {
            self.base.fetch_add(1, Ordering::SeqCst);
        }

        fn on_tagged(&self, _event: &(dyn Tagged + 'static)) {
            self.tagged.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Subscriber for Sink {
        fn handlers(table: &mut HandlerTable<Self>) {
            table
                .on::<Derived, _, _>("on_derived", Self::on_derived)
                .on::<Base, _, _>("on_base", Self::on_base)
                .on::<dyn Tagged, _, _>("on_tagged", Self::on_tagged);
        }
    }

    #[derive(Default)]
    struct Graveyard {
        dead: Mutex<Vec<EventType>>,
    }

    impl Graveyard {
        fn on_dead(&self, event: &DeadEvent) {
            self.dead.lock().unwrap().push(event.event_type());
        }
    }

    impl Subscriber for Graveyard {
        fn handlers(table: &mut HandlerTable<Self>) {
            table.on::<DeadEvent, _, _>("on_dead", Self::on_dead);
        }
    }

    #[test]
    fn post_reaches_own_ancestor_and_interface_handlers() {
        let bus = EventBus::new("unit");
        let sink = Arc::new(Sink::default());
        bus.register(&sink).unwrap();

        assert_eq!(bus.post(Derived { base: Base }), 3);
        assert_eq!(sink.own.load(Ordering::SeqCst), 1);
        assert_eq!(sink.base.load(Ordering::SeqCst), 1);
        assert_eq!(sink.tagged.load(Ordering::SeqCst), 1);

        assert_eq!(bus.post(Base), 2);
        assert_eq!(sink.own.load(Ordering::SeqCst), 1);
        assert_eq!(sink.base.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unmatched_events_become_dead_events() {
        let bus = EventBus::new("unit");
        let graveyard = Arc::new(Graveyard::default());
        bus.register(&graveyard).unwrap();

        assert_eq!(bus.post(Unrelated), 0);
        assert_eq!(
            graveyard.dead.lock().unwrap().as_slice(),
            [EventType::of::<Unrelated>()]
        );
    }

    #[test]
    fn dead_events_can_be_disabled() {
        let bus = EventBus::builder()
            .identifier("quiet")
            .config(EventBusConfig {
                dead_events: false,
                ..EventBusConfig::default()
            })
            .build();
        let graveyard = Arc::new(Graveyard::default());
        bus.register(&graveyard).unwrap();

        assert_eq!(bus.post(Unrelated), 0);
        assert!(graveyard.dead.lock().unwrap().is_empty());
    }

    #[test]
    fn uncached_resolution_matches_cached() {
        let bus = EventBus::builder()
            .config(EventBusConfig {
                cache_type_closures: false,
                ..EventBusConfig::default()
            })
            .build();
        let sink = Arc::new(Sink::default());
        bus.register(&sink).unwrap();

        assert_eq!(bus.post(Derived { base: Base }), 3);
        assert_eq!(bus.resolver.cached_types(), 0);
        assert_eq!(bus.identifier(), "default");
    }

    #[test]
    fn introspection_reflects_registry() {
        let bus = EventBus::new("unit");
        let sink = Arc::new(Sink::default());
        assert!(!bus.is_registered(&sink));

        assert_eq!(bus.register(&sink).unwrap(), 3);
        assert!(bus.is_registered(&sink));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.bindings_for::<dyn Tagged>(), 1);
        assert_eq!(bus.bindings_for::<Unrelated>(), 0);

        assert_eq!(bus.unregister(&sink).unwrap(), 3);
        assert_eq!(
            bus.unregister(&sink),
            Err(BusError::NotRegistered {
                subscriber: std::any::type_name::<Sink>(),
            })
        );
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn executor_builder_defers_dispatch() {
        let jobs: Arc<Mutex<Vec<Job>>> = Arc::default();
        let sink_jobs = jobs.clone();
        let bus = EventBus::builder()
            .identifier("deferred")
            .executor(FnExecutor(move |job: Job| {
                sink_jobs.lock().unwrap().push(job);
            }))
            .build();

        let sink = Arc::new(Sink::default());
        bus.register(&sink).unwrap();
        assert_eq!(bus.post(Base), 2);
        assert_eq!(sink.base.load(Ordering::SeqCst), 0);

        for job in std::mem::take(&mut *jobs.lock().unwrap()) {
            job();
        }
        assert_eq!(sink.base.load(Ordering::SeqCst), 1);
        assert_eq!(sink.tagged.load(Ordering::SeqCst), 1);
    }
}
