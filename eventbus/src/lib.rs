//! 进程内发布/订阅事件总线（eventbus）
//!
//! 发布者把任意事件值投递到总线，总线按事件的运行时类型路由给已注册的处理器：
//! - 事件类型解析（`resolver`）：自身类型、祖先类型与实现的接口（`dyn Trait`）；
//! - 处理器注册表（`registry`）：按订阅者与按事件类型的双向索引，线程安全；
//! - 处理器绑定（`binding`）：每个绑定自带串行化闸门，并隔离处理器的错误与 panic；
//! - 分发策略（`dispatcher`）：在发布线程上同步执行，或提交到外部执行器异步执行；
//! - 总线门面（`bus`）：`register` / `unregister` / `post`。
//!
//! 订阅者通过显式声明表（`Subscriber::handlers`）暴露处理器，不依赖反射；
//! 配合 `eventbus-macros` 中的 `#[subscriber]` / `#[derive(Event)]` 可省去手写。
//!
//! 典型用法：
//! 1. 为事件类型实现 `Event`，需要按父类型/接口路由时声明 `supertypes`；
//! 2. 为订阅者实现 `Subscriber`，以 `Arc` 注册到总线；
//! 3. 选择同步（`EventBus::new`）或异步（`EventBus::with_executor`）总线并 `post`。
//!
pub mod binding;
pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod failure;
pub mod registry;
pub mod resolver;
pub mod subscriber;

pub use bus::EventBus;
pub use config::EventBusConfig;
pub use dispatcher::{Dispatcher, Executor, ExecutorDispatcher, FnExecutor, ImmediateDispatcher};
pub use error::{BusError, BusResult, HandlerError};
pub use event::{DeadEvent, Event, EventType};
pub use failure::{FailureHandler, HandlerFailure, LogFailures};
pub use resolver::Supertypes;
pub use subscriber::{HandlerTable, Subscriber};

// 允许在本 crate 内部通过 ::eventbus 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::eventbus 路径。
extern crate self as eventbus;
