//! 订阅者（Subscriber）与处理器声明表（HandlerTable）
//!
//! 订阅者通过 `Subscriber::handlers` 显式声明自己的处理器：
//! 每项为 `(事件类型, 处理函数, 是否允许并发调用)`。总线不做反射，只读取这张表。
//! 通常由 `#[subscriber]` 属性宏生成，也可以手写。
//!
use crate::error::HandlerError;
use crate::event::EventType;
use crate::resolver::{Projection, View};
use std::any::Any;
use std::sync::Arc;

/// 可注册到总线上的对象
pub trait Subscriber: Send + Sync + 'static {
    /// 填充处理器声明表
    fn handlers(table: &mut HandlerTable<Self>)
    where
        Self: Sized;
}

/// 处理函数的返回值：`()` 或 `Result<(), E>`
pub trait HandlerOutput {
    fn into_result(self) -> anyhow::Result<()>;
}

impl HandlerOutput for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E> HandlerOutput for Result<(), E>
where
    E: Into<anyhow::Error>,
{
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

/// 类型擦除后的处理函数：以视图把根事件还原为参数类型后调用
pub(crate) type ErasedHandler<S> =
    Arc<dyn Fn(&S, &dyn View, &dyn Any) -> Result<(), HandlerError> + Send + Sync>;

fn erase<S, F>(f: F) -> ErasedHandler<S>
where
    F: Fn(&S, &dyn View, &dyn Any) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 单个处理器声明
pub(crate) struct HandlerDecl<S> {
    pub(crate) method: &'static str,
    pub(crate) shape: DeclShape<S>,
}

pub(crate) enum DeclShape<S> {
    Typed {
        event_type: EventType,
        concurrent: bool,
        invoke: ErasedHandler<S>,
    },
    /// 参数个数不为 1 的处理器，注册时被拒绝
    BadArity { arity: usize },
}

/// 处理器声明表
pub struct HandlerTable<S> {
    decls: Vec<HandlerDecl<S>>,
}

impl<S: Subscriber> HandlerTable<S> {
    pub(crate) fn collect() -> Self {
        let mut table = Self { decls: Vec::new() };
        S::handlers(&mut table);
        table
    }

    /// 声明一个串行处理器（同一绑定任一时刻至多一个调用在执行）
    ///
    /// 按接口订阅时 `P` 为 `dyn Trait`，处理函数参数需写作 `&(dyn Trait + 'static)`，
    /// 或者用闭包转发：`|this, event| this.on_alert(event)`。
    pub fn on<P, R, F>(&mut self, method: &'static str, handler: F) -> &mut Self
    where
        P: ?Sized + 'static,
        R: HandlerOutput,
        F: Fn(&S, &P) -> R + Send + Sync + 'static,
    {
        self.push_typed(method, false, handler)
    }

    /// 声明一个允许并发重入的处理器
    pub fn on_concurrent<P, R, F>(&mut self, method: &'static str, handler: F) -> &mut Self
    where
        P: ?Sized + 'static,
        R: HandlerOutput,
        F: Fn(&S, &P) -> R + Send + Sync + 'static,
    {
        self.push_typed(method, true, handler)
    }

    /// 记录一个参数个数不为 1 的处理器；`register` 会以 `MultiParameterHandler` 拒绝
    pub fn bad_arity(&mut self, method: &'static str, arity: usize) -> &mut Self {
        self.decls.push(HandlerDecl {
            method,
            shape: DeclShape::BadArity { arity },
        });
        self
    }

    pub(crate) fn into_decls(self) -> Vec<HandlerDecl<S>> {
        self.decls
    }

    fn push_typed<P, R, F>(&mut self, method: &'static str, concurrent: bool, handler: F) -> &mut Self
    where
        P: ?Sized + 'static,
        R: HandlerOutput,
        F: Fn(&S, &P) -> R + Send + Sync + 'static,
    {
        let event_type = EventType::of::<P>();
        let invoke = erase(move |owner, view, root| {
            let event = view
                .as_any()
                .downcast_ref::<Projection<P>>()
                .and_then(|projection| projection.view(root))
                .ok_or_else(|| HandlerError::ViewMismatch {
                    expected: event_type.name(),
                })?;
            handler(owner, event)
                .into_result()
                .map_err(HandlerError::Failed)
        });

        self.decls.push(HandlerDecl {
            method,
            shape: DeclShape::Typed {
                event_type,
                concurrent,
                invoke,
            },
        });
        self
    }
}
