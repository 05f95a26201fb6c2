//! 事件（Event）与事件类型标识（EventType）
//!
//! 总线只关心事件的运行时类型，不读取也不修改其字段。
//! 事件可通过 `Event::supertypes` 声明自己的“父类型”（内嵌的父事件值）
//! 与“接口”（trait object，如 `dyn Severity`），由解析器计算传递闭包。
//!
use crate::resolver::Supertypes;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 事件类型标识：路由键
///
/// 相等性与哈希只看 `TypeId`，`name` 仅用于日志与错误信息。
/// 可为任意 `'static` 类型构造，包括 `dyn Trait`。
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 可投递到总线上的事件
///
/// 默认没有父类型与接口；需要按父类型/接口路由时覆写 `supertypes`：
///
/// ```rust
/// use eventbus::event::Event;
/// use eventbus::resolver::Supertypes;
///
/// pub trait Severity: Send + Sync {
///     fn level(&self) -> u8;
/// }
///
/// pub struct Alert {
///     pub level: u8,
/// }
///
/// impl Severity for Alert {
///     fn level(&self) -> u8 {
///         self.level
///     }
/// }
///
/// impl Event for Alert {
///     fn supertypes(types: &mut Supertypes<Self>) {
///         types.interface::<dyn Severity>(|e| e);
///     }
/// }
///
/// pub struct DiskAlert {
///     pub base: Alert,
///     pub mount: String,
/// }
///
/// impl Event for DiskAlert {
///     fn supertypes(types: &mut Supertypes<Self>) {
///         types.parent(|e| &e.base);
///     }
/// }
/// ```
pub trait Event: Any + Send + Sync {
    /// 声明直接父类型与接口（传递闭包由解析器计算）
    fn supertypes(types: &mut Supertypes<Self>)
    where
        Self: Sized,
    {
        let _ = types;
    }
}

/// 无人接收的事件
///
/// 当一次 `post` 没有匹配到任何处理器时，总线会将原事件包装为 `DeadEvent` 重新投递，
/// 便于记录或调试“发出但无人监听”的事件。
#[derive(Clone)]
pub struct DeadEvent {
    source: Arc<str>,
    event_type: EventType,
    event: Arc<dyn Any + Send + Sync>,
}

impl DeadEvent {
    pub(crate) fn new(
        source: Arc<str>,
        event_type: EventType,
        event: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            source,
            event_type,
            event,
        }
    }

    /// 产生该事件的总线标识
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 原事件的具体类型
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// 原事件（类型擦除）
    pub fn event(&self) -> &(dyn Any + Send + Sync) {
        self.event.as_ref()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.event.downcast_ref::<T>()
    }
}

impl fmt::Debug for DeadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadEvent")
            .field("source", &self.source)
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

impl Event for DeadEvent {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Marker {}

    #[test]
    fn event_type_identity_ignores_name() {
        let a = EventType::of::<String>();
        let b = EventType::of::<String>();
        let c = EventType::of::<u32>();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<EventType> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn trait_objects_are_routing_keys() {
        let ty = EventType::of::<dyn Marker>();
        assert_eq!(ty.id(), TypeId::of::<dyn Marker>());
        assert!(ty.name().contains("Marker"));
    }

    #[test]
    fn dead_event_keeps_original_value() {
        let dead = DeadEvent::new(
            Arc::from("bus"),
            EventType::of::<u64>(),
            Arc::new(7_u64),
        );
        assert_eq!(dead.source(), "bus");
        assert_eq!(dead.event_type(), EventType::of::<u64>());
        assert_eq!(dead.downcast_ref::<u64>(), Some(&7));
        assert!(dead.downcast_ref::<String>().is_none());
    }
}
