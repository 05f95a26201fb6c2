//! 处理器注册表（HandlerRegistry）
//!
//! 同一组绑定的两个视图：
//! - 按订阅者：`OwnerKey → [binding]`，用于注销；
//! - 按类型：`EventType → [binding]`，用于路由。
//!
//! 两个视图放在同一把读写锁下，注册/注销整体生效，`post` 在一次读锁内取得快照后
//! 即释放锁再分发，因此发布者看到的要么是完整注册前的状态，要么是完整注册后的状态。
//!
use crate::binding::{HandlerBinding, OwnerKey};
use crate::error::{BusError, BusResult};
use crate::event::EventType;
use crate::resolver::{ResolvedType, View};
use crate::subscriber::{DeclShape, HandlerTable, Subscriber};
use std::any::type_name;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

#[derive(Default)]
struct Index {
    by_owner: HashMap<OwnerKey, Vec<Arc<HandlerBinding>>>,
    by_type: HashMap<EventType, Vec<Arc<HandlerBinding>>>,
}

/// 一次 `post` 的分发目标：绑定 + 把根事件看作其参数类型的视图
pub(crate) type Target = (Arc<HandlerBinding>, Arc<dyn View>);

#[derive(Default)]
pub struct HandlerRegistry {
    index: RwLock<Index>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册订阅者的全部处理器，返回新增绑定数
    ///
    /// 声明表为空、同名处理器重复声明、存在参数个数不为 1 的处理器、或该对象已注册时
    /// 返回错误，注册表不变。
    pub fn register<S: Subscriber>(&self, owner: &Arc<S>) -> BusResult<usize> {
        let subscriber = type_name::<S>();
        let decls = HandlerTable::<S>::collect().into_decls();

        if decls.is_empty() {
            warn!(subscriber, "rejected registration without handlers");
            return Err(BusError::NoEligibleHandlers { subscriber });
        }

        let mut methods = HashSet::with_capacity(decls.len());
        if let Some(method) = decls.iter().map(|d| d.method).find(|m| !methods.insert(*m)) {
            warn!(subscriber, method, "rejected duplicate handler declaration");
            return Err(BusError::DuplicateHandler { subscriber, method });
        }

        let mut bindings = Vec::with_capacity(decls.len());
        for decl in decls {
            match decl.shape {
                DeclShape::Typed {
                    event_type,
                    concurrent,
                    invoke,
                } => bindings.push(Arc::new(HandlerBinding::new(
                    owner,
                    decl.method,
                    event_type,
                    concurrent,
                    invoke,
                ))),
                DeclShape::BadArity { arity } => {
                    warn!(
                        subscriber,
                        method = decl.method,
                        arity,
                        "rejected handler with wrong arity"
                    );
                    return Err(BusError::MultiParameterHandler {
                        subscriber,
                        method: decl.method,
                        arity,
                    });
                }
            }
        }

        let key = OwnerKey::of(owner);
        let mut index = self.write();
        if index.by_owner.contains_key(&key) {
            warn!(subscriber, "rejected duplicate registration");
            return Err(BusError::AlreadyRegistered { subscriber });
        }

        for binding in &bindings {
            index
                .by_type
                .entry(binding.event_type())
                .or_default()
                .push(binding.clone());
        }
        let count = bindings.len();
        index.by_owner.insert(key, bindings);
        drop(index);

        debug!(subscriber, bindings = count, "subscriber registered");
        Ok(count)
    }

    /// 注销订阅者的全部处理器，返回移除的绑定数
    pub fn unregister<S: Subscriber>(&self, owner: &Arc<S>) -> BusResult<usize> {
        let subscriber = type_name::<S>();
        let key = OwnerKey::of(owner);

        let mut index = self.write();
        let Some(bindings) = index.by_owner.remove(&key) else {
            return Err(BusError::NotRegistered { subscriber });
        };

        for binding in &bindings {
            binding.retire();
            let ty = binding.event_type();
            if let Some(list) = index.by_type.get_mut(&ty) {
                list.retain(|b| !Arc::ptr_eq(b, binding));
                if list.is_empty() {
                    index.by_type.remove(&ty);
                }
            }
        }
        drop(index);

        debug!(subscriber, bindings = bindings.len(), "subscriber unregistered");
        Ok(bindings.len())
    }

    /// 精确类型的绑定集合
    pub fn lookup(&self, ty: EventType) -> Vec<Arc<HandlerBinding>> {
        self.read().by_type.get(&ty).cloned().unwrap_or_default()
    }

    /// 在同一把读锁内合并各类型的绑定，同一绑定只出现一次
    pub(crate) fn targets(&self, types: &[ResolvedType]) -> Vec<Target> {
        let index = self.read();
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        for resolved in types {
            let Some(bindings) = index.by_type.get(&resolved.ty()) else {
                continue;
            };
            for binding in bindings {
                if seen.insert(Arc::as_ptr(binding)) {
                    targets.push((binding.clone(), resolved.view().clone()));
                }
            }
        }
        targets
    }

    pub fn is_registered<S: Subscriber>(&self, owner: &Arc<S>) -> bool {
        self.read().by_owner.contains_key(&OwnerKey::of(owner))
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().by_owner.len()
    }

    pub fn binding_count(&self) -> usize {
        self.read().by_owner.values().map(Vec::len).sum()
    }

    fn read(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Index> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}
