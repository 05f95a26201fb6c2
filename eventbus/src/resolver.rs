//! 事件类型解析器（TypeResolver）
//!
//! 给定事件的具体类型，计算其可匹配的类型序列：
//! 自身类型 → 祖先类型（深度优先，按声明顺序）→ 接口（先自身声明，再经由祖先继承），
//! 去重时保留首次出现。
//!
//! 每个解析结果都携带一个类型擦除的“视图”，可以把根事件看作该目标类型，
//! 处理器绑定在调用时据此取得 `&P`。按具体类型缓存解析结果。
//!
use crate::event::{Event, EventType};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 把根事件提升为某个父类型值（类型擦除）
type Lift = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;

fn lift<F>(f: F) -> Lift
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 类型擦除的视图：可向下转型为 `Projection<P>`
pub(crate) trait View: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// 以父类型为根的视图，改写为以子类型为根
    fn rebase(&self, lift: Lift) -> Arc<dyn View>;
}

/// 从根事件到目标类型 `P` 的投影
pub(crate) struct Projection<P: ?Sized + 'static> {
    project: Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a P> + Send + Sync>,
}

impl<P: ?Sized + 'static> Projection<P> {
    fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a dyn Any) -> Option<&'a P> + Send + Sync + 'static,
    {
        Self {
            project: Arc::new(f),
        }
    }

    pub(crate) fn view<'a>(&self, root: &'a dyn Any) -> Option<&'a P> {
        (self.project)(root)
    }
}

impl<P: ?Sized + 'static> View for Projection<P> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn rebase(&self, lift: Lift) -> Arc<dyn View> {
        let inner = self.project.clone();
        Arc::new(Projection::<P>::new(move |root| {
            lift(root).and_then(|parent| inner(parent))
        }))
    }
}

/// 解析结果中类型的来源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Own,
    Ancestor,
    Interface,
}

/// 一个可匹配的类型及其视图
#[derive(Clone)]
pub struct ResolvedType {
    ty: EventType,
    kind: TypeKind,
    view: Arc<dyn View>,
}

impl ResolvedType {
    pub fn ty(&self) -> EventType {
        self.ty
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub(crate) fn view(&self) -> &Arc<dyn View> {
        &self.view
    }

    fn rebased(&self, kind: TypeKind, lift: Lift) -> Self {
        Self {
            ty: self.ty,
            kind,
            view: self.view.rebase(lift),
        }
    }
}

impl fmt::Debug for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedType")
            .field("ty", &self.ty)
            .field("kind", &self.kind)
            .finish()
    }
}

/// 事件的父类型/接口声明表，由 `Event::supertypes` 填充
pub struct Supertypes<E> {
    ancestors: Vec<ResolvedType>,
    interfaces: Vec<ResolvedType>,
    inherited: Vec<ResolvedType>,
    _marker: PhantomData<fn(&E)>,
}

impl<E: Event> Supertypes<E> {
    fn new() -> Self {
        Self {
            ancestors: Vec::new(),
            interfaces: Vec::new(),
            inherited: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// 声明一个直接父类型：`project` 返回内嵌的父事件值
    ///
    /// 父类型自身的祖先与接口一并继承。
    pub fn parent<P: Event>(&mut self, project: fn(&E) -> &P) -> &mut Self {
        let lift = lift(move |root| {
            root.downcast_ref::<E>()
                .map(|event| project(event) as &dyn Any)
        });

        for entry in closure_of::<P>() {
            match entry.kind {
                TypeKind::Own | TypeKind::Ancestor => self
                    .ancestors
                    .push(entry.rebased(TypeKind::Ancestor, lift.clone())),
                TypeKind::Interface => self
                    .inherited
                    .push(entry.rebased(TypeKind::Interface, lift.clone())),
            }
        }
        self
    }

    /// 声明一个实现的接口，通常写作 `types.interface::<dyn Trait>(|e| e)`
    pub fn interface<I: ?Sized + 'static>(&mut self, project: fn(&E) -> &I) -> &mut Self {
        self.interfaces.push(ResolvedType {
            ty: EventType::of::<I>(),
            kind: TypeKind::Interface,
            view: Arc::new(Projection::<I>::new(move |root| {
                root.downcast_ref::<E>().map(project)
            })),
        });
        self
    }
}

/// 计算 `E` 的类型闭包（不缓存）
pub fn closure_of<E: Event>() -> Vec<ResolvedType> {
    let mut declared = Supertypes::<E>::new();
    E::supertypes(&mut declared);

    let own = ResolvedType {
        ty: EventType::of::<E>(),
        kind: TypeKind::Own,
        view: Arc::new(Projection::<E>::new(|root| root.downcast_ref::<E>())),
    };

    let mut seen = HashSet::new();
    std::iter::once(own)
        .chain(declared.ancestors)
        .chain(declared.interfaces)
        .chain(declared.inherited)
        .filter(|entry| seen.insert(entry.ty))
        .collect()
}

/// 带缓存的类型解析器：按具体 `TypeId` 记忆类型闭包
#[derive(Default)]
pub struct TypeResolver {
    cache: DashMap<TypeId, Arc<[ResolvedType]>>,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回 `E` 的可匹配类型序列（自身、祖先、接口）
    pub fn types_to_match<E: Event>(&self) -> Arc<[ResolvedType]> {
        let key = TypeId::of::<E>();
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }

        self.cache
            .entry(key)
            .or_insert_with(|| closure_of::<E>().into())
            .clone()
    }

    pub fn cached_types(&self) -> usize {
        self.cache.len()
    }
}
