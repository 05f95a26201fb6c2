use proc_macro::TokenStream;

mod event;
mod subscriber;

/// 事件派生宏
/// - 生成 `::eventbus::event::Event` 实现
/// - 字段上的 `#[event(parent)]` 声明内嵌的父事件（可多个，按字段顺序）
/// - 类型上的 `#[event(implements(dyn Trait, ...))]` 声明实现的接口，`dyn` 可省略
#[proc_macro_derive(Event, attributes(event))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    event::expand(input)
}

/// 订阅者宏，作用于 `impl` 块
/// - 收集标注 `#[subscribe]` / `#[subscribe(concurrent)]` 的方法，生成 `::eventbus::subscriber::Subscriber` 实现
/// - 方法必须以 `&self` 为接收者，事件参数写作 `&T`（`T` 可为 `dyn Trait`）
/// - 事件参数个数不为 1 的方法仍会被声明，注册时以 `MultiParameterHandler` 拒绝
#[proc_macro_attribute]
pub fn subscriber(attr: TokenStream, item: TokenStream) -> TokenStream {
    subscriber::expand(attr, item)
}
