//! 事件总线配置
use serde::{Deserialize, Serialize};

/// 事件总线配置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// 无人接收的事件是否包装为 `DeadEvent` 重新投递
    pub dead_events: bool,
    /// 是否按具体类型缓存类型闭包
    pub cache_type_closures: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            dead_events: true,
            cache_type_closures: true,
        }
    }
}
