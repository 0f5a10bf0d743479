//! 资源使用上报
//!
//! 每次触发器构造发出一次尽力而为的遥测事件，供采用率统计使用。
//! 上报接口按签名就是不可失败的，永远不影响调用方的操作；
//! 遥测的线格式不在本核心范围内，[`UsageReporter`] 只是接缝。

use parking_lot::Mutex;
use tracing::debug;

/// 资源类型标签（u8 线标签，遥测侧按数值识别）
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
)]
#[repr(u8)]
pub enum ResourceKind {
    AnalogChannel = 0,
    AnalogTrigger = 1,
    AnalogTriggerOutput = 2,
}

/// 使用上报接缝
///
/// `instance` 是资源实例（触发器用通道序号），
/// `context` 是 0 起始的模块实例。实现必须吞掉自身的失败。
pub trait UsageReporter: Send + Sync {
    fn report(&self, resource: ResourceKind, instance: u8, context: u8);
}

/// 默认上报器：写一条 debug 日志
#[derive(Debug, Default)]
pub struct TracingReporter;

impl UsageReporter for TracingReporter {
    fn report(&self, resource: ResourceKind, instance: u8, context: u8) {
        debug!(resource = ?resource, instance, context, "usage report");
    }
}

/// 记录型上报器（测试用）
#[derive(Debug, Default)]
pub struct CountingReporter {
    reports: Mutex<Vec<(ResourceKind, u8, u8)>>,
}

impl CountingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录的上报事件，按发生顺序
    pub fn reports(&self) -> Vec<(ResourceKind, u8, u8)> {
        self.reports.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().len()
    }
}

impl UsageReporter for CountingReporter {
    fn report(&self, resource: ResourceKind, instance: u8, context: u8) {
        self.reports.lock().push((resource, instance, context));
    }
}
