//! # Talos HAL 边界层
//!
//! 模拟输入硬件的寄存器级驱动边界抽象（无控制逻辑）。
//!
//! ## 模块
//!
//! - [`AnalogBackend`]: 驱动边界 trait，上层（`talos-analog`）通过它访问硬件
//! - [`mock`]: 确定性内存后端，用于测试和无硬件开发
//!
//! ## 状态码约定
//!
//! 底层驱动的每次调用都产生一个状态码：`0` 表示成功，非零表示具体的
//! 硬件/驱动故障。本层把"出参状态码 + 返回值"统一改写为
//! `Result<T, Status>`，调用方必须在每个调用点立即检查。

use std::time::Duration;

use thiserror::Error;

pub mod mock;

pub use mock::MockBackend;

/// 驱动状态码（非零即失败）
///
/// 包装驱动边界返回的原始数值状态码，仅用于诊断；本层不解释具体含义。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[error("driver status {0}")]
pub struct Status(i32);

impl Status {
    /// 包装一个非零状态码
    ///
    /// 状态码 `0` 表示成功，不应该被包装成 `Status`；
    /// 构造方（后端实现）负责维持这一不变式。
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// 从驱动返回的原始状态码构造
    ///
    /// `0`（成功）返回 `None`，非零返回 `Some(Status)`。
    pub const fn from_raw(code: i32) -> Option<Self> {
        if code == 0 { None } else { Some(Self(code)) }
    }

    /// 原始数值状态码
    pub const fn code(self) -> i32 {
        self.0
    }
}

/// 驱动边界调用的统一结果类型
pub type HalResult<T> = Result<T, Status>;

/// 已绑定硬件通道的不透明句柄
///
/// 由后端的 `bind_port` 签发，被绑定它的模块或触发器独占持有；
/// 不可克隆，两个存活的持有者之间永远不共享句柄。
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PortHandle {
    module: u8,
    channel: u8,
    token: u32,
}

impl PortHandle {
    /// 由后端实现在绑定成功时构造
    pub const fn new(module: u8, channel: u8, token: u32) -> Self {
        Self {
            module,
            channel,
            token,
        }
    }

    /// 所属模块号（1 起始）
    pub const fn module_number(&self) -> u8 {
        self.module
    }

    /// 通道号（1 起始，与驱动边界一致）
    pub const fn channel(&self) -> u8 {
        self.channel
    }

    /// 后端内部记账用的令牌
    pub const fn token(&self) -> u32 {
        self.token
    }
}

/// 模拟输入驱动边界
///
/// 对应寄存器级驱动暴露的全部模拟输入操作。所有调用都是同步的，
/// 耗时由驱动自身的时序决定（见 [`AnalogBackend::call_bound`]），
/// 本层不引入超时或取消概念。
///
/// # 线程安全
///
/// 后端实现必须可被多个持有者并发调用（`Send + Sync`）；
/// 单个句柄上的调用序由上层的独占所有权保证。
pub trait AnalogBackend: Send + Sync {
    /// 绑定一个硬件通道，签发独占句柄
    ///
    /// `channel` 为 1 起始的物理通道号。
    fn bind_port(&self, module: u8, channel: u8) -> HalResult<PortHandle>;

    /// 归还一个端口句柄（绑定失败回滚时使用）
    fn release_port(&self, port: PortHandle);

    /// 设置模块级采样率（每通道每秒采样数）
    ///
    /// 模块是单一扫描率域，此设置影响模块内所有通道。
    fn set_sample_rate(&self, module: u8, samples_per_second: f64) -> HalResult<()>;

    /// 读取模块级采样率
    fn sample_rate(&self, module: u8) -> HalResult<f64>;

    /// 设置硬件平均位数（实际平均 2^bits 个采样）
    fn set_average_bits(&self, port: &PortHandle, bits: u32) -> HalResult<()>;

    /// 读取硬件平均位数
    fn average_bits(&self, port: &PortHandle) -> HalResult<u32>;

    /// 设置过采样位数（实际累积 2^bits 个采样）
    fn set_oversample_bits(&self, port: &PortHandle, bits: u32) -> HalResult<()>;

    /// 读取过采样位数
    fn oversample_bits(&self, port: &PortHandle) -> HalResult<u32>;

    /// 读取原始 ADC 码值（绕过平均/过采样与标定）
    fn value(&self, port: &PortHandle) -> HalResult<i32>;

    /// 读取经过平均/过采样流水线的原始码值
    fn average_value(&self, port: &PortHandle) -> HalResult<i32>;

    /// 按通道标定把电压换算为等效原始码值
    ///
    /// 标定数据（LSB 权重、偏移）保存在驱动侧，本层不复制。
    fn volts_to_value(&self, port: &PortHandle, volts: f64) -> HalResult<i32>;

    /// 读取标定后的电压
    fn voltage(&self, port: &PortHandle) -> HalResult<f64>;

    /// 读取经过平均/过采样流水线的标定电压
    fn average_voltage(&self, port: &PortHandle) -> HalResult<f64>;

    /// 读取标定 LSB 权重（纳伏/码值）
    fn lsb_weight(&self, port: &PortHandle) -> HalResult<u32>;

    /// 读取标定偏移（纳伏）
    fn offset(&self, port: &PortHandle) -> HalResult<i32>;

    /// 把一个已绑定端口初始化为模拟触发器，返回硬件分配的触发器序号
    fn init_trigger(&self, port: &PortHandle) -> HalResult<u32>;

    /// 设置触发器上下限（ADC 码值）
    fn set_trigger_limits_raw(&self, port: &PortHandle, lower: i32, upper: i32) -> HalResult<()>;

    /// 设置触发器上下限（电压，驱动侧按通道标定换算）
    fn set_trigger_limits_voltage(
        &self,
        port: &PortHandle,
        lower: f64,
        upper: f64,
    ) -> HalResult<()>;

    /// 选择触发器监视平均值还是即时原始值
    fn set_trigger_averaged(&self, port: &PortHandle, averaged: bool) -> HalResult<()>;

    /// 启用/关闭 3 点平均抑制滤波
    ///
    /// 用于信号不连续回绕的场景（如整圈电位计过零点）。
    fn set_trigger_filtered(&self, port: &PortHandle, filtered: bool) -> HalResult<()>;

    /// 读取窗口输出：监视值是否落在上下限之间
    fn trigger_in_window(&self, port: &PortHandle) -> HalResult<bool>;

    /// 读取触发状态输出
    ///
    /// 高于上限为 true，低于下限为 false，滞回带内保持上次状态；
    /// 状态机在硬件中实现，此处只读。
    fn trigger_state(&self, port: &PortHandle) -> HalResult<bool>;

    /// 释放触发器并归还其端口句柄
    fn release_trigger(&self, port: PortHandle) -> HalResult<()>;

    /// 单次驱动调用的时长上界（诊断用）
    ///
    /// 默认 1ms；真实后端按硬件时序覆盖。
    fn call_bound(&self) -> Duration {
        Duration::from_millis(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_raw() {
        assert_eq!(Status::from_raw(0), None);
        assert_eq!(Status::from_raw(3), Some(Status::new(3)));
        assert_eq!(Status::from_raw(-1004), Some(Status::new(-1004)));
    }

    #[test]
    fn test_status_display() {
        let status = Status::new(-1004);
        assert_eq!(format!("{status}"), "driver status -1004");
        assert_eq!(status.code(), -1004);
    }

    #[test]
    fn test_port_handle_accessors() {
        let port = PortHandle::new(1, 4, 42);
        assert_eq!(port.module_number(), 1);
        assert_eq!(port.channel(), 4);
        assert_eq!(port.token(), 42);
    }
}
