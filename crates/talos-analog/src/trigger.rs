//! 模拟触发器
//!
//! 把一个持续采样的模拟信号转换为布尔窗口/状态输出。
//! 触发器绑定单个通道，独占自己的端口句柄；
//! 上下限判定和滞回状态机在硬件中实现，本层只做配置和读出。
//!
//! # 生命周期
//!
//! 构造即完全绑定（不存在"未绑定"的公开实例），
//! [`AnalogTrigger::release`] 之后句柄失效，为终态：
//! 重复释放是无操作，其余任何操作返回 [`AnalogError::Released`]。
//! 未显式释放的触发器在 Drop 时尽力归还端口和硬件槽位。

use std::sync::Arc;

use tracing::{debug, info};

use talos_hal::{AnalogBackend, PortHandle};

use crate::error::{AnalogError, Result};
use crate::registry::ModuleRegistry;
use crate::usage::ResourceKind;

/// 一个 (模块, 通道) 对的轻量引用
///
/// 由 [`AnalogModule::channel_ref`](crate::AnalogModule::channel_ref) 签发，
/// 用于在触发器与模拟通道对象之间共享同一个物理通道。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRef {
    module: u8,
    channel: u8,
}

impl ChannelRef {
    pub(crate) const fn new(module: u8, channel: u8) -> Self {
        Self { module, channel }
    }

    /// 模块号（1 起始）
    pub const fn module_number(&self) -> u8 {
        self.module
    }

    /// 通道序号（0 起始）
    pub const fn channel(&self) -> u8 {
        self.channel
    }
}

/// 触发器的两路布尔输出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutputKind {
    /// 窗口输出：监视值在上下限之间
    InWindow,
    /// 状态输出：带滞回的越限状态机
    State,
}

/// 模拟触发器
pub struct AnalogTrigger {
    backend: Arc<dyn AnalogBackend>,
    /// 释放后为 None，句柄不再有效
    port: Option<PortHandle>,
    index: u32,
    module: u8,
    channel: u8,
}

impl AnalogTrigger {
    /// 在默认模块的指定通道上构造触发器
    pub fn new(registry: &ModuleRegistry, channel: u8) -> Result<Self> {
        Self::init(registry, registry.config().default_module, channel)
    }

    /// 在显式 (模块号, 通道) 上构造触发器
    pub fn with_module(registry: &ModuleRegistry, module_number: u8, channel: u8) -> Result<Self> {
        Self::init(registry, module_number, channel)
    }

    /// 从既有通道引用构造触发器（与模拟通道对象共享通道时使用）
    pub fn from_ref(registry: &ModuleRegistry, source: ChannelRef) -> Result<Self> {
        Self::init(registry, source.module_number(), source.channel())
    }

    /// 三个构造变体汇聚的初始化路径
    ///
    /// 通过注册表解析模块（模块的生命周期长于触发器），校验通道，
    /// 绑定触发器自己的端口并记录硬件分配的序号。
    /// 无论绑定成败，恰好发出一次使用上报（通道 + 0 起始模块实例）。
    fn init(registry: &ModuleRegistry, module_number: u8, channel: u8) -> Result<Self> {
        let module = registry.analog(module_number)?;
        let count = module.channel_count();
        if channel >= count {
            return Err(AnalogError::InvalidChannel {
                channel,
                count,
            });
        }

        let backend = Arc::clone(registry.backend());
        let bound = (|| {
            let port = backend
                .bind_port(module_number, channel + 1)
                .map_err(|status| AnalogError::hal("bind_port", status))?;
            match backend.init_trigger(&port) {
                Ok(index) => Ok((port, index)),
                Err(status) => {
                    backend.release_port(port);
                    Err(AnalogError::hal("init_trigger", status))
                },
            }
        })();

        // 采用遥测，不影响正确性：成败都上报
        registry
            .reporter()
            .report(ResourceKind::AnalogTrigger, channel, module_number - 1);

        let (port, index) = bound?;
        info!(module = module_number, channel, index, "analog trigger bound");
        Ok(Self {
            backend,
            port: Some(port),
            index,
            module: module_number,
            channel,
        })
    }

    /// 校验句柄仍然有效
    fn port(&self) -> Result<&PortHandle> {
        self.port.as_ref().ok_or(AnalogError::Released)
    }

    /// 硬件分配的触发器序号
    pub fn index(&self) -> u32 {
        self.index
    }

    /// 触发器绑定的模块号（1 起始）
    pub fn module_number(&self) -> u8 {
        self.module
    }

    /// 触发器绑定的通道序号（0 起始）
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// 触发器是否已释放
    pub fn is_released(&self) -> bool {
        self.port.is_none()
    }

    /// 设置上下限（ADC 码值）
    ///
    /// 使用过采样时，码值需按过采样倍率换算。
    ///
    /// # 错误
    /// - `BoundaryViolation`: `lower > upper`，在任何硬件调用之前拒绝
    pub fn set_limits_raw(&self, lower: i32, upper: i32) -> Result<()> {
        if lower > upper {
            return Err(AnalogError::BoundaryViolation);
        }
        self.backend
            .set_trigger_limits_raw(self.port()?, lower, upper)
            .map_err(|status| AnalogError::hal("set_trigger_limits_raw", status))
    }

    /// 设置上下限（电压，由驱动按通道当前标定换算）
    ///
    /// # 错误
    /// - `BoundaryViolation`: `lower > upper`，在任何硬件调用之前拒绝
    pub fn set_limits_voltage(&self, lower: f64, upper: f64) -> Result<()> {
        if lower > upper {
            return Err(AnalogError::BoundaryViolation);
        }
        self.backend
            .set_trigger_limits_voltage(self.port()?, lower, upper)
            .map_err(|status| AnalogError::hal("set_trigger_limits_voltage", status))
    }

    /// 选择监视平均流水线输出还是即时原始值
    pub fn set_averaged(&self, averaged: bool) -> Result<()> {
        self.backend
            .set_trigger_averaged(self.port()?, averaged)
            .map_err(|status| AnalogError::hal("set_trigger_averaged", status))
    }

    /// 启用/关闭 3 点平均抑制滤波
    ///
    /// 面向不连续回绕的信号（如整圈电位计过零点）。
    pub fn set_filtered(&self, filtered: bool) -> Result<()> {
        self.backend
            .set_trigger_filtered(self.port()?, filtered)
            .map_err(|status| AnalogError::hal("set_trigger_filtered", status))
    }

    /// 窗口输出：监视值在上下限之间时为 true
    pub fn in_window(&self) -> Result<bool> {
        self.backend
            .trigger_in_window(self.port()?)
            .map_err(|status| AnalogError::hal("trigger_in_window", status))
    }

    /// 状态输出：高于上限为 true，低于下限为 false，滞回带内保持上次状态
    pub fn trigger_state(&self) -> Result<bool> {
        self.backend
            .trigger_state(self.port()?)
            .map_err(|status| AnalogError::hal("trigger_state", status))
    }

    /// 获取一路布尔输出的路由视图，供下游数字逻辑使用
    pub fn output(&self, kind: TriggerOutputKind) -> TriggerOutput<'_> {
        TriggerOutput {
            trigger: self,
            kind,
        }
    }

    /// 释放触发器，句柄随之失效
    ///
    /// 重复释放是无操作；释放后的其余操作返回 [`AnalogError::Released`]。
    pub fn release(&mut self) -> Result<()> {
        match self.port.take() {
            Some(port) => {
                self.backend
                    .release_trigger(port)
                    .map_err(|status| AnalogError::hal("release_trigger", status))?;
                debug!(
                    module = self.module,
                    channel = self.channel,
                    index = self.index,
                    "analog trigger released"
                );
                Ok(())
            },
            None => {
                debug!(index = self.index, "analog trigger already released");
                Ok(())
            },
        }
    }
}

impl Drop for AnalogTrigger {
    fn drop(&mut self) {
        // 未显式释放时兜底归还端口和硬件触发器槽位
        if let Some(port) = self.port.take() {
            if let Err(status) = self.backend.release_trigger(port) {
                debug!(
                    index = self.index,
                    status = status.code(),
                    "analog trigger release on drop failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for AnalogTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalogTrigger")
            .field("module", &self.module)
            .field("channel", &self.channel)
            .field("index", &self.index)
            .field("released", &self.is_released())
            .finish()
    }
}

/// 触发器单路布尔输出的路由视图
///
/// 借用触发器存活期间有效；读取委托给对应的触发器输出。
#[derive(Debug, Clone, Copy)]
pub struct TriggerOutput<'a> {
    trigger: &'a AnalogTrigger,
    kind: TriggerOutputKind,
}

impl TriggerOutput<'_> {
    /// 输出类型
    pub fn kind(&self) -> TriggerOutputKind {
        self.kind
    }

    /// 读取当前输出值
    pub fn get(&self) -> Result<bool> {
        match self.kind {
            TriggerOutputKind::InWindow => self.trigger.in_window(),
            TriggerOutputKind::State => self.trigger.trigger_state(),
        }
    }
}
