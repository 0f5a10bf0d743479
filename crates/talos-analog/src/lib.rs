//! # Talos 模拟输入核心
//!
//! 本模块提供 Talos 机器人控制器模拟输入硬件的受控访问，包括：
//! - 模块注册表（按键构造一次、共享返回）
//! - 模块级采样率与通道级平均/过采样配置
//! - 原始码值与标定电压读出
//! - 模拟触发器（窗口/状态布尔输出，供下游数字逻辑使用）
//!
//! ## 在架构中的位置
//!
//! ```text
//! 控制循环 / 上层代码
//!     ↓ ModuleRegistry / AnalogModule / AnalogTrigger
//! talos-analog (此 crate)
//!     ↓ AnalogBackend trait（每次调用返回 Result<T, Status>）
//! talos-hal（寄存器级驱动边界）
//!     ↓
//! Hardware
//! ```
//!
//! ## 错误纪律
//!
//! 本层自身的校验（模块号、通道号、上下限次序）在任何硬件调用之前完成；
//! 驱动返回的非零状态立即以 [`AnalogError::Hal`] 上浮，不重试、不恢复。
//!
//! ## 使用示例
//!
//! ```rust
//! use std::sync::Arc;
//! use talos_analog::{AnalogTrigger, ModuleRegistry};
//! use talos_hal::MockBackend;
//!
//! # fn main() -> Result<(), talos_analog::AnalogError> {
//! let registry = ModuleRegistry::new(Arc::new(MockBackend::new()));
//!
//! let module = registry.analog(1)?;
//! module.set_average_bits(3, 7)?;
//! let volts = module.voltage(3)?;
//!
//! let trigger = AnalogTrigger::new(&registry, 3)?;
//! trigger.set_limits_raw(10, 50)?;
//! let armed = trigger.trigger_state()?;
//! # let _ = (volts, armed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod module;
pub mod registry;
pub mod trigger;
pub mod usage;

// 重新导出常用类型
pub use config::{
    AnalogConfig, DEFAULT_AVERAGE_BITS, DEFAULT_OVERSAMPLE_BITS, DEFAULT_SAMPLE_RATE, TIMEBASE,
};
pub use error::{AnalogError, Result};
pub use module::AnalogModule;
pub use registry::{HardwareModule, Module, ModuleKey, ModuleKind, ModuleRegistry};
pub use trigger::{AnalogTrigger, ChannelRef, TriggerOutput, TriggerOutputKind};
pub use usage::{CountingReporter, ResourceKind, TracingReporter, UsageReporter};
