//! 平台配置
//!
//! 默认模块号等平台参数作为显式配置值注入注册表，
//! 而不是全局状态，测试可以注入替代配置。

use crate::error::{AnalogError, Result};

/// 模块使用的时基（ticks/s）
pub const TIMEBASE: u32 = 40_000_000;

/// 默认平均位数（实际平均 2^7 = 128 个采样）
pub const DEFAULT_AVERAGE_BITS: u32 = 7;

/// 默认过采样位数
pub const DEFAULT_OVERSAMPLE_BITS: u32 = 0;

/// 默认采样率（每通道每秒采样数）
pub const DEFAULT_SAMPLE_RATE: f64 = 50_000.0;

/// 模拟输入平台配置
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalogConfig {
    /// 平台支持的模拟模块数（模块号 1..=module_count 有效）
    pub module_count: u8,
    /// 每个模块的物理通道数
    pub channels_per_module: u8,
    /// 未显式指定模块号时使用的默认模块
    pub default_module: u8,
}

impl Default for AnalogConfig {
    fn default() -> Self {
        Self {
            module_count: 2,
            channels_per_module: 8,
            default_module: 1,
        }
    }
}

impl AnalogConfig {
    /// 校验模块号是否在平台支持范围内
    pub fn check_module_number(&self, number: u8) -> Result<()> {
        if number < 1 || number > self.module_count {
            return Err(AnalogError::InvalidModuleNumber {
                number,
                max: self.module_count,
            });
        }
        Ok(())
    }
}
