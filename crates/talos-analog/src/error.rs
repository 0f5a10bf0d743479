//! 模拟输入核心错误类型定义

use talos_hal::Status;
use thiserror::Error;

/// 模拟输入核心错误类型
///
/// 本层校验（前三个变体）在任何硬件调用之前完成；
/// [`AnalogError::Hal`] 包装驱动边界返回的非零状态码及其操作上下文。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogError {
    /// 模块号超出平台支持范围
    #[error("invalid analog module number {number} (supported: 1..={max})")]
    InvalidModuleNumber { number: u8, max: u8 },

    /// 通道序号超出模块通道数
    #[error("invalid analog channel {channel} (module has {count} channels)")]
    InvalidChannel { channel: u8, count: u8 },

    /// 上下限次序颠倒（lower > upper）
    #[error("lower bound is greater than upper bound")]
    BoundaryViolation,

    /// 驱动边界调用返回非零状态
    #[error("hal operation `{op}` failed: {status}")]
    Hal { op: &'static str, status: Status },

    /// 触发器已释放，句柄不再有效
    #[error("analog trigger has been released")]
    Released,
}

impl AnalogError {
    /// 包装一次失败的驱动调用
    pub(crate) fn hal(op: &'static str, status: Status) -> Self {
        Self::Hal { op, status }
    }
}

/// 本 crate 的统一结果类型
pub type Result<T> = std::result::Result<T, AnalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试 AnalogError 的 Display 实现
    #[test]
    fn test_error_display() {
        let err = AnalogError::InvalidModuleNumber { number: 9, max: 2 };
        assert_eq!(
            format!("{err}"),
            "invalid analog module number 9 (supported: 1..=2)"
        );

        let err = AnalogError::InvalidChannel {
            channel: 8,
            count: 8,
        };
        assert_eq!(format!("{err}"), "invalid analog channel 8 (module has 8 channels)");

        let err = AnalogError::hal("bind_port", Status::new(3));
        assert_eq!(
            format!("{err}"),
            "hal operation `bind_port` failed: driver status 3"
        );
    }

    #[test]
    fn test_hal_error_keeps_status() {
        let err = AnalogError::hal("value", Status::new(-1005));
        match err {
            AnalogError::Hal { op, status } => {
                assert_eq!(op, "value");
                assert_eq!(status.code(), -1005);
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
