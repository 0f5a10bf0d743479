//! 模拟输入模块
//!
//! 一个模块是共享同一采样率域的一组模拟输入通道（通常 8 个）。
//! 构造时为每个通道绑定端口句柄，句柄数组在模块生命周期内不变。

use std::sync::Arc;

use tracing::{info, warn};

use talos_hal::{AnalogBackend, PortHandle};

use crate::error::{AnalogError, Result};
use crate::registry::{HardwareModule, ModuleKind};
use crate::trigger::ChannelRef;

/// 模拟输入模块
///
/// 每个模块可以独立配置采样率；平均和过采样按通道配置，
/// 在硬件中完成。通道序号对外 0 起始，呈递给驱动边界时转为 1 起始。
pub struct AnalogModule {
    backend: Arc<dyn AnalogBackend>,
    number: u8,
    /// 每通道一个端口句柄，构造时填充，此后不再重新赋值
    ports: Box<[PortHandle]>,
}

impl AnalogModule {
    /// 绑定模块的全部通道端口
    ///
    /// 任何一个通道绑定失败都会使构造失败，已绑定的端口全部归还，
    /// 不会有部分绑定的实例暴露给调用方。
    pub(crate) fn bind(
        backend: Arc<dyn AnalogBackend>,
        number: u8,
        channel_count: u8,
    ) -> Result<Self> {
        let mut ports = Vec::with_capacity(channel_count as usize);
        for channel in 0..channel_count {
            match backend.bind_port(number, channel + 1) {
                Ok(port) => ports.push(port),
                Err(status) => {
                    warn!(
                        module = number,
                        channel,
                        status = status.code(),
                        "analog port bind failed, rolling back"
                    );
                    for bound in ports {
                        backend.release_port(bound);
                    }
                    return Err(AnalogError::hal("bind_port", status));
                },
            }
        }

        info!(module = number, channels = channel_count, "analog module bound");
        Ok(Self {
            backend,
            number,
            ports: ports.into_boxed_slice(),
        })
    }

    /// 模块号（1 起始）
    pub fn module_number(&self) -> u8 {
        self.number
    }

    /// 模块的物理通道数
    pub fn channel_count(&self) -> u8 {
        self.ports.len() as u8
    }

    /// 校验通道序号并取出对应端口
    fn port(&self, channel: u8) -> Result<&PortHandle> {
        self.ports
            .get(channel as usize)
            .ok_or(AnalogError::InvalidChannel {
                channel,
                count: self.channel_count(),
            })
    }

    /// 引用一个 (模块, 通道) 对，供触发器等共享通道的对象使用
    pub fn channel_ref(&self, channel: u8) -> Result<ChannelRef> {
        self.port(channel)?;
        Ok(ChannelRef::new(self.number, channel))
    }

    /// 设置模块级采样率（每通道每秒采样数）
    ///
    /// 模块是单一扫描率域，此设置影响模块内所有通道。
    pub fn set_sample_rate(&self, samples_per_second: f64) -> Result<()> {
        self.backend
            .set_sample_rate(self.number, samples_per_second)
            .map_err(|status| AnalogError::hal("set_sample_rate", status))
    }

    /// 读取模块级采样率
    pub fn sample_rate(&self) -> Result<f64> {
        self.backend
            .sample_rate(self.number)
            .map_err(|status| AnalogError::hal("sample_rate", status))
    }

    /// 设置通道的平均位数（实际平均 2^bits 个采样）
    ///
    /// 位数不在本层做范围校验，驱动拒绝时以状态码上浮。
    pub fn set_average_bits(&self, channel: u8, bits: u32) -> Result<()> {
        self.backend
            .set_average_bits(self.port(channel)?, bits)
            .map_err(|status| AnalogError::hal("set_average_bits", status))
    }

    /// 读取通道的平均位数
    pub fn average_bits(&self, channel: u8) -> Result<u32> {
        self.backend
            .average_bits(self.port(channel)?)
            .map_err(|status| AnalogError::hal("average_bits", status))
    }

    /// 设置通道的过采样位数（实际累积 2^bits 个采样）
    ///
    /// 过采样以采样率为代价换取分辨率。
    pub fn set_oversample_bits(&self, channel: u8, bits: u32) -> Result<()> {
        self.backend
            .set_oversample_bits(self.port(channel)?, bits)
            .map_err(|status| AnalogError::hal("set_oversample_bits", status))
    }

    /// 读取通道的过采样位数
    pub fn oversample_bits(&self, channel: u8) -> Result<u32> {
        self.backend
            .oversample_bits(self.port(channel)?)
            .map_err(|status| AnalogError::hal("oversample_bits", status))
    }

    /// 读取原始码值（绕过平均/过采样与标定）
    pub fn value(&self, channel: u8) -> Result<i32> {
        self.backend
            .value(self.port(channel)?)
            .map_err(|status| AnalogError::hal("value", status))
    }

    /// 读取经过平均/过采样流水线的原始码值
    pub fn average_value(&self, channel: u8) -> Result<i32> {
        self.backend
            .average_value(self.port(channel)?)
            .map_err(|status| AnalogError::hal("average_value", status))
    }

    /// 按通道标定把电压换算为等效码值
    ///
    /// 换算完全委托驱动完成，标定数据不在本层复制。
    pub fn volts_to_value(&self, channel: u8, volts: f64) -> Result<i32> {
        self.backend
            .volts_to_value(self.port(channel)?, volts)
            .map_err(|status| AnalogError::hal("volts_to_value", status))
    }

    /// 读取标定后的电压
    pub fn voltage(&self, channel: u8) -> Result<f64> {
        self.backend
            .voltage(self.port(channel)?)
            .map_err(|status| AnalogError::hal("voltage", status))
    }

    /// 读取经过平均/过采样流水线的标定电压
    pub fn average_voltage(&self, channel: u8) -> Result<f64> {
        self.backend
            .average_voltage(self.port(channel)?)
            .map_err(|status| AnalogError::hal("average_voltage", status))
    }

    /// 读取通道标定的 LSB 权重（诊断用，不做任何换算）
    pub fn lsb_weight(&self, channel: u8) -> Result<u32> {
        self.backend
            .lsb_weight(self.port(channel)?)
            .map_err(|status| AnalogError::hal("lsb_weight", status))
    }

    /// 读取通道标定的偏移（诊断用，不做任何换算）
    pub fn offset(&self, channel: u8) -> Result<i32> {
        self.backend
            .offset(self.port(channel)?)
            .map_err(|status| AnalogError::hal("offset", status))
    }
}

impl HardwareModule for AnalogModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Analog
    }

    fn module_number(&self) -> u8 {
        self.number
    }
}

impl std::fmt::Debug for AnalogModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalogModule")
            .field("number", &self.number)
            .field("channels", &self.ports.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talos_hal::MockBackend;

    fn module() -> (Arc<MockBackend>, AnalogModule) {
        let hal = Arc::new(MockBackend::new());
        let module =
            AnalogModule::bind(Arc::clone(&hal) as Arc<dyn AnalogBackend>, 1, 8).unwrap();
        (hal, module)
    }

    #[test]
    fn test_bind_all_channels() {
        let (hal, module) = module();
        assert_eq!(module.channel_count(), 8);
        assert_eq!(hal.bind_count(), 8);
        assert_eq!(hal.live_ports(), 8);
    }

    #[test]
    fn test_bind_rollback_on_failure() {
        let hal = Arc::new(MockBackend::new());
        // 第 8 个通道（序号 7，驱动侧通道号 8）绑定失败，状态码 3
        hal.set_fault("bind_port", 1, 8, 3);

        let err = AnalogModule::bind(Arc::clone(&hal) as Arc<dyn AnalogBackend>, 1, 8)
            .unwrap_err();
        match err {
            AnalogError::Hal { op, status } => {
                assert_eq!(op, "bind_port");
                assert_eq!(status.code(), 3);
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(hal.live_ports(), 0);
    }

    #[test]
    fn test_invalid_channel_everywhere() {
        let (hal, module) = module();
        let before = hal.hal_calls();

        let expected = AnalogError::InvalidChannel {
            channel: 8,
            count: 8,
        };
        assert_eq!(module.set_average_bits(8, 2).unwrap_err(), expected);
        assert_eq!(module.average_bits(8).unwrap_err(), expected);
        assert_eq!(module.set_oversample_bits(8, 2).unwrap_err(), expected);
        assert_eq!(module.oversample_bits(8).unwrap_err(), expected);
        assert_eq!(module.value(8).unwrap_err(), expected);
        assert_eq!(module.average_value(8).unwrap_err(), expected);
        assert_eq!(module.volts_to_value(8, 1.0).unwrap_err(), expected);
        assert_eq!(module.voltage(8).unwrap_err(), expected);
        assert_eq!(module.average_voltage(8).unwrap_err(), expected);
        assert_eq!(module.lsb_weight(8).unwrap_err(), expected);
        assert_eq!(module.offset(8).unwrap_err(), expected);
        assert_eq!(module.channel_ref(8).unwrap_err(), expected);

        // 本层校验拒绝的调用不触达硬件
        assert_eq!(hal.hal_calls(), before);
    }

    #[test]
    fn test_bits_roundtrip() {
        let (_hal, module) = module();

        module.set_average_bits(3, 7).unwrap();
        assert_eq!(module.average_bits(3).unwrap(), 7);

        module.set_oversample_bits(3, 2).unwrap();
        assert_eq!(module.oversample_bits(3).unwrap(), 2);

        // 其他通道不受影响
        assert_eq!(module.average_bits(4).unwrap(), 0);
    }

    #[test]
    fn test_sample_rate_roundtrip() {
        let (_hal, module) = module();
        module.set_sample_rate(25_000.0).unwrap();
        assert_eq!(module.sample_rate().unwrap(), 25_000.0);
    }

    #[test]
    fn test_value_and_voltage_reads() {
        let (hal, module) = module();
        // 通道序号 2 -> 驱动通道号 3
        hal.set_calibration(1, 3, 1_000_000, 0); // 1mV/码值
        hal.set_value(1, 3, 1500);
        module.set_oversample_bits(2, 1).unwrap();

        assert_eq!(module.value(2).unwrap(), 1500);
        // 过采样 2^1 倍累积
        assert_eq!(module.average_value(2).unwrap(), 3000);
        assert!((module.voltage(2).unwrap() - 1.5).abs() < 1e-9);
        assert!((module.average_voltage(2).unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_passthrough() {
        let (hal, module) = module();
        hal.set_calibration(1, 4, 1_000_000, 2_000_000); // 1mV/码值，2mV 偏移

        // 通道序号 3 -> 驱动通道号 4
        assert_eq!(module.lsb_weight(3).unwrap(), 1_000_000);
        assert_eq!(module.offset(3).unwrap(), 2_000_000);

        hal.set_value(1, 4, 1000);
        let volts = module.voltage(3).unwrap();
        assert!((volts - 0.998).abs() < 1e-9);
        assert_eq!(module.volts_to_value(3, 0.998).unwrap(), 1000);
    }

    #[test]
    fn test_driver_failure_surfaces() {
        let (hal, module) = module();
        hal.set_fault("value", 1, 3, 7);

        let err = module.value(2).unwrap_err();
        assert!(matches!(err, AnalogError::Hal { op: "value", .. }));
        // 其他通道不受影响
        assert!(module.value(3).is_ok());
    }
}
