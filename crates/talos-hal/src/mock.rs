//! 确定性内存后端
//!
//! 在内存中模拟寄存器级驱动的可观测行为：通道码值、标定换算、
//! 平均/过采样流水线视图、触发器窗口与滞回状态机。
//! 供测试和无硬件开发使用，不是驱动实现。
//!
//! # 故障注入
//!
//! 按 `(操作名, 模块, 通道)` 注入持久故障状态码，模拟驱动返回非零状态；
//! 同时维护调用计数，测试可以据此断言"没有发生硬件调用"。

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::{AnalogBackend, HalResult, PortHandle, Status};

/// 触发器槽位耗尽（硬件只有 [`TRIGGER_SLOTS`] 个触发器）
pub const STATUS_NO_FREE_TRIGGER: i32 = -1004;
/// 句柄在后端没有登记项（已释放或伪造的句柄）
pub const STATUS_UNKNOWN_PORT: i32 = -1005;

/// 硬件触发器槽位数
pub const TRIGGER_SLOTS: usize = 8;

/// 默认标定 LSB 权重（纳伏/码值，5V 满量程 / 12 位）
const DEFAULT_LSB_WEIGHT: u32 = 1_220_703;

#[derive(Debug, Clone)]
struct ChannelState {
    value: i32,
    average_bits: u32,
    oversample_bits: u32,
    lsb_weight: u32,
    offset: i32,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            value: 0,
            average_bits: 0,
            oversample_bits: 0,
            lsb_weight: DEFAULT_LSB_WEIGHT,
            offset: 0,
        }
    }
}

impl ChannelState {
    /// 标定换算：码值 -> 电压
    fn to_volts(&self, value: i32) -> f64 {
        f64::from(self.lsb_weight) * 1e-9 * f64::from(value) - f64::from(self.offset) * 1e-9
    }

    /// 标定换算：电压 -> 码值（四舍五入）
    fn to_value(&self, volts: f64) -> i32 {
        let lsb = f64::from(self.lsb_weight) * 1e-9;
        ((volts + f64::from(self.offset) * 1e-9) / lsb).round() as i32
    }

    /// 平均/过采样流水线输出
    ///
    /// 过采样累积 2^bits 个采样（码值按位左移），平均不改变恒定信号；
    /// 模拟信号恒定，所以流水线输出即左移后的码值。
    fn pipeline_value(&self) -> i32 {
        self.value << self.oversample_bits
    }
}

#[derive(Debug)]
struct ModuleState {
    sample_rate: f64,
    channels: HashMap<u8, ChannelState>,
}

impl Default for ModuleState {
    fn default() -> Self {
        Self {
            sample_rate: 50_000.0,
            channels: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct TriggerState {
    index: u32,
    lower: i32,
    upper: i32,
    averaged: bool,
    // 3 点滤波对恒定信号是恒等变换，只记录开关
    filtered: bool,
    last_state: bool,
}

#[derive(Debug, Default)]
struct MockState {
    next_token: u32,
    next_trigger_index: u32,
    /// token -> (module, channel)
    ports: HashMap<u32, (u8, u8)>,
    modules: HashMap<u8, ModuleState>,
    /// 端口 token -> 触发器状态
    triggers: HashMap<u32, TriggerState>,
    /// (操作名, 模块, 通道) -> 注入的状态码
    faults: HashMap<(&'static str, u8, u8), Status>,
    calls: u64,
    binds: u64,
}

impl MockState {
    /// 进入一次驱动调用：计数并检查注入故障
    fn enter(&mut self, op: &'static str, module: u8, channel: u8) -> HalResult<()> {
        self.calls += 1;
        if let Some(status) = self.faults.get(&(op, module, channel)) {
            debug!(op, module, channel, status = status.code(), "injected fault");
            return Err(*status);
        }
        Ok(())
    }

    fn lookup(&self, port: &PortHandle) -> HalResult<(u8, u8)> {
        self.ports
            .get(&port.token())
            .copied()
            .ok_or(Status::new(STATUS_UNKNOWN_PORT))
    }

    fn channel_mut(&mut self, module: u8, channel: u8) -> &mut ChannelState {
        self.modules
            .entry(module)
            .or_default()
            .channels
            .entry(channel)
            .or_default()
    }

    fn channel(&self, module: u8, channel: u8) -> ChannelState {
        self.modules
            .get(&module)
            .and_then(|m| m.channels.get(&channel))
            .cloned()
            .unwrap_or_default()
    }

    /// 触发器监视的码值（平均流水线或即时值）
    fn monitored_value(&self, module: u8, channel: u8, averaged: bool) -> i32 {
        let state = self.channel(module, channel);
        if averaged {
            state.pipeline_value()
        } else {
            state.value
        }
    }
}

/// 确定性内存后端
#[derive(Debug, Default)]
pub struct MockBackend {
    inner: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个通道的即时码值（`channel` 为 1 起始）
    pub fn set_value(&self, module: u8, channel: u8, value: i32) {
        self.inner.lock().channel_mut(module, channel).value = value;
    }

    /// 写入一个通道的标定常数
    pub fn set_calibration(&self, module: u8, channel: u8, lsb_weight: u32, offset: i32) {
        let mut inner = self.inner.lock();
        let state = inner.channel_mut(module, channel);
        state.lsb_weight = lsb_weight;
        state.offset = offset;
    }

    /// 注入持久故障：指定操作在指定 (模块, 通道) 上返回 `status`
    ///
    /// 模块级操作（采样率）用 `channel = 0`。
    pub fn set_fault(&self, op: &'static str, module: u8, channel: u8, status: i32) {
        self.inner
            .lock()
            .faults
            .insert((op, module, channel), Status::new(status));
    }

    /// 清除此前注入的故障
    pub fn clear_fault(&self, op: &'static str, module: u8, channel: u8) {
        self.inner.lock().faults.remove(&(op, module, channel));
    }

    /// 到目前为止的驱动调用总数
    pub fn hal_calls(&self) -> u64 {
        self.inner.lock().calls
    }

    /// 到目前为止的端口绑定次数
    pub fn bind_count(&self) -> u64 {
        self.inner.lock().binds
    }

    /// 当前存活的端口句柄数
    pub fn live_ports(&self) -> usize {
        self.inner.lock().ports.len()
    }

    /// 当前存活的触发器数
    pub fn live_triggers(&self) -> usize {
        self.inner.lock().triggers.len()
    }

    /// 最近一次写入 (模块, 通道) 触发器的原始上下限
    pub fn trigger_limits(&self, module: u8, channel: u8) -> Option<(i32, i32)> {
        let inner = self.inner.lock();
        inner.triggers.iter().find_map(|(token, trigger)| {
            (inner.ports.get(token) == Some(&(module, channel)))
                .then_some((trigger.lower, trigger.upper))
        })
    }
}

impl AnalogBackend for MockBackend {
    fn bind_port(&self, module: u8, channel: u8) -> HalResult<PortHandle> {
        let mut inner = self.inner.lock();
        inner.enter("bind_port", module, channel)?;
        let token = inner.next_token;
        inner.next_token += 1;
        inner.binds += 1;
        inner.ports.insert(token, (module, channel));
        Ok(PortHandle::new(module, channel, token))
    }

    fn release_port(&self, port: PortHandle) {
        self.inner.lock().ports.remove(&port.token());
    }

    fn set_sample_rate(&self, module: u8, samples_per_second: f64) -> HalResult<()> {
        let mut inner = self.inner.lock();
        inner.enter("set_sample_rate", module, 0)?;
        inner.modules.entry(module).or_default().sample_rate = samples_per_second;
        Ok(())
    }

    fn sample_rate(&self, module: u8) -> HalResult<f64> {
        let mut inner = self.inner.lock();
        inner.enter("sample_rate", module, 0)?;
        Ok(inner
            .modules
            .get(&module)
            .map(|m| m.sample_rate)
            .unwrap_or(50_000.0))
    }

    fn set_average_bits(&self, port: &PortHandle, bits: u32) -> HalResult<()> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("set_average_bits", module, channel)?;
        inner.channel_mut(module, channel).average_bits = bits;
        Ok(())
    }

    fn average_bits(&self, port: &PortHandle) -> HalResult<u32> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("average_bits", module, channel)?;
        Ok(inner.channel(module, channel).average_bits)
    }

    fn set_oversample_bits(&self, port: &PortHandle, bits: u32) -> HalResult<()> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("set_oversample_bits", module, channel)?;
        inner.channel_mut(module, channel).oversample_bits = bits;
        Ok(())
    }

    fn oversample_bits(&self, port: &PortHandle) -> HalResult<u32> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("oversample_bits", module, channel)?;
        Ok(inner.channel(module, channel).oversample_bits)
    }

    fn value(&self, port: &PortHandle) -> HalResult<i32> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("value", module, channel)?;
        Ok(inner.channel(module, channel).value)
    }

    fn average_value(&self, port: &PortHandle) -> HalResult<i32> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("average_value", module, channel)?;
        Ok(inner.channel(module, channel).pipeline_value())
    }

    fn volts_to_value(&self, port: &PortHandle, volts: f64) -> HalResult<i32> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("volts_to_value", module, channel)?;
        Ok(inner.channel(module, channel).to_value(volts))
    }

    fn voltage(&self, port: &PortHandle) -> HalResult<f64> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("voltage", module, channel)?;
        let state = inner.channel(module, channel);
        Ok(state.to_volts(state.value))
    }

    fn average_voltage(&self, port: &PortHandle) -> HalResult<f64> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("average_voltage", module, channel)?;
        let state = inner.channel(module, channel);
        Ok(state.to_volts(state.pipeline_value()))
    }

    fn lsb_weight(&self, port: &PortHandle) -> HalResult<u32> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("lsb_weight", module, channel)?;
        Ok(inner.channel(module, channel).lsb_weight)
    }

    fn offset(&self, port: &PortHandle) -> HalResult<i32> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("offset", module, channel)?;
        Ok(inner.channel(module, channel).offset)
    }

    fn init_trigger(&self, port: &PortHandle) -> HalResult<u32> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("init_trigger", module, channel)?;
        if inner.triggers.len() >= TRIGGER_SLOTS {
            return Err(Status::new(STATUS_NO_FREE_TRIGGER));
        }
        let index = inner.next_trigger_index;
        inner.next_trigger_index += 1;
        inner.triggers.insert(
            port.token(),
            TriggerState {
                index,
                lower: 0,
                upper: 0,
                averaged: false,
                filtered: false,
                last_state: false,
            },
        );
        Ok(index)
    }

    fn set_trigger_limits_raw(&self, port: &PortHandle, lower: i32, upper: i32) -> HalResult<()> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("set_trigger_limits_raw", module, channel)?;
        let trigger = inner
            .triggers
            .get_mut(&port.token())
            .ok_or(Status::new(STATUS_UNKNOWN_PORT))?;
        trigger.lower = lower;
        trigger.upper = upper;
        Ok(())
    }

    fn set_trigger_limits_voltage(
        &self,
        port: &PortHandle,
        lower: f64,
        upper: f64,
    ) -> HalResult<()> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("set_trigger_limits_voltage", module, channel)?;
        // 驱动侧按通道标定换算为码值后写入
        let state = inner.channel(module, channel);
        let (lower, upper) = (state.to_value(lower), state.to_value(upper));
        let trigger = inner
            .triggers
            .get_mut(&port.token())
            .ok_or(Status::new(STATUS_UNKNOWN_PORT))?;
        trigger.lower = lower;
        trigger.upper = upper;
        Ok(())
    }

    fn set_trigger_averaged(&self, port: &PortHandle, averaged: bool) -> HalResult<()> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("set_trigger_averaged", module, channel)?;
        let trigger = inner
            .triggers
            .get_mut(&port.token())
            .ok_or(Status::new(STATUS_UNKNOWN_PORT))?;
        trigger.averaged = averaged;
        Ok(())
    }

    fn set_trigger_filtered(&self, port: &PortHandle, filtered: bool) -> HalResult<()> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("set_trigger_filtered", module, channel)?;
        let trigger = inner
            .triggers
            .get_mut(&port.token())
            .ok_or(Status::new(STATUS_UNKNOWN_PORT))?;
        trigger.filtered = filtered;
        Ok(())
    }

    fn trigger_in_window(&self, port: &PortHandle) -> HalResult<bool> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("trigger_in_window", module, channel)?;
        let trigger = inner
            .triggers
            .get(&port.token())
            .cloned()
            .ok_or(Status::new(STATUS_UNKNOWN_PORT))?;
        let value = inner.monitored_value(module, channel, trigger.averaged);
        // 窗口判定为闭区间
        Ok(value >= trigger.lower && value <= trigger.upper)
    }

    fn trigger_state(&self, port: &PortHandle) -> HalResult<bool> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(port)?;
        inner.enter("trigger_state", module, channel)?;
        let averaged = inner
            .triggers
            .get(&port.token())
            .ok_or(Status::new(STATUS_UNKNOWN_PORT))?
            .averaged;
        let value = inner.monitored_value(module, channel, averaged);
        let trigger = inner
            .triggers
            .get_mut(&port.token())
            .ok_or(Status::new(STATUS_UNKNOWN_PORT))?;
        // 高于上限置位，低于下限清零，滞回带内保持
        if value > trigger.upper {
            trigger.last_state = true;
        } else if value < trigger.lower {
            trigger.last_state = false;
        }
        Ok(trigger.last_state)
    }

    fn release_trigger(&self, port: PortHandle) -> HalResult<()> {
        let mut inner = self.inner.lock();
        let (module, channel) = inner.lookup(&port)?;
        inner.enter("release_trigger", module, channel)?;
        inner
            .triggers
            .remove(&port.token())
            .ok_or(Status::new(STATUS_UNKNOWN_PORT))?;
        inner.ports.remove(&port.token());
        Ok(())
    }
}
