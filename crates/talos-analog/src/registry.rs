//! 硬件模块注册表
//!
//! 按 (模块类型, 模块号) 键维护进程内唯一的模块实例：
//! 首次访问构造并登记，后续访问返回同一个共享实例。
//! 构造互斥锁跨越整个构造过程，两个并发的首次访问
//! 只会发生一次端口绑定。注册表项没有销毁路径，
//! 生命周期覆盖所有在其上构造的触发器。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use talos_hal::AnalogBackend;

use crate::config::AnalogConfig;
use crate::error::Result;
use crate::module::AnalogModule;
use crate::usage::{TracingReporter, UsageReporter};

/// 硬件模块类型
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
pub enum ModuleKind {
    /// 模拟输入模块
    Analog = 0,
    /// 数字 IO 模块（本 crate 不构造，类型标签保留给平台枚举）
    Digital = 1,
    /// 电磁阀模块（同上）
    Solenoid = 2,
}

/// 物理模块标识：(类型, 模块号)，模块号 1 起始
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    pub kind: ModuleKind,
    pub number: u8,
}

impl ModuleKey {
    pub const fn analog(number: u8) -> Self {
        Self {
            kind: ModuleKind::Analog,
            number,
        }
    }
}

/// 模块能力接口：注册表中单例身份的单位
pub trait HardwareModule {
    /// 模块类型标签
    fn kind(&self) -> ModuleKind;

    /// 模块号（1 起始）
    fn module_number(&self) -> u8;

    /// 注册表键
    fn key(&self) -> ModuleKey {
        ModuleKey {
            kind: self.kind(),
            number: self.module_number(),
        }
    }
}

/// 带类型标签的模块变体
///
/// 平台的每种模块类型对应一个变体；目前本核心只构造模拟模块。
#[derive(Debug, Clone)]
pub enum Module {
    Analog(Arc<AnalogModule>),
}

impl Module {
    pub fn key(&self) -> ModuleKey {
        match self {
            Module::Analog(module) => module.key(),
        }
    }

    pub fn as_analog(&self) -> Option<&Arc<AnalogModule>> {
        match self {
            Module::Analog(module) => Some(module),
        }
    }
}

/// 模块注册表
///
/// 持有驱动后端、平台配置和遥测上报器，
/// 是构造模块与触发器的唯一入口。
pub struct ModuleRegistry {
    backend: Arc<dyn AnalogBackend>,
    config: AnalogConfig,
    reporter: Arc<dyn UsageReporter>,
    modules: Mutex<HashMap<ModuleKey, Module>>,
}

impl ModuleRegistry {
    /// 用默认平台配置创建注册表
    pub fn new(backend: Arc<dyn AnalogBackend>) -> Self {
        Self::with_config(backend, AnalogConfig::default())
    }

    /// 用显式平台配置创建注册表
    pub fn with_config(backend: Arc<dyn AnalogBackend>, config: AnalogConfig) -> Self {
        Self {
            backend,
            config,
            reporter: Arc::new(TracingReporter),
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// 替换遥测上报器（链式调用）
    pub fn with_reporter(mut self, reporter: Arc<dyn UsageReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// 平台配置
    pub fn config(&self) -> &AnalogConfig {
        &self.config
    }

    /// 获取模拟模块（构造一次、共享返回）
    ///
    /// 首次访问校验模块号并绑定全部通道端口；构造失败不登记任何实例，
    /// 后续访问会重新尝试构造。相等的模块号总是返回同一个 `Arc` 实例。
    ///
    /// # 错误
    /// - `InvalidModuleNumber`: 模块号超出 `1..=config.module_count`
    /// - `Hal`: 任何一个通道的端口绑定失败
    pub fn analog(&self, number: u8) -> Result<Arc<AnalogModule>> {
        self.config.check_module_number(number)?;
        let key = ModuleKey::analog(number);

        // 锁覆盖整个构造过程：并发首次访问只构造一次
        let mut modules = self.modules.lock();
        if let Some(Module::Analog(existing)) = modules.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let module = Arc::new(AnalogModule::bind(
            Arc::clone(&self.backend),
            number,
            self.config.channels_per_module,
        )?);
        modules.insert(key, Module::Analog(Arc::clone(&module)));
        info!(module = number, "analog module registered");
        Ok(module)
    }

    /// 当前已登记的模块数（诊断用）
    pub fn module_count(&self) -> usize {
        self.modules.lock().len()
    }

    pub(crate) fn backend(&self) -> &Arc<dyn AnalogBackend> {
        &self.backend
    }

    pub(crate) fn reporter(&self) -> &Arc<dyn UsageReporter> {
        &self.reporter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talos_hal::MockBackend;

    fn registry() -> (Arc<MockBackend>, ModuleRegistry) {
        let hal = Arc::new(MockBackend::new());
        let registry = ModuleRegistry::new(Arc::clone(&hal) as Arc<dyn AnalogBackend>);
        (hal, registry)
    }

    #[test]
    fn test_module_kind_tags() {
        assert_eq!(u8::from(ModuleKind::Analog), 0);
        assert_eq!(ModuleKind::try_from(2u8), Ok(ModuleKind::Solenoid));
        assert!(ModuleKind::try_from(9u8).is_err());
    }

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let (hal, registry) = registry();

        let first = registry.analog(1).unwrap();
        let second = registry.analog(1).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // 端口绑定只发生一次（8 个通道）
        assert_eq!(hal.bind_count(), 8);
        assert_eq!(registry.module_count(), 1);
    }

    #[test]
    fn test_distinct_modules_are_distinct() {
        let (_hal, registry) = registry();

        let one = registry.analog(1).unwrap();
        let two = registry.analog(2).unwrap();
        assert!(!Arc::ptr_eq(&one, &two));
        assert_eq!(registry.module_count(), 2);
    }

    #[test]
    fn test_module_variant_capability() {
        let (_hal, registry) = registry();
        let module = registry.analog(2).unwrap();
        assert_eq!(module.key(), ModuleKey::analog(2));
        assert_eq!(module.kind(), ModuleKind::Analog);

        let variant = Module::Analog(Arc::clone(&module));
        assert_eq!(variant.key().number, 2);
        assert!(variant.as_analog().is_some());
    }

    #[test]
    fn test_invalid_module_number() {
        let (hal, registry) = registry();

        assert_eq!(
            registry.analog(0).unwrap_err(),
            crate::AnalogError::InvalidModuleNumber { number: 0, max: 2 }
        );
        assert_eq!(
            registry.analog(3).unwrap_err(),
            crate::AnalogError::InvalidModuleNumber { number: 3, max: 2 }
        );
        // 校验在硬件调用之前完成
        assert_eq!(hal.hal_calls(), 0);
    }

    #[test]
    fn test_failed_construction_is_not_registered() {
        let (hal, registry) = registry();
        hal.set_fault("bind_port", 1, 8, 3);

        let err = registry.analog(1).unwrap_err();
        assert!(matches!(err, crate::AnalogError::Hal { op: "bind_port", .. }));
        assert_eq!(registry.module_count(), 0);
        // 已绑定的 7 个端口全部回滚
        assert_eq!(hal.live_ports(), 0);

        // 故障清除后可以重新构造
        hal.clear_fault("bind_port", 1, 8);
        assert!(registry.analog(1).is_ok());
    }

    #[test]
    fn test_custom_config_widens_range() {
        let hal = Arc::new(MockBackend::new());
        let config = AnalogConfig {
            module_count: 4,
            ..AnalogConfig::default()
        };
        let registry = ModuleRegistry::with_config(hal, config);
        assert!(registry.analog(4).is_ok());
    }
}
