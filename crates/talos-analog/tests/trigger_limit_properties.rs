//! 触发器上下限次序的性质测试
//!
//! 对任意 lower > upper，两个限值设置接口都必须在触达硬件之前
//! 以 BoundaryViolation 拒绝；对任意 lower <= upper，调用原样转发。

use std::sync::Arc;

use proptest::prelude::*;

use talos_analog::{AnalogError, AnalogTrigger, ModuleRegistry};
use talos_hal::{AnalogBackend, MockBackend};

fn trigger() -> (Arc<MockBackend>, ModuleRegistry) {
    let hal = Arc::new(MockBackend::new());
    let registry = ModuleRegistry::new(Arc::clone(&hal) as Arc<dyn AnalogBackend>);
    (hal, registry)
}

proptest! {
    #[test]
    fn reversed_raw_limits_never_reach_hardware(
        lower in -4096i32..=4096,
        upper in -4096i32..=4096,
    ) {
        prop_assume!(lower > upper);
        let (hal, registry) = trigger();
        let t = AnalogTrigger::new(&registry, 0).unwrap();
        let before = hal.hal_calls();

        prop_assert_eq!(t.set_limits_raw(lower, upper).unwrap_err(), AnalogError::BoundaryViolation);
        prop_assert_eq!(hal.hal_calls(), before);
    }

    #[test]
    fn ordered_raw_limits_forward_unchanged(
        lower in -4096i32..=4096,
        upper in -4096i32..=4096,
    ) {
        prop_assume!(lower <= upper);
        let (hal, registry) = trigger();
        let t = AnalogTrigger::new(&registry, 0).unwrap();

        t.set_limits_raw(lower, upper).unwrap();
        prop_assert_eq!(hal.trigger_limits(1, 1), Some((lower, upper)));
    }

    #[test]
    fn reversed_voltage_limits_never_reach_hardware(
        lower in -10.0f64..=10.0,
        upper in -10.0f64..=10.0,
    ) {
        prop_assume!(lower > upper);
        let (hal, registry) = trigger();
        let t = AnalogTrigger::new(&registry, 0).unwrap();
        let before = hal.hal_calls();

        prop_assert_eq!(
            t.set_limits_voltage(lower, upper).unwrap_err(),
            AnalogError::BoundaryViolation
        );
        prop_assert_eq!(hal.hal_calls(), before);
    }

    #[test]
    fn ordered_voltage_limits_are_forwarded(
        lower in -10.0f64..=10.0,
        upper in -10.0f64..=10.0,
    ) {
        prop_assume!(lower <= upper);
        let (_hal, registry) = trigger();
        let t = AnalogTrigger::new(&registry, 0).unwrap();

        prop_assert!(t.set_limits_voltage(lower, upper).is_ok());
    }
}
