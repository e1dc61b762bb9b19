//! Property-Based Tests for the Control Smoother
//!
//! Whatever the policy asks for, the smoother's output stays inside the
//! actuator domain.

use racing_wheel_scr_control::prelude::*;
use racing_wheel_scr_control::{KeySnapshot, ManualIntent};
use racing_wheel_scr_protocol::ControlCommand;

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    const LOCK: f64 = 0.785398;

    fn any_value() -> impl Strategy<Value = f64> {
        prop_oneof![
            8 => -1e6f64..1e6f64,
            1 => Just(f64::NAN),
            1 => Just(f64::INFINITY),
            1 => Just(f64::NEG_INFINITY),
        ]
    }

    fn any_intent() -> impl Strategy<Value = RawIntent> {
        let manual = (any::<[bool; 4]>(), -10i32..10).prop_map(|(keys, gear)| {
            let [forward, backward, left, right] = keys;
            RawIntent::Manual(ManualIntent {
                keys: KeySnapshot {
                    forward,
                    backward,
                    left,
                    right,
                },
                gear,
            })
        });
        let model = (any_value(), any_value(), any_value(), any_value(), any_value()).prop_map(
            |(accel_delta, brake_target, steer_target, gear_target, clutch_target)| {
                RawIntent::Model(ModelIntent {
                    accel_delta,
                    brake_target,
                    steer_target,
                    gear_target,
                    clutch_target,
                })
            },
        );
        prop_oneof![manual, model]
    }

    fn in_domain(command: &ControlCommand) -> bool {
        command.is_within_domain() && command.steer.abs() <= LOCK
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_output_always_clipped(
            intents in prop::collection::vec(any_intent(), 1..50),
            rpms in prop::collection::vec(any_value(), 50),
        ) {
            let mut smoother = ControlSmoother::default();
            let mut command = ControlCommand::neutral();
            for (intent, rpm) in intents.iter().zip(rpms.iter()) {
                command = smoother.apply(intent, *rpm, &command);
                prop_assert!(in_domain(&command), "out of domain: {command:?}");
            }
        }

        #[test]
        fn prop_model_gear_never_reverse(gear_target in any_value()) {
            let mut smoother = ControlSmoother::default();
            let intent = RawIntent::Model(ModelIntent {
                accel_delta: 0.0,
                brake_target: 0.0,
                steer_target: 0.0,
                gear_target,
                clutch_target: 0.0,
            });
            let command = smoother.apply(&intent, 0.0, &ControlCommand::neutral());
            prop_assert!((1..=6).contains(&command.gear));
        }

        #[test]
        fn prop_manual_steer_moves_at_most_one_step(
            keys in any::<[bool; 4]>(),
            ticks in 1usize..200,
        ) {
            let [forward, backward, left, right] = keys;
            let intent = RawIntent::Manual(ManualIntent {
                keys: KeySnapshot { forward, backward, left, right },
                gear: 1,
            });
            let config = SmootherConfig::default();
            let max_step = config.steer_rate.max(config.steer_center_rate);
            let mut smoother = ControlSmoother::new(config);
            let mut command = ControlCommand::neutral();
            for _ in 0..ticks {
                let next = smoother.apply(&intent, 0.0, &command);
                prop_assert!((next.steer - command.steer).abs() <= max_step + 1e-12);
                command = next;
            }
        }
    }
}
