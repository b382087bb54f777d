use parabench::kernels::{Backend, SortTask};
use parabench::{LifecycleHarness, Stage, TaskDataBuilder};
use proptest::prelude::*;

fn backend() -> impl Strategy<Value = Backend> {
    prop_oneof![
        Just(Backend::Seq),
        (1usize..9).prop_map(Backend::Threads),
        Just(Backend::Rayon),
    ]
}

proptest! {
    #[test]
    fn sort_matches_std(values in prop::collection::vec(any::<i32>(), 0..512), backend in backend()) {
        let len = values.len();
        let mut expected = values.clone();
        expected.sort_unstable();

        let data = TaskDataBuilder::new().input_i32(values).output::<i32>(len).build();
        let mut harness = LifecycleHarness::new(SortTask::new(backend), data);
        harness.run_once().unwrap();
        prop_assert_eq!(harness.stage(), Stage::PostProcessed);
        let shared = harness.data();
        let guard = shared.read();
        prop_assert_eq!(guard.output_slice::<i32>(0).unwrap(), &expected[..]);
    }

    #[test]
    fn sorted_input_is_fixed_point(mut values in prop::collection::vec(-1000i32..1000, 1..256)) {
        values.sort_unstable();
        let len = values.len();
        let data = TaskDataBuilder::new().input_i32(values.clone()).output::<i32>(len).build();
        let mut harness = LifecycleHarness::new(SortTask::new(Backend::Seq), data);
        harness.run_once().unwrap();
        let shared = harness.data();
        let guard = shared.read();
        prop_assert_eq!(guard.output_slice::<i32>(0).unwrap(), &values[..]);
    }

    #[test]
    fn mismatched_capacity_always_rejected(len in 1usize..64, delta in 1usize..8) {
        let data = TaskDataBuilder::new()
            .input_i32(vec![0; len])
            .output::<i32>(len + delta)
            .build();
        let mut harness = LifecycleHarness::new(SortTask::new(Backend::Seq), data);
        prop_assert!(harness.run_once().is_err());
        prop_assert_eq!(harness.stage(), Stage::Rejected);
    }
}
