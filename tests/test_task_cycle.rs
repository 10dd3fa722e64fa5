use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use fog_workflow_sim::domain::utils::id::VmId;
use fog_workflow_sim::domain::workflow::models::{FractionalSelectivity, PeriodicExecutionModel};
use fog_workflow_sim::domain::workflow::task::{Task, TaskStatus};

#[test]
fn test_next_cycle_keeps_history_and_resets_status() {
    let mut task = Task::new("t0", "wf", 100).with_output("o", 10);
    let mut rng = StdRng::seed_from_u64(0);
    task.vm = Some(VmId::new("vm-0"));
    task.state.set_start_execution(0, 1.0);
    task.state.set_end_execution(0, 2.0);
    task.status = TaskStatus::Success;
    task.record_failure(1.5);
    task.want_to_generate_data(0, 2.0, &mut rng);

    let next = task.next_cycle();

    assert_eq!(next.cycle(), 1);
    assert_eq!(next.status, TaskStatus::Created);
    assert_eq!(next.vm, Some(VmId::new("vm-0")), "Assignment carries over");
    assert_eq!(next.state.execution_window(0), Some((1.0, 2.0)));
    assert_eq!(next.state.execution_window(1), None);
    assert_eq!(next.failures(), &[1.5]);
    assert_eq!(next.generated_data(0), Some(true));
    assert!(next.same_models(&task), "Models are shared, not copied");
}

#[test]
fn test_data_decision_is_taken_once_per_cycle() {
    let mut task = Task::new("t0", "wf", 100).with_selectivity(Arc::new(FractionalSelectivity::new(0.5)));
    let mut rng = StdRng::seed_from_u64(7);

    let first = task.want_to_generate_data(3, 0.0, &mut rng);
    for _ in 0..20 {
        assert_eq!(task.want_to_generate_data(3, 1.0, &mut rng), first, "The first decision is replayed");
    }
    assert_eq!(task.generated_data(3), Some(first));
    assert_eq!(task.generated_data(4), None);
}

#[test]
fn test_selectivity_bounds() {
    let mut never = Task::new("never", "wf", 100).with_selectivity(Arc::new(FractionalSelectivity::new(0.0)));
    let mut always = Task::new("always", "wf", 100).with_selectivity(Arc::new(FractionalSelectivity::new(1.0)));
    let mut rng = StdRng::seed_from_u64(0);

    for cycle in 0..10 {
        assert!(!never.want_to_generate_data(cycle, 0.0, &mut rng));
        assert!(always.want_to_generate_data(cycle, 0.0, &mut rng));
    }
}

#[test]
fn test_no_data_mark_wins_over_selectivity() {
    let mut task = Task::new("t0", "wf", 100);
    let mut rng = StdRng::seed_from_u64(0);
    task.mark_no_data(0);

    assert!(!task.want_to_generate_data(0, 0.0, &mut rng));
}

#[test]
fn test_periodic_release_times() {
    let task = Task::new("t0", "wf", 100).with_execution_model(Arc::new(PeriodicExecutionModel::new(2.0)));

    assert_eq!(task.next_execution_time(0.5), 2.0);
    assert_eq!(task.next_execution_time(2.0), 2.0, "A boundary is its own release time");
    assert_eq!(task.next_execution_time(4.5), 6.0);
}
