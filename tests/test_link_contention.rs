mod common;

use common::{device, run, start_of, vm_on};
use fog_workflow_sim::domain::resource::link::ServiceInterval;
use fog_workflow_sim::domain::simulation::SimulationConfig;
use fog_workflow_sim::domain::workflow::task::Task;

fn fan_out() -> Vec<Task> {
    vec![
        Task::new("t0", "wf", 1000).with_output("o1", 100).with_output("o2", 100).with_pinned_vm("vm-a"),
        Task::new("t1", "wf", 1000).with_input("o1", "t0", 100).with_pinned_vm("vm-c"),
        Task::new("t2", "wf", 1000).with_input("o2", "t0", 100).with_pinned_vm("vm-c"),
    ]
}

#[test]
fn test_transfers_through_one_link_are_served_in_order() {
    let devices = vec![device("a", &["c"], 1, 10.0), device("c", &["a"], 1, 10.0)];

    let (simulation, report) = run(&SimulationConfig::default(), devices, vec![vm_on("vm-a", "a"), vm_on("vm-c", "c")], fan_out());

    let uplink = simulation.device("a").unwrap().links().uplink.history().to_vec();
    assert_eq!(uplink, vec![ServiceInterval { start: 1.0, end: 11.0 }, ServiceInterval { start: 11.0, end: 21.0 }], "The second transfer queues behind the first");

    let downlink = simulation.device("c").unwrap().links().downlink.history().to_vec();
    assert_eq!(downlink, vec![ServiceInterval { start: 11.0, end: 21.0 }, ServiceInterval { start: 21.0, end: 31.0 }]);

    assert_eq!(start_of(&report, "t1", 0), 21.0);
    assert_eq!(start_of(&report, "t2", 0), 22.0, "Readiness is per parent: the first delivery from t0 releases both consumers");
}

#[test]
fn test_links_are_idle_after_the_run() {
    let devices = vec![device("a", &["c"], 1, 10.0), device("c", &["a"], 1, 10.0)];

    let (simulation, _) = run(&SimulationConfig::default(), devices, vec![vm_on("vm-a", "a"), vm_on("vm-c", "c")], fan_out());

    for name in ["a", "c"] {
        let links = simulation.device(name).unwrap().links();
        assert!(!links.uplink.is_busy() && !links.downlink.is_busy(), "Device {} still has a busy link", name);
        assert_eq!(links.uplink.queued() + links.downlink.queued(), 0);
    }
}
