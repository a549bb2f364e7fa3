pub mod fault_injection;
pub mod network;
pub mod network_sim;
pub mod scenarios;

pub use fault_injection::{
    create_test_scenarios, ConsensusTestHarness, FaultType, TestResult, TestScenario,
};
pub use network::{InMemoryNetwork, InMemoryNetworkSimulator};
pub use network_sim::{NetworkConditions, NetworkSimulator, NetworkStats, SimulatedNetwork};
pub use scenarios::{
    create_performance_tests, print_performance_summary, run_all_performance_tests,
    PerformanceBenchmark, PerformanceResult, PerformanceTest,
};
