pub mod replay;
pub mod scenarios;

pub use replay::{run, verify, Replay, ReplayReport, VerifyReport, BASE_STEP_MS};
pub use scenarios::{
    create_crossing_scenario, create_overload_scenario, create_parallel_scenario,
    create_random_scenario, FlightSpec, Scenario,
};
