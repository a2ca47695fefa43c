//! Census and convergence operations

pub mod census;
pub mod converge;
pub mod scan;
pub mod truncate;

pub use census::{effective_replication, CensusResult, ClusterCensus, ScanJob, Strategy};
pub use converge::{
    wait_until_count_exceeds, wait_until_empty, wait_until_scans_done, Convergence,
    ConvergenceWaiter,
};
pub use scan::ScanCounter;
pub use truncate::{truncate_namespace, truncate_set};
