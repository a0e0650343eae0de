//! Time bookkeeping shared by the simulator

pub mod time;
