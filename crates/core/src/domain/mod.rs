pub mod ids;
pub mod investor;
pub mod listing;
pub mod mandate;
pub mod market;
pub mod opportunity;
