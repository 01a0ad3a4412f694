pub mod characteristics;
pub mod heuristic;
pub mod quality;
pub mod statistics;
pub mod technical;
