//! Video cutting.

pub mod cutter;

pub use cutter::{build_cut_args, FfmpegCutter, VideoCutter};
