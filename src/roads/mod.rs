pub mod road_structs;
pub mod road_subsystem;
pub mod stitcher;
pub mod templates;
pub mod topology;
