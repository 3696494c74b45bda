pub mod bounds;
pub mod compiled;
pub mod curves;
pub mod error;
pub mod generator;
pub mod graph;
pub mod image;
pub mod interval;
pub mod node_types;
pub mod nodes;
pub mod noise;
pub mod resources;
pub mod volume;
