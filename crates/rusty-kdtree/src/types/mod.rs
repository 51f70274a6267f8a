pub mod node;
pub mod point;
