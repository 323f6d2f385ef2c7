pub mod deep;
pub mod evaluator;
pub mod layers;
pub mod loss;
pub mod network;
pub mod norm;
pub mod optim;
pub mod render;
pub mod shallow;
pub mod trainer;
