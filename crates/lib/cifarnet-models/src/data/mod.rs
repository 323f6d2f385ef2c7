pub mod cifar;
pub mod provider;
