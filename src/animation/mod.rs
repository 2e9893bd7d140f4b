pub mod spring;

pub use spring::{Spring, SpringStep};
