pub mod aggregator;
pub mod emitter;
pub mod evaluator;
pub mod service;

#[cfg(test)]
pub mod fakes;

pub use service::AlertService;
