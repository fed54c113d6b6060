mod extraction;
mod publish;
mod validation;

pub use extraction::ExtractionHandler;
pub use publish::PublishHandler;
pub use validation::ValidationHandler;
