pub mod errors;
pub mod estimators;
pub mod feedback;
pub mod linalg;
pub mod policy;
pub mod stats;
pub mod synthetic;
