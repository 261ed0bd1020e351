pub mod audit;
pub mod doctor;
pub mod enums;
pub mod filters;
pub mod patient;
pub mod specialization;
pub mod visit;

pub use audit::*;
pub use doctor::*;
pub use enums::*;
pub use filters::*;
pub use patient::*;
pub use specialization::*;
pub use visit::*;
