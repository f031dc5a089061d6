pub mod params;
pub mod response;
pub mod tensor;
pub mod variant;

pub use params::*;
pub use response::*;
pub use tensor::*;
pub use variant::*;
