pub mod prelude {
    pub use super::common::prelude::*;
    pub use super::model::prelude::*;
    pub use super::simulation::prelude::*;
    pub use super::schedulers::prelude::*;
    pub use super::taskgen::prelude::*;
    pub use super::experiments::prelude::*;
}

pub mod common;
pub mod model;
pub mod simulation;
pub mod schedulers;
pub mod taskgen;
pub mod experiments;
