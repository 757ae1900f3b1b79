pub mod commit;
pub mod error;
pub mod lifecycle;
pub mod pr;
pub mod quality;
pub mod research;
pub mod review;
pub mod rng;
pub mod session;
pub mod simulation;
pub mod velocity;

pub use commit::CommitGenerator;
pub use error::{SimError, SimResult};
pub use lifecycle::{Lifecycle, LifecyclePolicy};
pub use pr::PrGenerator;
pub use quality::{QualityEngine, QualityModel, QualityReport};
pub use research::ResearchGenerator;
pub use review::{ReviewGenerator, ReviewReport};
pub use rng::SimRng;
pub use simulation::{RunSummary, SimConfig, Simulation};
pub use velocity::Velocity;
