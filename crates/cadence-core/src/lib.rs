pub mod error;
pub mod hash;
pub mod research;
pub mod seed;
pub mod store;
pub mod types;

pub use error::{SeedError, StoreError};
pub use research::ResearchDataPoint;
pub use seed::{load_seed, parse_seed, AiRatioBands, Developer, Repository, SeedData, SeedFormat, Seniority};
pub use store::{CommitStore, Directory, PullRequestStore, ReviewStore};
pub use types::*;
