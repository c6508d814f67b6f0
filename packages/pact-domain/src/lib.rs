pub mod amount;
pub mod chunk;
pub mod contract;
pub mod dates;
pub mod filter;
pub mod fusion;
pub mod intent;
pub mod placement;
pub mod status;
pub mod text;

pub use chunk::{Chunk, ChunkMetadata};
pub use contract::{ContractFields, RawMetadata};
pub use filter::{AmountRange, DateRange, FilterSet};
pub use fusion::{FusionWeights, RetrievedItem, Source};
pub use intent::{Intent, IntentKind};
pub use status::ContractStatus;
