pub mod ephemeral;
pub mod graph;
pub mod vector;

pub use ephemeral::EphemeralStore;
pub use graph::{GraphRecord, GraphStore, Neo4jGraphStore};
pub use vector::{HttpVectorStore, VectorQueryResult, VectorStore};
