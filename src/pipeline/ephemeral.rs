//! Retrieval against the session's ephemeral store. Runs in the primary
//! tier alongside vector search whenever the session has staged data.

use crate::context::ServiceContext;
use crate::types::RetrievalOutcome;

/// Query the session store with an already-computed question embedding.
pub fn retrieve(ctx: &ServiceContext, session_id: &str, embedding: &[f32]) -> RetrievalOutcome {
    if !ctx.ephemeral.has_data(session_id) {
        return RetrievalOutcome::Empty;
    }

    let items = ctx
        .ephemeral
        .query(session_id, embedding, ctx.config.search.vector_results);
    if items.is_empty() {
        RetrievalOutcome::Empty
    } else {
        RetrievalOutcome::Hit(items)
    }
}
