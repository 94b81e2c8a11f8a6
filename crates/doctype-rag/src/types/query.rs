//! Request types

use serde::{Deserialize, Serialize};

/// Question sent to `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's question
    pub question: String,
}
