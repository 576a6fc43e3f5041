//! Response-wait heuristic
//!
//! After a question is submitted in the chat, [`ResponseWaiter`] polls the
//! page through a [`PageProbe`] until a reply looks complete, then an
//! [`Extractor`] recovers the reply text from the rendered DOM.

pub mod dom;
pub mod extract;
pub mod snapshot;
pub mod wait;

pub use extract::{
    ChromeFilter, DomHeuristicExtractor, ExtractedConversation, ExtractionConfig, Extractor,
    extract_conversation,
};
pub use snapshot::{BrowserProbe, PageProbe, PageSnapshot, TextElement};
pub use wait::{
    MIN_INTERVAL, PollState, ReadinessSignal, ResponseWaiter, Transition, WaitConfig, WaitOutcome,
    WaitState,
};
