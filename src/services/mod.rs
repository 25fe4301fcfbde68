//! Services module
//!
//! Contains the key pool, the failover invoker, the Gemini remote
//! operations it drives and the SEO report prompt.

pub mod backend_pool;
pub mod failover;
pub mod gemini;
pub mod report;

pub use backend_pool::{
    ConfigurationError, Credential, CredentialPool, CursorStore, CursorStoreError,
    FileCursorStore, MemoryCursorStore, PoolSnapshot, PoolStats,
};
pub use failover::{
    ErrorSignal, FailoverInvoker, FailoverPolicy, InvocationOutcome, InvokeError, Invoked,
    RemoteCall,
};
pub use gemini::{
    GeminiClient, GeminiConfig, GeminiServiceError, GenerateText, RecreateThumbnail,
    TextRequest, ThumbnailRequest,
};
pub use report::{analysis_prompt, analysis_request, ReportLanguage, VideoDetails};
