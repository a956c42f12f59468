pub mod realtime;

pub use realtime::{
    BaseRealtime, BoxedRealtime, OpenAIRealtime, OpenAIRealtimeFactory, RealtimeConfig,
    RealtimeError, RealtimeFactory, RealtimeResult,
};
