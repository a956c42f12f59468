pub mod twilio_signature;

// Re-export middleware functions
pub use twilio_signature::twilio_signature_middleware;
