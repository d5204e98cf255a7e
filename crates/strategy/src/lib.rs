pub mod alert;
pub mod chart;
pub mod indicators;
pub mod services;
pub mod signals;
pub mod throttle;

pub use services::signal_engine::{EngineError, EngineSettings, EngineState, SignalEngine};
pub use signals::{EmaProximity, EmaProximityParams, EmaProximitySignal, Signal, SignalEvent};
pub use throttle::AlertThrottle;
