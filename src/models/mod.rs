//! Model artifacts: the fitted scaler and the ONNX classifier

pub mod inference;
pub mod loader;
pub mod scaler;

pub use inference::{Classifier, InferenceService, OnnxClassifier};
pub use loader::ModelLoader;
pub use scaler::{Scaler, ScalingMode, ScalingModeSetting};
