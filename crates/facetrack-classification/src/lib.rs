//! FaceTrack Classification - classifiers behind the measurement models
//!
//! Provides:
//! - Kernels (linear, polynomial, RBF)
//! - SVM models with SMO training and Platt probability calibration
//! - Frozen cascade stages (WVM coarse filter, probabilistic SVM)
//! - Bounded training-set strategies (`ExampleManagement`)
//! - An online re-trainable SVM used by the adaptive measurement models

pub mod example_management;
pub mod kernel;
pub mod probabilistic;
pub mod svm;
pub mod trainable;

pub use example_management::{
    AgeBasedExampleManagement, ConfidenceBasedExampleManagement, ConfidenceScorer,
    ExampleManagement, ExampleManagementConfig, ExampleStore, FrameBasedExampleManagement,
    NoScorer, UnlimitedExampleManagement,
};
pub use kernel::Kernel;
pub use probabilistic::{
    ProbabilisticSvmClassifier, ProbabilisticWvmClassifier, SvmModelDescription,
    WvmModelDescription,
};
pub use svm::{fit_sigmoid, Sigmoid, SmoTrainer, SvmModel};
pub use trainable::{TrainableSvmClassifier, TrainableSvmConfig};
