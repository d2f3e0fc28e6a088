//! Audio analysis module for IOTA
//!
//! Turns a mono source into candidate grain positions, describes each one
//! with a small feature vector and clusters them into groups of similar
//! sounding events.

mod error;
mod events;
mod features;
mod kmeans;
mod window;

pub use error::AnalysisError;
pub use events::select_events;
pub use features::{extract_features, zero_crossings, FeatureMatrix, SpectralFeatures, FEATURE_WIDTH};
pub use kmeans::{kmeans, Clustering, KMEANS_ITERATIONS};
pub use window::{hann, normalise, peak, tukey};
