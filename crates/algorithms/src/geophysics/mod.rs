//! Geophysical preprocessing
//!
//! - Regional trend removal by least-squares polynomial surfaces
//! - Standardization and sigma-threshold anomaly detection
//! - Gridded field derivatives: gradients, tilt angle, analytic signal

mod anomalies;
mod derivatives;
mod trend;

pub use anomalies::{detect_anomalies, standardize, AnomalyReport};
pub use derivatives::{field_derivatives, magnetic_surface, FieldDerivatives, MagneticSurface};
pub use trend::{remove_regional_trend, TrendOrder, TrendSurface};
