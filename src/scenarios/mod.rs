//! Shipped bid request scenarios.

mod mobile;

pub use mobile::MobileApp;

use tracing::warn;

use crate::generator::Scenario;

/// Resolve a scenario by its configured name. Unknown names fall back to
/// `mobile_app`, the only scenario shipped today.
pub fn by_name(name: &str) -> Box<dyn Scenario> {
    match name {
        "mobile_app" => Box::new(MobileApp::new()),
        other => {
            warn!(scenario = other, "unknown scenario, defaulting to mobile_app");
            Box::new(MobileApp::new())
        }
    }
}
