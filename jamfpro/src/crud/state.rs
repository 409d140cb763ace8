//! Identifier access on resource state

use tfplug::types::{AttributePath, DynamicValue};

/// Resource state that carries an `id` attribute.
/// An empty id means the resource is gone and should be dropped from state.
pub trait ResourceData {
    fn id(&self) -> String;

    fn set_id(&mut self, id: &str);

    fn is_removed(&self) -> bool {
        self.id().is_empty()
    }
}

impl ResourceData for DynamicValue {
    fn id(&self) -> String {
        self.get_string(&AttributePath::new("id"))
            .unwrap_or_default()
    }

    fn set_id(&mut self, id: &str) {
        let path = AttributePath::new("id");
        let value = (!id.is_empty()).then(|| id.to_string());

        if let Err(e) = self.set_optional_string(&path, value) {
            tracing::warn!("Failed to set resource id: {}", e);
        }
    }
}
