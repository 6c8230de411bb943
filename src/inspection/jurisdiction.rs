use crate::config::JurisdictionConfig;

/// Orders inspection portals for an address.
///
/// Portals are kept sorted by descending priority. The primary portal is the
/// first whose city pattern appears in the address (or the highest-priority
/// portal when none match); it is followed by every other portal with a
/// positive priority.
#[derive(Debug, Clone)]
pub struct JurisdictionRouter {
    jurisdictions: Vec<JurisdictionConfig>,
}

impl JurisdictionRouter {
    pub fn new(mut jurisdictions: Vec<JurisdictionConfig>) -> Self {
        // Stable sort keeps configuration order among equal priorities
        jurisdictions.sort_by(|a, b| b.priority.cmp(&a.priority));
        for j in &jurisdictions {
            tracing::debug!(jurisdiction = %j.name, priority = j.priority, "Registered inspection portal");
        }
        Self { jurisdictions }
    }

    pub fn jurisdictions(&self) -> &[JurisdictionConfig] {
        &self.jurisdictions
    }

    /// Portal whose city patterns match `address`, else the first registered one
    pub fn detect(&self, address: &str) -> Option<&JurisdictionConfig> {
        let address = address.to_lowercase();
        self.jurisdictions
            .iter()
            .find(|j| {
                j.city_patterns
                    .iter()
                    .any(|p| !p.is_empty() && address.contains(&p.to_lowercase()))
            })
            .or_else(|| self.jurisdictions.first())
    }

    /// Portals to search for `address`, in order
    pub fn route(&self, address: &str) -> Vec<&JurisdictionConfig> {
        let mut ordered: Vec<&JurisdictionConfig> = Vec::new();
        if let Some(primary) = self.detect(address) {
            ordered.push(primary);
        }

        for j in &self.jurisdictions {
            if j.priority > 0 && !ordered.iter().any(|o| o.name == j.name) {
                ordered.push(j);
            }
        }

        ordered
    }
}
