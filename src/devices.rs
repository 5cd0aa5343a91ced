use std::collections::HashMap;

/// A body sensor known to the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    pub name: String,
    pub address: String,
    pub online: bool,
}

impl Sensor {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            online: false,
        }
    }
}

/// Known sensors and which of them answered the last scan
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    sensors: Vec<Sensor>,
    scanned: bool,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the known set from a fresh listing. Everything starts offline.
    pub fn replace(&mut self, sensors: Vec<Sensor>) {
        self.sensors = sensors
            .into_iter()
            .map(|s| Sensor {
                online: false,
                ..s
            })
            .collect();
        self.scanned = false;
    }

    /// Rebuild the online set from scan results. Addresses absent from `results` are offline.
    pub fn apply_scan(&mut self, results: &HashMap<String, bool>) {
        for sensor in &mut self.sensors {
            sensor.online = results.get(&sensor.address).copied().unwrap_or(false);
        }
        self.scanned = true;
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn has_scanned(&self) -> bool {
        self.scanned
    }

    pub fn addresses(&self) -> Vec<String> {
        self.sensors.iter().map(|s| s.address.clone()).collect()
    }

    pub fn online_names(&self) -> Vec<&str> {
        self.sensors
            .iter()
            .filter(|s| s.online)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn is_online(&self, name: &str) -> bool {
        self.sensors.iter().any(|s| s.online && s.name == name)
    }

    pub fn address_of(&self, name: &str) -> Option<&str> {
        self.sensors
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.address.as_str())
    }

    /// Required sensor names that are not online, in the order they were asked for
    pub fn missing(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.is_online(name))
            .cloned()
            .collect()
    }

    /// Addresses for `required`, or the names that could not be resolved to an online sensor
    pub fn resolve(&self, required: &[String]) -> Result<Vec<String>, Vec<String>> {
        let missing = self.missing(required);
        if !missing.is_empty() {
            return Err(missing);
        }
        required
            .iter()
            .map(|name| self.address_of(name).map(str::to_string).ok_or_else(|| vec![name.clone()]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(names: &[&str], online: &[&str]) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.replace(
            names
                .iter()
                .map(|n| Sensor::new(*n, format!("addr-{n}")))
                .collect(),
        );
        let results = names
            .iter()
            .map(|n| (format!("addr-{n}"), online.contains(n)))
            .collect();
        registry.apply_scan(&results);
        registry
    }

    #[test]
    fn replace_resets_online_state() {
        let mut registry = registry_with(&["A", "B"], &["A", "B"]);
        assert_eq!(registry.online_names(), vec!["A", "B"]);

        registry.replace(vec![Sensor::new("A", "addr-A")]);
        assert!(registry.online_names().is_empty());
        assert!(!registry.has_scanned());
    }

    #[test]
    fn scan_rebuilds_online_set_wholesale() {
        let mut registry = registry_with(&["A", "B", "C"], &["A", "B"]);

        let results = HashMap::from([("addr-C".to_string(), true)]);
        registry.apply_scan(&results);

        assert_eq!(registry.online_names(), vec!["C"]);
    }

    #[test]
    fn missing_reports_offline_and_unknown_names() {
        let registry = registry_with(&["A", "B", "C", "D", "E"], &["A", "B", "C", "E"]);
        let required: Vec<String> = ["A", "B", "C", "D", "E", "Z"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(registry.missing(&required), vec!["D", "Z"]);
    }

    #[test]
    fn resolve_returns_addresses_in_required_order() {
        let registry = registry_with(&["A", "F"], &["A", "F"]);
        let required = vec!["F".to_string(), "A".to_string()];
        assert_eq!(
            registry.resolve(&required),
            Ok(vec!["addr-F".to_string(), "addr-A".to_string()])
        );
    }

    #[test]
    fn resolve_fails_with_missing_names() {
        let registry = registry_with(&["A", "F"], &["A"]);
        let required = vec!["A".to_string(), "F".to_string()];
        assert_eq!(registry.resolve(&required), Err(vec!["F".to_string()]));
    }
}
