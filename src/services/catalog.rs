use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde_json::json;

use crate::errors::ToolError;
use crate::models::{BusinessInfo, Service, WorkingHours};

/// Read-only business and service reference data. Loaded once at startup
/// and treated as constant for the life of the process.
pub struct CatalogStore {
    business: BusinessInfo,
    services: Vec<Service>,
}

#[derive(Deserialize)]
struct ServicesFile {
    services: Vec<Service>,
}

impl CatalogStore {
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let business_path = Path::new(data_dir).join("business_info.json");
        let raw = fs::read_to_string(&business_path)
            .with_context(|| format!("failed to read {}", business_path.display()))?;
        let business: BusinessInfo =
            serde_json::from_str(&raw).context("failed to parse business_info.json")?;

        let services_path = Path::new(data_dir).join("services.json");
        let raw = fs::read_to_string(&services_path)
            .with_context(|| format!("failed to read {}", services_path.display()))?;
        let file: ServicesFile =
            serde_json::from_str(&raw).context("failed to parse services.json")?;

        Self::from_parts(business, file.services)
    }

    pub fn from_parts(business: BusinessInfo, services: Vec<Service>) -> anyhow::Result<Self> {
        business.hours.validate()?;

        let mut seen = Vec::new();
        for service in &services {
            if service.name.trim().is_empty() {
                anyhow::bail!("service with empty name in catalog");
            }
            if service.price < 0.0 {
                anyhow::bail!("service {} has a negative price", service.name);
            }
            if service.duration_minutes <= 0 {
                anyhow::bail!("service {} has a non-positive duration", service.name);
            }
            let key = service.name.to_lowercase();
            if seen.contains(&key) {
                anyhow::bail!("duplicate service name in catalog: {}", service.name);
            }
            seen.push(key);
        }

        Ok(Self { business, services })
    }

    pub fn business(&self) -> &BusinessInfo {
        &self.business
    }

    pub fn hours(&self) -> &WorkingHours {
        &self.business.hours
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn find_service(&self, name: &str) -> Option<&Service> {
        let needle = name.trim().to_lowercase();
        self.services
            .iter()
            .find(|s| s.name.to_lowercase() == needle)
    }

    /// Business record, or a sub-record when a category is given.
    pub fn business_info(&self, category: Option<&str>) -> Result<serde_json::Value, ToolError> {
        match category {
            None | Some("all") => Ok(json!({
                "name": self.business.name,
                "address": self.business.address,
                "phone": self.business.phone,
                "email": self.business.email,
                "timezone": self.business.timezone,
                "working_hours": self.business.hours.to_human_readable(),
            })),
            Some("hours") => Ok(json!({
                "working_hours": self.business.hours.to_human_readable(),
                "detailed_hours": self.business.hours.windows,
                "timezone": self.business.timezone,
            })),
            Some("contact") => Ok(json!({
                "name": self.business.name,
                "phone": self.business.phone,
                "email": self.business.email,
            })),
            Some("address") => Ok(json!({
                "name": self.business.name,
                "address": self.business.address,
            })),
            Some(other) => Err(ToolError::NotFound(other.to_string())),
        }
    }
}
