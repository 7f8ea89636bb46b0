//! Store settings
//!
//! Settings are kept locally as one JSON document under a fixed key. There
//! is no server endpoint for them; `save` never leaves the machine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::KeyValueStore;
use crate::AdminError;

/// Key the settings document is stored under
pub const SETTINGS_KEY: &str = "admin-settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    pub store_name: String,
    pub contact_email: String,
    pub phone_number: String,
    pub currency: String,
    pub store_description: String,
    pub notifications: NotificationSettings,
    pub payments: PaymentSettings,
    pub shipping: ShippingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub email_notifications: bool,
    pub low_stock_alerts: bool,
    pub order_updates: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentSettings {
    pub stripe_public_key: String,
    pub paypal_client_id: String,
    pub accept_credit_cards: bool,
    pub accept_paypal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingSettings {
    pub free_shipping_threshold: String,
    pub standard_rate: String,
    pub express_rate: String,
    pub processing_days: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "Hok Store".to_string(),
            contact_email: "contact@hokstore.com".to_string(),
            phone_number: "+1 (555) 123-4567".to_string(),
            currency: "USD".to_string(),
            store_description: "Premium clothing and accessories for the modern lifestyle"
                .to_string(),
            notifications: NotificationSettings::default(),
            payments: PaymentSettings::default(),
            shipping: ShippingSettings::default(),
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            low_stock_alerts: true,
            order_updates: false,
        }
    }
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            stripe_public_key: String::new(),
            paypal_client_id: String::new(),
            accept_credit_cards: true,
            accept_paypal: true,
        }
    }
}

impl Default for ShippingSettings {
    fn default() -> Self {
        Self {
            free_shipping_threshold: "$50.00".to_string(),
            standard_rate: "$5.99".to_string(),
            express_rate: "$12.99".to_string(),
            processing_days: "1-2".to_string(),
        }
    }
}

/// Settings persistence over a key/value store
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Saved settings, or the defaults when nothing was saved
    pub fn load(&self) -> crate::Result<StoreSettings> {
        match self.store.get(SETTINGS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(StoreSettings::default()),
        }
    }

    pub fn save(&self, settings: &StoreSettings) -> crate::Result<()> {
        let raw = serde_json::to_string_pretty(settings)?;
        self.store.set(SETTINGS_KEY, &raw)?;
        tracing::info!(store_name = %settings.store_name, "settings saved");
        Ok(())
    }

    /// Drop saved settings so the defaults apply again
    pub fn reset(&self) -> crate::Result<StoreSettings> {
        self.store.remove(SETTINGS_KEY)?;
        tracing::info!("settings reset to defaults");
        Ok(StoreSettings::default())
    }

    /// Change one field addressed by a dotted camelCase path
    /// (`storeName`, `shipping.expressRate`) and save.
    ///
    /// The value is parsed as JSON when it can be (`true`, `12`), and used
    /// as a plain string otherwise.
    pub fn set(&self, field: &str, value: &str) -> crate::Result<StoreSettings> {
        let mut doc = serde_json::to_value(self.load()?)?;

        let mut target = &mut doc;
        for part in field.split('.') {
            target = target
                .get_mut(part)
                .ok_or_else(|| AdminError::Validation(format!("unknown setting: {field}")))?;
        }
        if target.is_object() {
            return Err(AdminError::Validation(format!(
                "{field} is a section, not a setting"
            )));
        }

        let parsed = serde_json::from_str::<Value>(value)
            .ok()
            .filter(|v| std::mem::discriminant(v) == std::mem::discriminant(&*target))
            .unwrap_or_else(|| Value::String(value.to_string()));
        *target = parsed;

        let settings: StoreSettings = serde_json::from_value(doc).map_err(|e| {
            AdminError::Validation(format!("invalid value for {field}: {e}"))
        })?;
        self.save(&settings)?;
        Ok(settings)
    }
}
